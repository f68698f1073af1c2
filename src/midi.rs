// MIDI Module - Note events and the UDP ingress listener
use anyhow::{anyhow, Result};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

/// Capacity of the ingress→dispatcher channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 255;

const DATAGRAM_LEN: usize = 4;

/// One note-on/note-off event as received from the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    pub note: u8,
    pub velocity: u8,
    pub on: bool,
    pub channel: u8,
}

/// Decode a 4-byte datagram: (note, velocity, on_flag, channel).
pub fn parse_datagram(buf: &[u8]) -> Result<NoteEvent> {
    if buf.len() != DATAGRAM_LEN {
        return Err(anyhow!(
            "datagram is {} bytes, expected {}",
            buf.len(),
            DATAGRAM_LEN
        ));
    }
    let on = match buf[2] {
        0 => false,
        1 => true,
        other => return Err(anyhow!("on_flag is {}, expected 0 or 1", other)),
    };
    Ok(NoteEvent {
        note: buf[0],
        velocity: buf[1],
        on,
        channel: buf[3],
    })
}

/// Listen for note datagrams and push them onto the dispatcher channel in
/// arrival order. Malformed datagrams are logged and dropped; the loop
/// only ends if the channel's consumer goes away.
pub async fn run_udp_listener(port: u16, events: mpsc::Sender<NoteEvent>) -> Result<()> {
    let socket = UdpSocket::bind(("0.0.0.0", port)).await?;
    log::info!("MIDI listener on udp://0.0.0.0:{}", port);

    let mut buf = [0u8; 512];
    loop {
        let (len, _src) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                log::warn!("MIDI recv error: {}", e);
                continue;
            }
        };
        match parse_datagram(&buf[..len]) {
            Ok(event) => {
                if events.send(event).await.is_err() {
                    return Err(anyhow!("event channel closed"));
                }
            }
            Err(e) => log::warn!("Dropping malformed MIDI datagram: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note_on() {
        let event = parse_datagram(&[60, 100, 1, 3]).unwrap();
        assert_eq!(
            event,
            NoteEvent {
                note: 60,
                velocity: 100,
                on: true,
                channel: 3
            }
        );
    }

    #[test]
    fn test_parse_note_off() {
        let event = parse_datagram(&[38, 0, 0, 2]).unwrap();
        assert!(!event.on);
        assert_eq!(event.note, 38);
    }

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(parse_datagram(&[60, 100, 1]).is_err());
        assert!(parse_datagram(&[60, 100, 1, 3, 0]).is_err());
        assert!(parse_datagram(&[]).is_err());
    }

    #[test]
    fn test_parse_rejects_bad_on_flag() {
        assert!(parse_datagram(&[60, 100, 2, 3]).is_err());
        assert!(parse_datagram(&[60, 100, 255, 3]).is_err());
    }
}
