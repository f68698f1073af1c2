// Dispatcher Module - Routes note events by MIDI channel
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::drums;
use crate::mapping::Mapper;
use crate::midi::NoteEvent;
use crate::registry::EffectRegistry;
use crate::strip::Strip;

/// Consumes the ingress channel in arrival order and routes each event:
/// channel 1 sets individual pixels, channel 2 feeds the fixed drums
/// mapping, channel 3 goes through the dynamic mapper. Everything else is
/// ignored.
pub struct Dispatcher {
    strip: Arc<Strip>,
    registry: Arc<EffectRegistry>,
    mapper: Arc<Mapper>,
}

impl Dispatcher {
    pub fn new(strip: Arc<Strip>, registry: Arc<EffectRegistry>, mapper: Arc<Mapper>) -> Self {
        Dispatcher {
            strip,
            registry,
            mapper,
        }
    }

    pub fn dispatch(&self, event: &NoteEvent) {
        match event.channel {
            1 => {
                self.strip
                    .set_pixel(event.note as usize, event.on, event.velocity, 0, 0);
            }
            2 => drums::handle(&self.strip, &self.registry, event),
            3 => self.mapper.handle(event),
            other => log::debug!("Ignoring event on channel {}", other),
        }
    }

    pub async fn run(self, mut events: mpsc::Receiver<NoteEvent>) {
        log::info!("Launched event dispatcher");
        while let Some(event) = events.recv().await {
            self.dispatch(&event);
        }
        log::warn!("Event channel closed, dispatcher stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Dispatcher {
        let strip = Arc::new(Strip::new(150));
        let registry = Arc::new(EffectRegistry::new(strip.clone()));
        let mapper = Arc::new(Mapper::new(
            std::path::PathBuf::from("mappings"),
            "live.json".to_string(),
            strip.clone(),
            registry.clone(),
        ));
        Dispatcher::new(strip, registry, mapper)
    }

    fn event(channel: u8, note: u8) -> NoteEvent {
        NoteEvent {
            note,
            velocity: 127,
            on: true,
            channel,
        }
    }

    #[test]
    fn test_channel_one_sets_pixel() {
        let dispatcher = setup();
        dispatcher.dispatch(&event(1, 12));
        let frame = dispatcher.strip.snapshot_frame();
        assert_ne!(&frame[36..39], &[0, 0, 0]);
    }

    #[test]
    fn test_channel_two_hits_drums() {
        let dispatcher = setup();
        dispatcher.dispatch(&event(2, 49));
        assert!(dispatcher.registry.has_effect(49));
    }

    #[test]
    fn test_other_channels_ignored() {
        let dispatcher = setup();
        dispatcher.dispatch(&event(7, 60));
        dispatcher.dispatch(&event(0, 60));
        assert_eq!(dispatcher.registry.active_count(), 0);
        assert!(dispatcher.strip.snapshot_frame().iter().all(|&b| b == 0));
    }
}
