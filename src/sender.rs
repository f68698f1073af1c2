// Sender Module - DDP frame egress and throughput monitoring
use anyhow::Result;
use ddp_rs::connection::DDPConnection;
use ddp_rs::protocol::{ID, PixelConfig};
use std::net::UdpSocket;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::strip::Strip;

const SLOW_WRITE: Duration = Duration::from_millis(3);

/// Open the DDP connection to the LED controller at `host:port`.
pub fn connect(endpoint: &str) -> Result<DDPConnection> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    let connection = DDPConnection::try_new(endpoint, PixelConfig::default(), ID::Default, socket)?;
    log::info!("DDP sink connected at {}", endpoint);
    Ok(connection)
}

/// Periodically snapshot the strip and write the frame to the DDP sink.
/// Write errors are logged and the loop continues at the next tick.
pub async fn run_frame_sender(
    mut connection: DDPConnection,
    strip: Arc<Strip>,
    period: Duration,
    update_count: Arc<AtomicU64>,
) {
    log::info!("Launched DDP sender");
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let frame = strip.snapshot_frame();
        let start = Instant::now();
        match connection.write(&frame) {
            Ok(_) => {
                update_count.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => log::error!("DDP write failed: {}", e),
        }
        if start.elapsed() > SLOW_WRITE {
            log::warn!("DDP write took {:?}", start.elapsed());
        }
    }
}

/// Once per `interval_secs`, report how many frames went out.
pub async fn run_throughput_monitor(update_count: Arc<AtomicU64>, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.tick().await;
    loop {
        interval.tick().await;
        let count = update_count.swap(0, Ordering::Relaxed);
        log::info!(
            "DDP - {} updates/s (avg {}s)",
            count / interval_secs,
            interval_secs
        );
    }
}
