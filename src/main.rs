// Midilight - MIDI-driven LED effect engine for DDP controllers
// Maps note events to effect presets and streams composed frames to WLED
use anyhow::Result;
use clap::Parser;
use simple_logger::SimpleLogger;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Duration;
use tokio::sync::mpsc;

mod color;
mod config;
mod dispatcher;
mod drums;
mod effects;
mod mapping;
mod midi;
mod registry;
mod sender;
mod strip;
mod util;
mod webserver;

use config::{Args, Config};
use dispatcher::Dispatcher;
use mapping::Mapper;
use registry::EffectRegistry;
use strip::Strip;

#[tokio::main]
async fn main() -> Result<()> {
    SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()?;

    let args = Args::parse();
    let config = Config::load(&args)?;

    let strip = Arc::new(Strip::new(config.led_count));
    let registry = Arc::new(EffectRegistry::new(strip.clone()));
    let mapper = Arc::new(Mapper::new(
        config.mappings_dir.clone(),
        config.initial_mapping.clone(),
        strip.clone(),
        registry.clone(),
    ));
    if let Err(e) = mapper.load_from_file(&config.initial_mapping) {
        log::warn!(
            "Could not load default mapping '{}': {:#}",
            config.initial_mapping,
            e
        );
    }

    let refresh = Duration::from_millis(config.refresh_interval_ms);

    // Animator: advance every active effect and commit to the strip.
    {
        let registry = registry.clone();
        let mut interval = tokio::time::interval(refresh);
        tokio::spawn(async move {
            log::info!("Launched animator");
            loop {
                interval.tick().await;
                registry.tick();
            }
        });
    }

    // Dispatcher: route incoming note events.
    let (event_tx, event_rx) = mpsc::channel(midi::EVENT_CHANNEL_CAPACITY);
    tokio::spawn(Dispatcher::new(strip.clone(), registry.clone(), mapper.clone()).run(event_rx));

    // REST control surface for the mapping editor.
    {
        let state = webserver::AppState {
            mapper: mapper.clone(),
            led_count: config.led_count,
        };
        let ip = config.http_ip.clone();
        let port = config.http_port;
        tokio::spawn(async move {
            if let Err(e) = webserver::run(state, &ip, port).await {
                log::error!("Web server error: {:#}", e);
            }
        });
    }

    // DDP frame sender with a per-second throughput report.
    let connection = sender::connect(&config.ddp_endpoint)?;
    let update_count = Arc::new(AtomicU64::new(0));
    tokio::spawn(sender::run_frame_sender(
        connection,
        strip.clone(),
        refresh,
        update_count.clone(),
    ));
    tokio::spawn(sender::run_throughput_monitor(
        update_count,
        config.monitor_interval_secs,
    ));

    // MIDI ingress runs in the foreground; the process lives as long as
    // the listener does.
    midi::run_udp_listener(config.midi_port, event_tx).await
}
