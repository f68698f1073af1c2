// Config Module - Configuration management and command-line argument parsing
use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "MIDI-driven LED effect engine streaming RGB frames over DDP",
    long_about = "Listens for note events over UDP, maps them to LED effect presets and\n\
                  streams the composed frames to a WLED (or any DDP) controller.\n\
                  Presets are edited through the JSON mapping files and the REST API."
)]
pub struct Args {
    /// Total number of LEDs on the strip
    #[arg(short = 'L', long)]
    pub leds: Option<usize>,

    /// DDP controller address (host:port)
    #[arg(short, long)]
    pub ddp: Option<String>,

    /// UDP port for incoming MIDI note events
    #[arg(short = 'm', long)]
    pub midi_port: Option<u16>,

    /// HTTP API listen port
    #[arg(short = 'p', long)]
    pub http_port: Option<u16>,

    /// Directory holding the JSON mapping files
    #[arg(long)]
    pub mappings_dir: Option<PathBuf>,

    /// Mapping file to load at startup
    #[arg(long)]
    pub mapping: Option<String>,

    /// Animator/sender refresh period in milliseconds
    #[arg(short = 'r', long)]
    pub refresh_ms: Option<u64>,

    /// Config file path (JSON)
    #[arg(long)]
    pub cfg: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub led_count: usize,
    pub ddp_endpoint: String,
    pub refresh_interval_ms: u64,
    pub monitor_interval_secs: u64,
    pub midi_port: u16,
    pub http_ip: String,
    pub http_port: u16,
    pub mappings_dir: PathBuf,
    pub initial_mapping: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            led_count: 150,
            ddp_endpoint: "192.168.0.30:4048".to_string(),
            refresh_interval_ms: 20,
            monitor_interval_secs: 1,
            midi_port: 8090,
            http_ip: "0.0.0.0".to_string(),
            http_port: 8081,
            mappings_dir: PathBuf::from("./mappings"),
            initial_mapping: "uprising.json".to_string(),
        }
    }
}

impl Config {
    /// Resolve the effective configuration: defaults, then the optional
    /// config file, then CLI overrides.
    pub fn load(args: &Args) -> Result<Config> {
        let mut config = match &args.cfg {
            Some(path) => {
                let data = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                serde_json::from_str(&data)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => Config::default(),
        };

        if let Some(leds) = args.leds {
            config.led_count = leds;
        }
        if let Some(ddp) = &args.ddp {
            config.ddp_endpoint = ddp.clone();
        }
        if let Some(port) = args.midi_port {
            config.midi_port = port;
        }
        if let Some(port) = args.http_port {
            config.http_port = port;
        }
        if let Some(dir) = &args.mappings_dir {
            config.mappings_dir = dir.clone();
        }
        if let Some(mapping) = &args.mapping {
            config.initial_mapping = mapping.clone();
        }
        if let Some(refresh) = args.refresh_ms {
            config.refresh_interval_ms = refresh;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.led_count, 150);
        assert_eq!(config.refresh_interval_ms, 20);
        assert_eq!(config.midi_port, 8090);
        assert_eq!(config.http_port, 8081);
        assert_eq!(config.initial_mapping, "uprising.json");
    }

    #[test]
    fn test_cli_overrides() {
        let args = Args {
            leds: Some(300),
            ddp: Some("10.0.0.5:4048".to_string()),
            midi_port: None,
            http_port: Some(9000),
            mappings_dir: None,
            mapping: Some("other.json".to_string()),
            refresh_ms: Some(10),
            cfg: None,
        };
        let config = Config::load(&args).unwrap();
        assert_eq!(config.led_count, 300);
        assert_eq!(config.ddp_endpoint, "10.0.0.5:4048");
        assert_eq!(config.midi_port, 8090);
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.initial_mapping, "other.json");
        assert_eq!(config.refresh_interval_ms, 10);
    }

    #[test]
    fn test_partial_config_file_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{"led_count": 60}"#).unwrap();
        assert_eq!(config.led_count, 60);
        assert_eq!(config.midi_port, 8090);
    }
}
