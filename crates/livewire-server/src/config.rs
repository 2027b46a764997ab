use std::time::Duration;

use clap::Parser;
use livewire::prelude::WireFormat;
use tracing_subscriber::EnvFilter;

/// Livewire real-time relay
#[derive(Parser, Clone, Debug)]
#[command(name = "livewired", version, about = "Livewire real-time relay")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "LIVEWIRE_BIND", default_value = livewire::DEFAULT_BIND)]
    pub bind: String,

    /// Wire format for inbound messages: "json" or "protobuf"
    #[arg(long, env = "LIVEWIRE_FORMAT", default_value = "json")]
    pub format: WireFormat,

    /// Seconds to wait for open connections on shutdown
    #[arg(long, env = "LIVEWIRE_DRAIN_TIMEOUT_SECS", default_value_t = 5)]
    pub drain_timeout_secs: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "LIVEWIRE_LOG", default_value = "debug")]
    pub log_filter: String,
}

impl Config {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    /// `RUST_LOG` wins over `--log-filter`.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_filter))
    }
}
