//! Server configuration: environment variables with documented defaults,
//! plus an optional CLI override for the bind address.

use clap::Parser;
use std::env;

/// CLI override for the HTTP/WebSocket bind address. Every other setting
/// comes from the environment (see [`Config::from_env`]) since it mirrors
/// the original service's environment-driven configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Cooperative platformer room server")]
pub struct Args {
    /// Address to bind the HTTP/WebSocket listener to.
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind the HTTP/WebSocket listener to. Overrides `PORT`.
    #[arg(short, long)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Development,
    Production,
}

/// Runtime configuration, loaded once at startup from the environment
/// (spec.md §6). Every field has a documented default, so loading never
/// fails: a malformed value is logged and the default is substituted.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub mode: Mode,
    pub allowed_origins: Vec<String>,
    pub disconnect_grace_ms: u64,
    pub tick_rate: u32,
    pub respawn_delay_ms: u64,
    pub world2_base_y: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4000,
            mode: Mode::Development,
            allowed_origins: Vec::new(),
            disconnect_grace_ms: 15_000,
            tick_rate: 60,
            respawn_delay_ms: 1_800,
            world2_base_y: 820,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("invalid value for {key}={raw:?}, using default");
            default
        }),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();

        let mode = match env::var("NODE_ENV").as_deref() {
            Ok("production") => Mode::Production,
            _ => Mode::Development,
        };

        let allowed_origins = env::var("CLIENT_URL")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        Self {
            port: parse_env("PORT", defaults.port),
            mode,
            allowed_origins,
            disconnect_grace_ms: parse_env("DISCONNECT_GRACE_MS", defaults.disconnect_grace_ms),
            tick_rate: parse_env("TICK_RATE", defaults.tick_rate),
            respawn_delay_ms: parse_env("RESPAWN_DELAY_MS", defaults.respawn_delay_ms),
            world2_base_y: parse_env("WORLD2_BASE_Y", defaults.world2_base_y),
        }
    }

    /// Milliseconds between ticks, floored at 10ms (spec.md §4.7).
    pub fn tick_interval_ms(&self) -> u64 {
        (1000 / self.tick_rate.max(1) as u64).max(10)
    }

    pub fn apply_cli_override(&mut self, args: &Args) {
        if let Some(port) = args.port {
            self.port = port;
        }
    }
}
