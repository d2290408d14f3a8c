pub mod ask;
pub mod config;
pub mod render;
pub mod replay;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// deepsearch: reconstruct agentic-search answers from their event stream.
#[derive(Debug, Parser)]
#[command(name = "deepsearch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay a recorded stream (raw SSE text or a JSON stream log).
    Replay {
        /// Path to the recording.
        path: PathBuf,
        /// Print the final message as JSON instead of a tree.
        #[arg(long)]
        json: bool,
        /// Feed the recording in chunks of this many bytes.
        #[arg(long, default_value_t = 4096)]
        chunk_size: usize,
    },
    /// Send a message to the answering service and stream the answer.
    Ask {
        /// The message to send.
        message: String,
        /// Chat session id.
        #[arg(long, default_value = "cli")]
        session: String,
        /// Id of the message this one replies to.
        #[arg(long)]
        parent: Option<i64>,
        /// Print the final message as JSON instead of streaming text.
        #[arg(long)]
        json: bool,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `DS_CONFIG` (or
/// `deepsearch.toml` by default).  Returns the parsed config and the path
/// that was used.  A missing file yields the defaults.
pub fn load_config() -> anyhow::Result<(ds_domain::config::Config, String)> {
    let config_path =
        std::env::var("DS_CONFIG").unwrap_or_else(|_| "deepsearch.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

pub fn load_config_from(config_path: &str) -> anyhow::Result<ds_domain::config::Config> {
    if !std::path::Path::new(config_path).exists() {
        return Ok(ds_domain::config::Config::default());
    }
    let raw = std::fs::read_to_string(config_path)
        .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))
}
