use std::path::PathBuf;

use clap::Parser;

/// Replay recorded market data through the breakout evaluation engine.
#[derive(Parser, Debug)]
#[command(name = "breakout-engine")]
pub struct Cli {
    /// Engine configuration file (YAML). Built-in defaults when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// SQLite database URL for the signal store.
    #[arg(long, default_value = "sqlite://signals.db?mode=rwc")]
    pub db: String,

    /// JSON file holding an array of plan admission payloads.
    #[arg(long)]
    pub plans: PathBuf,

    /// JSONL feed: one `{instrument_id, channel, payload}` object per
    /// line, `channel` being `candles` or `books`.
    #[arg(long)]
    pub feed: PathBuf,

    /// POST every emitted signal to this webhook URL.
    #[arg(long)]
    pub webhook: Option<String>,

    /// Append emitted signals to this file as JSON lines.
    #[arg(long)]
    pub out_file: Option<PathBuf>,

    /// Print emitted signals to stdout.
    #[arg(long)]
    pub stdout: bool,
}
