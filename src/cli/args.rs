use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Command line arguments for NusTerm
#[derive(Parser, Debug)]
#[command(
    name = "nusterm",
    version = env!("CARGO_PKG_VERSION"),
    about = "BLE Shell - Connect to Nordic UART Service devices",
    long_about = "Interactive shell for embedded devices exposing a Nordic UART Service. Keystrokes are streamed to the device and its output is streamed back until Ctrl+C."
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Output format for listings
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Shell options used when no subcommand is given
    #[command(flatten)]
    pub shell: ShellArgs,

    /// Command to execute (defaults to the interactive shell)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a device and open an interactive shell
    Shell(ShellArgs),
    /// List nearby BLE devices
    Scan(ScanArgs),
    /// Configuration management commands
    Config(ConfigArgs),
    /// Display version information
    Version,
}

/// Interactive shell arguments
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ShellArgs {
    /// Device name to auto-connect (optional)
    #[arg(short, long)]
    pub device_name: Option<String>,

    /// Log level to enable on the device (default: inf)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Use acknowledged writes instead of write-without-response
    #[arg(long)]
    pub with_response: bool,
}

/// Device scan arguments
#[derive(ClapArgs, Debug, Clone)]
pub struct ScanArgs {
    /// Scan duration in milliseconds
    #[arg(short, long)]
    pub timeout_ms: Option<u64>,

    /// Include devices without an advertised name
    #[arg(short, long)]
    pub all: bool,
}

/// Configuration management arguments
#[derive(ClapArgs, Debug)]
pub struct ConfigArgs {
    /// Configuration subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Configuration management subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show effective configuration
    Show,
    /// Validate configuration
    Validate {
        /// Configuration file path
        file: Option<String>,
    },
    /// Create default configuration
    Init {
        /// Output file path
        #[arg(short, long)]
        path: Option<String>,
        /// Global configuration
        #[arg(short, long)]
        global: bool,
    },
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
    /// Table output
    Table,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Table => write!(f, "table"),
        }
    }
}
