use crate::cli::args::{Args, Command, ConfigArgs, ConfigCommand, ScanArgs, ShellArgs};
use crate::cli::output::{ConsoleWriter, OutputWriter};
use crate::core::bridge::{BridgeSettings, SessionBridge, SessionEnd};
use crate::core::connection::ConnectionManager;
use crate::core::profile::ServiceProfile;
use crate::core::selector::{named_devices, DeviceSelector};
use crate::core::transport::{Transport, WriteMode};
use crate::domain::config::{NusTermConfig, SessionConfig, SessionTimings};
use crate::domain::error::{NusTermError, NusTermResult};
use crate::infrastructure::ble::BleTransport;
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::terminal::CrosstermTerminal;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Shell options after merging CLI flags over configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOptions {
    pub device_name: Option<String>,
    pub device_log_level: String,
    pub write_mode: WriteMode,
    pub timings: SessionTimings,
}

impl ShellOptions {
    pub fn resolve(args: &ShellArgs, session: &SessionConfig) -> Self {
        Self {
            device_name: args.device_name.clone().or_else(|| session.device_name.clone()),
            device_log_level: args
                .log_level
                .clone()
                .unwrap_or_else(|| session.device_log_level.clone()),
            write_mode: WriteMode::from_ack_required(args.with_response || session.write_with_response),
            timings: session.timings(),
        }
    }
}

/// Execute CLI command
pub async fn execute_command(args: Args) -> NusTermResult<()> {
    let writer = ConsoleWriter::new(args.output.clone());

    let config_manager = ConfigManager::new()?;
    let config = if let Some(config_path) = &args.config {
        config_manager.load_config_from_path(config_path.as_ref())?
    } else {
        config_manager.load_config()?
    };

    if !args.quiet {
        init_logging(&config.global.log_level, args.verbose)?;
    }

    match args.command {
        None => run_shell(&args.shell, &config, &writer).await,
        Some(Command::Shell(shell_args)) => run_shell(&shell_args, &config, &writer).await,
        Some(Command::Scan(scan_args)) => run_scan(&scan_args, &config, &writer).await,
        Some(Command::Config(config_args)) => execute_config_command(config_args, &writer, &config, &config_manager),
        Some(Command::Version) => {
            writer.write_message(&format!("nusterm {}", env!("CARGO_PKG_VERSION")))?;
            Ok(())
        }
    }
}

async fn run_shell(args: &ShellArgs, config: &NusTermConfig, writer: &ConsoleWriter) -> NusTermResult<()> {
    let options = ShellOptions::resolve(args, &config.session);
    info!("Starting shell with {:?}", options);

    let transport = BleTransport::new().await?;
    let mut status = io::stdout();

    let device = {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        DeviceSelector::new(options.timings.scan_timeout)
            .select(&transport, options.device_name.as_deref(), &mut input, &mut status)
            .await?
    };

    let session = ConnectionManager::new(
        ServiceProfile::NORDIC_UART,
        options.timings.connect_timeout,
        options.timings.retry_delay,
    )
    .connect(&transport, &device, &mut status)
    .await?;

    let settings = BridgeSettings::new(options.device_log_level.clone(), options.write_mode, &options.timings);
    let mut terminal = CrosstermTerminal::new();
    let end = SessionBridge::new(&transport, settings)
        .run(session, &mut terminal, io::stdout(), &mut status)
        .await?;

    writer.write_message(&format!("\n\n{}", exit_message(end)))?;
    Ok(())
}

pub fn exit_message(end: SessionEnd) -> String {
    match end {
        SessionEnd::Interrupted => "Exiting".to_string(),
        SessionEnd::Disconnected => "Device disconnected".to_string(),
        SessionEnd::Terminated(signal) => format!("Terminated by {}", signal),
    }
}

async fn run_scan(args: &ScanArgs, config: &NusTermConfig, writer: &ConsoleWriter) -> NusTermResult<()> {
    let timeout = args
        .timeout_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.session.timings().scan_timeout);

    let transport = BleTransport::new().await?;
    eprint!("Scanning for BLE devices...");
    io::stderr().flush()?;
    let devices = transport.scan(timeout).await?;
    eprintln!();

    let devices = if args.all { devices } else { named_devices(devices) };
    if devices.is_empty() && !args.all {
        return Err(NusTermError::NoNamedDevices);
    }

    writer.write_devices(&devices)?;
    Ok(())
}

fn execute_config_command(
    args: ConfigArgs,
    writer: &ConsoleWriter,
    config: &NusTermConfig,
    config_manager: &ConfigManager,
) -> NusTermResult<()> {
    match args.command {
        ConfigCommand::Show => {
            writer.write_config(config)?;
            Ok(())
        }
        ConfigCommand::Validate { file } => {
            let candidate = match file {
                Some(path) => config_manager.load_config_from_path(path.as_ref())?,
                None => config.clone(),
            };

            let problems = candidate.session.validate();
            if problems.is_empty() {
                writer.write_message("Configuration is valid")?;
                Ok(())
            } else {
                Err(NusTermError::Config {
                    message: problems.join("; "),
                })
            }
        }
        ConfigCommand::Init { path, global } => {
            let target = match (path, global) {
                (Some(path), _) => PathBuf::from(path),
                (None, true) => config_manager.get_global_config_path_ref().clone(),
                (None, false) => ConfigManager::project_config_path_in(&std::env::current_dir()?),
            };

            config_manager.init_config(&target)?;
            writer.write_message(&format!("Configuration written to {}", target.display()))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bridge::ShutdownSignal;

    #[test]
    fn test_flags_override_config() {
        let session = SessionConfig {
            device_name: Some("Widget-A".to_string()),
            device_log_level: "wrn".to_string(),
            ..SessionConfig::default()
        };

        let from_config = ShellOptions::resolve(&ShellArgs::default(), &session);
        assert_eq!(from_config.device_name.as_deref(), Some("Widget-A"));
        assert_eq!(from_config.device_log_level, "wrn");
        assert_eq!(from_config.write_mode, WriteMode::WithoutResponse);

        let args = ShellArgs {
            device_name: Some("Widget-B".to_string()),
            log_level: Some("dbg".to_string()),
            with_response: true,
        };
        let from_flags = ShellOptions::resolve(&args, &session);
        assert_eq!(from_flags.device_name.as_deref(), Some("Widget-B"));
        assert_eq!(from_flags.device_log_level, "dbg");
        assert_eq!(from_flags.write_mode, WriteMode::WithResponse);
    }

    #[test]
    fn test_default_device_log_level_is_informational() {
        let options = ShellOptions::resolve(&ShellArgs::default(), &SessionConfig::default());
        assert_eq!(options.device_log_level, "inf");
        assert!(options.device_name.is_none());
    }

    #[test]
    fn test_exit_messages_distinguish_outcomes() {
        assert_eq!(exit_message(SessionEnd::Interrupted), "Exiting");
        assert_eq!(exit_message(SessionEnd::Disconnected), "Device disconnected");
        assert_eq!(
            exit_message(SessionEnd::Terminated(ShutdownSignal::Terminate)),
            "Terminated by SIGTERM"
        );
    }
}
