use crate::cli::args::OutputFormat;
use crate::core::transport::DiscoveredDevice;
use crate::domain::config::NusTermConfig;
use serde::Serialize;
use std::io;
use tabled::{Table, Tabled};

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_devices(&self, devices: &[DiscoveredDevice]) -> Result<(), OutputError>;
    fn write_config(&self, config: &NusTermConfig) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
    fn write_error(&self, error: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("TOML serialization error: {0}")]
    TomlError(#[from] toml::ser::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for crate::domain::error::NusTermError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render device listing into a string
    pub fn render_devices(&self, devices: &[DiscoveredDevice]) -> Result<String, OutputError> {
        let rows: Vec<DeviceRow> = devices.iter().enumerate().map(DeviceRow::from).collect();

        let rendered = match self.format {
            OutputFormat::Text => {
                let mut text = format!("Found {} device(s):\n", rows.len());
                for row in &rows {
                    text.push_str(&format!("  {}. {} ({})\n", row.index, row.name, row.address));
                }
                text
            }
            OutputFormat::Json => serde_json::to_string_pretty(&rows)?,
            OutputFormat::Table => Table::new(rows).to_string(),
        };

        Ok(rendered)
    }

    /// Render a failure line for stderr
    pub fn render_error(&self, error: &str) -> String {
        match self.format {
            OutputFormat::Json => serde_json::json!({ "error": error }).to_string(),
            _ => format!("Error: {}", error),
        }
    }

    /// Render configuration into a string
    pub fn render_config(&self, config: &NusTermConfig) -> Result<String, OutputError> {
        let rendered = match self.format {
            OutputFormat::Text => toml::to_string_pretty(config)?,
            OutputFormat::Json => serde_json::to_string_pretty(config)?,
            OutputFormat::Table => Table::new(config_rows(config)).to_string(),
        };

        Ok(rendered)
    }
}

impl OutputWriter for ConsoleWriter {
    fn write_devices(&self, devices: &[DiscoveredDevice]) -> Result<(), OutputError> {
        println!("{}", self.render_devices(devices)?.trim_end());
        Ok(())
    }

    fn write_config(&self, config: &NusTermConfig) -> Result<(), OutputError> {
        println!("{}", self.render_config(config)?.trim_end());
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({ "message": message });
                println!("{}", output);
            }
            _ => println!("{}", message),
        }
        Ok(())
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        eprintln!("{}", self.render_error(error));
        Ok(())
    }
}

#[derive(Tabled, Serialize)]
struct DeviceRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
}

impl From<(usize, &DiscoveredDevice)> for DeviceRow {
    fn from((idx, device): (usize, &DiscoveredDevice)) -> Self {
        Self {
            index: idx + 1,
            name: device.display_name().to_string(),
            address: device.address.clone(),
        }
    }
}

#[derive(Tabled)]
struct ConfigRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn config_rows(config: &NusTermConfig) -> Vec<ConfigRow> {
    let session = &config.session;
    let row = |key: &str, value: String| ConfigRow {
        key: key.to_string(),
        value,
    };

    vec![
        row("global.log_level", config.global.log_level.clone()),
        row(
            "session.device_name",
            session.device_name.clone().unwrap_or_else(|| "-".to_string()),
        ),
        row("session.device_log_level", session.device_log_level.clone()),
        row("session.write_with_response", session.write_with_response.to_string()),
        row("session.scan_timeout_ms", session.scan_timeout_ms.to_string()),
        row("session.connect_timeout_ms", session.connect_timeout_ms.to_string()),
        row("session.retry_delay_ms", session.retry_delay_ms.to_string()),
        row("session.prompt_delay_ms", session.prompt_delay_ms.to_string()),
        row("session.log_delay_ms", session.log_delay_ms.to_string()),
        row("session.poll_interval_ms", session.poll_interval_ms.to_string()),
        row("session.link_check_interval_ms", session.link_check_interval_ms.to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn devices() -> Vec<DiscoveredDevice> {
        vec![
            DiscoveredDevice::new("addr1", Some("Widget-A")),
            DiscoveredDevice::new("addr2", None),
        ]
    }

    #[test]
    fn test_text_listing_is_one_based() {
        let rendered = ConsoleWriter::new(OutputFormat::Text).render_devices(&devices()).unwrap();
        assert!(rendered.starts_with("Found 2 device(s):"));
        assert!(rendered.contains("  1. Widget-A (addr1)"));
        assert!(rendered.contains("  2. <unnamed> (addr2)"));
    }

    #[test]
    fn test_json_listing() {
        let rendered = ConsoleWriter::new(OutputFormat::Json).render_devices(&devices()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value[0]["index"], 1);
        assert_eq!(value[0]["name"], "Widget-A");
        assert_eq!(value[1]["address"], "addr2");
    }

    #[test]
    fn test_table_listing_has_headers() {
        let rendered = ConsoleWriter::new(OutputFormat::Table).render_devices(&devices()).unwrap();
        assert!(rendered.contains("Name"));
        assert!(rendered.contains("Address"));
        assert!(rendered.contains("Widget-A"));
    }

    #[test]
    fn test_error_rendering_follows_format() {
        let text = ConsoleWriter::new(OutputFormat::Text).render_error("All 3 connection attempts failed");
        assert_eq!(text, "Error: All 3 connection attempts failed");

        let json = ConsoleWriter::new(OutputFormat::Json).render_error("adapter unavailable");
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["error"], "adapter unavailable");
    }

    #[test]
    fn test_config_rendering() {
        let config = NusTermConfig::default();

        let text = ConsoleWriter::new(OutputFormat::Text).render_config(&config).unwrap();
        assert!(text.contains("device_log_level = \"inf\""));

        let table = ConsoleWriter::new(OutputFormat::Table).render_config(&config).unwrap();
        assert!(table.contains("session.poll_interval_ms"));
    }
}
