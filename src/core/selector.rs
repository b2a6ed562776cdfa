use crate::core::transport::{DiscoveredDevice, Transport};
use crate::domain::error::{NusTermError, NusTermResult};
use std::io::{BufRead, Write};
use std::time::Duration;
use tracing::{debug, info};

/// Turns one scan pass plus an optional name hint into a single device
pub struct DeviceSelector {
    scan_timeout: Duration,
}

impl DeviceSelector {
    pub fn new(scan_timeout: Duration) -> Self {
        Self { scan_timeout }
    }

    /// Scan once and pick a device, prompting on `input` when the target
    /// name is absent or not found.
    pub async fn select<T, R, W>(
        &self,
        transport: &T,
        target: Option<&str>,
        input: &mut R,
        output: &mut W,
    ) -> NusTermResult<DiscoveredDevice>
    where
        T: Transport + ?Sized,
        R: BufRead,
        W: Write,
    {
        match target {
            Some(name) => writeln!(output, "Scanning for '{}'...", name)?,
            None => writeln!(output, "Scanning for BLE devices...")?,
        }

        let devices = transport.scan(self.scan_timeout).await?;
        info!("Scan finished with {} device(s)", devices.len());

        choose_device(devices, target, input, output)
    }
}

/// Selection over an existing scan result set. Never rescans.
pub fn choose_device<R, W>(
    devices: Vec<DiscoveredDevice>,
    target: Option<&str>,
    input: &mut R,
    output: &mut W,
) -> NusTermResult<DiscoveredDevice>
where
    R: BufRead,
    W: Write,
{
    if let Some(name) = target {
        if let Some(device) = devices.iter().find(|d| d.name.as_deref() == Some(name)) {
            debug!("Target '{}' matched {}", name, device.address);
            return Ok(device.clone());
        }
        writeln!(output, "Device '{}' not found\n", name)?;
    }

    let mut named = named_devices(devices);
    if named.is_empty() {
        return Err(NusTermError::NoNamedDevices);
    }

    writeln!(output, "Found {} device(s):\n", named.len())?;
    for (idx, device) in named.iter().enumerate() {
        writeln!(output, "  {}. {}", idx + 1, device)?;
    }
    write!(output, "\nEnter device number to connect: ")?;
    output.flush()?;

    let mut line = Vec::new();
    if input.read_until(b'\n', &mut line)? == 0 {
        return Err(NusTermError::InvalidInput);
    }

    let index = parse_selection(&String::from_utf8_lossy(&line), named.len())?;
    Ok(named.swap_remove(index - 1))
}

/// Anonymous devices cannot be told apart, so they are never offered.
/// Discovery order is preserved.
pub fn named_devices(devices: Vec<DiscoveredDevice>) -> Vec<DiscoveredDevice> {
    devices.into_iter().filter(|d| d.name.is_some()).collect()
}

/// Parse a 1-based selection within `1..=count`
pub fn parse_selection(line: &str, count: usize) -> NusTermResult<usize> {
    let choice = line.trim();
    match choice.parse::<usize>() {
        Ok(index) if (1..=count).contains(&index) => Ok(index),
        _ => Err(NusTermError::InvalidSelection(choice.to_string())),
    }
}
