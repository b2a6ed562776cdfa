use crate::core::profile::{ServiceProfile, MAX_CONNECTION_ATTEMPTS};
use crate::core::transport::{CharacteristicInfo, ConnectError, DiscoveredDevice, Transport};
use crate::domain::error::{NusTermError, NusTermResult};
use std::io::Write;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A connected device bound to its resolved NUS characteristics
pub struct Session<T: Transport + ?Sized> {
    pub device: DiscoveredDevice,
    pub handle: T::Handle,
    /// Host -> device
    pub write_characteristic: T::Characteristic,
    /// Device -> host
    pub notify_characteristic: T::Characteristic,
}

/// Connection state machine: `Attempting(n) -> Connected | Attempting(n + 1) | Failed`
pub enum ConnectState<S> {
    Attempting(u32),
    Connected(S),
    Failed { attempts: u32, last: ConnectError },
}

/// Bounded-retry connection to one chosen device
pub struct ConnectionManager {
    profile: ServiceProfile,
    connect_timeout: Duration,
    retry_delay: Duration,
}

impl ConnectionManager {
    pub fn new(profile: ServiceProfile, connect_timeout: Duration, retry_delay: Duration) -> Self {
        Self {
            profile,
            connect_timeout,
            retry_delay,
        }
    }

    /// Connect and resolve the service, retrying transient faults up to
    /// [`MAX_CONNECTION_ATTEMPTS`] times against the same device identity.
    pub async fn connect<T, W>(
        &self,
        transport: &T,
        device: &DiscoveredDevice,
        output: &mut W,
    ) -> NusTermResult<Session<T>>
    where
        T: Transport + ?Sized,
        W: Write,
    {
        writeln!(output, "Found {}, connecting...", device)?;

        let mut state = ConnectState::Attempting(1);
        loop {
            state = match state {
                ConnectState::Attempting(attempt) => self.attempt(transport, device, attempt, output).await?,
                ConnectState::Connected(session) => return Ok(session),
                ConnectState::Failed { attempts, last } => {
                    writeln!(output, "All connection attempts failed")?;
                    return Err(NusTermError::ConnectionExhausted { attempts, last });
                }
            };
        }
    }

    async fn attempt<T, W>(
        &self,
        transport: &T,
        device: &DiscoveredDevice,
        attempt: u32,
        output: &mut W,
    ) -> NusTermResult<ConnectState<Session<T>>>
    where
        T: Transport + ?Sized,
        W: Write,
    {
        debug!("Connection attempt {}/{} to {}", attempt, MAX_CONNECTION_ATTEMPTS, device.address);

        let handle = match transport.connect(&device.id, self.connect_timeout).await {
            Ok(handle) => handle,
            Err(e) => return self.after_failure(attempt, e, output).await,
        };
        writeln!(output, "Connected")?;

        let characteristics = match transport.characteristics(&handle).await {
            Ok(characteristics) => characteristics,
            Err(e) => {
                disconnect_quietly(transport, &handle).await;
                let fault = ConnectError::Refused(format!("service discovery failed: {}", e));
                return self.after_failure(attempt, fault, output).await;
            }
        };
        writeln!(output, "Services discovered")?;

        match resolve_characteristics(&self.profile, characteristics) {
            Ok((write_characteristic, notify_characteristic)) => {
                info!("Connected to {} on attempt {}", device, attempt);
                Ok(ConnectState::Connected(Session {
                    device: device.clone(),
                    handle,
                    write_characteristic,
                    notify_characteristic,
                }))
            }
            Err(missing) => {
                // Device lacks the service: retrying cannot help.
                disconnect_quietly(transport, &handle).await;
                Err(NusTermError::MissingCharacteristics { missing })
            }
        }
    }

    async fn after_failure<S, W: Write>(
        &self,
        attempt: u32,
        error: ConnectError,
        output: &mut W,
    ) -> NusTermResult<ConnectState<S>> {
        writeln!(output, "Connection attempt {} failed: {}", attempt, error)?;
        warn!("Connection attempt {} failed: {}", attempt, error);

        if !error.is_retryable() {
            return Err(NusTermError::Connect(error));
        }
        if attempt >= MAX_CONNECTION_ATTEMPTS {
            return Ok(ConnectState::Failed {
                attempts: attempt,
                last: error,
            });
        }

        writeln!(output, "Retrying in {} seconds...", self.retry_delay.as_secs_f32())?;
        tokio::time::sleep(self.retry_delay).await;
        Ok(ConnectState::Attempting(attempt + 1))
    }
}

/// Find the write and notify characteristics among all enumerated ones.
/// On failure, names whichever are missing.
pub fn resolve_characteristics<C>(
    profile: &ServiceProfile,
    characteristics: Vec<CharacteristicInfo<C>>,
) -> Result<(C, C), String> {
    let mut write = None;
    let mut notify = None;

    for info in characteristics {
        if write.is_none() && info.uuid == profile.write {
            write = Some(info.characteristic);
        } else if notify.is_none() && info.uuid == profile.notify {
            notify = Some(info.characteristic);
        }
    }

    match (write, notify) {
        (Some(write), Some(notify)) => Ok((write, notify)),
        (write, notify) => {
            let mut missing = Vec::new();
            if write.is_none() {
                missing.push(format!("write characteristic {}", profile.write));
            }
            if notify.is_none() {
                missing.push(format!("notify characteristic {}", profile.notify));
            }
            Err(missing.join(" and "))
        }
    }
}

async fn disconnect_quietly<T: Transport + ?Sized>(transport: &T, handle: &T::Handle) {
    if let Err(e) = transport.disconnect(handle).await {
        debug!("Disconnect after failed setup: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn info(uuid: Uuid, tag: &'static str) -> CharacteristicInfo<&'static str> {
        CharacteristicInfo {
            service: ServiceProfile::NORDIC_UART.service,
            uuid,
            characteristic: tag,
        }
    }

    #[test]
    fn test_resolves_both_characteristics() {
        let profile = ServiceProfile::NORDIC_UART;
        let found = resolve_characteristics(
            &profile,
            vec![
                info(Uuid::from_u128(0x2a00), "device-name"),
                info(profile.notify, "tx"),
                info(profile.write, "rx"),
            ],
        )
        .unwrap();
        assert_eq!(found, ("rx", "tx"));
    }

    #[test]
    fn test_reports_missing_write_characteristic() {
        let profile = ServiceProfile::NORDIC_UART;
        let missing = resolve_characteristics(&profile, vec![info(profile.notify, "tx")]).unwrap_err();
        assert!(missing.contains("write characteristic"));
        assert!(!missing.contains("notify characteristic"));
    }

    #[test]
    fn test_reports_both_missing() {
        let missing =
            resolve_characteristics::<&str>(&ServiceProfile::NORDIC_UART, Vec::new()).unwrap_err();
        assert!(missing.contains("write characteristic"));
        assert!(missing.contains("notify characteristic"));
    }
}
