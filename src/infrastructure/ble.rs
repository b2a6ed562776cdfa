use crate::core::transport::{
    CharacteristicInfo, ConnectError, DiscoveredDevice, NotificationHandler, Transport, TransportError,
    TransportResult, WriteMode,
};
use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::{future, Stream, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// BLE transport backed by the first system Bluetooth adapter
pub struct BleTransport {
    adapter: Adapter,
    /// Peripherals from the last scan, keyed by `DiscoveredDevice::id`
    discovered: Mutex<HashMap<String, Peripheral>>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl BleTransport {
    pub async fn new() -> TransportResult<Self> {
        let manager = Manager::new()
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| TransportError::Unavailable(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::Unavailable("no Bluetooth adapter found".to_string()))?;

        match adapter.adapter_info().await {
            Ok(adapter_info) => info!("Using Bluetooth adapter {}", adapter_info),
            Err(e) => debug!("Adapter info unavailable: {}", e),
        }

        Ok(Self {
            adapter,
            discovered: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Transport for BleTransport {
    type Handle = Peripheral;
    type Characteristic = Characteristic;

    async fn scan(&self, timeout: Duration) -> TransportResult<Vec<DiscoveredDevice>> {
        // Subscribe first so no advertisement in the window is missed.
        let events = self
            .adapter
            .events()
            .await
            .map_err(|e| TransportError::operation("scan", e))?;
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| TransportError::operation("scan", e))?;

        let seen = first_sightings(events.filter_map(|event| future::ready(sighted_id(event))), timeout).await;
        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }

        let mut peripherals = Vec::with_capacity(seen.len());
        for id in seen {
            match self.adapter.peripheral(&id).await {
                Ok(peripheral) => peripherals.push(peripheral),
                Err(e) => debug!("Sighted peripheral {:?} is gone: {}", id, e),
            }
        }

        let mut discovered = self.discovered.lock().await;
        discovered.clear();

        let mut devices = Vec::with_capacity(peripherals.len());
        for peripheral in peripherals {
            let properties = match peripheral.properties().await {
                Ok(properties) => properties,
                Err(e) => {
                    debug!("Skipping peripheral without properties: {}", e);
                    continue;
                }
            };

            let id = format!("{:?}", peripheral.id());
            let (address, name) = match properties {
                Some(properties) => (properties.address.to_string(), properties.local_name),
                None => (peripheral.address().to_string(), None),
            };
            debug!("Discovered {} {:?}", address, name);

            devices.push(DiscoveredDevice {
                id: id.clone(),
                address,
                name,
            });
            discovered.insert(id, peripheral);
        }

        Ok(devices)
    }

    async fn connect(&self, device_id: &str, timeout: Duration) -> Result<Peripheral, ConnectError> {
        let peripheral = self
            .discovered
            .lock()
            .await
            .get(device_id)
            .cloned()
            .ok_or_else(|| ConnectError::UnknownDevice(device_id.to_string()))?;

        establish(&peripheral, timeout).await?;
        Ok(peripheral)
    }

    async fn characteristics(&self, handle: &Peripheral) -> TransportResult<Vec<CharacteristicInfo<Characteristic>>> {
        let characteristics = handle
            .services()
            .into_iter()
            .flat_map(|service| {
                let service_uuid = service.uuid;
                service.characteristics.into_iter().map(move |characteristic| CharacteristicInfo {
                    service: service_uuid,
                    uuid: characteristic.uuid,
                    characteristic,
                })
            })
            .collect();

        Ok(characteristics)
    }

    async fn write(
        &self,
        handle: &Peripheral,
        characteristic: &Characteristic,
        data: &[u8],
        mode: WriteMode,
    ) -> TransportResult<()> {
        handle
            .write(characteristic, data, write_type(mode))
            .await
            .map_err(|e| match e {
                btleplug::Error::NotConnected => TransportError::NotConnected,
                other => TransportError::operation("write", other),
            })
    }

    async fn subscribe(
        &self,
        handle: &Peripheral,
        characteristic: &Characteristic,
        on_data: NotificationHandler,
    ) -> TransportResult<()> {
        handle
            .subscribe(characteristic)
            .await
            .map_err(|e| TransportError::operation("subscribe", e))?;
        let mut notifications = handle
            .notifications()
            .await
            .map_err(|e| TransportError::operation("subscribe", e))?;

        let uuid = characteristic.uuid;
        let mut on_data = on_data;
        let listener = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                if notification.uuid == uuid {
                    on_data(&notification.value);
                }
            }
            debug!("Notification stream for {} closed", uuid);
        });
        self.listeners.lock().await.push(listener);

        Ok(())
    }

    async fn is_connected(&self, handle: &Peripheral) -> bool {
        handle.is_connected().await.unwrap_or(false)
    }

    async fn disconnect(&self, handle: &Peripheral) -> TransportResult<()> {
        for listener in self.listeners.lock().await.drain(..) {
            listener.abort();
        }
        handle
            .disconnect()
            .await
            .map_err(|e| TransportError::operation("disconnect", e))
    }
}

fn sighted_id(event: CentralEvent) -> Option<PeripheralId> {
    match event {
        CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => Some(id),
        _ => None,
    }
}

/// Distinct ids seen on `sightings` within `window`, in first-seen order.
/// Devices the adapter merely remembers never show up here.
async fn first_sightings<I, S>(sightings: S, window: Duration) -> Vec<I>
where
    I: PartialEq,
    S: Stream<Item = I>,
{
    tokio::pin!(sightings);
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);

    let mut seen = Vec::new();
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            sighting = sightings.next() => match sighting {
                Some(id) => {
                    if !seen.contains(&id) {
                        seen.push(id);
                    }
                }
                None => {
                    (&mut deadline).await;
                    break;
                }
            },
        }
    }
    seen
}

/// Link setup steps of a peripheral
#[async_trait]
trait PeripheralLink: Send + Sync {
    async fn open(&self) -> btleplug::Result<()>;
    async fn discover(&self) -> btleplug::Result<()>;
    async fn close(&self) -> btleplug::Result<()>;
}

#[async_trait]
impl PeripheralLink for Peripheral {
    async fn open(&self) -> btleplug::Result<()> {
        self.connect().await
    }

    async fn discover(&self) -> btleplug::Result<()> {
        self.discover_services().await
    }

    async fn close(&self) -> btleplug::Result<()> {
        self.disconnect().await
    }
}

/// Connect and discover services within `timeout`. A link that came up
/// is closed again if the rest of the setup fails or times out.
async fn establish<L: PeripheralLink + ?Sized>(link: &L, timeout: Duration) -> Result<(), ConnectError> {
    let linked = AtomicBool::new(false);
    let setup = async {
        link.open().await?;
        linked.store(true, Ordering::SeqCst);
        link.discover().await
    };

    let error = match tokio::time::timeout(timeout, setup).await {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(e)) => connect_error(e),
        Err(_) => ConnectError::Timeout(timeout),
    };

    if linked.load(Ordering::SeqCst) {
        if let Err(e) = link.close().await {
            debug!("Cleanup after failed connect: {}", e);
        }
    }
    Err(error)
}

fn write_type(mode: WriteMode) -> WriteType {
    match mode {
        WriteMode::WithResponse => WriteType::WithResponse,
        WriteMode::WithoutResponse => WriteType::WithoutResponse,
    }
}

fn connect_error(error: btleplug::Error) -> ConnectError {
    match error {
        btleplug::Error::TimedOut(after) => ConnectError::Timeout(after),
        btleplug::Error::DeviceNotFound => ConnectError::UnknownDevice("device no longer known to adapter".to_string()),
        btleplug::Error::PermissionDenied => ConnectError::Unavailable("permission denied".to_string()),
        btleplug::Error::NotSupported(what) => ConnectError::Unavailable(what),
        other => ConnectError::Refused(other.to_string()),
    }
}
