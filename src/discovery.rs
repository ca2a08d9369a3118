use crate::error::{Error, Result};
use crate::ffi;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Add,
    Remove,
    Other,
}

/// What the orchestrator needs to know about a tagged input node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Kernel devpath, stable across the unit's lifetime.
    pub devpath: String,
    pub devnode: Option<PathBuf>,
    pub syspath: PathBuf,
}

impl DeviceInfo {
    pub fn from_udev(device: &udev::Device) -> Self {
        Self {
            devpath: device.devpath().to_string_lossy().into_owned(),
            devnode: device.devnode().map(|p| p.to_path_buf()),
            syspath: device.syspath().to_path_buf(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEvent {
    pub action: Action,
    pub device: DeviceInfo,
}

/// udev monitor filtered on the tag the joycond rules attach.
pub struct Discovery {
    tag: String,
    socket: udev::MonitorSocket,
}

impl Discovery {
    pub fn new(tag: &str) -> Result<Self> {
        let socket = udev::MonitorBuilder::new()
            .and_then(|builder| builder.match_tag(tag))
            .and_then(|builder| builder.listen())
            .map_err(Error::Discovery)?;
        ffi::set_nonblocking(socket.as_raw_fd()).map_err(Error::Discovery)?;

        Ok(Self {
            tag: tag.to_string(),
            socket,
        })
    }

    /// Devices already present, reported as additions.
    pub fn enumerate(&self) -> Result<Vec<DiscoveryEvent>> {
        let mut enumerator = udev::Enumerator::new().map_err(Error::Discovery)?;
        enumerator.match_tag(&self.tag).map_err(Error::Discovery)?;
        let devices = enumerator.scan_devices().map_err(Error::Discovery)?;

        Ok(devices
            .map(|device| DiscoveryEvent {
                action: Action::Add,
                device: DeviceInfo::from_udev(&device),
            })
            .collect())
    }

    /// Notifications received since the last call; never blocks.
    pub fn drain(&mut self) -> Vec<DiscoveryEvent> {
        self.socket
            .iter()
            .map(|event| {
                let action = match event.event_type() {
                    udev::EventType::Add => Action::Add,
                    udev::EventType::Remove => Action::Remove,
                    _ => Action::Other,
                };
                DiscoveryEvent {
                    action,
                    device: DeviceInfo::from_udev(&event.device()),
                }
            })
            .collect()
    }
}

impl AsRawFd for Discovery {
    fn as_raw_fd(&self) -> RawFd {
        self.socket.as_raw_fd()
    }
}
