use super::evdev_unit::EvdevUnit;
use super::uinput::UinputDevice;
use super::{DeviceBackend, Profile, SynthesizedDevice, UnitDevice};
use crate::discovery::DeviceInfo;
use std::io;

/// evdev units and uinput devices on the running kernel.
#[derive(Debug, Default)]
pub struct LinuxBackend;

impl DeviceBackend for LinuxBackend {
    fn open_unit(&mut self, info: &DeviceInfo) -> io::Result<Box<dyn UnitDevice>> {
        Ok(Box::new(EvdevUnit::open(info)?))
    }

    fn create_virtual(&mut self, profile: &Profile) -> io::Result<Box<dyn SynthesizedDevice>> {
        log::debug!("Creating virtual device \"{}\"", profile.name);
        Ok(Box::new(UinputDevice::create(profile)?))
    }
}
