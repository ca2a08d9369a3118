//! Hardware seam: physical units in, synthesized devices out.

pub mod combined_layout;
pub mod evdev_unit;
pub mod linux;
pub mod mock;
pub mod uinput;

use crate::discovery::DeviceInfo;
use crate::ffi::{FfEffect, UinputFfErase, UinputFfUpload};
use crate::pairing::Model;
use crate::report::{Event, Report};
use std::io;
use std::os::unix::io::AsRawFd;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisSetup {
    pub code: u16,
    pub value: i32,
    pub min: i32,
    pub max: i32,
    pub fuzz: i32,
    pub flat: i32,
    pub resolution: i32,
}

impl AxisSetup {
    pub fn new(code: u16, min: i32, max: i32, fuzz: i32, flat: i32) -> Self {
        Self {
            code,
            value: 0,
            min,
            max,
            fuzz,
            flat,
            resolution: 0,
        }
    }
}

/// Everything needed to declare a virtual device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub bustype: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
    pub keys: Vec<u16>,
    pub axes: Vec<AxisSetup>,
    pub ff: Vec<u16>,
    pub ff_effects_max: u32,
}

impl Profile {
    pub fn model(&self) -> Model {
        Model::from_ids(self.vendor, self.product)
    }
}

/// One opened hardware unit.
pub trait UnitDevice: AsRawFd {
    /// Identity and capabilities, used both for classification and to mirror
    /// the unit as a virtual device.
    fn profile(&self) -> &Profile;

    /// Next pending report, `Ok(None)` when drained.
    fn next_report(&mut self) -> io::Result<Option<Report>>;

    fn grab(&mut self) -> io::Result<()>;

    fn set_player_led(&mut self, index: usize, on: bool) -> io::Result<()>;

    /// Installs `effect`; the kernel-assigned id is written back into it.
    fn upload_effect(&mut self, effect: &mut FfEffect) -> io::Result<()>;

    fn erase_effect(&mut self, id: i16) -> io::Result<()>;

    fn write_event(&mut self, event: Event) -> io::Result<()>;
}

/// A uinput device and its force-feedback handshake.
pub trait SynthesizedDevice: AsRawFd {
    fn write_event(&mut self, event: Event) -> io::Result<()>;

    fn read_event(&mut self) -> io::Result<Option<Event>>;

    fn begin_ff_upload(&mut self, request_id: u32) -> io::Result<UinputFfUpload>;

    fn end_ff_upload(&mut self, upload: &UinputFfUpload) -> io::Result<()>;

    fn begin_ff_erase(&mut self, request_id: u32) -> io::Result<UinputFfErase>;

    fn end_ff_erase(&mut self, erase: &UinputFfErase) -> io::Result<()>;
}

pub trait DeviceBackend {
    fn open_unit(&mut self, info: &DeviceInfo) -> io::Result<Box<dyn UnitDevice>>;

    fn create_virtual(&mut self, profile: &Profile) -> io::Result<Box<dyn SynthesizedDevice>>;
}
