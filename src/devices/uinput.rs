use super::{Profile, SynthesizedDevice};
use crate::ffi::{self, UinputFfErase, UinputFfUpload};
use crate::report::Event;
use evdev::{
    AbsInfo, AbsoluteAxisType, AttributeSet, BusType, FFEffectType, InputId, Key, UinputAbsSetup,
    uinput::{VirtualDevice, VirtualDeviceBuilder},
};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

/// A uinput device built from a [`Profile`]. Reads and writes bypass evdev's
/// event helpers so relayed reports keep their original framing.
pub struct UinputDevice {
    device: VirtualDevice,
}

impl UinputDevice {
    pub fn create(profile: &Profile) -> io::Result<Self> {
        let mut keys = AttributeSet::<Key>::new();
        for &code in &profile.keys {
            keys.insert(Key::new(code));
        }

        let mut builder = VirtualDeviceBuilder::new()?
            .name(&profile.name)
            .input_id(InputId::new(
                BusType(profile.bustype),
                profile.vendor,
                profile.product,
                profile.version,
            ))
            .with_keys(&keys)?;

        for axis in &profile.axes {
            let info = AbsInfo::new(axis.value, axis.min, axis.max, axis.fuzz, axis.flat, axis.resolution);
            let setup = UinputAbsSetup::new(AbsoluteAxisType(axis.code), info);
            builder = builder.with_absolute_axis(&setup)?;
        }

        if !profile.ff.is_empty() {
            let mut ff = AttributeSet::<FFEffectType>::new();
            for &code in &profile.ff {
                ff.insert(FFEffectType(code));
            }
            builder = builder.with_ff(&ff)?.with_ff_effects_max(profile.ff_effects_max);
        }

        let device = builder.build()?;
        ffi::set_nonblocking(device.as_raw_fd())?;

        Ok(Self { device })
    }
}

impl AsRawFd for UinputDevice {
    fn as_raw_fd(&self) -> RawFd {
        self.device.as_raw_fd()
    }
}

impl SynthesizedDevice for UinputDevice {
    fn write_event(&mut self, event: Event) -> io::Result<()> {
        ffi::write_event(self.as_raw_fd(), event)
    }

    fn read_event(&mut self) -> io::Result<Option<Event>> {
        ffi::read_event(self.as_raw_fd())
    }

    fn begin_ff_upload(&mut self, request_id: u32) -> io::Result<UinputFfUpload> {
        ffi::begin_ff_upload(self.as_raw_fd(), request_id)
    }

    fn end_ff_upload(&mut self, upload: &UinputFfUpload) -> io::Result<()> {
        ffi::end_ff_upload(self.as_raw_fd(), upload)
    }

    fn begin_ff_erase(&mut self, request_id: u32) -> io::Result<UinputFfErase> {
        ffi::begin_ff_erase(self.as_raw_fd(), request_id)
    }

    fn end_ff_erase(&mut self, erase: &UinputFfErase) -> io::Result<()> {
        ffi::end_ff_erase(self.as_raw_fd(), erase)
    }
}
