//! Raw kernel structs and ioctls for evdev/uinput force feedback.
//!
//! Layouts follow `linux/input.h` and `linux/uinput.h` on 64-bit targets; the
//! const assertions below keep them honest.

use crate::report::Event;
use bytemuck::{Pod, Zeroable};
use std::io;
use std::mem::size_of;
use std::os::unix::io::RawFd;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct RawInputEvent {
    pub sec: i64,
    pub usec: i64,
    pub type_: u16,
    pub code: u16,
    pub value: i32,
}

impl From<Event> for RawInputEvent {
    fn from(event: Event) -> Self {
        Self {
            type_: event.type_,
            code: event.code,
            value: event.value,
            ..Default::default()
        }
    }
}

impl From<RawInputEvent> for Event {
    fn from(raw: RawInputEvent) -> Self {
        Event::new(raw.type_, raw.code, raw.value)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct FfTrigger {
    pub button: u16,
    pub interval: u16,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct FfReplay {
    pub length: u16,
    pub delay: u16,
}

/// `struct ff_effect`. The effect-specific union is kept opaque: effects are
/// only ever copied from the virtual device to the physical ones.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct FfEffect {
    pub type_: u16,
    pub id: i16,
    pub direction: u16,
    pub trigger: FfTrigger,
    pub replay: FfReplay,
    _pad: u16,
    pub u: [u64; 4],
}

impl FfEffect {
    /// A rumble effect, mostly useful for tests.
    pub fn rumble(strong: u16, weak: u16, length: u16) -> Self {
        let mut effect = Self {
            type_: crate::protocol::FF_RUMBLE,
            id: -1,
            replay: FfReplay { length, delay: 0 },
            ..Default::default()
        };
        effect.u[0] = strong as u64 | (weak as u64) << 16;
        effect
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct UinputFfUpload {
    pub request_id: u32,
    pub retval: i32,
    pub effect: FfEffect,
    pub old: FfEffect,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct UinputFfErase {
    pub request_id: u32,
    pub retval: i32,
    pub effect_id: u32,
}

const _: () = assert!(size_of::<RawInputEvent>() == size_of::<libc::input_event>());
const _: () = assert!(size_of::<FfEffect>() == 48);
const _: () = assert!(size_of::<UinputFfUpload>() == 104);
const _: () = assert!(size_of::<UinputFfErase>() == 12);

const IOC_WRITE: u64 = 1;
const IOC_READ: u64 = 2;

const fn ioc(dir: u64, ty: u8, nr: u8, size: usize) -> u64 {
    (dir << 30) | ((size as u64) << 16) | ((ty as u64) << 8) | nr as u64
}

pub const EVIOCSFF: u64 = ioc(IOC_WRITE, b'E', 0x80, size_of::<FfEffect>());
pub const EVIOCRMFF: u64 = ioc(IOC_WRITE, b'E', 0x81, size_of::<libc::c_int>());
pub const UI_BEGIN_FF_UPLOAD: u64 = ioc(IOC_READ | IOC_WRITE, b'U', 200, size_of::<UinputFfUpload>());
pub const UI_END_FF_UPLOAD: u64 = ioc(IOC_WRITE, b'U', 201, size_of::<UinputFfUpload>());
pub const UI_BEGIN_FF_ERASE: u64 = ioc(IOC_READ | IOC_WRITE, b'U', 202, size_of::<UinputFfErase>());
pub const UI_END_FF_ERASE: u64 = ioc(IOC_WRITE, b'U', 203, size_of::<UinputFfErase>());

fn check(ret: libc::c_int) -> io::Result<()> {
    if ret < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

pub fn set_nonblocking(fd: RawFd) -> io::Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        check(libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK))
    }
}

/// Reads one event from a non-blocking fd. `Ok(None)` once drained.
pub fn read_event(fd: RawFd) -> io::Result<Option<Event>> {
    let mut buf = [0u8; size_of::<RawInputEvent>()];
    let ret = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
    if ret < 0 {
        let err = io::Error::last_os_error();
        return match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted => Ok(None),
            _ => Err(err),
        };
    }
    match ret as usize {
        0 => Ok(None),
        n if n == buf.len() => Ok(Some(bytemuck::pod_read_unaligned::<RawInputEvent>(&buf).into())),
        n => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("short input_event read of {n} bytes"),
        )),
    }
}

pub fn write_event(fd: RawFd, event: Event) -> io::Result<()> {
    let raw = RawInputEvent::from(event);
    let bytes = bytemuck::bytes_of(&raw);
    let ret = unsafe { libc::write(fd, bytes.as_ptr() as *const libc::c_void, bytes.len()) };
    if ret < 0 {
        return Err(io::Error::last_os_error());
    }
    if ret as usize != bytes.len() {
        return Err(io::Error::new(io::ErrorKind::WriteZero, "short input_event write"));
    }
    Ok(())
}

/// EVIOCSFF. The kernel writes the assigned id back into `effect.id`.
pub fn upload_effect(fd: RawFd, effect: &mut FfEffect) -> io::Result<()> {
    check(unsafe { libc::ioctl(fd, EVIOCSFF as _, effect as *mut FfEffect) })
}

pub fn erase_effect(fd: RawFd, id: i16) -> io::Result<()> {
    check(unsafe { libc::ioctl(fd, EVIOCRMFF as _, id as libc::c_int) })
}

pub fn begin_ff_upload(fd: RawFd, request_id: u32) -> io::Result<UinputFfUpload> {
    let mut upload = UinputFfUpload {
        request_id,
        ..Zeroable::zeroed()
    };
    check(unsafe { libc::ioctl(fd, UI_BEGIN_FF_UPLOAD as _, &mut upload as *mut UinputFfUpload) })?;
    Ok(upload)
}

pub fn end_ff_upload(fd: RawFd, upload: &UinputFfUpload) -> io::Result<()> {
    check(unsafe { libc::ioctl(fd, UI_END_FF_UPLOAD as _, upload as *const UinputFfUpload) })
}

pub fn begin_ff_erase(fd: RawFd, request_id: u32) -> io::Result<UinputFfErase> {
    let mut erase = UinputFfErase {
        request_id,
        ..Zeroable::zeroed()
    };
    check(unsafe { libc::ioctl(fd, UI_BEGIN_FF_ERASE as _, &mut erase as *mut UinputFfErase) })?;
    Ok(erase)
}

pub fn end_ff_erase(fd: RawFd, erase: &UinputFfErase) -> io::Result<()> {
    check(unsafe { libc::ioctl(fd, UI_END_FF_ERASE as _, erase as *const UinputFfErase) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{EV_FF, EV_KEY};
    use std::os::unix::io::AsRawFd;
    use std::os::unix::net::UnixStream;

    #[test]
    fn ioctl_numbers_match_kernel_headers() {
        assert_eq!(EVIOCSFF, 0x4030_4580);
        assert_eq!(EVIOCRMFF, 0x4004_4581);
        assert_eq!(UI_BEGIN_FF_UPLOAD, 0xC068_55C8);
        assert_eq!(UI_END_FF_UPLOAD, 0x4068_55C9);
        assert_eq!(UI_BEGIN_FF_ERASE, 0xC00C_55CA);
        assert_eq!(UI_END_FF_ERASE, 0x400C_55CB);
    }

    #[test]
    fn events_cross_a_socket_intact() {
        let (a, b) = UnixStream::pair().unwrap();
        set_nonblocking(b.as_raw_fd()).unwrap();

        write_event(a.as_raw_fd(), Event::new(EV_FF, 3, 1)).unwrap();
        write_event(a.as_raw_fd(), Event::key(0x130, true)).unwrap();

        assert_eq!(read_event(b.as_raw_fd()).unwrap(), Some(Event::new(EV_FF, 3, 1)));
        assert_eq!(read_event(b.as_raw_fd()).unwrap(), Some(Event::new(EV_KEY, 0x130, 1)));
        assert_eq!(read_event(b.as_raw_fd()).unwrap(), None);
    }

    #[test]
    fn rumble_packs_magnitudes() {
        let effect = FfEffect::rumble(0x1234, 0x5678, 200);
        assert_eq!(effect.id, -1);
        assert_eq!(effect.u[0], 0x5678_1234);
        assert_eq!(effect.replay.length, 200);
    }
}
