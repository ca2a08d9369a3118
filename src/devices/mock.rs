//! In-memory backend for exercising the orchestrator without hardware.
//!
//! Units and virtual devices are backed by socket pairs so they own real file
//! descriptors the multiplexer can watch. Queuing input through a handle also
//! writes a wake byte, which makes the fd readable until the queue drains.

use super::{AxisSetup, DeviceBackend, Profile, SynthesizedDevice, UnitDevice};
use crate::discovery::DeviceInfo;
use crate::ffi::{FfEffect, UinputFfErase, UinputFfUpload};
use crate::pairing::Model;
use crate::protocol::{
    BTN_TL, BTN_TL2, BTN_TR, BTN_TR2, EV_FF, EV_UINPUT, PLAYER_LED_COUNT, PRODUCT_LEFT_JOYCON,
    PRODUCT_PROCON, PRODUCT_RIGHT_JOYCON, PRODUCT_SNESCON, UI_FF_ERASE, UI_FF_UPLOAD,
    VENDOR_NINTENDO,
};
use crate::report::{Event, Report};
use log::debug;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::os::unix::io::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::rc::Rc;

fn socket_pair() -> io::Result<(UnixStream, UnixStream)> {
    let (ours, theirs) = UnixStream::pair()?;
    ours.set_nonblocking(true)?;
    theirs.set_nonblocking(true)?;
    Ok((ours, theirs))
}

fn drain(stream: &UnixStream) {
    let mut buf = [0u8; 64];
    let mut stream = stream;
    while matches!(stream.read(&mut buf), Ok(n) if n > 0) {}
}

fn wake(peer: &Option<UnixStream>) {
    if let Some(mut peer) = peer.as_ref() {
        let _ = peer.write(&[1]);
    }
}

fn eio() -> io::Error {
    io::Error::from_raw_os_error(libc::EIO)
}

/// Profile a real unit of `model` would report.
pub fn unit_profile(model: Model) -> Profile {
    let product = match model {
        Model::LeftJoycon => PRODUCT_LEFT_JOYCON,
        Model::RightJoycon => PRODUCT_RIGHT_JOYCON,
        Model::ProController => PRODUCT_PROCON,
        Model::SnesController => PRODUCT_SNESCON,
        Model::Unknown => 0,
    };
    let mut keys = vec![BTN_TL, BTN_TR, BTN_TL2, BTN_TR2, 304, 305, 307, 308];
    keys.sort_unstable();
    Profile {
        name: format!("Nintendo Switch {model}"),
        bustype: 0x05,
        vendor: VENDOR_NINTENDO,
        product,
        version: 0x8001,
        keys,
        axes: vec![AxisSetup::new(0, -32767, 32767, 250, 500), AxisSetup::new(1, -32767, 32767, 250, 500)],
        ff: vec![0x50],
        ff_effects_max: 0,
    }
}

pub fn device_info(devpath: &str) -> DeviceInfo {
    let sysname = devpath.rsplit('/').next().unwrap_or(devpath).to_string();
    DeviceInfo {
        devpath: devpath.to_string(),
        devnode: Some(PathBuf::from(format!("/dev/input/{sysname}"))),
        syspath: PathBuf::from(format!("/sys{devpath}")),
    }
}

#[derive(Default)]
struct UnitState {
    profile: Option<Profile>,
    peer: Option<UnixStream>,
    open: bool,
    reports: VecDeque<Report>,
    written: Vec<Event>,
    leds: [bool; PLAYER_LED_COUNT],
    grabbed: bool,
    effects: HashMap<i16, FfEffect>,
    next_effect_id: i16,
    fail_upload: bool,
    fail_erase: bool,
    fail_leds: bool,
    fail_read: bool,
}

/// Test-side view of a staged unit.
#[derive(Clone)]
pub struct MockUnitHandle {
    state: Rc<RefCell<UnitState>>,
}

impl MockUnitHandle {
    pub fn push_report(&self, report: Report) {
        let mut state = self.state.borrow_mut();
        state.reports.push_back(report);
        wake(&state.peer);
    }

    pub fn press(&self, code: u16) {
        self.push_report(Report::normal(Event::key(code, true)));
    }

    pub fn release(&self, code: u16) {
        self.push_report(Report::normal(Event::key(code, false)));
    }

    /// Events the daemon wrote to this unit (force-feedback plays).
    pub fn written(&self) -> Vec<Event> {
        self.state.borrow().written.clone()
    }

    pub fn leds(&self) -> [bool; PLAYER_LED_COUNT] {
        self.state.borrow().leds
    }

    pub fn grabbed(&self) -> bool {
        self.state.borrow().grabbed
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().open
    }

    /// Effects currently installed, by this unit's own ids.
    pub fn effects(&self) -> HashMap<i16, FfEffect> {
        self.state.borrow().effects.clone()
    }

    pub fn set_next_effect_id(&self, id: i16) {
        self.state.borrow_mut().next_effect_id = id;
    }

    pub fn set_fail_upload(&self, fail: bool) {
        self.state.borrow_mut().fail_upload = fail;
    }

    pub fn set_fail_erase(&self, fail: bool) {
        self.state.borrow_mut().fail_erase = fail;
    }

    pub fn set_fail_leds(&self, fail: bool) {
        self.state.borrow_mut().fail_leds = fail;
    }

    pub fn set_fail_read(&self, fail: bool) {
        let mut state = self.state.borrow_mut();
        state.fail_read = fail;
        wake(&state.peer);
    }
}

pub struct MockUnit {
    stream: UnixStream,
    profile: Profile,
    state: Rc<RefCell<UnitState>>,
}

impl Drop for MockUnit {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.open = false;
        state.grabbed = false;
        state.peer = None;
        // Closing an evdev node frees its uploaded effects.
        state.effects.clear();
    }
}

impl AsRawFd for MockUnit {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

impl UnitDevice for MockUnit {
    fn profile(&self) -> &Profile {
        &self.profile
    }

    fn next_report(&mut self) -> io::Result<Option<Report>> {
        let mut state = self.state.borrow_mut();
        if state.fail_read {
            return Err(eio());
        }
        let report = state.reports.pop_front();
        if state.reports.is_empty() {
            drain(&self.stream);
        }
        Ok(report)
    }

    fn grab(&mut self) -> io::Result<()> {
        self.state.borrow_mut().grabbed = true;
        Ok(())
    }

    fn set_player_led(&mut self, index: usize, on: bool) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_leds {
            return Err(eio());
        }
        let led = state
            .leds
            .get_mut(index)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no player LED {index}")))?;
        *led = on;
        Ok(())
    }

    fn upload_effect(&mut self, effect: &mut FfEffect) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_upload {
            return Err(eio());
        }
        if effect.id == -1 {
            effect.id = state.next_effect_id;
            state.next_effect_id += 1;
        } else if !state.effects.contains_key(&effect.id) {
            return Err(io::Error::from_raw_os_error(libc::EINVAL));
        }
        state.effects.insert(effect.id, *effect);
        Ok(())
    }

    fn erase_effect(&mut self, id: i16) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.fail_erase {
            return Err(eio());
        }
        state
            .effects
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EINVAL))
    }

    fn write_event(&mut self, event: Event) -> io::Result<()> {
        self.state.borrow_mut().written.push(event);
        Ok(())
    }
}

#[derive(Default)]
struct VirtualState {
    peer: Option<UnixStream>,
    open: bool,
    incoming: VecDeque<Event>,
    written: Vec<Event>,
    next_request: u32,
    next_effect_id: i16,
    uploads: HashMap<u32, UinputFfUpload>,
    erases: HashMap<u32, UinputFfErase>,
    completed_uploads: Vec<UinputFfUpload>,
    completed_erases: Vec<UinputFfErase>,
    fail_read: bool,
}

/// Test-side view of a created virtual device; plays the role of an
/// application holding the device open.
#[derive(Clone)]
pub struct MockVirtualHandle {
    profile: Profile,
    state: Rc<RefCell<VirtualState>>,
}

impl MockVirtualHandle {
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().open
    }

    /// Everything relayed into the virtual device.
    pub fn written(&self) -> Vec<Event> {
        self.state.borrow().written.clone()
    }

    /// Requests an upload the way the kernel would: new effects (`id == -1`)
    /// get the next free id. Returns the effect's id.
    pub fn request_upload(&self, mut effect: FfEffect) -> i16 {
        let mut state = self.state.borrow_mut();
        if effect.id == -1 {
            effect.id = state.next_effect_id;
            state.next_effect_id += 1;
        }
        let request_id = state.next_request;
        state.next_request += 1;
        state.uploads.insert(
            request_id,
            UinputFfUpload {
                request_id,
                retval: 0,
                effect,
                old: FfEffect::default(),
            },
        );
        state.incoming.push_back(Event::new(EV_UINPUT, UI_FF_UPLOAD, request_id as i32));
        wake(&state.peer);
        effect.id
    }

    pub fn request_erase(&self, id: i16) {
        let mut state = self.state.borrow_mut();
        let request_id = state.next_request;
        state.next_request += 1;
        state.erases.insert(
            request_id,
            UinputFfErase {
                request_id,
                retval: 0,
                effect_id: id as u32,
            },
        );
        state.incoming.push_back(Event::new(EV_UINPUT, UI_FF_ERASE, request_id as i32));
        wake(&state.peer);
    }

    pub fn play(&self, code: u16, value: i32) {
        self.send(Event::new(EV_FF, code, value));
    }

    /// Queues an arbitrary event for the daemon to read.
    pub fn send(&self, event: Event) {
        let mut state = self.state.borrow_mut();
        state.incoming.push_back(event);
        wake(&state.peer);
    }

    /// Makes the next read fail as a truncated event would.
    pub fn fail_next_read(&self) {
        let mut state = self.state.borrow_mut();
        state.fail_read = true;
        wake(&state.peer);
    }

    pub fn completed_uploads(&self) -> Vec<UinputFfUpload> {
        self.state.borrow().completed_uploads.clone()
    }

    pub fn completed_erases(&self) -> Vec<UinputFfErase> {
        self.state.borrow().completed_erases.clone()
    }
}

pub struct MockVirtual {
    stream: UnixStream,
    state: Rc<RefCell<VirtualState>>,
}

impl Drop for MockVirtual {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.open = false;
        state.peer = None;
    }
}

impl AsRawFd for MockVirtual {
    fn as_raw_fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }
}

impl SynthesizedDevice for MockVirtual {
    fn write_event(&mut self, event: Event) -> io::Result<()> {
        self.state.borrow_mut().written.push(event);
        Ok(())
    }

    fn read_event(&mut self) -> io::Result<Option<Event>> {
        let mut state = self.state.borrow_mut();
        if std::mem::take(&mut state.fail_read) {
            if state.incoming.is_empty() {
                drain(&self.stream);
            }
            return Err(io::Error::new(io::ErrorKind::InvalidData, "short read from uinput"));
        }
        let event = state.incoming.pop_front();
        if state.incoming.is_empty() {
            drain(&self.stream);
        }
        Ok(event)
    }

    fn begin_ff_upload(&mut self, request_id: u32) -> io::Result<UinputFfUpload> {
        self.state
            .borrow_mut()
            .uploads
            .remove(&request_id)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EINVAL))
    }

    fn end_ff_upload(&mut self, upload: &UinputFfUpload) -> io::Result<()> {
        self.state.borrow_mut().completed_uploads.push(*upload);
        Ok(())
    }

    fn begin_ff_erase(&mut self, request_id: u32) -> io::Result<UinputFfErase> {
        self.state
            .borrow_mut()
            .erases
            .remove(&request_id)
            .ok_or_else(|| io::Error::from_raw_os_error(libc::EINVAL))
    }

    fn end_ff_erase(&mut self, erase: &UinputFfErase) -> io::Result<()> {
        self.state.borrow_mut().completed_erases.push(*erase);
        Ok(())
    }
}

#[derive(Default)]
struct BackendState {
    units: HashMap<String, MockUnitHandle>,
    virtuals: Vec<MockVirtualHandle>,
    fail_virtual: bool,
}

/// Backend whose units are staged by the test before discovery reports them.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Rc<RefCell<BackendState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `devpath` openable as a unit of `model`.
    pub fn stage_unit(&self, devpath: &str, model: Model) -> MockUnitHandle {
        self.stage_unit_with_profile(devpath, unit_profile(model))
    }

    pub fn stage_unit_with_profile(&self, devpath: &str, profile: Profile) -> MockUnitHandle {
        let handle = MockUnitHandle {
            state: Rc::new(RefCell::new(UnitState {
                profile: Some(profile),
                ..Default::default()
            })),
        };
        self.state
            .borrow_mut()
            .units
            .insert(devpath.to_string(), handle.clone());
        handle
    }

    /// Virtual devices created so far, oldest first.
    pub fn virtuals(&self) -> Vec<MockVirtualHandle> {
        self.state.borrow().virtuals.clone()
    }

    pub fn set_fail_virtual(&self, fail: bool) {
        self.state.borrow_mut().fail_virtual = fail;
    }
}

impl DeviceBackend for MockBackend {
    fn open_unit(&mut self, info: &DeviceInfo) -> io::Result<Box<dyn UnitDevice>> {
        let handle = self.state.borrow().units.get(&info.devpath).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} is not staged", info.devpath))
        })?;

        let (stream, peer) = socket_pair()?;
        let mut state = handle.state.borrow_mut();
        let profile = state.profile.clone().unwrap_or_else(|| unit_profile(Model::Unknown));
        state.open = true;
        state.peer = Some(peer);
        if !state.reports.is_empty() {
            wake(&state.peer);
        }
        debug!("[MOCK] Opened {}", info.devpath);

        Ok(Box::new(MockUnit {
            stream,
            profile,
            state: handle.state.clone(),
        }))
    }

    fn create_virtual(&mut self, profile: &Profile) -> io::Result<Box<dyn SynthesizedDevice>> {
        if self.state.borrow().fail_virtual {
            return Err(io::Error::from_raw_os_error(libc::ENODEV));
        }
        let (stream, peer) = socket_pair()?;
        let handle = MockVirtualHandle {
            profile: profile.clone(),
            state: Rc::new(RefCell::new(VirtualState {
                peer: Some(peer),
                open: true,
                ..Default::default()
            })),
        };
        self.state.borrow_mut().virtuals.push(handle.clone());
        debug!("[MOCK] Created virtual device \"{}\"", profile.name);

        Ok(Box::new(MockVirtual {
            stream,
            state: handle.state,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unopened_units_are_rejected() {
        let mut backend = MockBackend::new();
        assert!(backend.open_unit(&device_info("/devices/missing/event9")).is_err());
    }

    #[test]
    fn units_assign_effect_ids_in_order() {
        let mut backend = MockBackend::new();
        let handle = backend.stage_unit("/devices/a/event1", Model::LeftJoycon);
        handle.set_next_effect_id(7);
        let mut unit = backend.open_unit(&device_info("/devices/a/event1")).unwrap();

        let mut effect = FfEffect::rumble(1, 1, 10);
        unit.upload_effect(&mut effect).unwrap();
        assert_eq!(effect.id, 7);
        assert!(handle.effects().contains_key(&7));

        unit.erase_effect(7).unwrap();
        assert!(unit.erase_effect(7).is_err());
        drop(unit);
        assert!(!handle.is_open());
    }
}
