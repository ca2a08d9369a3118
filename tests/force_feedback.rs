//! Rumble routed from the combined virtual device to both Joy-Cons.

use joycond::devices::mock::{MockBackend, MockUnitHandle, MockVirtualHandle, device_info};
use joycond::discovery::{Action, DiscoveryEvent};
use joycond::ffi::FfEffect;
use joycond::orchestrator::Orchestrator;
use joycond::pairing::Model;
use joycond::protocol::{BTN_TL, BTN_TR, EV_FF, EV_KEY, EV_UINPUT, FF_GAIN};
use joycond::report::Event;
use joycond::virtual_ctlr::VirtualController;
use joycond::virtual_ctlr::effects::EffectEntry;
use std::time::Duration;

const LEFT: &str = "/devices/hid/left/input/event20";
const RIGHT: &str = "/devices/hid/right/input/event21";

struct Rig {
    orchestrator: Orchestrator<MockBackend>,
    left: MockUnitHandle,
    right: MockUnitHandle,
    device: MockVirtualHandle,
}

impl Rig {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let backend = MockBackend::new();
        let left = backend.stage_unit(LEFT, Model::LeftJoycon);
        let right = backend.stage_unit(RIGHT, Model::RightJoycon);
        right.set_next_effect_id(5);

        let mut orchestrator = Orchestrator::new(backend.clone(), 10).unwrap();
        orchestrator
            .handle_discovery(vec![event(Action::Add, LEFT), event(Action::Add, RIGHT)])
            .unwrap();
        left.press(BTN_TL);
        right.press(BTN_TR);

        settle(&mut orchestrator);
        let device = backend.virtuals()[0].clone();

        Self {
            orchestrator,
            left,
            right,
            device,
        }
    }

    fn settle(&mut self) {
        settle(&mut self.orchestrator);
    }

    fn entry(&self, id: i16) -> Option<EffectEntry> {
        match self.orchestrator.controller(0) {
            Some(VirtualController::Combined(combined)) => combined.effects().get(id).copied(),
            _ => panic!("expected a combined controller in slot 0"),
        }
    }

    fn effect_count(&self) -> usize {
        match self.orchestrator.controller(0) {
            Some(VirtualController::Combined(combined)) => combined.effects().len(),
            _ => panic!("expected a combined controller in slot 0"),
        }
    }

    fn upload(&mut self, effect: FfEffect) -> i16 {
        let id = self.device.request_upload(effect);
        self.settle();
        id
    }
}

fn settle(orchestrator: &mut Orchestrator<MockBackend>) {
    while orchestrator
        .poll(Some(Duration::from_millis(20)), Vec::new)
        .unwrap()
        > 0
    {}
}

fn event(action: Action, devpath: &str) -> DiscoveryEvent {
    DiscoveryEvent {
        action,
        device: device_info(devpath),
    }
}

fn ff(code: u16, value: i32) -> Event {
    Event::new(EV_FF, code, value)
}

#[test]
fn upload_play_erase_round_trip() {
    let mut rig = Rig::new();

    let id = rig.upload(FfEffect::rumble(0x8000, 0x4000, 300));
    let uploads = rig.device.completed_uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].retval, 0);

    let entry = rig.entry(id).unwrap();
    assert_eq!(entry.left, Some(0));
    assert_eq!(entry.right, Some(5));

    rig.device.play(id as u16, 1);
    rig.settle();
    assert_eq!(rig.left.written(), vec![ff(0, 1)]);
    assert_eq!(rig.right.written(), vec![ff(5, 1)]);

    rig.device.request_erase(id);
    rig.settle();
    assert_eq!(rig.device.completed_erases()[0].retval, 0);
    assert_eq!(rig.entry(id), None);
    assert!(rig.left.effects().is_empty());
    assert!(rig.right.effects().is_empty());
}

#[test]
fn failed_side_is_reported_and_skipped() {
    let mut rig = Rig::new();
    rig.right.set_fail_upload(true);

    let id = rig.upload(FfEffect::rumble(1000, 1000, 50));
    assert_eq!(rig.device.completed_uploads()[0].retval, -libc::EIO);
    let entry = rig.entry(id).unwrap();
    assert_eq!(entry.left, Some(0));
    assert_eq!(entry.right, None);

    rig.device.play(id as u16, 1);
    rig.settle();
    assert_eq!(rig.left.written(), vec![ff(0, 1)]);
    assert!(rig.right.written().is_empty());
}

#[test]
fn failed_erase_keeps_the_entry() {
    let mut rig = Rig::new();
    let id = rig.upload(FfEffect::rumble(1000, 0, 50));
    rig.left.set_fail_erase(true);

    rig.device.request_erase(id);
    rig.settle();
    assert_eq!(rig.device.completed_erases()[0].retval, -libc::EIO);
    let entry = rig.entry(id).unwrap();
    assert_eq!(entry.left, Some(0));
    assert_eq!(entry.right, None);
}

#[test]
fn unknown_ids_are_not_forwarded() {
    let mut rig = Rig::new();

    rig.device.request_erase(9);
    rig.device.play(3, 1);
    rig.settle();
    assert_eq!(rig.device.completed_erases()[0].retval, 0);
    assert!(rig.left.written().is_empty());
    assert!(rig.right.written().is_empty());
}

#[test]
fn device_wide_codes_go_to_both_sides() {
    let mut rig = Rig::new();

    rig.device.play(FF_GAIN, 0x4000);
    rig.settle();
    assert_eq!(rig.left.written(), vec![ff(FF_GAIN, 0x4000)]);
    assert_eq!(rig.right.written(), vec![ff(FF_GAIN, 0x4000)]);
}

#[test]
fn reupload_updates_in_place() {
    let mut rig = Rig::new();
    let id = rig.upload(FfEffect::rumble(100, 100, 50));

    let mut update = FfEffect::rumble(200, 200, 80);
    update.id = id;
    assert_eq!(rig.upload(update), id);

    assert_eq!(rig.effect_count(), 1);
    let entry = rig.entry(id).unwrap();
    assert_eq!(entry.params.replay.length, 80);
    assert_eq!(entry.left, Some(0));
    assert_eq!(entry.right, Some(5));
    assert_eq!(rig.left.effects()[&0].replay.length, 80);
    assert!(rig.device.completed_uploads().iter().all(|u| u.retval == 0));
}

#[test]
fn reconnected_side_gets_effects_back() {
    let mut rig = Rig::new();
    let id = rig.upload(FfEffect::rumble(100, 100, 50));

    rig.orchestrator
        .handle_discovery(vec![event(Action::Remove, RIGHT)])
        .unwrap();
    let entry = rig.entry(id).unwrap();
    assert_eq!(entry.left, Some(0));
    assert_eq!(entry.right, None);

    // Played while degraded: only the left side rumbles.
    rig.device.play(id as u16, 1);
    rig.settle();
    assert_eq!(rig.left.written(), vec![ff(0, 1)]);

    rig.orchestrator
        .handle_discovery(vec![event(Action::Add, RIGHT)])
        .unwrap();
    rig.right.press(BTN_TR);
    rig.settle();

    let entry = rig.entry(id).unwrap();
    assert_eq!(entry.right, Some(6));
    assert!(rig.right.effects().contains_key(&6));
}

#[test]
fn unreadable_uinput_events_are_survived() {
    let mut rig = Rig::new();
    let id = rig.upload(FfEffect::rumble(0x8000, 0x4000, 300));

    rig.device.fail_next_read();
    rig.settle();
    assert!(rig.device.is_open());

    rig.device.play(id as u16, 1);
    rig.settle();
    assert!(rig.left.written().contains(&ff(0, 1)));
    assert!(rig.right.written().contains(&ff(5, 1)));
}

#[test]
fn unhandled_uinput_events_are_ignored() {
    let mut rig = Rig::new();

    rig.device.send(Event::new(EV_UINPUT, 7, 0));
    rig.device.send(Event::new(EV_KEY, 304, 1));
    rig.settle();

    assert!(rig.device.completed_uploads().is_empty());
    assert!(rig.device.completed_erases().is_empty());
    assert!(rig.left.written().is_empty());
    assert!(rig.right.written().is_empty());
    assert_eq!(rig.effect_count(), 0);
}
