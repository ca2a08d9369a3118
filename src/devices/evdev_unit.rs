use super::{AxisSetup, Profile, UnitDevice};
use crate::discovery::DeviceInfo;
use crate::ffi::{self, FfEffect};
use crate::protocol::{EV_ABS, EV_SYN, PLAYER_LED_COUNT, SYN_DROPPED, SYN_REPORT};
use crate::report::{Event, Report};
use evdev::raw_stream::RawDevice;
use std::collections::VecDeque;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

/// A hid-nintendo event node opened for raw access.
pub struct EvdevUnit {
    device: RawDevice,
    profile: Profile,
    leds: [Option<PathBuf>; PLAYER_LED_COUNT],
    pending: VecDeque<Report>,
    drops: DropTracker,
}

/// What to do with a raw event read from the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Relay(Event),
    Discard,
    /// The gap left by a buffer overflow just closed.
    Resync,
}

/// Follows the gap the kernel opens with SYN_DROPPED when a client's
/// buffer overflows.
#[derive(Debug, Default)]
struct DropTracker {
    dropped: bool,
}

impl DropTracker {
    fn step(&mut self, event: Event) -> Step {
        if event.type_ == EV_SYN && event.code == SYN_DROPPED {
            self.dropped = true;
            return Step::Discard;
        }
        if !self.dropped {
            return Step::Relay(event);
        }
        // Everything up to the next frame boundary is stale.
        if event.type_ == EV_SYN && event.code == SYN_REPORT {
            self.dropped = false;
            return Step::Resync;
        }
        Step::Discard
    }
}

/// Restates every key and axis, closed by a frame boundary.
fn resync_reports(keys: &[(u16, bool)], axes: &[(u16, i32)]) -> Vec<Report> {
    keys.iter()
        .map(|&(code, pressed)| Event::key(code, pressed))
        .chain(axes.iter().map(|&(code, value)| Event::new(EV_ABS, code, value)))
        .chain(std::iter::once(Event::syn_report()))
        .map(Report::sync)
        .collect()
}

impl EvdevUnit {
    pub fn open(info: &DeviceInfo) -> io::Result<Self> {
        let devnode = info.devnode.as_deref().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} has no device node", info.devpath))
        })?;
        let device = RawDevice::open(devnode)?;
        ffi::set_nonblocking(device.as_raw_fd())?;

        let profile = read_profile(&device)?;
        let leds = match find_player_leds(&info.syspath) {
            Ok(leds) => leds,
            Err(e) => {
                log::warn!("No player LEDs for {}: {}", info.devpath, e);
                Default::default()
            }
        };

        Ok(Self {
            device,
            profile,
            leds,
            pending: VecDeque::new(),
            drops: DropTracker::default(),
        })
    }

    /// Queues the current key and axis state after the kernel dropped events.
    fn queue_resync(&mut self) -> io::Result<()> {
        let pressed = self.device.get_key_state()?;
        let keys: Vec<(u16, bool)> = self
            .profile
            .keys
            .iter()
            .map(|&code| (code, pressed.contains(evdev::Key::new(code))))
            .collect();

        let abs = self.device.get_abs_state()?;
        let axes: Vec<(u16, i32)> = self
            .profile
            .axes
            .iter()
            .filter_map(|axis| abs.get(axis.code as usize).map(|info| (axis.code, info.value)))
            .collect();

        self.pending.extend(resync_reports(&keys, &axes));
        Ok(())
    }
}

fn read_profile(device: &RawDevice) -> io::Result<Profile> {
    let id = device.input_id();
    let keys = device
        .supported_keys()
        .map(|keys| keys.iter().map(|key| key.code()).collect())
        .unwrap_or_default();

    let mut axes = Vec::new();
    if let Some(supported) = device.supported_absolute_axes() {
        let state = device.get_abs_state()?;
        for axis in supported.iter() {
            if let Some(info) = state.get(axis.0 as usize) {
                axes.push(AxisSetup {
                    code: axis.0,
                    value: info.value,
                    min: info.minimum,
                    max: info.maximum,
                    fuzz: info.fuzz,
                    flat: info.flat,
                    resolution: info.resolution,
                });
            }
        }
    }

    let ff = device
        .supported_ff()
        .map(|ff| ff.iter().map(|effect| effect.0).collect())
        .unwrap_or_default();

    Ok(Profile {
        name: device.name().unwrap_or("Unknown controller").to_string(),
        bustype: id.bus_type().0,
        vendor: id.vendor(),
        product: id.product(),
        version: id.version(),
        keys,
        axes,
        ff,
        ff_effects_max: 0,
    })
}

/// hid-nintendo names its LEDs `<hid id>:<color>:player-<n>`, counting from 1.
pub fn player_led_index(sysname: &str) -> Option<usize> {
    let (_, n) = sysname.rsplit_once(":player-")?;
    let n: usize = n.parse().ok()?;
    (1..=PLAYER_LED_COUNT).contains(&n).then(|| n - 1)
}

fn find_player_leds(syspath: &Path) -> io::Result<[Option<PathBuf>; PLAYER_LED_COUNT]> {
    let input = udev::Device::from_syspath(syspath)?;
    let hid = input.parent_with_subsystem("hid")?.ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "no hid parent device")
    })?;

    let mut enumerator = udev::Enumerator::new()?;
    enumerator.match_parent(&hid)?;
    enumerator.match_subsystem("leds")?;

    let mut leds: [Option<PathBuf>; PLAYER_LED_COUNT] = Default::default();
    for led in enumerator.scan_devices()? {
        if let Some(index) = player_led_index(&led.sysname().to_string_lossy()) {
            leds[index] = Some(led.syspath().to_path_buf());
        }
    }
    Ok(leds)
}

impl AsRawFd for EvdevUnit {
    fn as_raw_fd(&self) -> RawFd {
        self.device.as_raw_fd()
    }
}

impl UnitDevice for EvdevUnit {
    fn profile(&self) -> &Profile {
        &self.profile
    }

    fn next_report(&mut self) -> io::Result<Option<Report>> {
        if let Some(report) = self.pending.pop_front() {
            return Ok(Some(report));
        }

        while let Some(event) = ffi::read_event(self.as_raw_fd())? {
            match self.drops.step(event) {
                Step::Relay(event) => return Ok(Some(Report::normal(event))),
                Step::Discard => {}
                Step::Resync => {
                    self.queue_resync()?;
                    return Ok(self.pending.pop_front());
                }
            }
        }
        Ok(None)
    }

    fn grab(&mut self) -> io::Result<()> {
        self.device.grab()
    }

    fn set_player_led(&mut self, index: usize, on: bool) -> io::Result<()> {
        let syspath = self
            .leds
            .get(index)
            .and_then(|led| led.as_deref())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no player LED {index}")))?;
        let mut led = udev::Device::from_syspath(syspath)?;
        led.set_attribute_value("brightness", if on { "1" } else { "0" })
    }

    fn upload_effect(&mut self, effect: &mut FfEffect) -> io::Result<()> {
        ffi::upload_effect(self.as_raw_fd(), effect)
    }

    fn erase_effect(&mut self, id: i16) -> io::Result<()> {
        ffi::erase_effect(self.as_raw_fd(), id)
    }

    fn write_event(&mut self, event: Event) -> io::Result<()> {
        ffi::write_event(self.as_raw_fd(), event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::{BTN_TL, BTN_TR};

    #[test]
    fn dropped_events_are_discarded_until_the_frame_ends() {
        let mut drops = DropTracker::default();
        let stream = [
            Event::key(BTN_TL, true),
            Event::new(EV_SYN, SYN_DROPPED, 0),
            Event::key(BTN_TR, true),
            Event::new(EV_ABS, 0, 1200),
            Event::syn_report(),
            Event::key(BTN_TR, false),
        ];
        let steps: Vec<Step> = stream.into_iter().map(|event| drops.step(event)).collect();

        assert_eq!(
            steps,
            vec![
                Step::Relay(Event::key(BTN_TL, true)),
                Step::Discard,
                Step::Discard,
                Step::Discard,
                Step::Resync,
                Step::Relay(Event::key(BTN_TR, false)),
            ]
        );
    }

    #[test]
    fn resync_restates_state_as_sync_reports() {
        let reports = resync_reports(&[(BTN_TL, true), (BTN_TR, false)], &[(1, -400)]);

        assert!(reports.iter().all(|r| r.status == crate::report::ReadStatus::Sync));
        let events: Vec<Event> = reports.iter().map(|r| r.event).collect();
        assert_eq!(
            events,
            vec![
                Event::key(BTN_TL, true),
                Event::key(BTN_TR, false),
                Event::new(EV_ABS, 1, -400),
                Event::syn_report(),
            ]
        );
    }

    #[test]
    fn parses_player_led_names() {
        assert_eq!(player_led_index("0005:057E:2006.0003:green:player-1"), Some(0));
        assert_eq!(player_led_index("0005:057E:2007.0004:green:player-4"), Some(3));
        assert_eq!(player_led_index("0005:057E:2007.0004:green:player-5"), None);
        assert_eq!(player_led_index("0005:057E:2007.0004:blue:home"), None);
    }
}
