use super::effects::{EffectEntry, EffectMap};
use super::{errno, read_error, show_player};
use crate::devices::combined_layout::CombinedLayout;
use crate::devices::{DeviceBackend, SynthesizedDevice};
use crate::error::{Error, Result};
use crate::multiplexer::SubscriberId;
use crate::orchestrator::{Multiplexer, Owner};
use crate::pairing::Handedness;
use crate::physical::PhysicalController;
use crate::protocol::{
    BTN_TL, BTN_TL2, BTN_TR, BTN_TR2, EV_FF, EV_UINPUT, FF_GAIN, UI_FF_ERASE, UI_FF_UPLOAD,
};
use crate::report::{Event, ReadStatus, Report};
use log::{debug, error, info, warn};
use std::os::unix::io::RawFd;

const SIDES: [Handedness; 2] = [Handedness::Left, Handedness::Right];

/// A left and a right Joy-Con presented as one controller.
///
/// Either side may be missing after a disconnect; the virtual device lives on
/// until both are gone so applications keep their handle.
pub struct Combined {
    slot: usize,
    left: Option<PhysicalController>,
    right: Option<PhysicalController>,
    device: Box<dyn SynthesizedDevice>,
    subscription: Option<SubscriberId>,
    effects: EffectMap,
}

/// SL/SR of each half; they only matter for pairing.
fn is_rail_button(side: Handedness, event: &Event) -> bool {
    match side {
        Handedness::Left => event.is_key(BTN_TR) || event.is_key(BTN_TR2),
        Handedness::Right => event.is_key(BTN_TL) || event.is_key(BTN_TL2),
    }
}

impl Combined {
    pub fn new(
        backend: &mut dyn DeviceBackend,
        mux: &mut Multiplexer,
        slot: usize,
        left: Option<PhysicalController>,
        right: Option<PhysicalController>,
    ) -> Result<Self> {
        let device = backend
            .create_virtual(&CombinedLayout::profile())
            .map_err(Error::VirtualDevice)?;

        let mut combined = Self {
            slot,
            left,
            right,
            device,
            subscription: None,
            effects: EffectMap::new(),
        };
        for side in SIDES {
            if let Some(unit) = combined.side_mut(side) {
                show_player(unit, slot);
            }
        }
        combined.resubscribe(mux)?;
        info!(
            "Player {}: combined joy-cons {} + {}",
            slot + 1,
            combined.left.as_ref().map_or("-", |u| u.devpath()),
            combined.right.as_ref().map_or("-", |u| u.devpath()),
        );
        Ok(combined)
    }

    fn side(&self, side: Handedness) -> Option<&PhysicalController> {
        match side {
            Handedness::Left => self.left.as_ref(),
            Handedness::Right => self.right.as_ref(),
        }
    }

    fn side_mut(&mut self, side: Handedness) -> Option<&mut PhysicalController> {
        match side {
            Handedness::Left => self.left.as_mut(),
            Handedness::Right => self.right.as_mut(),
        }
    }

    fn slot_of(&mut self, side: Handedness) -> &mut Option<PhysicalController> {
        match side {
            Handedness::Left => &mut self.left,
            Handedness::Right => &mut self.right,
        }
    }

    /// Registers the virtual fd and every present unit under one subscriber.
    fn resubscribe(&mut self, mux: &mut Multiplexer) -> Result<()> {
        if let Some(id) = self.subscription.take() {
            mux.remove_subscriber(id)?;
        }
        let mut fds = vec![self.device.as_raw_fd()];
        fds.extend(self.units().iter().map(|unit| unit.fd()));
        self.subscription = Some(mux.add_subscriber(&fds, Owner::Active(self.slot))?);
        Ok(())
    }

    pub fn units(&self) -> Vec<&PhysicalController> {
        SIDES.iter().filter_map(|&side| self.side(side)).collect()
    }

    pub fn effects(&self) -> &EffectMap {
        &self.effects
    }

    pub fn contains_fd(&self, fd: RawFd) -> bool {
        fd == self.device.as_raw_fd() || self.units().iter().any(|unit| unit.fd() == fd)
    }

    /// The side a reconnecting unit could fill.
    pub fn needed_handedness(&self) -> Option<Handedness> {
        match (&self.left, &self.right) {
            (None, Some(_)) => Some(Handedness::Left),
            (Some(_), None) => Some(Handedness::Right),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    pub fn handle_event(&mut self, fd: RawFd) -> Result<()> {
        if fd == self.device.as_raw_fd() {
            return self.handle_virtual_events();
        }
        for side in SIDES {
            if self.side(side).is_some_and(|unit| unit.fd() == fd) {
                return self.relay_input(side);
            }
        }
        Ok(())
    }

    fn relay_input(&mut self, side: Handedness) -> Result<()> {
        let Self { left, right, device, .. } = self;
        let Some(unit) = (match side {
            Handedness::Left => left.as_mut(),
            Handedness::Right => right.as_mut(),
        }) else {
            return Ok(());
        };

        loop {
            let report: Report = match unit.next_report() {
                Ok(Some(report)) => report,
                Ok(None) => return Ok(()),
                Err(e) => return read_error(unit, e),
            };
            if report.status == ReadStatus::Normal && is_rail_button(side, &report.event) {
                continue;
            }
            if let Err(e) = device.write_event(report.event) {
                warn!("Failed to relay input from {}: {}", unit.devpath(), e);
            }
        }
    }

    fn handle_virtual_events(&mut self) -> Result<()> {
        loop {
            let event = match self.device.read_event() {
                Ok(Some(event)) => event,
                Ok(None) => return Ok(()),
                Err(e) => {
                    error!("Failed reading uinput fd of player {}: {}", self.slot + 1, e);
                    return Ok(());
                }
            };
            match (event.type_, event.code) {
                (EV_UINPUT, UI_FF_UPLOAD) => self.upload(event.value as u32),
                (EV_UINPUT, UI_FF_ERASE) => self.erase(event.value as u32),
                (EV_UINPUT, code) => debug!("Unhandled EV_UINPUT code {}", code),
                (EV_FF, _) => self.play(event),
                (type_, _) => debug!("Unhandled uinput event type {}", type_),
            }
        }
    }

    fn upload(&mut self, request_id: u32) {
        let mut upload = match self.device.begin_ff_upload(request_id) {
            Ok(upload) => upload,
            Err(e) => {
                error!("Failed to begin effect upload {}: {}", request_id, e);
                return;
            }
        };

        let id = upload.effect.id;
        let mut entry = match self.effects.get(id) {
            Some(existing) => {
                warn!("Effect {} is already uploaded; updating it", id);
                *existing
            }
            None => EffectEntry::new(upload.effect),
        };
        entry.params = upload.effect;

        for side in SIDES {
            let previous = entry.id(side);
            let Some(unit) = self.side_mut(side) else {
                continue;
            };
            let mut effect = upload.effect;
            effect.id = previous.unwrap_or(-1);
            match unit.upload_effect(&mut effect) {
                Ok(()) => entry.set_id(side, Some(effect.id)),
                Err(e) => {
                    error!("Failed to upload effect {} to {}: {}", id, unit.devpath(), e);
                    upload.retval = -errno(&e);
                }
            }
        }
        debug!("Effect {} -> left {:?} right {:?}", id, entry.left, entry.right);
        self.effects.insert(id, entry);

        if let Err(e) = self.device.end_ff_upload(&upload) {
            error!("Failed to end effect upload {}: {}", request_id, e);
        }
    }

    fn erase(&mut self, request_id: u32) {
        let mut erase = match self.device.begin_ff_erase(request_id) {
            Ok(erase) => erase,
            Err(e) => {
                error!("Failed to begin effect erase {}: {}", request_id, e);
                return;
            }
        };

        let id = erase.effect_id as i16;
        let Self { left, right, effects, .. } = self;
        match effects.get_mut(id) {
            None => warn!("Erase of unknown effect {}", id),
            Some(entry) => {
                for (side, unit) in [(Handedness::Left, left), (Handedness::Right, right)] {
                    let (Some(unit), Some(physical_id)) = (unit.as_mut(), entry.id(side)) else {
                        continue;
                    };
                    match unit.erase_effect(physical_id) {
                        Ok(()) => entry.set_id(side, None),
                        Err(e) => {
                            error!("Failed to erase effect {} from {}: {}", id, unit.devpath(), e);
                            erase.retval = -errno(&e);
                        }
                    }
                }
                if erase.retval == 0 {
                    effects.remove(id);
                }
            }
        }

        if let Err(e) = self.device.end_ff_erase(&erase) {
            error!("Failed to end effect erase {}: {}", request_id, e);
        }
    }

    fn play(&mut self, event: Event) {
        if event.code >= FF_GAIN {
            for side in SIDES {
                if let Some(unit) = self.side_mut(side)
                    && let Err(e) = unit.write_event(event)
                {
                    warn!("Failed to forward ff code {:#x} to {}: {}", event.code, unit.devpath(), e);
                }
            }
            return;
        }

        let id = event.code as i16;
        let Some(entry) = self.effects.get(id).copied() else {
            error!("Effect {} played before it was uploaded", id);
            return;
        };
        for side in SIDES {
            let (Some(physical_id), Some(unit)) = (entry.id(side), self.side_mut(side)) else {
                continue;
            };
            if let Err(e) = unit.write_event(Event::new(EV_FF, physical_id as u16, event.value)) {
                warn!("Failed to play effect {} on {}: {}", id, unit.devpath(), e);
            }
        }
    }

    /// Takes the unit at `devpath` out; the controller keeps running on the
    /// other side.
    pub fn remove_physical(&mut self, devpath: &str, mux: &mut Multiplexer) -> Result<PhysicalController> {
        let side = SIDES
            .into_iter()
            .find(|&side| self.side(side).is_some_and(|unit| unit.devpath() == devpath))
            .ok_or_else(|| {
                Error::Ownership(format!("player {} does not own {}", self.slot + 1, devpath))
            })?;

        let unit = self
            .slot_of(side)
            .take()
            .ok_or_else(|| Error::Ownership(format!("{devpath} vanished from its side")))?;
        self.effects.clear_side(side);
        // The departing fd must leave the epoll set while it is still open.
        self.resubscribe(mux)?;
        info!("Player {}: {} detached", self.slot + 1, devpath);
        Ok(unit)
    }

    /// Fills the vacancy left by a disconnect and replays every tracked effect.
    pub fn add_physical(&mut self, unit: PhysicalController, mux: &mut Multiplexer) -> Result<()> {
        let side = unit
            .handedness()
            .filter(|&side| self.side(side).is_none())
            .ok_or_else(|| {
                Error::Ownership(format!(
                    "player {} has no vacancy for {} at {}",
                    self.slot + 1,
                    unit.model(),
                    unit.devpath()
                ))
            })?;

        let slot = self.slot;
        let unit = self.slot_of(side).insert(unit);
        show_player(unit, slot);
        self.resubscribe(mux)?;

        let Self { left, right, effects, .. } = self;
        let Some(unit) = (match side {
            Handedness::Left => left.as_mut(),
            Handedness::Right => right.as_mut(),
        }) else {
            return Ok(());
        };
        for (id, entry) in effects.iter_mut() {
            let mut effect = entry.params;
            effect.id = -1;
            match unit.upload_effect(&mut effect) {
                Ok(()) => entry.set_id(side, Some(effect.id)),
                Err(e) => error!("Failed to restore effect {} on {}: {}", id, unit.devpath(), e),
            }
        }
        info!("Player {}: {} attached", slot + 1, unit.devpath());
        Ok(())
    }

    pub fn release(mut self, mux: &mut Multiplexer) -> Result<Vec<PhysicalController>> {
        if let Some(id) = self.subscription.take() {
            mux.remove_subscriber(id)?;
        }
        Ok(self.left.into_iter().chain(self.right).collect())
    }
}
