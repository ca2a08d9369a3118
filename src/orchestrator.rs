//! Owns every unit and decides which virtual controller it belongs to.

use crate::devices::DeviceBackend;
use crate::discovery::{Action, DeviceInfo, DiscoveryEvent};
use crate::error::{Error, Result};
use crate::multiplexer::{EventMultiplexer, SubscriberId};
use crate::pairing::{Handedness, PairingState};
use crate::physical::PhysicalController;
use crate::slots::SlotArena;
use crate::virtual_ctlr::{Combined, Passthrough, VirtualController};
use log::{debug, info, trace, warn};
use std::collections::HashMap;
use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

/// Who handles readiness on a registered fd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    Discovery,
    /// A unit still in the pairing pool, by devpath.
    Pooled(String),
    /// An active virtual controller, by slot.
    Active(usize),
}

pub type Multiplexer = EventMultiplexer<Owner>;

struct Pooled {
    unit: PhysicalController,
    subscription: SubscriberId,
}

/// Everything readiness is dispatched to: the pairing pool, the active
/// controllers and the backend that creates their devices.
struct Controllers<B: DeviceBackend> {
    backend: B,
    pool: HashMap<String, Pooled>,
    active: SlotArena<VirtualController>,
    blink_on: bool,
}

pub struct Orchestrator<B: DeviceBackend> {
    mux: Multiplexer,
    controllers: Controllers<B>,
}

impl<B: DeviceBackend> Orchestrator<B> {
    pub fn new(backend: B, max_events: usize) -> Result<Self> {
        Ok(Self {
            mux: Multiplexer::new(max_events)?,
            controllers: Controllers {
                backend,
                pool: HashMap::new(),
                active: SlotArena::new(),
                blink_on: false,
            },
        })
    }

    pub fn backend(&self) -> &B {
        &self.controllers.backend
    }

    pub fn multiplexer(&self) -> &Multiplexer {
        &self.mux
    }

    pub fn watch_discovery(&mut self, fd: RawFd) -> Result<SubscriberId> {
        self.mux.add_subscriber(&[fd], Owner::Discovery)
    }

    pub fn add_device(&mut self, info: &DeviceInfo) -> Result<()> {
        self.controllers.add_device(&mut self.mux, info)
    }

    pub fn remove_device(&mut self, devpath: &str) -> Result<()> {
        self.controllers.remove_device(&mut self.mux, devpath)
    }

    pub fn handle_discovery(&mut self, events: Vec<DiscoveryEvent>) -> Result<()> {
        self.controllers.handle_discovery(&mut self.mux, events)
    }

    /// Waits once and handles the batch. `discover` drains the discovery
    /// source when its fd is ready. Returns the batch size.
    pub fn poll<D>(&mut self, timeout: Option<Duration>, mut discover: D) -> Result<usize>
    where
        D: FnMut() -> Vec<DiscoveryEvent>,
    {
        let Self { mux, controllers } = self;
        mux.wait_and_dispatch(timeout, |mux, readiness| match &readiness.owner {
            Owner::Discovery => controllers.handle_discovery(mux, discover()),
            Owner::Pooled(devpath) => controllers.handle_pooled(mux, devpath),
            Owner::Active(slot) => match controllers.active.get_mut(*slot) {
                Some(controller) => controller.handle_event(readiness.fd),
                None => Ok(()),
            },
        })
    }

    /// Toggles the LEDs of every unit still pairing.
    pub fn blink_pairing_leds(&mut self) {
        let controllers = &mut self.controllers;
        controllers.blink_on = !controllers.blink_on;
        for (devpath, pooled) in controllers.pool.iter_mut() {
            if let Err(e) = pooled.unit.set_all_player_leds(controllers.blink_on) {
                warn!("Failed to blink LEDs of {}: {}", devpath, e);
            }
        }
    }

    /// Deregisters and drops everything.
    pub fn shutdown(mut self) -> Result<()> {
        let Self { mux, controllers } = &mut self;
        let slots: Vec<usize> = controllers.active.iter().map(|(slot, _)| slot).collect();
        for slot in slots {
            if let Some(controller) = controllers.active.remove(slot) {
                controller.release(mux)?;
            }
        }
        for (_, pooled) in controllers.pool.drain() {
            mux.remove_subscriber(pooled.subscription)?;
        }
        Ok(())
    }

    pub fn active_slot_of(&self, devpath: &str) -> Option<usize> {
        self.controllers.active_slot_of(devpath)
    }

    pub fn is_pooled(&self, devpath: &str) -> bool {
        self.controllers.pool.contains_key(devpath)
    }

    pub fn pooled_devpaths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.controllers.pool.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn pairing_state(&self, devpath: &str) -> Option<PairingState> {
        self.controllers
            .pool
            .get(devpath)
            .map(|p| p.unit.pairing_state())
    }

    pub fn controller(&self, slot: usize) -> Option<&VirtualController> {
        self.controllers.active.get(slot)
    }

    pub fn active_count(&self) -> usize {
        self.controllers.active.len()
    }
}

impl<B: DeviceBackend> AsRawFd for Orchestrator<B> {
    fn as_raw_fd(&self) -> RawFd {
        self.mux.as_raw_fd()
    }
}

impl<B: DeviceBackend> Controllers<B> {
    fn active_slot_of(&self, devpath: &str) -> Option<usize> {
        self.active
            .position(|controller| controller.contains_physical(devpath))
    }

    fn is_known(&self, devpath: &str) -> bool {
        self.pool.contains_key(devpath) || self.active_slot_of(devpath).is_some()
    }

    fn add_device(&mut self, mux: &mut Multiplexer, info: &DeviceInfo) -> Result<()> {
        if self.is_known(info.devpath.as_str()) {
            debug!("Ignoring duplicate add of {}", info.devpath);
            return Ok(());
        }
        let Some(devnode) = info.devnode.as_deref() else {
            trace!("Ignoring {} without a device node", info.devpath);
            return Ok(());
        };

        let device = match self.backend.open_unit(info) {
            Ok(device) => device,
            Err(e) => {
                warn!("Failed to open {}: {}", devnode.display(), e);
                return Ok(());
            }
        };
        let mut unit = PhysicalController::new(info.devpath.clone(), device);
        if let Err(e) = unit.grab() {
            warn!("Failed to grab {}: {}", devnode.display(), e);
        }

        let subscription = mux.add_subscriber(&[unit.fd()], Owner::Pooled(info.devpath.clone()))?;
        self.pool
            .insert(info.devpath.clone(), Pooled { unit, subscription });
        Ok(())
    }

    fn remove_device(&mut self, mux: &mut Multiplexer, devpath: &str) -> Result<()> {
        if let Some(pooled) = self.pool.remove(devpath) {
            mux.remove_subscriber(pooled.subscription)?;
            info!("{} at {} removed while pairing", pooled.unit.model(), devpath);
            return Ok(());
        }

        let Some(slot) = self.active_slot_of(devpath) else {
            debug!("Removal of unmanaged device {}", devpath);
            return Ok(());
        };

        // A combined controller outlives its first departing side.
        if let Some(VirtualController::Combined(combined)) = self.active.get_mut(slot) {
            combined.remove_physical(devpath, mux)?;
            if !combined.is_empty() {
                return Ok(());
            }
        }

        let controller = self
            .active
            .remove(slot)
            .ok_or_else(|| Error::Ownership(format!("slot {slot} emptied during removal")))?;
        controller.release(mux)?;
        info!("Player {} disconnected", slot + 1);
        Ok(())
    }

    fn handle_discovery(&mut self, mux: &mut Multiplexer, events: Vec<DiscoveryEvent>) -> Result<()> {
        for event in events {
            let device = &event.device;
            info!(
                "DEVNAME={} ACTION={:?} DEVPATH={}",
                device
                    .devnode
                    .as_ref()
                    .map_or_else(|| "-".into(), |p| p.display().to_string()),
                event.action,
                device.devpath
            );
            match event.action {
                Action::Add => self.add_device(mux, device)?,
                Action::Remove => self.remove_device(mux, &device.devpath)?,
                Action::Other => {}
            }
        }
        Ok(())
    }

    fn handle_pooled(&mut self, mux: &mut Multiplexer, devpath: &str) -> Result<()> {
        let Some(pooled) = self.pool.get_mut(devpath) else {
            return Ok(());
        };
        pooled.unit.handle_events()?;

        match pooled.unit.pairing_state() {
            PairingState::Pairing => Ok(()),
            PairingState::Lone => self.activate_passthrough(mux, devpath),
            PairingState::Horizontal => {
                info!("{} held horizontally", devpath);
                self.activate_passthrough(mux, devpath)
            }
            PairingState::Waiting => match pooled.unit.handedness() {
                Some(side) => self.pair_waiting(mux, devpath, side),
                None => Ok(()),
            },
        }
    }

    fn take_from_pool(&mut self, mux: &mut Multiplexer, devpath: &str) -> Result<PhysicalController> {
        let pooled = self
            .pool
            .remove(devpath)
            .ok_or_else(|| Error::Ownership(format!("{devpath} is not in the pairing pool")))?;
        mux.remove_subscriber(pooled.subscription)?;
        Ok(pooled.unit)
    }

    fn activate_passthrough(&mut self, mux: &mut Multiplexer, devpath: &str) -> Result<()> {
        let unit = self.take_from_pool(mux, devpath)?;
        let slot = self.active.vacant_slot();
        let controller = Passthrough::new(&mut self.backend, mux, slot, unit)?;
        self.active
            .insert_at(slot, VirtualController::Passthrough(controller));
        Ok(())
    }

    fn pair_waiting(&mut self, mux: &mut Multiplexer, devpath: &str, side: Handedness) -> Result<()> {
        let degraded = self.active.position(|controller| {
            matches!(controller, VirtualController::Combined(c) if c.needed_handedness() == Some(side))
        });
        if let Some(slot) = degraded {
            let unit = self.take_from_pool(mux, devpath)?;
            if let Some(VirtualController::Combined(combined)) = self.active.get_mut(slot) {
                combined.add_physical(unit, mux)?;
            }
            return Ok(());
        }

        let partner = self
            .pool
            .iter()
            .filter(|(_, pooled)| {
                pooled.unit.pairing_state() == PairingState::Waiting
                    && pooled.unit.handedness() == Some(side.opposite())
            })
            .map(|(path, _)| path.clone())
            .min();
        let Some(partner) = partner else {
            debug!("{} is waiting for a partner", devpath);
            return Ok(());
        };

        let unit = self.take_from_pool(mux, devpath)?;
        let other = self.take_from_pool(mux, &partner)?;
        let (left, right) = match side {
            Handedness::Left => (unit, other),
            Handedness::Right => (other, unit),
        };
        let slot = self.active.vacant_slot();
        let controller = Combined::new(&mut self.backend, mux, slot, Some(left), Some(right))?;
        self.active
            .insert_at(slot, VirtualController::Combined(controller));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::mock::{MockBackend, device_info};
    use crate::pairing::Model;

    #[test]
    fn duplicate_adds_are_ignored() {
        let backend = MockBackend::new();
        backend.stage_unit("/devices/a/event1", Model::ProController);
        let mut orchestrator = Orchestrator::new(backend, 10).unwrap();

        orchestrator.add_device(&device_info("/devices/a/event1")).unwrap();
        orchestrator.add_device(&device_info("/devices/a/event1")).unwrap();
        assert_eq!(orchestrator.pooled_devpaths(), vec!["/devices/a/event1".to_string()]);
        assert_eq!(orchestrator.multiplexer().len(), 1);
    }

    #[test]
    fn unopenable_devices_are_skipped() {
        let mut orchestrator = Orchestrator::new(MockBackend::new(), 10).unwrap();
        orchestrator.add_device(&device_info("/devices/missing/event3")).unwrap();
        assert!(orchestrator.pooled_devpaths().is_empty());
    }

    #[test]
    fn blinking_toggles_pooled_leds() {
        let backend = MockBackend::new();
        let unit = backend.stage_unit("/devices/a/event1", Model::LeftJoycon);
        let mut orchestrator = Orchestrator::new(backend, 10).unwrap();
        orchestrator.add_device(&device_info("/devices/a/event1")).unwrap();

        orchestrator.blink_pairing_leds();
        assert_eq!(unit.leds(), [true; 4]);
        orchestrator.blink_pairing_leds();
        assert_eq!(unit.leds(), [false; 4]);

        unit.set_fail_leds(true);
        orchestrator.blink_pairing_leds();
    }
}
