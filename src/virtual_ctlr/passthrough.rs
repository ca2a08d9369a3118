use super::{read_error, show_player};
use crate::devices::{DeviceBackend, SynthesizedDevice};
use crate::error::{Error, Result};
use crate::multiplexer::SubscriberId;
use crate::orchestrator::{Multiplexer, Owner};
use crate::physical::PhysicalController;
use log::{info, warn};
use std::os::unix::io::RawFd;

/// A single unit exposed as its own virtual device.
pub struct Passthrough {
    unit: PhysicalController,
    device: Box<dyn SynthesizedDevice>,
    subscription: SubscriberId,
}

impl Passthrough {
    pub fn new(
        backend: &mut dyn DeviceBackend,
        mux: &mut Multiplexer,
        slot: usize,
        mut unit: PhysicalController,
    ) -> Result<Self> {
        show_player(&mut unit, slot);

        // Input only: rumble stays with the physical node.
        let mut profile = unit.device().profile().clone();
        profile.ff.clear();
        profile.ff_effects_max = 0;
        let device = backend.create_virtual(&profile).map_err(Error::VirtualDevice)?;

        let subscription = mux.add_subscriber(&[unit.fd()], Owner::Active(slot))?;
        info!("Player {}: {} at {}", slot + 1, unit.model(), unit.devpath());

        Ok(Self {
            unit,
            device,
            subscription,
        })
    }

    pub fn unit(&self) -> &PhysicalController {
        &self.unit
    }

    pub fn contains_fd(&self, fd: RawFd) -> bool {
        fd == self.unit.fd() || fd == self.device.as_raw_fd()
    }

    pub fn handle_event(&mut self, fd: RawFd) -> Result<()> {
        if fd != self.unit.fd() {
            return Ok(());
        }
        loop {
            match self.unit.next_report() {
                Ok(Some(report)) => {
                    if let Err(e) = self.device.write_event(report.event) {
                        warn!("Failed to relay input from {}: {}", self.unit.devpath(), e);
                    }
                }
                Ok(None) => return Ok(()),
                Err(e) => return read_error(&self.unit, e),
            }
        }
    }

    pub fn release(self, mux: &mut Multiplexer) -> Result<PhysicalController> {
        mux.remove_subscriber(self.subscription)?;
        Ok(self.unit)
    }
}
