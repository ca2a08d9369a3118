//! Virtual controllers built from one or two physical units.

pub mod combined;
pub mod effects;
pub mod passthrough;

pub use combined::Combined;
pub use passthrough::Passthrough;

use crate::error::{Error, Result};
use crate::orchestrator::Multiplexer;
use crate::physical::PhysicalController;
use crate::protocol::PLAYER_LED_COUNT;
use log::warn;
use std::io;
use std::os::unix::io::RawFd;

pub enum VirtualController {
    Passthrough(Passthrough),
    Combined(Combined),
}

impl VirtualController {
    pub fn contains_physical(&self, devpath: &str) -> bool {
        self.physical_units().iter().any(|unit| unit.devpath() == devpath)
    }

    pub fn contains_fd(&self, fd: RawFd) -> bool {
        match self {
            VirtualController::Passthrough(p) => p.contains_fd(fd),
            VirtualController::Combined(c) => c.contains_fd(fd),
        }
    }

    pub fn handle_event(&mut self, fd: RawFd) -> Result<()> {
        match self {
            VirtualController::Passthrough(p) => p.handle_event(fd),
            VirtualController::Combined(c) => c.handle_event(fd),
        }
    }

    pub fn physical_units(&self) -> Vec<&PhysicalController> {
        match self {
            VirtualController::Passthrough(p) => vec![p.unit()],
            VirtualController::Combined(c) => c.units(),
        }
    }

    /// Deregisters everything and hands the units back.
    pub fn release(self, mux: &mut Multiplexer) -> Result<Vec<PhysicalController>> {
        match self {
            VirtualController::Passthrough(p) => Ok(vec![p.release(mux)?]),
            VirtualController::Combined(c) => c.release(mux),
        }
    }
}

/// Lights the single LED of player `slot`.
pub(crate) fn show_player(unit: &mut PhysicalController, slot: usize) {
    if let Err(e) = unit.set_all_player_leds(false) {
        warn!("Failed to clear player LEDs of {}: {}", unit.devpath(), e);
    }
    if let Err(e) = unit.set_player_led(slot % PLAYER_LED_COUNT, true) {
        warn!("Failed to set player LED of {}: {}", unit.devpath(), e);
    }
}

/// Read failure on a relayed unit; a vanished unit is not an error here.
pub(crate) fn read_error(unit: &PhysicalController, source: io::Error) -> Result<()> {
    if source.raw_os_error() == Some(libc::ENODEV) {
        return Ok(());
    }
    Err(Error::Device {
        path: unit.devpath().to_string(),
        source,
    })
}

pub(crate) fn errno(e: &io::Error) -> i32 {
    e.raw_os_error().unwrap_or(libc::EIO)
}
