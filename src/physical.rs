use crate::devices::UnitDevice;
use crate::error::{Error, Result};
use crate::ffi::FfEffect;
use crate::pairing::{Handedness, Model, PairingDecoder, PairingState};
use crate::protocol::PLAYER_LED_COUNT;
use crate::report::{Event, Report};
use log::{debug, info};
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

/// One hardware unit and its pairing progress.
pub struct PhysicalController {
    devpath: String,
    device: Box<dyn UnitDevice>,
    model: Model,
    decoder: PairingDecoder,
    pairing_state: PairingState,
}

impl PhysicalController {
    pub fn new(devpath: String, device: Box<dyn UnitDevice>) -> Self {
        let profile = device.profile();
        let model = profile.model();
        info!("Found {} \"{}\" at {}", model, profile.name, devpath);

        Self {
            devpath,
            device,
            model,
            decoder: PairingDecoder::new(),
            pairing_state: PairingState::Pairing,
        }
    }

    pub fn fd(&self) -> RawFd {
        self.device.as_raw_fd()
    }

    pub fn devpath(&self) -> &str {
        &self.devpath
    }

    pub fn model(&self) -> Model {
        self.model
    }

    pub fn handedness(&self) -> Option<Handedness> {
        self.model.handedness()
    }

    pub fn pairing_state(&self) -> PairingState {
        self.pairing_state
    }

    pub fn device(&self) -> &dyn UnitDevice {
        self.device.as_ref()
    }

    /// Drains pending reports and advances the pairing state.
    pub fn handle_events(&mut self) -> Result<()> {
        loop {
            let report = match self.device.next_report() {
                Ok(Some(report)) => report,
                Ok(None) => return Ok(()),
                // The unit is gone; its removal notification follows.
                Err(e) if e.raw_os_error() == Some(libc::ENODEV) => return Ok(()),
                Err(source) => {
                    return Err(Error::Device {
                        path: self.devpath.clone(),
                        source,
                    });
                }
            };

            if let Some(state) = self.decoder.decode(self.model, &report)
                && state != self.pairing_state
            {
                debug!("{} at {} is now {:?}", self.model, self.devpath, state);
                self.pairing_state = state;
            }
        }
    }

    pub fn next_report(&mut self) -> io::Result<Option<Report>> {
        self.device.next_report()
    }

    pub fn set_player_led(&mut self, index: usize, on: bool) -> io::Result<()> {
        self.device.set_player_led(index, on)
    }

    /// Sets every player LED, attempting all of them; returns the first failure.
    pub fn set_all_player_leds(&mut self, on: bool) -> io::Result<()> {
        let mut result = Ok(());
        for index in 0..PLAYER_LED_COUNT {
            if let Err(e) = self.device.set_player_led(index, on)
                && result.is_ok()
            {
                result = Err(e);
            }
        }
        result
    }

    pub fn grab(&mut self) -> io::Result<()> {
        self.device.grab()
    }

    pub fn upload_effect(&mut self, effect: &mut FfEffect) -> io::Result<()> {
        self.device.upload_effect(effect)
    }

    pub fn erase_effect(&mut self, id: i16) -> io::Result<()> {
        self.device.erase_effect(id)
    }

    pub fn write_event(&mut self, event: Event) -> io::Result<()> {
        self.device.write_event(event)
    }
}

impl AsRawFd for PhysicalController {
    fn as_raw_fd(&self) -> RawFd {
        self.fd()
    }
}
