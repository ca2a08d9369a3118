//! Pairing gestures of hid-nintendo units.

use crate::protocol::{
    BTN_TL, BTN_TL2, BTN_TR, BTN_TR2, EV_KEY, PRODUCT_LEFT_JOYCON, PRODUCT_PROCON,
    PRODUCT_RIGHT_JOYCON, PRODUCT_SNESCON, VENDOR_NINTENDO,
};
use crate::report::Report;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Model {
    LeftJoycon,
    RightJoycon,
    ProController,
    SnesController,
    Unknown,
}

impl Model {
    pub fn from_ids(vendor: u16, product: u16) -> Self {
        if vendor != VENDOR_NINTENDO {
            return Model::Unknown;
        }
        match product {
            PRODUCT_LEFT_JOYCON => Model::LeftJoycon,
            PRODUCT_RIGHT_JOYCON => Model::RightJoycon,
            PRODUCT_PROCON => Model::ProController,
            PRODUCT_SNESCON => Model::SnesController,
            _ => Model::Unknown,
        }
    }

    /// Which half of a combined controller this unit can fill.
    pub fn handedness(self) -> Option<Handedness> {
        match self {
            Model::LeftJoycon => Some(Handedness::Left),
            Model::RightJoycon => Some(Handedness::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Model::LeftJoycon => "left joy-con",
            Model::RightJoycon => "right joy-con",
            Model::ProController => "pro controller",
            Model::SnesController => "snes controller",
            Model::Unknown => "unknown controller",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn opposite(self) -> Self {
        match self {
            Handedness::Left => Handedness::Right,
            Handedness::Right => Handedness::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairingState {
    #[default]
    Pairing,
    Lone,
    Waiting,
    Horizontal,
}

/// Tracks held keys of one unit and turns chords into pairing decisions.
#[derive(Debug, Default)]
pub struct PairingDecoder {
    held: HashSet<u16>,
}

impl PairingDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one report; returns a state once the held keys form a gesture.
    pub fn decode(&mut self, model: Model, report: &Report) -> Option<PairingState> {
        let event = report.event;
        if event.type_ != EV_KEY {
            return None;
        }
        if event.value == 0 {
            self.held.remove(&event.code);
            return None;
        }
        self.held.insert(event.code);

        let held = |code| self.held.contains(&code);
        match model {
            // SL/SR of a left unit report as the right shoulder codes.
            Model::LeftJoycon => {
                if held(BTN_TR) && held(BTN_TR2) {
                    Some(PairingState::Horizontal)
                } else if held(BTN_TL) || held(BTN_TL2) {
                    Some(PairingState::Waiting)
                } else {
                    None
                }
            }
            Model::RightJoycon => {
                if held(BTN_TL) && held(BTN_TL2) {
                    Some(PairingState::Horizontal)
                } else if held(BTN_TR) || held(BTN_TR2) {
                    Some(PairingState::Waiting)
                } else {
                    None
                }
            }
            Model::ProController | Model::SnesController | Model::Unknown => {
                let left = held(BTN_TL) || held(BTN_TL2);
                let right = held(BTN_TR) || held(BTN_TR2);
                (left && right).then_some(PairingState::Lone)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Event;

    fn press(code: u16) -> Report {
        Report::normal(Event::key(code, true))
    }

    fn release(code: u16) -> Report {
        Report::normal(Event::key(code, false))
    }

    #[test]
    fn identifies_models_by_product() {
        assert_eq!(Model::from_ids(0x057e, 0x2006), Model::LeftJoycon);
        assert_eq!(Model::from_ids(0x057e, 0x2007), Model::RightJoycon);
        assert_eq!(Model::from_ids(0x057e, 0x2009), Model::ProController);
        assert_eq!(Model::from_ids(0x057e, 0x2017), Model::SnesController);
        assert_eq!(Model::from_ids(0x045e, 0x2006), Model::Unknown);
        assert_eq!(Model::LeftJoycon.handedness(), Some(Handedness::Left));
        assert_eq!(Model::ProController.handedness(), None);
    }

    #[test]
    fn pro_controller_needs_both_shoulders() {
        let mut decoder = PairingDecoder::new();
        assert_eq!(decoder.decode(Model::ProController, &press(BTN_TL)), None);
        assert_eq!(
            decoder.decode(Model::ProController, &press(BTN_TR2)),
            Some(PairingState::Lone)
        );
    }

    #[test]
    fn released_keys_do_not_count() {
        let mut decoder = PairingDecoder::new();
        decoder.decode(Model::SnesController, &press(BTN_TL));
        decoder.decode(Model::SnesController, &release(BTN_TL));
        assert_eq!(decoder.decode(Model::SnesController, &press(BTN_TR)), None);
    }

    #[test]
    fn left_joycon_gestures() {
        let mut decoder = PairingDecoder::new();
        assert_eq!(
            decoder.decode(Model::LeftJoycon, &press(BTN_TL2)),
            Some(PairingState::Waiting)
        );

        let mut decoder = PairingDecoder::new();
        assert_eq!(decoder.decode(Model::LeftJoycon, &press(BTN_TR)), None);
        assert_eq!(
            decoder.decode(Model::LeftJoycon, &press(BTN_TR2)),
            Some(PairingState::Horizontal)
        );
    }

    #[test]
    fn right_joycon_gestures() {
        let mut decoder = PairingDecoder::new();
        assert_eq!(
            decoder.decode(Model::RightJoycon, &press(BTN_TR)),
            Some(PairingState::Waiting)
        );

        let mut decoder = PairingDecoder::new();
        decoder.decode(Model::RightJoycon, &press(BTN_TL));
        assert_eq!(
            decoder.decode(Model::RightJoycon, &press(BTN_TL2)),
            Some(PairingState::Horizontal)
        );
    }
}
