use super::{AxisSetup, Profile};
use crate::protocol::{
    BUS_VIRTUAL, FF_GAIN, FF_PERIODIC, FF_RUMBLE, FF_SINE, FF_SQUARE, FF_TRIANGLE,
    PRODUCT_LEFT_JOYCON, VENDOR_NINTENDO,
};

/// Layout of the virtual device that stands for a left+right Joy-Con pair.
pub struct CombinedLayout;

impl CombinedLayout {
    pub const NAME: &'static str = "Nintendo Switch Combined Joy-Cons";

    pub const BUTTON_COUNT: usize = 18;

    pub const BUTTON_CODES: [u16; Self::BUTTON_COUNT] = [
        314, // BTN_SELECT     (-)
        309, // BTN_Z          (capture)
        317, // BTN_THUMBL
        315, // BTN_START      (+)
        316, // BTN_MODE       (home)
        318, // BTN_THUMBR
        304, // BTN_SOUTH      (B)
        305, // BTN_EAST       (A)
        307, // BTN_NORTH      (X)
        308, // BTN_WEST       (Y)
        544, // BTN_DPAD_UP
        545, // BTN_DPAD_DOWN
        546, // BTN_DPAD_LEFT
        547, // BTN_DPAD_RIGHT
        310, // BTN_TL         (L)
        311, // BTN_TR         (R)
        312, // BTN_TL2        (ZL)
        313, // BTN_TR2        (ZR)
    ];

    pub const AXIS_CODES: [u16; 4] = [
        0, // ABS_X  - left stick X
        1, // ABS_Y  - left stick Y
        3, // ABS_RX - right stick X
        4, // ABS_RY - right stick Y
    ];

    pub const STICK_MIN: i32 = -32767;
    pub const STICK_MAX: i32 = 32767;
    pub const STICK_FUZZ: i32 = 250;
    pub const STICK_FLAT: i32 = 500;

    pub const FF_CODES: [u16; 6] = [FF_RUMBLE, FF_PERIODIC, FF_SQUARE, FF_TRIANGLE, FF_SINE, FF_GAIN];
    pub const FF_EFFECTS_MAX: u32 = 16;

    pub fn profile() -> Profile {
        Profile {
            name: Self::NAME.to_string(),
            bustype: BUS_VIRTUAL,
            vendor: VENDOR_NINTENDO,
            product: PRODUCT_LEFT_JOYCON,
            version: 0,
            keys: Self::BUTTON_CODES.to_vec(),
            axes: Self::AXIS_CODES
                .iter()
                .map(|&code| {
                    AxisSetup::new(code, Self::STICK_MIN, Self::STICK_MAX, Self::STICK_FUZZ, Self::STICK_FLAT)
                })
                .collect(),
            ff: Self::FF_CODES.to_vec(),
            ff_effects_max: Self::FF_EFFECTS_MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_declares_sticks_and_rumble() {
        let profile = CombinedLayout::profile();
        assert_eq!(profile.keys.len(), 18);
        assert_eq!(profile.axes.len(), 4);
        assert!(profile.axes.iter().all(|a| a.fuzz == 250 && a.flat == 500 && a.max == 32767));
        assert!(profile.ff.contains(&FF_RUMBLE));
        assert_eq!(profile.vendor, 0x057e);
        assert_eq!(profile.product, 0x2006);
        assert_eq!(profile.bustype, 0x06);
    }
}
