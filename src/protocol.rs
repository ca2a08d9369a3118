// Kernel input protocol constants (linux/input-event-codes.h, linux/uinput.h)
pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;
pub const EV_ABS: u16 = 0x03;
pub const EV_FF: u16 = 0x15;
pub const EV_UINPUT: u16 = 0x0101;

pub const SYN_REPORT: u16 = 0x00;
pub const SYN_DROPPED: u16 = 0x03;

pub const UI_FF_UPLOAD: u16 = 1;
pub const UI_FF_ERASE: u16 = 2;

pub const BTN_TL: u16 = 0x136;
pub const BTN_TR: u16 = 0x137;
pub const BTN_TL2: u16 = 0x138;
pub const BTN_TR2: u16 = 0x139;

pub const FF_RUMBLE: u16 = 0x50;
pub const FF_PERIODIC: u16 = 0x51;
pub const FF_SQUARE: u16 = 0x58;
pub const FF_TRIANGLE: u16 = 0x59;
pub const FF_SINE: u16 = 0x5a;
/// First of the device-wide FF codes (gain, autocenter); never an effect id.
pub const FF_GAIN: u16 = 0x60;

pub const BUS_VIRTUAL: u16 = 0x06;

// hid-nintendo identities
pub const VENDOR_NINTENDO: u16 = 0x057e;
pub const PRODUCT_LEFT_JOYCON: u16 = 0x2006;
pub const PRODUCT_RIGHT_JOYCON: u16 = 0x2007;
pub const PRODUCT_PROCON: u16 = 0x2009;
pub const PRODUCT_SNESCON: u16 = 0x2017;

/// Player indicator LEDs on every supported unit.
pub const PLAYER_LED_COUNT: usize = 4;
