//! Input reports as they flow between physical and virtual devices.

use crate::protocol::{EV_KEY, EV_SYN, SYN_REPORT};

/// One kernel input event without its timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub type_: u16,
    pub code: u16,
    pub value: i32,
}

impl Event {
    pub fn new(type_: u16, code: u16, value: i32) -> Self {
        Self { type_, code, value }
    }

    pub fn key(code: u16, pressed: bool) -> Self {
        Self::new(EV_KEY, code, pressed as i32)
    }

    pub fn syn_report() -> Self {
        Self::new(EV_SYN, SYN_REPORT, 0)
    }

    pub fn is_key(&self, code: u16) -> bool {
        self.type_ == EV_KEY && self.code == code
    }
}

/// Whether a report came from the live stream or from a state resync after
/// the kernel buffer overflowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    Normal,
    Sync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    pub status: ReadStatus,
    pub event: Event,
}

impl Report {
    pub fn normal(event: Event) -> Self {
        Self {
            status: ReadStatus::Normal,
            event,
        }
    }

    pub fn sync(event: Event) -> Self {
        Self {
            status: ReadStatus::Sync,
            event,
        }
    }
}
