pub mod config;
pub mod daemon;
pub mod devices;
pub mod discovery;
pub mod error;
pub mod ffi;
pub mod logger;
pub mod multiplexer;
pub mod orchestrator;
pub mod pairing;
pub mod physical;
pub mod protocol;
pub mod report;
pub mod slots;
pub mod virtual_ctlr;

pub use error::{Error, Result};
