//! DrishtiIO - Client-side communication stack for networked depth sensors
//!
//! This library provides the pieces needed to talk to a sensor over the
//! network: CoLa2 control sessions, background frame acquisition, and AutoIP
//! discovery.
//!
//! ## Features
//!
//! - `mock`: Enable scripted transports for hardware-free testing

pub mod acquisition;
pub mod config;
pub mod discovery;
pub mod error;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Error, Result};
