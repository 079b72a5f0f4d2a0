//! Infrastructure Layer
//!
//! Everything that talks to the outside world: the bluetooth stack and
//! the logging setup.

pub mod bluetooth;
pub mod logging;
