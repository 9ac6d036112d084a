// src/hal/mod.rs
//! Hardware Abstraction Layer for the Delsys Trigno TCU

pub mod accel;
pub mod command;
pub mod emg;
pub mod frame;
pub mod session;
pub mod simulator;
pub mod traits;
pub mod types;


pub use accel::TrignoAccel;
pub use emg::TrignoEmg;
pub use traits::*;
pub use types::*;
