//! Trigno-Core: protocol client for Delsys Trigno wireless EMG/IMU acquisition
//!
//! The Trigno Control Utility (TCU) exposes a text command socket and one
//! binary data socket per device family. This library provides:
//!
//! - A command channel with `OK`-reply validation
//! - A frame reader that accumulates TCP chunks into complete frames
//! - A little-endian float decoder producing (channel × sample) matrices
//! - EMG and accelerometer adapters with channel selection
//! - Batched CSV recording and a multi-device acquisition harness
//! - An in-process TCU simulator for tests and demos
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use trigno_core::config::SystemConfig;
//! use trigno_core::hal::{TrignoDevice, TrignoEmg};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = SystemConfig::default();
//!     config.emg.channels = vec![1, 2];
//!
//!     let mut emg = TrignoEmg::from_config(&config).await?;
//!     emg.start().await?;
//!
//!     for _ in 0..10 {
//!         let data = emg.read().await?;
//!         println!("EMG batch: {:?}", data.dim());
//!     }
//!
//!     emg.stop().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod acquisition;
pub mod config;
pub mod error;
pub mod hal;
pub mod utils;

// Re-export commonly used types for convenience
pub use error::{Severity, TrignoError, TrignoResult};

pub use hal::{
    ChannelSelection, CommandStatus, DeviceFamily, DeviceInfo, DeviceState, SampleMatrix,
    TrignoAccel, TrignoDevice, TrignoEmg, Units,
};

pub use utils::time::{current_timestamp_nanos, TimeProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Protocol client for Delsys Trigno EMG/IMU acquisition".to_string(),
        features: vec![
            "TCU command channel".to_string(),
            "Frame accumulation and decoding".to_string(),
            "EMG and accelerometer adapters".to_string(),
            "Batched CSV recording".to_string(),
            "In-process TCU simulator".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}
