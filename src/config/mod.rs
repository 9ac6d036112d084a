// src/config/mod.rs
//! Layered configuration for Trigno acquisition

pub mod constants;
pub mod loader;

pub use constants::*;
pub use loader::ConfigLoader;

use crate::error::{TrignoError, TrignoResult};
use crate::hal::types::{ChannelSelection, DeviceFamily, Units};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete system configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct SystemConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub emg: EmgConfig,
    #[serde(default)]
    pub accel: AccelConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
}

/// TCU endpoint and socket timeouts
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConnectionConfig {
    #[serde(default = "defaults::host")]
    pub host: String,

    #[serde(default = "defaults::command_port")]
    pub command_port: u16,

    #[serde(default = "defaults::emg_data_port")]
    pub emg_data_port: u16,

    #[serde(default = "defaults::accel_data_port")]
    pub accel_data_port: u16,

    #[serde(default = "defaults::connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "defaults::read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// EMG stream settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmgConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// 1-based hardware channels in output order
    #[serde(default = "defaults::channels")]
    pub channels: Vec<usize>,

    #[serde(default = "defaults::emg_samples_per_read")]
    pub samples_per_read: usize,

    #[serde(default)]
    pub units: Units,
}

/// Accelerometer stream settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AccelConfig {
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// 1-based x channel of each sensor, in output order
    #[serde(default = "defaults::channels")]
    pub channels: Vec<usize>,

    #[serde(default = "defaults::accel_samples_per_read")]
    pub samples_per_read: usize,
}

/// CSV recording and acquisition loop settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RecordingConfig {
    #[serde(default = "defaults::output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "defaults::emg_file_name")]
    pub emg_file_name: String,

    #[serde(default = "defaults::imu_file_name")]
    pub imu_file_name: String,

    /// Reads buffered before a CSV flush
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Constant written to the EMG label column
    #[serde(default = "defaults::label_value")]
    pub label_value: f64,

    /// Reset attempts after a disconnect before the loop gives up
    #[serde(default = "defaults::max_reconnects")]
    pub max_reconnects: u32,
}

/// Default value providers using constants
mod defaults {
    use crate::config::constants::*;
    use std::path::PathBuf;

    pub fn host() -> String { protocol::DEFAULT_HOST.to_string() }
    pub fn command_port() -> u16 { protocol::DEFAULT_COMMAND_PORT }
    pub fn emg_data_port() -> u16 { protocol::DEFAULT_EMG_DATA_PORT }
    pub fn accel_data_port() -> u16 { protocol::DEFAULT_ACCEL_DATA_PORT }
    pub fn connect_timeout_ms() -> u64 { protocol::DEFAULT_CONNECTION_TIMEOUT_MS }
    pub fn read_timeout_ms() -> u64 { protocol::DEFAULT_READ_TIMEOUT_MS }

    pub fn enabled() -> bool { true }
    pub fn channels() -> Vec<usize> { vec![1] }
    pub fn emg_samples_per_read() -> usize { emg::DEFAULT_SAMPLES_PER_READ }
    pub fn accel_samples_per_read() -> usize { accel::DEFAULT_SAMPLES_PER_READ }

    pub fn output_dir() -> PathBuf { PathBuf::from(recording::DEFAULT_OUTPUT_DIR) }
    pub fn emg_file_name() -> String { recording::DEFAULT_EMG_FILE_NAME.to_string() }
    pub fn imu_file_name() -> String { recording::DEFAULT_IMU_FILE_NAME.to_string() }
    pub fn batch_size() -> usize { recording::DEFAULT_BATCH_SIZE }
    pub fn poll_interval_ms() -> u64 { recording::DEFAULT_POLL_INTERVAL_MS }
    pub fn label_value() -> f64 { recording::DEFAULT_LABEL_VALUE }
    pub fn max_reconnects() -> u32 { recording::DEFAULT_MAX_RECONNECTS }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            command_port: defaults::command_port(),
            emg_data_port: defaults::emg_data_port(),
            accel_data_port: defaults::accel_data_port(),
            connect_timeout_ms: defaults::connect_timeout_ms(),
            read_timeout_ms: defaults::read_timeout_ms(),
        }
    }
}

impl Default for EmgConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            channels: defaults::channels(),
            samples_per_read: defaults::emg_samples_per_read(),
            units: Units::default(),
        }
    }
}

impl Default for AccelConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            channels: defaults::channels(),
            samples_per_read: defaults::accel_samples_per_read(),
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: defaults::output_dir(),
            emg_file_name: defaults::emg_file_name(),
            imu_file_name: defaults::imu_file_name(),
            batch_size: defaults::batch_size(),
            poll_interval_ms: defaults::poll_interval_ms(),
            label_value: defaults::label_value(),
            max_reconnects: defaults::max_reconnects(),
        }
    }
}

impl ConnectionConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn data_port(&self, family: DeviceFamily) -> u16 {
        match family {
            DeviceFamily::Emg => self.emg_data_port,
            DeviceFamily::Accel => self.accel_data_port,
        }
    }
}

impl EmgConfig {
    pub fn selection(&self) -> TrignoResult<ChannelSelection> {
        ChannelSelection::emg(self.channels.clone())
    }
}

impl AccelConfig {
    pub fn selection(&self) -> TrignoResult<ChannelSelection> {
        ChannelSelection::accel(self.channels.clone())
    }
}

impl RecordingConfig {
    pub fn emg_path(&self) -> PathBuf {
        self.output_dir.join(&self.emg_file_name)
    }

    pub fn imu_path(&self) -> PathBuf {
        self.output_dir.join(&self.imu_file_name)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Configuration utility functions
impl SystemConfig {
    /// Validate configuration consistency
    pub fn validate_consistency(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let conn = &self.connection;

        if conn.host.trim().is_empty() {
            errors.push("connection.host must not be empty".to_string());
        }

        for (name, port) in [
            ("command_port", conn.command_port),
            ("emg_data_port", conn.emg_data_port),
            ("accel_data_port", conn.accel_data_port),
        ] {
            if port == 0 {
                errors.push(format!("connection.{} must be non-zero", name));
            }
        }
        if conn.command_port == conn.emg_data_port || conn.command_port == conn.accel_data_port {
            errors.push("command and data ports must differ".to_string());
        }

        for (name, value) in [
            ("connect_timeout_ms", conn.connect_timeout_ms),
            ("read_timeout_ms", conn.read_timeout_ms),
        ] {
            if value == 0 || value > protocol::MAX_TIMEOUT_MS {
                errors.push(format!(
                    "connection.{} ({}) must be within 1..={}",
                    name,
                    value,
                    protocol::MAX_TIMEOUT_MS
                ));
            }
        }

        if self.emg.enabled {
            if let Err(e) = self.emg.selection() {
                errors.push(format!("emg.channels: {}", e));
            }
            let samples = self.emg.samples_per_read;
            if samples == 0 || samples > protocol::MAX_SAMPLES_PER_READ {
                errors.push(format!(
                    "emg.samples_per_read ({}) must be within 1..={}",
                    samples,
                    protocol::MAX_SAMPLES_PER_READ
                ));
            }
        }

        if self.accel.enabled {
            if let Err(e) = self.accel.selection() {
                errors.push(format!("accel.channels: {}", e));
            }
            let samples = self.accel.samples_per_read;
            if samples == 0 || samples > protocol::MAX_SAMPLES_PER_READ {
                errors.push(format!(
                    "accel.samples_per_read ({}) must be within 1..={}",
                    samples,
                    protocol::MAX_SAMPLES_PER_READ
                ));
            }
        }

        if !self.emg.enabled && !self.accel.enabled {
            errors.push("at least one of emg or accel must be enabled".to_string());
        }

        let rec = &self.recording;
        if rec.batch_size == 0 {
            errors.push("recording.batch_size must be positive".to_string());
        }
        if rec.emg_file_name.is_empty() || rec.imu_file_name.is_empty() {
            errors.push("recording file names must not be empty".to_string());
        }
        if rec.emg_file_name == rec.imu_file_name {
            errors.push("recording.emg_file_name and imu_file_name must differ".to_string());
        }
        if !rec.label_value.is_finite() {
            errors.push("recording.label_value must be finite".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// [`validate_consistency`](Self::validate_consistency) folded into a single error
    pub fn validate(&self) -> TrignoResult<()> {
        self.validate_consistency()
            .map_err(|errors| TrignoError::Configuration(errors.join("; ")))
    }
}
