// src/config/constants.rs
//! System-wide protocol and acquisition constants

/// Trigno Control Utility wire protocol constants
pub mod protocol {
    use std::time::Duration;

    /// Bytes per sample per channel on both data ports
    pub const BYTES_PER_CHANNEL: usize = 4;
    /// Command string terminator
    pub const CMD_TERM: &str = "\r\n\r\n";
    /// Substring that marks a successful command reply
    pub const REPLY_OK: &str = "OK";

    pub const START_COMMAND: &str = "START";
    pub const STOP_COMMAND: &str = "STOP";

    /// Maximum size of the server greeting discarded after connect
    pub const GREETING_BUFFER_SIZE: usize = 1024;
    /// Maximum size of a command reply
    pub const REPLY_BUFFER_SIZE: usize = 128;

    pub const DEFAULT_HOST: &str = "localhost";
    pub const DEFAULT_COMMAND_PORT: u16 = 50040;
    pub const DEFAULT_EMG_DATA_PORT: u16 = 50041;
    pub const DEFAULT_ACCEL_DATA_PORT: u16 = 50042;

    pub const DEFAULT_CONNECTION_TIMEOUT_MS: u64 = 2000;
    pub const DEFAULT_READ_TIMEOUT_MS: u64 = 2000;
    pub const MAX_TIMEOUT_MS: u64 = 60_000;

    /// Upper bound on `samples_per_read` for either family
    pub const MAX_SAMPLES_PER_READ: usize = 100_000;
    /// Largest frame the reader will allocate (48 channels at the sample bound)
    pub const MAX_FRAME_BYTES: usize = MAX_SAMPLES_PER_READ * 48 * BYTES_PER_CHANNEL;

    pub const DEFAULT_CONNECTION_TIMEOUT: Duration =
        Duration::from_millis(DEFAULT_CONNECTION_TIMEOUT_MS);
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(DEFAULT_READ_TIMEOUT_MS);
}

/// EMG device family constants
pub mod emg {
    pub const TOTAL_CHANNELS: usize = 16;
    pub const DEFAULT_SAMPLES_PER_READ: usize = 270;
    pub const SAMPLING_RATE_HZ: f64 = 2000.0;

    pub const SCALER_VOLTS: f64 = 1.0;
    pub const SCALER_MILLIVOLTS: f64 = 1000.0;
    /// Maximum EMG range is 11 mV
    pub const SCALER_NORMALIZED: f64 = 1.0 / 0.011;
}

/// Accelerometer device family constants
pub mod accel {
    pub const TOTAL_CHANNELS: usize = 48;
    pub const AXES_PER_SENSOR: usize = 3;
    pub const DEFAULT_SAMPLES_PER_READ: usize = 9;
    pub const SAMPLING_RATE_HZ: f64 = 148.1;

    /// Highest 1-based index that still leaves room for the y and z channels
    pub const MAX_FIRST_CHANNEL: usize = TOTAL_CHANNELS - AXES_PER_SENSOR + 1;
}

/// Recording and acquisition loop constants
pub mod recording {
    pub const DEFAULT_EMG_FILE_NAME: &str = "delsys_emg.csv";
    pub const DEFAULT_IMU_FILE_NAME: &str = "delsys_imu.csv";
    pub const DEFAULT_OUTPUT_DIR: &str = ".";
    pub const DEFAULT_BATCH_SIZE: usize = 5;
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1;
    pub const DEFAULT_LABEL_VALUE: f64 = 1.0;
    pub const DEFAULT_MAX_RECONNECTS: u32 = 0;

    pub const CHANNEL_NAME_PREFIX: &str = "ch";
    pub const LABEL_COLUMN: &str = "label";
    pub const TIMESTAMP_COLUMN: &str = "timestamp";
}

/// Configuration discovery paths
pub mod paths {
    pub const DEFAULT_CONFIG_FILE: &str = "config/default.toml";
    pub const LOCAL_CONFIG_FILE: &str = "config/local.toml";
    pub const USER_CONFIG_DIR: &str = ".config/trigno";
    pub const ENV_PREFIX: &str = "TRIGNO";
    pub const ENV_SEPARATOR: &str = "__";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_geometry() {
        assert_eq!(emg::TOTAL_CHANNELS * protocol::BYTES_PER_CHANNEL, 64);
        assert_eq!(accel::TOTAL_CHANNELS % accel::AXES_PER_SENSOR, 0);
        assert_eq!(accel::MAX_FIRST_CHANNEL, 46);
    }

    #[test]
    fn test_normalized_scaler() {
        assert!((emg::SCALER_NORMALIZED * 0.011 - 1.0).abs() < 1e-12);
    }
}
