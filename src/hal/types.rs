// src/hal/types.rs
//! Core types for Trigno device abstraction

use crate::config::constants::{accel, emg, recording};
use crate::error::{TrignoError, TrignoResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decoded samples, one row per channel and one column per sample
pub type SampleMatrix = Array2<f64>;

/// Device families exposed by the TCU, each on its own data port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceFamily {
    Emg,
    Accel,
}

impl DeviceFamily {
    /// Fixed hardware channel count of the family
    pub fn total_channels(self) -> usize {
        match self {
            DeviceFamily::Emg => emg::TOTAL_CHANNELS,
            DeviceFamily::Accel => accel::TOTAL_CHANNELS,
        }
    }

    /// Largest selectable 1-based index
    pub fn max_selectable(self) -> usize {
        match self {
            DeviceFamily::Emg => emg::TOTAL_CHANNELS,
            DeviceFamily::Accel => accel::MAX_FIRST_CHANNEL,
        }
    }

    pub fn default_samples_per_read(self) -> usize {
        match self {
            DeviceFamily::Emg => emg::DEFAULT_SAMPLES_PER_READ,
            DeviceFamily::Accel => accel::DEFAULT_SAMPLES_PER_READ,
        }
    }

    pub fn sampling_rate_hz(self) -> f64 {
        match self {
            DeviceFamily::Emg => emg::SAMPLING_RATE_HZ,
            DeviceFamily::Accel => accel::SAMPLING_RATE_HZ,
        }
    }
}

impl fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceFamily::Emg => write!(f, "EMG"),
            DeviceFamily::Accel => write!(f, "ACC"),
        }
    }
}

/// Ordered, validated list of 1-based hardware channel indices
///
/// Order is preserved exactly as given; duplicates are allowed and produce
/// duplicated output rows. For the accelerometer family every index is the
/// x channel of a contiguous x/y/z block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSelection {
    family: DeviceFamily,
    indices: Vec<usize>,
}

impl ChannelSelection {
    pub fn new(family: DeviceFamily, indices: impl Into<Vec<usize>>) -> TrignoResult<Self> {
        let indices = indices.into();
        if indices.is_empty() {
            return Err(TrignoError::EmptyChannelSelection);
        }

        let max = family.max_selectable();
        if let Some(&index) = indices.iter().find(|&&i| i == 0 || i > max) {
            return Err(TrignoError::InvalidChannelSelection { index, max });
        }

        Ok(Self { family, indices })
    }

    pub fn emg(indices: impl Into<Vec<usize>>) -> TrignoResult<Self> {
        Self::new(DeviceFamily::Emg, indices)
    }

    /// Accelerometer selection by first hardware channel of each sensor
    pub fn accel(indices: impl Into<Vec<usize>>) -> TrignoResult<Self> {
        Self::new(DeviceFamily::Accel, indices)
    }

    /// Accelerometer selection by 1-based sensor number (sensor `s` starts at channel `3(s-1)+1`)
    pub fn accel_sensors(sensors: &[usize]) -> TrignoResult<Self> {
        let max_sensor = accel::TOTAL_CHANNELS / accel::AXES_PER_SENSOR;
        let mut indices = Vec::with_capacity(sensors.len());
        for &sensor in sensors {
            if sensor == 0 || sensor > max_sensor {
                return Err(TrignoError::InvalidChannelSelection {
                    index: sensor,
                    max: max_sensor,
                });
            }
            indices.push((sensor - 1) * accel::AXES_PER_SENSOR + 1);
        }
        Self::accel(indices)
    }

    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// 0-based row positions in the decoded frame
    pub fn zero_based(&self) -> Vec<usize> {
        self.indices.iter().map(|i| i - 1).collect()
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// CSV header for a selection: `ch<N>` per selected channel plus a trailing label column
pub fn channel_header(selection: &ChannelSelection, label: &str) -> Vec<String> {
    selection
        .indices()
        .iter()
        .map(|i| format!("{}{}", recording::CHANNEL_NAME_PREFIX, i))
        .chain(std::iter::once(label.to_string()))
        .collect()
}

/// Unit policy for EMG values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Units {
    #[default]
    #[serde(rename = "V")]
    Volts,
    #[serde(rename = "mV")]
    Millivolts,
    #[serde(rename = "normalized")]
    Normalized,
}

impl Units {
    /// Multiplicative factor converting raw volts to these units
    pub fn scaler(self) -> f64 {
        match self {
            Units::Volts => emg::SCALER_VOLTS,
            Units::Millivolts => emg::SCALER_MILLIVOLTS,
            Units::Normalized => emg::SCALER_NORMALIZED,
        }
    }
}

/// Adapter lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    Idle,
    Started,
    Stopped,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceState::Idle => write!(f, "idle"),
            DeviceState::Started => write!(f, "started"),
            DeviceState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Outcome of a command round trip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Accepted,
    Rejected { command: String, reply: String },
}

impl CommandStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, CommandStatus::Accepted)
    }

    /// Turn a rejection into [`TrignoError::CommandRejected`] for callers that want strictness
    pub fn into_result(self) -> TrignoResult<()> {
        match self {
            CommandStatus::Accepted => Ok(()),
            CommandStatus::Rejected { command, reply } => {
                Err(TrignoError::CommandRejected { command, reply })
            }
        }
    }
}

/// Static description of a connected adapter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceInfo {
    pub family: DeviceFamily,
    pub host: String,
    pub command_port: u16,
    pub data_port: u16,
    pub total_channels: usize,
    pub samples_per_read: usize,
    pub sampling_rate_hz: f64,
}
