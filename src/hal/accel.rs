// src/hal/accel.rs
//! Trigno accelerometer adapter: 48 hardware channels, three per sensor
//!
//! Each selected index names the x channel of one sensor; y and z follow in
//! the next two hardware channels. The adapter interleaves the three axes per
//! sample into one row per sensor and appends a wall-clock timestamp row, so
//! accelerometer batches can be aligned with the faster EMG stream.

use crate::config::constants::accel::AXES_PER_SENSOR;
use crate::config::{ConnectionConfig, SystemConfig};
use crate::error::{TrignoError, TrignoResult};
use crate::hal::session::{Session, SessionConfig};
use crate::hal::traits::TrignoDevice;
use crate::hal::types::{
    ChannelSelection, CommandStatus, DeviceFamily, DeviceInfo, DeviceState, SampleMatrix,
};
use crate::utils::time::{SystemTimeProvider, TimeProvider};
use async_trait::async_trait;
use ndarray::Array2;
use std::fmt;
use std::sync::Arc;

pub struct TrignoAccel {
    session: Session,
    selection: ChannelSelection,
    samples_per_read: usize,
    time_provider: Arc<dyn TimeProvider>,
}

impl fmt::Debug for TrignoAccel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrignoAccel")
            .field("session", &self.session)
            .field("selection", &self.selection)
            .field("samples_per_read", &self.samples_per_read)
            .finish()
    }
}

impl TrignoAccel {
    pub async fn connect(
        connection: &ConnectionConfig,
        selection: ChannelSelection,
        samples_per_read: usize,
    ) -> TrignoResult<Self> {
        ensure_family(&selection)?;
        let session = Session::connect(
            SessionConfig::for_family(connection, DeviceFamily::Accel),
            DeviceFamily::Accel,
        )
        .await?;

        Ok(Self {
            session,
            selection,
            samples_per_read,
            time_provider: Arc::new(SystemTimeProvider),
        })
    }

    /// Connect using the `[connection]` and `[accel]` sections
    pub async fn from_config(config: &SystemConfig) -> TrignoResult<Self> {
        Self::connect(
            &config.connection,
            config.accel.selection()?,
            config.accel.samples_per_read,
        )
        .await
    }

    /// Replace the clock used for the timestamp row
    pub fn with_time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = time_provider;
        self
    }

    pub fn samples_per_read(&self) -> usize {
        self.samples_per_read
    }

    pub fn sampling_rate(&self) -> f64 {
        DeviceFamily::Accel.sampling_rate_hz()
    }

    pub async fn shutdown(self) -> TrignoResult<()> {
        self.session.shutdown().await
    }
}

fn ensure_family(selection: &ChannelSelection) -> TrignoResult<()> {
    if selection.family() != DeviceFamily::Accel {
        return Err(TrignoError::Configuration(format!(
            "{} channel selection cannot drive the accelerometer adapter",
            selection.family()
        )));
    }
    Ok(())
}

/// Interleave x/y/z per sample for every selected sensor and append a timestamp row
///
/// Output shape is `(selection.len() + 1, 3 * samples)` with row `i` laid out
/// as `x0, y0, z0, x1, y1, z1, ...`.
pub fn regroup_axes(
    frame: &SampleMatrix,
    selection: &ChannelSelection,
    timestamp: f64,
) -> SampleMatrix {
    let samples = frame.ncols();
    let sensors = selection.len();
    let mut data = Array2::zeros((sensors + 1, AXES_PER_SENSOR * samples));

    for (row, first) in selection.zero_based().into_iter().enumerate() {
        for sample in 0..samples {
            for axis in 0..AXES_PER_SENSOR {
                data[[row, AXES_PER_SENSOR * sample + axis]] = frame[[first + axis, sample]];
            }
        }
    }

    data.row_mut(sensors).fill(timestamp);
    data
}

#[async_trait]
impl TrignoDevice for TrignoAccel {
    async fn start(&mut self) -> TrignoResult<CommandStatus> {
        self.session.start().await
    }

    async fn stop(&mut self) -> TrignoResult<CommandStatus> {
        self.session.stop().await
    }

    async fn reset(&mut self) -> TrignoResult<()> {
        self.session.reset().await
    }

    async fn read(&mut self) -> TrignoResult<SampleMatrix> {
        let frame = self.session.read(self.samples_per_read).await?;
        let timestamp = self.time_provider.now_secs_f64();
        Ok(regroup_axes(&frame, &self.selection, timestamp))
    }

    fn set_channel_selection(&mut self, selection: ChannelSelection) -> TrignoResult<usize> {
        ensure_family(&selection)?;
        self.selection = selection;
        Ok(self.selection.len())
    }

    fn channel_selection(&self) -> &ChannelSelection {
        &self.selection
    }

    fn state(&self) -> DeviceState {
        self.session.state()
    }

    fn device_info(&self) -> DeviceInfo {
        let config = self.session.config();
        DeviceInfo {
            family: DeviceFamily::Accel,
            host: config.host.clone(),
            command_port: config.command_port,
            data_port: config.data_port,
            total_channels: self.session.total_channels(),
            samples_per_read: self.samples_per_read,
            sampling_rate_hz: self.sampling_rate(),
        }
    }
}
