// src/hal/emg.rs
//! Trigno EMG adapter: 16 hardware channels on the EMG data port

use crate::config::{ConnectionConfig, SystemConfig};
use crate::error::{TrignoError, TrignoResult};
use crate::hal::session::{Session, SessionConfig};
use crate::hal::traits::TrignoDevice;
use crate::hal::types::{
    ChannelSelection, CommandStatus, DeviceFamily, DeviceInfo, DeviceState, SampleMatrix, Units,
};
use async_trait::async_trait;
use ndarray::Axis;

/// EMG adapter returning only the selected hardware channels
#[derive(Debug)]
pub struct TrignoEmg {
    session: Session,
    selection: ChannelSelection,
    samples_per_read: usize,
    units: Units,
}

impl TrignoEmg {
    pub async fn connect(
        connection: &ConnectionConfig,
        selection: ChannelSelection,
        samples_per_read: usize,
        units: Units,
    ) -> TrignoResult<Self> {
        ensure_family(&selection)?;
        let session = Session::connect(
            SessionConfig::for_family(connection, DeviceFamily::Emg),
            DeviceFamily::Emg,
        )
        .await?;

        Ok(Self {
            session,
            selection,
            samples_per_read,
            units,
        })
    }

    /// Connect using the `[connection]` and `[emg]` sections
    pub async fn from_config(config: &SystemConfig) -> TrignoResult<Self> {
        Self::connect(
            &config.connection,
            config.emg.selection()?,
            config.emg.samples_per_read,
            config.emg.units,
        )
        .await
    }

    /// Unit scaler for downstream consumers; `read` returns raw volts
    pub fn scaler(&self) -> f64 {
        self.units.scaler()
    }

    pub fn units(&self) -> Units {
        self.units
    }

    pub fn samples_per_read(&self) -> usize {
        self.samples_per_read
    }

    pub fn sampling_rate(&self) -> f64 {
        DeviceFamily::Emg.sampling_rate_hz()
    }

    pub async fn shutdown(self) -> TrignoResult<()> {
        self.session.shutdown().await
    }
}

fn ensure_family(selection: &ChannelSelection) -> TrignoResult<()> {
    if selection.family() != DeviceFamily::Emg {
        return Err(TrignoError::Configuration(format!(
            "{} channel selection cannot drive the EMG adapter",
            selection.family()
        )));
    }
    Ok(())
}

/// Rows of `frame` at the selected hardware channels, in selection order
pub fn extract_channels(frame: &SampleMatrix, selection: &ChannelSelection) -> SampleMatrix {
    frame.select(Axis(0), &selection.zero_based())
}

#[async_trait]
impl TrignoDevice for TrignoEmg {
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
        Ok(extract_channels(&frame, &self.selection))
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
            family: DeviceFamily::Emg,
            host: config.host.clone(),
            command_port: config.command_port,
            data_port: config.data_port,
            total_channels: self.session.total_channels(),
            samples_per_read: self.samples_per_read,
            sampling_rate_hz: self.sampling_rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn identity_frame(channels: usize, samples: usize) -> SampleMatrix {
        Array2::from_shape_fn((channels, samples), |(c, s)| (c * 1000 + s) as f64)
    }

    #[test]
    fn test_extract_preserves_selection_order() {
        let frame = identity_frame(16, 270);
        let selection = ChannelSelection::emg(vec![3, 1]).unwrap();

        let data = extract_channels(&frame, &selection);
        assert_eq!(data.dim(), (2, 270));
        assert_eq!(data.row(0), frame.row(2));
        assert_eq!(data.row(1), frame.row(0));
    }

    #[test]
    fn test_extract_all_channels() {
        let frame = identity_frame(16, 4);
        let selection = ChannelSelection::emg((1..=16).collect::<Vec<_>>()).unwrap();
        assert_eq!(extract_channels(&frame, &selection), frame);
    }

    #[test]
    fn test_rejects_accel_selection() {
        let selection = ChannelSelection::accel(vec![1]).unwrap();
        assert!(matches!(
            ensure_family(&selection),
            Err(TrignoError::Configuration(_))
        ));
    }
}
