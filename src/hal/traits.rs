// src/hal/traits.rs
//! Core HAL traits for Trigno device abstraction

use crate::error::TrignoResult;
use crate::hal::types::{ChannelSelection, CommandStatus, DeviceInfo, DeviceState, SampleMatrix};
use async_trait::async_trait;

/// Common lifecycle of the EMG and accelerometer adapters
///
/// One task owns a device at a time; none of the methods may be called
/// concurrently on the same instance.
#[async_trait]
pub trait TrignoDevice: Send {
    /// Send `START`; a rejected reply leaves the state unchanged
    async fn start(&mut self) -> TrignoResult<CommandStatus>;

    /// Send `STOP`; only a started device moves to Stopped, and a rejected reply changes nothing
    async fn stop(&mut self) -> TrignoResult<CommandStatus>;

    /// Reopen both sockets and return to [`DeviceState::Idle`]
    async fn reset(&mut self) -> TrignoResult<()>;

    /// Wait for one full frame and extract the selected channels
    async fn read(&mut self) -> TrignoResult<SampleMatrix>;

    /// Replace the channel selection without reconnecting
    fn set_channel_selection(&mut self, selection: ChannelSelection) -> TrignoResult<usize>;

    fn channel_selection(&self) -> &ChannelSelection;

    fn state(&self) -> DeviceState;

    fn device_info(&self) -> DeviceInfo;
}
