// src/acquisition/mod.rs
//! Acquisition loops and CSV persistence on top of the device adapters

pub mod recorder;
pub mod runner;

pub use recorder::CsvRecorder;
pub use runner::{AcquisitionHarness, AcquisitionLoop, AcquisitionReport, StopSignal};
