// cqt-core/src/lib.rs

//! The core logic for the constant-Q spectrum analyzer.
//! This crate computes logarithmically spaced power spectra with the constant-Q
//! transform, and runs the capture/analysis loop on a background worker.
//! It is completely headless and contains no rendering code.

pub mod audio;
pub mod config;
pub mod error;
pub mod fft;
pub mod kernel;
pub mod notes;
pub mod spectrum;
pub mod transform;
pub mod window;
pub mod worker;

pub use config::AnalysisConfig;
pub use error::{ConfigError, CqtError};
pub use kernel::{CqtParameters, SpectralKernel, fft_size_for, resolution};
pub use transform::ConstantQTransform;
pub use window::{WindowFn, WindowKind};
pub use worker::{
    AnalysisEvent, AnalysisWorker, AudioSource, ChannelSink, ChannelSource, SpectrumFrame,
    SpectrumSink, WorkerControl,
};
