//! # mverb-core
//!
//! Real-time processing front end for the MVerb stereo reverb.
//!
//! This crate sits between a plugin host and a reverb DSP core. It has no
//! dependency on any plugin format; the VST3 binding lives in `mverb-vst3`.
//!
//! ## Main Types
//!
//! - [`Processor`] - Audio-thread front end: automation, slicing, bypass
//! - [`StateHandle`] - Configuration-thread preset load/save
//! - [`ReverbEngine`] / [`EngineFamily`] - The DSP core interface
//! - [`ParameterTrack`] - Sample-accurate automation for one parameter
//! - [`BlockSlicer`] - Sub-block cutting of host callbacks
//! - [`StateSnapshot`] - Complete parameter set handed between threads
//! - [`Buffer`] - Stereo audio I/O for one callback
//! - [`PluginError`] - Error types

pub mod automation;
pub mod buffer;
pub mod chunk;
pub mod engine;
pub mod error;
pub mod mailbox;
pub mod parameters;
pub mod processor;
pub mod sample;
pub mod slicer;
pub mod types;

// Re-exports for convenience
pub use automation::{
    AutomationPoint, AutomationQueue, NoChanges, ParameterChanges, ParameterTrack, PointQueue,
};
pub use buffer::Buffer;
pub use chunk::{ChunkVersion, DecodedChunk};
pub use engine::{ActiveEngine, EngineFamily, EngineSelector, EngineState, Precision, ReverbEngine};
pub use error::{ConfigurationError, FormatError, PluginError, PluginResult};
pub use mailbox::{ClaimedSnapshot, SnapshotPublisher, SnapshotReceiver};
pub use parameters::{
    is_bypass_engaged, ParameterMirror, ReverbParameter, StateSnapshot, BYPASS_THRESHOLD,
    PARAMETER_COUNT,
};
pub use processor::{validate_bus_arrangement, Processor, StateHandle};
pub use sample::Sample;
pub use slicer::{BlockSlicer, SubBlock};
pub use types::{
    ChannelLayout, ParameterId, ParameterValue, ProcessSetup, SampleFormat, MAX_AUTOMATION_POINTS,
    NUM_CHANNELS, SUB_BLOCK_SIZE, VALUE_EPSILON,
};
