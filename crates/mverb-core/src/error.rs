//! Error types for MVerb.
//!
//! Only configuration-thread operations return errors. The audio thread
//! degrades to silence or ignores bad input instead.

use thiserror::Error;

/// A legacy preset chunk could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    /// The chunk does not start with the expected tag.
    #[error("chunk tag mismatch")]
    BadTag,
    /// The chunk version is not one this build can read.
    #[error("unsupported chunk version {0}")]
    UnsupportedVersion(u32),
    /// The chunk declares zero programs.
    #[error("chunk contains no programs")]
    NoPrograms,
    /// A program header does not start with the program tag.
    #[error("program tag mismatch")]
    BadProgramTag,
    /// The program stores a different number of values than there are parameters.
    #[error("expected {expected} values, found {found}")]
    ValueCountMismatch { expected: usize, found: usize },
    /// The chunk ends before a field it declares.
    #[error("chunk truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
}

/// The host requested a processing configuration MVerb does not support.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// Anything other than one stereo input and one stereo output bus.
    #[error("unsupported bus arrangement: {inputs} input bus(es), {outputs} output bus(es)")]
    UnsupportedBusArrangement { inputs: usize, outputs: usize },
    /// A symbolic sample size other than 32 or 64 bit.
    #[error("unsupported sample size {0}")]
    UnsupportedSampleSize(i32),
    /// A sample rate that is not finite and positive.
    #[error("invalid sample rate {0}")]
    InvalidSampleRate(f64),
}

/// Errors that can occur in MVerb.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PluginError {
    /// Preset state could not be read.
    #[error("state error: {0}")]
    Format(#[from] FormatError),
    /// Setup was rejected.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

/// Result type for MVerb operations.
pub type PluginResult<T> = Result<T, PluginError>;
