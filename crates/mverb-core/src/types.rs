//! Common types and limits used throughout MVerb.

// =============================================================================
// Processing Limits
// =============================================================================
//
// These constants bound the per-callback work on the audio thread. Everything
// sized by them lives in fixed storage allocated before processing starts.
//
// - 32-sample sub-blocks: parameter changes land within 32 samples of their
//   requested offset while keeping per-block engine overhead amortized
// - 128 automation points per parameter per callback: far above what hosts
//   send in practice; overflow keeps the final value
// =============================================================================

/// Number of audio channels on the single input and output bus.
pub const NUM_CHANNELS: usize = 2;

/// Maximum length of one processing sub-block in samples.
pub const SUB_BLOCK_SIZE: usize = 32;

/// Maximum number of automation points a track stores per callback.
pub const MAX_AUTOMATION_POINTS: usize = 128;

/// Two values closer than this are treated as the same engine setting.
pub const VALUE_EPSILON: f64 = 1e-9;

/// Parameter identifier.
pub type ParameterId = u32;

/// Parameter value (normalized 0.0 to 1.0).
pub type ParameterValue = f64;

/// Sample width requested by the host during setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    /// 32-bit float processing.
    #[default]
    Narrow,
    /// 64-bit float processing.
    Wide,
}

impl SampleFormat {
    /// Bits per sample for this format.
    pub const fn bits(self) -> u32 {
        match self {
            Self::Narrow => 32,
            Self::Wide => 64,
        }
    }
}

/// Processing configuration delivered by the host's setup callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSetup {
    /// Sample rate in Hz.
    pub sample_rate: f64,
    /// Largest callback the host will deliver, in samples.
    pub max_block_size: usize,
    /// Requested sample width.
    pub sample_format: SampleFormat,
}

impl ProcessSetup {
    /// Create a setup for the given rate and format.
    pub const fn new(sample_rate: f64, max_block_size: usize, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate,
            max_block_size,
            sample_format,
        }
    }
}

impl Default for ProcessSetup {
    fn default() -> Self {
        Self::new(44100.0, 1024, SampleFormat::Narrow)
    }
}

/// Channel layout of an audio bus.
///
/// Only stereo is accepted; other layouts exist so the host's request can be
/// described when it is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    /// No channels.
    Empty,
    /// One channel.
    Mono,
    /// Left and right.
    Stereo,
    /// Any other channel count.
    Other(u32),
}

