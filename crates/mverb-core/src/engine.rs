//! Reverb engine abstraction and precision selection.
//!
//! The DSP core is supplied from outside through [`EngineFamily`], which can
//! build one engine per sample width. [`EngineSelector`] owns at most one
//! live engine and swaps it when the host changes the processing format.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──activate(Narrow)──▶ ActiveNarrow
//!       │                               │   ▲
//!       └─activate(Wide)──▶ ActiveWide ◀┘   │ activate(...)
//!                               └───────────┘
//! ```
//!
//! A freshly built engine is seeded with every parameter's current value
//! and then given the sample rate before it replaces the old one, so the
//! first block after a switch renders with the right settings.

use log::debug;

use crate::automation::ParameterTrack;
use crate::sample::Sample;
use crate::types::{ParameterId, ParameterValue, SampleFormat, NUM_CHANNELS};

// =============================================================================
// Engine Traits
// =============================================================================

/// A stereo reverb DSP core at one sample width.
pub trait ReverbEngine<S: Sample>: Send + 'static {
    /// Apply a normalized parameter value. Unknown IDs are ignored.
    fn set_parameter(&mut self, id: ParameterId, value: ParameterValue);

    /// Set the sample rate in Hz.
    fn set_sample_rate(&mut self, sample_rate: f64);

    /// Render `num_samples` samples from `inputs` into `outputs`.
    ///
    /// Input and output slices never alias.
    fn process(&mut self, inputs: [&[S]; NUM_CHANNELS], outputs: [&mut [S]; NUM_CHANNELS], num_samples: usize);

    /// Clear internal delay lines and tails.
    fn reset(&mut self) {}
}

/// Builds engines at either sample width.
///
/// Implemented by a marker type; the engine itself is generic over the
/// sample type.
pub trait EngineFamily: Send + 'static {
    /// The engine at sample type `S`.
    type Engine<S: Sample>: ReverbEngine<S>;

    /// Build a new engine with default settings.
    fn create<S: Sample>() -> Self::Engine<S>;
}

// =============================================================================
// Active Engine
// =============================================================================

/// The single live engine, tagged by width.
pub enum ActiveEngine<F: EngineFamily> {
    /// 32-bit engine.
    Narrow(F::Engine<f32>),
    /// 64-bit engine.
    Wide(F::Engine<f64>),
}

impl<F: EngineFamily> ActiveEngine<F> {
    /// Width of the live engine.
    pub fn format(&self) -> SampleFormat {
        match self {
            Self::Narrow(_) => SampleFormat::Narrow,
            Self::Wide(_) => SampleFormat::Wide,
        }
    }
}

/// A sample type that selects its matching [`ActiveEngine`] variant.
pub trait Precision: Sample {
    /// Wrap an engine of this width.
    fn wrap<F: EngineFamily>(engine: F::Engine<Self>) -> ActiveEngine<F>;

    /// Borrow the engine if it has this width.
    fn engine<F: EngineFamily>(active: &ActiveEngine<F>) -> Option<&F::Engine<Self>>;

    /// Mutably borrow the engine if it has this width.
    fn engine_mut<F: EngineFamily>(active: &mut ActiveEngine<F>) -> Option<&mut F::Engine<Self>>;
}

impl Precision for f32 {
    fn wrap<F: EngineFamily>(engine: F::Engine<f32>) -> ActiveEngine<F> {
        ActiveEngine::Narrow(engine)
    }

    fn engine<F: EngineFamily>(active: &ActiveEngine<F>) -> Option<&F::Engine<f32>> {
        match active {
            ActiveEngine::Narrow(engine) => Some(engine),
            ActiveEngine::Wide(_) => None,
        }
    }

    fn engine_mut<F: EngineFamily>(active: &mut ActiveEngine<F>) -> Option<&mut F::Engine<f32>> {
        match active {
            ActiveEngine::Narrow(engine) => Some(engine),
            ActiveEngine::Wide(_) => None,
        }
    }
}

impl Precision for f64 {
    fn wrap<F: EngineFamily>(engine: F::Engine<f64>) -> ActiveEngine<F> {
        ActiveEngine::Wide(engine)
    }

    fn engine<F: EngineFamily>(active: &ActiveEngine<F>) -> Option<&F::Engine<f64>> {
        match active {
            ActiveEngine::Wide(engine) => Some(engine),
            ActiveEngine::Narrow(_) => None,
        }
    }

    fn engine_mut<F: EngineFamily>(active: &mut ActiveEngine<F>) -> Option<&mut F::Engine<f64>> {
        match active {
            ActiveEngine::Wide(engine) => Some(engine),
            ActiveEngine::Narrow(_) => None,
        }
    }
}

// =============================================================================
// EngineSelector
// =============================================================================

/// Observable state of an [`EngineSelector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// No setup has happened yet.
    Uninitialized,
    /// A 32-bit engine is live.
    ActiveNarrow,
    /// A 64-bit engine is live.
    ActiveWide,
}

/// Owns the live engine and replaces it on format changes.
pub struct EngineSelector<F: EngineFamily> {
    active: Option<ActiveEngine<F>>,
    sample_rate: f64,
}

impl<F: EngineFamily> EngineSelector<F> {
    /// Create a selector without an engine.
    pub fn new() -> Self {
        Self {
            active: None,
            sample_rate: 0.0,
        }
    }

    /// Current state.
    pub fn state(&self) -> EngineState {
        match &self.active {
            None => EngineState::Uninitialized,
            Some(ActiveEngine::Narrow(_)) => EngineState::ActiveNarrow,
            Some(ActiveEngine::Wide(_)) => EngineState::ActiveWide,
        }
    }

    /// Width of the live engine, if any.
    pub fn sample_format(&self) -> Option<SampleFormat> {
        self.active.as_ref().map(ActiveEngine::format)
    }

    /// Sample rate of the live engine, or 0 before activation.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Build an engine for `format`, seed it from `tracks`, set its rate and
    /// make it the live engine. Any previous engine is dropped.
    ///
    /// Runs on the setup path, never while processing.
    pub fn activate(&mut self, format: SampleFormat, sample_rate: f64, tracks: &[ParameterTrack]) {
        match format {
            SampleFormat::Narrow => self.activate_with::<f32>(sample_rate, tracks),
            SampleFormat::Wide => self.activate_with::<f64>(sample_rate, tracks),
        }
        debug!(
            "Activated {}-bit engine at {} Hz with {} seeded parameters",
            format.bits(),
            sample_rate,
            tracks.len()
        );
    }

    fn activate_with<S: Precision>(&mut self, sample_rate: f64, tracks: &[ParameterTrack]) {
        let mut engine = F::create::<S>();
        for track in tracks {
            engine.set_parameter(track.id(), track.value());
        }
        engine.set_sample_rate(sample_rate);
        self.active = Some(S::wrap(engine));
        self.sample_rate = sample_rate;
    }

    /// Drop the live engine and return to [`EngineState::Uninitialized`].
    pub fn deactivate(&mut self) {
        if self.active.take().is_some() {
            debug!("Engine released");
        }
        self.sample_rate = 0.0;
    }

    /// Borrow the live engine if it has width `S`.
    pub fn engine<S: Precision>(&self) -> Option<&F::Engine<S>> {
        self.active.as_ref().and_then(S::engine)
    }

    /// Mutably borrow the live engine if it has width `S`.
    ///
    /// Returns `None` before activation and on a width mismatch.
    pub fn engine_mut<S: Precision>(&mut self) -> Option<&mut F::Engine<S>> {
        self.active.as_mut().and_then(S::engine_mut)
    }

    /// Forward a parameter value to the live engine, whatever its width.
    pub fn set_parameter(&mut self, id: ParameterId, value: ParameterValue) {
        match &mut self.active {
            Some(ActiveEngine::Narrow(engine)) => engine.set_parameter(id, value),
            Some(ActiveEngine::Wide(engine)) => engine.set_parameter(id, value),
            None => {}
        }
    }

    /// Clear the live engine's tails.
    pub fn reset(&mut self) {
        match &mut self.active {
            Some(ActiveEngine::Narrow(engine)) => engine.reset(),
            Some(ActiveEngine::Wide(engine)) => engine.reset(),
            None => {}
        }
    }
}

impl<F: EngineFamily> Default for EngineSelector<F> {
    fn default() -> Self {
        Self::new()
    }
}
