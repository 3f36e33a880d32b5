//! The real-time processor and its configuration-thread handle.
//!
//! [`Processor::new`] returns two halves:
//!
//! - [`Processor`] lives on the audio thread. It owns the parameter tracks,
//!   the engine selector and the receiving end of the snapshot mailbox.
//! - [`StateHandle`] lives on configuration threads. It loads and saves
//!   preset chunks and publishes snapshots.
//!
//! The halves share nothing but the mailbox and a lock-free
//! [`ParameterMirror`] of the current values.
//!
//! # Callback Order
//!
//! ```text
//! claim pending snapshot (if any)
//! attach automation queues
//! ├─ zero samples ──▶ flush every track into the engine
//! ├─ bypass engaged ─▶ copy input to output, flush tracks
//! ├─ engine matches ─▶ sub-block loop: advance tracks, render window
//! └─ otherwise ─────▶ silence outputs, consume automation
//! publish changed values to the mirror, drop this callback's points
//! ```

use std::sync::Arc;

use log::{debug, error, warn};

use crate::automation::{AutomationQueue, ParameterChanges, ParameterTrack};
use crate::buffer::Buffer;
use crate::chunk;
use crate::engine::{EngineFamily, EngineSelector, EngineState, Precision};
use crate::error::{ConfigurationError, PluginResult};
use crate::mailbox::{self, SnapshotPublisher, SnapshotReceiver};
use crate::parameters::{is_bypass_engaged, ParameterMirror, ReverbParameter, StateSnapshot, PARAMETER_COUNT};
use crate::slicer::{process_sliced, BlockSlicer};
use crate::types::{ChannelLayout, ParameterId, ParameterValue, ProcessSetup, SampleFormat};

/// Accept exactly one stereo input bus and one stereo output bus.
pub fn validate_bus_arrangement(
    inputs: &[ChannelLayout],
    outputs: &[ChannelLayout],
) -> Result<(), ConfigurationError> {
    match (inputs, outputs) {
        ([ChannelLayout::Stereo], [ChannelLayout::Stereo]) => Ok(()),
        _ => Err(ConfigurationError::UnsupportedBusArrangement {
            inputs: inputs.len(),
            outputs: outputs.len(),
        }),
    }
}

// =============================================================================
// Processor (audio thread)
// =============================================================================

/// Audio-thread half of the front end.
pub struct Processor<F: EngineFamily> {
    tracks: [ParameterTrack; PARAMETER_COUNT],
    slicer: BlockSlicer,
    engine: EngineSelector<F>,
    receiver: SnapshotReceiver,
    mirror: Arc<ParameterMirror>,
    setup: Option<ProcessSetup>,
    active: bool,
    /// A protocol violation has been logged since the last setup.
    violation_logged: bool,
}

impl<F: EngineFamily> Processor<F> {
    /// Create a processor at default parameter values, plus its state handle.
    pub fn new() -> (Self, StateHandle) {
        Self::with_state(StateSnapshot::default())
    }

    /// Create a processor starting from `snapshot`, plus its state handle.
    pub fn with_state(snapshot: StateSnapshot) -> (Self, StateHandle) {
        let (publisher, receiver) = mailbox::channel();
        let mirror = Arc::new(ParameterMirror::new(&snapshot));
        let processor = Self {
            tracks: std::array::from_fn(|i| ParameterTrack::new(i as ParameterId, snapshot.values()[i])),
            slicer: BlockSlicer::default(),
            engine: EngineSelector::new(),
            receiver,
            mirror: Arc::clone(&mirror),
            setup: None,
            active: false,
            violation_logged: false,
        };
        (processor, StateHandle { publisher, mirror })
    }

    // =========================================================================
    // Setup
    // =========================================================================

    /// Validate a bus arrangement request.
    pub fn set_bus_arrangements(
        &mut self,
        inputs: &[ChannelLayout],
        outputs: &[ChannelLayout],
    ) -> Result<(), ConfigurationError> {
        validate_bus_arrangement(inputs, outputs).inspect_err(|e| error!("Rejected bus arrangement: {}", e))
    }

    /// Both 32- and 64-bit processing are supported.
    pub fn can_process_sample_format(&self, _format: SampleFormat) -> bool {
        true
    }

    /// Configure rate and width, building a fresh engine.
    ///
    /// The new engine is seeded with every current value, including a
    /// pending snapshot, before it goes live.
    pub fn setup_processing(&mut self, setup: ProcessSetup) -> Result<(), ConfigurationError> {
        if !setup.sample_rate.is_finite() || setup.sample_rate <= 0.0 {
            let err = ConfigurationError::InvalidSampleRate(setup.sample_rate);
            error!("Rejected processing setup: {}", err);
            return Err(err);
        }

        self.apply_pending_snapshot();
        self.engine
            .activate(setup.sample_format, setup.sample_rate, &self.tracks);
        for track in self.tracks.iter_mut() {
            track.mark_applied();
            if track.take_changed() {
                self.mirror.set(track.id(), track.value());
            }
        }
        self.setup = Some(setup);
        self.violation_logged = false;
        debug!(
            "Processing setup: {} Hz, {}-bit, max block {}",
            setup.sample_rate,
            setup.sample_format.bits(),
            setup.max_block_size
        );
        Ok(())
    }

    /// Start or stop processing. Activation clears the engine's tails.
    pub fn set_active(&mut self, active: bool) {
        if active && !self.active {
            self.engine.reset();
        }
        self.active = active;
    }

    /// Release the engine. Processing is silent until the next setup.
    pub fn release(&mut self) {
        self.engine.deactivate();
        self.setup = None;
        self.active = false;
    }

    // =========================================================================
    // Processing
    // =========================================================================

    /// Handle one host callback.
    pub fn process<S, C>(&mut self, changes: &C, buffer: &mut Buffer<'_, S>)
    where
        S: Precision,
        C: ParameterChanges + ?Sized,
    {
        let num_samples = buffer.num_samples();
        self.begin_callback(changes, num_samples);

        if num_samples == 0 {
            self.flush_into_engine();
            self.end_callback();
            return;
        }

        let bypass = self.tracks[ReverbParameter::Bypass.index()].flush_changes();
        if is_bypass_engaged(bypass) {
            buffer.copy_to_output();
            self.flush_into_engine();
        } else if let Some(engine) = self.engine.engine_mut::<S>() {
            process_sliced(&self.slicer, &mut self.tracks, engine, buffer);
        } else {
            buffer.clear_outputs();
            for track in self.tracks.iter_mut() {
                track.flush_changes();
            }
            self.log_violation(S::FORMAT);
        }

        self.end_callback();
    }

    /// Handle a callback that carries parameter changes but no audio.
    pub fn process_parameters<C>(&mut self, changes: &C)
    where
        C: ParameterChanges + ?Sized,
    {
        self.begin_callback(changes, 0);
        self.flush_into_engine();
        self.end_callback();
    }

    fn begin_callback<C>(&mut self, changes: &C, num_samples: usize)
    where
        C: ParameterChanges + ?Sized,
    {
        self.apply_pending_snapshot();

        for index in 0..changes.parameter_count() {
            let Some(queue) = changes.parameter_data(index) else {
                continue;
            };
            // Unknown IDs are ignored.
            if let Some(track) = self.tracks.get_mut(queue.parameter_id() as usize) {
                track.begin_changes(&queue, num_samples);
            }
        }
    }

    fn apply_pending_snapshot(&mut self) {
        if let Some(snapshot) = self.receiver.try_claim() {
            for (track, value) in self.tracks.iter_mut().zip(snapshot.values()) {
                track.set_value(*value);
            }
            // Overwrites mirror entries an earlier callback wrote after the publish.
            self.mirror.store(&snapshot);
        }
    }

    fn flush_into_engine(&mut self) {
        let engine = &mut self.engine;
        for track in self.tracks.iter_mut() {
            let id = track.id();
            track.flush_changes_with(|value| engine.set_parameter(id, value));
        }
    }

    fn end_callback(&mut self) {
        for track in self.tracks.iter_mut() {
            if track.has_overflowed() {
                warn!(
                    "Automation overflow on parameter {}: more than {} points, intermediate points were dropped",
                    track.id(),
                    crate::types::MAX_AUTOMATION_POINTS
                );
            }
            if track.take_changed() {
                self.mirror.set(track.id(), track.value());
            }
            track.end_changes();
        }
    }

    fn log_violation(&mut self, format: SampleFormat) {
        if self.violation_logged {
            return;
        }
        self.violation_logged = true;
        match self.engine.state() {
            EngineState::Uninitialized => warn!("process() called before setup_processing(); outputting silence"),
            _ => warn!(
                "process() called with {}-bit buffers but the engine was set up for {}-bit; outputting silence",
                format.bits(),
                self.setup.map_or(0, |s| s.sample_format.bits())
            ),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Whether the bypass slot is currently engaged.
    pub fn is_bypassed(&self) -> bool {
        is_bypass_engaged(self.tracks[ReverbParameter::Bypass.index()].value())
    }

    /// Current value of one parameter as seen by the audio thread.
    pub fn parameter_value(&self, parameter: ReverbParameter) -> ParameterValue {
        self.tracks[parameter.index()].value()
    }

    /// Last accepted setup.
    pub fn setup(&self) -> Option<ProcessSetup> {
        self.setup
    }

    /// Whether the host has activated processing.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The engine selector.
    pub fn engine(&self) -> &EngineSelector<F> {
        &self.engine
    }
}

// =============================================================================
// StateHandle (configuration thread)
// =============================================================================

/// Configuration-thread half of the front end.
pub struct StateHandle {
    publisher: SnapshotPublisher,
    mirror: Arc<ParameterMirror>,
}

impl StateHandle {
    /// Decode a preset chunk and hand it to the audio thread.
    ///
    /// A chunk that fails to decode changes nothing. When the stored bypass
    /// flag disagrees with the bypass slot, the flag wins.
    pub fn load_state(&mut self, bytes: &[u8]) -> PluginResult<()> {
        let decoded = chunk::decode(bytes).inspect_err(|e| warn!("Rejected preset chunk: {}", e))?;
        let mut snapshot = decoded.snapshot;
        if snapshot.bypass() != decoded.bypass {
            snapshot = snapshot.with(ReverbParameter::Bypass, if decoded.bypass { 1.0 } else { 0.0 });
        }
        self.publish(snapshot);
        debug!(
            "Loaded state: {} bytes, version {}, {} program(s)",
            bytes.len(),
            decoded.version.number(),
            decoded.program_count
        );
        Ok(())
    }

    /// Encode the current values as a preset chunk.
    pub fn save_state(&self) -> Vec<u8> {
        chunk::encode(&self.current_state())
    }

    /// Current values, including any published but unclaimed snapshot.
    ///
    /// While a snapshot is pending it is returned as is; the mirror may
    /// still receive writes from a callback that started before the publish.
    pub fn current_state(&self) -> StateSnapshot {
        self.publisher
            .with_pending(|snapshot| *snapshot)
            .unwrap_or_else(|| self.mirror.snapshot())
    }

    /// Hand a complete snapshot to the audio thread.
    pub fn publish(&mut self, snapshot: StateSnapshot) {
        self.mirror.store(&snapshot);
        self.publisher.publish(snapshot);
    }

    /// Returns true while a published snapshot waits for the audio thread.
    pub fn has_pending_state(&self) -> bool {
        self.publisher.has_pending()
    }

    /// Free snapshots the audio thread has finished with.
    pub fn collect_garbage(&mut self) -> usize {
        self.publisher.collect_garbage()
    }

    /// Current value of one parameter.
    pub fn parameter_value(&self, parameter: ReverbParameter) -> ParameterValue {
        self.publisher
            .with_pending(|snapshot| snapshot.get(parameter))
            .unwrap_or_else(|| self.mirror.get(parameter))
    }
}
