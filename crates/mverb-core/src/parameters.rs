//! MVerb's parameter set and complete-state snapshots.
//!
//! Parameter IDs are dense and index every per-parameter array. The last ID
//! is reserved for the bypass switch, which is carried through the same
//! automation path as the reverb controls.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{ParameterId, ParameterValue};

/// Total number of parameter slots, bypass included.
pub const PARAMETER_COUNT: usize = 10;

/// Threshold above which the bypass slot reads as "bypassed".
pub const BYPASS_THRESHOLD: ParameterValue = 0.5;

/// Every parameter MVerb exposes, in ID order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ReverbParameter {
    Damping = 0,
    Density = 1,
    Bandwidth = 2,
    Decay = 3,
    Predelay = 4,
    Size = 5,
    Gain = 6,
    Mix = 7,
    EarlyMix = 8,
    /// Reserved slot for the host bypass switch.
    Bypass = 9,
}

impl ReverbParameter {
    /// All parameters in ID order.
    pub const ALL: [ReverbParameter; PARAMETER_COUNT] = [
        Self::Damping,
        Self::Density,
        Self::Bandwidth,
        Self::Decay,
        Self::Predelay,
        Self::Size,
        Self::Gain,
        Self::Mix,
        Self::EarlyMix,
        Self::Bypass,
    ];

    /// The parameter's stable ID.
    #[inline]
    pub const fn id(self) -> ParameterId {
        self as ParameterId
    }

    /// Index into per-parameter arrays.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look up a parameter by ID.
    pub fn from_id(id: ParameterId) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Normalized value a fresh instance starts with.
    pub const fn default_value(self) -> ParameterValue {
        match self {
            Self::Damping => 0.0,
            Self::Density => 0.5,
            Self::Bandwidth => 1.0,
            Self::Decay => 0.5,
            Self::Predelay => 0.0,
            Self::Size => 0.5,
            Self::Gain => 1.0,
            Self::Mix => 0.15,
            Self::EarlyMix => 0.75,
            Self::Bypass => 0.0,
        }
    }

    /// Returns true for the reserved bypass slot.
    #[inline]
    pub const fn is_bypass(self) -> bool {
        matches!(self, Self::Bypass)
    }
}

/// Read a bypass slot value as a switch.
#[inline]
pub fn is_bypass_engaged(value: ParameterValue) -> bool {
    value > BYPASS_THRESHOLD
}

// =============================================================================
// StateSnapshot
// =============================================================================

/// A complete set of parameter values captured at one instant.
///
/// Index-aligned with [`ReverbParameter`]. Built on a configuration thread
/// and handed to the audio thread exactly once through the mailbox.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSnapshot {
    values: [ParameterValue; PARAMETER_COUNT],
}

impl StateSnapshot {
    /// Build a snapshot from raw values. Values are clamped to [0, 1];
    /// NaN becomes 0.
    pub fn new(values: [ParameterValue; PARAMETER_COUNT]) -> Self {
        Self {
            values: values.map(sanitize),
        }
    }

    /// Build a snapshot from a slice.
    ///
    /// Returns `None` unless the slice holds exactly [`PARAMETER_COUNT`] values.
    pub fn from_slice(values: &[ParameterValue]) -> Option<Self> {
        let values: [ParameterValue; PARAMETER_COUNT] = values.try_into().ok()?;
        Some(Self::new(values))
    }

    /// All values in ID order.
    #[inline]
    pub fn values(&self) -> &[ParameterValue; PARAMETER_COUNT] {
        &self.values
    }

    /// Value of one parameter.
    #[inline]
    pub fn get(&self, parameter: ReverbParameter) -> ParameterValue {
        self.values[parameter.index()]
    }

    /// Copy with one parameter replaced.
    pub fn with(mut self, parameter: ReverbParameter, value: ParameterValue) -> Self {
        self.values[parameter.index()] = sanitize(value);
        self
    }

    /// Whether the bypass slot is engaged.
    #[inline]
    pub fn bypass(&self) -> bool {
        is_bypass_engaged(self.get(ReverbParameter::Bypass))
    }

    /// Iterate `(parameter, value)` pairs in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (ReverbParameter, ParameterValue)> + '_ {
        ReverbParameter::ALL
            .iter()
            .zip(self.values.iter())
            .map(|(p, v)| (*p, *v))
    }
}

impl Default for StateSnapshot {
    /// Snapshot holding every parameter's default value.
    fn default() -> Self {
        Self {
            values: ReverbParameter::ALL.map(ReverbParameter::default_value),
        }
    }
}

#[inline]
fn sanitize(value: ParameterValue) -> ParameterValue {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// =============================================================================
// ParameterMirror
// =============================================================================

/// Lock-free copy of the current parameter values, readable from any thread.
///
/// The audio thread stores into it whenever a track's value changes; the
/// configuration thread reads it to save presets. Values are stored as f64
/// bits in `AtomicU64`.
#[derive(Debug)]
pub struct ParameterMirror {
    values: [AtomicU64; PARAMETER_COUNT],
}

impl ParameterMirror {
    /// Create a mirror holding `snapshot`.
    pub fn new(snapshot: &StateSnapshot) -> Self {
        Self {
            values: snapshot.values.map(|v| AtomicU64::new(v.to_bits())),
        }
    }

    /// Read one value.
    #[inline]
    pub fn get(&self, parameter: ReverbParameter) -> ParameterValue {
        f64::from_bits(self.values[parameter.index()].load(Ordering::Acquire))
    }

    /// Store one value. Out-of-range IDs are ignored.
    #[inline]
    pub fn set(&self, id: ParameterId, value: ParameterValue) {
        if let Some(slot) = self.values.get(id as usize) {
            slot.store(sanitize(value).to_bits(), Ordering::Release);
        }
    }

    /// Store every value of `snapshot`.
    pub fn store(&self, snapshot: &StateSnapshot) {
        for (slot, value) in self.values.iter().zip(snapshot.values.iter()) {
            slot.store(value.to_bits(), Ordering::Release);
        }
    }

    /// Capture the current values as a snapshot.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            values: std::array::from_fn(|i| f64::from_bits(self.values[i].load(Ordering::Acquire))),
        }
    }
}

impl Default for ParameterMirror {
    fn default() -> Self {
        Self::new(&StateSnapshot::default())
    }
}
