//! Sample-accurate parameter automation.
//!
//! Hosts deliver, per callback, a list of changed parameters and for each one
//! an ordered queue of `(sample offset, value)` points. [`ParameterTrack`]
//! takes one such queue and releases its points to the engine as processing
//! advances through the callback, so a change requested at offset 40 reaches
//! the engine at the sub-block containing sample 40 rather than at the start
//! of the callback.
//!
//! # Per-callback lifecycle
//!
//! ```text
//! begin_changes(queue)        copy the host's points into fixed storage
//!     ↓
//! advance(n, sink) ...        once per sub-block, at most one sink call
//!     ↓  (or flush_changes)   collapse everything left to its final value
//! end_changes()               forget this callback's points
//! ```
//!
//! # Real-Time Safety
//!
//! Points are copied into an inline array of [`MAX_AUTOMATION_POINTS`]
//! entries. Nothing allocates.

use crate::types::{ParameterId, ParameterValue, MAX_AUTOMATION_POINTS, VALUE_EPSILON};

// =============================================================================
// Host Automation Interface
// =============================================================================

/// One automation point: a value that takes effect at a sample offset.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AutomationPoint {
    /// Offset from the start of the callback, in samples.
    pub sample_offset: i32,
    /// Normalized target value.
    pub value: ParameterValue,
}

impl AutomationPoint {
    /// Create a point.
    pub const fn new(sample_offset: i32, value: ParameterValue) -> Self {
        Self {
            sample_offset,
            value,
        }
    }
}

/// The host's queue of automation points for one parameter.
pub trait AutomationQueue {
    /// Parameter this queue belongs to.
    fn parameter_id(&self) -> ParameterId;

    /// Number of points in the queue.
    fn point_count(&self) -> usize;

    /// Point at `index`, or `None` if the host cannot provide it.
    fn point(&self, index: usize) -> Option<AutomationPoint>;
}

/// The host's list of parameters that changed during one callback.
pub trait ParameterChanges {
    /// Queue type handed out for each changed parameter.
    type Queue<'a>: AutomationQueue
    where
        Self: 'a;

    /// Number of changed parameters.
    fn parameter_count(&self) -> usize;

    /// Queue for the changed parameter at `index`.
    fn parameter_data(&self, index: usize) -> Option<Self::Queue<'_>>;
}

/// A queue backed by a slice, for offline rendering and tests.
#[derive(Debug, Clone, Copy)]
pub struct PointQueue<'a> {
    /// Parameter the points belong to.
    pub id: ParameterId,
    /// Points in offset order.
    pub points: &'a [AutomationPoint],
}

impl<'a> PointQueue<'a> {
    /// Create a queue for `id`.
    pub const fn new(id: ParameterId, points: &'a [AutomationPoint]) -> Self {
        Self { id, points }
    }
}

impl AutomationQueue for PointQueue<'_> {
    fn parameter_id(&self) -> ParameterId {
        self.id
    }

    fn point_count(&self) -> usize {
        self.points.len()
    }

    fn point(&self, index: usize) -> Option<AutomationPoint> {
        self.points.get(index).copied()
    }
}

impl<'q> ParameterChanges for [PointQueue<'q>] {
    type Queue<'a>
        = PointQueue<'q>
    where
        Self: 'a;

    fn parameter_count(&self) -> usize {
        self.len()
    }

    fn parameter_data(&self, index: usize) -> Option<PointQueue<'q>> {
        self.get(index).copied()
    }
}

/// A callback without any parameter changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChanges;

impl ParameterChanges for NoChanges {
    type Queue<'a> = PointQueue<'static>;

    fn parameter_count(&self) -> usize {
        0
    }

    fn parameter_data(&self, _index: usize) -> Option<PointQueue<'static>> {
        None
    }
}

// =============================================================================
// ParameterTrack
// =============================================================================

/// Automation state and current value of a single parameter.
///
/// Owned and mutated by the audio thread only.
#[derive(Debug, Clone)]
pub struct ParameterTrack {
    id: ParameterId,
    value: ParameterValue,
    /// Last value handed to a sink. `None` forces the next advance or flush
    /// to emit the current value.
    applied: Option<ParameterValue>,
    points: [AutomationPoint; MAX_AUTOMATION_POINTS],
    len: usize,
    /// Next unconsumed point.
    cursor: usize,
    /// Samples of the current callback already advanced over.
    position: i64,
    /// Set when `value` moved since the last [`take_changed`](Self::take_changed).
    changed: bool,
    /// Set when the host sent more points than fit.
    overflowed: bool,
}

impl ParameterTrack {
    /// Create a track holding `value`, considered already applied.
    pub fn new(id: ParameterId, value: ParameterValue) -> Self {
        Self {
            id,
            value,
            applied: Some(value),
            points: [AutomationPoint::default(); MAX_AUTOMATION_POINTS],
            len: 0,
            cursor: 0,
            position: 0,
            changed: false,
            overflowed: false,
        }
    }

    /// The parameter this track drives.
    #[inline]
    pub fn id(&self) -> ParameterId {
        self.id
    }

    /// Current value.
    #[inline]
    pub fn value(&self) -> ParameterValue {
        self.value
    }

    /// Number of points not yet consumed.
    #[inline]
    pub fn pending_points(&self) -> usize {
        self.len - self.cursor
    }

    /// Returns true if the host sent more points than fit this callback.
    #[inline]
    pub fn has_overflowed(&self) -> bool {
        self.overflowed
    }

    /// Overwrite the current value outside of automation.
    ///
    /// The next [`advance`](Self::advance) or flush emits it to the sink.
    pub fn set_value(&mut self, value: ParameterValue) {
        if value != self.value {
            self.changed = true;
        }
        self.value = value;
        self.applied = None;
    }

    /// Record that the sink has already received the current value.
    pub fn mark_applied(&mut self) {
        self.applied = Some(self.value);
    }

    /// Returns and clears the "value moved" flag.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    /// Attach this callback's automation queue.
    ///
    /// Offsets are clamped into `[0, num_samples)` and forced non-decreasing.
    /// An empty queue leaves the track untouched.
    pub fn begin_changes<Q: AutomationQueue + ?Sized>(&mut self, queue: &Q, num_samples: usize) {
        let last_offset = num_samples.saturating_sub(1).min(i32::MAX as usize) as i32;
        let mut floor = if self.len > 0 {
            self.points[self.len - 1].sample_offset
        } else {
            0
        };

        for index in 0..queue.point_count() {
            let Some(point) = queue.point(index) else {
                continue;
            };
            let offset = point.sample_offset.clamp(0, last_offset).max(floor);
            floor = offset;
            self.push(AutomationPoint::new(offset, point.value));
        }
    }

    fn push(&mut self, point: AutomationPoint) {
        if self.len < MAX_AUTOMATION_POINTS {
            self.points[self.len] = point;
            self.len += 1;
        } else {
            // Keep the newest value in the last slot so the final value survives.
            self.points[MAX_AUTOMATION_POINTS - 1] = point;
            self.overflowed = true;
        }
    }

    /// Advance through the next `sample_count` samples.
    ///
    /// Consumes every point inside the window; the last one wins. `sink` is
    /// called at most once, and only when the resulting value differs from
    /// the last applied value. Returns the current value.
    pub fn advance(&mut self, sample_count: usize, mut sink: impl FnMut(ParameterValue)) -> ParameterValue {
        let window_end = self.position + sample_count as i64;
        let mut latest = None;
        while self.cursor < self.len && (self.points[self.cursor].sample_offset as i64) < window_end {
            latest = Some(self.points[self.cursor].value);
            self.cursor += 1;
        }
        self.position = window_end;

        if let Some(value) = latest {
            self.update(value);
        }
        self.emit(&mut sink);
        self.value
    }

    /// Apply every remaining point at once and emit the final value.
    ///
    /// Used for zero-length callbacks and bypass pass-through.
    pub fn flush_changes_with(&mut self, mut sink: impl FnMut(ParameterValue)) -> ParameterValue {
        self.consume_remaining();
        self.emit(&mut sink);
        self.value
    }

    /// Apply every remaining point at once without emitting.
    ///
    /// A value that moved stays pending for the next sink.
    pub fn flush_changes(&mut self) -> ParameterValue {
        self.consume_remaining();
        self.value
    }

    /// Drop this callback's points and rewind the window.
    pub fn end_changes(&mut self) {
        self.len = 0;
        self.cursor = 0;
        self.position = 0;
        self.overflowed = false;
    }

    fn consume_remaining(&mut self) {
        if self.cursor < self.len {
            let value = self.points[self.len - 1].value;
            self.cursor = self.len;
            self.update(value);
        }
    }

    fn update(&mut self, value: ParameterValue) {
        if value != self.value {
            self.changed = true;
        }
        self.value = value;
    }

    fn emit(&mut self, sink: &mut impl FnMut(ParameterValue)) {
        let stale = match self.applied {
            Some(applied) => (applied - self.value).abs() > VALUE_EPSILON,
            None => true,
        };
        if stale {
            sink(self.value);
            self.applied = Some(self.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue(points: &[AutomationPoint]) -> PointQueue<'_> {
        PointQueue::new(7, points)
    }

    fn collect(track: &mut ParameterTrack, sample_count: usize) -> Vec<ParameterValue> {
        let mut emitted = Vec::new();
        track.advance(sample_count, |v| emitted.push(v));
        emitted
    }

    #[test]
    fn test_empty_queue_keeps_value() {
        let mut track = ParameterTrack::new(7, 0.15);
        track.begin_changes(&queue(&[]), 64);
        assert!(collect(&mut track, 32).is_empty());
        assert!(collect(&mut track, 32).is_empty());
        assert_eq!(track.value(), 0.15);
        track.end_changes();
        assert!(!track.take_changed());
    }

    #[test]
    fn test_event_lands_in_its_sub_block() {
        let points = [AutomationPoint::new(40, 0.8)];
        let mut track = ParameterTrack::new(7, 0.15);
        track.begin_changes(&queue(&points), 64);

        assert!(collect(&mut track, 32).is_empty());
        assert_eq!(track.value(), 0.15);
        assert_eq!(collect(&mut track, 32), vec![0.8]);
        assert_eq!(track.value(), 0.8);
    }

    #[test]
    fn test_several_events_in_one_window_emit_once() {
        let points = [
            AutomationPoint::new(0, 0.2),
            AutomationPoint::new(5, 0.4),
            AutomationPoint::new(5, 0.6),
        ];
        let mut track = ParameterTrack::new(7, 0.0);
        track.begin_changes(&queue(&points), 32);
        assert_eq!(collect(&mut track, 32), vec![0.6]);
        assert_eq!(track.value(), 0.6);
    }

    #[test]
    fn test_redundant_value_is_suppressed() {
        let points = [AutomationPoint::new(3, 0.5)];
        let mut track = ParameterTrack::new(7, 0.5);
        track.begin_changes(&queue(&points), 32);
        assert!(collect(&mut track, 32).is_empty());
    }

    #[test]
    fn test_offsets_are_clamped_into_callback() {
        let points = [AutomationPoint::new(-4, 0.1), AutomationPoint::new(500, 0.9)];
        let mut track = ParameterTrack::new(7, 0.0);
        track.begin_changes(&queue(&points), 16);

        // Both points fall inside the only window.
        assert_eq!(collect(&mut track, 16), vec![0.9]);
        assert_eq!(track.pending_points(), 0);
    }

    #[test]
    fn test_out_of_order_offsets_are_forced_forward() {
        let points = [AutomationPoint::new(20, 0.3), AutomationPoint::new(4, 0.7)];
        let mut track = ParameterTrack::new(7, 0.0);
        track.begin_changes(&queue(&points), 32);

        assert!(collect(&mut track, 16).is_empty());
        assert_eq!(collect(&mut track, 16), vec![0.7]);
    }

    #[test]
    fn test_flush_collapses_to_final_value() {
        let points = [AutomationPoint::new(0, 0.3), AutomationPoint::new(10, 0.9)];
        let mut track = ParameterTrack::new(7, 0.0);
        track.begin_changes(&queue(&points), 0);

        let mut emitted = Vec::new();
        let value = track.flush_changes_with(|v| emitted.push(v));
        assert_eq!(value, 0.9);
        assert_eq!(emitted, vec![0.9]);
    }

    #[test]
    fn test_silent_flush_leaves_value_pending() {
        let points = [AutomationPoint::new(0, 0.9)];
        let mut track = ParameterTrack::new(7, 0.0);
        track.begin_changes(&queue(&points), 32);
        assert_eq!(track.flush_changes(), 0.9);

        let mut emitted = Vec::new();
        track.flush_changes_with(|v| emitted.push(v));
        assert_eq!(emitted, vec![0.9]);
    }

    #[test]
    fn test_set_value_forces_next_emit() {
        let mut track = ParameterTrack::new(7, 0.5);
        track.set_value(0.5);
        assert_eq!(collect(&mut track, 32), vec![0.5]);
        assert!(collect(&mut track, 32).is_empty());
    }

    #[test]
    fn test_end_changes_discards_unconsumed_points() {
        let points = [AutomationPoint::new(50, 0.9)];
        let mut track = ParameterTrack::new(7, 0.1);
        track.begin_changes(&queue(&points), 64);
        collect(&mut track, 32);
        track.end_changes();

        assert_eq!(track.pending_points(), 0);
        assert!(collect(&mut track, 32).is_empty());
        assert_eq!(track.value(), 0.1);
    }

    #[test]
    fn test_overflow_keeps_final_value() {
        let points: Vec<AutomationPoint> = (0..MAX_AUTOMATION_POINTS + 10)
            .map(|i| AutomationPoint::new(i as i32, i as f64 / 1000.0))
            .collect();
        let mut track = ParameterTrack::new(7, 0.0);
        track.begin_changes(&queue(&points), 1024);

        assert!(track.has_overflowed());
        let last = points.last().unwrap().value;
        assert_eq!(track.flush_changes(), last);
        track.end_changes();
        assert!(!track.has_overflowed());
    }

    #[test]
    fn test_slice_of_queues_as_parameter_changes() {
        let mix = [AutomationPoint::new(0, 0.8)];
        let changes = [PointQueue::new(7, &mix)];
        let changes: &[PointQueue] = &changes;
        assert_eq!(changes.parameter_count(), 1);
        let queue = changes.parameter_data(0).unwrap();
        assert_eq!(queue.parameter_id(), 7);
        assert_eq!(queue.point(0), Some(AutomationPoint::new(0, 0.8)));
        assert!(changes.parameter_data(1).is_none());
        assert_eq!(NoChanges.parameter_count(), 0);
    }
}
