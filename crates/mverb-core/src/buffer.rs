//! Stereo audio buffer for one host callback.
//!
//! The host hands over one stereo input bus and one stereo output bus. Some
//! hosts pass the same memory for both ("in-place" processing); [`Buffer`]
//! models that case explicitly so the input is never read through a slice
//! that is also borrowed mutably.
//!
//! # Real-Time Safety
//!
//! Channel slices are stored in fixed arrays. No heap allocations occur
//! during construction or use.

use crate::sample::Sample;
use crate::types::NUM_CHANNELS;

// =============================================================================
// Buffer - Main Audio I/O
// =============================================================================

/// Input and output channel slices for a single callback.
///
/// # Type Parameter
///
/// `S` is the sample type, defaulting to `f32`. Use `Buffer<f64>` for
/// 64-bit processing.
///
/// # Lifetime
///
/// The `'a` lifetime ties the buffer to the host's audio data. Buffers are
/// only valid within a single `process()` call.
///
/// # Channel Layout
///
/// 0 = Left, 1 = Right.
pub struct Buffer<'a, S: Sample = f32> {
    /// Input slices, or `None` when the input lives in `outputs`.
    inputs: Option<[&'a [S]; NUM_CHANNELS]>,
    outputs: [&'a mut [S]; NUM_CHANNELS],
    num_samples: usize,
}

impl<'a, S: Sample> Buffer<'a, S> {
    /// Create a buffer with separate input and output memory.
    ///
    /// `num_samples` is limited to the shortest slice.
    pub fn new(inputs: [&'a [S]; NUM_CHANNELS], outputs: [&'a mut [S]; NUM_CHANNELS], num_samples: usize) -> Self {
        let shortest = inputs
            .iter()
            .map(|c| c.len())
            .chain(outputs.iter().map(|c| c.len()))
            .min()
            .unwrap_or(0);
        Self {
            inputs: Some(inputs),
            outputs,
            num_samples: num_samples.min(shortest),
        }
    }

    /// Create a buffer whose input samples arrive in the output slices.
    ///
    /// `num_samples` is limited to the shortest slice.
    pub fn in_place(channels: [&'a mut [S]; NUM_CHANNELS], num_samples: usize) -> Self {
        let shortest = channels.iter().map(|c| c.len()).min().unwrap_or(0);
        Self {
            inputs: None,
            outputs: channels,
            num_samples: num_samples.min(shortest),
        }
    }

    // =========================================================================
    // Buffer Info
    // =========================================================================

    /// Number of samples in this callback.
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Returns true when input and output share memory.
    #[inline]
    pub fn is_in_place(&self) -> bool {
        self.inputs.is_none()
    }

    // =========================================================================
    // Channel Access
    // =========================================================================

    /// Input samples of a channel.
    ///
    /// For in-place buffers this reads the output slice, which still holds
    /// the input until it is overwritten.
    ///
    /// # Panics
    ///
    /// Panics if `channel >= NUM_CHANNELS`.
    #[inline]
    pub fn input(&self, channel: usize) -> &[S] {
        match &self.inputs {
            Some(inputs) => &inputs[channel][..self.num_samples],
            None => &self.outputs[channel][..self.num_samples],
        }
    }

    /// Output samples of a channel.
    ///
    /// # Panics
    ///
    /// Panics if `channel >= NUM_CHANNELS`.
    #[inline]
    pub fn output(&mut self, channel: usize) -> &mut [S] {
        &mut self.outputs[channel][..self.num_samples]
    }

    /// Both output channels at once.
    #[inline]
    pub fn outputs_mut(&mut self) -> [&mut [S]; NUM_CHANNELS] {
        let n = self.num_samples;
        let [left, right] = &mut self.outputs;
        [&mut left[..n], &mut right[..n]]
    }

    /// Inputs and outputs borrowed together.
    ///
    /// Returns `None` for in-place buffers, where the two cannot be borrowed
    /// at the same time.
    #[inline]
    pub fn split_mut(&mut self) -> Option<([&[S]; NUM_CHANNELS], [&mut [S]; NUM_CHANNELS])> {
        let n = self.num_samples;
        let [in_left, in_right] = self.inputs.as_ref()?;
        let [out_left, out_right] = &mut self.outputs;
        Some((
            [&in_left[..n], &in_right[..n]],
            [&mut out_left[..n], &mut out_right[..n]],
        ))
    }

    // =========================================================================
    // Whole-Buffer Operations
    // =========================================================================

    /// Copy input to output unchanged.
    ///
    /// In-place buffers already hold the input, so this is a no-op for them.
    pub fn copy_to_output(&mut self) {
        let n = self.num_samples;
        if let Some(inputs) = &self.inputs {
            for (input, output) in inputs.iter().zip(self.outputs.iter_mut()) {
                output[..n].copy_from_slice(&input[..n]);
            }
        }
    }

    /// Fill every output channel with silence.
    pub fn clear_outputs(&mut self) {
        let n = self.num_samples;
        for output in self.outputs.iter_mut() {
            output[..n].fill(S::ZERO);
        }
    }
}
