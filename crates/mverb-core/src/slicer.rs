//! Sub-block slicing of host callbacks.
//!
//! A callback of `n` samples is cut into consecutive windows of at most
//! [`SUB_BLOCK_SIZE`](crate::types::SUB_BLOCK_SIZE) samples. Before each window
//! is rendered every parameter track advances over it, so automation lands
//! within one sub-block of its requested offset.

use std::ops::Range;

use crate::automation::ParameterTrack;
use crate::buffer::Buffer;
use crate::engine::ReverbEngine;
use crate::sample::Sample;
use crate::types::{NUM_CHANNELS, SUB_BLOCK_SIZE};

/// One window of a host callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubBlock {
    /// First sample of the window, relative to the callback.
    pub offset: usize,
    /// Window length in samples, never zero.
    pub len: usize,
}

/// Cuts callbacks into sub-blocks of a fixed maximum size.
#[derive(Debug, Clone, Copy)]
pub struct BlockSlicer {
    max_block_size: usize,
}

impl BlockSlicer {
    /// Create a slicer. A zero maximum is treated as one sample.
    pub const fn new(max_block_size: usize) -> Self {
        Self {
            max_block_size: if max_block_size == 0 { 1 } else { max_block_size },
        }
    }

    /// Largest sub-block this slicer produces.
    #[inline]
    pub const fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Iterate the sub-blocks of a callback of `num_samples` samples.
    ///
    /// A zero-length callback yields nothing.
    pub fn slices(&self, num_samples: usize) -> Slices {
        Slices {
            offset: 0,
            remaining: num_samples,
            max_block_size: self.max_block_size,
        }
    }
}

impl Default for BlockSlicer {
    fn default() -> Self {
        Self::new(SUB_BLOCK_SIZE)
    }
}

/// Iterator over the sub-blocks of one callback.
#[derive(Debug, Clone)]
pub struct Slices {
    offset: usize,
    remaining: usize,
    max_block_size: usize,
}

impl Iterator for Slices {
    type Item = SubBlock;

    fn next(&mut self) -> Option<SubBlock> {
        if self.remaining == 0 {
            return None;
        }
        let len = self.remaining.min(self.max_block_size);
        let block = SubBlock {
            offset: self.offset,
            len,
        };
        self.offset += len;
        self.remaining -= len;
        Some(block)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let count = self.remaining.div_ceil(self.max_block_size);
        (count, Some(count))
    }
}

impl ExactSizeIterator for Slices {}

// =============================================================================
// Sliced Rendering
// =============================================================================

/// Render one callback through `engine`, sub-block by sub-block.
///
/// For each sub-block every track advances first and pushes any changed
/// value into the engine, then the engine renders exactly that window.
///
/// In-place buffers are read through a stack scratch copy so the engine
/// never sees aliased input and output.
pub fn process_sliced<S, E>(
    slicer: &BlockSlicer,
    tracks: &mut [ParameterTrack],
    engine: &mut E,
    buffer: &mut Buffer<'_, S>,
) where
    S: Sample,
    E: ReverbEngine<S> + ?Sized,
{
    let mut scratch = [[S::ZERO; SUB_BLOCK_SIZE]; NUM_CHANNELS];

    for block in slicer.slices(buffer.num_samples()) {
        for track in tracks.iter_mut() {
            let id = track.id();
            track.advance(block.len, |value| engine.set_parameter(id, value));
        }

        // Scratch is sized for the default sub-block; larger slicers render
        // in-place buffers in scratch-sized pieces.
        let mut rendered = 0;
        while rendered < block.len {
            let len = if buffer.is_in_place() {
                (block.len - rendered).min(SUB_BLOCK_SIZE)
            } else {
                block.len - rendered
            };
            let range = block.offset + rendered..block.offset + rendered + len;
            render(engine, buffer, range, &mut scratch);
            rendered += len;
        }
    }
}

fn render<S, E>(
    engine: &mut E,
    buffer: &mut Buffer<'_, S>,
    range: Range<usize>,
    scratch: &mut [[S; SUB_BLOCK_SIZE]; NUM_CHANNELS],
) where
    S: Sample,
    E: ReverbEngine<S> + ?Sized,
{
    let len = range.len();
    if buffer.is_in_place() {
        for (channel, copy) in scratch.iter_mut().enumerate() {
            copy[..len].copy_from_slice(&buffer.input(channel)[range.clone()]);
        }
        let [left, right] = scratch;
        let [out_left, out_right] = buffer.outputs_mut();
        engine.process(
            [&left[..len], &right[..len]],
            [&mut out_left[range.clone()], &mut out_right[range]],
            len,
        );
    } else if let Some(([in_left, in_right], [out_left, out_right])) = buffer.split_mut() {
        engine.process(
            [&in_left[range.clone()], &in_right[range.clone()]],
            [&mut out_left[range.clone()], &mut out_right[range]],
            len,
        );
    }
}
