//! Sample type abstraction for f32/f64 audio processing.
//!
//! Enables one generic processing path that monomorphizes into a narrow and
//! a wide instantiation.

use std::ops::Mul;

use crate::types::SampleFormat;

/// Trait for audio sample types (f32, f64).
///
/// Only the operations the front end itself needs: conversion, silence and
/// the format tag used to pick the matching engine. The DSP lives in the
/// engine and brings its own math.
pub trait Sample:
    Copy
    + Default
    + Send
    + Sync
    + 'static
    + Mul<Output = Self>
    + std::fmt::Debug
{
    /// Zero value (0.0).
    const ZERO: Self;

    /// The host sample format this type corresponds to.
    const FORMAT: SampleFormat;

    /// Convert from f64.
    fn from_f64(value: f64) -> Self;
}

impl Sample for f32 {
    const ZERO: Self = 0.0;
    const FORMAT: SampleFormat = SampleFormat::Narrow;

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Sample for f64 {
    const ZERO: Self = 0.0;
    const FORMAT: SampleFormat = SampleFormat::Wide;

    #[inline(always)]
    fn from_f64(value: f64) -> Self {
        value
    }
}
