//! # mverb-vst3
//!
//! VST3 binding for the MVerb real-time front end.
//!
//! [`Vst3Processor`] exposes an [`mverb_core::Processor`] through the
//! `IComponent` and `IAudioProcessor` COM interfaces. Host automation queues
//! are read in place through thin adapters; nothing is copied per callback.
//!
//! ```text
//! host (IComponent / IAudioProcessor)
//!        ↓
//! Vst3Processor<F>
//!        ↓
//! mverb_core::Processor<F> + StateHandle
//! ```
//!
//! Registration with a host (factory and entry points) is left to the
//! plugin crate that picks the engine family.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

pub mod config;
pub mod processor;
pub mod util;

pub use config::Vst3Config;
pub use processor::{HostChanges, HostQueue, Vst3Processor};

// Re-export vst3 crate for UIDs
pub use vst3;
