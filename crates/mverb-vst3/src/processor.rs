//! VST3 component wrapping the MVerb processor.
//!
//! [`Vst3Processor`] implements `IComponent` and `IAudioProcessor` on top of
//! an [`mverb_core::Processor`] and its [`StateHandle`]. The processor half is
//! touched only from `process` and the setup calls; the state half only from
//! `setState` / `getState`.
//!
//! Host automation is read through [`HostChanges`] and [`HostQueue`], which
//! implement the core automation traits directly over the host's COM queues.

use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::ptr;
use std::slice;

use log::{debug, error};
use vst3::{Class, ComRef, Steinberg::Vst::*, Steinberg::*};

use mverb_core::{
    AutomationPoint, AutomationQueue, Buffer, ChannelLayout, ConfigurationError, EngineFamily,
    NoChanges, ParameterChanges, ParameterId, Precision, ProcessSetup as CoreProcessSetup,
    Processor, SampleFormat, StateHandle, NUM_CHANNELS, SUB_BLOCK_SIZE,
};

use crate::config::Vst3Config;
use crate::util::copy_wstring;

/// Read size for draining a host stream.
const STREAM_CHUNK_SIZE: usize = 4096;

// =============================================================================
// Host automation adapters
// =============================================================================

/// The host's `IParameterChanges` seen as [`ParameterChanges`].
#[derive(Clone, Copy)]
pub struct HostChanges<'a>(ComRef<'a, IParameterChanges>);

impl<'a> HostChanges<'a> {
    /// Wrap a host change list.
    pub fn new(changes: ComRef<'a, IParameterChanges>) -> Self {
        Self(changes)
    }
}

impl ParameterChanges for HostChanges<'_> {
    type Queue<'q>
        = HostQueue<'q>
    where
        Self: 'q;

    fn parameter_count(&self) -> usize {
        unsafe { self.0.getParameterCount() }.max(0) as usize
    }

    fn parameter_data(&self, index: usize) -> Option<HostQueue<'_>> {
        unsafe { ComRef::from_raw(self.0.getParameterData(index as i32)) }.map(HostQueue)
    }
}

/// One host `IParamValueQueue` seen as an [`AutomationQueue`].
#[derive(Clone, Copy)]
pub struct HostQueue<'a>(ComRef<'a, IParamValueQueue>);

impl AutomationQueue for HostQueue<'_> {
    fn parameter_id(&self) -> ParameterId {
        unsafe { self.0.getParameterId() }
    }

    fn point_count(&self) -> usize {
        unsafe { self.0.getPointCount() }.max(0) as usize
    }

    fn point(&self, index: usize) -> Option<AutomationPoint> {
        let mut sample_offset: i32 = 0;
        let mut value: f64 = 0.0;
        let result = unsafe { self.0.getPoint(index as i32, &mut sample_offset, &mut value) };
        (result == kResultOk).then(|| AutomationPoint::new(sample_offset, value))
    }
}

// =============================================================================
// Host buffers
// =============================================================================

/// Sample widths the host can hand over, with their channel pointer field.
trait HostSample: Precision {
    /// # Safety
    /// `bus` must have been filled in by the host for this width.
    unsafe fn channel_buffers(bus: &AudioBusBuffers) -> *mut *mut Self;
}

impl HostSample for f32 {
    unsafe fn channel_buffers(bus: &AudioBusBuffers) -> *mut *mut Self {
        bus.__field0.channelBuffers32
    }
}

impl HostSample for f64 {
    unsafe fn channel_buffers(bus: &AudioBusBuffers) -> *mut *mut Self {
        bus.__field0.channelBuffers64
    }
}

/// First bus of an input or output array, as a pair of channel pointers.
unsafe fn bus_channels<S: HostSample>(
    buses: *mut AudioBusBuffers,
    count: i32,
) -> Option<[*mut S; NUM_CHANNELS]> {
    if count < 1 || buses.is_null() {
        return None;
    }

    let bus = &*buses;
    if bus.numChannels < NUM_CHANNELS as i32 {
        return None;
    }

    let channels = S::channel_buffers(bus);
    if channels.is_null() {
        return None;
    }

    let pointers = [*channels, *channels.add(1)];
    if pointers.iter().any(|p| p.is_null()) {
        None
    } else {
        Some(pointers)
    }
}

/// Borrow the host's main buses as a core [`Buffer`].
///
/// # Safety
/// Every channel pointer must be valid for `num_samples` samples for the
/// lifetime `'a`.
unsafe fn host_buffer<'a, S: HostSample>(data: &ProcessData, num_samples: usize) -> Option<Buffer<'a, S>> {
    let inputs = bus_channels::<S>(data.inputs, data.numInputs)?;
    let outputs = bus_channels::<S>(data.outputs, data.numOutputs)?;

    // Two output channels on one buffer cannot be written independently.
    if outputs[0] == outputs[1] {
        return None;
    }

    let in_place = |outputs: [*mut S; NUM_CHANNELS]| {
        Buffer::in_place(
            outputs.map(|p| slice::from_raw_parts_mut(p, num_samples)),
            num_samples,
        )
    };

    if inputs == outputs {
        return Some(in_place(outputs));
    }

    if inputs.iter().any(|p| outputs.contains(p)) {
        // Partly shared: move the inputs over first and render in place.
        // Both channels of a window are read before either is written, so an
        // output that is also the other channel's input is not clobbered.
        let mut scratch = [[S::ZERO; SUB_BLOCK_SIZE]; NUM_CHANNELS];
        let mut offset = 0;
        while offset < num_samples {
            let len = (num_samples - offset).min(SUB_BLOCK_SIZE);
            for (input, copy) in inputs.iter().zip(scratch.iter_mut()) {
                ptr::copy_nonoverlapping(input.add(offset), copy.as_mut_ptr(), len);
            }
            for (copy, output) in scratch.iter().zip(outputs) {
                ptr::copy_nonoverlapping(copy.as_ptr(), output.add(offset), len);
            }
            offset += len;
        }
        return Some(in_place(outputs));
    }

    Some(Buffer::new(
        inputs.map(|p| slice::from_raw_parts(p as *const S, num_samples)),
        outputs.map(|p| slice::from_raw_parts_mut(p, num_samples)),
        num_samples,
    ))
}

/// Run one callback at width `S`.
unsafe fn process_host<S: HostSample, F: EngineFamily>(
    processor: &mut Processor<F>,
    changes: Option<&HostChanges<'_>>,
    data: &ProcessData,
    num_samples: usize,
) {
    let buffer = if num_samples > 0 {
        host_buffer::<S>(data, num_samples)
    } else {
        None
    };

    match (buffer, changes) {
        (Some(mut buffer), Some(changes)) => processor.process(changes, &mut buffer),
        (Some(mut buffer), None) => processor.process(&NoChanges, &mut buffer),
        (None, Some(changes)) => processor.process_parameters(changes),
        (None, None) => processor.process_parameters(&NoChanges),
    }
}

fn channel_layout(arrangement: SpeakerArrangement) -> ChannelLayout {
    match arrangement {
        SpeakerArr::kStereo => ChannelLayout::Stereo,
        SpeakerArr::kMono => ChannelLayout::Mono,
        0 => ChannelLayout::Empty,
        other => ChannelLayout::Other(other.count_ones()),
    }
}

unsafe fn channel_layouts(arrangements: *mut SpeakerArrangement, count: i32) -> Vec<ChannelLayout> {
    if count <= 0 || arrangements.is_null() {
        return Vec::new();
    }
    slice::from_raw_parts(arrangements, count as usize)
        .iter()
        .map(|a| channel_layout(*a))
        .collect()
}

fn bus_name(dir: BusDirection) -> Option<&'static str> {
    match dir as BusDirections {
        BusDirections_::kInput => Some("Stereo In"),
        BusDirections_::kOutput => Some("Stereo Out"),
        _ => None,
    }
}

// =============================================================================
// Vst3Processor
// =============================================================================

/// VST3 component for an MVerb processor driving engines of family `F`.
pub struct Vst3Processor<F: EngineFamily> {
    processor: UnsafeCell<Processor<F>>,
    state: UnsafeCell<StateHandle>,
    config: &'static Vst3Config,
}

// SAFETY: VST3 calls audio-thread methods (`process`, setup) and
// configuration-thread methods (`setState`, `getState`) on disjoint cells.
// The two halves communicate only through the core's lock-free mailbox.
unsafe impl<F: EngineFamily> Send for Vst3Processor<F> {}
unsafe impl<F: EngineFamily> Sync for Vst3Processor<F> {}

impl<F: EngineFamily> Vst3Processor<F> {
    /// Create a component at default parameter values.
    pub fn new(config: &'static Vst3Config) -> Self {
        let (processor, state) = Processor::new();
        Self {
            processor: UnsafeCell::new(processor),
            state: UnsafeCell::new(state),
            config,
        }
    }

    /// The class IDs this component reports.
    pub fn config(&self) -> &'static Vst3Config {
        self.config
    }
}

impl<F: EngineFamily> Class for Vst3Processor<F> {
    type Interfaces = (IComponent, IAudioProcessor);
}

// =============================================================================
// IPluginBase implementation
// =============================================================================

impl<F: EngineFamily> IPluginBaseTrait for Vst3Processor<F> {
    unsafe fn initialize(&self, _context: *mut FUnknown) -> tresult {
        kResultOk
    }

    unsafe fn terminate(&self) -> tresult {
        (*self.processor.get()).release();
        kResultOk
    }
}

// =============================================================================
// IComponent implementation
// =============================================================================

impl<F: EngineFamily> IComponentTrait for Vst3Processor<F> {
    unsafe fn getControllerClassId(&self, class_id: *mut TUID) -> tresult {
        if class_id.is_null() {
            return kInvalidArgument;
        }

        if let Some(controller) = self.config.controller_uid {
            *class_id = controller;
            kResultOk
        } else {
            kNotImplemented
        }
    }

    unsafe fn setIoMode(&self, _mode: IoMode) -> tresult {
        kResultOk
    }

    unsafe fn getBusCount(&self, media_type: MediaType, dir: BusDirection) -> i32 {
        match media_type as MediaTypes {
            MediaTypes_::kAudio if bus_name(dir).is_some() => 1,
            _ => 0,
        }
    }

    unsafe fn getBusInfo(
        &self,
        media_type: MediaType,
        dir: BusDirection,
        index: i32,
        bus: *mut BusInfo,
    ) -> tresult {
        if bus.is_null() {
            return kInvalidArgument;
        }
        if media_type as MediaTypes != MediaTypes_::kAudio || index != 0 {
            return kInvalidArgument;
        }
        let Some(name) = bus_name(dir) else {
            return kInvalidArgument;
        };

        let bus = &mut *bus;
        bus.mediaType = MediaTypes_::kAudio as MediaType;
        bus.direction = dir;
        bus.channelCount = NUM_CHANNELS as i32;
        copy_wstring(name, &mut bus.name);
        bus.busType = BusTypes_::kMain as BusType;
        bus.flags = BusInfo_::BusFlags_::kDefaultActive;
        kResultOk
    }

    unsafe fn getRoutingInfo(
        &self,
        _in_info: *mut RoutingInfo,
        _out_info: *mut RoutingInfo,
    ) -> tresult {
        kNotImplemented
    }

    unsafe fn activateBus(
        &self,
        _media_type: MediaType,
        _dir: BusDirection,
        _index: i32,
        _state: TBool,
    ) -> tresult {
        kResultOk
    }

    unsafe fn setActive(&self, state: TBool) -> tresult {
        (*self.processor.get()).set_active(state != 0);
        kResultOk
    }

    unsafe fn setState(&self, state: *mut IBStream) -> tresult {
        let Some(stream) = ComRef::from_raw(state) else {
            return kInvalidArgument;
        };

        let mut buffer = Vec::new();
        let mut chunk = [0u8; STREAM_CHUNK_SIZE];
        loop {
            let mut bytes_read: i32 = 0;
            let result = stream.read(
                chunk.as_mut_ptr() as *mut c_void,
                chunk.len() as i32,
                &mut bytes_read,
            );

            if result != kResultOk || bytes_read <= 0 {
                break;
            }

            buffer.extend_from_slice(&chunk[..bytes_read as usize]);
        }

        // Hosts hand fresh instances an empty stream.
        if buffer.is_empty() {
            debug!("Ignoring empty state stream");
            return kResultOk;
        }

        match (*self.state.get()).load_state(&buffer) {
            Ok(()) => kResultOk,
            Err(_) => kResultFalse,
        }
    }

    unsafe fn getState(&self, state: *mut IBStream) -> tresult {
        let Some(stream) = ComRef::from_raw(state) else {
            return kInvalidArgument;
        };

        let state = &mut *self.state.get();
        state.collect_garbage();
        let data = state.save_state();

        let mut bytes_written: i32 = 0;
        let result = stream.write(
            data.as_ptr() as *mut c_void,
            data.len() as i32,
            &mut bytes_written,
        );

        if result == kResultOk && bytes_written == data.len() as i32 {
            kResultOk
        } else {
            kResultFalse
        }
    }
}

// =============================================================================
// IAudioProcessor implementation
// =============================================================================

impl<F: EngineFamily> IAudioProcessorTrait for Vst3Processor<F> {
    unsafe fn setBusArrangements(
        &self,
        inputs: *mut SpeakerArrangement,
        num_ins: i32,
        outputs: *mut SpeakerArrangement,
        num_outs: i32,
    ) -> tresult {
        if (num_ins > 0 && inputs.is_null()) || (num_outs > 0 && outputs.is_null()) {
            return kInvalidArgument;
        }

        let inputs = channel_layouts(inputs, num_ins);
        let outputs = channel_layouts(outputs, num_outs);
        match (*self.processor.get()).set_bus_arrangements(&inputs, &outputs) {
            Ok(()) => kResultTrue,
            Err(_) => kResultFalse,
        }
    }

    unsafe fn getBusArrangement(
        &self,
        dir: BusDirection,
        index: i32,
        arr: *mut SpeakerArrangement,
    ) -> tresult {
        if arr.is_null() || index != 0 || bus_name(dir).is_none() {
            return kInvalidArgument;
        }

        *arr = SpeakerArr::kStereo;
        kResultOk
    }

    unsafe fn canProcessSampleSize(&self, symbolic_sample_size: i32) -> tresult {
        let processor = &*self.processor.get();
        let format = match symbolic_sample_size as SymbolicSampleSizes {
            SymbolicSampleSizes_::kSample32 => SampleFormat::Narrow,
            SymbolicSampleSizes_::kSample64 => SampleFormat::Wide,
            _ => return kNotImplemented,
        };

        if processor.can_process_sample_format(format) {
            kResultTrue
        } else {
            kResultFalse
        }
    }

    unsafe fn getLatencySamples(&self) -> u32 {
        0
    }

    unsafe fn setupProcessing(&self, setup: *mut ProcessSetup) -> tresult {
        if setup.is_null() {
            return kInvalidArgument;
        }

        let setup = &*setup;
        let sample_format = match setup.symbolicSampleSize as SymbolicSampleSizes {
            SymbolicSampleSizes_::kSample32 => SampleFormat::Narrow,
            SymbolicSampleSizes_::kSample64 => SampleFormat::Wide,
            _ => {
                let err = ConfigurationError::UnsupportedSampleSize(setup.symbolicSampleSize);
                error!("Rejected processing setup: {}", err);
                return kResultFalse;
            }
        };

        let core_setup = CoreProcessSetup::new(
            setup.sampleRate,
            setup.maxSamplesPerBlock.max(0) as usize,
            sample_format,
        );

        match (*self.processor.get()).setup_processing(core_setup) {
            Ok(()) => kResultOk,
            Err(_) => kResultFalse,
        }
    }

    unsafe fn setProcessing(&self, _state: TBool) -> tresult {
        kResultOk
    }

    unsafe fn process(&self, data: *mut ProcessData) -> tresult {
        if data.is_null() {
            return kInvalidArgument;
        }

        let data = &*data;
        let processor = &mut *self.processor.get();
        let changes = ComRef::from_raw(data.inputParameterChanges).map(HostChanges::new);
        let num_samples = data.numSamples.max(0) as usize;

        match data.symbolicSampleSize as SymbolicSampleSizes {
            SymbolicSampleSizes_::kSample32 => {
                process_host::<f32, F>(processor, changes.as_ref(), data, num_samples)
            }
            SymbolicSampleSizes_::kSample64 => {
                process_host::<f64, F>(processor, changes.as_ref(), data, num_samples)
            }
            _ => return kInvalidArgument,
        }

        kResultOk
    }

    unsafe fn getTailSamples(&self) -> u32 {
        0
    }
}
