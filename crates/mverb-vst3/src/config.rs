//! VST3 class identity.

use vst3::Steinberg::TUID;

/// Class IDs the component reports to the host.
///
/// # Example
///
/// ```ignore
/// use mverb_vst3::{vst3, Vst3Config};
///
/// pub static VST3_CONFIG: Vst3Config =
///     Vst3Config::new(vst3::uid(0x2C6D8E31, 0x4A7B4F20, 0x9D15C3E8, 0x6B0F7A52))
///         .with_controller(vst3::uid(0x7E1A9B44, 0x0C3D4E85, 0xA2F61B97, 0x35C8D0E6));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Vst3Config {
    /// Unique ID for the audio component class.
    pub component_uid: TUID,

    /// Unique ID of the edit controller class, if one is registered.
    pub controller_uid: Option<TUID>,
}

impl Vst3Config {
    /// Create a configuration without a controller class.
    pub const fn new(component_uid: TUID) -> Self {
        Self {
            component_uid,
            controller_uid: None,
        }
    }

    /// Set the controller class UID reported by `getControllerClassId`.
    pub const fn with_controller(mut self, controller_uid: TUID) -> Self {
        self.controller_uid = Some(controller_uid);
        self
    }

    /// Returns true if a controller class is registered.
    pub const fn has_controller(&self) -> bool {
        self.controller_uid.is_some()
    }
}
