//! Wide string helpers for VST3 info structures.

use vst3::Steinberg::Vst::TChar;

/// Copy a Rust string into a UTF-16 buffer.
///
/// Truncates if the string is too long, always null-terminating.
pub fn copy_wstring(src: &str, dst: &mut [TChar]) {
    if dst.is_empty() {
        return;
    }

    let capacity = dst.len() - 1;
    let mut len = 0;
    for (unit, slot) in src.encode_utf16().take(capacity).zip(dst.iter_mut()) {
        *slot = unit as TChar;
        len += 1;
    }
    dst[len] = 0;
}
