//! Preset chunk encoding.
//!
//! # Layout
//!
//! All integers little-endian.
//!
//! ```text
//! "MVrb"                      chunk tag
//! u32 version                 1 = f32 values, 2 = f64 values
//! u32 program count           at least 1
//! repeated per program:
//!     "Prog"                  program tag
//!     u32 value count
//!     value count × f32/f64   normalized values in parameter ID order
//! u32 bypass flag             0 or 1
//! ```
//!
//! Only the first program is applied; later programs are validated and
//! skipped. Encoding always writes a single program.

use crate::error::FormatError;
use crate::parameters::{StateSnapshot, PARAMETER_COUNT};

/// Tag at the start of every chunk.
pub const CHUNK_TAG: [u8; 4] = *b"MVrb";

/// Tag at the start of every program.
pub const PROGRAM_TAG: [u8; 4] = *b"Prog";

/// Storage width of the values in a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkVersion {
    /// Values stored as f32.
    V1,
    /// Values stored as f64.
    #[default]
    V2,
}

impl ChunkVersion {
    /// Version number written to the chunk.
    pub const fn number(self) -> u32 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }

    /// Look up a version number.
    pub fn from_number(number: u32) -> Result<Self, FormatError> {
        match number {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(FormatError::UnsupportedVersion(other)),
        }
    }

    /// Bytes per stored value.
    pub const fn value_size(self) -> usize {
        match self {
            Self::V1 => 4,
            Self::V2 => 8,
        }
    }
}

/// Result of decoding a chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedChunk {
    /// Values of the first program.
    pub snapshot: StateSnapshot,
    /// Stored bypass flag.
    pub bypass: bool,
    /// Version the chunk was written with.
    pub version: ChunkVersion,
    /// Number of programs the chunk declared.
    pub program_count: usize,
}

/// Encode `snapshot` in the current format.
pub fn encode(snapshot: &StateSnapshot) -> Vec<u8> {
    encode_with(snapshot, ChunkVersion::default())
}

/// Encode `snapshot` with an explicit value width.
///
/// The bypass flag is derived from the snapshot's bypass slot.
pub fn encode_with(snapshot: &StateSnapshot, version: ChunkVersion) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(24 + PARAMETER_COUNT * version.value_size());
    bytes.extend_from_slice(&CHUNK_TAG);
    bytes.extend_from_slice(&version.number().to_le_bytes());
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&PROGRAM_TAG);
    bytes.extend_from_slice(&(PARAMETER_COUNT as u32).to_le_bytes());
    for value in snapshot.values() {
        match version {
            ChunkVersion::V1 => bytes.extend_from_slice(&(*value as f32).to_le_bytes()),
            ChunkVersion::V2 => bytes.extend_from_slice(&value.to_le_bytes()),
        }
    }
    bytes.extend_from_slice(&u32::from(snapshot.bypass()).to_le_bytes());
    bytes
}

/// Decode a chunk.
///
/// Fails without side effects on any structural problem.
pub fn decode(bytes: &[u8]) -> Result<DecodedChunk, FormatError> {
    let mut reader = ChunkReader::new(bytes);

    if reader.take::<4>()? != CHUNK_TAG {
        return Err(FormatError::BadTag);
    }
    let version = ChunkVersion::from_number(reader.read_u32()?)?;
    let program_count = reader.read_u32()? as usize;
    if program_count == 0 {
        return Err(FormatError::NoPrograms);
    }

    let mut values = [0.0; PARAMETER_COUNT];
    for program in 0..program_count {
        if reader.take::<4>()? != PROGRAM_TAG {
            return Err(FormatError::BadProgramTag);
        }
        let count = reader.read_u32()? as usize;
        if count != PARAMETER_COUNT {
            return Err(FormatError::ValueCountMismatch {
                expected: PARAMETER_COUNT,
                found: count,
            });
        }
        if program == 0 {
            for value in values.iter_mut() {
                *value = reader.read_value(version)?;
            }
        } else {
            reader.skip(PARAMETER_COUNT * version.value_size())?;
        }
    }
    let bypass = reader.read_u32()? != 0;

    Ok(DecodedChunk {
        snapshot: StateSnapshot::new(values),
        bypass,
        version,
        program_count,
    })
}

struct ChunkReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> ChunkReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    fn slice(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        let available = self.bytes.len() - self.position;
        if len > available {
            return Err(FormatError::Truncated {
                needed: len,
                available,
            });
        }
        let slice = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.slice(N)?);
        Ok(out)
    }

    fn skip(&mut self, len: usize) -> Result<(), FormatError> {
        self.slice(len).map(|_| ())
    }

    fn read_u32(&mut self) -> Result<u32, FormatError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn read_value(&mut self, version: ChunkVersion) -> Result<f64, FormatError> {
        Ok(match version {
            ChunkVersion::V1 => f32::from_le_bytes(self.take()?) as f64,
            ChunkVersion::V2 => f64::from_le_bytes(self.take()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ReverbParameter;
    use proptest::prelude::*;

    fn program(values: &[f64]) -> Vec<u8> {
        let mut bytes = PROGRAM_TAG.to_vec();
        bytes.extend_from_slice(&(values.len() as u32).to_le_bytes());
        for value in values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    fn chunk(programs: &[Vec<u8>], bypass: u32) -> Vec<u8> {
        let mut bytes = CHUNK_TAG.to_vec();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&(programs.len() as u32).to_le_bytes());
        for program in programs {
            bytes.extend_from_slice(program);
        }
        bytes.extend_from_slice(&bypass.to_le_bytes());
        bytes
    }

    #[test]
    fn test_bypass_slot_round_trip() {
        let mut values = [0.5; PARAMETER_COUNT];
        values[ReverbParameter::Bypass.index()] = 1.0;
        let snapshot = StateSnapshot::new(values);

        let decoded = decode(&encode(&snapshot)).unwrap();
        assert_eq!(decoded.snapshot, snapshot);
        assert!(decoded.bypass);
        assert_eq!(decoded.version, ChunkVersion::V2);
        assert_eq!(decoded.program_count, 1);
    }

    #[test]
    fn test_v1_chunk_is_readable() {
        let snapshot = StateSnapshot::default().with(ReverbParameter::Decay, 0.25);
        let decoded = decode(&encode_with(&snapshot, ChunkVersion::V1)).unwrap();
        assert_eq!(decoded.version, ChunkVersion::V1);
        // 0.25 and the defaults are exact in f32 except 0.15.
        assert_eq!(decoded.snapshot.get(ReverbParameter::Decay), 0.25);
        assert!((decoded.snapshot.get(ReverbParameter::Mix) - 0.15).abs() < 1e-6);
        assert!(!decoded.bypass);
    }

    #[test]
    fn test_extra_programs_are_skipped() {
        let first = [0.1; PARAMETER_COUNT];
        let bytes = chunk(&[program(&first), program(&[0.9; PARAMETER_COUNT])], 1);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.program_count, 2);
        assert_eq!(decoded.snapshot.values(), &first);
        assert!(decoded.bypass);
    }

    #[test]
    fn test_rejects_short_later_program() {
        let first = [0.1; PARAMETER_COUNT];
        let bytes = chunk(&[program(&first), program(&[0.9; 3])], 0);
        assert_eq!(
            decode(&bytes),
            Err(FormatError::ValueCountMismatch {
                expected: PARAMETER_COUNT,
                found: 3,
            })
        );
    }

    #[test]
    fn test_rejects_bad_tag() {
        let mut bytes = encode(&StateSnapshot::default());
        bytes[0] = b'X';
        assert_eq!(decode(&bytes), Err(FormatError::BadTag));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut bytes = encode(&StateSnapshot::default());
        bytes[4..8].copy_from_slice(&7u32.to_le_bytes());
        assert_eq!(decode(&bytes), Err(FormatError::UnsupportedVersion(7)));
    }

    #[test]
    fn test_rejects_zero_programs() {
        let bytes = chunk(&[], 0);
        assert_eq!(decode(&bytes), Err(FormatError::NoPrograms));
    }

    #[test]
    fn test_rejects_bad_program_tag() {
        let mut bytes = encode(&StateSnapshot::default());
        bytes[12] = b'p';
        assert_eq!(decode(&bytes), Err(FormatError::BadProgramTag));
    }

    #[test]
    fn test_rejects_value_count_mismatch() {
        let bytes = chunk(&[program(&[0.5; PARAMETER_COUNT - 1])], 0);
        assert_eq!(
            decode(&bytes),
            Err(FormatError::ValueCountMismatch {
                expected: PARAMETER_COUNT,
                found: PARAMETER_COUNT - 1,
            })
        );
    }

    #[test]
    fn test_rejects_truncation_everywhere() {
        let bytes = encode(&StateSnapshot::default());
        for len in 0..bytes.len() {
            assert!(
                matches!(decode(&bytes[..len]), Err(FormatError::Truncated { .. })),
                "prefix of {len} bytes decoded"
            );
        }
    }

    #[test]
    fn test_values_are_sanitized() {
        let mut values = [0.5; PARAMETER_COUNT];
        values[0] = 3.0;
        values[1] = f64::NAN;
        let decoded = decode(&chunk(&[program(&values)], 0)).unwrap();
        assert_eq!(decoded.snapshot.get(ReverbParameter::Damping), 1.0);
        assert_eq!(decoded.snapshot.get(ReverbParameter::Density), 0.0);
    }

    proptest! {
        #[test]
        fn test_wide_chunks_are_bit_exact(values in proptest::array::uniform10(0.0f64..=1.0)) {
            let snapshot = StateSnapshot::new(values);
            let decoded = decode(&encode(&snapshot)).unwrap();
            prop_assert_eq!(decoded.snapshot, snapshot);
            prop_assert_eq!(decoded.bypass, snapshot.bypass());
        }
    }
}
