//! Grid characteristic codec.
//!
//! Layout (18 bytes):
//! ```text
//! Bytes 0..2:   timestamp / sequence tag (u16, little-endian)
//! Bytes 2..6:   slot 0 intensity (f32, little-endian IEEE-754)
//! Bytes 6..10:  slot 1 intensity
//! Bytes 10..14: slot 2 intensity
//! Bytes 14..18: slot 3 intensity
//! ```
//!
//! The four slots are a 2×2 grid in row-major order. Values are carried
//! exactly as sent: NaN, infinities and anything outside `[0.0, 1.0]`
//! decode fine and are clamped later by the actuation mapper.

/// Number of intensity slots in a frame.
pub const GRID_SLOTS: usize = 4;

/// Size of a complete Grid frame.
pub const GRID_FRAME_LEN: usize = 2 + GRID_SLOTS * 4;

/// Errors from [`decode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Fewer than [`GRID_FRAME_LEN`] bytes were written.
    TooShort { len: usize },
}

/// A decoded Grid frame.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GridCommand {
    pub timestamp: u16,
    pub values: [f32; GRID_SLOTS],
}

impl GridCommand {
    pub const fn new(timestamp: u16, values: [f32; GRID_SLOTS]) -> Self {
        Self { timestamp, values }
    }

    /// All slots at zero intensity.
    pub const fn off(timestamp: u16) -> Self {
        Self::new(timestamp, [0.0; GRID_SLOTS])
    }
}

/// Decode a Grid frame. Bytes past [`GRID_FRAME_LEN`] are ignored.
pub fn decode(bytes: &[u8]) -> Result<GridCommand, DecodeError> {
    let Some(frame) = bytes.get(..GRID_FRAME_LEN) else {
        return Err(DecodeError::TooShort { len: bytes.len() });
    };

    let timestamp = u16::from_le_bytes([frame[0], frame[1]]);

    let mut values = [0.0f32; GRID_SLOTS];
    for (value, field) in values.iter_mut().zip(frame[2..].chunks_exact(4)) {
        let bits = u32::from_le_bytes([field[0], field[1], field[2], field[3]]);
        *value = f32::from_bits(bits);
    }

    Ok(GridCommand { timestamp, values })
}

/// Encode a Grid frame.
pub fn encode(command: &GridCommand) -> [u8; GRID_FRAME_LEN] {
    let mut frame = [0u8; GRID_FRAME_LEN];
    frame[0..2].copy_from_slice(&command.timestamp.to_le_bytes());
    for (field, value) in frame[2..].chunks_exact_mut(4).zip(command.values.iter()) {
        field.copy_from_slice(&value.to_bits().to_le_bytes());
    }
    frame
}

/// Telemetry tag derived from device uptime: 8 ms resolution, wrapping.
pub fn telemetry_tag(uptime_ms: u64) -> u16 {
    (uptime_ms >> 3) as u16
}
