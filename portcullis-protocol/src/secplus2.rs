//! Security+ 2.0 wireline codec
//!
//! Frame layout (19 bytes):
//! - PREAMBLE (3 bytes): `55 01 00`
//! - HALF 0 (8 bytes, big endian): frame type `00`, indicator, payload
//! - HALF 1 (8 bytes, big endian): frame type `01`, indicator, payload
//!
//! Each half carries 9 of the 18 ternary digits of the rolling code,
//! 20 bits of the 40-bit fixed value and 16 bits of the 32-bit data word.
//! The first four digits of a half form its indicator, which picks the
//! order and the inversion of the three 18-bit parts that are bit
//! interleaved into the 54-bit payload.

use crate::error::{CodecError, FramingError};
use crate::packet::{Packet, PAYLOAD_MASK};

/// Frame synchronization bytes
pub const PREAMBLE: [u8; 3] = [0x55, 0x01, 0x00];

/// Length of a complete frame in bytes
pub const FRAME_LEN: usize = 19;

/// Rolling codes are 28-bit counters
pub const ROLLING_MODULUS: u32 = 1 << 28;

/// Width of the fixed value in bits
const FIXED_BITS: u32 = 40;

/// Width of one scrambled part
const PART_MASK: u32 = 0x3ffff;

/// Frame-type bits heading each half
const HALF_HEADERS: [u8; 2] = [0b00, 0b01];

/// Transmission order of the parts, selected by indicator digits 0 and 1
const ORDER: [[usize; 3]; 9] = [
    [2, 1, 0],
    [2, 0, 1],
    [0, 2, 1],
    [1, 2, 0],
    [1, 0, 2],
    [0, 1, 2],
    [1, 2, 0],
    [0, 2, 1],
    [2, 1, 0],
];

/// Inverted slots, selected by indicator digits 2 and 3
const INVERT: [[bool; 3]; 9] = [
    [true, true, false],
    [false, true, false],
    [false, false, true],
    [true, true, true],
    [true, false, true],
    [false, true, true],
    [true, false, false],
    [false, false, false],
    [true, false, true],
];

/// A decoded frame before interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Wireline {
    pub rolling: u32,
    pub fixed: u64,
    pub data: u32,
}

/// A packet together with the codes it travels with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Message {
    pub packet: Packet,
    /// Rolling-code counter at encode time
    pub rolling: u32,
    /// Id of the sending station
    pub remote_id: u32,
}

impl Message {
    /// Create a message
    pub fn new(packet: Packet, rolling: u32, remote_id: u32) -> Self {
        Self {
            packet,
            rolling,
            remote_id,
        }
    }

    /// Encode into a 19-byte frame
    pub fn encode(&self) -> Result<[u8; FRAME_LEN], CodecError> {
        let command = self.packet.command();
        let payload = self.packet.payload();
        if command > 0xfff || payload & !PAYLOAD_MASK != 0 {
            return Err(CodecError::EncodingRange);
        }

        let fixed = ((command as u64 & 0xf00) << 24) | self.remote_id as u64;
        let data = payload | (command as u32 & 0xff);
        encode_wireline(self.rolling, fixed, data)
    }

    /// Decode a 19-byte frame
    pub fn decode(frame: &[u8; FRAME_LEN]) -> Result<Self, CodecError> {
        let wire = decode_wireline(frame)?;
        let command = ((wire.fixed >> 24) & 0xf00) as u16 | (wire.data & 0xff) as u16;
        Ok(Self {
            packet: Packet::from_parts(command, wire.data),
            rolling: wire.rolling,
            remote_id: wire.fixed as u32,
        })
    }
}

/// Encode raw rolling, fixed and data values into a frame
///
/// The parity nibble of `data` (bits 12..15) is computed here and any
/// value passed in those bits is ignored.
pub fn encode_wireline(rolling: u32, fixed: u64, data: u32) -> Result<[u8; FRAME_LEN], CodecError> {
    if rolling >= ROLLING_MODULUS || fixed >> FIXED_BITS != 0 {
        return Err(CodecError::EncodingRange);
    }
    Ok(pack(rolling, fixed, with_parity(fixed, data)))
}

/// Decode a frame into raw rolling, fixed and data values
pub fn decode_wireline(frame: &[u8; FRAME_LEN]) -> Result<Wireline, FramingError> {
    if frame[..3] != PREAMBLE {
        return Err(FramingError::BadPreamble);
    }

    let mut rolling_halves = [0u32; 2];
    let mut fixed = 0u64;
    let mut data = 0u32;
    for (half, header) in HALF_HEADERS.iter().enumerate() {
        let start = 3 + half * 8;
        let word = be_u64(&frame[start..start + 8]);
        let (rolling, fixed_part, data_part) = decode_half(word, *header)?;
        rolling_halves[half] = rolling;
        fixed = (fixed << 20) | fixed_part as u64;
        data = (data << 16) | data_part as u32;
    }

    if with_parity(fixed, data) != data {
        return Err(FramingError::Parity);
    }

    Ok(Wireline {
        rolling: halves_to_rolling(rolling_halves)?,
        fixed,
        data,
    })
}

fn pack(rolling: u32, fixed: u64, data: u32) -> [u8; FRAME_LEN] {
    let rolling_halves = rolling_to_halves(rolling);
    let fixed_halves = [(fixed >> 20) as u32, (fixed & 0xfffff) as u32];
    let data_halves = [(data >> 16) as u16, data as u16];

    let mut frame = [0u8; FRAME_LEN];
    frame[..3].copy_from_slice(&PREAMBLE);
    for half in 0..2 {
        let word = encode_half(
            rolling_halves[half],
            fixed_halves[half],
            data_halves[half],
            HALF_HEADERS[half],
        );
        let start = 3 + half * 8;
        frame[start..start + 8].copy_from_slice(&word.to_be_bytes());
    }
    frame
}

fn be_u64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0, |acc, &b| (acc << 8) | b as u64)
}

/// Recompute the parity nibble: fixed bits 32..35 XOR every other data nibble
fn with_parity(fixed: u64, data: u32) -> u32 {
    let data = data & !0xf000;
    let mut parity = ((fixed >> 32) & 0xf) as u32;
    let mut rest = data;
    while rest != 0 {
        parity ^= rest & 0xf;
        rest >>= 4;
    }
    data | (parity << 12)
}

/// Spread the bit-reversed counter over two halves of nine ternary digits
fn rolling_to_halves(rolling: u32) -> [u32; 2] {
    let mut value = rolling.reverse_bits() >> 4;
    let mut halves = [0u32; 2];
    for shift in (0..=16).rev().step_by(2) {
        for half in halves.iter_mut() {
            *half |= (value % 3) << shift;
            value /= 3;
        }
    }
    halves
}

fn halves_to_rolling(halves: [u32; 2]) -> Result<u32, FramingError> {
    let mut value = 0u32;
    for shift in (0..=16).step_by(2) {
        for half in [1, 0] {
            let trit = (halves[half] >> shift) & 0b11;
            if trit == 0b11 {
                return Err(FramingError::InvalidTrit);
            }
            value = value * 3 + trit;
        }
    }
    // 18 digits can spell values beyond 28 bits
    if value >= ROLLING_MODULUS {
        return Err(FramingError::InvalidTrit);
    }
    Ok(value.reverse_bits() >> 4)
}

fn trit(indicator: u8, shift: u8) -> Result<usize, FramingError> {
    match (indicator >> shift) & 0b11 {
        0b11 => Err(FramingError::InvalidTrit),
        t => Ok(t as usize),
    }
}

/// Part order and inversion selected by an indicator
fn scramble(indicator: u8) -> Result<([usize; 3], [bool; 3]), FramingError> {
    let order = ORDER[trit(indicator, 6)? * 3 + trit(indicator, 4)?];
    let invert = INVERT[trit(indicator, 2)? * 3 + trit(indicator, 0)?];
    Ok((order, invert))
}

fn encode_half(rolling: u32, fixed: u32, data: u16, header: u8) -> u64 {
    let indicator = (rolling >> 10) as u8;
    // Digits produced by rolling_to_halves are always valid
    let (order, invert) = scramble(indicator).unwrap_or(([0, 1, 2], [false; 3]));

    let parts = [
        ((fixed >> 10) << 8) | (data >> 8) as u32,
        ((fixed & 0x3ff) << 8) | (data & 0xff) as u32,
        ((rolling & 0x3ff) << 8) | indicator as u32,
    ];

    let mut slots = [0u32; 3];
    for (slot, value) in slots.iter_mut().enumerate() {
        *value = parts[order[slot]] ^ if invert[slot] { PART_MASK } else { 0 };
    }

    let mut payload = 0u64;
    for bit in (0..18).rev() {
        for value in slots {
            payload = (payload << 1) | ((value >> bit) & 1) as u64;
        }
    }

    ((header as u64) << 62) | ((indicator as u64) << 54) | payload
}

fn decode_half(word: u64, header: u8) -> Result<(u32, u32, u16), FramingError> {
    if (word >> 62) as u8 != header {
        return Err(FramingError::BadHeader);
    }

    let indicator = (word >> 54) as u8;
    let (order, invert) = scramble(indicator)?;

    let mut slots = [0u32; 3];
    for i in 0..54 {
        let bit = ((word >> (53 - i)) & 1) as u32;
        slots[i % 3] = (slots[i % 3] << 1) | bit;
    }

    let mut parts = [0u32; 3];
    for (slot, value) in slots.iter().enumerate() {
        parts[order[slot]] = value ^ if invert[slot] { PART_MASK } else { 0 };
    }

    if parts[2] & 0xff != indicator as u32 {
        return Err(FramingError::IndicatorMismatch);
    }

    let rolling = ((indicator as u32) << 10) | (parts[2] >> 8);
    let fixed = ((parts[0] >> 8) << 10) | (parts[1] >> 8);
    let data = (((parts[0] & 0xff) << 8) | (parts[1] & 0xff)) as u16;
    Ok((rolling, fixed, data))
}
