//! Security+ 2.0 byte framer
//!
//! Scans the byte stream for the preamble with a 24-bit shift register,
//! then collects the rest of the frame. The frame-type bits at the head of
//! each half are checked as soon as their byte arrives so that a false
//! preamble match inside noise is dropped early.

use heapless::Vec;

use crate::error::FramingError;
use crate::secplus2::{FRAME_LEN, PREAMBLE};

/// Inter-byte silence after which a partial frame is discarded
pub const FRAME_TIMEOUT_MS: u64 = 100;

const PREAMBLE_WORD: u32 = (PREAMBLE[0] as u32) << 16 | (PREAMBLE[1] as u32) << 8 | PREAMBLE[2] as u32;

/// Offsets of the two half headers and the frame-type bits expected there
const HEADER_CHECKS: [(usize, u8); 2] = [(3, 0b00), (11, 0b01)];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    /// Looking for `55 01 00`
    Scanning,
    /// Preamble seen, collecting the halves
    Receiving,
}

/// Incremental frame reader
#[derive(Debug, Clone)]
pub struct Sec2Reader {
    state: ReadState,
    shift: u32,
    buffer: Vec<u8, FRAME_LEN>,
    last_byte_ms: u64,
}

impl Default for Sec2Reader {
    fn default() -> Self {
        Self::new()
    }
}

impl Sec2Reader {
    /// Create a new reader
    pub fn new() -> Self {
        Self {
            state: ReadState::Scanning,
            shift: 0,
            buffer: Vec::new(),
            last_byte_ms: 0,
        }
    }

    /// Reset to scanning, dropping any partial frame
    pub fn reset(&mut self) {
        self.state = ReadState::Scanning;
        self.shift = 0;
        self.buffer.clear();
    }

    /// True while a frame is partially received
    pub fn is_receiving(&self) -> bool {
        self.state == ReadState::Receiving
    }

    /// Deadline after which the current partial frame expires
    pub fn deadline(&self) -> Option<u64> {
        self.is_receiving().then_some(self.last_byte_ms + FRAME_TIMEOUT_MS)
    }

    /// Drop a partial frame whose inter-byte timeout has passed
    pub fn expire(&mut self, now_ms: u64) -> Result<(), FramingError> {
        match self.deadline() {
            Some(deadline) if now_ms > deadline => {
                self.reset();
                Err(FramingError::Timeout)
            }
            _ => Ok(()),
        }
    }

    /// Feed a single byte received at `now_ms`
    ///
    /// Returns `Ok(Some(frame))` when a complete frame is assembled,
    /// `Ok(None)` when more bytes are needed, or `Err` when a partial frame
    /// was abandoned (scanning resumes with this byte).
    pub fn feed(&mut self, byte: u8, now_ms: u64) -> Result<Option<[u8; FRAME_LEN]>, FramingError> {
        let expired = self.expire(now_ms);
        self.last_byte_ms = now_ms;

        match self.state {
            ReadState::Scanning => {
                self.scan(byte);
                expired.map(|_| None)
            }
            ReadState::Receiving => {
                // Capacity is checked below, a full buffer is emitted and cleared
                let _ = self.buffer.push(byte);
                let index = self.buffer.len() - 1;

                for (offset, header) in HEADER_CHECKS {
                    if index == offset && byte >> 6 != header {
                        self.reset();
                        self.scan(byte);
                        return Err(FramingError::BadHeader);
                    }
                }

                if self.buffer.len() < FRAME_LEN {
                    return Ok(None);
                }

                let mut frame = [0u8; FRAME_LEN];
                frame.copy_from_slice(&self.buffer);
                self.reset();
                Ok(Some(frame))
            }
        }
    }

    fn scan(&mut self, byte: u8) {
        self.shift = ((self.shift << 8) | byte as u32) & 0x00ff_ffff;
        if self.shift == PREAMBLE_WORD {
            self.buffer.clear();
            // The buffer is empty and larger than the preamble
            let _ = self.buffer.extend_from_slice(&PREAMBLE);
            self.state = ReadState::Receiving;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Packet;
    use crate::secplus2::Message;

    fn frame() -> [u8; FRAME_LEN] {
        Message::new(Packet::GetStatus, 42, 0x0045_6539).encode().unwrap()
    }

    fn feed_all(reader: &mut Sec2Reader, bytes: &[u8], now_ms: u64) -> Option<[u8; FRAME_LEN]> {
        let mut out = None;
        for &b in bytes {
            if let Ok(Some(f)) = reader.feed(b, now_ms) {
                out = Some(f);
            }
        }
        out
    }

    #[test]
    fn test_reads_complete_frame() {
        let mut reader = Sec2Reader::new();
        assert_eq!(feed_all(&mut reader, &frame(), 0), Some(frame()));
        assert!(!reader.is_receiving());
    }

    #[test]
    fn test_resync_after_garbage() {
        let mut reader = Sec2Reader::new();
        assert_eq!(feed_all(&mut reader, &[0x00, 0x55, 0x55, 0x01, 0xff], 0), None);
        assert_eq!(feed_all(&mut reader, &frame(), 1), Some(frame()));
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut reader = Sec2Reader::new();
        let mut count = 0;
        for _ in 0..3 {
            for &b in frame().iter() {
                if let Ok(Some(_)) = reader.feed(b, 0) {
                    count += 1;
                }
            }
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn test_partial_frame_times_out() {
        let mut reader = Sec2Reader::new();
        let f = frame();
        assert_eq!(feed_all(&mut reader, &f[..10], 0), None);
        assert_eq!(reader.deadline(), Some(FRAME_TIMEOUT_MS));
        assert_eq!(reader.feed(f[10], 150), Err(FramingError::Timeout));
        assert!(!reader.is_receiving());

        // A full frame after the timeout still reads
        assert_eq!(feed_all(&mut reader, &f, 151), Some(f));
    }

    #[test]
    fn test_expire_without_bytes() {
        let mut reader = Sec2Reader::new();
        feed_all(&mut reader, &frame()[..5], 10);
        assert_eq!(reader.expire(100), Ok(()));
        assert_eq!(reader.expire(111), Err(FramingError::Timeout));
        assert_eq!(reader.deadline(), None);
    }

    #[test]
    fn test_bad_header_rescans() {
        let mut reader = Sec2Reader::new();
        let mut f = frame();
        f[3] |= 0x80;
        let result = f.iter().map(|&b| reader.feed(b, 0)).find(|r| r.is_err());
        assert_eq!(result, Some(Err(FramingError::BadHeader)));
        assert!(!reader.is_receiving());
    }
}
