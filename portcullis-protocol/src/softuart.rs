//! Software UART over line edges
//!
//! The receive pin raises an interrupt on every edge; the handler only
//! records an [`EdgeEvent`]. [`EdgeDecoder`] turns that edge stream back
//! into bytes by counting how many bit periods each level lasted. Frames
//! are 8N1, LSB first. A byte whose trailing bits are all at the idle
//! level produces no closing edge, so the owner calls
//! [`EdgeDecoder::timeout`] after a short silence to flush it.

/// A level change seen on the receive pin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EdgeEvent {
    /// Monotonic timestamp in microseconds
    pub micros: u64,
    /// Pin level after the edge
    pub level: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RxState {
    Idle,
    Start,
    Data,
    Stop,
}

/// Edge-driven byte decoder
#[derive(Debug, Clone)]
pub struct EdgeDecoder {
    bit_time_us: u64,
    invert: bool,
    state: RxState,
    last_edge_us: u64,
    last_level: bool,
    rx_byte: u8,
    rx_bits: u8,
}

impl EdgeDecoder {
    /// Create a decoder for the given bit time and line polarity
    pub fn new(bit_time_us: u32, invert: bool) -> Self {
        Self {
            bit_time_us: bit_time_us.max(1) as u64,
            invert,
            state: RxState::Idle,
            last_edge_us: 0,
            // Idle line is a logical one
            last_level: !invert,
            rx_byte: 0,
            rx_bits: 0,
        }
    }

    /// True while a byte is partially decoded
    pub fn is_busy(&self) -> bool {
        self.state != RxState::Idle
    }

    fn logical(&self, level: bool) -> bool {
        level ^ self.invert
    }

    /// Process one edge; returns a byte when its stop bit completes
    pub fn process(&mut self, event: EdgeEvent) -> Option<u8> {
        let elapsed = event.micros.saturating_sub(self.last_edge_us);
        let mut periods = elapsed / self.bit_time_us;
        if elapsed % self.bit_time_us > self.bit_time_us / 2 {
            periods += 1;
        }

        let held = self.logical(self.last_level);
        let next = self.logical(event.level);
        let mut received = None;

        while periods > 0 {
            match self.state {
                RxState::Idle => {
                    // Only the level change matters, however long the line idled
                    if event.level == self.last_level || next {
                        break;
                    }
                    self.state = RxState::Start;
                    periods = 1;
                }
                RxState::Start => {
                    if held {
                        // Glitch, not a start bit
                        self.state = RxState::Idle;
                    } else {
                        self.rx_byte = 0;
                        self.rx_bits = 0;
                        self.state = RxState::Data;
                    }
                }
                RxState::Data => {
                    self.rx_byte >>= 1;
                    if held {
                        self.rx_byte |= 0x80;
                    }
                    self.rx_bits += 1;
                    if self.rx_bits == 8 {
                        self.state = RxState::Stop;
                    }
                }
                RxState::Stop => {
                    if held {
                        received = Some(self.rx_byte);
                    }
                    self.state = if periods == 1 && !next {
                        RxState::Start
                    } else {
                        RxState::Idle
                    };
                }
            }
            periods -= 1;
        }

        self.last_edge_us = event.micros;
        self.last_level = event.level;
        received
    }

    /// Flush after silence by replaying the current level at `now_us`
    pub fn timeout(&mut self, now_us: u64) -> Option<u8> {
        self.process(EdgeEvent {
            micros: now_us,
            level: self.last_level,
        })
    }
}

/// Pin levels for one 8N1 frame: start bit, data LSB first, stop bit
pub fn frame_levels(byte: u8, invert: bool) -> [bool; 10] {
    let mut levels = [true; 10];
    levels[0] = false;
    for (bit, level) in levels[1..9].iter_mut().enumerate() {
        *level = (byte >> bit) & 1 != 0;
    }
    levels.map(|l| l ^ invert)
}
