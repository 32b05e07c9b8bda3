//! Half-duplex bus arbitration
//!
//! The door bus is a single wire shared by the opener, the wall console
//! and the bridge. Before every frame the bridge announces itself by
//! pulling the line for 1.3 ms, releases it for 0.13 ms and checks that
//! nobody else started talking meanwhile. Inter-frame timing is tracked
//! here so the event loop knows when the next frame may go out.

use crate::config::SecurityType;
use crate::error::Error;

/// Length of the announce pulse
pub const SYNC_ASSERT_US: u32 = 1300;
/// Gap between the announce pulse and the frame
pub const SYNC_RELEASE_US: u32 = 130;
/// Delay before retrying after a collision
pub const RETRY_BACKOFF_MS: u64 = 20;

/// Security+ 1.0 minimum quiet time after any traffic
const SEC1_MIN_GAP_MS: u64 = 20;
/// Security+ 1.0 window after a console poll in which the bridge may talk
const SEC1_RX_WINDOW_MS: u64 = 200;

/// Transmit-side failures reported by the bus driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusError {
    /// Write exceeded its time budget
    Timeout,
    /// Driver fault
    Uart,
}

/// Physical access to the door bus
pub trait Bus {
    /// True while another station drives the line
    fn line_busy(&mut self) -> bool;

    /// True when received bytes are waiting to be read
    fn rx_pending(&self) -> bool;

    /// Drive (or release) the line for the announce pulse
    fn set_tx_asserted(&mut self, asserted: bool);

    /// Busy-wait for a short interval
    fn delay_us(&mut self, us: u32) -> impl core::future::Future<Output = ()>;

    /// Write one frame in a single burst
    fn write(&mut self, bytes: &[u8]) -> impl core::future::Future<Output = Result<(), BusError>>;
}

/// Transmit discipline and inter-frame timing
#[derive(Debug, Clone)]
pub struct BusArbiter {
    security: SecurityType,
    last_tx_ms: Option<u64>,
    last_rx_ms: Option<u64>,
    post_delay_ms: u32,
    retry_at_ms: Option<u64>,
    wall_panel: bool,
}

impl BusArbiter {
    pub fn new(security: SecurityType) -> Self {
        Self {
            security,
            last_tx_ms: None,
            last_rx_ms: None,
            post_delay_ms: 0,
            retry_at_ms: None,
            wall_panel: false,
        }
    }

    /// A wall console is polling the opener
    pub fn set_wall_panel(&mut self, present: bool) {
        self.wall_panel = present;
    }

    pub fn wall_panel(&self) -> bool {
        self.wall_panel
    }

    /// Record inbound traffic
    pub fn note_rx(&mut self, now_ms: u64) {
        self.last_rx_ms = Some(now_ms);
    }

    /// Record a completed transmit and the quiet time it asks for
    pub fn note_tx(&mut self, now_ms: u64, post_delay_ms: u32) {
        self.last_tx_ms = Some(now_ms);
        self.post_delay_ms = post_delay_ms;
        self.retry_at_ms = None;
    }

    /// Back off after a failed transmit
    pub fn note_collision(&mut self, now_ms: u64) {
        self.retry_at_ms = Some(now_ms + RETRY_BACKOFF_MS);
    }

    /// Earliest time the next frame may be sent
    ///
    /// Returns `None` when the Security+ 1.0 console window is closed at
    /// `now_ms` or will be by then; the next console poll opens a new one.
    pub fn ready_at(&self, now_ms: u64) -> Option<u64> {
        let mut at = self.retry_at_ms.unwrap_or(0);
        let post_delay = self.post_delay_ms as u64;

        match self.security {
            SecurityType::Sec2 => {
                if let Some(tx) = self.last_tx_ms {
                    at = at.max(tx + post_delay);
                }
            }
            SecurityType::Sec1 => {
                if let Some(tx) = self.last_tx_ms {
                    at = at.max(tx + post_delay.max(SEC1_MIN_GAP_MS) + 1);
                }
                if let Some(rx) = self.last_rx_ms {
                    at = at.max(rx + SEC1_MIN_GAP_MS + 1);
                    let window_end = rx + SEC1_RX_WINDOW_MS;
                    if self.wall_panel && (at > window_end || now_ms > window_end) {
                        return None;
                    }
                }
            }
        }
        Some(at)
    }

    /// True when a frame may be sent at `now_ms`
    pub fn can_transmit(&self, now_ms: u64) -> bool {
        self.ready_at(now_ms).is_some_and(|at| now_ms >= at)
    }

    /// Time on the wire for a frame of `len` bytes, announce pulse included
    pub fn airtime_ms(&self, len: usize) -> u64 {
        let bit_us = self.security.uart_config().bit_time_us() as u64;
        let micros = (SYNC_ASSERT_US + SYNC_RELEASE_US) as u64 + len as u64 * 10 * bit_us;
        micros.div_ceil(1000)
    }

    /// Send one frame started at `now_ms` with collision detection
    ///
    /// On success the quiet time of `post_delay_ms` starts once the frame
    /// has left the wire. Any failure leaves the line released and backs
    /// off before the next attempt.
    pub async fn transmit<B: Bus>(
        &mut self,
        bus: &mut B,
        frame: &[u8],
        now_ms: u64,
        post_delay_ms: u32,
    ) -> Result<(), Error> {
        let result = self.send(bus, frame).await;
        match result {
            Ok(()) => self.note_tx(now_ms + self.airtime_ms(frame.len()), post_delay_ms),
            Err(_) => self.note_collision(now_ms),
        }
        result
    }

    async fn send<B: Bus>(&mut self, bus: &mut B, frame: &[u8]) -> Result<(), Error> {
        if self.security == SecurityType::Sec1 && bus.rx_pending() {
            return Err(Error::Collision);
        }
        if bus.line_busy() {
            return Err(Error::Collision);
        }

        bus.set_tx_asserted(true);
        bus.delay_us(SYNC_ASSERT_US).await;
        bus.set_tx_asserted(false);
        bus.delay_us(SYNC_RELEASE_US).await;

        if bus.line_busy() {
            return Err(Error::Collision);
        }

        bus.write(frame).await.map_err(|e| match e {
            BusError::Timeout => Error::UartWriteTimeout,
            BusError::Uart => Error::Collision,
        })
    }
}
