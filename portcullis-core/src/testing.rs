//! In-memory fakes for the host test suites

use heapless::{Deque, Vec};
use portcullis_hal::{FlashError, FlashStorage, StorageKey};
use portcullis_protocol::{Message, FRAME_LEN};

use crate::arbiter::{Bus, BusError};
use crate::observer::{Notification, Observer};

const SLOTS: usize = 5;

/// Key/value storage backed by RAM
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slots: [Option<Vec<u8, 64>>; SLOTS],
    fail_writes: bool,
    pub writes: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn get(&self, key: StorageKey) -> Option<&[u8]> {
        self.slots[key.as_u8() as usize].as_deref()
    }

    pub fn get_u32(&self, key: StorageKey) -> Option<u32> {
        let bytes: [u8; 4] = self.get(key)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }

    pub fn set(&mut self, key: StorageKey, data: &[u8]) {
        self.slots[key.as_u8() as usize] = Vec::from_slice(data).ok();
    }

    pub fn set_u32(&mut self, key: StorageKey, value: u32) {
        self.set(key, &value.to_le_bytes());
    }
}

impl FlashStorage for MemoryStorage {
    async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        let data = self.get(key).ok_or(FlashError::NotFound)?;
        let dest = buffer.get_mut(..data.len()).ok_or(FlashError::BufferTooSmall)?;
        dest.copy_from_slice(data);
        Ok(data.len())
    }

    async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        if self.fail_writes {
            return Err(FlashError::Storage);
        }
        self.writes += 1;
        self.set(key, data);
        Ok(())
    }

    async fn remove(&mut self, key: StorageKey) -> Result<(), FlashError> {
        if self.fail_writes {
            return Err(FlashError::Storage);
        }
        self.slots[key.as_u8() as usize] = None;
        Ok(())
    }

    async fn exists(&mut self, key: StorageKey) -> bool {
        self.get(key).is_some()
    }

    async fn erase_all(&mut self) -> Result<(), FlashError> {
        self.slots = Default::default();
        Ok(())
    }
}

/// One interaction with the fake bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOp {
    Assert(bool),
    Delay(u32),
    Write(usize),
}

/// Bus that records everything written to it
#[derive(Debug, Default)]
pub struct FakeBus {
    /// Queued answers for `line_busy`, idle once drained
    pub busy_samples: Deque<bool, 16>,
    pub rx_pending: bool,
    pub asserted: bool,
    /// Error returned by the next write
    pub write_error: Option<BusError>,
    pub ops: Vec<BusOp, 256>,
    pub frames: Vec<Vec<u8, FRAME_LEN>, 64>,
}

impl FakeBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Security+ 2.0 messages written so far
    pub fn messages(&self) -> Vec<Message, 64> {
        self.frames
            .iter()
            .map(|f| {
                let frame: [u8; FRAME_LEN] = f.as_slice().try_into().unwrap();
                Message::decode(&frame).unwrap()
            })
            .collect()
    }

    /// Security+ 1.0 bytes written so far
    pub fn bytes(&self) -> Vec<u8, 64> {
        self.frames.iter().flat_map(|f| f.iter().copied()).collect()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
        self.frames.clear();
    }
}

impl Bus for FakeBus {
    fn line_busy(&mut self) -> bool {
        self.busy_samples.pop_front().unwrap_or(false)
    }

    fn rx_pending(&self) -> bool {
        self.rx_pending
    }

    fn set_tx_asserted(&mut self, asserted: bool) {
        self.asserted = asserted;
        self.ops.push(BusOp::Assert(asserted)).unwrap();
    }

    async fn delay_us(&mut self, us: u32) {
        self.ops.push(BusOp::Delay(us)).unwrap();
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        if let Some(e) = self.write_error.take() {
            return Err(e);
        }
        self.ops.push(BusOp::Write(bytes.len())).unwrap();
        self.frames.push(Vec::from_slice(bytes).unwrap()).unwrap();
        Ok(())
    }
}

/// Observer that keeps every notification
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub seen: Vec<Notification, 64>,
}

impl RecordingObserver {
    pub fn contains(&self, notification: Notification) -> bool {
        self.seen.contains(&notification)
    }

    pub fn count(&self, notification: Notification) -> usize {
        self.seen.iter().filter(|n| **n == notification).count()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

impl Observer for RecordingObserver {
    fn notify(&mut self, notification: Notification) {
        self.seen.push(notification).unwrap();
    }
}
