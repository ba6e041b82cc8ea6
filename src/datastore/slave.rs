//! The slave context: the four standard entity blocks (coils, discrete
//! inputs, holding registers, input registers) plus custom blocks
//! addressable by function code.
//!
//! Concurrency: each block is behind its own [`parking_lot::RwLock`] — a
//! read-heavy workload with an uncontended fast path. A single request
//! only ever touches one block, so per-block locking gives "no torn reads
//! within one request" (§5) without a context-wide mutex.

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::DeviceIdentity;
use crate::datastore::block::{DataBlock, SequentialBlock};
use crate::error::{ModbusError, Result};

/// Maximum number of values a FIFO queue ([`SlaveContext::fifo_push`]) can
/// hold at once, per §3's FC 24 response field (`count ≤ 31`).
pub const FIFO_MAX_LEN: usize = 31;

/// Maximum number of byte entries retained in the communication event log
/// (FC 12). Oldest entries are dropped once the log is full — the source
/// protocol never specifies a cap, so this follows pymodbus's own default.
const EVENT_LOG_MAX_LEN: usize = 64;

#[derive(Default)]
struct EventLog {
    /// True while a message is being processed for this device — mirrors
    /// the "Communication Event Counter" status field, which is 0xFFFF
    /// while busy and 0x0000 once idle. This crate never holds a request
    /// across a suspension point while counting, so it is always idle.
    events: VecDeque<u8>,
    event_count: u16,
    message_count: u16,
}

/// The four standard Modbus entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Coil,
    DiscreteInput,
    HoldingRegister,
    InputRegister,
}

impl EntityKind {
    /// Map a function code (read or write) to the entity it addresses, per
    /// §4.4. Returns `None` for function codes with no associated entity
    /// (diagnostics, device info, ...) or an unregistered custom code.
    pub fn for_function_code(fc: u8) -> Option<Self> {
        match fc {
            0x01 | 0x05 | 0x0F => Some(EntityKind::Coil),
            0x02 => Some(EntityKind::DiscreteInput),
            0x03 | 0x06 | 0x10 | 0x16 | 0x17 => Some(EntityKind::HoldingRegister),
            0x04 => Some(EntityKind::InputRegister),
            _ => None,
        }
    }
}

/// Either shape of read value, depending on which entity kind was accessed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Values {
    Bits(Vec<bool>),
    Words(Vec<u16>),
}

enum Block {
    Bits(RwLock<Box<dyn DataBlock<bool> + Send + Sync>>),
    Words(RwLock<Box<dyn DataBlock<u16> + Send + Sync>>),
}

/// One addressable Modbus slave: the four standard blocks plus any custom
/// ones registered by function code.
pub struct SlaveContext {
    coils: RwLock<Box<dyn DataBlock<bool> + Send + Sync>>,
    discrete_inputs: RwLock<Box<dyn DataBlock<bool> + Send + Sync>>,
    holding_registers: RwLock<Box<dyn DataBlock<u16> + Send + Sync>>,
    input_registers: RwLock<Box<dyn DataBlock<u16> + Send + Sync>>,
    custom: HashMap<u8, Block>,
    /// When `false` (the default, per §3), incoming wire addresses are
    /// incremented by one before block lookup.
    pub zero_mode: bool,
    /// FC 7 (Read Exception Status): eight bits of device-defined status.
    exception_status: RwLock<u8>,
    /// Set by a Force Listen Only Mode diagnostic (FC 8, sub-function
    /// 0x04): while true, every request this device answers is suppressed
    /// at the server loop, not just the one that set it.
    listen_only: RwLock<bool>,
    /// FC 11/12 (Get Comm Event Counter / Get Comm Event Log).
    event_log: RwLock<EventLog>,
    /// FC 24 (Read FIFO Queue), keyed by FIFO pointer address.
    fifo_queues: RwLock<HashMap<u16, VecDeque<u16>>>,
    /// FC 20/21 (Read/Write File Record), keyed by (file_number, record_number).
    files: RwLock<HashMap<(u16, u16), Vec<u16>>>,
    /// Backs FC 17 (Report Slave Id) and FC 43/14 (Read Device Information).
    pub identity: DeviceIdentity,
}

impl Default for SlaveContext {
    fn default() -> Self {
        Self {
            coils: RwLock::new(Box::new(SequentialBlock::<bool>::full_range())),
            discrete_inputs: RwLock::new(Box::new(SequentialBlock::<bool>::full_range())),
            holding_registers: RwLock::new(Box::new(SequentialBlock::<u16>::full_range())),
            input_registers: RwLock::new(Box::new(SequentialBlock::<u16>::full_range())),
            custom: HashMap::new(),
            zero_mode: false,
            exception_status: RwLock::new(0),
            listen_only: RwLock::new(false),
            event_log: RwLock::new(EventLog::default()),
            fifo_queues: RwLock::new(HashMap::new()),
            files: RwLock::new(HashMap::new()),
            identity: DeviceIdentity::default(),
        }
    }
}

impl SlaveContext {
    /// Build a context from explicit blocks (tests commonly want a small
    /// block rather than the full 64K-cell default).
    pub fn new(
        coils: Box<dyn DataBlock<bool> + Send + Sync>,
        discrete_inputs: Box<dyn DataBlock<bool> + Send + Sync>,
        holding_registers: Box<dyn DataBlock<u16> + Send + Sync>,
        input_registers: Box<dyn DataBlock<u16> + Send + Sync>,
    ) -> Self {
        Self {
            coils: RwLock::new(coils),
            discrete_inputs: RwLock::new(discrete_inputs),
            holding_registers: RwLock::new(holding_registers),
            input_registers: RwLock::new(input_registers),
            custom: HashMap::new(),
            zero_mode: false,
            exception_status: RwLock::new(0),
            listen_only: RwLock::new(false),
            event_log: RwLock::new(EventLog::default()),
            fifo_queues: RwLock::new(HashMap::new()),
            files: RwLock::new(HashMap::new()),
            identity: DeviceIdentity::default(),
        }
    }

    /// Attach a device identity other than the crate default (used by
    /// servers that want to report custom vendor/product strings).
    pub fn with_identity(mut self, identity: DeviceIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// FC 7: current exception status byte.
    pub fn exception_status(&self) -> u8 {
        *self.exception_status.read()
    }

    /// Set the exception status byte reported by FC 7. Device-defined —
    /// this crate never sets it on its own.
    pub fn set_exception_status(&self, status: u8) {
        *self.exception_status.write() = status;
    }

    /// Whether this device is currently in Force Listen Only Mode.
    pub fn listen_only(&self) -> bool {
        *self.listen_only.read()
    }

    /// Enter or leave Force Listen Only Mode (FC 8, sub-function 0x04).
    pub fn set_listen_only(&self, listen_only: bool) {
        *self.listen_only.write() = listen_only;
    }

    /// FC 11: `(event_count, message_count)`, per the standard response
    /// layout (status is always 0x0000 — see [`EventLog::events`]).
    pub fn comm_event_counter(&self) -> (u16, u16) {
        let log = self.event_log.read();
        (log.event_count, log.message_count)
    }

    /// FC 12: the raw event bytes, most recent last.
    pub fn comm_event_log(&self) -> Vec<u8> {
        self.event_log.read().events.iter().copied().collect()
    }

    /// Record one communication event (§4.4's "Modbus event" concept):
    /// bumps both counters and appends `event_byte` to the ring buffer,
    /// evicting the oldest entry once [`EVENT_LOG_MAX_LEN`] is reached.
    pub fn record_event(&self, event_byte: u8) {
        let mut log = self.event_log.write();
        log.event_count = log.event_count.wrapping_add(1);
        log.message_count = log.message_count.wrapping_add(1);
        if log.events.len() == EVENT_LOG_MAX_LEN {
            log.events.pop_front();
        }
        log.events.push_back(event_byte);
    }

    /// FC 24: push a value onto the FIFO queue addressed by `address`,
    /// dropping the oldest entry once [`FIFO_MAX_LEN`] is reached.
    pub fn fifo_push(&self, address: u16, value: u16) {
        let mut queues = self.fifo_queues.write();
        let queue = queues.entry(address).or_default();
        if queue.len() == FIFO_MAX_LEN {
            queue.pop_front();
        }
        queue.push_back(value);
    }

    /// FC 24: snapshot the FIFO queue addressed by `address` (empty if
    /// never populated).
    pub fn fifo_read(&self, address: u16) -> Vec<u16> {
        self.fifo_queues
            .read()
            .get(&address)
            .map(|q| q.iter().copied().collect())
            .unwrap_or_default()
    }

    /// FC 20: read `count` registers from `(file_number, record_number)`,
    /// zero-filled if the record was never written.
    pub fn file_read(&self, file_number: u16, record_number: u16, count: u16) -> Vec<u16> {
        let files = self.files.read();
        match files.get(&(file_number, record_number)) {
            Some(values) => {
                let mut out = values.clone();
                out.resize(count as usize, 0);
                out
            }
            None => vec![0; count as usize],
        }
    }

    /// FC 21: overwrite `(file_number, record_number)` with `values`.
    pub fn file_write(&self, file_number: u16, record_number: u16, values: Vec<u16>) {
        self.files
            .write()
            .insert((file_number, record_number), values);
    }

    pub fn with_zero_mode(mut self, zero_mode: bool) -> Self {
        self.zero_mode = zero_mode;
        self
    }

    /// Register a custom bit block addressable by `function_code`.
    pub fn register_custom_bits(
        &mut self,
        function_code: u8,
        block: Box<dyn DataBlock<bool> + Send + Sync>,
    ) {
        self.custom
            .insert(function_code, Block::Bits(RwLock::new(block)));
    }

    /// Register a custom word block addressable by `function_code`.
    pub fn register_custom_words(
        &mut self,
        function_code: u8,
        block: Box<dyn DataBlock<u16> + Send + Sync>,
    ) {
        self.custom
            .insert(function_code, Block::Words(RwLock::new(block)));
    }

    fn adjust(&self, address: u16) -> u16 {
        if self.zero_mode {
            address
        } else {
            address.wrapping_add(1)
        }
    }

    fn entity_lock(&self, fc: u8) -> Option<&RwLock<Box<dyn DataBlock<bool> + Send + Sync>>> {
        match EntityKind::for_function_code(fc) {
            Some(EntityKind::Coil) => Some(&self.coils),
            Some(EntityKind::DiscreteInput) => Some(&self.discrete_inputs),
            _ => None,
        }
    }

    fn word_lock(&self, fc: u8) -> Option<&RwLock<Box<dyn DataBlock<u16> + Send + Sync>>> {
        match EntityKind::for_function_code(fc) {
            Some(EntityKind::HoldingRegister) => Some(&self.holding_registers),
            Some(EntityKind::InputRegister) => Some(&self.input_registers),
            _ => None,
        }
    }

    /// Validate that `[address, address+count)` (after zero-mode
    /// adjustment) is backed for `function_code`.
    pub fn validate(&self, function_code: u8, address: u16, count: u16) -> bool {
        let address = self.adjust(address);
        if let Some(lock) = self.entity_lock(function_code) {
            return lock.read().validate(address, count);
        }
        if let Some(lock) = self.word_lock(function_code) {
            return lock.read().validate(address, count);
        }
        match self.custom.get(&function_code) {
            Some(Block::Bits(lock)) => lock.read().validate(address, count),
            Some(Block::Words(lock)) => lock.read().validate(address, count),
            None => false,
        }
    }

    /// Read `count` values for `function_code` starting at `address`.
    pub fn get_values(&self, function_code: u8, address: u16, count: u16) -> Result<Values> {
        let address = self.adjust(address);
        if let Some(lock) = self.entity_lock(function_code) {
            return lock.read().get_values(address, count).map(Values::Bits);
        }
        if let Some(lock) = self.word_lock(function_code) {
            return lock.read().get_values(address, count).map(Values::Words);
        }
        match self.custom.get(&function_code) {
            Some(Block::Bits(lock)) => lock.read().get_values(address, count).map(Values::Bits),
            Some(Block::Words(lock)) => lock.read().get_values(address, count).map(Values::Words),
            None => Err(ModbusError::protocol(format!(
                "no entity registered for function code 0x{function_code:02X}"
            ))),
        }
    }

    /// Write bit `values` for `function_code` starting at `address`.
    pub fn set_bits(&self, function_code: u8, address: u16, values: &[bool]) -> Result<()> {
        let address = self.adjust(address);
        if let Some(lock) = self.entity_lock(function_code) {
            return lock.write().set_values(address, values);
        }
        if let Some(Block::Bits(lock)) = self.custom.get(&function_code) {
            return lock.write().set_values(address, values);
        }
        Err(ModbusError::protocol(format!(
            "no bit entity registered for function code 0x{function_code:02X}"
        )))
    }

    /// Write word `values` for `function_code` starting at `address`.
    pub fn set_words(&self, function_code: u8, address: u16, values: &[u16]) -> Result<()> {
        let address = self.adjust(address);
        if let Some(lock) = self.word_lock(function_code) {
            return lock.write().set_values(address, values);
        }
        if let Some(Block::Words(lock)) = self.custom.get(&function_code) {
            return lock.write().set_values(address, values);
        }
        Err(ModbusError::protocol(format!(
            "no word entity registered for function code 0x{function_code:02X}"
        )))
    }

    /// Reset every standard block to zero. Custom blocks are left alone —
    /// callers that own custom blocks are responsible for their lifecycle.
    pub fn reset(&self) {
        self.coils.write().reset();
        self.discrete_inputs.write().reset();
        self.holding_registers.write().reset();
        self.input_registers.write().reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mode_false_shifts_address() {
        let ctx = SlaveContext::default();
        // Default zero_mode=false: wire address 0 maps to offset 1.
        ctx.set_words(0x03, 1, &[42]).unwrap();
        assert_eq!(
            ctx.get_values(0x03, 0, 1).unwrap(),
            Values::Words(vec![42])
        );
    }

    #[test]
    fn zero_mode_true_is_identity() {
        let ctx = SlaveContext::default().with_zero_mode(true);
        ctx.set_words(0x03, 0, &[42]).unwrap();
        assert_eq!(
            ctx.get_values(0x03, 0, 1).unwrap(),
            Values::Words(vec![42])
        );
    }

    #[test]
    fn listen_only_defaults_to_false_and_latches() {
        let ctx = SlaveContext::default();
        assert!(!ctx.listen_only());
        ctx.set_listen_only(true);
        assert!(ctx.listen_only());
    }

    #[test]
    fn coil_and_discrete_input_are_distinct_blocks() {
        let ctx = SlaveContext::default().with_zero_mode(true);
        ctx.set_bits(0x05, 10, &[true]).unwrap();
        assert_eq!(ctx.get_values(0x01, 10, 1).unwrap(), Values::Bits(vec![true]));
        assert_eq!(
            ctx.get_values(0x02, 10, 1).unwrap(),
            Values::Bits(vec![false])
        );
    }
}
