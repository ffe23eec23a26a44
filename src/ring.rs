// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Runtime access logging
//!
//! This module provides the [`RingLogger`], which records the accesses
//! reported by instrumented code in a fixed-size buffer and dumps them as
//! [`Record`] lines, as well as the [`Logger`] trait through which the
//! process-wide logger in [`global`] is accessed.
//!
//! # Compression
//!
//! Peripheral drivers tend to poll status registers. In order to not fill the
//! buffer with identical reads, a read of a value that was already read from
//! the same address since the last write is accounted to the earlier record
//! by incrementing its repeat count. The search for such a record stops at
//! the most recent write and at the most recent read of a different value from
//! the same address. Consecutive identical interrupts are compressed the same
//! way.
//!
//! # Overflow
//!
//! Once the buffer is full, the next event causes the buffer to be dumped and
//! emptied before that event is recorded.

pub mod global;


use core::fmt;

use crate::config;
use crate::record::{DUMP_END, DUMP_START, Operation, Record};

/// Default number of events a [`RingLogger`] holds
pub const CAPACITY: usize = 1000;

/// Line terminator used in dumps
const EOL: &str = "\r\n";

/// Access logger
///
/// Logs events reported by instrumented code. The process-wide logger is
/// installed via [`global::install`].
pub trait Logger {
    /// Log an event
    ///
    /// For [`Operation::Read`] and [`Operation::Write`], `address` is the
    /// register accessed and `value` the value read or written.
    fn log(&mut self, address: usize, value: u32, operation: Operation) {
        self.log_from(address, value, operation, None)
    }

    /// Log an event issued from a known location
    fn log_from(&mut self, address: usize, value: u32, operation: Operation, pc: Option<usize>);

    /// Log the entry of the interrupt handler for the given interrupt
    fn log_interrupt(&mut self, number: u32) {
        self.log(number as usize, number, Operation::Interrupt)
    }

    /// Dump and discard all events logged so far
    fn dump(&mut self);
}

/// A single logged event
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Event {
    /// Register address or, for interrupts, the interrupt number
    pub address: usize,
    pub value: u32,
    pub operation: Operation,
    /// Number of identical events following the first one
    pub repeat: u32,
    /// Location the event was issued from, if known
    pub pc: Option<usize>,
}

impl Event {
    const EMPTY: Self = Self {
        address: 0,
        value: 0,
        operation: Operation::Read,
        repeat: 0,
        pc: None,
    };

    /// Create the [`Record`] for this event at the given position in a dump
    pub fn record(&self, seqn: u32) -> Record {
        Record::new(self.operation, seqn, self.address as u64, self.value)
            .with_pc(self.pc.map(|pc| pc as u64))
            .with_repeat(self.repeat)
    }
}

/// Fixed-capacity event log
///
/// A [`RingLogger`] records up to `N` [`Event`]s and writes dumps to a sink
/// `W`, usually some character output of the platform. Recording and dumping
/// are performed inside a critical section.
///
/// # Example
///
/// ```
/// use conware::{Operation, RingLogger};
///
/// let mut logger: RingLogger<String, 4> = RingLogger::new(String::new(), &Default::default());
/// logger.log(0x400e_0814, 0x2, Operation::Read);
/// logger.log(0x400e_081c, 0x55, Operation::Write);
/// logger.dump();
/// assert!(logger.is_empty());
/// assert_eq!(
///     logger.sink(),
///     "CONWAREDUMP_START\r\n\
///      0\t0\t400e0814\t00000002\t0\t4\t0\t0\r\n\
///      1\t1\t400e081c\t00000055\t0\t4\t0\t0\r\n\
///      CONWAREDUMP_END\r\n",
/// );
/// ```
#[derive(Clone, Debug)]
pub struct RingLogger<W: fmt::Write, const N: usize = CAPACITY> {
    events: [Event; N],
    current: usize,
    last_write: usize,
    sink: W,
    config: config::Runtime,
}

impl<W: fmt::Write, const N: usize> RingLogger<W, N> {
    /// Create a new, empty logger dumping to the given sink
    pub fn new(sink: W, config: &config::Runtime) -> Self {
        const { assert!(N > 0, "A logger needs room for at least one event") };
        Self {
            events: [Event::EMPTY; N],
            current: 0,
            last_write: 0,
            sink,
            config: *config,
        }
    }

    /// Log an event
    ///
    /// See [`Logger::log`].
    pub fn log(&mut self, address: usize, value: u32, operation: Operation) {
        self.log_from(address, value, operation, None)
    }

    /// Log an event issued from a known location
    ///
    /// Reads and writes outside the configured window are ignored.
    pub fn log_from(&mut self, address: usize, value: u32, operation: Operation, pc: Option<usize>) {
        if operation != Operation::Interrupt && !self.config.window.contains(address) {
            return;
        }

        critical_section::with(|_| {
            if self.current >= N {
                self.dump();
            }

            if let Some(n) = self.earlier_record(address, value, operation) {
                let event = &mut self.events[n];
                event.repeat = event.repeat.saturating_add(1).min(self.config.max_repeat);
                return;
            }

            self.events[self.current] = Event {
                address,
                value,
                operation,
                repeat: 0,
                pc,
            };
            self.current += 1;
            if operation == Operation::Write {
                self.last_write = self.current - 1;
            }
        })
    }

    /// Dump and discard all events
    ///
    /// Writes a [`DUMP_START`] line, one [`Record`] line per event and a
    /// [`DUMP_END`] line to the sink. Errors reported by the sink cut the dump
    /// short. The events are discarded regardless.
    pub fn dump(&mut self) {
        critical_section::with(|_| {
            let _ = self.write_dump();
            self.current = 0;
            self.last_write = 0;
        })
    }

    /// Retrieve the recorded events, oldest first
    pub fn events(&self) -> &[Event] {
        &self.events[..self.current]
    }

    /// Retrieve the number of recorded events
    pub fn len(&self) -> usize {
        self.current
    }

    /// Check whether no events are recorded
    pub fn is_empty(&self) -> bool {
        self.current == 0
    }

    /// Check whether the next event will cause a dump
    pub fn is_full(&self) -> bool {
        self.current >= N
    }

    /// Retrieve the index of the most recent write
    ///
    /// The index is `0` if no write was recorded since the last dump.
    pub fn last_write_index(&self) -> usize {
        self.last_write
    }

    /// Retrieve the configuration
    pub fn config(&self) -> &config::Runtime {
        &self.config
    }

    /// Retrieve the sink
    pub fn sink(&self) -> &W {
        &self.sink
    }

    /// Retrieve the sink mutably
    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Retrieve the sink, discarding the logger
    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Find the record an event may be accounted to
    fn earlier_record(&self, address: usize, value: u32, operation: Operation) -> Option<usize> {
        match operation {
            Operation::Read => (self.last_write..self.current)
                .rev()
                .map(|n| (n, &self.events[n]))
                .filter(|(_, e)| e.address == address)
                .take_while(|(_, e)| e.value == value)
                .find(|(_, e)| e.operation == operation)
                .map(|(n, _)| n),
            Operation::Interrupt => self.current.checked_sub(1).filter(|n| {
                let event = &self.events[*n];
                event.address == address && event.operation == operation
            }),
            Operation::Write => None,
        }
    }

    fn write_dump(&mut self) -> fmt::Result {
        write!(self.sink, "{DUMP_START}{EOL}")?;
        for (seqn, event) in self.events[..self.current].iter().enumerate() {
            write!(self.sink, "{}{EOL}", event.record(seqn as u32))?;
        }
        write!(self.sink, "{DUMP_END}{EOL}")
    }
}

impl<W: fmt::Write, const N: usize> Logger for RingLogger<W, N> {
    fn log_from(&mut self, address: usize, value: u32, operation: Operation, pc: Option<usize>) {
        RingLogger::log_from(self, address, value, operation, pc)
    }

    fn dump(&mut self) {
        RingLogger::dump(self)
    }
}
