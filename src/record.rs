// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Access records and their textual representation
//!
//! A dump consists of a [`DUMP_START`] line, one line per [`Record`] and a
//! [`DUMP_END`] line. Each record line holds the following tab separated
//! fields:
//!
//! | field       | format                                   |
//! |-------------|------------------------------------------|
//! | operation   | decimal [`Operation`] tag                |
//! | sequence    | decimal                                  |
//! | address     | hex, 8 digits                            |
//! | value       | hex, 8 digits                            |
//! | PC          | hex, 8 digits, or [`PC_PLACEHOLDER`]     |
//! | size        | decimal, always [`ACCESS_SIZE`]          |
//! | timestamp   | decimal, always `0`                      |
//! | repeat      | decimal                                  |


use core::fmt;
use core::str::FromStr;

/// Marker line preceding the records of a dump
pub const DUMP_START: &str = "CONWAREDUMP_START";

/// Marker line following the records of a dump
pub const DUMP_END: &str = "CONWAREDUMP_END";

/// Access size reported for every record
pub const ACCESS_SIZE: u8 = 4;

/// PC field of records without a known source location
pub const PC_PLACEHOLDER: &str = "0";

/// Number of tab separated fields in a record line
const FIELDS: usize = 8;

/// Kind of a logged event
///
/// The discriminant is the tag passed to the logging entry point.
#[repr(u32)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operation {
    /// A peripheral register was read
    #[default]
    Read = 0,
    /// A peripheral register was written
    Write = 1,
    /// An interrupt handler was entered
    Interrupt = 2,
}

impl Operation {
    /// Retrieve the tag passed to the logging entry point
    pub const fn tag(self) -> u32 {
        self as u32
    }

    /// Create an operation from a logging entry point tag
    ///
    /// Returns [`None`] if the tag is unknown.
    pub const fn from_tag(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::Read),
            1 => Some(Self::Write),
            2 => Some(Self::Interrupt),
            _ => None,
        }
    }

    /// Retrieve the name used for this operation in trace files
    pub const fn name(self) -> &'static str {
        match self {
            Self::Read => "READ",
            Self::Write => "WRITE",
            Self::Interrupt => "INTERRUPT",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single line of a dump
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub operation: Operation,
    /// Position of the record within its dump
    pub seqn: u32,
    pub address: u64,
    pub value: u32,
    /// Location the access was issued from, if known
    pub pc: Option<u64>,
    pub size: u8,
    pub timestamp: u64,
    /// Number of identical accesses following the first one
    pub repeat: u32,
}

impl Record {
    /// Create a new record with a fixed size and zero timestamp
    pub fn new(operation: Operation, seqn: u32, address: u64, value: u32) -> Self {
        Self {
            operation,
            seqn,
            address,
            value,
            pc: None,
            size: ACCESS_SIZE,
            timestamp: 0,
            repeat: 0,
        }
    }

    /// Set the PC
    pub fn with_pc(self, pc: Option<u64>) -> Self {
        Self { pc, ..self }
    }

    /// Set the repeat count
    pub fn with_repeat(self, repeat: u32) -> Self {
        Self { repeat, ..self }
    }

    /// Undo the repeat compression
    ///
    /// Yields this record `repeat + 1` times, each with a repeat count of zero.
    pub fn expand(self) -> impl Iterator<Item = Record> {
        let count = usize::try_from(self.repeat)
            .unwrap_or(usize::MAX)
            .saturating_add(1);
        core::iter::repeat_n(self.with_repeat(0), count)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{:08x}\t{:08x}\t",
            self.operation.tag(),
            self.seqn,
            self.address,
            self.value
        )?;
        match self.pc {
            Some(pc) => write!(f, "{pc:08x}")?,
            None => f.write_str(PC_PLACEHOLDER)?,
        }
        write!(f, "\t{}\t{}\t{}", self.size, self.timestamp, self.repeat)
    }
}

impl FromStr for Record {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = [""; FIELDS];
        let mut count = 0;
        for field in line.split('\t') {
            if let Some(slot) = fields.get_mut(count) {
                *slot = field.trim();
            }
            count += 1;
        }
        if count != FIELDS {
            return Err(ParseError::FieldCount(count));
        }

        let [op, seqn, address, value, pc, size, timestamp, repeat] = fields;
        let tag = decimal(op, Field::Operation)?;
        let pc = if pc == PC_PLACEHOLDER {
            None
        } else {
            Some(hex(pc, Field::Pc)?)
        };
        Ok(Self {
            operation: Operation::from_tag(tag).ok_or(ParseError::UnknownOperation(tag))?,
            seqn: decimal(seqn, Field::Seqn)?,
            address: hex(address, Field::Address)?,
            value: hex(value, Field::Value)?
                .try_into()
                .map_err(|_| ParseError::InvalidField(Field::Value))?,
            pc,
            size: decimal(size, Field::Size)?,
            timestamp: decimal(timestamp, Field::Timestamp)?,
            repeat: decimal(repeat, Field::Repeat)?,
        })
    }
}

/// Parse a decimal field
fn decimal<T: FromStr>(text: &str, field: Field) -> Result<T, ParseError> {
    text.parse().map_err(|_| ParseError::InvalidField(field))
}

/// Parse a hex field, with or without `0x` prefix
fn hex(text: &str, field: Field) -> Result<u64, ParseError> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).map_err(|_| ParseError::InvalidField(field))
}

/// Fields of a [`Record`] line
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Field {
    Operation,
    Seqn,
    Address,
    Value,
    Pc,
    Size,
    Timestamp,
    Repeat,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Operation => "operation",
            Self::Seqn => "sequence number",
            Self::Address => "address",
            Self::Value => "value",
            Self::Pc => "PC",
            Self::Size => "size",
            Self::Timestamp => "timestamp",
            Self::Repeat => "repeat count",
        };
        f.write_str(name)
    }
}

/// Errors encountered while parsing a [`Record`] line
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// The line does not consist of the expected number of fields
    FieldCount(usize),
    /// A field could not be parsed
    InvalidField(Field),
    /// The operation tag is not known
    UnknownOperation(u32),
}

impl core::error::Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldCount(n) => write!(f, "Expected {FIELDS} fields, found {n}"),
            Self::InvalidField(field) => write!(f, "Malformed {field}"),
            Self::UnknownOperation(tag) => write!(f, "Unknown operation {tag}"),
        }
    }
}
