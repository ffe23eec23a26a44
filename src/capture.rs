// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Recovery of records from a stream of text lines
//!
//! A firmware's output, e.g. as received via a serial port, usually mixes
//! regular output with dumps. A [`Capture`] is fed those lines one by one and
//! classifies each of them as dump marker, [`Record`] or other output.
//! Markers are recognized anywhere within a line, since dumps may start in the
//! middle of unterminated regular output.


use core::fmt;

use crate::record::{self, DUMP_END, DUMP_START, Record};

/// Line oriented dump capture
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Capture {
    dumping: bool,
    records: usize,
    dumps: usize,
    line: usize,
}

impl Capture {
    /// Create a new capture waiting for the first dump
    pub fn new() -> Self {
        Default::default()
    }

    /// Feed a single line
    ///
    /// Trailing line terminators are stripped. Lines within a dump which can
    /// not be parsed result in an error. The capture stays within the dump in
    /// this case and may be fed further lines.
    pub fn feed<'a>(&mut self, line: &'a str) -> Result<Line<'a>, Error> {
        let line = line.trim_end_matches(['\r', '\n']);
        self.line += 1;

        if line.contains(DUMP_START) {
            if self.dumping {
                log::warn!("Dump restarted in line {} before it ended", self.line);
            }
            self.dumping = true;
            self.records = 0;
            return Ok(Line::Start);
        }
        if !self.dumping {
            return Ok(Line::Other(line));
        }
        if line.contains(DUMP_END) {
            self.dumping = false;
            self.dumps += 1;
            log::debug!("Dump done ({} records)", self.records);
            return Ok(Line::End {
                records: self.records,
            });
        }

        let record = line.parse().map_err(|source| Error {
            line: self.line,
            source,
        })?;
        self.records += 1;
        Ok(Line::Record(record))
    }

    /// Check whether we are currently within a dump
    pub fn is_dumping(&self) -> bool {
        self.dumping
    }

    /// Retrieve the number of records seen in the current or last dump
    pub fn records(&self) -> usize {
        self.records
    }

    /// Retrieve the number of completed dumps
    pub fn dumps(&self) -> usize {
        self.dumps
    }

    /// Retrieve the number of lines fed so far
    pub fn lines(&self) -> usize {
        self.line
    }
}

/// Classification of a single line
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Line<'a> {
    /// Start of a dump
    Start,
    /// A record within a dump
    Record(Record),
    /// End of a dump and the number of records it contained
    End { records: usize },
    /// Any line outside of a dump
    Other(&'a str),
}

/// A line within a dump could not be parsed
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Error {
    /// Number of the offending line, starting at `1`
    pub line: usize,
    pub source: record::ParseError,
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Malformed record in line {}", self.line)
    }
}
