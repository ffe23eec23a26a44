// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Instrumentation errors

use core::fmt;

/// Errors that may occur while instrumenting an instruction
///
/// `E` is the error type of the host [`Module`][crate::ir::Module].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error<E> {
    /// The instruction is not of the expected kind
    UnexpectedShape {
        expected: &'static str,
    },
    /// The accessed value is neither an integer nor a pointer
    UnsupportedValue,
    /// The function's entry block has no terminator
    NoEntryTerminator,
    /// The host failed to perform a mutation
    Host(E),
}

impl<E: core::error::Error + 'static> core::error::Error for Error<E> {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Host(e) => Some(e),
            _ => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedShape { expected } => write!(f, "Expected {expected}"),
            Self::UnsupportedValue => write!(f, "Accessed value is neither integer nor pointer"),
            Self::NoEntryTerminator => write!(f, "Entry block has no terminator"),
            Self::Host(_) => write!(f, "Could not modify module"),
        }
    }
}
