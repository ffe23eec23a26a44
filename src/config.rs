// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Configuration and utilities
//!
//! The [`Runtime`] configuration defines which accesses the
//! [`RingLogger`][crate::RingLogger] records and how far it compresses them.
//! The [`Instrumentation`] configuration defines which accesses the
//! [`Pass`][crate::pass::Pass] instruments. Defaults for both target the
//! [SAM3X][sam3x] family.

pub mod sam3x;
#[cfg(feature = "serde")]
pub mod serde_utils;


#[cfg(feature = "alloc")]
use alloc::collections::{BTreeMap, BTreeSet};
#[cfg(feature = "alloc")]
use alloc::string::{String, ToString};

#[cfg(feature = "alloc")]
use crate::ir::CallConv;

/// Address window of memory mapped peripherals
///
/// The window covers the half-open range `[base, base + size)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Window {
    #[cfg_attr(feature = "serde", serde(with = "serde_utils::Address"))]
    pub base: usize,
    #[cfg_attr(feature = "serde", serde(with = "serde_utils::Address"))]
    pub size: usize,
}

impl Window {
    /// Create a new window of `size` bytes starting at `base`
    pub const fn new(base: usize, size: usize) -> Self {
        Self { base, size }
    }

    /// Check whether the given address lies within this window
    pub const fn contains(&self, address: usize) -> bool {
        address.wrapping_sub(self.base) < self.size
    }

    /// Retrieve the first address past the window
    ///
    /// Returns [`None`] if the window extends to the end of the address space.
    pub const fn limit(&self) -> Option<usize> {
        self.base.checked_add(self.size)
    }
}

/// Runtime configuration
///
/// The buffer capacity is not part of this configuration. It is a parameter
/// of the [`RingLogger`][crate::RingLogger] type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Runtime {
    /// Accesses outside this window are not recorded
    pub window: Window,
    /// Ceiling for the repeat count of a single record
    pub max_repeat: u32,
}

/// See [RUNTIME] for default values of individual fields
impl Default for Runtime {
    fn default() -> Self {
        RUNTIME
    }
}

/// Default [Runtime] configuration
pub const RUNTIME: Runtime = Runtime {
    window: sam3x::MMIO_WINDOW,
    max_repeat: u32::MAX,
};

/// Kind of code inserted after instrumented accesses
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Mode {
    /// Call the logging entry point
    #[default]
    Log,
    /// Print the access directly via a `printf`-like function
    Print,
}

/// Instrumentation configuration
#[cfg(feature = "alloc")]
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Instrumentation {
    /// Names of aggregate types describing peripheral register blocks
    ///
    /// Names are given without any `struct.` prefix the host may add.
    pub catalog: BTreeSet<String>,
    /// Interrupt numbers of interrupt handlers, by handler function name
    pub interrupts: BTreeMap<String, u32>,
    pub mode: Mode,
    /// Calling convention of the entry points called by instrumented code
    pub calling_convention: CallConv,
}

#[cfg(feature = "alloc")]
impl Instrumentation {
    /// Check whether the named aggregate type describes a peripheral
    pub fn is_peripheral(&self, type_name: &str) -> bool {
        let name = type_name.strip_prefix("struct.").unwrap_or(type_name);
        self.catalog.contains(name)
    }

    /// Retrieve the interrupt number for an interrupt handler
    ///
    /// Returns [`None`] if the function is not a known interrupt handler.
    pub fn interrupt_number(&self, function: &str) -> Option<u32> {
        self.interrupts.get(function).copied()
    }
}

/// The default is the configuration for the [SAM3X][sam3x] family
#[cfg(feature = "alloc")]
impl Default for Instrumentation {
    fn default() -> Self {
        Self {
            catalog: sam3x::PERIPHERAL_TYPES
                .iter()
                .map(|n| n.to_string())
                .collect(),
            interrupts: sam3x::INTERRUPT_HANDLERS
                .iter()
                .map(|(n, i)| (n.to_string(), *i))
                .collect(),
            mode: Default::default(),
            calling_convention: CallConv::Aapcs,
        }
    }
}
