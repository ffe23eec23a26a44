// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Process-wide logger and logging entry points
//!
//! Instrumented code reports accesses through the functions in this module.
//! They forward events to the [`Logger`] installed via [`install`] and drop
//! them if none is installed.
//!
//! Events reported while the logger is busy, e.g. by instrumented code driving
//! the character output a dump is written to, are dropped as well.
//!
//! With the `abi` feature, the unmangled entry points [`conware_log`],
//! [`conware_interrupt_log`] and [`conware_dump`] are exported for calls
//! inserted by the instrumentation.

use core::cell::RefCell;

use critical_section::Mutex;

use super::Logger;
use crate::record::Operation;

/// Handle to the process-wide logger
pub type Handle = &'static mut (dyn Logger + Send);

static LOGGER: Mutex<RefCell<Option<Handle>>> = Mutex::new(RefCell::new(None));

/// Install the process-wide logger
///
/// Returns the previously installed logger, if any. If the current logger is
/// busy, the new logger is not installed but returned as an error.
pub fn install(logger: Handle) -> Result<Option<Handle>, Handle> {
    critical_section::with(|cs| match LOGGER.borrow(cs).try_borrow_mut() {
        Ok(mut current) => Ok(current.replace(logger)),
        Err(_) => Err(logger),
    })
}

/// Remove the process-wide logger
///
/// Returns [`None`] if no logger was installed or if it is busy.
pub fn uninstall() -> Option<Handle> {
    critical_section::with(|cs| LOGGER.borrow(cs).try_borrow_mut().ok()?.take())
}

/// Check whether a process-wide logger is installed
pub fn is_installed() -> bool {
    critical_section::with(|cs| {
        LOGGER
            .borrow(cs)
            .try_borrow()
            .map(|l| l.is_some())
            .unwrap_or(true)
    })
}

/// Log an event with the process-wide logger
pub fn log(address: usize, value: u32, operation: Operation) {
    with_logger(|l| l.log(address, value, operation));
}

/// Log an event issued from a known location with the process-wide logger
pub fn log_from(address: usize, value: u32, operation: Operation, pc: usize) {
    with_logger(|l| l.log_from(address, value, operation, Some(pc)));
}

/// Log an interrupt with the process-wide logger
pub fn interrupt_log(number: u32) {
    with_logger(|l| l.log_interrupt(number));
}

/// Dump the events of the process-wide logger
pub fn dump() {
    with_logger(|l| l.dump());
}

fn with_logger<R>(f: impl FnOnce(&mut (dyn Logger + Send + 'static)) -> R) -> Option<R> {
    critical_section::with(|cs| {
        let mut logger = LOGGER.borrow(cs).try_borrow_mut().ok()?;
        logger.as_deref_mut().map(f)
    })
}

/// Logging entry point for instrumented accesses
///
/// Events with an unknown `operation` tag are dropped. The return value
/// carries no meaning.
#[cfg(feature = "abi")]
#[unsafe(no_mangle)]
pub extern "C" fn conware_log(address: *const core::ffi::c_void, value: u32, operation: u32) -> i32 {
    if let Some(operation) = Operation::from_tag(operation) {
        log(address as usize, value, operation);
    }
    0
}

/// Logging entry point for interrupt handlers
#[cfg(feature = "abi")]
#[unsafe(no_mangle)]
pub extern "C" fn conware_interrupt_log(number: u32) -> i32 {
    interrupt_log(number);
    0
}

/// Dump trigger
#[cfg(feature = "abi")]
#[unsafe(no_mangle)]
pub extern "C" fn conware_dump() {
    dump();
}
