// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

//! # MMIO access instrumentation and logging for peripheral reverse engineering
//!
//! This crate records every access a firmware performs on memory mapped
//! peripheral registers. The resulting trace is meant for building peripheral
//! models used in emulation. It consists of two co-designed halves:
//!
//! * a compile-time instrumentation that locates peripheral register accesses
//!   in a program handed over by a host compiler and inserts calls to a
//!   logging entry point after each of them ([`classify`], [`emit`] and
//!   [`pass`]) and
//! * a runtime [`ring`] logger that stores the logged events in a fixed-size
//!   buffer, compresses repeated reads and dumps the events as text on demand
//!   or when the buffer runs full.
//!
//! The host compiler is only accessed through the [`ir::Module`] trait. An
//! arena based implementation, [`ir::basic::Module`], is provided for hosts
//! that translate their IR and for testing.
//!
//! Dumps consist of [`Record`] lines enclosed by [`record::DUMP_START`] and
//! [`record::DUMP_END`] markers. The [`capture`] module recovers records from
//! a stream of text lines, e.g. lines received via a serial port.
//!
//! # no_std
//! This crate only uses the Core Library. The runtime half does not allocate.
//! The compile-time half requires the `alloc` feature, which is enabled by
//! default.
//!
//! # Example
//!
//! The following example instruments a load from a register of a `Pio`
//! peripheral and then feeds the event the instrumented firmware would produce
//! to a [`RingLogger`].
//!
//! ```
//! use conware::ir::basic::{Module, Value};
//! use conware::{config, pass, Operation, RingLogger};
//!
//! let mut module = Module::new();
//! let u32_ty = module.int(32);
//! let pio = module.named_struct("struct.Pio");
//! let pio_ptr = module.pointer(pio);
//!
//! let func = module.add_function("digitalRead", &[pio_ptr]);
//! let block = module.add_block(func);
//! let pdsr = module.member_address(block, Value::Arg(func, 0), 15, u32_ty);
//! module.load(block, Value::Insn(pdsr), u32_ty);
//! module.ret(block);
//!
//! let config = config::Instrumentation::default();
//! let summary = pass::Pass::new(&config).run_on_function(&mut module, func);
//! assert_eq!(summary.loads, 1);
//!
//! let mut logger: RingLogger<String, 16> = RingLogger::new(String::new(), &Default::default());
//! logger.log(0x400e_0e3c, 0x1, Operation::Read);
//! logger.log(0x400e_0e3c, 0x1, Operation::Read);
//! assert_eq!(logger.events()[0].repeat, 1);
//! ```
#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod capture;
#[cfg(feature = "alloc")]
pub mod classify;
pub mod config;
#[cfg(feature = "alloc")]
pub mod emit;
#[cfg(feature = "alloc")]
pub mod ir;
#[cfg(feature = "alloc")]
pub mod pass;
pub mod record;
pub mod ring;

pub use record::{Operation, Record};
pub use ring::{Logger, RingLogger};
