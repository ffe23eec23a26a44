// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Insertion of logging calls
//!
//! The [`Emitter`] inserts calls to the logging entry points after peripheral
//! register accesses and at the entry of interrupt handlers. Depending on the
//! [`Mode`], accesses are reported via [`LOG_FN`], with the arguments
//!
//! 1. the accessed address, cast to a generic pointer,
//! 2. the value read or written, converted to an unsigned 32bit integer and
//! 3. the [`Operation`] tag,
//!
//! or printed via [`PRINT_FN`] with a label as format string followed by the
//! address and value. Interrupt handlers call [`INTERRUPT_LOG_FN`] with the
//! interrupt number.
//!
//! Entry points and labels are declared in a [`Module`] on first use and then
//! reused for all further instrumentation through the same [`Emitter`].

pub mod error;


use core::cell::OnceCell;

use crate::config::{Instrumentation, Mode};
use crate::ir::{CallConv, Cast, Constant, Module, Opcode, Position, Scalar, Signature};
use crate::record::Operation;

pub use error::Error;

/// Logging entry point for accesses
pub const LOG_FN: &str = "conware_log";

/// Logging entry point for interrupt handlers
pub const INTERRUPT_LOG_FN: &str = "conware_interrupt_log";

/// Print function used in [`Mode::Print`]
pub const PRINT_FN: &str = "iprintf";

/// Name and format of the label printed for reads
pub const READ_LABEL: (&str, &str) = ("conware.read", "Read: from MMIO Address %p: 0x%08x\n");

/// Name and format of the label printed for writes
pub const WRITE_LABEL: (&str, &str) = ("conware.write", "Wrote: to MMIO Address %p: 0x%08x\n");

const LOG_PARAMS: &[Scalar] = &[Scalar::GenericPointer, Scalar::I32, Scalar::I32];

/// Inserts logging calls into a [`Module`]
#[derive(Debug)]
pub struct Emitter<M: Module> {
    mode: Mode,
    conv: CallConv,
    log: OnceCell<M::Value>,
    interrupt_log: OnceCell<M::Value>,
    print: OnceCell<M::Value>,
    read_label: OnceCell<M::Value>,
    write_label: OnceCell<M::Value>,
}

impl<M: Module> Emitter<M> {
    /// Create a new emitter for the given configuration
    pub fn new(config: &Instrumentation) -> Self {
        Self {
            mode: config.mode,
            conv: config.calling_convention,
            log: Default::default(),
            interrupt_log: Default::default(),
            print: Default::default(),
            read_label: Default::default(),
            write_label: Default::default(),
        }
    }

    /// Retrieve the [`LOG_FN`] declaration
    pub fn log_function(&self, module: &mut M) -> Result<M::Value, Error<M::Error>> {
        let signature = Signature::new(Scalar::I32, LOG_PARAMS, self.conv);
        cached(&self.log, || module.declare_function(LOG_FN, &signature))
    }

    /// Retrieve the [`INTERRUPT_LOG_FN`] declaration
    pub fn interrupt_log_function(&self, module: &mut M) -> Result<M::Value, Error<M::Error>> {
        let signature = Signature::new(Scalar::I32, &[Scalar::I32], self.conv);
        cached(&self.interrupt_log, || {
            module.declare_function(INTERRUPT_LOG_FN, &signature)
        })
    }

    /// Retrieve the [`PRINT_FN`] declaration
    pub fn print_function(&self, module: &mut M) -> Result<M::Value, Error<M::Error>> {
        let signature = Signature::new(Scalar::I32, &[Scalar::GenericPointer], self.conv).variadic();
        cached(&self.print, || module.declare_function(PRINT_FN, &signature))
    }

    /// Retrieve the label printed for the given operation
    pub fn label(&self, module: &mut M, operation: Operation) -> Result<M::Value, Error<M::Error>> {
        let (cell, (name, contents)) = match operation {
            Operation::Read => (&self.read_label, READ_LABEL),
            Operation::Write => (&self.write_label, WRITE_LABEL),
            Operation::Interrupt => {
                return Err(Error::UnexpectedShape {
                    expected: "load or store",
                });
            }
        };
        cached(cell, || module.global_string(name, contents))
    }

    /// Retrieve the name of the function called after accesses
    pub fn access_function_name(&self) -> &'static str {
        match self.mode {
            Mode::Log => LOG_FN,
            Mode::Print => PRINT_FN,
        }
    }

    /// Insert a logging call after a load
    ///
    /// Returns the inserted call.
    pub fn instrument_load(&self, module: &mut M, insn: M::Insn) -> Result<M::Insn, Error<M::Error>> {
        let Opcode::Load { address } = module.opcode(insn) else {
            return Err(Error::UnexpectedShape { expected: "load" });
        };
        let value = module.result(insn);
        self.instrument_access(module, insn, address, value, Operation::Read)
    }

    /// Insert a logging call after a store
    ///
    /// Returns the inserted call.
    pub fn instrument_store(&self, module: &mut M, insn: M::Insn) -> Result<M::Insn, Error<M::Error>> {
        let Opcode::Store { address, value } = module.opcode(insn) else {
            return Err(Error::UnexpectedShape { expected: "store" });
        };
        self.instrument_access(module, insn, address, value, Operation::Write)
    }

    /// Insert a logging call at the entry of an interrupt handler
    ///
    /// The call is inserted right before the terminator of the entry block.
    /// Returns the inserted call.
    pub fn instrument_interrupt_handler(
        &self,
        module: &mut M,
        func: M::Func,
        number: u32,
    ) -> Result<M::Insn, Error<M::Error>> {
        let terminator = module
            .entry_terminator(func)
            .ok_or(Error::NoEntryTerminator)?;
        let callee = self.interrupt_log_function(module)?;
        let number = module.const_u32(number);
        module
            .insert_call(Position::Before(terminator), callee, &[number])
            .map_err(Error::Host)
    }

    /// Check whether an access is already followed by a logging call
    ///
    /// Casts between the access and the call are skipped. The call only
    /// counts if it passes a cast of the access's address, preceded by a
    /// label in [`Mode::Print`]. Calls the program itself makes with the
    /// accessed value, e.g. to print it, are not mistaken for logging calls.
    pub fn is_instrumented(&self, module: &M, insn: M::Insn) -> bool {
        let (address, operation) = match module.opcode(insn) {
            Opcode::Load { address } => (address, Operation::Read),
            Opcode::Store { address, .. } => (address, Operation::Write),
            _ => return false,
        };
        let name = self.access_function_name();
        let mut address_cast = None;
        let mut next = module.next(insn);
        while let Some(n) = next {
            match module.opcode(n) {
                Opcode::Cast { operand } => {
                    if address_cast.is_none() && operand == address {
                        address_cast = Some(module.result(n));
                    }
                    next = module.next(n);
                }
                Opcode::Call { args } if module.callee_name(n) == Some(name) => {
                    let Some(address) = address_cast else {
                        return false;
                    };
                    return match self.mode {
                        Mode::Log => args.first() == Some(&address),
                        Mode::Print => {
                            args.get(1) == Some(&address)
                                && args.first().is_some_and(|l| self.is_label(module, l, operation))
                        }
                    };
                }
                _ => return false,
            }
        }
        false
    }

    /// Check whether a function already calls [`INTERRUPT_LOG_FN`]
    pub fn has_interrupt_log(&self, module: &M, func: M::Func) -> bool {
        module
            .instructions(func)
            .into_iter()
            .any(|i| module.callee_name(i) == Some(INTERRUPT_LOG_FN))
    }

    /// Check whether a value is the label printed for `operation`
    fn is_label(&self, module: &M, value: &M::Value, operation: Operation) -> bool {
        let cell = match operation {
            Operation::Read => &self.read_label,
            Operation::Write => &self.write_label,
            Operation::Interrupt => return false,
        };
        match cell.get() {
            Some(label) => label == value,
            None => module.constant(value) == Some(Constant::GlobalVariable),
        }
    }

    fn instrument_access(
        &self,
        module: &mut M,
        insn: M::Insn,
        address: M::Value,
        value: M::Value,
        operation: Operation,
    ) -> Result<M::Insn, Error<M::Error>> {
        // Resolve everything that may fail before modifying any code
        let value_ty = module.type_of(&value);
        let is_pointer = module.is_pointer(value_ty);
        let width = module.int_width(value_ty);
        if !is_pointer && width.is_none() {
            return Err(Error::UnsupportedValue);
        }
        let (callee, first) = match self.mode {
            Mode::Log => (self.log_function(module)?, None),
            Mode::Print => (
                self.print_function(module)?,
                Some(self.label(module, operation)?),
            ),
        };

        let mut position = insn;
        let mut insert_cast = |module: &mut M, value, cast| {
            let insn = module
                .insert_cast(Position::After(position), value, cast)
                .map_err(Error::Host)?;
            position = insn;
            Ok::<_, Error<M::Error>>(module.result(insn))
        };

        let address = insert_cast(module, address, Cast::GenericPointer)?;
        let value = if is_pointer {
            insert_cast(module, value, Cast::PointerToInt { bits: 32 })?
        } else if width != Some(32) {
            let cast = Cast::Resize {
                bits: 32,
                signed: false,
            };
            insert_cast(module, value, cast)?
        } else {
            value
        };

        let args = match first {
            Some(label) => [label, address, value],
            None => {
                let tag = module.const_u32(operation.tag());
                [address, value, tag]
            }
        };
        module
            .insert_call(Position::After(position), callee, &args)
            .map_err(Error::Host)
    }
}

/// Retrieve a cached value, creating it on first use
fn cached<V: Clone, E>(
    cell: &OnceCell<V>,
    create: impl FnOnce() -> Result<V, E>,
) -> Result<V, Error<E>> {
    if let Some(value) = cell.get() {
        return Ok(value.clone());
    }
    let value = create().map_err(Error::Host)?;
    Ok(cell.get_or_init(|| value).clone())
}
