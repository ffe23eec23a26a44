// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Instrumentation pass
//!
//! The [`Pass`] visits the instructions of a function in layout order,
//! [classifies][crate::classify] them and instruments every peripheral
//! register access found via an [`Emitter`]. Interrupt handlers listed in the
//! [configuration][Instrumentation::interrupts] additionally receive a call
//! to the interrupt logging entry point.
//!
//! Instrumentation is best effort: failures are reported via [`log`] and
//! counted in the [`Summary`], but do not stop the pass. Running the pass
//! twice on the same function does not instrument anything the second time.

#[cfg(test)]
mod tests;

use alloc::collections::BTreeSet;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use crate::classify::{self, Classifier};
use crate::config::Instrumentation;
use crate::emit::Emitter;
use crate::ir::{Module, Opcode};

/// Instrumentation pass
#[derive(Copy, Clone, Debug)]
pub struct Pass<'c> {
    config: &'c Instrumentation,
}

impl<'c> Pass<'c> {
    /// Create a new pass with the given configuration
    pub fn new(config: &'c Instrumentation) -> Self {
        Self { config }
    }

    /// Instrument a single function
    ///
    /// Entry points and labels are looked up anew for every call. Use
    /// [`run_with_emitter`][Self::run_with_emitter] for instrumenting several
    /// functions of the same module one by one.
    pub fn run_on_function<M: Module>(&self, module: &mut M, func: M::Func) -> Summary {
        self.run_with_emitter(module, &Emitter::new(self.config), func)
    }

    /// Instrument a single function using the given [`Emitter`]
    ///
    /// The emitter caches entry points and labels declared in `module`. It
    /// must not be used with any other module.
    pub fn run_with_emitter<M: Module>(
        &self,
        module: &mut M,
        emitter: &Emitter<M>,
        func: M::Func,
    ) -> Summary {
        self.instrument_function(module, emitter, func)
    }

    /// Instrument all functions defined in a module
    pub fn run_on_module<M: Module>(&self, module: &mut M) -> ModuleSummary {
        let emitter = Emitter::new(self.config);
        let defined: Vec<_> = module
            .functions()
            .into_iter()
            .filter(|f| !module.is_declaration(*f))
            .collect();
        let functions = defined
            .into_iter()
            .map(|f| self.run_with_emitter(module, &emitter, f))
            .collect();
        ModuleSummary { functions }
    }

    fn instrument_function<M: Module>(
        &self,
        module: &mut M,
        emitter: &Emitter<M>,
        func: M::Func,
    ) -> Summary {
        let mut summary = Summary::new(module.function_name(func));
        let classifier = Classifier::new(self.config);
        let mut processed = BTreeSet::new();

        for insn in module.instructions(func) {
            if processed.contains(&insn) {
                continue;
            }
            if let Some(target) = classifier.classify(module, insn) {
                for access in target.accesses {
                    if processed.insert(access) {
                        summary.instrument(module, emitter, access);
                    }
                }
            } else if classify::is_constant_address(module, insn) && processed.insert(insn) {
                summary.instrument(module, emitter, insn);
            }
        }

        if let Some(number) = self.config.interrupt_number(&summary.function)
            && !emitter.has_interrupt_log(module, func)
        {
            match emitter.instrument_interrupt_handler(module, func, number) {
                Ok(_) => summary.interrupt = Some(number),
                Err(e) => {
                    log::warn!(
                        "{}: could not instrument interrupt handler: {e}",
                        summary.function
                    );
                    summary.failures += 1;
                }
            }
        }

        log::debug!("{summary}");
        summary
    }
}

/// Outcome of instrumenting a single function
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    /// Name of the function
    pub function: String,
    /// Number of loads instrumented
    pub loads: usize,
    /// Number of stores instrumented
    pub stores: usize,
    /// Interrupt number, if the function was instrumented as interrupt handler
    pub interrupt: Option<u32>,
    /// Number of failed instrumentation attempts
    pub failures: usize,
}

impl Summary {
    fn new(function: &str) -> Self {
        Self {
            function: function.to_string(),
            ..Default::default()
        }
    }

    /// Check whether the function was modified
    pub fn modified(&self) -> bool {
        self.loads + self.stores > 0 || self.interrupt.is_some()
    }

    fn instrument<M: Module>(&mut self, module: &mut M, emitter: &Emitter<M>, insn: M::Insn) {
        if emitter.is_instrumented(module, insn) {
            return;
        }
        let res = match module.opcode(insn) {
            Opcode::Load { .. } => emitter
                .instrument_load(module, insn)
                .map(|_| self.loads += 1),
            Opcode::Store { .. } => emitter
                .instrument_store(module, insn)
                .map(|_| self.stores += 1),
            _ => return,
        };
        if let Err(e) = res {
            log::warn!("{}: could not instrument {insn:?}: {e}", self.function);
            self.failures += 1;
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} loads, {} stores instrumented",
            self.function, self.loads, self.stores
        )?;
        if let Some(n) = self.interrupt {
            write!(f, ", handler for interrupt {n}")?;
        }
        if self.failures > 0 {
            write!(f, ", {} failures", self.failures)?;
        }
        Ok(())
    }
}

/// Outcome of instrumenting a module
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModuleSummary {
    /// Summaries of all defined functions
    pub functions: Vec<Summary>,
}

impl ModuleSummary {
    /// Retrieve the total number of loads instrumented
    pub fn loads(&self) -> usize {
        self.functions.iter().map(|s| s.loads).sum()
    }

    /// Retrieve the total number of stores instrumented
    pub fn stores(&self) -> usize {
        self.functions.iter().map(|s| s.stores).sum()
    }

    /// Retrieve the total number of failed instrumentation attempts
    pub fn failures(&self) -> usize {
        self.functions.iter().map(|s| s.failures).sum()
    }

    /// Check whether any function was modified
    pub fn modified(&self) -> bool {
        self.functions.iter().any(Summary::modified)
    }

    /// Retrieve the summary of the named function
    pub fn function(&self, name: &str) -> Option<&Summary> {
        self.functions.iter().find(|s| s.function == name)
    }
}
