// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Classification of peripheral register accesses
//!
//! Accesses are identified in one of two ways:
//!
//! * via the computation of the address of a member of an aggregate that
//!   describes a peripheral's register block, listed in the
//!   [catalog][crate::config::Instrumentation::catalog]. All loads and stores
//!   reachable from such a computation through the use graph are considered
//!   accesses to that peripheral. See [`Classifier::classify`].
//! * via loads and stores of absolute addresses that are compile-time
//!   constants other than global variables. See [`is_constant_address`].


use alloc::collections::BTreeSet;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::config::Instrumentation;
use crate::ir::{Constant, Module, Opcode};

/// Peripheral accesses reachable from an address computation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target<I> {
    /// Name of the peripheral's aggregate type
    pub peripheral: String,
    /// Loads and stores reachable from the address computation
    pub accesses: BTreeSet<I>,
}

/// Result of a walk of the use graph
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reach<I> {
    /// Loads and stores encountered
    pub accesses: BTreeSet<I>,
    /// Number of distinct instructions visited, including the root
    pub visited: usize,
}

/// Classifier for peripheral register accesses
#[derive(Copy, Clone, Debug)]
pub struct Classifier<'c> {
    config: &'c Instrumentation,
}

impl<'c> Classifier<'c> {
    /// Create a new classifier using the given catalog
    pub fn new(config: &'c Instrumentation) -> Self {
        Self { config }
    }

    /// Retrieve the name of the peripheral an address computation refers to
    ///
    /// Returns [`None`] if `insn` is not a member address computation or if
    /// the aggregate is not a known peripheral. Any number of pointer levels
    /// are stripped from the base's type before looking up the aggregate.
    pub fn peripheral<'m, M: Module>(&self, module: &'m M, insn: M::Insn) -> Option<&'m str> {
        let Opcode::MemberAddress { base } = module.opcode(insn) else {
            return None;
        };
        let mut ty = module.type_of(&base);
        while let Some(pointee) = module.pointee(ty) {
            ty = pointee;
        }
        module
            .struct_name(ty)
            .filter(|n| self.config.is_peripheral(n))
    }

    /// Classify an address computation
    ///
    /// If `root` computes the address of a member of a known peripheral,
    /// returns that peripheral along with all loads and stores reachable from
    /// `root`.
    pub fn classify<M: Module>(&self, module: &M, root: M::Insn) -> Option<Target<M::Insn>> {
        let peripheral = self.peripheral(module, root)?.to_string();
        let reach = reachable_accesses(module, root);
        log::trace!(
            "{root:?} refers to {peripheral}: {} accesses, {} instructions visited",
            reach.accesses.len(),
            reach.visited,
        );
        Some(Target {
            peripheral,
            accesses: reach.accesses,
        })
    }
}

/// Collect all loads and stores reachable from `root` in the use graph
///
/// Every instruction is visited at most once, even if the use graph contains
/// cycles.
pub fn reachable_accesses<M: Module>(module: &M, root: M::Insn) -> Reach<M::Insn> {
    let mut visited = BTreeSet::from([root]);
    let mut accesses = BTreeSet::new();
    let mut stack = Vec::from([root]);
    while let Some(insn) = stack.pop() {
        for user in module.users(insn) {
            if !visited.insert(user) {
                continue;
            }
            if module.opcode(user).is_memory_access() {
                accesses.insert(user);
            }
            stack.push(user);
        }
    }
    Reach {
        accesses,
        visited: visited.len(),
    }
}

/// Check whether `insn` accesses a constant absolute address
///
/// Returns `true` if `insn` is a load or store whose address is, after
/// stripping pointer casts, a compile-time constant but not a global variable.
pub fn is_constant_address<M: Module>(module: &M, insn: M::Insn) -> bool {
    let res = module
        .opcode(insn)
        .address()
        .map(|a| module.strip_pointer_casts(a))
        .and_then(|a| module.constant(&a))
        .is_some_and(|c| c != Constant::GlobalVariable);
    if res {
        log::trace!("{insn:?} accesses a constant address");
    }
    res
}
