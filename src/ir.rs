// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Interface to the host compiler's intermediate representation
//!
//! The instrumentation does not operate on any particular IR. Instead, it
//! accesses the program to instrument through the [`Module`] trait, which
//! covers:
//!
//! * iteration over the functions of a module and the instructions of a
//!   function in layout order,
//! * classification of instructions via [`Opcode`],
//! * introspection of types, e.g. pointee types and aggregate names,
//! * the use graph of instructions and
//! * the few mutations the instrumentation performs: declaring external
//!   functions, creating string constants and inserting casts and calls.
//!
//! Hosts implement [`Module`] for their own IR. The [basic] module provides an
//! arena based implementation, e.g. for hosts that translate their IR into an
//! intermediate form or for testing.
//!
//! Instructions and other entities are identified by cheap handles. Handles
//! of instructions double as keys in sets, which is why they are required to
//! be [`Ord`].

pub mod basic;

use alloc::vec::Vec;
use core::fmt;

/// A module of the host compiler
pub trait Module {
    /// Handle identifying a function
    type Func: Copy + Eq + fmt::Debug;
    /// Handle identifying an instruction
    type Insn: Copy + Ord + fmt::Debug;
    /// Any value that may be used as an operand
    type Value: Clone + PartialEq + fmt::Debug;
    /// Handle identifying a type
    type Type: Copy + Eq + fmt::Debug;
    /// Error type returned by mutating operations
    type Error: core::error::Error;

    /// Retrieve all functions, including declarations
    fn functions(&self) -> Vec<Self::Func>;

    /// Retrieve the name of a function
    fn function_name(&self, func: Self::Func) -> &str;

    /// Check whether a function is only declared, i.e. has no body
    fn is_declaration(&self, func: Self::Func) -> bool;

    /// Retrieve the instructions of a function
    ///
    /// Instructions are returned block by block in layout order.
    fn instructions(&self, func: Self::Func) -> Vec<Self::Insn>;

    /// Retrieve the terminator of a function's entry block
    fn entry_terminator(&self, func: Self::Func) -> Option<Self::Insn>;

    /// Retrieve the instruction following `insn` in its block
    fn next(&self, insn: Self::Insn) -> Option<Self::Insn>;

    /// Classify an instruction
    fn opcode(&self, insn: Self::Insn) -> Opcode<Self::Value>;

    /// Retrieve the value defined by an instruction
    fn result(&self, insn: Self::Insn) -> Self::Value;

    /// Retrieve the instructions using the value defined by `insn`
    fn users(&self, insn: Self::Insn) -> Vec<Self::Insn>;

    /// Retrieve the type of a value
    fn type_of(&self, value: &Self::Value) -> Self::Type;

    /// Retrieve the pointee type of a pointer type
    ///
    /// Returns [`None`] if `ty` is not a pointer type.
    fn pointee(&self, ty: Self::Type) -> Option<Self::Type>;

    /// Check whether a type is a pointer type
    fn is_pointer(&self, ty: Self::Type) -> bool {
        self.pointee(ty).is_some()
    }

    /// Retrieve the width of an integer type in bits
    ///
    /// Returns [`None`] if `ty` is not an integer type.
    fn int_width(&self, ty: Self::Type) -> Option<u32>;

    /// Retrieve the name of a named aggregate type
    fn struct_name(&self, ty: Self::Type) -> Option<&str>;

    /// Strip any pointer casts from a value
    fn strip_pointer_casts(&self, value: &Self::Value) -> Self::Value;

    /// Classify a compile-time constant
    ///
    /// Returns [`None`] if `value` is not a constant.
    fn constant(&self, value: &Self::Value) -> Option<Constant>;

    /// Retrieve the name of the function called by a call instruction
    ///
    /// Returns [`None`] if `insn` is not a direct call.
    fn callee_name(&self, insn: Self::Insn) -> Option<&str>;

    /// Retrieve the function with the given name, declaring it if necessary
    ///
    /// The returned value may be used as callee in
    /// [`insert_call`][Self::insert_call]. An existing function, e.g. one the
    /// program itself declares or defines, is reused if it accepts the
    /// arguments described by `signature`. Hosts may reject the declaration if
    /// the existing function's parameters conflict.
    fn declare_function(
        &mut self,
        name: &str,
        signature: &Signature,
    ) -> Result<Self::Value, Self::Error>;

    /// Create a read-only, nul terminated string constant
    ///
    /// The returned value is a pointer to the first character.
    fn global_string(&mut self, name: &str, contents: &str) -> Result<Self::Value, Self::Error>;

    /// Create an unsigned 32bit integer constant
    fn const_u32(&mut self, value: u32) -> Self::Value;

    /// Insert a cast of `value` at the given position
    fn insert_cast(
        &mut self,
        position: Position<Self::Insn>,
        value: Self::Value,
        cast: Cast,
    ) -> Result<Self::Insn, Self::Error>;

    /// Insert a call at the given position
    fn insert_call(
        &mut self,
        position: Position<Self::Insn>,
        callee: Self::Value,
        args: &[Self::Value],
    ) -> Result<Self::Insn, Self::Error>;
}

/// Kind of an instruction, with the operands relevant for instrumentation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Opcode<V> {
    /// A load from memory
    Load { address: V },
    /// A store to memory
    Store { address: V, value: V },
    /// Computation of the address of a member of an aggregate
    MemberAddress { base: V },
    /// Any cast
    Cast { operand: V },
    /// A call with the given arguments
    Call { args: Vec<V> },
    /// A control transfer ending a block
    Terminator,
    /// Any other instruction
    Other,
}

impl<V> Opcode<V> {
    /// Retrieve the address accessed by a load or store
    pub fn address(&self) -> Option<&V> {
        match self {
            Self::Load { address } | Self::Store { address, .. } => Some(address),
            _ => None,
        }
    }

    /// Check whether this is a load or a store
    pub fn is_memory_access(&self) -> bool {
        self.address().is_some()
    }
}

/// Kind of a compile-time constant
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Constant {
    /// A named global variable
    GlobalVariable,
    /// Any other constant, e.g. an integer or an absolute address
    Other,
}

/// Scalar type used in [`Signature`]s
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Scalar {
    Void,
    /// 32bit integer
    I32,
    /// Pointer to bytes, e.g. `void *` or `char *`
    GenericPointer,
}

/// Calling convention of a function
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CallConv {
    /// The host's default C calling convention
    #[default]
    C,
    /// ARM Architecture Procedure Call Standard
    Aapcs,
}

/// Signature of an external function
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub ret: Scalar,
    pub params: &'static [Scalar],
    /// Whether the function takes additional variadic arguments
    pub variadic: bool,
    pub conv: CallConv,
}

impl Signature {
    /// Create a signature for a non-variadic function
    pub const fn new(ret: Scalar, params: &'static [Scalar], conv: CallConv) -> Self {
        Self {
            ret,
            params,
            variadic: false,
            conv,
        }
    }

    /// Make this signature variadic
    pub const fn variadic(self) -> Self {
        Self {
            variadic: true,
            ..self
        }
    }
}

/// Cast inserted by the instrumentation
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Cast {
    /// Cast a pointer to a [generic pointer][Scalar::GenericPointer]
    GenericPointer,
    /// Convert a pointer to an integer of the given width
    PointerToInt { bits: u32 },
    /// Truncate or extend an integer to the given width
    Resize { bits: u32, signed: bool },
}

/// Position relative to an existing instruction
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Position<I> {
    Before(I),
    After(I),
}

impl<I> Position<I> {
    /// Retrieve the instruction this position is relative to
    pub fn anchor(&self) -> &I {
        match self {
            Self::Before(i) | Self::After(i) => i,
        }
    }
}
