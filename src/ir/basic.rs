// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0
//! Arena based [`Module`][super::Module] implementation
//!
//! This module provides a minimal, typed IR that implements the
//! [`ir::Module`][super::Module] trait. Types, functions, blocks, instructions
//! and globals live in arenas owned by the [`Module`] and are referred to via
//! handles such as [`InsnId`]. Handles are only valid for the [`Module`] that
//! created them.
//!
//! Programs are built through the methods of [`Module`], e.g.
//! [`Module::load`], which append an instruction to a block.

#[cfg(test)]
mod tests;

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use super::{CallConv, Cast, Constant, Module as _, Opcode, Position, Scalar, Signature};

/// Handle identifying a [`Type`]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(usize);

/// Handle identifying a function
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FuncId(usize);

/// Handle identifying a basic block
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(usize);

/// Handle identifying an instruction
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InsnId(usize);

/// Handle identifying a global
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalId(usize);

/// A type
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Void,
    /// Integer of the given width in bits
    Int(u32),
    Float,
    Pointer(TypeId),
    /// Named aggregate
    Struct(String),
    Array(TypeId, u64),
    /// Type of function bodies
    Code,
}

/// An operand
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    /// Value defined by an instruction
    Insn(InsnId),
    /// Function argument
    Arg(FuncId, usize),
    /// Address of a global
    Global(GlobalId),
    /// Address of a function
    Func(FuncId),
    /// Integer constant
    Int { ty: TypeId, value: u64 },
    /// Constant pointer to an absolute address
    Address { ty: TypeId, address: u64 },
}

/// Kind of a cast instruction
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CastKind {
    /// Reinterpretation without change of representation
    Bitcast,
    IntToPtr,
    PtrToInt,
    ZeroExtend,
    SignExtend,
    Truncate,
}

/// An instruction's operation and operands
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Load { address: Value },
    Store { address: Value, value: Value },
    /// Address of the member with the given index of the aggregate `base`
    /// points to
    MemberAddress { base: Value, index: u32 },
    Cast { operand: Value, kind: CastKind },
    Call { callee: Value, args: Vec<Value> },
    Phi { incoming: Vec<Value> },
    Return { value: Option<Value> },
    Branch { targets: Vec<BlockId> },
    Other { operands: Vec<Value> },
}

impl Op {
    /// Retrieve all value operands
    pub fn operands(&self) -> Vec<&Value> {
        match self {
            Self::Load { address } => [address].into(),
            Self::Store { address, value } => [address, value].into(),
            Self::MemberAddress { base, .. } => [base].into(),
            Self::Cast { operand, .. } => [operand].into(),
            Self::Call { callee, args } => core::iter::once(callee).chain(args).collect(),
            Self::Phi { incoming: v } | Self::Other { operands: v } => v.iter().collect(),
            Self::Return { value } => value.iter().collect(),
            Self::Branch { .. } => Vec::new(),
        }
    }

    /// Check whether this operation ends a block
    pub fn is_terminator(&self) -> bool {
        matches!(self, Self::Return { .. } | Self::Branch { .. })
    }
}

/// A function
#[derive(Clone, Debug)]
pub struct Function {
    name: String,
    params: Vec<TypeId>,
    ret: TypeId,
    ty: TypeId,
    blocks: Vec<BlockId>,
    variadic: bool,
    conv: CallConv,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[TypeId] {
        &self.params
    }

    pub fn return_type(&self) -> TypeId {
        self.ret
    }

    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    pub fn calling_convention(&self) -> CallConv {
        self.conv
    }

    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }
}

/// A global variable or constant
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Global {
    name: String,
    /// Type of the global's value
    value_type: TypeId,
    /// Type of the global's address
    ty: TypeId,
    /// Contents of string constants
    contents: Option<String>,
}

impl Global {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> TypeId {
        self.value_type
    }

    /// Retrieve the contents of a string constant
    pub fn contents(&self) -> Option<&str> {
        self.contents.as_deref()
    }
}

#[derive(Clone, Debug)]
struct Block {
    insns: Vec<InsnId>,
}

#[derive(Clone, Debug)]
struct Instruction {
    op: Op,
    ty: TypeId,
    block: BlockId,
    /// Instructions using this one's value, ordered by handle
    users: Vec<InsnId>,
}

/// A module
#[derive(Clone, Debug)]
pub struct Module {
    types: Vec<Type>,
    functions: Vec<Function>,
    blocks: Vec<Block>,
    insns: Vec<Instruction>,
    globals: Vec<Global>,
}

const VOID: TypeId = TypeId(0);

impl Module {
    /// Create an empty module
    pub fn new() -> Self {
        Self {
            types: [Type::Void].into(),
            functions: Default::default(),
            blocks: Default::default(),
            insns: Default::default(),
            globals: Default::default(),
        }
    }

    /// Retrieve the [`TypeId`] for a type, creating it if necessary
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(id) = self.types.iter().position(|t| *t == ty) {
            return TypeId(id);
        }
        self.types.push(ty);
        TypeId(self.types.len() - 1)
    }

    pub fn void(&self) -> TypeId {
        VOID
    }

    pub fn int(&mut self, bits: u32) -> TypeId {
        self.intern(Type::Int(bits))
    }

    pub fn float(&mut self) -> TypeId {
        self.intern(Type::Float)
    }

    pub fn pointer(&mut self, pointee: TypeId) -> TypeId {
        self.intern(Type::Pointer(pointee))
    }

    pub fn named_struct(&mut self, name: &str) -> TypeId {
        self.intern(Type::Struct(name.to_string()))
    }

    pub fn array(&mut self, element: TypeId, len: u64) -> TypeId {
        self.intern(Type::Array(element, len))
    }

    /// Retrieve a [`Type`]
    pub fn ty(&self, ty: TypeId) -> &Type {
        &self.types[ty.0]
    }

    /// Add a function without return value
    pub fn add_function(&mut self, name: &str, params: &[TypeId]) -> FuncId {
        self.new_function(name, params, false)
    }

    /// Add a function without return value taking variadic arguments after
    /// `params`
    pub fn add_variadic_function(&mut self, name: &str, params: &[TypeId]) -> FuncId {
        self.new_function(name, params, true)
    }

    fn new_function(&mut self, name: &str, params: &[TypeId], variadic: bool) -> FuncId {
        let ty = self.intern(Type::Code);
        let ty = self.pointer(ty);
        self.functions.push(Function {
            name: name.to_string(),
            params: params.into(),
            ret: VOID,
            ty,
            blocks: Default::default(),
            variadic,
            conv: Default::default(),
        });
        FuncId(self.functions.len() - 1)
    }

    /// Retrieve a function
    pub fn function(&self, func: FuncId) -> &Function {
        &self.functions[func.0]
    }

    /// Find a function by name
    pub fn find_function(&self, name: &str) -> Option<FuncId> {
        self.functions
            .iter()
            .position(|f| f.name == name)
            .map(FuncId)
    }

    /// Append a new, empty block to a function
    ///
    /// The first block added is the function's entry block.
    pub fn add_block(&mut self, func: FuncId) -> BlockId {
        let block = BlockId(self.blocks.len());
        self.blocks.push(Block {
            insns: Default::default(),
        });
        self.functions[func.0].blocks.push(block);
        block
    }

    /// Add a global variable holding a value of the given type
    pub fn add_global(&mut self, name: &str, value_type: TypeId) -> GlobalId {
        let ty = self.pointer(value_type);
        self.globals.push(Global {
            name: name.to_string(),
            value_type,
            ty,
            contents: None,
        });
        GlobalId(self.globals.len() - 1)
    }

    /// Retrieve a global
    pub fn global(&self, global: GlobalId) -> &Global {
        &self.globals[global.0]
    }

    /// Create a constant pointer of type `ty` to an absolute address
    pub fn address(&mut self, pointee: TypeId, address: u64) -> Value {
        let ty = self.pointer(pointee);
        Value::Address { ty, address }
    }

    /// Create an integer constant
    pub fn const_int(&mut self, bits: u32, value: u64) -> Value {
        let ty = self.int(bits);
        Value::Int { ty, value }
    }

    /// Append an instruction to a block
    pub fn push(&mut self, block: BlockId, op: Op, ty: TypeId) -> InsnId {
        let insn = self.new_insn(op, ty, block);
        self.blocks[block.0].insns.push(insn);
        insn
    }

    /// Append a load of a value of type `ty`
    pub fn load(&mut self, block: BlockId, address: Value, ty: TypeId) -> InsnId {
        self.push(block, Op::Load { address }, ty)
    }

    pub fn store(&mut self, block: BlockId, address: Value, value: Value) -> InsnId {
        self.push(block, Op::Store { address, value }, VOID)
    }

    /// Append the computation of a member's address
    ///
    /// The member is of type `member`.
    pub fn member_address(
        &mut self,
        block: BlockId,
        base: Value,
        index: u32,
        member: TypeId,
    ) -> InsnId {
        let ty = self.pointer(member);
        self.push(block, Op::MemberAddress { base, index }, ty)
    }

    /// Append a cast of `operand` to the type `ty`
    pub fn cast(&mut self, block: BlockId, operand: Value, kind: CastKind, ty: TypeId) -> InsnId {
        self.push(block, Op::Cast { operand, kind }, ty)
    }

    /// Append a phi without any incoming values
    ///
    /// Incoming values are added via [`add_incoming`][Self::add_incoming].
    pub fn phi(&mut self, block: BlockId, ty: TypeId) -> InsnId {
        self.push(block, Op::Phi { incoming: Vec::new() }, ty)
    }

    /// Add an incoming value to a phi
    ///
    /// Does nothing if `phi` is not a phi.
    pub fn add_incoming(&mut self, phi: InsnId, value: Value) {
        if let Some(Op::Phi { incoming }) = self.insns.get_mut(phi.0).map(|i| &mut i.op) {
            incoming.push(value.clone());
            self.add_use(&value, phi);
        }
    }

    /// Append a direct call
    pub fn call(&mut self, block: BlockId, callee: FuncId, args: Vec<Value>) -> InsnId {
        let ty = self.functions[callee.0].ret;
        let callee = Value::Func(callee);
        self.push(block, Op::Call { callee, args }, ty)
    }

    /// Append an arbitrary instruction
    pub fn other(&mut self, block: BlockId, operands: Vec<Value>, ty: TypeId) -> InsnId {
        self.push(block, Op::Other { operands }, ty)
    }

    /// Append a return without value
    pub fn ret(&mut self, block: BlockId) -> InsnId {
        self.push(block, Op::Return { value: None }, VOID)
    }

    pub fn branch(&mut self, block: BlockId, targets: Vec<BlockId>) -> InsnId {
        self.push(block, Op::Branch { targets }, VOID)
    }

    /// Retrieve an instruction's operation
    pub fn op(&self, insn: InsnId) -> &Op {
        &self.insns[insn.0].op
    }

    /// Retrieve the block containing an instruction
    pub fn block_of(&self, insn: InsnId) -> BlockId {
        self.insns[insn.0].block
    }

    /// Retrieve the instructions of a block
    pub fn block(&self, block: BlockId) -> &[InsnId] {
        &self.blocks[block.0].insns
    }

    /// Retrieve the number of instructions in the module
    pub fn insn_count(&self) -> usize {
        self.insns.len()
    }

    fn new_insn(&mut self, op: Op, ty: TypeId, block: BlockId) -> InsnId {
        let insn = InsnId(self.insns.len());
        let operands: Vec<_> = op.operands().into_iter().cloned().collect();
        self.insns.push(Instruction {
            op,
            ty,
            block,
            users: Vec::new(),
        });
        operands.iter().for_each(|v| self.add_use(v, insn));
        insn
    }

    fn add_use(&mut self, value: &Value, user: InsnId) {
        let Value::Insn(used) = value else {
            return;
        };
        if let Some(users) = self.insns.get_mut(used.0).map(|i| &mut i.users)
            && let Err(pos) = users.binary_search(&user)
        {
            users.insert(pos, user);
        }
    }

    fn scalar(&mut self, scalar: Scalar) -> TypeId {
        match scalar {
            Scalar::Void => VOID,
            Scalar::I32 => self.int(32),
            Scalar::GenericPointer => {
                let byte = self.int(8);
                self.pointer(byte)
            }
        }
    }

    fn insert(&mut self, position: Position<InsnId>, op: Op, ty: TypeId) -> Result<InsnId, Error> {
        let anchor = *position.anchor();
        let block = self
            .insns
            .get(anchor.0)
            .ok_or(Error::UnknownInstruction(anchor))?
            .block;
        let index = self.blocks[block.0]
            .insns
            .iter()
            .position(|i| *i == anchor)
            .ok_or(Error::UnknownInstruction(anchor))?;
        let index = match position {
            Position::Before(_) => index,
            Position::After(_) if self.insns[anchor.0].op.is_terminator() => {
                return Err(Error::InsertAfterTerminator(anchor));
            }
            Position::After(_) => index + 1,
        };

        let insn = self.new_insn(op, ty, block);
        self.blocks[block.0].insns.insert(index, insn);
        Ok(insn)
    }
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

impl super::Module for Module {
    type Func = FuncId;
    type Insn = InsnId;
    type Value = Value;
    type Type = TypeId;
    type Error = Error;

    fn functions(&self) -> Vec<FuncId> {
        (0..self.functions.len()).map(FuncId).collect()
    }

    fn function_name(&self, func: FuncId) -> &str {
        &self.functions[func.0].name
    }

    fn is_declaration(&self, func: FuncId) -> bool {
        self.functions[func.0].blocks.is_empty()
    }

    fn instructions(&self, func: FuncId) -> Vec<InsnId> {
        self.functions[func.0]
            .blocks
            .iter()
            .flat_map(|b| self.blocks[b.0].insns.iter().copied())
            .collect()
    }

    fn entry_terminator(&self, func: FuncId) -> Option<InsnId> {
        let entry = self.functions[func.0].blocks.first()?;
        self.blocks[entry.0]
            .insns
            .last()
            .copied()
            .filter(|i| self.insns[i.0].op.is_terminator())
    }

    fn next(&self, insn: InsnId) -> Option<InsnId> {
        let block = &self.blocks[self.insns.get(insn.0)?.block.0].insns;
        let index = block.iter().position(|i| *i == insn)?;
        block.get(index + 1).copied()
    }

    fn opcode(&self, insn: InsnId) -> Opcode<Value> {
        match &self.insns[insn.0].op {
            Op::Load { address } => Opcode::Load {
                address: address.clone(),
            },
            Op::Store { address, value } => Opcode::Store {
                address: address.clone(),
                value: value.clone(),
            },
            Op::MemberAddress { base, .. } => Opcode::MemberAddress { base: base.clone() },
            Op::Cast { operand, .. } => Opcode::Cast {
                operand: operand.clone(),
            },
            Op::Call { args, .. } => Opcode::Call { args: args.clone() },
            Op::Return { .. } | Op::Branch { .. } => Opcode::Terminator,
            Op::Phi { .. } | Op::Other { .. } => Opcode::Other,
        }
    }

    fn result(&self, insn: InsnId) -> Value {
        Value::Insn(insn)
    }

    fn users(&self, insn: InsnId) -> Vec<InsnId> {
        self.insns
            .get(insn.0)
            .map(|i| i.users.clone())
            .unwrap_or_default()
    }

    fn type_of(&self, value: &Value) -> TypeId {
        match value {
            Value::Insn(i) => self.insns.get(i.0).map(|i| i.ty).unwrap_or(VOID),
            Value::Arg(f, n) => self
                .functions
                .get(f.0)
                .and_then(|f| f.params.get(*n))
                .copied()
                .unwrap_or(VOID),
            Value::Global(g) => self.globals.get(g.0).map(|g| g.ty).unwrap_or(VOID),
            Value::Func(f) => self.functions[f.0].ty,
            Value::Int { ty, .. } | Value::Address { ty, .. } => *ty,
        }
    }

    fn pointee(&self, ty: TypeId) -> Option<TypeId> {
        match self.types.get(ty.0)? {
            Type::Pointer(p) => Some(*p),
            _ => None,
        }
    }

    fn int_width(&self, ty: TypeId) -> Option<u32> {
        match self.types.get(ty.0)? {
            Type::Int(w) => Some(*w),
            _ => None,
        }
    }

    fn struct_name(&self, ty: TypeId) -> Option<&str> {
        match self.types.get(ty.0)? {
            Type::Struct(n) => Some(n),
            _ => None,
        }
    }

    fn strip_pointer_casts(&self, value: &Value) -> Value {
        let mut value = value;
        while let Value::Insn(i) = value {
            match &self.insns[i.0].op {
                Op::Cast {
                    operand,
                    kind: CastKind::Bitcast,
                } => value = operand,
                _ => break,
            }
        }
        value.clone()
    }

    fn constant(&self, value: &Value) -> Option<Constant> {
        match value {
            Value::Insn(_) | Value::Arg(..) => None,
            Value::Global(_) => Some(Constant::GlobalVariable),
            Value::Func(_) | Value::Int { .. } | Value::Address { .. } => Some(Constant::Other),
        }
    }

    fn callee_name(&self, insn: InsnId) -> Option<&str> {
        match &self.insns.get(insn.0)?.op {
            Op::Call {
                callee: Value::Func(f),
                ..
            } => Some(&self.functions[f.0].name),
            _ => None,
        }
    }

    fn declare_function(&mut self, name: &str, signature: &Signature) -> Result<Value, Error> {
        let params: Vec<TypeId> = signature.params.iter().map(|s| self.scalar(*s)).collect();
        if let Some(func) = self.find_function(name) {
            // Results of inserted calls are never used, return types don't matter
            let existing = &self.functions[func.0];
            let compatible = if existing.variadic {
                params.starts_with(&existing.params)
            } else {
                !signature.variadic && existing.params == params
            };
            return if compatible {
                Ok(Value::Func(func))
            } else {
                Err(Error::SignatureMismatch(name.to_string()))
            };
        }

        let ret = self.scalar(signature.ret);
        let func = self.add_function(name, &[]);
        let function = &mut self.functions[func.0];
        function.params = params;
        function.ret = ret;
        function.variadic = signature.variadic;
        function.conv = signature.conv;
        Ok(Value::Func(func))
    }

    fn global_string(&mut self, name: &str, contents: &str) -> Result<Value, Error> {
        if let Some(n) = self.globals.iter().position(|g| g.name == name) {
            return if self.globals[n].contents.as_deref() == Some(contents) {
                Ok(Value::Global(GlobalId(n)))
            } else {
                Err(Error::DuplicateGlobal(name.to_string()))
            };
        }

        let byte = self.int(8);
        let global = self.add_global(name, byte);
        self.globals[global.0].contents = Some(contents.to_string());
        Ok(Value::Global(global))
    }

    fn const_u32(&mut self, value: u32) -> Value {
        self.const_int(32, value.into())
    }

    fn insert_cast(
        &mut self,
        position: Position<InsnId>,
        value: Value,
        cast: Cast,
    ) -> Result<InsnId, Error> {
        let from = self.type_of(&value);
        let is_pointer = matches!(self.ty(from), Type::Pointer(_));
        let (kind, ty) = match cast {
            Cast::GenericPointer if is_pointer => (CastKind::Bitcast, self.scalar(Scalar::GenericPointer)),
            Cast::PointerToInt { bits } if is_pointer => (CastKind::PtrToInt, self.int(bits)),
            Cast::Resize { bits, signed } => {
                let Type::Int(width) = *self.ty(from) else {
                    return Err(Error::InvalidCast(cast));
                };
                let kind = match width.cmp(&bits) {
                    core::cmp::Ordering::Greater => CastKind::Truncate,
                    core::cmp::Ordering::Less if signed => CastKind::SignExtend,
                    core::cmp::Ordering::Less => CastKind::ZeroExtend,
                    core::cmp::Ordering::Equal => CastKind::Bitcast,
                };
                (kind, self.int(bits))
            }
            _ => return Err(Error::InvalidCast(cast)),
        };
        self.insert(position, Op::Cast { operand: value, kind }, ty)
    }

    fn insert_call(
        &mut self,
        position: Position<InsnId>,
        callee: Value,
        args: &[Value],
    ) -> Result<InsnId, Error> {
        let Value::Func(func) = callee else {
            return Err(Error::NotAFunction);
        };
        let function = self.functions.get(func.0).ok_or(Error::NotAFunction)?;
        let expected = function.params.len();
        if args.len() < expected || (args.len() > expected && !function.variadic) {
            return Err(Error::ArityMismatch {
                expected,
                actual: args.len(),
            });
        }

        let ty = function.ret;
        let op = Op::Call {
            callee,
            args: args.into(),
        };
        self.insert(position, op, ty)
    }
}

/// Errors returned by mutating operations of a [`Module`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The instruction is not part of any block
    UnknownInstruction(InsnId),
    /// Instructions can not be inserted after a terminator
    InsertAfterTerminator(InsnId),
    /// The cast is not applicable to the value's type
    InvalidCast(Cast),
    /// The callee is not a function
    NotAFunction,
    /// The number of arguments does not match the callee's parameters
    ArityMismatch { expected: usize, actual: usize },
    /// A function with the given name but a different signature exists
    SignatureMismatch(String),
    /// A global with the given name but different contents exists
    DuplicateGlobal(String),
}

impl core::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownInstruction(i) => write!(f, "Unknown instruction {}", i.0),
            Self::InsertAfterTerminator(i) => {
                write!(f, "Cannot insert after terminator {}", i.0)
            }
            Self::InvalidCast(c) => write!(f, "Invalid cast {c:?}"),
            Self::NotAFunction => write!(f, "Callee is not a function"),
            Self::ArityMismatch { expected, actual } => {
                write!(f, "Expected {expected} arguments, got {actual}")
            }
            Self::SignatureMismatch(n) => write!(f, "Function {n} exists with other signature"),
            Self::DuplicateGlobal(n) => write!(f, "Global {n} exists with other contents"),
        }
    }
}
