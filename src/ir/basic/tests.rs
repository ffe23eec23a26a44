// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

use super::*;

use crate::ir::Module as _;

const LOG: Signature = Signature::new(
    Scalar::I32,
    &[Scalar::GenericPointer, Scalar::I32, Scalar::I32],
    CallConv::Aapcs,
);

/// Build `void f(struct.Pio *p) { p->field2 = p->field3; }`
fn copy_register() -> (Module, FuncId, [InsnId; 5]) {
    let mut module = Module::new();
    let u32_ty = module.int(32);
    let pio = module.named_struct("struct.Pio");
    let pio_ptr = module.pointer(pio);
    let func = module.add_function("copy", &[pio_ptr]);
    let block = module.add_block(func);
    let src = module.member_address(block, Value::Arg(func, 0), 3, u32_ty);
    let dst = module.member_address(block, Value::Arg(func, 0), 2, u32_ty);
    let load = module.load(block, Value::Insn(src), u32_ty);
    let store = module.store(block, Value::Insn(dst), Value::Insn(load));
    let ret = module.ret(block);
    (module, func, [src, dst, load, store, ret])
}

#[test]
fn types_interned() {
    let mut module = Module::new();
    let a = module.int(32);
    let b = module.int(32);
    let c = module.int(16);
    assert_eq!(a, b);
    assert_ne!(a, c);
    let p = module.pointer(a);
    assert_eq!(module.pointee(p), Some(a));
    assert_eq!(module.pointee(a), None);
    assert_eq!(module.int_width(c), Some(16));
    assert_eq!(module.int_width(p), None);
    let s = module.named_struct("struct.Uart");
    assert_eq!(module.struct_name(s), Some("struct.Uart"));
    assert_eq!(module.struct_name(p), None);
    assert_eq!(module.ty(module.void()), &Type::Void);
}

#[test]
fn layout_order() {
    let mut module = Module::new();
    let func = module.add_function("f", &[]);
    let entry = module.add_block(func);
    let exit = module.add_block(func);
    let b = module.branch(entry, [exit].into());
    let r = module.ret(exit);
    let void = module.void();
    let a = module.other(entry, Vec::new(), void);
    assert_eq!(module.instructions(func), [b, a, r]);
    assert_eq!(module.next(b), Some(a));
    assert_eq!(module.next(a), None);
    assert_eq!(module.entry_terminator(func), None);
    assert_eq!(module.function_name(func), "f");
    assert!(!module.is_declaration(func));
}

#[test]
fn opcodes() {
    let (module, _, [src, dst, load, store, ret]) = copy_register();
    assert!(matches!(module.opcode(src), Opcode::MemberAddress { .. }));
    assert!(matches!(module.opcode(dst), Opcode::MemberAddress { .. }));
    assert_eq!(
        module.opcode(load),
        Opcode::Load {
            address: Value::Insn(src)
        }
    );
    assert_eq!(
        module.opcode(store),
        Opcode::Store {
            address: Value::Insn(dst),
            value: Value::Insn(load)
        }
    );
    assert_eq!(module.opcode(ret), Opcode::Terminator);
    assert!(module.opcode(store).is_memory_access());
    assert!(!module.opcode(src).is_memory_access());
}

#[test]
fn users() {
    let (module, _, [src, dst, load, store, ret]) = copy_register();
    assert_eq!(module.users(src), [load]);
    assert_eq!(module.users(dst), [store]);
    assert_eq!(module.users(load), [store]);
    assert!(module.users(ret).is_empty());
}

#[test]
fn value_types() {
    let (mut module, func, [src, _, load, _, _]) = copy_register();
    let u32_ty = module.int(32);
    let u32_ptr = module.pointer(u32_ty);
    let pio = module.named_struct("struct.Pio");
    let pio_ptr = module.pointer(pio);
    assert_eq!(module.type_of(&Value::Insn(src)), u32_ptr);
    assert_eq!(module.type_of(&Value::Insn(load)), u32_ty);
    assert_eq!(module.type_of(&Value::Arg(func, 0)), pio_ptr);
    assert_eq!(module.type_of(&Value::Arg(func, 1)), module.void());
    let global = module.add_global("g", u32_ty);
    assert_eq!(module.type_of(&Value::Global(global)), u32_ptr);
}

#[test]
fn constants() {
    let mut module = Module::new();
    let u32_ty = module.int(32);
    let global = module.add_global("counter", u32_ty);
    let address = module.address(u32_ty, 0x400e_0e00);
    let int = module.const_u32(5);
    let func = module.add_function("f", &[]);
    assert_eq!(module.constant(&address), Some(Constant::Other));
    assert_eq!(module.constant(&int), Some(Constant::Other));
    assert_eq!(module.constant(&Value::Global(global)), Some(Constant::GlobalVariable));
    assert_eq!(module.constant(&Value::Arg(func, 0)), None);
}

#[test]
fn strip_pointer_casts() {
    let mut module = Module::new();
    let u8_ty = module.int(8);
    let u8_ptr = module.pointer(u8_ty);
    let u32_ty = module.int(32);
    let u32_ptr = module.pointer(u32_ty);
    let func = module.add_function("f", &[]);
    let block = module.add_block(func);
    let address = module.address(u32_ty, 0x400e_0800);
    let a = module.cast(block, address.clone(), CastKind::Bitcast, u8_ptr);
    let b = module.cast(block, Value::Insn(a), CastKind::Bitcast, u32_ptr);
    let c = module.cast(block, Value::Insn(b), CastKind::PtrToInt, u32_ty);
    assert_eq!(module.strip_pointer_casts(&Value::Insn(b)), address);
    assert_eq!(module.strip_pointer_casts(&Value::Insn(c)), Value::Insn(c));
}

#[test]
fn declare_function() {
    let mut module = Module::new();
    let first = module.declare_function("conware_log", &LOG);
    let second = module.declare_function("conware_log", &LOG);
    assert_eq!(first, second);
    let Ok(Value::Func(func)) = first else {
        panic!("Not a function: {first:?}");
    };
    assert!(module.is_declaration(func));
    assert_eq!(module.function(func).params().len(), 3);
    assert_eq!(module.function(func).calling_convention(), CallConv::Aapcs);
    assert_eq!(module.functions().len(), 1);

    let other = Signature::new(Scalar::Void, &[], CallConv::C);
    assert_eq!(
        module.declare_function("conware_log", &other),
        Err(Error::SignatureMismatch("conware_log".into()))
    );
    let looping = module.add_function("loop", &[]);
    assert_eq!(module.declare_function("loop", &other), Ok(Value::Func(looping)));
}

#[test]
fn declare_existing_function() {
    let mut module = Module::new();
    let u8_ty = module.int(8);
    let u8_ptr = module.pointer(u8_ty);
    let u32_ty = module.int(32);
    let printf = Signature::new(Scalar::I32, &[Scalar::GenericPointer], CallConv::C).variadic();

    // Declared by the program itself
    let iprintf = module.add_variadic_function("iprintf", &[u8_ptr]);
    assert_eq!(module.declare_function("iprintf", &printf), Ok(Value::Func(iprintf)));
    assert_eq!(module.functions().len(), 1);

    // Variadic existing function accepting the fixed parameters as prefix
    let log = module.add_variadic_function("conware_log", &[u8_ptr]);
    assert_eq!(module.declare_function("conware_log", &LOG), Ok(Value::Func(log)));

    // Fixed parameters that would receive variadic arguments
    module.add_function("puts", &[u8_ptr]);
    assert_eq!(
        module.declare_function("puts", &printf),
        Err(Error::SignatureMismatch("puts".into()))
    );

    // Conflicting parameter types
    module.add_variadic_function("printf", &[u32_ty]);
    assert_eq!(
        module.declare_function("printf", &printf),
        Err(Error::SignatureMismatch("printf".into()))
    );
}

#[test]
fn global_string() {
    let mut module = Module::new();
    let a = module.global_string("label", "Read").expect("Could not create string");
    let b = module.global_string("label", "Read").expect("Could not create string");
    assert_eq!(a, b);
    assert_eq!(
        module.global_string("label", "Wrote"),
        Err(Error::DuplicateGlobal("label".into()))
    );
    let Value::Global(global) = a else {
        panic!("Not a global: {a:?}");
    };
    assert_eq!(module.global(global).contents(), Some("Read"));
    let ty = module.type_of(&a);
    let byte = module.int(8);
    assert_eq!(module.pointee(ty), Some(byte));
}

#[test]
fn insert() {
    let (mut module, func, [src, dst, load, store, ret]) = copy_register();
    let cast = module
        .insert_cast(Position::After(load), Value::Insn(src), Cast::GenericPointer)
        .expect("Could not insert cast");
    let value = module
        .insert_cast(Position::Before(ret), Value::Insn(load), Cast::Resize { bits: 8, signed: false })
        .expect("Could not insert cast");
    assert_eq!(module.instructions(func), [src, dst, load, cast, store, value, ret]);
    assert_eq!(module.next(load), Some(cast));
    assert_eq!(module.users(src), [load, cast]);
    assert!(matches!(
        module.op(value),
        Op::Cast {
            kind: CastKind::Truncate,
            ..
        }
    ));
    assert_eq!(
        module.insert_cast(Position::After(ret), Value::Insn(src), Cast::GenericPointer),
        Err(Error::InsertAfterTerminator(ret))
    );
}

#[test]
fn invalid_casts() {
    let (mut module, _, [src, _, load, _, ret]) = copy_register();
    let pos = Position::Before(ret);
    assert_eq!(
        module.insert_cast(pos, Value::Insn(load), Cast::GenericPointer),
        Err(Error::InvalidCast(Cast::GenericPointer))
    );
    assert_eq!(
        module.insert_cast(pos, Value::Insn(load), Cast::PointerToInt { bits: 32 }),
        Err(Error::InvalidCast(Cast::PointerToInt { bits: 32 }))
    );
    let resize = Cast::Resize {
        bits: 32,
        signed: false,
    };
    assert_eq!(
        module.insert_cast(pos, Value::Insn(src), resize),
        Err(Error::InvalidCast(resize))
    );
}

#[test]
fn resize_kinds() {
    let mut module = Module::new();
    let u16_ty = module.int(16);
    let u64_ty = module.int(64);
    let func = module.add_function("f", &[u16_ty, u64_ty]);
    let block = module.add_block(func);
    let ret = module.ret(block);
    let mut resize = |arg, signed| {
        let cast = Cast::Resize { bits: 32, signed };
        let insn = module
            .insert_cast(Position::Before(ret), Value::Arg(func, arg), cast)
            .expect("Could not insert cast");
        match module.op(insn) {
            Op::Cast { kind, .. } => *kind,
            op => panic!("Not a cast: {op:?}"),
        }
    };
    assert_eq!(resize(0, false), CastKind::ZeroExtend);
    assert_eq!(resize(0, true), CastKind::SignExtend);
    assert_eq!(resize(1, false), CastKind::Truncate);
}

#[test]
fn insert_call() {
    let (mut module, _, [_, _, load, _, ret]) = copy_register();
    let log = module.declare_function("conware_log", &LOG).expect("Could not declare");
    let zero = module.const_u32(0);
    assert_eq!(
        module.insert_call(Position::After(load), log.clone(), &[zero.clone()]),
        Err(Error::ArityMismatch {
            expected: 3,
            actual: 1
        })
    );
    assert_eq!(
        module.insert_call(Position::After(load), zero.clone(), &[]),
        Err(Error::NotAFunction)
    );
    let args = [Value::Insn(load), zero.clone(), zero];
    let call = module
        .insert_call(Position::Before(ret), log, &args)
        .expect("Could not insert call");
    assert_eq!(module.callee_name(call), Some("conware_log"));
    assert_eq!(module.callee_name(load), None);
    assert_eq!(module.opcode(call), Opcode::Call { args: args.to_vec() });
}

#[test]
fn variadic_call() {
    let mut module = Module::new();
    let printf = Signature::new(Scalar::I32, &[Scalar::GenericPointer], CallConv::C).variadic();
    let callee = module.declare_function("iprintf", &printf).expect("Could not declare");
    let label = module.global_string("label", "%x").expect("Could not create string");
    let func = module.add_function("f", &[]);
    let block = module.add_block(func);
    let ret = module.ret(block);
    let value = module.const_u32(1);
    assert!(
        module
            .insert_call(Position::Before(ret), callee.clone(), &[label.clone(), value])
            .is_ok()
    );
    assert!(module.insert_call(Position::Before(ret), callee, &[]).is_err());
}

#[test]
fn phi_cycle() {
    let mut module = Module::new();
    let u32_ty = module.int(32);
    let func = module.add_function("f", &[]);
    let block = module.add_block(func);
    let phi = module.phi(block, u32_ty);
    let other = module.other(block, [Value::Insn(phi)].into(), u32_ty);
    module.add_incoming(phi, Value::Insn(other));
    assert_eq!(module.users(phi), [other]);
    assert_eq!(module.users(other), [phi]);
}
