// Copyright (C) 2025 FZI Forschungszentrum Informatik
// SPDX-License-Identifier: Apache-2.0

use super::*;

use crate::config::Mode;
use crate::emit::{INTERRUPT_LOG_FN, LOG_FN, PRINT_FN};
use crate::ir::basic::{self, FuncId, Op, Value};

/// Build a function polling a UART status register and writing a character
///
/// ```text
/// void uart_putc(struct.Uart *uart, u8 c) {
///     while (!(uart->UART_SR & TXRDY)) {}
///     uart->UART_THR = c;
///     counter = counter + 1;
/// }
/// ```
fn uart_putc(module: &mut basic::Module) -> FuncId {
    let u8_ty = module.int(8);
    let u32_ty = module.int(32);
    let uart = module.named_struct("struct.Uart");
    let uart_ptr = module.pointer(uart);
    let counter = module.add_global("counter", u32_ty);

    let func = module.add_function("uart_putc", &[uart_ptr, u8_ty]);
    let entry = module.add_block(func);
    let poll = module.add_block(func);
    let write = module.add_block(func);

    let sr = module.member_address(entry, Value::Arg(func, 0), 5, u32_ty);
    module.branch(entry, [poll].into());

    let status = module.load(poll, Value::Insn(sr), u32_ty);
    module.other(poll, [Value::Insn(status)].into(), u32_ty);
    module.branch(poll, [poll, write].into());

    let thr = module.member_address(write, Value::Arg(func, 0), 7, u32_ty);
    module.store(write, Value::Insn(thr), Value::Arg(func, 1));
    let count = module.load(write, Value::Global(counter), u32_ty);
    module.store(write, Value::Global(counter), Value::Insn(count));
    module.ret(write);
    func
}

fn calls_to(module: &basic::Module, func: FuncId, name: &str) -> usize {
    module
        .instructions(func)
        .into_iter()
        .filter(|i| module.callee_name(*i) == Some(name))
        .count()
}

#[test]
fn instrument_function() {
    let mut module = basic::Module::new();
    let func = uart_putc(&mut module);
    let config = Instrumentation::default();
    let summary = Pass::new(&config).run_on_function(&mut module, func);
    assert_eq!(
        summary,
        Summary {
            function: "uart_putc".into(),
            loads: 1,
            stores: 1,
            interrupt: None,
            failures: 0,
        }
    );
    assert!(summary.modified());
    assert_eq!(calls_to(&module, func, LOG_FN), 2);
}

#[test]
fn idempotent() {
    let mut module = basic::Module::new();
    let func = uart_putc(&mut module);
    let config = Instrumentation::default();
    let pass = Pass::new(&config);
    assert!(pass.run_on_function(&mut module, func).modified());
    let count = module.insn_count();

    let summary = pass.run_on_function(&mut module, func);
    assert!(!summary.modified());
    assert_eq!(summary.loads + summary.stores, 0);
    assert_eq!(summary.failures, 0);
    assert_eq!(module.insn_count(), count);
    assert_eq!(calls_to(&module, func, LOG_FN), 2);
}

#[test]
fn idempotent_print_mode() {
    let mut module = basic::Module::new();
    let func = uart_putc(&mut module);
    let config = Instrumentation {
        mode: Mode::Print,
        ..Default::default()
    };
    let pass = Pass::new(&config);
    assert!(pass.run_on_function(&mut module, func).modified());
    assert!(!pass.run_on_function(&mut module, func).modified());
    assert_eq!(calls_to(&module, func, PRINT_FN), 2);
    assert_eq!(calls_to(&module, func, LOG_FN), 0);
}

#[test]
fn print_mode_with_program_printf() {
    let mut module = basic::Module::new();
    let u8_ty = module.int(8);
    let u8_ptr = module.pointer(u8_ty);
    let u32_ty = module.int(32);
    let pio = module.named_struct("struct.Pio");
    let pio_ptr = module.pointer(pio);
    let iprintf = module.add_variadic_function(PRINT_FN, &[u8_ptr]);
    let format = module
        .global_string("format", "PDSR: %x\n")
        .expect("Could not create string");

    let func = module.add_function("dump_pins", &[pio_ptr]);
    let block = module.add_block(func);
    let pdsr = module.member_address(block, Value::Arg(func, 0), 15, u32_ty);
    let first = module.load(block, Value::Insn(pdsr), u32_ty);
    module.call(block, iprintf, [format, Value::Insn(first)].into());
    module.load(block, Value::Insn(pdsr), u32_ty);
    module.ret(block);

    let config = Instrumentation {
        mode: Mode::Print,
        ..Default::default()
    };
    let pass = Pass::new(&config);
    let summary = pass.run_on_function(&mut module, func);
    assert_eq!((summary.loads, summary.failures), (2, 0));
    assert_eq!(calls_to(&module, func, PRINT_FN), 3);

    assert!(!pass.run_on_function(&mut module, func).modified());
    assert_eq!(calls_to(&module, func, PRINT_FN), 3);
}

#[test]
fn shared_emitter() {
    let mut module = basic::Module::new();
    let putc = uart_putc(&mut module);
    let handler = module.add_function("UART_Handler", &[]);
    let block = module.add_block(handler);
    module.ret(block);

    let config = Instrumentation::default();
    let pass = Pass::new(&config);
    let emitter = Emitter::new(&config);
    assert!(pass.run_with_emitter(&mut module, &emitter, putc).modified());
    assert!(pass.run_with_emitter(&mut module, &emitter, handler).modified());
    assert_eq!(
        emitter.log_function(&mut module),
        Ok(Value::Func(module.find_function(LOG_FN).expect("No log function")))
    );
    assert!(!pass.run_with_emitter(&mut module, &emitter, putc).modified());
}

#[test]
fn constant_addresses() {
    let mut module = basic::Module::new();
    let u32_ty = module.int(32);
    let func = module.add_function("pmc_enable", &[]);
    let block = module.add_block(func);
    let pcer0 = module.address(u32_ty, 0x400e_0610);
    let pcsr0 = module.address(u32_ty, 0x400e_0618);
    let bit = module.const_u32(1 << 11);
    module.store(block, pcer0, bit);
    let status = module.load(block, pcsr0, u32_ty);
    module.other(block, [Value::Insn(status)].into(), u32_ty);
    module.ret(block);

    let config = Instrumentation::default();
    let summary = Pass::new(&config).run_on_function(&mut module, func);
    assert_eq!((summary.loads, summary.stores), (1, 1));
}

#[test]
fn shared_access() {
    let mut module = basic::Module::new();
    let u32_ty = module.int(32);
    let u32_ptr = module.pointer(u32_ty);
    let pio = module.named_struct("struct.Pio");
    let pio_ptr = module.pointer(pio);
    let func = module.add_function("read_either", &[pio_ptr]);
    let block = module.add_block(func);
    let pdsr = module.member_address(block, Value::Arg(func, 0), 15, u32_ty);
    let odsr = module.member_address(block, Value::Arg(func, 0), 14, u32_ty);
    let phi = module.phi(block, u32_ptr);
    module.add_incoming(phi, Value::Insn(pdsr));
    module.add_incoming(phi, Value::Insn(odsr));
    let load = module.load(block, Value::Insn(phi), u32_ty);
    module.ret(block);

    let config = Instrumentation::default();
    let summary = Pass::new(&config).run_on_function(&mut module, func);
    assert_eq!(summary.loads, 1);
    let next = module.next(load).expect("Load not followed by anything");
    assert!(matches!(module.op(next), Op::Cast { .. }));
    assert_eq!(calls_to(&module, func, LOG_FN), 1);
}

#[test]
fn interrupt_handler() {
    let mut module = basic::Module::new();
    let u32_ty = module.int(32);
    let uart = module.named_struct("struct.Uart");
    let uart_ptr = module.pointer(uart);
    let func = module.add_function("UART_Handler", &[]);
    let block = module.add_block(func);
    let base = module.address(uart, 0x400e_0800);
    let base = module.cast(block, base, basic::CastKind::Bitcast, uart_ptr);
    let sr = module.member_address(block, Value::Insn(base), 5, u32_ty);
    module.load(block, Value::Insn(sr), u32_ty);
    module.ret(block);

    let config = Instrumentation::default();
    let pass = Pass::new(&config);
    let summary = pass.run_on_function(&mut module, func);
    assert_eq!(summary.interrupt, Some(8));
    assert_eq!(summary.loads, 1);
    assert_eq!(calls_to(&module, func, INTERRUPT_LOG_FN), 1);

    let summary = pass.run_on_function(&mut module, func);
    assert_eq!(summary.interrupt, None);
    assert!(!summary.modified());
    assert_eq!(calls_to(&module, func, INTERRUPT_LOG_FN), 1);
}

#[test]
fn best_effort() {
    let mut module = basic::Module::new();
    let u32_ty = module.int(32);
    let float = module.float();
    let adc = module.named_struct("struct.Adc");
    let adc_ptr = module.pointer(adc);
    let func = module.add_function("adc_read", &[adc_ptr]);
    let block = module.add_block(func);
    let fancy = module.member_address(block, Value::Arg(func, 0), 30, float);
    module.load(block, Value::Insn(fancy), float);
    let lcdr = module.member_address(block, Value::Arg(func, 0), 8, u32_ty);
    module.load(block, Value::Insn(lcdr), u32_ty);
    module.ret(block);

    let config = Instrumentation::default();
    let summary = Pass::new(&config).run_on_function(&mut module, func);
    assert_eq!(summary.failures, 1);
    assert_eq!(summary.loads, 1);
    assert!(summary.modified());
}

#[test]
fn interrupt_handler_failure() {
    let mut module = basic::Module::new();
    let func = module.add_function("TC3_Handler", &[]);
    module.add_block(func);

    let config = Instrumentation::default();
    let summary = Pass::new(&config).run_on_function(&mut module, func);
    assert_eq!(summary.failures, 1);
    assert_eq!(summary.interrupt, None);
    assert!(!summary.modified());
}

#[test]
fn untouched() {
    let mut module = basic::Module::new();
    let u32_ty = module.int(32);
    let counter = module.add_global("counter", u32_ty);
    let func = module.add_function("tick", &[]);
    let block = module.add_block(func);
    let count = module.load(block, Value::Global(counter), u32_ty);
    module.store(block, Value::Global(counter), Value::Insn(count));
    module.ret(block);
    let insns = module.insn_count();

    let config = Instrumentation::default();
    let summary = Pass::new(&config).run_on_function(&mut module, func);
    assert!(!summary.modified());
    assert_eq!(module.insn_count(), insns);
    assert_eq!(module.find_function(LOG_FN), None);
}

#[test]
fn instrument_module() {
    let mut module = basic::Module::new();
    let putc = uart_putc(&mut module);
    let handler = module.add_function("UART_Handler", &[]);
    let block = module.add_block(handler);
    module.ret(block);
    module.add_function("external", &[]);

    let config = Instrumentation::default();
    let summary = Pass::new(&config).run_on_module(&mut module);
    assert_eq!(summary.functions.len(), 2);
    assert_eq!(summary.loads(), 1);
    assert_eq!(summary.stores(), 1);
    assert_eq!(summary.failures(), 0);
    assert!(summary.modified());
    assert_eq!(
        summary.function("UART_Handler").and_then(|s| s.interrupt),
        Some(8)
    );
    assert_eq!(summary.function("external"), None);
    assert_eq!(calls_to(&module, putc, LOG_FN), 2);
    assert_eq!(calls_to(&module, handler, INTERRUPT_LOG_FN), 1);

    let again = Pass::new(&config).run_on_module(&mut module);
    assert!(!again.modified());
    // Entry point declarations are not instrumented
    assert_eq!(again.functions.len(), 2);
}

#[test]
fn summary_display() {
    let summary = Summary {
        function: "UART_Handler".into(),
        loads: 2,
        stores: 1,
        interrupt: Some(8),
        failures: 1,
    };
    assert_eq!(
        summary.to_string(),
        "UART_Handler: 2 loads, 1 stores instrumented, handler for interrupt 8, 1 failures"
    );
}
