//! The dispatch loop over the flattened instruction stream (§4.5, §4.5.2,
//! §4.5.3), and the semantics of every instruction family. The loop is
//! iterative, not recursive: `call` pushes an activation onto `Stacks` and
//! lets the same loop pick up the new top frame, so call depth is bounded by
//! the configured stack limit rather than by the host's native stack.

use std::rc::Rc;

use wasm_module::{Instr, MemArg};
use wasm_types::{
    numeric, trap::TrapKind, FunctionType, Value, ValueType, WasmError,
};

use crate::address::FuncAddr;
use crate::flatten::FlatInstr;
use crate::function::{FunctionBody, FunctionInstance, HostCallable, HostContext};
use crate::module_instance::ModuleInstance;
use crate::stack::{Frame, Label, Stacks};
use crate::store::Store;

/// Sets up the initial activation for a call into a module function and runs
/// it to completion, returning the result values. `args` have already been
/// validated against the callee's declared parameter types by the caller
/// (the facade, per §4.5.3 step 1 / §6.2).
pub fn call_function(
    store: &mut Store,
    max_stack_depth: usize,
    func_addr: FuncAddr,
    args: &[Value],
) -> Result<Vec<Value>, WasmError> {
    let mut stacks = Stacks::new(max_stack_depth);
    match &store.functions[func_addr.0] {
        FunctionInstance::Host { ty, callable } => {
            let ty = ty.clone();
            let callable = Rc::clone(callable);
            let result = callable(args, HostContext::new(None)).map_err(WasmError::HostError)?;
            let _ = ty;
            Ok(result.into_iter().collect())
        }
        FunctionInstance::Module { ty, module, body } => {
            let ty = ty.clone();
            let module = Rc::clone(module);
            let body = Rc::clone(body);
            let mut locals = args.to_vec();
            locals.extend(body.locals.iter().map(|t| zero_value(*t)));
            let frame = Frame {
                arity: ty.result.is_some() as u8,
                locals,
                module,
                func_addr,
                ip: 0,
                label_base: 0,
                operand_base: 0,
            };
            stacks
                .push_frame(frame)
                .map_err(|_| WasmError::from(TrapKind::StackOverflow))?;
            run(store, &mut stacks)?;
            let result_count = ty.result.is_some() as usize;
            let start = stacks.operands.len() - result_count;
            Ok(stacks.operands.split_off(start))
        }
    }
}

fn zero_value(ty: ValueType) -> Value {
    match ty {
        ValueType::I32 => Value::I32(0),
        ValueType::I64 => Value::I64(0),
        ValueType::F32 => Value::F32(0.0),
        ValueType::F64 => Value::F64(0.0),
    }
}

fn run(store: &mut Store, stacks: &mut Stacks) -> Result<(), WasmError> {
    while !stacks.frames.is_empty() {
        step(store, stacks)?;
    }
    Ok(())
}

fn step(store: &mut Store, stacks: &mut Stacks) -> Result<(), WasmError> {
    let frame_idx = stacks.frames.len() - 1;
    let module = Rc::clone(&stacks.frames[frame_idx].module);
    let func_addr = stacks.frames[frame_idx].func_addr;
    let ip = stacks.frames[frame_idx].ip;

    let instr = match &store.functions[func_addr.0] {
        FunctionInstance::Module { body, .. } => body.code[ip].clone(),
        FunctionInstance::Host { .. } => {
            unreachable!("an activation frame always references module code")
        }
    };

    match instr {
        FlatInstr::Plain(op) => exec_plain(store, stacks, frame_idx, &module, op),
        FlatInstr::StartBlock {
            arity,
            continuation_ip,
            is_loop,
        } => {
            let saved_operands_len = stacks.operands.len();
            stacks
                .push_label(Label {
                    arity,
                    continuation_ip,
                    saved_operands_len,
                    is_loop,
                })
                .map_err(|_| WasmError::from(TrapKind::StackOverflow))?;
            stacks.frames[frame_idx].ip += 1;
            Ok(())
        }
        FlatInstr::StartIf {
            arity,
            else_ip,
            end_ip,
        } => {
            let cond = pop_i32(stacks);
            let saved_operands_len = stacks.operands.len();
            stacks
                .push_label(Label {
                    arity,
                    continuation_ip: end_ip,
                    saved_operands_len,
                    is_loop: false,
                })
                .map_err(|_| WasmError::from(TrapKind::StackOverflow))?;
            stacks.frames[frame_idx].ip = if cond != 0 { ip + 1 } else { else_ip };
            Ok(())
        }
        FlatInstr::EndBlock => {
            stacks.labels.pop();
            stacks.frames[frame_idx].ip += 1;
            Ok(())
        }
        FlatInstr::Goto(target) => {
            stacks.frames[frame_idx].ip = target;
            Ok(())
        }
    }
}

fn pop_value(stacks: &mut Stacks) -> Value {
    stacks
        .operands
        .pop()
        .expect("operand stack underflow on well-typed module")
}

fn pop_i32(stacks: &mut Stacks) -> i32 {
    pop_value(stacks)
        .as_i32()
        .expect("type mismatch: expected i32 on well-typed module")
}

fn pop_i64(stacks: &mut Stacks) -> i64 {
    pop_value(stacks)
        .as_i64()
        .expect("type mismatch: expected i64 on well-typed module")
}

fn pop_f32(stacks: &mut Stacks) -> f32 {
    pop_value(stacks)
        .as_f32()
        .expect("type mismatch: expected f32 on well-typed module")
}

fn pop_f64(stacks: &mut Stacks) -> f64 {
    pop_value(stacks)
        .as_f64()
        .expect("type mismatch: expected f64 on well-typed module")
}

fn push(stacks: &mut Stacks, value: impl Into<Value>) -> Result<(), WasmError> {
    stacks
        .push_operand(value.into())
        .map_err(|_| WasmError::from(TrapKind::StackOverflow))
}

/// Branches to the `l`-th enclosing label (0 = innermost). A branch to a
/// `block`/`if` label exits it: keeps the top `arity` operands, truncates the
/// operand stack to the label's captured depth, restores the kept operands,
/// and pops the label stack down to (but not including) the target. A
/// branch to a `loop` label instead re-enters the loop: it carries no
/// operands across the jump (a loop's label type is its parameter arity,
/// always empty here) and the label stays active on the stack for the next
/// iteration, so only labels *inside* the loop are popped (§4.5.2 `br`).
fn do_branch(stacks: &mut Stacks, frame_idx: usize, l: u32) {
    let target_index = stacks.labels.len() - 1 - l as usize;
    let label = stacks.labels[target_index];
    if label.is_loop {
        stacks.operands.truncate(label.saved_operands_len);
        stacks.labels.truncate(target_index + 1);
    } else {
        let arity = label.arity as usize;
        let keep = stacks.operands.split_off(stacks.operands.len() - arity);
        stacks.operands.truncate(label.saved_operands_len);
        stacks.operands.extend(keep);
        stacks.labels.truncate(target_index);
    }
    stacks.frames[frame_idx].ip = label.continuation_ip;
}

/// `return`: behaves as a branch to the outermost label of the current
/// frame, then pops the frame, resuming the caller (whose `ip` was already
/// advanced past the `call` before this frame was pushed) with `arity`
/// values pushed.
fn do_return(stacks: &mut Stacks) {
    let frame = stacks.frames.pop().expect("return with no active frame");
    let arity = frame.arity as usize;
    let keep = stacks.operands.split_off(stacks.operands.len() - arity);
    stacks.operands.truncate(frame.operand_base);
    stacks.operands.extend(keep);
    stacks.labels.truncate(frame.label_base);
}

/// Shared tail of `call` and `call_indirect`: dispatches to a host callable
/// inline, or pushes a new activation for a module function.
fn perform_call(
    store: &mut Store,
    stacks: &mut Stacks,
    caller_module: &Rc<ModuleInstance>,
    func_addr: FuncAddr,
) -> Result<(), WasmError> {
    enum Callee {
        Host(FunctionType, HostCallable),
        Module(FunctionType, Rc<ModuleInstance>, Rc<FunctionBody>),
    }

    let callee = match &store.functions[func_addr.0] {
        FunctionInstance::Host { ty, callable } => Callee::Host(ty.clone(), Rc::clone(callable)),
        FunctionInstance::Module { ty, module, body } => {
            Callee::Module(ty.clone(), Rc::clone(module), Rc::clone(body))
        }
    };

    match callee {
        Callee::Host(ty, callable) => {
            let param_count = ty.params.len();
            let start = stacks.operands.len() - param_count;
            let args = stacks.operands.split_off(start);
            let mem_addr = caller_module.mem_addrs.first().copied();
            let mem_ref = mem_addr.map(|addr| &mut store.memories[addr.index()]);
            let ctx = HostContext::new(mem_ref);
            let result = callable(&args, ctx).map_err(WasmError::HostError)?;
            if let Some(v) = result {
                push(stacks, v)?;
            }
            Ok(())
        }
        Callee::Module(ty, callee_module, body) => {
            let param_count = ty.params.len();
            let start = stacks.operands.len() - param_count;
            let mut locals = stacks.operands.split_off(start);
            locals.extend(body.locals.iter().map(|t| zero_value(*t)));
            let frame = Frame {
                arity: ty.result.is_some() as u8,
                locals,
                module: callee_module,
                func_addr,
                ip: 0,
                label_base: stacks.labels.len(),
                operand_base: stacks.operands.len(),
            };
            stacks
                .push_frame(frame)
                .map_err(|_| WasmError::from(TrapKind::StackOverflow))
        }
    }
}

fn effective_address(dynamic: i32, mem_arg: &MemArg) -> u64 {
    (dynamic as u32 as u64) + mem_arg.offset as u64
}

macro_rules! int_load {
    ($store:expr, $module:expr, $stacks:expr, $mem_arg:expr, $width:expr, $signed:expr, $as_i32:expr) => {{
        let dyn_addr = pop_i32($stacks);
        let ea = effective_address(dyn_addr, $mem_arg);
        let mem_addr = $module.mem_addrs[0];
        let value = $store.memories[mem_addr.index()].read_int(ea, $width, $signed)?;
        if $as_i32 {
            push($stacks, value as i32)?;
        } else {
            push($stacks, value)?;
        }
    }};
}

macro_rules! int_store {
    ($store:expr, $module:expr, $stacks:expr, $mem_arg:expr, $width:expr, $value:expr) => {{
        let value = $value;
        let dyn_addr = pop_i32($stacks);
        let ea = effective_address(dyn_addr, $mem_arg);
        let mem_addr = $module.mem_addrs[0];
        $store.memories[mem_addr.index()].write_int(ea, $width, value)?;
    }};
}

#[allow(clippy::too_many_lines)]
fn exec_plain(
    store: &mut Store,
    stacks: &mut Stacks,
    frame_idx: usize,
    module: &Rc<ModuleInstance>,
    instr: Instr,
) -> Result<(), WasmError> {
    use Instr::*;

    // Control-flow and call instructions manage `frame.ip` (and the frame
    // stack) themselves; every other instruction falls through to the tail
    // of this function, which advances `ip` by one.
    match &instr {
        Unreachable => return Err(WasmError::from(TrapKind::Unreachable)),
        Br(l) => {
            do_branch(stacks, frame_idx, *l);
            return Ok(());
        }
        BrIf(l) => {
            let cond = pop_i32(stacks);
            if cond != 0 {
                do_branch(stacks, frame_idx, *l);
            } else {
                stacks.frames[frame_idx].ip += 1;
            }
            return Ok(());
        }
        BrTable(targets, default) => {
            let i = pop_i32(stacks);
            let l = targets
                .get(i as usize)
                .copied()
                .unwrap_or(*default);
            do_branch(stacks, frame_idx, l);
            return Ok(());
        }
        Return => {
            do_return(stacks);
            return Ok(());
        }
        Call(idx) => {
            stacks.frames[frame_idx].ip += 1;
            let func_addr = module.func_addrs[*idx as usize];
            perform_call(store, stacks, module, func_addr)?;
            return Ok(());
        }
        CallIndirect(ty_idx) => {
            stacks.frames[frame_idx].ip += 1;
            let i = pop_i32(stacks);
            let table_addr = *module
                .table_addrs
                .first()
                .ok_or(WasmError::from(TrapKind::OutOfBoundsTableAccess))?;
            let func_addr = store.tables[table_addr.index()]
                .get(i as u32)?
                .ok_or(WasmError::from(TrapKind::UninitializedElement))?;
            let declared = &module.types[*ty_idx as usize];
            if store.functions[func_addr.index()].function_type() != declared {
                return Err(WasmError::from(TrapKind::IndirectCallTypeMismatch));
            }
            perform_call(store, stacks, module, func_addr)?;
            return Ok(());
        }
        _ => {}
    }

    match instr {
        Nop => {}

        Drop => {
            pop_value(stacks);
        }
        Select => {
            let cond = pop_i32(stacks);
            let v2 = pop_value(stacks);
            let v1 = pop_value(stacks);
            push(stacks, if cond != 0 { v1 } else { v2 })?;
        }

        LocalGet(i) => {
            let v = stacks.frames[frame_idx].locals[i as usize];
            push(stacks, v)?;
        }
        LocalSet(i) => {
            let v = pop_value(stacks);
            stacks.frames[frame_idx].locals[i as usize] = v;
        }
        LocalTee(i) => {
            let v = *stacks.operands.last().expect("operand stack underflow");
            stacks.frames[frame_idx].locals[i as usize] = v;
        }
        GlobalGet(i) => {
            let addr = module.global_addrs[i as usize];
            let v = store.globals[addr.index()].get();
            push(stacks, v)?;
        }
        GlobalSet(i) => {
            let v = pop_value(stacks);
            let addr = module.global_addrs[i as usize];
            store.globals[addr.index()]
                .set(v)
                .expect("global.set on an immutable global should have been rejected by validation");
        }

        I32Load(m) => int_load!(store, module, stacks, &m, 4, false, true),
        I32Load8S(m) => int_load!(store, module, stacks, &m, 1, true, true),
        I32Load8U(m) => int_load!(store, module, stacks, &m, 1, false, true),
        I32Load16S(m) => int_load!(store, module, stacks, &m, 2, true, true),
        I32Load16U(m) => int_load!(store, module, stacks, &m, 2, false, true),
        I64Load(m) => int_load!(store, module, stacks, &m, 8, false, false),
        I64Load8S(m) => int_load!(store, module, stacks, &m, 1, true, false),
        I64Load8U(m) => int_load!(store, module, stacks, &m, 1, false, false),
        I64Load16S(m) => int_load!(store, module, stacks, &m, 2, true, false),
        I64Load16U(m) => int_load!(store, module, stacks, &m, 2, false, false),
        I64Load32S(m) => int_load!(store, module, stacks, &m, 4, true, false),
        I64Load32U(m) => int_load!(store, module, stacks, &m, 4, false, false),

        F32Load(m) => {
            let dyn_addr = pop_i32(stacks);
            let ea = effective_address(dyn_addr, &m);
            let addr = module.mem_addrs[0];
            let v = store.memories[addr.index()].read_float(ea, 4)? as f32;
            push(stacks, v)?;
        }
        F64Load(m) => {
            let dyn_addr = pop_i32(stacks);
            let ea = effective_address(dyn_addr, &m);
            let addr = module.mem_addrs[0];
            let v = store.memories[addr.index()].read_float(ea, 8)?;
            push(stacks, v)?;
        }

        I32Store(m) => int_store!(store, module, stacks, &m, 4, { let v = pop_i32(stacks); v as i64 }),
        I32Store8(m) => int_store!(store, module, stacks, &m, 1, { let v = pop_i32(stacks); v as i64 }),
        I32Store16(m) => int_store!(store, module, stacks, &m, 2, { let v = pop_i32(stacks); v as i64 }),
        I64Store(m) => int_store!(store, module, stacks, &m, 8, pop_i64(stacks)),
        I64Store8(m) => int_store!(store, module, stacks, &m, 1, pop_i64(stacks)),
        I64Store16(m) => int_store!(store, module, stacks, &m, 2, pop_i64(stacks)),
        I64Store32(m) => int_store!(store, module, stacks, &m, 4, pop_i64(stacks)),

        F32Store(m) => {
            let v = pop_f32(stacks);
            let dyn_addr = pop_i32(stacks);
            let ea = effective_address(dyn_addr, &m);
            let addr = module.mem_addrs[0];
            store.memories[addr.index()].write_float(ea, 4, v as f64)?;
        }
        F64Store(m) => {
            let v = pop_f64(stacks);
            let dyn_addr = pop_i32(stacks);
            let ea = effective_address(dyn_addr, &m);
            let addr = module.mem_addrs[0];
            store.memories[addr.index()].write_float(ea, 8, v)?;
        }

        MemorySize => {
            let addr = module.mem_addrs[0];
            push(stacks, store.memories[addr.index()].size() as i32)?;
        }
        MemoryGrow => {
            let delta = pop_i32(stacks);
            let addr = module.mem_addrs[0];
            let prev = store.memories[addr.index()].grow(delta as u32);
            push(stacks, prev)?;
        }

        I32Const(v) => push(stacks, v)?,
        I64Const(v) => push(stacks, v)?,
        F32Const(v) => push(stacks, v)?,
        F64Const(v) => push(stacks, v)?,

        I32Eqz => {
            let a = pop_i32(stacks);
            push(stacks, numeric::bool_to_i32(a == 0))?;
        }
        I32Eq => bin_cmp_i32(stacks, |a, b| a == b)?,
        I32Ne => bin_cmp_i32(stacks, |a, b| a != b)?,
        I32LtS => bin_cmp_i32(stacks, |a, b| a < b)?,
        I32LtU => bin_cmp_i32(stacks, numeric::i32_lt_u)?,
        I32GtS => bin_cmp_i32(stacks, |a, b| a > b)?,
        I32GtU => bin_cmp_i32(stacks, numeric::i32_gt_u)?,
        I32LeS => bin_cmp_i32(stacks, |a, b| a <= b)?,
        I32LeU => bin_cmp_i32(stacks, numeric::i32_le_u)?,
        I32GeS => bin_cmp_i32(stacks, |a, b| a >= b)?,
        I32GeU => bin_cmp_i32(stacks, numeric::i32_ge_u)?,

        I64Eqz => {
            let a = pop_i64(stacks);
            push(stacks, numeric::bool_to_i32(a == 0))?;
        }
        I64Eq => bin_cmp_i64(stacks, |a, b| a == b)?,
        I64Ne => bin_cmp_i64(stacks, |a, b| a != b)?,
        I64LtS => bin_cmp_i64(stacks, |a, b| a < b)?,
        I64LtU => bin_cmp_i64(stacks, numeric::i64_lt_u)?,
        I64GtS => bin_cmp_i64(stacks, |a, b| a > b)?,
        I64GtU => bin_cmp_i64(stacks, numeric::i64_gt_u)?,
        I64LeS => bin_cmp_i64(stacks, |a, b| a <= b)?,
        I64LeU => bin_cmp_i64(stacks, numeric::i64_le_u)?,
        I64GeS => bin_cmp_i64(stacks, |a, b| a >= b)?,
        I64GeU => bin_cmp_i64(stacks, numeric::i64_ge_u)?,

        F32Eq => bin_cmp_f32(stacks, |a, b| a == b)?,
        F32Ne => bin_cmp_f32(stacks, |a, b| a != b)?,
        F32Lt => bin_cmp_f32(stacks, |a, b| a < b)?,
        F32Gt => bin_cmp_f32(stacks, |a, b| a > b)?,
        F32Le => bin_cmp_f32(stacks, |a, b| a <= b)?,
        F32Ge => bin_cmp_f32(stacks, |a, b| a >= b)?,
        F64Eq => bin_cmp_f64(stacks, |a, b| a == b)?,
        F64Ne => bin_cmp_f64(stacks, |a, b| a != b)?,
        F64Lt => bin_cmp_f64(stacks, |a, b| a < b)?,
        F64Gt => bin_cmp_f64(stacks, |a, b| a > b)?,
        F64Le => bin_cmp_f64(stacks, |a, b| a <= b)?,
        F64Ge => bin_cmp_f64(stacks, |a, b| a >= b)?,

        I32Clz => unary_i32(stacks, numeric::i32_clz)?,
        I32Ctz => unary_i32(stacks, numeric::i32_ctz)?,
        I32Popcnt => unary_i32(stacks, numeric::i32_popcnt)?,
        I32Add => bin_i32(stacks, i32::wrapping_add)?,
        I32Sub => bin_i32(stacks, i32::wrapping_sub)?,
        I32Mul => bin_i32(stacks, i32::wrapping_mul)?,
        I32DivS => bin_i32_trap(stacks, numeric::i32_div_s)?,
        I32DivU => bin_i32_trap(stacks, numeric::i32_div_u)?,
        I32RemS => bin_i32_trap(stacks, numeric::i32_rem_s)?,
        I32RemU => bin_i32_trap(stacks, numeric::i32_rem_u)?,
        I32And => bin_i32(stacks, |a, b| a & b)?,
        I32Or => bin_i32(stacks, |a, b| a | b)?,
        I32Xor => bin_i32(stacks, |a, b| a ^ b)?,
        I32Shl => bin_i32(stacks, numeric::i32_shl)?,
        I32ShrS => bin_i32(stacks, numeric::i32_shr_s)?,
        I32ShrU => bin_i32(stacks, numeric::i32_shr_u)?,
        I32Rotl => bin_i32(stacks, numeric::i32_rotl)?,
        I32Rotr => bin_i32(stacks, numeric::i32_rotr)?,

        I64Clz => unary_i64(stacks, numeric::i64_clz)?,
        I64Ctz => unary_i64(stacks, numeric::i64_ctz)?,
        I64Popcnt => unary_i64(stacks, numeric::i64_popcnt)?,
        I64Add => bin_i64(stacks, i64::wrapping_add)?,
        I64Sub => bin_i64(stacks, i64::wrapping_sub)?,
        I64Mul => bin_i64(stacks, i64::wrapping_mul)?,
        I64DivS => bin_i64_trap(stacks, numeric::i64_div_s)?,
        I64DivU => bin_i64_trap(stacks, numeric::i64_div_u)?,
        I64RemS => bin_i64_trap(stacks, numeric::i64_rem_s)?,
        I64RemU => bin_i64_trap(stacks, numeric::i64_rem_u)?,
        I64And => bin_i64(stacks, |a, b| a & b)?,
        I64Or => bin_i64(stacks, |a, b| a | b)?,
        I64Xor => bin_i64(stacks, |a, b| a ^ b)?,
        I64Shl => bin_i64(stacks, numeric::i64_shl)?,
        I64ShrS => bin_i64(stacks, numeric::i64_shr_s)?,
        I64ShrU => bin_i64(stacks, numeric::i64_shr_u)?,
        I64Rotl => bin_i64(stacks, numeric::i64_rotl)?,
        I64Rotr => bin_i64(stacks, numeric::i64_rotr)?,

        F32Abs => unary_f32(stacks, f32::abs)?,
        F32Neg => unary_f32(stacks, |a| -a)?,
        F32Ceil => unary_f32(stacks, f32::ceil)?,
        F32Floor => unary_f32(stacks, f32::floor)?,
        F32Trunc => unary_f32(stacks, f32::trunc)?,
        F32Nearest => unary_f32(stacks, f32::round_ties_even)?,
        F32Sqrt => unary_f32(stacks, f32::sqrt)?,
        F32Add => bin_f32(stacks, |a, b| a + b)?,
        F32Sub => bin_f32(stacks, |a, b| a - b)?,
        F32Mul => bin_f32(stacks, |a, b| a * b)?,
        F32Div => bin_f32(stacks, |a, b| a / b)?,
        F32Min => bin_f32(stacks, numeric::f32_min)?,
        F32Max => bin_f32(stacks, numeric::f32_max)?,
        F32Copysign => bin_f32(stacks, f32::copysign)?,

        F64Abs => unary_f64(stacks, f64::abs)?,
        F64Neg => unary_f64(stacks, |a| -a)?,
        F64Ceil => unary_f64(stacks, f64::ceil)?,
        F64Floor => unary_f64(stacks, f64::floor)?,
        F64Trunc => unary_f64(stacks, f64::trunc)?,
        F64Nearest => unary_f64(stacks, f64::round_ties_even)?,
        F64Sqrt => unary_f64(stacks, f64::sqrt)?,
        F64Add => bin_f64(stacks, |a, b| a + b)?,
        F64Sub => bin_f64(stacks, |a, b| a - b)?,
        F64Mul => bin_f64(stacks, |a, b| a * b)?,
        F64Div => bin_f64(stacks, |a, b| a / b)?,
        F64Min => bin_f64(stacks, numeric::f64_min)?,
        F64Max => bin_f64(stacks, numeric::f64_max)?,
        F64Copysign => bin_f64(stacks, f64::copysign)?,

        I32WrapI64 => {
            let v = pop_i64(stacks);
            push(stacks, numeric::i32_wrap_i64(v))?;
        }
        I64ExtendI32S => {
            let v = pop_i32(stacks);
            push(stacks, numeric::i64_extend_i32_s(v))?;
        }
        I64ExtendI32U => {
            let v = pop_i32(stacks);
            push(stacks, numeric::i64_extend_i32_u(v))?;
        }
        I32Extend8S => unary_i32(stacks, numeric::i32_extend8_s)?,
        I32Extend16S => unary_i32(stacks, numeric::i32_extend16_s)?,
        I64Extend8S => unary_i64(stacks, numeric::i64_extend8_s)?,
        I64Extend16S => unary_i64(stacks, numeric::i64_extend16_s)?,
        I64Extend32S => unary_i64(stacks, numeric::i64_extend32_s)?,

        I32TruncF32S => {
            let v = pop_f32(stacks);
            push(stacks, numeric::i32_trunc_f32_s(v)?)?;
        }
        I32TruncF32U => {
            let v = pop_f32(stacks);
            push(stacks, numeric::i32_trunc_f32_u(v)? as i32)?;
        }
        I32TruncF64S => {
            let v = pop_f64(stacks);
            push(stacks, numeric::i32_trunc_f64_s(v)?)?;
        }
        I32TruncF64U => {
            let v = pop_f64(stacks);
            push(stacks, numeric::i32_trunc_f64_u(v)? as i32)?;
        }
        I64TruncF32S => {
            let v = pop_f32(stacks);
            push(stacks, numeric::i64_trunc_f32_s(v)?)?;
        }
        I64TruncF32U => {
            let v = pop_f32(stacks);
            push(stacks, numeric::i64_trunc_f32_u(v)? as i64)?;
        }
        I64TruncF64S => {
            let v = pop_f64(stacks);
            push(stacks, numeric::i64_trunc_f64_s(v)?)?;
        }
        I64TruncF64U => {
            let v = pop_f64(stacks);
            push(stacks, numeric::i64_trunc_f64_u(v)? as i64)?;
        }

        I32TruncSatF32S => unary_push(stacks, pop_f32, numeric::i32_trunc_sat_f32_s)?,
        I32TruncSatF32U => {
            let v = pop_f32(stacks);
            push(stacks, numeric::i32_trunc_sat_f32_u(v) as i32)?;
        }
        I32TruncSatF64S => unary_push(stacks, pop_f64, numeric::i32_trunc_sat_f64_s)?,
        I32TruncSatF64U => {
            let v = pop_f64(stacks);
            push(stacks, numeric::i32_trunc_sat_f64_u(v) as i32)?;
        }
        I64TruncSatF32S => unary_push(stacks, pop_f32, numeric::i64_trunc_sat_f32_s)?,
        I64TruncSatF32U => {
            let v = pop_f32(stacks);
            push(stacks, numeric::i64_trunc_sat_f32_u(v) as i64)?;
        }
        I64TruncSatF64S => unary_push(stacks, pop_f64, numeric::i64_trunc_sat_f64_s)?,
        I64TruncSatF64U => {
            let v = pop_f64(stacks);
            push(stacks, numeric::i64_trunc_sat_f64_u(v) as i64)?;
        }

        F32ConvertI32S => {
            let v = pop_i32(stacks);
            push(stacks, v as f32)?;
        }
        F32ConvertI32U => {
            let v = pop_i32(stacks);
            push(stacks, (v as u32) as f32)?;
        }
        F32ConvertI64S => {
            let v = pop_i64(stacks);
            push(stacks, v as f32)?;
        }
        F32ConvertI64U => {
            let v = pop_i64(stacks);
            push(stacks, (v as u64) as f32)?;
        }
        F32DemoteF64 => {
            let v = pop_f64(stacks);
            push(stacks, numeric::f32_demote_f64(v))?;
        }
        F64ConvertI32S => {
            let v = pop_i32(stacks);
            push(stacks, v as f64)?;
        }
        F64ConvertI32U => {
            let v = pop_i32(stacks);
            push(stacks, (v as u32) as f64)?;
        }
        F64ConvertI64S => {
            let v = pop_i64(stacks);
            push(stacks, v as f64)?;
        }
        F64ConvertI64U => {
            let v = pop_i64(stacks);
            push(stacks, (v as u64) as f64)?;
        }
        F64PromoteF32 => {
            let v = pop_f32(stacks);
            push(stacks, numeric::f64_promote_f32(v))?;
        }

        I32ReinterpretF32 => {
            let v = pop_f32(stacks);
            push(stacks, v.to_bits() as i32)?;
        }
        I64ReinterpretF64 => {
            let v = pop_f64(stacks);
            push(stacks, v.to_bits() as i64)?;
        }
        F32ReinterpretI32 => {
            let v = pop_i32(stacks);
            push(stacks, f32::from_bits(v as u32))?;
        }
        F64ReinterpretI64 => {
            let v = pop_i64(stacks);
            push(stacks, f64::from_bits(v as u64))?;
        }

        Unreachable | Br(_) | BrIf(_) | BrTable(..) | Return | Call(_) | CallIndirect(_)
        | Block(..) | Loop(..) | If(..) => {
            unreachable!("handled above or not a flattenable leaf instruction")
        }
    }

    stacks.frames[frame_idx].ip += 1;
    Ok(())
}

fn unary_i32(stacks: &mut Stacks, f: impl Fn(i32) -> i32) -> Result<(), WasmError> {
    let a = pop_i32(stacks);
    push(stacks, f(a))
}
fn unary_i64(stacks: &mut Stacks, f: impl Fn(i64) -> i64) -> Result<(), WasmError> {
    let a = pop_i64(stacks);
    push(stacks, f(a))
}
fn unary_f32(stacks: &mut Stacks, f: impl Fn(f32) -> f32) -> Result<(), WasmError> {
    let a = pop_f32(stacks);
    push(stacks, f(a))
}
fn unary_f64(stacks: &mut Stacks, f: impl Fn(f64) -> f64) -> Result<(), WasmError> {
    let a = pop_f64(stacks);
    push(stacks, f(a))
}
fn unary_push<T, R: Into<Value>>(
    stacks: &mut Stacks,
    pop: impl Fn(&mut Stacks) -> T,
    f: impl Fn(T) -> R,
) -> Result<(), WasmError> {
    let a = pop(stacks);
    push(stacks, f(a))
}

fn bin_i32(stacks: &mut Stacks, f: impl Fn(i32, i32) -> i32) -> Result<(), WasmError> {
    let b = pop_i32(stacks);
    let a = pop_i32(stacks);
    push(stacks, f(a, b))
}
fn bin_i64(stacks: &mut Stacks, f: impl Fn(i64, i64) -> i64) -> Result<(), WasmError> {
    let b = pop_i64(stacks);
    let a = pop_i64(stacks);
    push(stacks, f(a, b))
}
fn bin_f32(stacks: &mut Stacks, f: impl Fn(f32, f32) -> f32) -> Result<(), WasmError> {
    let b = pop_f32(stacks);
    let a = pop_f32(stacks);
    push(stacks, f(a, b))
}
fn bin_f64(stacks: &mut Stacks, f: impl Fn(f64, f64) -> f64) -> Result<(), WasmError> {
    let b = pop_f64(stacks);
    let a = pop_f64(stacks);
    push(stacks, f(a, b))
}

fn bin_i32_trap(
    stacks: &mut Stacks,
    f: impl Fn(i32, i32) -> Result<i32, TrapKind>,
) -> Result<(), WasmError> {
    let b = pop_i32(stacks);
    let a = pop_i32(stacks);
    push(stacks, f(a, b)?)
}
fn bin_i64_trap(
    stacks: &mut Stacks,
    f: impl Fn(i64, i64) -> Result<i64, TrapKind>,
) -> Result<(), WasmError> {
    let b = pop_i64(stacks);
    let a = pop_i64(stacks);
    push(stacks, f(a, b)?)
}

fn bin_cmp_i32(stacks: &mut Stacks, f: impl Fn(i32, i32) -> bool) -> Result<(), WasmError> {
    let b = pop_i32(stacks);
    let a = pop_i32(stacks);
    push(stacks, numeric::bool_to_i32(f(a, b)))
}
fn bin_cmp_i64(stacks: &mut Stacks, f: impl Fn(i64, i64) -> bool) -> Result<(), WasmError> {
    let b = pop_i64(stacks);
    let a = pop_i64(stacks);
    push(stacks, numeric::bool_to_i32(f(a, b)))
}
fn bin_cmp_f32(stacks: &mut Stacks, f: impl Fn(f32, f32) -> bool) -> Result<(), WasmError> {
    let b = pop_f32(stacks);
    let a = pop_f32(stacks);
    push(stacks, numeric::bool_to_i32(f(a, b)))
}
fn bin_cmp_f64(stacks: &mut Stacks, f: impl Fn(f64, f64) -> bool) -> Result<(), WasmError> {
    let b = pop_f64(stacks);
    let a = pop_f64(stacks);
    push(stacks, numeric::bool_to_i32(f(a, b)))
}
