use std::rc::Rc;

use wasm_types::Value;

use crate::address::FuncAddr;
use crate::module_instance::ModuleInstance;

/// A branch target: its result arity, where to jump on branch, and the
/// operand-stack depth to truncate to (§3). Capturing the *depth*, not the
/// contents, is what makes `br` an O(1) truncation rather than a copy (§9).
///
/// `is_loop` distinguishes a `loop`'s label from a `block`'s/`if`'s: a branch
/// to a loop label re-enters the loop body and keeps the label active for
/// the next iteration, while a branch to a block label exits the block and
/// pops it.
#[derive(Debug, Clone, Copy)]
pub struct Label {
    pub arity: u8,
    pub continuation_ip: usize,
    pub saved_operands_len: usize,
    pub is_loop: bool,
}

/// An in-progress function call: its locals, the module it executes against,
/// and enough bookkeeping to resume the caller on return (§3).
pub struct Frame {
    pub arity: u8,
    pub locals: Vec<Value>,
    pub module: Rc<ModuleInstance>,
    pub func_addr: FuncAddr,
    pub ip: usize,
    pub label_base: usize,
    pub operand_base: usize,
}

/// The three call-time stacks (§3, §5): operand values, branch labels, and
/// activations. Each has a configurable maximum depth; exceeding it traps
/// with `StackOverflow`.
pub struct Stacks {
    pub operands: Vec<Value>,
    pub labels: Vec<Label>,
    pub frames: Vec<Frame>,
    pub max_depth: usize,
}

impl Stacks {
    pub fn new(max_depth: usize) -> Self {
        Self {
            operands: Vec::new(),
            labels: Vec::new(),
            frames: Vec::new(),
            max_depth,
        }
    }

    pub fn push_operand(&mut self, value: Value) -> Result<(), ()> {
        if self.operands.len() >= self.max_depth {
            return Err(());
        }
        self.operands.push(value);
        Ok(())
    }

    pub fn push_label(&mut self, label: Label) -> Result<(), ()> {
        if self.labels.len() >= self.max_depth {
            return Err(());
        }
        self.labels.push(label);
        Ok(())
    }

    pub fn push_frame(&mut self, frame: Frame) -> Result<(), ()> {
        if self.frames.len() >= self.max_depth {
            return Err(());
        }
        self.frames.push(frame);
        Ok(())
    }
}
