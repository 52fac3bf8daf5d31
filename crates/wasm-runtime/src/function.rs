use std::rc::Rc;

use wasm_types::{FunctionType, Value, ValueType};

use crate::flatten::FlatInstr;
use crate::memory::MemoryInstance;
use crate::module_instance::ModuleInstance;

/// A function's locals declaration plus its flattened code (§3).
pub struct FunctionBody {
    pub locals: Vec<ValueType>,
    pub code: Vec<FlatInstr>,
}

/// The context a host callable executes in: read/write access to the
/// calling module's memory 0, if it has one (§6.3).
pub struct HostContext<'a> {
    memory: Option<&'a mut MemoryInstance>,
}

impl<'a> HostContext<'a> {
    pub fn new(memory: Option<&'a mut MemoryInstance>) -> Self {
        Self { memory }
    }

    pub fn memory(&mut self) -> Option<&mut MemoryInstance> {
        self.memory.as_deref_mut()
    }
}

/// A host-implemented function. Returns `Ok(None)` for a void result,
/// `Ok(Some(value))` matching the declared result type, or an error message
/// that the engine turns into a trap.
pub type HostCallable = Rc<dyn Fn(&[Value], HostContext<'_>) -> Result<Option<Value>, String>>;

/// A function instance: either module-defined code or a host callable bound
/// at import time (§3).
pub enum FunctionInstance {
    Module {
        ty: FunctionType,
        module: Rc<ModuleInstance>,
        body: Rc<FunctionBody>,
    },
    Host {
        ty: FunctionType,
        callable: HostCallable,
    },
}

impl FunctionInstance {
    pub fn function_type(&self) -> &FunctionType {
        match self {
            FunctionInstance::Module { ty, .. } => ty,
            FunctionInstance::Host { ty, .. } => ty,
        }
    }
}
