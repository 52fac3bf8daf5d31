//! The embedder-facing surface (§6.2): build a `Program` out of one or more
//! modules and host bindings, then look up memories, globals, and exported
//! functions by name.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::info;
use wasm_module::Module;
use wasm_runtime::{
    self as runtime, DefaultMemoryProvider, ExternVal, FuncAddr, GlobalAddr, HostCallable,
    HostContext, Imports, MemoryInstance, MemoryProvider, ModuleInstance, Store,
};
use wasm_types::{ForeignValue, FunctionType, Value, WasmError, DEFAULT_MAX_STACK_DEPTH};

/// Where a module's code comes from. Only `Ast` is implemented: text and
/// binary decoding are external frontends this crate does not provide
/// (§1), so an embedder constructs the `Module` itself (typically via
/// `wasm_module::ModuleBuilder`, or its own decoder) and hands it in here.
pub enum ModuleSource {
    Ast(Module),
}

/// Accumulates modules and host bindings, then links them all together in
/// the order they were added.
pub struct ProgramBuilder {
    store: Store,
    memory_provider: Box<dyn MemoryProvider>,
    max_stack_depth: usize,
    imports: Imports,
    pending: Vec<(String, Module)>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self {
            store: Store::new(),
            memory_provider: Box::new(DefaultMemoryProvider),
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            imports: Imports::new(),
            pending: Vec::new(),
        }
    }

    pub fn with_memory_provider(mut self, provider: impl MemoryProvider + 'static) -> Self {
        self.memory_provider = Box::new(provider);
        self
    }

    pub fn with_max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }

    /// Queues a module for instantiation, in the order added. A module can
    /// import from any module queued before it, or from a host item defined
    /// with `host_func`.
    pub fn add_module(&mut self, name: impl Into<String>, source: ModuleSource) -> &mut Self {
        let ModuleSource::Ast(module) = source;
        self.pending.push((name.into(), module));
        self
    }

    /// Registers a host function under `(module, name)`, callable by any
    /// queued module that imports it (§6.3).
    pub fn host_func(
        &mut self,
        module: &str,
        name: &str,
        ty: FunctionType,
        callable: impl Fn(&[Value], HostContext<'_>) -> Result<Option<Value>, String> + 'static,
    ) -> &mut Self {
        let callable: HostCallable = Rc::new(callable);
        self.imports
            .define_host_func(&mut self.store, module, name, ty, callable);
        self
    }

    /// Instantiates every queued module in order, running each one's start
    /// function as it links, and returns the assembled `Program`.
    pub fn build(mut self) -> Result<Program, WasmError> {
        let mut instances: HashMap<String, Rc<ModuleInstance>> = HashMap::new();
        let mut order = Vec::with_capacity(self.pending.len());

        for (name, module) in self.pending {
            let instance = runtime::instantiate(
                &mut self.store,
                self.memory_provider.as_ref(),
                &self.imports,
                &name,
                &module,
                self.max_stack_depth,
            )?;
            self.imports.define_instance(&instance);
            info!(module = %name, "linked module into program");
            order.push(name.clone());
            instances.insert(name, instance);
        }

        Ok(Program {
            store: self.store,
            instances,
            order,
            max_stack_depth: self.max_stack_depth,
        })
    }
}

impl Default for ProgramBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A linked, ready-to-run collection of module instances sharing one store.
pub struct Program {
    store: Store,
    instances: HashMap<String, Rc<ModuleInstance>>,
    order: Vec<String>,
    max_stack_depth: usize,
}

impl Program {
    pub fn builder() -> ProgramBuilder {
        ProgramBuilder::new()
    }

    fn instance(&self, module: &str) -> Result<&Rc<ModuleInstance>, WasmError> {
        self.instances
            .get(module)
            .ok_or_else(|| WasmError::ExportNotFound {
                module: module.to_owned(),
                name: String::new(),
            })
    }

    /// The first exported memory across modules, in the order they were
    /// added to the builder (§6.2).
    pub fn get_memory(&mut self) -> Option<MemoryHandle<'_>> {
        let addr = self.order.iter().find_map(|name| {
            let instance = &self.instances[name];
            instance.exports.iter().find_map(|e| match e.target {
                ExternVal::Memory(a) => Some(a),
                _ => None,
            })
        })?;
        Some(MemoryHandle {
            memory: &mut self.store.memories[addr.index()],
        })
    }

    pub fn get_global(&self, module: &str, name: &str) -> Result<ForeignValue, WasmError> {
        let addr = self.find_export_global(module, name)?;
        Ok(self.store.globals[addr.index()].get().into())
    }

    pub fn set_global(&mut self, module: &str, name: &str, value: ForeignValue) -> Result<(), WasmError> {
        let addr = self.find_export_global(module, name)?;
        self.store.globals[addr.index()]
            .set(Value::from(value))
            .map_err(|_| WasmError::ImmutableGlobal {
                module: module.to_owned(),
                name: name.to_owned(),
            })
    }

    fn find_export_global(&self, module: &str, name: &str) -> Result<GlobalAddr, WasmError> {
        let instance = self.instance(module)?;
        match instance.find_export(name) {
            Some(e) => match e.target {
                ExternVal::Global(a) => Ok(a),
                _ => Err(not_found(module, name)),
            },
            None => Err(not_found(module, name)),
        }
    }

    /// Looks up an exported function by name, returning a handle borrowing
    /// this program's store for the duration of any `invoke` call (§6.2).
    pub fn get_function(&mut self, module: &str, name: &str) -> Result<ExportedFunction<'_>, WasmError> {
        let instance = self.instance(module)?;
        let target = match instance.find_export(name) {
            Some(e) => e.target,
            None => return Err(not_found(module, name)),
        };
        let func_addr = match target {
            ExternVal::Func(a) => a,
            _ => return Err(not_found(module, name)),
        };
        let ty = self.store.functions[func_addr.index()].function_type().clone();
        Ok(ExportedFunction {
            program: self,
            func_addr,
            ty,
        })
    }
}

fn not_found(module: &str, name: &str) -> WasmError {
    WasmError::ExportNotFound {
        module: module.to_owned(),
        name: name.to_owned(),
    }
}

/// A borrowed view over one module's linear memory (§6.2, §6.3).
pub struct MemoryHandle<'a> {
    memory: &'a mut MemoryInstance,
}

impl<'a> MemoryHandle<'a> {
    pub fn size_pages(&self) -> u32 {
        self.memory.size()
    }

    pub fn read_bytes(&self, offset: u64, len: usize) -> Result<&[u8], WasmError> {
        self.memory.read_bytes(offset, len).map_err(Into::into)
    }

    pub fn write_bytes(&mut self, offset: u64, src: &[u8]) -> Result<(), WasmError> {
        self.memory.write_bytes(offset, src).map_err(Into::into)
    }

    pub fn read_int(&self, offset: u64, width: u8, signed: bool) -> Result<i64, WasmError> {
        self.memory.read_int(offset, width, signed).map_err(Into::into)
    }

    pub fn write_int(&mut self, offset: u64, width: u8, value: i64) -> Result<(), WasmError> {
        self.memory.write_int(offset, width, value).map_err(Into::into)
    }
}

impl<'a> From<&'a mut MemoryInstance> for MemoryHandle<'a> {
    fn from(memory: &'a mut MemoryInstance) -> Self {
        Self { memory }
    }
}

/// A resolved exported function, ready to be invoked any number of times
/// (§6.2).
pub struct ExportedFunction<'a> {
    program: &'a mut Program,
    func_addr: FuncAddr,
    ty: FunctionType,
}

impl<'a> ExportedFunction<'a> {
    pub fn signature(&self) -> String {
        let params = self
            .ty
            .params
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        match &self.ty.result {
            Some(r) => format!("({params}) -> {r}"),
            None => format!("({params})"),
        }
    }

    pub fn arg_count(&self) -> usize {
        self.ty.params.len()
    }

    /// Invokes the function, validating argument arity and type before
    /// entering the engine (§4.5.3 step 1) and surfacing traps verbatim
    /// (§6.2).
    pub fn invoke(&mut self, args: &[ForeignValue]) -> Result<Option<ForeignValue>, WasmError> {
        if args.len() != self.ty.params.len() {
            return Err(WasmError::InvalidArgument(format!(
                "expected {} argument(s), got {}",
                self.ty.params.len(),
                args.len()
            )));
        }
        let values: Vec<Value> = args.iter().map(|a| Value::from(*a)).collect();
        if !self.ty.matches_values(&values) {
            return Err(WasmError::InvalidArgument(
                "argument type mismatch".to_owned(),
            ));
        }
        let results = runtime::call_function(
            &mut self.program.store,
            self.program.max_stack_depth,
            self.func_addr,
            &values,
        )?;
        Ok(results.into_iter().next().map(ForeignValue::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use wasm_module::{ConstExpr, GlobalType, Instr, ModuleBuilder};
    use wasm_types::ValueType;

    #[test]
    fn s1_arithmetic_export() {
        let mut builder = ModuleBuilder::new();
        let ty = builder.add_type(FunctionType::new(
            vec![ValueType::I32, ValueType::I32],
            Some(ValueType::I32),
        ));
        let add = builder.add_function(
            ty,
            vec![],
            vec![Instr::LocalGet(0), Instr::LocalGet(1), Instr::I32Add, Instr::Return],
        );
        builder.export_func("add", add);
        let mut b = Program::builder();
        b.add_module("m", ModuleSource::Ast(builder.build()));
        let mut program = b.build().unwrap();

        let mut add_fn = program.get_function("m", "add").unwrap();
        assert_eq!(add_fn.arg_count(), 2);
        assert_eq!(
            add_fn.invoke(&[ForeignValue::I32(1337), ForeignValue::I32(42)]).unwrap(),
            Some(ForeignValue::I32(1379))
        );
        assert_eq!(
            add_fn
                .invoke(&[ForeignValue::I32(i32::MIN), ForeignValue::I32(-1)])
                .unwrap(),
            Some(ForeignValue::I32(i32::MAX))
        );
    }

    #[test]
    fn s4_trap_on_divide_by_zero_and_overflow() {
        let mut builder = ModuleBuilder::new();
        let ty = builder.add_type(FunctionType::new(
            vec![ValueType::I32, ValueType::I32],
            Some(ValueType::I32),
        ));
        let div = builder.add_function(
            ty,
            vec![],
            vec![Instr::LocalGet(0), Instr::LocalGet(1), Instr::I32DivS, Instr::Return],
        );
        builder.export_func("div", div);
        let mut b = Program::builder();
        b.add_module("m", ModuleSource::Ast(builder.build()));
        let mut program = b.build().unwrap();

        let mut div_fn = program.get_function("m", "div").unwrap();
        let err = div_fn
            .invoke(&[ForeignValue::I32(7), ForeignValue::I32(0)])
            .unwrap_err();
        assert!(matches!(err, WasmError::Trap(t) if t.kind == wasm_types::trap::TrapKind::IntegerDivideByZero));

        let err = div_fn
            .invoke(&[ForeignValue::I32(i32::MIN), ForeignValue::I32(-1)])
            .unwrap_err();
        assert!(matches!(err, WasmError::Trap(t) if t.kind == wasm_types::trap::TrapKind::IntegerOverflow));
    }

    #[test]
    fn s3_call_indirect_dispatches_and_traps_out_of_bounds() {
        let mut builder = ModuleBuilder::new();
        let binop_ty = builder.add_type(FunctionType::new(
            vec![ValueType::I32, ValueType::I32],
            Some(ValueType::I32),
        ));
        let add = builder.add_function(
            binop_ty,
            vec![],
            vec![Instr::LocalGet(0), Instr::LocalGet(1), Instr::I32Add, Instr::Return],
        );
        let sub = builder.add_function(
            binop_ty,
            vec![],
            vec![Instr::LocalGet(0), Instr::LocalGet(1), Instr::I32Sub, Instr::Return],
        );
        builder.add_table(wasm_module::TableType { min: 2, max: Some(2) });
        builder.add_element(0, ConstExpr::I32Const(0), vec![add, sub]);

        let run_ty = builder.add_type(FunctionType::new(
            vec![ValueType::I32, ValueType::I32, ValueType::I32],
            Some(ValueType::I32),
        ));
        let run = builder.add_function(
            run_ty,
            vec![],
            vec![
                Instr::LocalGet(1),
                Instr::LocalGet(2),
                Instr::LocalGet(0),
                Instr::CallIndirect(binop_ty),
                Instr::Return,
            ],
        );
        builder.export_func("run", run);

        let mut b = Program::builder();
        b.add_module("m", ModuleSource::Ast(builder.build()));
        let mut program = b.build().unwrap();

        let mut run_fn = program.get_function("m", "run").unwrap();
        assert_eq!(
            run_fn
                .invoke(&[ForeignValue::I32(0), ForeignValue::I32(10), ForeignValue::I32(4)])
                .unwrap(),
            Some(ForeignValue::I32(14))
        );
        assert_eq!(
            run_fn
                .invoke(&[ForeignValue::I32(1), ForeignValue::I32(10), ForeignValue::I32(4)])
                .unwrap(),
            Some(ForeignValue::I32(6))
        );
        let err = run_fn
            .invoke(&[ForeignValue::I32(2), ForeignValue::I32(0), ForeignValue::I32(0)])
            .unwrap_err();
        assert!(matches!(err, WasmError::Trap(t) if t.kind == wasm_types::trap::TrapKind::OutOfBoundsTableAccess));
    }

    #[test]
    fn s5_host_import_records_arguments_in_order() {
        let mut builder = ModuleBuilder::new();
        let print_ty = builder.add_type(FunctionType::new(vec![ValueType::I32], None));
        let print_idx = builder.import_func("env", "print", print_ty);
        let doit_ty = builder.add_type(FunctionType::new(vec![], None));
        let doit = builder.add_function(
            doit_ty,
            vec![],
            vec![
                Instr::I32Const(1),
                Instr::Call(print_idx),
                Instr::I32Const(2),
                Instr::Call(print_idx),
                Instr::Return,
            ],
        );
        builder.export_func("doit", doit);

        let recorded = Rc::new(RefCell::new(Vec::new()));
        let recorded_clone = Rc::clone(&recorded);

        let mut b = Program::builder();
        b.host_func("env", "print", FunctionType::new(vec![ValueType::I32], None), move |args, _ctx| {
            recorded_clone.borrow_mut().push(args[0].as_i32().unwrap());
            Ok(None)
        });
        b.add_module("m", ModuleSource::Ast(builder.build()));
        let mut program = b.build().unwrap();

        program.get_function("m", "doit").unwrap().invoke(&[]).unwrap();
        assert_eq!(*recorded.borrow(), vec![1, 2]);
    }

    #[test]
    fn s6_start_function_side_effect_visible_before_any_call() {
        let mut builder = ModuleBuilder::new();
        let global = builder.add_global(
            GlobalType {
                value_type: ValueType::I32,
                mutable: true,
            },
            ConstExpr::I32Const(0),
        );
        let ty = builder.add_type(FunctionType::new(vec![], None));
        let start = builder.add_function(
            ty,
            vec![],
            vec![Instr::I32Const(42), Instr::GlobalSet(global), Instr::Return],
        );
        builder.set_start(start);
        builder.export_global("g", global);

        let mut b = Program::builder();
        b.add_module("m", ModuleSource::Ast(builder.build()));
        let program = b.build().unwrap();

        assert_eq!(program.get_global("m", "g").unwrap(), ForeignValue::I32(42));
    }

    #[test]
    fn loop_branch_sums_while_true_across_multiple_iterations() {
        let mut builder = ModuleBuilder::new();
        let ty = builder.add_type(FunctionType::new(vec![ValueType::I32], Some(ValueType::I32)));
        // locals: 0 = n (param), 1 = i, 2 = acc
        let sum_up_to = builder.add_function(
            ty,
            vec![ValueType::I32, ValueType::I32],
            vec![
                Instr::I32Const(0),
                Instr::LocalSet(1),
                Instr::I32Const(0),
                Instr::LocalSet(2),
                Instr::Loop(
                    None,
                    vec![
                        Instr::LocalGet(1),
                        Instr::I32Const(1),
                        Instr::I32Add,
                        Instr::LocalSet(1),
                        Instr::LocalGet(2),
                        Instr::LocalGet(1),
                        Instr::I32Add,
                        Instr::LocalSet(2),
                        Instr::LocalGet(1),
                        Instr::LocalGet(0),
                        Instr::I32LtS,
                        Instr::BrIf(0),
                    ],
                ),
                Instr::LocalGet(2),
                Instr::Return,
            ],
        );
        builder.export_func("sum_up_to", sum_up_to);
        let mut b = Program::builder();
        b.add_module("m", ModuleSource::Ast(builder.build()));
        let mut program = b.build().unwrap();

        let mut sum_fn = program.get_function("m", "sum_up_to").unwrap();
        assert_eq!(
            sum_fn.invoke(&[ForeignValue::I32(5)]).unwrap(),
            Some(ForeignValue::I32(15))
        );
        assert_eq!(
            sum_fn.invoke(&[ForeignValue::I32(1)]).unwrap(),
            Some(ForeignValue::I32(1))
        );
    }

    #[test]
    fn start_function_honors_configured_max_stack_depth() {
        let mut builder = ModuleBuilder::new();
        let ty = builder.add_type(FunctionType::new(vec![], None));
        let recurse = builder.add_function(ty, vec![], vec![Instr::Call(0), Instr::Return]);
        builder.set_start(recurse);

        let mut b = Program::builder().with_max_stack_depth(4);
        b.add_module("m", ModuleSource::Ast(builder.build()));
        let err = b.build().unwrap_err();
        assert!(matches!(err, WasmError::Trap(t) if t.kind == wasm_types::trap::TrapKind::StackOverflow));
    }

    #[test]
    fn memory_handle_reads_writes_set_by_exported_store() {
        let mut builder = ModuleBuilder::new();
        builder.add_memory(wasm_module::MemoryType { min: 1, max: None });
        let store_ty = builder.add_type(FunctionType::new(
            vec![ValueType::I32, ValueType::I32],
            None,
        ));
        let store_fn = builder.add_function(
            store_ty,
            vec![],
            vec![
                Instr::LocalGet(0),
                Instr::LocalGet(1),
                Instr::I32Store(wasm_module::MemArg { align: 2, offset: 0 }),
                Instr::Return,
            ],
        );
        builder.export_func("store", store_fn);
        builder.export_memory("mem", 0);

        let mut b = Program::builder();
        b.add_module("m", ModuleSource::Ast(builder.build()));
        let mut program = b.build().unwrap();

        program
            .get_function("m", "store")
            .unwrap()
            .invoke(&[ForeignValue::I32(4), ForeignValue::I32(0xDEADBEEFu32 as i32)])
            .unwrap();

        let mem = program.get_memory().unwrap();
        assert_eq!(mem.read_int(4, 4, false).unwrap(), 0xDEADBEEFu32 as i64);
    }
}
