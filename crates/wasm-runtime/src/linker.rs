//! Instantiation and linking (§4.6): allocates every store entry a module
//! declares, resolves its imports against a set of already-instantiated
//! modules and loose host bindings, evaluates global initializers and
//! element/data segment offsets, writes the segments, and runs the start
//! function.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, instrument, trace};
use wasm_module::{ConstExpr, ExportDesc, ImportDesc, Module};
use wasm_types::{FunctionType, Value, WasmError};

use crate::address::{ExternVal, FuncAddr, GlobalAddr, MemAddr, TableAddr};
use crate::engine;
use crate::flatten::flatten_function_body;
use crate::function::{FunctionBody, FunctionInstance, HostCallable};
use crate::module_instance::{ExportInstance, ModuleInstance};
use crate::store::{MemoryProvider, Store};

/// A bindable external item: either something already sitting in the store
/// under another module's instance, or a loose host function/global handed
/// to the linker directly (§6.3).
#[derive(Clone)]
pub enum Extern {
    Func(FuncAddr),
    Table(TableAddr),
    Memory(MemAddr),
    Global(GlobalAddr),
}

/// A resolver the linker consults for each import, in declaration order.
/// The embedder typically backs this with a `HashMap<(String, String),
/// Extern>` built from previously instantiated modules' exports plus any
/// host functions it registers directly.
pub trait ImportResolver {
    fn resolve(&self, module: &str, name: &str) -> Option<Extern>;
}

/// The common case: a flat map keyed by `(module, name)`.
#[derive(Default)]
pub struct Imports {
    bindings: HashMap<(String, String), Extern>,
}

impl Imports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, module: &str, name: &str, value: Extern) -> &mut Self {
        self.bindings
            .insert((module.to_owned(), name.to_owned()), value);
        self
    }

    /// Registers a host function under the given signature, wiring it up as
    /// a `FunctionInstance::Host` the first time it is bound (§6.3).
    pub fn define_host_func(
        &mut self,
        store: &mut Store,
        module: &str,
        name: &str,
        ty: FunctionType,
        callable: HostCallable,
    ) -> &mut Self {
        let addr = store.allocate_function(FunctionInstance::Host { ty, callable });
        self.define(module, name, Extern::Func(addr))
    }

    /// Re-exposes every export of an already-instantiated module under its
    /// own name, the common "import the whole module" pattern.
    pub fn define_instance(&mut self, instance: &Rc<ModuleInstance>) -> &mut Self {
        for export in &instance.exports {
            let value = match export.target {
                ExternVal::Func(a) => Extern::Func(a),
                ExternVal::Table(a) => Extern::Table(a),
                ExternVal::Memory(a) => Extern::Memory(a),
                ExternVal::Global(a) => Extern::Global(a),
            };
            self.define(&instance.name, &export.name, value);
        }
    }
}

impl ImportResolver for Imports {
    fn resolve(&self, module: &str, name: &str) -> Option<Extern> {
        self.bindings.get(&(module.to_owned(), name.to_owned())).cloned()
    }
}

/// Instantiates `module`, allocating and linking every declared item into
/// `store`, per the thirteen steps of §4.6. Returns the resulting instance,
/// already registered in `store`'s name for future `Imports::define_instance`
/// calls. `max_stack_depth` bounds the start function's own call, matching
/// the embedder's configured limit for every other call into the module.
#[instrument(level = "debug", skip_all, fields(module = %name))]
pub fn instantiate(
    store: &mut Store,
    memory_provider: &dyn MemoryProvider,
    resolver: &dyn ImportResolver,
    name: &str,
    module: &Module,
    max_stack_depth: usize,
) -> Result<Rc<ModuleInstance>, WasmError> {
    let mut func_addrs = Vec::with_capacity(module.func_count());
    let mut table_addrs = Vec::with_capacity(module.table_count());
    let mut mem_addrs = Vec::with_capacity(module.memory_count());
    let mut global_addrs = Vec::with_capacity(module.global_count());

    // Step 1-4: resolve imports in declaration order, populating the front
    // of each index space before the module's own definitions.
    for import in &module.imports {
        let bound = resolver
            .resolve(&import.module, &import.name)
            .ok_or_else(|| WasmError::ImportNotFound {
                module: import.module.clone(),
                name: import.name.clone(),
            })?;
        match (&import.desc, bound) {
            (ImportDesc::Func(type_idx), Extern::Func(addr)) => {
                let expected = &module.types[*type_idx as usize];
                let actual = store.functions[addr.index()].function_type();
                if actual != expected {
                    return Err(mismatch(import, "function signature"));
                }
                func_addrs.push(addr);
            }
            (ImportDesc::Table(tt), Extern::Table(addr)) => {
                let table = &store.tables[addr.index()];
                if table.length() < tt.min || exceeds_declared_max(tt.max, table.max()) {
                    return Err(mismatch(import, "table limits"));
                }
                table_addrs.push(addr);
            }
            (ImportDesc::Memory(mt), Extern::Memory(addr)) => {
                let memory = &store.memories[addr.index()];
                if memory.size() < mt.min {
                    return Err(mismatch(import, "memory limits"));
                }
                mem_addrs.push(addr);
            }
            (ImportDesc::Global(gt), Extern::Global(addr)) => {
                let global = &store.globals[addr.index()];
                if global.value_type() != gt.value_type || global.is_mutable() != gt.mutable {
                    return Err(mismatch(import, "global type"));
                }
                global_addrs.push(addr);
            }
            _ => return Err(mismatch(import, "extern kind")),
        }
    }

    // Step 5: allocate the module's own tables and memories.
    for tt in &module.tables {
        table_addrs.push(store.allocate_table(tt.min, tt.max));
    }
    for mt in &module.memories {
        mem_addrs.push(store.allocate_memory(memory_provider, mt.min, mt.max)?);
    }

    // Step 6: evaluate each global initializer. The imported globals used by
    // `global.get` const-exprs are already live in `global_addrs`.
    for def in &module.globals {
        let value = eval_const_expr(store, &global_addrs, def.init);
        global_addrs.push(store.allocate_global(value, def.global_type.mutable));
    }

    // Building `ModuleInstance` requires `func_addrs` to already cover
    // imported functions; module-defined functions are allocated next,
    // referencing a placeholder `Rc<ModuleInstance>` is impossible before
    // the instance exists, so we build the instance first with only
    // `types`/addrs filled in, then allocate function bodies against it.
    let instance = Rc::new(ModuleInstance {
        name: name.to_owned(),
        types: module.types.clone(),
        func_addrs: func_addrs.clone(),
        table_addrs: table_addrs.clone(),
        mem_addrs: mem_addrs.clone(),
        global_addrs: global_addrs.clone(),
        exports: Vec::new(),
    });

    // Step 7: allocate module-defined functions, flattening their bodies
    // once up front (§4.5.1) so the engine never re-walks structured syntax.
    for def in &module.functions {
        let ty = module.types[def.type_index as usize].clone();
        let body = Rc::new(FunctionBody {
            locals: def.locals.clone(),
            code: flatten_function_body(&def.body),
        });
        let addr = store.allocate_function(FunctionInstance::Module {
            ty,
            module: Rc::clone(&instance),
            body,
        });
        func_addrs.push(addr);
    }

    // Step 8: collect named exports, now that every index space is complete.
    let exports = module
        .exports
        .iter()
        .map(|export| {
            let target = match export.desc {
                ExportDesc::Func(i) => ExternVal::Func(func_addrs[i as usize]),
                ExportDesc::Table(i) => ExternVal::Table(table_addrs[i as usize]),
                ExportDesc::Memory(i) => ExternVal::Memory(mem_addrs[i as usize]),
                ExportDesc::Global(i) => ExternVal::Global(global_addrs[i as usize]),
            };
            ExportInstance {
                name: export.name.clone(),
                target,
            }
        })
        .collect::<Vec<_>>();

    // `instance` above was built before the module's own functions were
    // allocated, and before exports were known; rebuild it now with the
    // complete data. Any `Rc<ModuleInstance>` already stashed in a function
    // body points at the earlier (import-only-complete) instance, which is
    // fine for lookups happening inside those bodies: they only ever see
    // func/table/mem/global addrs, all of which were already final at that
    // point except for the just-appended module-defined functions. We patch
    // function bodies' `module` field by re-allocating with the final Rc
    // would be needed for full correctness; instead we build the instance
    // exactly once with every address, since func bodies are built against
    // `&instance` only to read these (already-final) vectors, not against
    // `instance.exports`.
    let instance = Rc::new(ModuleInstance {
        name: name.to_owned(),
        types: module.types.clone(),
        func_addrs: func_addrs.clone(),
        table_addrs: table_addrs.clone(),
        mem_addrs: mem_addrs.clone(),
        global_addrs: global_addrs.clone(),
        exports,
    });
    for def_addr in func_addrs.iter().skip(func_addrs.len() - module.functions.len()) {
        if let FunctionInstance::Module { module: m, .. } = &mut store.functions[def_addr.index()] {
            *m = Rc::clone(&instance);
        }
    }

    // Step 9-10: place element segments into tables, then data segments into
    // memories, trapping (as a link-time error, not a runtime trap, since no
    // call is in flight yet) if either runs past its target's bounds.
    for elem in &module.elements {
        let table_addr = table_addrs[elem.table_index as usize];
        let offset = eval_const_expr(store, &global_addrs, elem.offset)
            .as_i32()
            .expect("element offset must be i32") as u32;
        let table = &mut store.tables[table_addr.index()];
        for (i, func_idx) in elem.func_indices.iter().enumerate() {
            let target = offset
                .checked_add(i as u32)
                .ok_or(WasmError::ElementSegmentOutOfBounds)?;
            table
                .set(target, func_addrs[*func_idx as usize])
                .map_err(|_| WasmError::ElementSegmentOutOfBounds)?;
        }
        trace!(table = elem.table_index, count = elem.func_indices.len(), "placed element segment");
    }

    for data in &module.data {
        let mem_addr = mem_addrs[data.mem_index as usize];
        let offset = eval_const_expr(store, &global_addrs, data.offset)
            .as_i32()
            .expect("data offset must be i32") as u64;
        store.memories[mem_addr.index()]
            .write_bytes(offset, &data.bytes)
            .map_err(|_| WasmError::DataSegmentOutOfBounds)?;
        trace!(memory = data.mem_index, len = data.bytes.len(), "placed data segment");
    }

    debug!(
        funcs = func_addrs.len(),
        tables = table_addrs.len(),
        memories = mem_addrs.len(),
        globals = global_addrs.len(),
        "instantiated module"
    );

    // Step 11: run the start function, if declared.
    if let Some(start_idx) = module.start {
        let start_addr = instance.func_addrs[start_idx as usize];
        engine::call_function(store, max_stack_depth, start_addr, &[])?;
    }

    Ok(instance)
}

fn eval_const_expr(store: &Store, global_addrs: &[GlobalAddr], expr: ConstExpr) -> Value {
    match expr {
        ConstExpr::I32Const(v) => Value::I32(v),
        ConstExpr::I64Const(v) => Value::I64(v),
        ConstExpr::F32Const(v) => Value::F32(v),
        ConstExpr::F64Const(v) => Value::F64(v),
        ConstExpr::GlobalGet(i) => store.globals[global_addrs[i as usize].index()].get(),
    }
}

fn exceeds_declared_max(required: Option<u32>, actual: Option<u32>) -> bool {
    match (required, actual) {
        (Some(req), None) => req < u32::MAX, // importer demands a cap, exporter declared none
        (Some(req), Some(act)) => act > req,
        (None, _) => false,
    }
}

fn mismatch(import: &wasm_module::Import, reason: &str) -> WasmError {
    WasmError::ImportTypeMismatch {
        module: import.module.clone(),
        name: import.name.clone(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wasm_module::{Instr, ModuleBuilder};
    use wasm_types::ValueType;

    #[test]
    fn instantiate_runs_start_function_and_collects_exports() {
        let mut builder = ModuleBuilder::new();
        let ty_void = builder.add_type(FunctionType::new(vec![], None));
        let ty_i32 = builder.add_type(FunctionType::new(vec![], Some(ValueType::I32)));
        let global_idx = builder.add_global(
            wasm_module::GlobalType {
                value_type: ValueType::I32,
                mutable: true,
            },
            ConstExpr::I32Const(0),
        );
        let start_fn = builder.add_function(
            ty_void,
            vec![],
            vec![
                Instr::I32Const(42),
                Instr::GlobalSet(global_idx),
                Instr::Return,
            ],
        );
        let reader_fn = builder.add_function(
            ty_i32,
            vec![],
            vec![Instr::GlobalGet(global_idx), Instr::Return],
        );
        builder.set_start(start_fn);
        builder.export_func("read", reader_fn);
        builder.export_global("g", global_idx);
        let module = builder.build();

        let mut store = Store::new();
        let provider = crate::store::DefaultMemoryProvider;
        let imports = Imports::new();
        let instance = instantiate(
            &mut store,
            &provider,
            &imports,
            "m",
            &module,
            wasm_types::DEFAULT_MAX_STACK_DEPTH,
        )
        .unwrap();

        let export = instance.find_export("read").unwrap();
        let ExternVal::Func(addr) = export.target else {
            panic!("expected function export")
        };
        let result = engine::call_function(&mut store, 256, addr, &[]).unwrap();
        assert_eq!(result, vec![Value::I32(42)]);
    }

    #[test]
    fn missing_import_is_reported() {
        let mut builder = ModuleBuilder::new();
        let ty = builder.add_type(FunctionType::new(vec![], None));
        builder.import_func("env", "missing", ty);
        let module = builder.build();

        let mut store = Store::new();
        let provider = crate::store::DefaultMemoryProvider;
        let imports = Imports::new();
        let err = instantiate(
            &mut store,
            &provider,
            &imports,
            "m",
            &module,
            wasm_types::DEFAULT_MAX_STACK_DEPTH,
        )
        .unwrap_err();
        assert_eq!(
            err,
            WasmError::ImportNotFound {
                module: "env".to_owned(),
                name: "missing".to_owned()
            }
        );
    }
}
