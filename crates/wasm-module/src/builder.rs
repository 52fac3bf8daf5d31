//! A small ergonomic builder for assembling a `Module` in-process.
//!
//! The text and binary frontends that would normally produce a `Module` are
//! out of scope for this crate (§1); this builder exists so embedders (and
//! this crate's own tests) can construct well-typed modules directly,
//! exercising the same `Module` shape a real frontend would hand to the
//! linker.

use wasm_types::{FunctionType, ValueType};

use crate::ast::{
    DataSegment, ElementSegment, Export, ExportDesc, FunctionDef, GlobalDef, GlobalType, Import,
    ImportDesc, MemoryType, Module, TableType,
};
use crate::instr::{ConstExpr, Instr};

#[derive(Default)]
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self {
            module: Module::new(),
        }
    }

    pub fn add_type(&mut self, ty: FunctionType) -> u32 {
        self.module.types.push(ty);
        (self.module.types.len() - 1) as u32
    }

    pub fn import_func(&mut self, module: &str, name: &str, type_index: u32) -> u32 {
        self.module.imports.push(Import {
            module: module.to_owned(),
            name: name.to_owned(),
            desc: ImportDesc::Func(type_index),
        });
        (self.module.func_count() - 1) as u32
    }

    pub fn import_table(&mut self, module: &str, name: &str, table_type: TableType) -> u32 {
        self.module.imports.push(Import {
            module: module.to_owned(),
            name: name.to_owned(),
            desc: ImportDesc::Table(table_type),
        });
        (self.module.table_count() - 1) as u32
    }

    pub fn import_memory(&mut self, module: &str, name: &str, memory_type: MemoryType) -> u32 {
        self.module.imports.push(Import {
            module: module.to_owned(),
            name: name.to_owned(),
            desc: ImportDesc::Memory(memory_type),
        });
        (self.module.memory_count() - 1) as u32
    }

    pub fn import_global(&mut self, module: &str, name: &str, global_type: GlobalType) -> u32 {
        self.module.imports.push(Import {
            module: module.to_owned(),
            name: name.to_owned(),
            desc: ImportDesc::Global(global_type),
        });
        (self.module.global_count() - 1) as u32
    }

    pub fn add_function(&mut self, type_index: u32, locals: Vec<ValueType>, body: Vec<Instr>) -> u32 {
        self.module.functions.push(FunctionDef {
            type_index,
            locals,
            body,
        });
        (self.module.func_count() - 1) as u32
    }

    pub fn add_table(&mut self, table_type: TableType) -> u32 {
        self.module.tables.push(table_type);
        (self.module.table_count() - 1) as u32
    }

    pub fn add_memory(&mut self, memory_type: MemoryType) -> u32 {
        self.module.memories.push(memory_type);
        (self.module.memory_count() - 1) as u32
    }

    pub fn add_global(&mut self, global_type: GlobalType, init: ConstExpr) -> u32 {
        self.module.globals.push(GlobalDef { global_type, init });
        (self.module.global_count() - 1) as u32
    }

    pub fn export_func(&mut self, name: &str, func_index: u32) -> &mut Self {
        self.module.exports.push(Export {
            name: name.to_owned(),
            desc: ExportDesc::Func(func_index),
        });
        self
    }

    pub fn export_table(&mut self, name: &str, table_index: u32) -> &mut Self {
        self.module.exports.push(Export {
            name: name.to_owned(),
            desc: ExportDesc::Table(table_index),
        });
        self
    }

    pub fn export_memory(&mut self, name: &str, mem_index: u32) -> &mut Self {
        self.module.exports.push(Export {
            name: name.to_owned(),
            desc: ExportDesc::Memory(mem_index),
        });
        self
    }

    pub fn export_global(&mut self, name: &str, global_index: u32) -> &mut Self {
        self.module.exports.push(Export {
            name: name.to_owned(),
            desc: ExportDesc::Global(global_index),
        });
        self
    }

    pub fn set_start(&mut self, func_index: u32) -> &mut Self {
        self.module.start = Some(func_index);
        self
    }

    pub fn add_element(&mut self, table_index: u32, offset: ConstExpr, func_indices: Vec<u32>) -> &mut Self {
        self.module.elements.push(ElementSegment {
            table_index,
            offset,
            func_indices,
        });
        self
    }

    pub fn add_data(&mut self, mem_index: u32, offset: ConstExpr, bytes: Vec<u8>) -> &mut Self {
        self.module.data.push(DataSegment {
            mem_index,
            offset,
            bytes,
        });
        self
    }

    pub fn build(self) -> Module {
        self.module
    }
}
