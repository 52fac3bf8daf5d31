use wasm_types::{FunctionType, ValueType};

use crate::instr::{ConstExpr, Instr};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableType {
    pub min: u32,
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryType {
    pub min: u32,
    pub max: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalType {
    pub value_type: ValueType,
    pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ImportDesc {
    Func(u32),
    Table(TableType),
    Memory(MemoryType),
    Global(GlobalType),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub module: String,
    pub name: String,
    pub desc: ImportDesc,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExportDesc {
    Func(u32),
    Table(u32),
    Memory(u32),
    Global(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub name: String,
    pub desc: ExportDesc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GlobalDef {
    pub global_type: GlobalType,
    pub init: ConstExpr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementSegment {
    pub table_index: u32,
    pub offset: ConstExpr,
    pub func_indices: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
    pub mem_index: u32,
    pub offset: ConstExpr,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub type_index: u32,
    pub locals: Vec<ValueType>,
    pub body: Vec<Instr>,
}

/// The parsed module the core consumes (§6.1). Index spaces for functions,
/// tables, memories, and globals are split into `imports` (first) and the
/// category's own `Vec` (second) by declaration order, matching how the
/// linker (§4.6) must allocate them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub types: Vec<FunctionType>,
    pub imports: Vec<Import>,
    pub functions: Vec<FunctionDef>,
    pub tables: Vec<TableType>,
    pub memories: Vec<MemoryType>,
    pub globals: Vec<GlobalDef>,
    pub exports: Vec<Export>,
    pub start: Option<u32>,
    pub elements: Vec<ElementSegment>,
    pub data: Vec<DataSegment>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn imported_funcs(&self) -> impl Iterator<Item = (&Import, u32)> {
        self.imports.iter().filter_map(|imp| match imp.desc {
            ImportDesc::Func(type_index) => Some((imp, type_index)),
            _ => None,
        })
    }

    pub fn imported_tables(&self) -> impl Iterator<Item = (&Import, TableType)> {
        self.imports.iter().filter_map(|imp| match imp.desc {
            ImportDesc::Table(tt) => Some((imp, tt)),
            _ => None,
        })
    }

    pub fn imported_memories(&self) -> impl Iterator<Item = (&Import, MemoryType)> {
        self.imports.iter().filter_map(|imp| match imp.desc {
            ImportDesc::Memory(mt) => Some((imp, mt)),
            _ => None,
        })
    }

    pub fn imported_globals(&self) -> impl Iterator<Item = (&Import, GlobalType)> {
        self.imports.iter().filter_map(|imp| match imp.desc {
            ImportDesc::Global(gt) => Some((imp, gt)),
            _ => None,
        })
    }

    pub fn func_count(&self) -> usize {
        self.imported_funcs().count() + self.functions.len()
    }

    pub fn table_count(&self) -> usize {
        self.imported_tables().count() + self.tables.len()
    }

    pub fn memory_count(&self) -> usize {
        self.imported_memories().count() + self.memories.len()
    }

    pub fn global_count(&self) -> usize {
        self.imported_globals().count() + self.globals.len()
    }

    /// The `FunctionType` for a function, given its index in the combined
    /// (imports-then-own) function index space.
    pub fn func_type_of(&self, func_index: u32) -> Option<&FunctionType> {
        let imported: Vec<u32> = self.imported_funcs().map(|(_, t)| t).collect();
        if (func_index as usize) < imported.len() {
            self.types.get(imported[func_index as usize] as usize)
        } else {
            let own_index = func_index as usize - imported.len();
            self.functions
                .get(own_index)
                .and_then(|f| self.types.get(f.type_index as usize))
        }
    }
}

/// Precomputed, read-only view over a `Module`'s index spaces. Stands in for
/// the static validator's output (§1): the core assumes the module is
/// well-typed and uses this purely to avoid recomputing index-space
/// boundaries on every lookup.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub imported_func_count: u32,
    pub imported_table_count: u32,
    pub imported_memory_count: u32,
    pub imported_global_count: u32,
}

impl ValidationContext {
    pub fn for_module(module: &Module) -> Self {
        Self {
            imported_func_count: module.imported_funcs().count() as u32,
            imported_table_count: module.imported_tables().count() as u32,
            imported_memory_count: module.imported_memories().count() as u32,
            imported_global_count: module.imported_globals().count() as u32,
        }
    }
}
