//! The parsed module shape the core consumes (§6.1): types, imports,
//! functions, tables, memories, globals, exports, the optional start
//! function, and element/data segments. Text and binary decoding into this
//! shape are external collaborators and are not implemented here.

pub mod ast;
pub mod builder;
pub mod instr;

pub use ast::{
    DataSegment, ElementSegment, Export, ExportDesc, FunctionDef, GlobalDef, GlobalType, Import,
    ImportDesc, MemoryType, Module, TableType, ValidationContext,
};
pub use builder::ModuleBuilder;
pub use instr::{ConstExpr, Instr, MemArg};
