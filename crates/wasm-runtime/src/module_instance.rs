use wasm_types::FunctionType;

use crate::address::{ExternVal, FuncAddr, GlobalAddr, MemAddr, TableAddr};

/// A named export, resolved to its store address at link time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportInstance {
    pub name: String,
    pub target: ExternVal,
}

/// The runtime embodiment of a declared module: index-to-address maps for
/// each of the four categories, built once during instantiation and
/// immutable afterwards (§3, §9 design note on resolving addresses before
/// construction rather than patching placeholders in place).
pub struct ModuleInstance {
    pub name: String,
    pub types: Vec<FunctionType>,
    pub func_addrs: Vec<FuncAddr>,
    pub table_addrs: Vec<TableAddr>,
    pub mem_addrs: Vec<MemAddr>,
    pub global_addrs: Vec<GlobalAddr>,
    pub exports: Vec<ExportInstance>,
}

impl ModuleInstance {
    pub fn find_export(&self, name: &str) -> Option<&ExportInstance> {
        self.exports.iter().find(|e| e.name == name)
    }
}
