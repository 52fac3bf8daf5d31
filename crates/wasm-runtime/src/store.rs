use wasm_types::{Value, WasmError};

use crate::address::{FuncAddr, GlobalAddr, MemAddr, TableAddr};
use crate::function::FunctionInstance;
use crate::global::GlobalInstance;
use crate::memory::MemoryInstance;
use crate::table::TableInstance;

/// Supplies the backing allocation for a memory instance, letting the
/// embedder choose the allocator (§6.4). `build_memory` may fail with
/// `WasmError::OutOfMemory` if it cannot honor the requested minimum.
pub trait MemoryProvider {
    fn build_memory(&self, min_pages: u32, max_pages: Option<u32>) -> Result<MemoryInstance, WasmError>;
}

/// The default provider: a plain heap-allocated `Vec<u8>` that resizes on
/// `grow`.
pub struct DefaultMemoryProvider;

impl MemoryProvider for DefaultMemoryProvider {
    fn build_memory(&self, min_pages: u32, max_pages: Option<u32>) -> Result<MemoryInstance, WasmError> {
        Ok(MemoryInstance::new(min_pages, max_pages))
    }
}

/// The append-only store of function/table/memory/global instances (§3, §4.2).
/// Addresses are indices into the corresponding vector and are stable for the
/// store's lifetime.
#[derive(Default)]
pub struct Store {
    pub functions: Vec<FunctionInstance>,
    pub tables: Vec<TableInstance>,
    pub memories: Vec<MemoryInstance>,
    pub globals: Vec<GlobalInstance>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_function(&mut self, instance: FunctionInstance) -> FuncAddr {
        self.functions.push(instance);
        FuncAddr(self.functions.len() - 1)
    }

    pub fn allocate_table(&mut self, min: u32, max: Option<u32>) -> TableAddr {
        self.tables.push(TableInstance::new(min, max));
        TableAddr(self.tables.len() - 1)
    }

    pub fn allocate_memory(
        &mut self,
        provider: &dyn MemoryProvider,
        min_pages: u32,
        max_pages: Option<u32>,
    ) -> Result<MemAddr, WasmError> {
        let memory = provider.build_memory(min_pages, max_pages)?;
        self.memories.push(memory);
        Ok(MemAddr(self.memories.len() - 1))
    }

    pub fn allocate_global(&mut self, initial_value: Value, mutable: bool) -> GlobalAddr {
        self.globals.push(GlobalInstance::new(initial_value, mutable));
        GlobalAddr(self.globals.len() - 1)
    }
}
