//! An mmap-backed alternative to `wasm_runtime::DefaultMemoryProvider`
//! (§6.4): reserves each memory's declared maximum up front so `memory.grow`
//! never reallocates or copies existing contents.

use tracing::debug;
use wasm_runtime::{MemoryInstance, MemoryProvider};
use wasm_types::WasmError;

/// Memories with no declared maximum reserve this many pages (256 MiB)
/// rather than the full 4 GiB address-space maximum WebAssembly allows.
const DEFAULT_RESERVATION_PAGES: u32 = 4_096;

pub struct MmapMemoryProvider {
    default_reservation_pages: u32,
}

impl MmapMemoryProvider {
    pub fn new() -> Self {
        Self {
            default_reservation_pages: DEFAULT_RESERVATION_PAGES,
        }
    }

    /// Overrides the reservation used for memories with no declared maximum.
    pub fn with_default_reservation_pages(mut self, pages: u32) -> Self {
        self.default_reservation_pages = pages;
        self
    }
}

impl Default for MmapMemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProvider for MmapMemoryProvider {
    fn build_memory(&self, min_pages: u32, max_pages: Option<u32>) -> Result<MemoryInstance, WasmError> {
        let reserved = max_pages
            .unwrap_or(self.default_reservation_pages)
            .max(min_pages);
        debug!(min_pages, ?max_pages, reserved, "mapping mmap-backed memory");
        MemoryInstance::new_mmap(min_pages, max_pages, reserved).map_err(|_| WasmError::OutOfMemory)
    }
}
