//! The embedder-facing facade (§6): build a `Program` from one or more
//! module ASTs and host bindings, then drive it through exported functions,
//! globals, and memory.

pub mod mmap_memory;
pub mod program;

pub use mmap_memory::MmapMemoryProvider;
pub use program::{ExportedFunction, MemoryHandle, Program, ProgramBuilder, ModuleSource};

pub use wasm_module::{Instr, ModuleBuilder};
pub use wasm_runtime::{DefaultMemoryProvider, HostContext, MemoryProvider};
pub use wasm_types::{ForeignValue, FunctionType, Value, ValueType, WasmError};
