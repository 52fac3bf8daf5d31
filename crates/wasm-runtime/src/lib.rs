//! The store, module instances, and stack-machine engine (§3, §4, §5) that
//! turn a parsed `wasm_module::Module` into running code.

pub mod address;
pub mod engine;
pub mod flatten;
pub mod function;
pub mod global;
pub mod linker;
pub mod memory;
pub mod module_instance;
pub mod stack;
pub mod store;
pub mod table;

pub use address::{ExternVal, FuncAddr, GlobalAddr, MemAddr, TableAddr};
pub use engine::call_function;
pub use function::{FunctionBody, FunctionInstance, HostCallable, HostContext};
pub use global::GlobalInstance;
pub use linker::{instantiate, Extern, ImportResolver, Imports};
pub use memory::MemoryInstance;
pub use module_instance::{ExportInstance, ModuleInstance};
pub use stack::{Frame, Label, Stacks};
pub use store::{DefaultMemoryProvider, MemoryProvider, Store};
pub use table::TableInstance;
