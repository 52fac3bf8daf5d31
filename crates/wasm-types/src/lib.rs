//! Value representation and bit-exact numeric semantics shared by every
//! other crate in this workspace (§3, §4.1 of the design).

pub mod numeric;
pub mod trap;
pub mod value;

pub use trap::{Trap, TrapKind, WasmError};
pub use value::{ForeignValue, FunctionType, ResultType, Value, ValueType};

pub const PAGE_SIZE: u32 = 65_536;

/// Default maximum depth for the operand, label, and activation stacks (§5).
pub const DEFAULT_MAX_STACK_DEPTH: usize = 4_096;
