use thiserror::Error;

/// Every way a running instruction can abort the current call (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TrapKind {
    #[error("unreachable instruction executed")]
    Unreachable,
    #[error("integer divide by zero")]
    IntegerDivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversion,
    #[error("out of bounds memory access")]
    OutOfBoundsMemoryAccess,
    #[error("out of bounds table access")]
    OutOfBoundsTableAccess,
    #[error("indirect call type mismatch")]
    IndirectCallTypeMismatch,
    #[error("uninitialized element")]
    UninitializedElement,
    #[error("call stack exhausted")]
    StackOverflow,
}

/// A trap, the only early-termination channel the engine exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("trap: {kind}")]
pub struct Trap {
    pub kind: TrapKind,
}

impl Trap {
    pub fn new(kind: TrapKind) -> Self {
        Self { kind }
    }
}

impl From<TrapKind> for Trap {
    fn from(kind: TrapKind) -> Self {
        Trap::new(kind)
    }
}

/// Every fatal error the runtime (store, linker, and engine) can produce.
///
/// `ParseError` and `ValidationError` are carried here only so the facade can
/// report a single error type to its callers; the core never constructs them
/// itself (they originate in the frontend/validator, which are external
/// collaborators per the scope of this crate).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WasmError {
    #[error("parse error: {0}")]
    ParseError(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("import not found: {module}.{name}")]
    ImportNotFound { module: String, name: String },

    #[error("import type mismatch for {module}.{name}: {reason}")]
    ImportTypeMismatch {
        module: String,
        name: String,
        reason: String,
    },

    #[error("export not found: {module}.{name}")]
    ExportNotFound { module: String, name: String },

    #[error("global {module}.{name} is immutable")]
    ImmutableGlobal { module: String, name: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("element segment out of bounds")]
    ElementSegmentOutOfBounds,

    #[error("data segment out of bounds")]
    DataSegmentOutOfBounds,

    #[error("out of memory")]
    OutOfMemory,

    /// A host-provided function returned an error (§5: "A host may
    /// throw/return an error from a host function; the engine converts it
    /// into a trap that unwinds to the original call boundary").
    #[error("host function error: {0}")]
    HostError(String),

    #[error(transparent)]
    Trap(#[from] Trap),
}

impl From<TrapKind> for WasmError {
    fn from(kind: TrapKind) -> Self {
        WasmError::Trap(Trap::new(kind))
    }
}
