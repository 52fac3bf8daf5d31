use std::fmt::{self, Display, Formatter};

/// The four value kinds defined by the WebAssembly MVP.
///
/// I32/I64 are bare bit patterns: signedness is a property of the operator
/// that consumes a value, never of the value itself. F32/F64 follow
/// IEEE-754 binary32/binary64, including signed zeros and NaN payloads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// `i32` interpreted as a boolean condition: `0` is false, anything else true.
    pub fn is_truthy_i32(&self) -> bool {
        matches!(self, Value::I32(v) if *v != 0)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "i32:{v}"),
            Value::I64(v) => write!(f, "i64:{v}"),
            Value::F32(v) => write!(f, "f32:{v}"),
            Value::F64(v) => write!(f, "f64:{v}"),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::F64(v)
    }
}

/// The type of a `Value`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    I32 = 0x0,
    I64,
    F32,
    F64,
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
        };
        f.write_str(s)
    }
}

/// MVP result type: a function or block yields at most one value.
pub type ResultType = Option<ValueType>;

/// Signature of a function: zero or more parameter types and an optional result.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub params: Vec<ValueType>,
    pub result: ResultType,
}

impl FunctionType {
    pub fn new(params: Vec<ValueType>, result: ResultType) -> Self {
        Self { params, result }
    }

    pub fn matches_values(&self, args: &[Value]) -> bool {
        self.params.len() == args.len()
            && self
                .params
                .iter()
                .zip(args.iter())
                .all(|(ty, val)| *ty == val.value_type())
    }
}

/// A value handed across the host/guest boundary (the embedder's ABI, §6.2/6.3).
///
/// Distinct from `Value` so that host code never has to reason about how the
/// engine represents operands internally; a `ForeignValue` is always a
/// self-describing, owned numeric value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForeignValue {
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl From<Value> for ForeignValue {
    fn from(v: Value) -> Self {
        match v {
            Value::I32(v) => ForeignValue::I32(v),
            Value::I64(v) => ForeignValue::I64(v),
            Value::F32(v) => ForeignValue::F32(v),
            Value::F64(v) => ForeignValue::F64(v),
        }
    }
}

impl From<ForeignValue> for Value {
    fn from(v: ForeignValue) -> Self {
        match v {
            ForeignValue::U32(v) => Value::I32(v as i32),
            ForeignValue::I32(v) => Value::I32(v),
            ForeignValue::U64(v) => Value::I64(v as i64),
            ForeignValue::I64(v) => Value::I64(v),
            ForeignValue::F32(v) => Value::F32(v),
            ForeignValue::F64(v) => Value::F64(v),
        }
    }
}
