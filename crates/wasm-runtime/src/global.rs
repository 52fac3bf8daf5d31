use wasm_types::{Value, ValueType};

/// A global variable instance: a value plus mutability, with the declared
/// `ValueType` fixed for the global's lifetime (§3).
pub struct GlobalInstance {
    value: Value,
    mutable: bool,
}

impl GlobalInstance {
    pub fn new(value: Value, mutable: bool) -> Self {
        Self { value, mutable }
    }

    pub fn get(&self) -> Value {
        self.value
    }

    pub fn value_type(&self) -> ValueType {
        self.value.value_type()
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// `Ok(())` on success. `Err(())` if the global is immutable; the caller
    /// decides what that means (a facade-level `ImmutableGlobal` error, or an
    /// engine-level defensive panic per §4.5.2's "the engine double-checks").
    pub fn set(&mut self, value: Value) -> Result<(), ()> {
        if !self.mutable {
            return Err(());
        }
        self.value = value;
        Ok(())
    }
}
