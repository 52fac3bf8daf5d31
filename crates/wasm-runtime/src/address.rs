//! Opaque indices into the four `Store` arrays (§3). Addresses are handed
//! out by allocation and never change: the store is append-only.

macro_rules! addr_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

addr_newtype!(FuncAddr);
addr_newtype!(TableAddr);
addr_newtype!(MemAddr);
addr_newtype!(GlobalAddr);

/// One of the four kinds of item a module can import or export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternVal {
    Func(FuncAddr),
    Table(TableAddr),
    Memory(MemAddr),
    Global(GlobalAddr),
}

impl ExternVal {
    pub fn category(&self) -> &'static str {
        match self {
            ExternVal::Func(_) => "function",
            ExternVal::Table(_) => "table",
            ExternVal::Memory(_) => "memory",
            ExternVal::Global(_) => "global",
        }
    }
}
