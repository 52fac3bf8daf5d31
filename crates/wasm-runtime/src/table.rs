use wasm_types::trap::TrapKind;

use crate::address::FuncAddr;

/// A fixed-max vector of optional function addresses (§4.4). `None` marks an
/// uninitialized element.
pub struct TableInstance {
    elements: Vec<Option<FuncAddr>>,
    max: Option<u32>,
}

impl TableInstance {
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self {
            elements: vec![None; min as usize],
            max,
        }
    }

    pub fn length(&self) -> u32 {
        self.elements.len() as u32
    }

    pub fn max(&self) -> Option<u32> {
        self.max
    }

    pub fn get(&self, index: u32) -> Result<Option<FuncAddr>, TrapKind> {
        self.elements
            .get(index as usize)
            .copied()
            .ok_or(TrapKind::OutOfBoundsTableAccess)
    }

    pub fn set(&mut self, index: u32, addr: FuncAddr) -> Result<(), TrapKind> {
        let slot = self
            .elements
            .get_mut(index as usize)
            .ok_or(TrapKind::OutOfBoundsTableAccess)?;
        *slot = Some(addr);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn set_then_get_round_trips() {
        let mut table = TableInstance::new(2, Some(2));
        table.set(0, FuncAddr(7)).unwrap();
        assert_eq!(table.get(0).unwrap(), Some(FuncAddr(7)));
        assert_eq!(table.get(1).unwrap(), None);
    }

    #[test]
    fn out_of_bounds_index_traps() {
        let table = TableInstance::new(1, None);
        assert_eq!(table.get(5).unwrap_err(), TrapKind::OutOfBoundsTableAccess);
    }
}
