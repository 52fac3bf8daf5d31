use memmap2::MmapMut;
use wasm_types::{trap::TrapKind, PAGE_SIZE};

/// The byte-backing for a memory instance. `Heap` resizes on every `grow`;
/// `Mmap` reserves its declared maximum up front (as inaccessible pages
/// beyond the current size would be, on a platform with real guard-page
/// support) and `grow` only moves the logical size forward, never
/// reallocates (§6.4).
enum Storage {
    Heap(Vec<u8>),
    Mmap { map: MmapMut, reserved_pages: u32 },
}

impl Storage {
    fn as_slice(&self, len_bytes: usize) -> &[u8] {
        match self {
            Storage::Heap(v) => v,
            Storage::Mmap { map, .. } => &map[..len_bytes],
        }
    }

    fn as_mut_slice(&mut self, len_bytes: usize) -> &mut [u8] {
        match self {
            Storage::Heap(v) => v,
            Storage::Mmap { map, .. } => &mut map[..len_bytes],
        }
    }
}

/// A linear-memory instance: a page-addressed byte store with little-endian
/// typed access and bounds-trapping (§4.3).
pub struct MemoryInstance {
    storage: Storage,
    current_pages: u32,
    max_pages: Option<u32>,
}

impl MemoryInstance {
    pub fn new(min_pages: u32, max_pages: Option<u32>) -> Self {
        Self {
            storage: Storage::Heap(vec![0u8; min_pages as usize * PAGE_SIZE as usize]),
            current_pages: min_pages,
            max_pages,
        }
    }

    /// Builds an mmap-backed instance with `reserved_pages` committed up
    /// front; `grow` beyond `min_pages` is then a pure bookkeeping update; it
    /// never reallocates or copies. `reserved_pages` must be at least
    /// `min_pages` and, if `max_pages` is set, should normally equal it.
    pub fn new_mmap(min_pages: u32, max_pages: Option<u32>, reserved_pages: u32) -> std::io::Result<Self> {
        let map = MmapMut::map_anon(reserved_pages as usize * PAGE_SIZE as usize)?;
        Ok(Self {
            storage: Storage::Mmap { map, reserved_pages },
            current_pages: min_pages,
            max_pages,
        })
    }

    pub fn size(&self) -> u32 {
        self.current_pages
    }

    pub fn size_in_bytes(&self) -> u64 {
        self.current_pages as u64 * PAGE_SIZE as u64
    }

    /// Grows the memory by `delta_pages`. Returns the previous size on
    /// success, or `-1` if the grow would exceed the declared maximum (or,
    /// for an mmap-backed instance, the reserved region).
    pub fn grow(&mut self, delta_pages: u32) -> i32 {
        let new_pages = match self.current_pages.checked_add(delta_pages) {
            Some(p) => p,
            None => return -1,
        };
        if let Some(max) = self.max_pages {
            if new_pages > max {
                return -1;
            }
        }
        let previous = self.current_pages;
        match &mut self.storage {
            Storage::Heap(bytes) => {
                bytes.resize(new_pages as usize * PAGE_SIZE as usize, 0);
            }
            Storage::Mmap { reserved_pages, .. } => {
                if new_pages > *reserved_pages {
                    return -1;
                }
            }
        }
        self.current_pages = new_pages;
        previous as i32
    }

    /// Traps if `offset + len` overflows an unsigned 33-bit range or exceeds
    /// the current byte size, per the spec's trap rule.
    fn check_bounds(&self, offset: u64, len: u64) -> Result<(), TrapKind> {
        let end = offset
            .checked_add(len)
            .ok_or(TrapKind::OutOfBoundsMemoryAccess)?;
        if end > (1u64 << 33) || end > self.size_in_bytes() {
            return Err(TrapKind::OutOfBoundsMemoryAccess);
        }
        Ok(())
    }

    pub fn read_bytes(&self, offset: u64, len: usize) -> Result<&[u8], TrapKind> {
        self.check_bounds(offset, len as u64)?;
        let start = offset as usize;
        let slice = self.storage.as_slice(self.size_in_bytes() as usize);
        Ok(&slice[start..start + len])
    }

    pub fn write_bytes(&mut self, offset: u64, src: &[u8]) -> Result<(), TrapKind> {
        self.check_bounds(offset, src.len() as u64)?;
        let start = offset as usize;
        let len_bytes = self.size_in_bytes() as usize;
        let slice = self.storage.as_mut_slice(len_bytes);
        slice[start..start + src.len()].copy_from_slice(src);
        Ok(())
    }

    /// Reads an N-byte little-endian integer at `offset`, sign- or
    /// zero-extended to `i64` according to `signed`. `width` is one of
    /// `{1, 2, 4, 8}`.
    pub fn read_int(&self, offset: u64, width: u8, signed: bool) -> Result<i64, TrapKind> {
        let bytes = self.read_bytes(offset, width as usize)?;
        let mut buf = [0u8; 8];
        buf[..width as usize].copy_from_slice(bytes);
        let unsigned = u64::from_le_bytes(buf);
        if !signed {
            return Ok(unsigned as i64);
        }
        let shift = 64 - width as u32 * 8;
        Ok(((unsigned << shift) as i64) >> shift)
    }

    pub fn write_int(&mut self, offset: u64, width: u8, value: i64) -> Result<(), TrapKind> {
        let bytes = value.to_le_bytes();
        self.write_bytes(offset, &bytes[..width as usize])
    }

    pub fn read_float(&self, offset: u64, width: u8) -> Result<f64, TrapKind> {
        match width {
            4 => {
                let bytes = self.read_bytes(offset, 4)?;
                Ok(f32::from_le_bytes(bytes.try_into().unwrap()) as f64)
            }
            8 => {
                let bytes = self.read_bytes(offset, 8)?;
                Ok(f64::from_le_bytes(bytes.try_into().unwrap()))
            }
            _ => unreachable!("float width must be 4 or 8"),
        }
    }

    pub fn write_float(&mut self, offset: u64, width: u8, value: f64) -> Result<(), TrapKind> {
        match width {
            4 => self.write_bytes(offset, &(value as f32).to_le_bytes()),
            8 => self.write_bytes(offset, &value.to_le_bytes()),
            _ => unreachable!("float width must be 4 or 8"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn grow_reports_previous_size_and_extends_bytes() {
        let mut mem = MemoryInstance::new(1, Some(2));
        assert_eq!(mem.size(), 1);
        assert_eq!(mem.grow(1), 1);
        assert_eq!(mem.size(), 2);
        assert_eq!(mem.grow(1), -1);
    }

    #[test]
    fn read_write_round_trip() {
        let mut mem = MemoryInstance::new(1, None);
        mem.write_int(4, 4, 0xDEADBEEFu32 as i32 as i64).unwrap();
        assert_eq!(mem.read_int(4, 4, false).unwrap(), 0xDEADBEEFu32 as i64);
    }

    #[test]
    fn out_of_bounds_access_traps() {
        let mem = MemoryInstance::new(1, None);
        let err = mem.read_int(65_533, 8, false).unwrap_err();
        assert_eq!(err, TrapKind::OutOfBoundsMemoryAccess);
    }

    #[test]
    fn offset_overflow_near_u32_max_traps_without_panicking() {
        let mem = MemoryInstance::new(1, None);
        let err = mem.read_int(u32::MAX as u64, 8, false).unwrap_err();
        assert_eq!(err, TrapKind::OutOfBoundsMemoryAccess);
    }

    #[test]
    fn signed_read_sign_extends() {
        let mut mem = MemoryInstance::new(1, None);
        mem.write_int(0, 1, -1).unwrap();
        assert_eq!(mem.read_int(0, 1, true).unwrap(), -1);
        assert_eq!(mem.read_int(0, 1, false).unwrap(), 0xFF);
    }

    #[test]
    fn mmap_backed_memory_round_trips_and_grows_without_realloc() {
        let mut mem = MemoryInstance::new_mmap(1, Some(4), 4).unwrap();
        assert_eq!(mem.grow(2), 1);
        assert_eq!(mem.size(), 3);
        mem.write_int(0, 4, 7).unwrap();
        assert_eq!(mem.read_int(0, 4, false).unwrap(), 7);
        assert_eq!(mem.grow(10), -1);
    }
}
