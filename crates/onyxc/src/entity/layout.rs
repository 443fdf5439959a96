//! Static data placement
//!
//! A bump allocator over linear memory. Addresses only depend on the order
//! of reservations, and that order is fixed by the sweep order, so the same
//! input always gets the same addresses.

use std::collections::HashMap;

use crate::types::{align_up, checked_align_up};

/// Alignment of `#file_contents` payloads and of the heap start
pub const DATA_ALIGNMENT: u32 = 16;

/// Initialized bytes placed at a fixed address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSegment {
    pub addr: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub struct DataLayout {
    base: u32,
    next: u32,
    strings: HashMap<Vec<u8>, u32>,
    segments: Vec<DataSegment>,
}

impl DataLayout {
    pub fn new(base: u32) -> Self {
        Self {
            base,
            next: base,
            strings: HashMap::new(),
            segments: Vec::new(),
        }
    }

    /// Reserve zeroed memory. `None` when the segment, rounded up to the
    /// heap alignment, would run past the 32-bit address space.
    pub fn reserve(&mut self, size: u32, align: u32) -> Option<u32> {
        let addr = checked_align_up(self.next, align)?;
        let end = addr.checked_add(size)?;
        checked_align_up(end, DATA_ALIGNMENT)?;
        self.next = end;
        Some(addr)
    }

    /// Place a NUL-terminated copy of `data`. Identical strings share storage.
    pub fn reserve_string(&mut self, data: &[u8]) -> Option<u32> {
        if let Some(addr) = self.strings.get(data) {
            return Some(*addr);
        }
        let mut bytes = data.to_vec();
        bytes.push(0);
        let addr = self.place(bytes, 1)?;
        self.strings.insert(data.to_vec(), addr);
        Some(addr)
    }

    /// Place raw file bytes
    pub fn reserve_bytes(&mut self, bytes: Vec<u8>) -> Option<u32> {
        self.place(bytes, DATA_ALIGNMENT)
    }

    fn place(&mut self, bytes: Vec<u8>, align: u32) -> Option<u32> {
        let addr = self.reserve(u32::try_from(bytes.len()).ok()?, align)?;
        self.segments.push(DataSegment { addr, bytes });
        Some(addr)
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// First address past everything reserved so far
    pub fn end(&self) -> u32 {
        self.next
    }

    pub fn heap_start(&self) -> u32 {
        align_up(self.next, DATA_ALIGNMENT)
    }

    pub fn segments(&self) -> &[DataSegment] {
        &self.segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strings_are_deduplicated() {
        let mut data = DataLayout::new(8);
        let hello = data.reserve_string(b"hello").unwrap();
        let world = data.reserve_string(b"world").unwrap();
        assert_eq!(hello, 8);
        // 5 bytes plus the terminator
        assert_eq!(world, 14);
        assert_eq!(data.reserve_string(b"hello"), Some(hello));
        assert_eq!(data.segments().len(), 2);
        assert_eq!(data.segments()[0].bytes, b"hello\0".to_vec());
    }

    #[test]
    fn test_alignment() {
        let mut data = DataLayout::new(8);
        data.reserve_string(b"a");
        assert_eq!(data.reserve(4, 4), Some(12));
        assert_eq!(data.reserve_bytes(vec![1, 2, 3]), Some(16));
        assert_eq!(data.end(), 19);
        assert_eq!(data.heap_start(), 32);
    }

    #[test]
    fn test_reservation_past_address_space() {
        let mut data = DataLayout::new(8);
        assert_eq!(data.reserve(0x8000_0000, 1), Some(8));
        assert_eq!(data.reserve(0x7FFF_FFE0, 1), Some(0x8000_0008));
        assert_eq!(data.end(), 0xFFFF_FFE8);
        // The heap start would no longer fit
        assert_eq!(data.reserve(0x10, 1), None);
        assert_eq!(data.end(), 0xFFFF_FFE8);
        assert_eq!(data.heap_start(), 0xFFFF_FFF0);
        assert_eq!(data.reserve(0x7FFF_FFFF, 1), None);
    }
}
