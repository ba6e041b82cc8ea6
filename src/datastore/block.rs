//! Data blocks backing one Modbus entity kind (coils, discrete inputs,
//! holding registers, input registers).
//!
//! Two shapes, per §3/§4.4: a dense [`SequentialBlock`] covering a
//! contiguous address range, and a [`SparseBlock`] covering an explicit set
//! of addresses. Both are generic over the cell type `T` (`bool` or `u16`).

use std::collections::BTreeMap;

use crate::error::{ModbusError, Result};

/// Common contract for a single entity's storage.
pub trait DataBlock<T: Copy> {
    /// True iff every address in `[address, address + count)` is backed.
    fn validate(&self, address: u16, count: u16) -> bool;

    /// Read `count` values starting at `address`. Callers must have called
    /// [`DataBlock::validate`] first; out-of-range reads return an error
    /// rather than panicking.
    fn get_values(&self, address: u16, count: u16) -> Result<Vec<T>>;

    /// Write `values` starting at `address`. Preserves the block's length
    /// and domain: a sequential block cannot grow, a non-mutable sparse
    /// block cannot gain new keys.
    fn set_values(&mut self, address: u16, values: &[T]) -> Result<()>;

    /// Reset every cell to its zero value.
    fn reset(&mut self);
}

/// Default cell count for a fresh [`SequentialBlock::default`] — the full
/// 16-bit Modbus address space.
pub const DEFAULT_SEQUENTIAL_LEN: usize = 65_536;

/// A dense, contiguous block: `base` + `Vec<T>`.
#[derive(Debug, Clone)]
pub struct SequentialBlock<T> {
    base: u16,
    cells: Vec<T>,
}

impl<T: Copy + Default> SequentialBlock<T> {
    /// A block covering `[base, base + len)`, all cells zeroed.
    pub fn new(base: u16, len: usize) -> Self {
        Self {
            base,
            cells: vec![T::default(); len],
        }
    }

    /// A block covering the entire 16-bit address space, based at 0.
    pub fn full_range() -> Self {
        Self::new(0, DEFAULT_SEQUENTIAL_LEN)
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<T: Copy + Default> Default for SequentialBlock<T> {
    fn default() -> Self {
        Self::full_range()
    }
}

impl<T: Copy + Default> DataBlock<T> for SequentialBlock<T> {
    fn validate(&self, address: u16, count: u16) -> bool {
        if count == 0 {
            return false;
        }
        let start = address as u64;
        let end = start + count as u64;
        let base = self.base as u64;
        start >= base && end <= base + self.cells.len() as u64
    }

    fn get_values(&self, address: u16, count: u16) -> Result<Vec<T>> {
        if !self.validate(address, count) {
            return Err(ModbusError::protocol("address range not backed by block"));
        }
        let offset = (address - self.base) as usize;
        Ok(self.cells[offset..offset + count as usize].to_vec())
    }

    fn set_values(&mut self, address: u16, values: &[T]) -> Result<()> {
        if !self.validate(address, values.len() as u16) {
            return Err(ModbusError::protocol("address range not backed by block"));
        }
        let offset = (address - self.base) as usize;
        self.cells[offset..offset + values.len()].copy_from_slice(values);
        Ok(())
    }

    fn reset(&mut self) {
        for cell in &mut self.cells {
            *cell = T::default();
        }
    }
}

/// An explicit, possibly non-contiguous mapping of address to value.
#[derive(Debug, Clone, Default)]
pub struct SparseBlock<T> {
    cells: BTreeMap<u16, T>,
    /// When true, `set_values` may introduce addresses absent from the map.
    mutable: bool,
}

impl<T: Copy> SparseBlock<T> {
    pub fn new(cells: BTreeMap<u16, T>) -> Self {
        Self {
            cells,
            mutable: false,
        }
    }

    pub fn mutable(cells: BTreeMap<u16, T>) -> Self {
        Self {
            cells,
            mutable: true,
        }
    }
}

impl<T: Copy + Default> DataBlock<T> for SparseBlock<T> {
    fn validate(&self, address: u16, count: u16) -> bool {
        if count == 0 {
            return false;
        }
        (0..count).all(|i| {
            address
                .checked_add(i)
                .map(|a| self.cells.contains_key(&a))
                .unwrap_or(false)
        })
    }

    fn get_values(&self, address: u16, count: u16) -> Result<Vec<T>> {
        if !self.validate(address, count) {
            return Err(ModbusError::protocol("address range not backed by block"));
        }
        Ok((0..count)
            .map(|i| self.cells[&(address + i)])
            .collect())
    }

    fn set_values(&mut self, address: u16, values: &[T]) -> Result<()> {
        if !self.mutable && !self.validate(address, values.len() as u16) {
            return Err(ModbusError::protocol(
                "sparse block is not mutable and key is absent",
            ));
        }
        for (i, &v) in values.iter().enumerate() {
            self.cells.insert(address + i as u16, v);
        }
        Ok(())
    }

    fn reset(&mut self) {
        for v in self.cells.values_mut() {
            *v = T::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_validate_bounds() {
        let block: SequentialBlock<u16> = SequentialBlock::new(100, 10);
        assert!(block.validate(100, 10));
        assert!(block.validate(105, 5));
        assert!(!block.validate(99, 1));
        assert!(!block.validate(105, 6));
        assert!(!block.validate(100, 0));
    }

    #[test]
    fn sequential_get_set() {
        let mut block: SequentialBlock<u16> = SequentialBlock::new(0, 10);
        block.set_values(2, &[1, 2, 3]).unwrap();
        assert_eq!(block.get_values(2, 3).unwrap(), vec![1, 2, 3]);
        assert!(block.get_values(8, 5).is_err());
    }

    #[test]
    fn sparse_requires_existing_keys_unless_mutable() {
        let mut cells = BTreeMap::new();
        cells.insert(5u16, 42u16);
        let mut block = SparseBlock::new(cells);
        assert!(block.validate(5, 1));
        assert!(!block.validate(6, 1));
        assert!(block.set_values(5, &[100]).is_ok());
        assert!(block.set_values(6, &[1]).is_err());

        let mut mutable = SparseBlock::mutable(BTreeMap::new());
        assert!(mutable.set_values(9, &[1]).is_ok());
        assert!(mutable.validate(9, 1));
    }

    #[test]
    fn reset_zeroes_all_cells() {
        let mut block: SequentialBlock<u16> = SequentialBlock::new(0, 4);
        block.set_values(0, &[1, 2, 3, 4]).unwrap();
        block.reset();
        assert_eq!(block.get_values(0, 4).unwrap(), vec![0, 0, 0, 0]);
    }
}
