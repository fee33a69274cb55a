use crate::dataref::DataTypes;
use crate::host::NativeDataRef;
use std::cell::Cell;
use std::collections::HashMap;

/// One published variable of the simulated host.
///
/// Scalar representations share a single `f64` cell, the way the real host
/// exposes one value through several accessor types.
#[derive(Debug, Clone, PartialEq)]
pub struct SimDataRef {
    path: String,
    types: DataTypes,
    writable: bool,
    scalar: f64,
    ints: Vec<i32>,
    floats: Vec<f32>,
    bytes: Vec<u8>,
}

impl SimDataRef {
    fn scalar(path: &str, types: DataTypes, value: f64) -> Self {
        Self {
            path: path.to_string(),
            types,
            writable: false,
            scalar: value,
            ints: Vec::new(),
            floats: Vec::new(),
            bytes: Vec::new(),
        }
    }

    pub fn int(path: &str, value: i32) -> Self {
        Self::scalar(path, DataTypes::INT, value as f64)
    }

    pub fn float(path: &str, value: f32) -> Self {
        Self::scalar(path, DataTypes::FLOAT, value as f64)
    }

    /// Readable as both float and double, like the host's position datarefs.
    pub fn double(path: &str, value: f64) -> Self {
        Self::scalar(path, DataTypes::FLOAT | DataTypes::DOUBLE, value)
    }

    pub fn int_array(path: &str, values: Vec<i32>) -> Self {
        Self {
            ints: values,
            ..Self::scalar(path, DataTypes::INT_ARRAY, 0.0)
        }
    }

    pub fn float_array(path: &str, values: Vec<f32>) -> Self {
        Self {
            floats: values,
            ..Self::scalar(path, DataTypes::FLOAT_ARRAY, 0.0)
        }
    }

    /// A fixed-size byte buffer of `len` bytes, starting with `initial`.
    pub fn data(path: &str, len: usize, initial: &[u8]) -> Self {
        let mut bytes = vec![0u8; len];
        let n = initial.len().min(len);
        bytes[..n].copy_from_slice(&initial[..n]);
        Self {
            bytes,
            ..Self::scalar(path, DataTypes::DATA, 0.0)
        }
    }

    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub(super) fn types(&self) -> DataTypes {
        self.types
    }

    pub(super) fn is_writable(&self) -> bool {
        self.writable
    }

    pub(super) fn get(&self) -> f64 {
        self.scalar
    }

    pub(super) fn set(&mut self, value: f64) {
        if self.writable {
            self.scalar = value;
        }
    }

    /// Host-side update, bypassing the writable flag.
    pub(super) fn drive(&mut self, value: f64) {
        self.scalar = value;
    }

    pub(super) fn ints(&self) -> &[i32] {
        &self.ints
    }

    pub(super) fn floats(&self) -> &[f32] {
        &self.floats
    }

    pub(super) fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(super) fn write_ints(&mut self, offset: usize, values: &[i32]) {
        if self.writable {
            copy_clamped(&mut self.ints, offset, values);
        }
    }

    pub(super) fn write_floats(&mut self, offset: usize, values: &[f32]) {
        if self.writable {
            copy_clamped(&mut self.floats, offset, values);
        }
    }

    pub(super) fn write_bytes(&mut self, offset: usize, values: &[u8]) {
        if self.writable {
            copy_clamped(&mut self.bytes, offset, values);
        }
    }
}

/// Copy `src` into `dst` at `offset`, dropping whatever does not fit.
pub(super) fn copy_clamped<T: Copy>(dst: &mut [T], offset: usize, src: &[T]) -> usize {
    if offset >= dst.len() {
        return 0;
    }
    let n = (dst.len() - offset).min(src.len());
    dst[offset..offset + n].copy_from_slice(&src[..n]);
    n
}

/// Published variables, addressed by native id (slot index + 1).
#[derive(Default)]
pub(super) struct DataRefTable {
    slots: Vec<Option<SimDataRef>>,
    by_path: HashMap<String, usize>,
    epoch: u64,
    lookups: Cell<usize>,
}

impl DataRefTable {
    pub fn insert(&mut self, dataref: SimDataRef) -> NativeDataRef {
        if let Some(&index) = self.by_path.get(dataref.path()) {
            self.slots[index] = Some(dataref);
            self.epoch += 1;
            return NativeDataRef(index as u64 + 1);
        }
        let index = self.slots.len();
        self.by_path.insert(dataref.path().to_string(), index);
        self.slots.push(Some(dataref));
        NativeDataRef(index as u64 + 1)
    }

    pub fn remove(&mut self, path: &str) -> Option<SimDataRef> {
        let index = self.by_path.remove(path)?;
        self.epoch += 1;
        self.slots[index].take()
    }

    pub fn find(&self, path: &str) -> Option<NativeDataRef> {
        self.lookups.set(self.lookups.get() + 1);
        self.by_path
            .get(path)
            .map(|&index| NativeDataRef(index as u64 + 1))
    }

    pub fn get(&self, dataref: NativeDataRef) -> Option<&SimDataRef> {
        let index = (dataref.0 as usize).checked_sub(1)?;
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, dataref: NativeDataRef) -> Option<&mut SimDataRef> {
        let index = (dataref.0 as usize).checked_sub(1)?;
        self.slots.get_mut(index)?.as_mut()
    }

    pub fn by_path_mut(&mut self, path: &str) -> Option<&mut SimDataRef> {
        let index = *self.by_path.get(path)?;
        self.slots.get_mut(index)?.as_mut()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn lookups(&self) -> usize {
        self.lookups.get()
    }
}
