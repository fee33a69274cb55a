//! Generation-tagged handles for native resources
//!
//! A handle is a lightweight (8 byte) reference into a [`HandleTable`].
//! The generation counter makes stale handles detectable: once a slot is
//! released its generation moves on, so every handle issued for the old
//! occupant stops resolving.
//!
//! [`HandleTable`]: crate::handle_table::HandleTable

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Marker trait naming one handle space.
pub trait ResourceKind: 'static {
    const NAME: &'static str;
}

/// Scene geometry loaded from an object file.
pub enum ObjectKind {}

/// A placement of a loaded object in the world.
pub enum InstanceKind {}

/// A terrain query context.
pub enum ProbeKind {}

impl ResourceKind for ObjectKind {
    const NAME: &'static str = "object";
}

impl ResourceKind for InstanceKind {
    const NAME: &'static str = "instance";
}

impl ResourceKind for ProbeKind {
    const NAME: &'static str = "probe";
}

pub type InstanceHandle = Handle<InstanceKind>;
pub type ProbeHandle = Handle<ProbeKind>;

/// Highest generation a slot may carry.
///
/// Keeps `to_bits()` below 2^53 so the value survives a round trip through
/// a JavaScript number.
pub const MAX_GENERATION: u32 = (1 << 21) - 1;

/// Handle into the `K` handle space.
///
/// Format: [21-bit generation | 32-bit index]
/// - Index: slot position in the owning table
/// - Generation: bumped when the slot is released (starts at 1)
pub struct Handle<K> {
    index: u32,
    generation: u32,
    _kind: PhantomData<fn() -> K>,
}

impl<K: ResourceKind> Handle<K> {
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            _kind: PhantomData,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Serialize to a 64-bit integer (what scripts hold).
    pub fn to_bits(&self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    /// Deserialize from a 64-bit integer.
    ///
    /// Any bit pattern is accepted; a pattern that was never issued simply
    /// fails to resolve in the table.
    pub fn from_bits(bits: u64) -> Self {
        Self::new(bits as u32, (bits >> 32) as u32)
    }
}

impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<K> Eq for Handle<K> {}

impl<K> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<K: ResourceKind> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}v{})", K::NAME, self.index, self.generation)
    }
}

impl<K: ResourceKind> fmt::Display for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_bits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_round_trip() {
        let handle = ProbeHandle::new(7, 3);
        let bits = handle.to_bits();
        assert_eq!(bits, (3u64 << 32) | 7);
        assert_eq!(ProbeHandle::from_bits(bits), handle);
    }

    #[test]
    fn test_max_handle_is_script_safe() {
        let handle = InstanceHandle::new(u32::MAX, MAX_GENERATION);
        assert!(handle.to_bits() < (1u64 << 53));
    }

    #[test]
    fn test_debug_names_kind() {
        assert_eq!(format!("{:?}", InstanceHandle::new(2, 1)), "instance(2v1)");
    }
}
