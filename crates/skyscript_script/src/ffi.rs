//! FFI layer between Rust handles and script numbers
//!
//! Scripts hold resource handles as plain numbers. The generation-tagged
//! bits always fit in a double's 53-bit mantissa, so the round trip is exact.

use skyscript_core::handle::{Handle, ResourceKind};

/// Largest integer a JavaScript number represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Opaque handle as seen by scripts
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScriptHandle(pub u64);

impl ScriptHandle {
    /// Accepts only non-negative integral numbers in the safe range.
    pub fn from_number(value: f64) -> Option<Self> {
        let integral = value.is_finite() && value.fract() == 0.0;
        if integral && (0.0..=MAX_SAFE_INTEGER).contains(&value) {
            Some(Self(value as u64))
        } else {
            None
        }
    }

    pub fn to_number(self) -> f64 {
        self.0 as f64
    }
}

impl<K: ResourceKind> From<Handle<K>> for ScriptHandle {
    fn from(handle: Handle<K>) -> Self {
        ScriptHandle(handle.to_bits())
    }
}

impl<K: ResourceKind> From<ScriptHandle> for Handle<K> {
    fn from(handle: ScriptHandle) -> Self {
        Handle::from_bits(handle.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skyscript_core::handle::ProbeHandle;

    #[test]
    fn test_rejects_non_handles() {
        assert!(ScriptHandle::from_number(-1.0).is_none());
        assert!(ScriptHandle::from_number(1.5).is_none());
        assert!(ScriptHandle::from_number(f64::NAN).is_none());
        assert!(ScriptHandle::from_number(1e300).is_none());
        assert_eq!(ScriptHandle::from_number(4294967296.0), Some(ScriptHandle(1 << 32)));
    }

    #[test]
    fn test_number_round_trip() {
        let bits = (7u64 << 32) | 3;
        let probe = ProbeHandle::from_bits(bits);
        let number = ScriptHandle::from(probe).to_number();
        let back: ProbeHandle = ScriptHandle::from_number(number).unwrap().into();
        assert_eq!(back, probe);
    }
}
