//! Dataref access: name resolution and value marshalling.

pub mod marshal;
mod registry;

pub use marshal::{ArrayElement, Span};
pub use registry::{Registry, VariableDescriptor};

bitflags::bitflags! {
    /// Representations a dataref can be read or written as.
    ///
    /// Bit values match the host SDK's type ids.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DataTypes: u32 {
        const INT = 1;
        const FLOAT = 2;
        const DOUBLE = 4;
        const FLOAT_ARRAY = 8;
        const INT_ARRAY = 16;
        const DATA = 32;
    }
}

impl DataTypes {
    pub fn is_array(self) -> bool {
        self.intersects(Self::INT_ARRAY | Self::FLOAT_ARRAY)
    }
}
