//! SkyScript Core
//!
//! Owns everything between a script call and the native simulator:
//! - Dataref resolution and value marshalling
//! - Generation-tagged handle tables for native resources
//! - Object, probe and instance lifetimes
//! - Local/world coordinate conversion
//!
//! The simulator itself is abstracted behind [`host::Host`]; [`sim`] provides
//! an in-memory implementation.

pub mod bridge;
pub mod coords;
pub mod dataref;
pub mod error;
pub mod handle;
pub mod handle_table;
pub mod host;
pub mod instance;
pub mod scenery;
pub mod sim;

pub use bridge::{Bridge, BridgeConfig, TeardownReport};
pub use coords::{LocalCoordinates, WorldCoordinates};
pub use dataref::{DataTypes, Span};
pub use error::{BridgeError, ErrorKind, Result};
pub use handle::{Handle, InstanceHandle, ProbeHandle, ResourceKind};
pub use host::{Host, ProbeType};
pub use instance::InstancePosition;
pub use scenery::{ObjectHandle, TerrainHit, TerrainProbeResult};

pub use glam;

/// Bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
