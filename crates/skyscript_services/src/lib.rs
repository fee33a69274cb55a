//! SkyScript Services Layer
//!
//! Settings file and app discovery for the runtime.

pub mod apps;
pub mod settings;

pub use apps::{discover_apps, AppInfo, DiscoveryError};
pub use settings::{Settings, SettingsError};
