//! SkyScript Scripting Layer
//!
//! JavaScript apps run on QuickJS, one context per app.
//!
//! ## Architecture
//!
//! - **Runtime:** [`ScriptRuntime`] wraps the QuickJS runtime and context
//! - **Bindings:** the `XPlane` global forwards into a shared [`skyscript_core::Bridge`]
//! - **FFI:** native handles cross into scripts as plain numbers ([`ffi::ScriptHandle`])
//! - **Console:** `console.*` output goes to `tracing`, tagged with the app name

pub mod bindings;
pub mod console;
pub mod ffi;
pub mod runtime;

pub use bindings::{install_bridge, SharedBridge};
pub use console::install_console;
pub use runtime::{ScriptError, ScriptRuntime};

pub use rquickjs;
