//! Script runtime management
//!
//! One QuickJS runtime and context per app. Apps never share globals.

use crate::bindings::{install_bridge, SharedBridge};
use crate::console::install_console;
use rquickjs::function::IntoArgs;
use rquickjs::{CatchResultExt, Context, Ctx, Runtime, Value};
use skyscript_core::Host;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("QuickJS engine error: {0}")]
    Engine(#[from] rquickjs::Error),

    #[error("failed to read script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("uncaught exception: {0}")]
    Exception(String),

    #[error("global '{0}' is not a function")]
    NotCallable(String),
}

/// Script execution context
pub struct ScriptRuntime {
    runtime: Runtime,
    context: Context,
}

impl ScriptRuntime {
    pub fn new() -> Result<Self, ScriptError> {
        let runtime = Runtime::new()?;
        let context = Context::full(&runtime)?;

        Ok(Self { runtime, context })
    }

    /// A runtime with `console` and the `XPlane` API installed.
    pub fn for_app<H: Host + 'static>(
        app: &str,
        bridge: &SharedBridge<H>,
    ) -> Result<Self, ScriptError> {
        let runtime = Self::new()?;
        runtime.context.with(|ctx| -> rquickjs::Result<()> {
            install_console(&ctx, app)?;
            install_bridge(&ctx, bridge)
        })?;
        Ok(runtime)
    }

    pub fn with<F, R>(&self, f: F) -> R
    where
        F: FnOnce(Ctx<'_>) -> R,
    {
        self.context.with(f)
    }

    pub fn execute_file(&self, path: &Path) -> Result<(), ScriptError> {
        let source = std::fs::read_to_string(path).map_err(|source| ScriptError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.execute(&source)
    }

    pub fn execute(&self, source: &str) -> Result<(), ScriptError> {
        self.context.with(|ctx| {
            ctx.eval::<(), _>(source)
                .catch(&ctx)
                .map_err(|err| ScriptError::Exception(err.to_string()))
        })
    }

    /// Call a global JavaScript function by name with no arguments.
    pub fn call_function(&self, name: &str) -> Result<(), ScriptError> {
        match self.call_global(name, ())? {
            true => Ok(()),
            false => Err(ScriptError::NotCallable(name.to_string())),
        }
    }

    /// Call `name(dt)` if the script defined it. Returns whether it ran.
    pub fn call_if_present(&self, name: &str, dt: f64) -> Result<bool, ScriptError> {
        self.call_global(name, (dt,))
    }

    fn call_global<A>(&self, name: &str, args: A) -> Result<bool, ScriptError>
    where
        A: for<'js> IntoArgs<'js>,
    {
        self.context.with(|ctx| {
            let value: Value = ctx.globals().get(name)?;
            let Some(function) = value.as_function() else {
                return Ok(false);
            };
            function
                .call::<_, ()>(args)
                .catch(&ctx)
                .map_err(|err| ScriptError::Exception(err.to_string()))?;
            Ok(true)
        })
    }

    pub fn run_gc(&self) {
        self.runtime.run_gc();
    }
}
