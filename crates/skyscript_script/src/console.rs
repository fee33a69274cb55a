//! `console` global that forwards to tracing.

use rquickjs::prelude::Rest;
use rquickjs::{Ctx, Function, Object, Value};

#[derive(Debug, Clone, Copy)]
enum Level {
    Debug,
    Log,
    Info,
    Warn,
    Error,
}

impl Level {
    const ALL: [Level; 5] = [Level::Debug, Level::Log, Level::Info, Level::Warn, Level::Error];

    fn method(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Log => "log",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }

    fn emit(self, app: &str, message: &str) {
        match self {
            Level::Debug => tracing::debug!(app, "{message}"),
            Level::Log | Level::Info => tracing::info!(app, "{message}"),
            Level::Warn => tracing::warn!(app, "{message}"),
            Level::Error => tracing::error!(app, "{message}"),
        }
    }
}

/// Bind `console.{debug,log,info,warn,error}` for the app named `app`.
pub fn install_console<'js>(ctx: &Ctx<'js>, app: &str) -> rquickjs::Result<()> {
    let console = Object::new(ctx.clone())?;
    for level in Level::ALL {
        let app = app.to_string();
        let function = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, Rest(args): Rest<Value<'js>>| {
                let message = args
                    .iter()
                    .map(|value| display(&ctx, value))
                    .collect::<Vec<_>>()
                    .join(" ");
                level.emit(&app, &message);
            },
        )?;
        console.set(level.method(), function)?;
    }
    ctx.globals().set("console", console)
}

/// Render a value the way a browser console would, roughly.
fn display<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> String {
    if let Some(text) = value.as_string() {
        return text.to_string().unwrap_or_default();
    }
    if let Some(number) = value.as_number() {
        return number.to_string();
    }
    if let Some(flag) = value.as_bool() {
        return flag.to_string();
    }
    if value.is_null() {
        return "null".to_string();
    }
    if value.is_undefined() {
        return "undefined".to_string();
    }
    if value.is_function() {
        return "[function]".to_string();
    }
    match ctx.json_stringify(value.clone()) {
        Ok(Some(json)) => json.to_string().unwrap_or_default(),
        _ => format!("[{:?}]", value.type_of()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    #[test]
    fn test_display_values() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(|ctx| {
            let render = |source: &str| {
                let value: Value = ctx.eval(source).unwrap();
                display(&ctx, &value)
            };
            assert_eq!(render("'hello'"), "hello");
            assert_eq!(render("42"), "42");
            assert_eq!(render("1.5"), "1.5");
            assert_eq!(render("null"), "null");
            assert_eq!(render("({a: 1})"), r#"{"a":1}"#);
        });
    }

    #[test]
    fn test_console_methods_do_not_throw() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(|ctx| {
            install_console(&ctx, "test-app").unwrap();
            ctx.eval::<(), _>("console.log('a', 1, {b: 2}); console.warn(); console.error(null);")
                .unwrap();
        });
    }
}
