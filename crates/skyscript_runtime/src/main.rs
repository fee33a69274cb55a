//! SkyScript Runtime
//!
//! Boots logging, loads settings, discovers apps and drives their frame
//! callbacks against the simulated host.

use anyhow::{Context, Result};
use skyscript_core::sim::SimHost;
use skyscript_core::Bridge;
use skyscript_metrics::FrameProfiler;
use skyscript_script::{ScriptRuntime, SharedBridge};
use skyscript_services::{discover_apps, AppInfo, Settings};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

const DEFAULT_SETTINGS: &str = "skyscript.json";
const FRAME_CALLBACK: &str = "onFrame";

struct LoadedApp {
    info: AppInfo,
    runtime: ScriptRuntime,
    enabled: bool,
}

fn main() -> Result<()> {
    let settings_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS));
    let settings = Settings::load_or_default(&settings_path)
        .with_context(|| format!("loading {}", settings_path.display()))?;

    tracing_subscriber::fmt()
        .with_max_level(settings.logging.max_level()?)
        .init();

    tracing::info!("SkyScript v{}", skyscript_core::VERSION);

    let bridge: SharedBridge<SimHost> = Rc::new(RefCell::new(Bridge::with_config(
        SimHost::demo(),
        &settings.bridge,
    )));

    let apps = discover_apps(&settings.runtime.apps_dir, &settings.runtime.entry_script)?;
    tracing::info!(
        count = apps.len(),
        dir = %settings.runtime.apps_dir.display(),
        "apps discovered"
    );

    let mut loaded = Vec::with_capacity(apps.len());
    for info in apps {
        match start_app(&info, &bridge) {
            Ok(runtime) => loaded.push(LoadedApp {
                info,
                runtime,
                enabled: true,
            }),
            Err(err) => tracing::error!(app = %info.name, "failed to start: {err:#}"),
        }
    }

    let dt = settings.runtime.frame_interval();
    let mut profiler = FrameProfiler::new();
    for frame in 0..settings.runtime.frames {
        bridge.borrow_mut().host_mut().tick(dt);
        for app in loaded.iter_mut().filter(|app| app.enabled) {
            let outcome = profiler.time_app(&app.info.name, || {
                app.runtime.call_if_present(FRAME_CALLBACK, dt)
            });
            if let Err(err) = outcome {
                tracing::error!(
                    app = %app.info.name,
                    frame,
                    "{FRAME_CALLBACK} failed, disabling app: {err}"
                );
                app.enabled = false;
            }
        }
    }

    for app in &loaded {
        tracing::info!(
            app = %app.info.name,
            frames = profiler.frames(&app.info.name),
            avg_ms = profiler.average_ms(&app.info.name),
            worst_ms = profiler.worst(&app.info.name).as_secs_f64() * 1000.0,
            "frame timing"
        );
    }

    // Scripts go first so nothing can call into the bridge mid-teardown.
    drop(loaded);
    let mut bridge = bridge.borrow_mut();
    let report = bridge.teardown();
    tracing::info!(released = report.total(), "bridge torn down");

    for (op, tally) in bridge.calls().sorted() {
        tracing::info!(op, ok = tally.ok, failed = tally.failed, "bridge calls");
    }

    Ok(())
}

fn start_app(info: &AppInfo, bridge: &SharedBridge<SimHost>) -> Result<ScriptRuntime> {
    tracing::info!(app = %info.name, version = %info.version, "starting app");
    let runtime = ScriptRuntime::for_app(&info.name, bridge)?;
    runtime
        .execute_file(&info.entry)
        .with_context(|| format!("evaluating {}", info.entry.display()))?;
    Ok(runtime)
}
