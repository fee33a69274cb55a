//! App discovery
//!
//! Every subdirectory of the apps directory is one app. An optional
//! `app.json` next to the entry script supplies display metadata.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MANIFEST_FILE: &str = "app.json";

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to list apps in {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub name: String,
    pub description: String,
    pub version: String,
    pub dir: PathBuf,
    pub entry: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Manifest {
    name: Option<String>,
    description: String,
    version: String,
}

/// List the runnable apps under `root`, sorted by name.
///
/// A missing `root` yields no apps. Directories without `entry_script`, or
/// with an unreadable `app.json`, are skipped with a warning.
pub fn discover_apps(root: &Path, entry_script: &str) -> Result<Vec<AppInfo>, DiscoveryError> {
    if !root.is_dir() {
        tracing::warn!(path = %root.display(), "apps directory not found");
        return Ok(Vec::new());
    }

    let io_err = |source| DiscoveryError::Io {
        path: root.to_path_buf(),
        source,
    };

    let mut apps: Vec<AppInfo> = Vec::new();
    for entry in std::fs::read_dir(root).map_err(io_err)? {
        let dir = entry.map_err(io_err)?.path();
        if !dir.is_dir() {
            continue;
        }
        let Some(app) = inspect(&dir, entry_script) else {
            continue;
        };
        if apps.iter().any(|other| other.name == app.name) {
            tracing::warn!(app = %app.name, dir = %dir.display(), "duplicate app name, skipping");
            continue;
        }
        tracing::debug!(app = %app.name, entry = %app.entry.display(), "discovered app");
        apps.push(app);
    }

    apps.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(apps)
}

fn inspect(dir: &Path, entry_script: &str) -> Option<AppInfo> {
    let entry = dir.join(entry_script);
    if !entry.is_file() {
        tracing::warn!(dir = %dir.display(), entry_script, "app has no entry script, skipping");
        return None;
    }

    let manifest = match read_manifest(&dir.join(MANIFEST_FILE)) {
        Ok(manifest) => manifest,
        Err(reason) => {
            tracing::warn!(dir = %dir.display(), %reason, "unreadable app manifest, skipping");
            return None;
        }
    };

    let name = manifest
        .name
        .filter(|name| !name.trim().is_empty())
        .or_else(|| dir.file_name().map(|name| name.to_string_lossy().into_owned()))?;

    Some(AppInfo {
        name,
        description: manifest.description,
        version: manifest.version,
        dir: dir.to_path_buf(),
        entry,
    })
}

fn read_manifest(path: &Path) -> Result<Manifest, String> {
    if !path.exists() {
        return Ok(Manifest::default());
    }
    let text = std::fs::read_to_string(path).map_err(|err| err.to_string())?;
    serde_json::from_str(&text).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempdir::TempDir;

    fn app(root: &Path, dir: &str, manifest: Option<&str>) {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("main.js"), "function onFrame(dt) {}").unwrap();
        if let Some(manifest) = manifest {
            fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
        }
    }

    #[test]
    fn test_missing_root_is_empty() {
        let root = TempDir::new("skyscript-apps").unwrap();
        let apps = discover_apps(&root.path().join("apps"), "main.js").unwrap();
        assert!(apps.is_empty());
    }

    #[test]
    fn test_discovers_sorted_apps() {
        let root = TempDir::new("skyscript-apps").unwrap();
        app(root.path(), "zulu", None);
        app(
            root.path(),
            "pushback",
            Some(r#"{"name": "Ground Tug", "description": "Pushback helper", "version": "1.2.0"}"#),
        );
        app(root.path(), "alpha", Some(r#"{"version": "0.1"}"#));
        fs::write(root.path().join("README.txt"), "not an app").unwrap();

        let apps = discover_apps(root.path(), "main.js").unwrap();
        let names: Vec<_> = apps.iter().map(|app| app.name.as_str()).collect();
        assert_eq!(names, ["Ground Tug", "alpha", "zulu"]);

        let tug = &apps[0];
        assert_eq!(tug.description, "Pushback helper");
        assert_eq!(tug.version, "1.2.0");
        assert_eq!(tug.entry, root.path().join("pushback").join("main.js"));
        assert_eq!(apps[1].version, "0.1");
        assert_eq!(apps[2].description, "");
    }

    #[test]
    fn test_skips_broken_apps() {
        let root = TempDir::new("skyscript-apps").unwrap();
        app(root.path(), "good", None);
        app(root.path(), "bad-manifest", Some("{ nope"));
        fs::create_dir_all(root.path().join("no-entry")).unwrap();

        let apps = discover_apps(root.path(), "main.js").unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].name, "good");
    }

    #[test]
    fn test_duplicate_names_keep_one() {
        let root = TempDir::new("skyscript-apps").unwrap();
        app(root.path(), "one", Some(r#"{"name": "Same"}"#));
        app(root.path(), "two", Some(r#"{"name": "Same"}"#));
        let apps = discover_apps(root.path(), "main.js").unwrap();
        assert_eq!(apps.len(), 1);
    }

    #[test]
    fn test_custom_entry_script() {
        let root = TempDir::new("skyscript-apps").unwrap();
        app(root.path(), "js-only", None);
        assert!(discover_apps(root.path(), "index.js").unwrap().is_empty());
    }
}
