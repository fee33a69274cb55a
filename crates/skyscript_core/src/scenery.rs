//! Object loading, terrain probing and magnetic variation.

use crate::error::{BridgeError, Result};
use crate::handle::{Handle, ObjectKind, ProbeHandle, ProbeKind, ResourceKind};
use crate::handle_table::HandleTable;
use crate::host::{Host, NativeObject, NativeProbe, NativeProbeResult, ProbeType};
use glam::Vec3;
use std::collections::HashMap;
use std::fmt;

/// Probe result code: the probe hit terrain.
pub const PROBE_HIT_TERRAIN: i32 = 0;
/// Probe result code: the host reported an error.
pub const PROBE_ERROR: i32 = 1;
/// Probe result code: no terrain under the probe (outside loaded scenery).
pub const PROBE_MISSED: i32 = 2;
/// Probe result code: the probe handle is unknown or was destroyed.
pub const PROBE_INVALID_HANDLE: i32 = -1;

/// Handle for a loaded object: its canonical path.
///
/// Two spellings of the same path (`a/./b.obj`, `a\b.obj`, `a//b.obj`)
/// canonicalize to one handle and share one reference count.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectHandle(String);

impl ObjectHandle {
    pub fn new(path: &str) -> Result<Self> {
        canonicalize_path(path).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lexically normalize an object path. No filesystem access is involved.
pub fn canonicalize_path(path: &str) -> Result<String> {
    let unified = path.trim().replace('\\', "/");
    let absolute = unified.starts_with('/');

    let mut parts: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return Err(BridgeError::invalid("path", format!("'{path}' names no object file")));
    }
    let joined = parts.join("/");
    Ok(if absolute { format!("/{joined}") } else { joined })
}

/// Outcome of `probeTerrain`. Exactly one shape is populated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TerrainProbeResult {
    Hit(TerrainHit),
    Miss { code: i32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainHit {
    pub position: Vec3,
    pub normal: Vec3,
    pub velocity: Vec3,
    pub is_wet: bool,
}

impl TerrainProbeResult {
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Hit(_) => PROBE_HIT_TERRAIN,
            Self::Miss { code } => *code,
        }
    }
}

/// An instance's hold on one loaded object record.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ObjectPin {
    pub(crate) native: NativeObject,
    slot: Handle<ObjectKind>,
}

struct ObjectRecord {
    slot: Handle<ObjectKind>,
    /// Outstanding `loadObject` calls.
    refs: u32,
    /// Live instances placed from this object.
    pins: u32,
}

/// Owns loaded objects (by canonical path) and terrain probes.
pub struct SceneryManager {
    objects: HashMap<String, ObjectRecord>,
    natives: HandleTable<ObjectKind, NativeObject>,
    probes: HandleTable<ProbeKind, NativeProbe>,
}

impl SceneryManager {
    pub fn new() -> Self {
        Self::with_limits(None, None)
    }

    pub fn with_limits(max_objects: Option<usize>, max_probes: Option<usize>) -> Self {
        Self {
            objects: HashMap::new(),
            natives: HandleTable::with_limit(max_objects),
            probes: HandleTable::with_limit(max_probes),
        }
    }

    // ------------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------------

    pub fn load_object<H: Host>(&mut self, host: &mut H, path: &str) -> Result<ObjectHandle> {
        let handle = ObjectHandle::new(path)?;

        if self.record_is_live(host, handle.as_str()) {
            if let Some(record) = self.objects.get_mut(handle.as_str()) {
                record.refs += 1;
                tracing::trace!(path = %handle, refs = record.refs, "object already loaded");
                return Ok(handle);
            }
        }

        let native = host
            .load_object(handle.as_str())
            .ok_or_else(|| BridgeError::ObjectLoadFailed {
                path: handle.as_str().to_string(),
            })?;
        let slot = match self.natives.allocate(native) {
            Ok(slot) => slot,
            Err(err) => {
                host.unload_object(native);
                return Err(err);
            }
        };

        self.objects.insert(
            handle.as_str().to_string(),
            ObjectRecord {
                slot,
                refs: 1,
                pins: 0,
            },
        );
        tracing::debug!(path = %handle, "loaded object");
        Ok(handle)
    }

    /// Drop one reference; native memory goes away once nothing holds the object.
    pub fn unload_object<H: Host>(&mut self, host: &mut H, handle: &ObjectHandle) -> Result<()> {
        let path = handle.as_str();
        if !self.record_is_live(host, path) {
            return Err(not_loaded(path));
        }
        let record = match self.objects.get_mut(path) {
            Some(record) if record.refs > 0 => record,
            _ => return Err(not_loaded(path)),
        };

        record.refs -= 1;
        tracing::debug!(path, refs = record.refs, pins = record.pins, "unloaded object reference");
        self.release_if_unused(host, path);
        Ok(())
    }

    /// True while at least one `loadObject` reference is outstanding.
    pub fn is_loaded<H: Host>(&mut self, host: &H, handle: &ObjectHandle) -> bool {
        self.record_is_live(host, handle.as_str())
            && self
                .objects
                .get(handle.as_str())
                .is_some_and(|record| record.refs > 0)
    }

    pub fn ref_count(&self, path: &str) -> Option<u32> {
        self.objects
            .get(path)
            .map(|record| record.refs)
            .filter(|&refs| refs > 0)
    }

    pub fn loaded_objects(&self) -> usize {
        self.objects.values().filter(|record| record.refs > 0).count()
    }

    /// Keep the native object alive for an instance.
    ///
    /// The returned pin names the exact record it holds, so it can only ever
    /// be released against that record.
    pub(crate) fn pin<H: Host>(&mut self, host: &H, handle: &ObjectHandle) -> Result<ObjectPin> {
        let path = handle.as_str();
        if !self.record_is_live(host, path) {
            return Err(not_loaded(path));
        }
        let record = match self.objects.get_mut(path) {
            Some(record) if record.refs > 0 => record,
            _ => return Err(not_loaded(path)),
        };
        let native = self
            .natives
            .get(record.slot)
            .copied()
            .ok_or_else(|| not_loaded(path))?;
        record.pins += 1;
        Ok(ObjectPin {
            native,
            slot: record.slot,
        })
    }

    /// Release a pin. A pin on a record the host has since torn down is a no-op,
    /// even when the same path has been loaded again.
    pub(crate) fn unpin<H: Host>(&mut self, host: &mut H, path: &str, pin: &ObjectPin) {
        match self.objects.get_mut(path) {
            Some(record) if record.slot == pin.slot => {
                record.pins = record.pins.saturating_sub(1);
            }
            _ => {
                tracing::trace!(path, "pin outlived its object record");
                return;
            }
        }
        self.release_if_unused(host, path);
    }

    fn release_if_unused<H: Host>(&mut self, host: &mut H, path: &str) {
        let unused = self
            .objects
            .get(path)
            .is_some_and(|record| record.refs == 0 && record.pins == 0);
        if !unused {
            return;
        }
        if let Some(record) = self.objects.remove(path) {
            if let Some(native) = self.natives.release(record.slot) {
                if host.object_is_live(native) {
                    host.unload_object(native);
                }
                tracing::debug!(path, "released native object");
            }
        }
    }

    /// Whether a record exists for `path` and the host still holds its object.
    ///
    /// A record whose native object was torn down by the host is forgotten.
    fn record_is_live<H: Host>(&mut self, host: &H, path: &str) -> bool {
        let Some(record) = self.objects.get(path) else {
            return false;
        };
        let live = self
            .natives
            .get(record.slot)
            .is_some_and(|&native| host.object_is_live(native));
        if !live {
            tracing::warn!(path, "object was unloaded by the host, dropping handle");
            if let Some(record) = self.objects.remove(path) {
                self.natives.release(record.slot);
            }
        }
        live
    }

    // ------------------------------------------------------------------------
    // Probes
    // ------------------------------------------------------------------------

    pub fn create_probe<H: Host>(
        &mut self,
        host: &mut H,
        probe_type: ProbeType,
    ) -> Result<ProbeHandle> {
        let native = host
            .create_probe(probe_type)
            .ok_or(BridgeError::HostAllocation {
                kind: ProbeKind::NAME,
            })?;
        match self.probes.allocate(native) {
            Ok(handle) => {
                tracing::debug!(%handle, ?probe_type, "created terrain probe");
                Ok(handle)
            }
            Err(err) => {
                host.destroy_probe(native);
                Err(err)
            }
        }
    }

    pub fn destroy_probe<H: Host>(&mut self, host: &mut H, handle: ProbeHandle) -> Result<()> {
        let native = self
            .probes
            .release(handle)
            .ok_or_else(|| unknown_handle(handle))?;
        if host.probe_is_live(native) {
            host.destroy_probe(native);
        }
        tracing::debug!(%handle, "destroyed terrain probe");
        Ok(())
    }

    /// Fails closed: unknown probes and bad coordinates come back as misses.
    pub fn probe_terrain<H: Host>(
        &mut self,
        host: &mut H,
        handle: ProbeHandle,
        x: f64,
        y: f64,
        z: f64,
    ) -> TerrainProbeResult {
        let Some(&native) = self.probes.get(handle) else {
            return TerrainProbeResult::Miss {
                code: PROBE_INVALID_HANDLE,
            };
        };
        if !host.probe_is_live(native) {
            tracing::warn!(%handle, "probe was destroyed by the host, dropping handle");
            self.probes.release(handle);
            return TerrainProbeResult::Miss {
                code: PROBE_INVALID_HANDLE,
            };
        }
        if !(x.is_finite() && y.is_finite() && z.is_finite()) {
            return TerrainProbeResult::Miss { code: PROBE_ERROR };
        }

        match host.probe_terrain(native, x as f32, y as f32, z as f32) {
            NativeProbeResult::HitTerrain(info) => TerrainProbeResult::Hit(TerrainHit {
                position: Vec3::from(info.location),
                normal: Vec3::from(info.normal),
                velocity: Vec3::from(info.velocity),
                is_wet: info.is_wet,
            }),
            NativeProbeResult::Error => TerrainProbeResult::Miss { code: PROBE_ERROR },
            NativeProbeResult::Missed => TerrainProbeResult::Miss { code: PROBE_MISSED },
        }
    }

    pub fn live_probes(&self) -> usize {
        self.probes.len()
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Destroy all probes and unload all objects. Instances must be gone first.
    ///
    /// Returns `(objects, probes)` released.
    pub fn teardown<H: Host>(&mut self, host: &mut H) -> (usize, usize) {
        let probes = self.probes.drain();
        for (_, native) in &probes {
            if host.probe_is_live(*native) {
                host.destroy_probe(*native);
            }
        }

        let objects = self.natives.drain();
        for (_, native) in &objects {
            if host.object_is_live(*native) {
                host.unload_object(*native);
            }
        }
        self.objects.clear();
        (objects.len(), probes.len())
    }
}

impl Default for SceneryManager {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Magnetic variation
// ============================================================================

/// Wrap a heading into `[0, 360)`.
pub fn normalize_heading(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

pub fn magnetic_variation<H: Host>(host: &H, latitude: f64, longitude: f64) -> Result<f64> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(BridgeError::invalid("latitude", format!("{latitude} is outside [-90, 90]")));
    }
    if !longitude.is_finite() {
        return Err(BridgeError::invalid("longitude", format!("{longitude} is not finite")));
    }
    Ok(host.magnetic_variation(latitude, longitude) as f64)
}

pub fn deg_true_to_magnetic<H: Host>(host: &H, heading: f64) -> Result<f64> {
    let heading = finite_heading(heading)?;
    Ok(normalize_heading(host.deg_true_to_magnetic(heading) as f64))
}

pub fn deg_magnetic_to_true<H: Host>(host: &H, heading: f64) -> Result<f64> {
    let heading = finite_heading(heading)?;
    Ok(normalize_heading(host.deg_magnetic_to_true(heading) as f64))
}

fn finite_heading(heading: f64) -> Result<f32> {
    if heading.is_finite() {
        Ok(normalize_heading(heading) as f32)
    } else {
        Err(BridgeError::invalid("heading", format!("{heading} is not finite")))
    }
}

fn not_loaded(path: &str) -> BridgeError {
    BridgeError::ObjectNotLoaded {
        path: path.to_string(),
    }
}

pub(crate) fn unknown_handle<K: ResourceKind>(handle: Handle<K>) -> BridgeError {
    BridgeError::UnknownHandle {
        kind: K::NAME,
        handle: handle.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sim::{SimHost, TerrainPatch};

    const TUG: &str = "lib/airport/vehicles/pushback/tug.obj";
    const TRUCK: &str = "lib/airport/vehicles/fuel/truck.obj";

    fn host() -> SimHost {
        let mut host = SimHost::new();
        host.add_object_file(TUG);
        host.add_object_file(TRUCK);
        host.add_terrain(TerrainPatch::new(-500.0, 500.0, -500.0, 500.0, 132.5));
        host.add_terrain(TerrainPatch::new(1000.0, 2000.0, -500.0, 500.0, 120.0).wet());
        host
    }

    #[test]
    fn test_canonicalize_path() {
        assert_eq!(canonicalize_path("a/./b.obj").unwrap(), "a/b.obj");
        assert_eq!(canonicalize_path("a//b.obj").unwrap(), "a/b.obj");
        assert_eq!(canonicalize_path("a\\b.obj").unwrap(), "a/b.obj");
        assert_eq!(canonicalize_path("a/c/../b.obj").unwrap(), "a/b.obj");
        assert_eq!(canonicalize_path("../shared/b.obj").unwrap(), "../shared/b.obj");
        assert_eq!(canonicalize_path("/x/../y.obj").unwrap(), "/y.obj");
        assert_eq!(canonicalize_path("  a/b.obj ").unwrap(), "a/b.obj");
        assert!(canonicalize_path("").is_err());
        assert!(canonicalize_path("./").is_err());
    }

    #[test]
    fn test_reference_counting() {
        let mut host = host();
        let mut scenery = SceneryManager::new();

        let first = scenery.load_object(&mut host, TUG).unwrap();
        let second = scenery.load_object(&mut host, TUG).unwrap();
        assert_eq!(first, second);
        assert_eq!(scenery.ref_count(TUG), Some(2));
        assert_eq!(host.live_objects(), 1);

        scenery.unload_object(&mut host, &first).unwrap();
        assert!(scenery.is_loaded(&host, &first));
        assert_eq!(host.live_objects(), 1);

        scenery.unload_object(&mut host, &first).unwrap();
        assert!(!scenery.is_loaded(&host, &first));
        assert_eq!(host.live_objects(), 0);
    }

    #[test]
    fn test_spellings_share_reference_count() {
        let mut host = host();
        let mut scenery = SceneryManager::new();
        let plain = scenery.load_object(&mut host, TUG).unwrap();
        let odd = scenery
            .load_object(&mut host, "lib\\airport//vehicles/./pushback/tug.obj")
            .unwrap();
        assert_eq!(plain, odd);
        assert_eq!(scenery.ref_count(TUG), Some(2));
    }

    #[test]
    fn test_unload_released_handle_is_idempotent() {
        let mut host = host();
        let mut scenery = SceneryManager::new();
        let tug = scenery.load_object(&mut host, TUG).unwrap();
        let truck = scenery.load_object(&mut host, TRUCK).unwrap();

        scenery.unload_object(&mut host, &tug).unwrap();
        let err = scenery.unload_object(&mut host, &tug).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(scenery.ref_count(TRUCK), Some(1));
        assert!(scenery.is_loaded(&host, &truck));
    }

    #[test]
    fn test_missing_file_fails_load() {
        let mut host = host();
        let mut scenery = SceneryManager::new();
        let err = scenery.load_object(&mut host, "nope.obj").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(scenery.loaded_objects(), 0);
    }

    #[test]
    fn test_object_limit_unloads_native() {
        let mut host = host();
        let mut scenery = SceneryManager::with_limits(Some(1), None);
        scenery.load_object(&mut host, TUG).unwrap();
        let err = scenery.load_object(&mut host, TRUCK).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceExhausted);
        assert_eq!(host.live_objects(), 1);
    }

    #[test]
    fn test_host_eviction_invalidates_handle() {
        let mut host = host();
        let mut scenery = SceneryManager::new();
        let tug = scenery.load_object(&mut host, TUG).unwrap();

        host.evict_objects(TUG);
        assert!(!scenery.is_loaded(&host, &tug));
        assert_eq!(
            scenery.unload_object(&mut host, &tug).unwrap_err().kind(),
            ErrorKind::NotFound
        );

        // A fresh load goes back to the host
        scenery.load_object(&mut host, TUG).unwrap();
        assert_eq!(scenery.ref_count(TUG), Some(1));
        assert_eq!(host.live_objects(), 1);
    }

    #[test]
    fn test_probe_hits_flat_terrain() {
        let mut host = host();
        let mut scenery = SceneryManager::new();
        let probe = scenery.create_probe(&mut host, ProbeType::Y).unwrap();

        match scenery.probe_terrain(&mut host, probe, 0.0, 0.0, 0.0) {
            TerrainProbeResult::Hit(hit) => {
                assert_eq!(hit.position, Vec3::new(0.0, 132.5, 0.0));
                assert_eq!(hit.normal, Vec3::Y);
                assert!(!hit.is_wet);
            }
            miss => panic!("expected hit, got {miss:?}"),
        }

        let lake = scenery.probe_terrain(&mut host, probe, 1500.0, 300.0, 0.0);
        assert!(matches!(lake, TerrainProbeResult::Hit(hit) if hit.is_wet));

        let outside = scenery.probe_terrain(&mut host, probe, 90_000.0, 0.0, 0.0);
        assert_eq!(outside, TerrainProbeResult::Miss { code: PROBE_MISSED });
    }

    #[test]
    fn test_destroyed_probe_misses_with_invalid_handle() {
        let mut host = host();
        let mut scenery = SceneryManager::new();
        let probe = scenery.create_probe(&mut host, ProbeType::Y).unwrap();
        scenery.destroy_probe(&mut host, probe).unwrap();

        let result = scenery.probe_terrain(&mut host, probe, 0.0, 0.0, 0.0);
        assert_eq!(result.code(), PROBE_INVALID_HANDLE);
        assert!(scenery.destroy_probe(&mut host, probe).is_err());
        assert_eq!(host.live_probes(), 0);
    }

    #[test]
    fn test_host_destroyed_probe_is_dropped_lazily() {
        let mut host = host();
        let mut scenery = SceneryManager::new();
        let probe = scenery.create_probe(&mut host, ProbeType::Y).unwrap();
        host.evict_probes();

        assert_eq!(scenery.live_probes(), 1);
        let result = scenery.probe_terrain(&mut host, probe, 0.0, 0.0, 0.0);
        assert_eq!(result.code(), PROBE_INVALID_HANDLE);
        assert_eq!(scenery.live_probes(), 0);
    }

    #[test]
    fn test_non_finite_probe_coordinates() {
        let mut host = host();
        let mut scenery = SceneryManager::new();
        let probe = scenery.create_probe(&mut host, ProbeType::Y).unwrap();
        let result = scenery.probe_terrain(&mut host, probe, f64::NAN, 0.0, 0.0);
        assert_eq!(result.code(), PROBE_ERROR);
    }

    #[test]
    fn test_teardown_releases_everything() {
        let mut host = host();
        let mut scenery = SceneryManager::new();
        scenery.load_object(&mut host, TUG).unwrap();
        scenery.load_object(&mut host, TUG).unwrap();
        scenery.load_object(&mut host, TRUCK).unwrap();
        scenery.create_probe(&mut host, ProbeType::Y).unwrap();

        assert_eq!(scenery.teardown(&mut host), (2, 1));
        assert_eq!(host.live_objects(), 0);
        assert_eq!(host.live_probes(), 0);
        assert_eq!(scenery.loaded_objects(), 0);
    }

    #[test]
    fn test_normalize_heading() {
        assert_eq!(normalize_heading(370.0), 10.0);
        assert_eq!(normalize_heading(-10.0), 350.0);
        assert_eq!(normalize_heading(360.0), 0.0);
        assert!(normalize_heading(-1e-20) < 360.0);
    }

    #[test]
    fn test_magnetic_helpers_invert() {
        let host = host();
        let variation = magnetic_variation(&host, 47.46, -122.31).unwrap();
        assert!(variation.abs() < 45.0);
        assert!(magnetic_variation(&host, 91.0, 0.0).is_err());

        let magnetic = deg_true_to_magnetic(&host, 90.0).unwrap();
        let back = deg_magnetic_to_true(&host, magnetic).unwrap();
        assert!((back - 90.0).abs() < 1e-3);
        assert!(deg_true_to_magnetic(&host, f64::NAN).is_err());
    }
}
