//! Single owner of all bridge state.
//!
//! Every operation scripts can reach goes through a method here. Methods
//! return `Result`; turning failures into script sentinels is the binding
//! layer's job.

use crate::coords::{self, LocalCoordinates, WorldCoordinates};
use crate::dataref::{marshal, DataTypes, Registry, Span};
use crate::error::{BridgeError, Result};
use crate::handle::{InstanceHandle, ProbeHandle};
use crate::host::{Host, ProbeType};
use crate::instance::{InstanceManager, InstancePosition};
use crate::scenery::{self, ObjectHandle, SceneryManager, TerrainProbeResult};
use serde::{Deserialize, Serialize};
use skyscript_metrics::CallCounter;

/// Per-kind caps on live handles. `None` means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub max_objects: Option<usize>,
    pub max_instances: Option<usize>,
    pub max_probes: Option<usize>,
}

/// What `teardown` released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub instances: usize,
    pub probes: usize,
    pub objects: usize,
}

impl TeardownReport {
    pub fn total(&self) -> usize {
        self.instances + self.probes + self.objects
    }
}

pub struct Bridge<H: Host> {
    host: H,
    registry: Registry,
    scenery: SceneryManager,
    instances: InstanceManager,
    calls: CallCounter,
}

impl<H: Host> Bridge<H> {
    pub fn new(host: H) -> Self {
        Self::with_config(host, &BridgeConfig::default())
    }

    pub fn with_config(host: H, config: &BridgeConfig) -> Self {
        Self {
            host,
            registry: Registry::new(),
            scenery: SceneryManager::with_limits(config.max_objects, config.max_probes),
            instances: InstanceManager::with_limit(config.max_instances),
            calls: CallCounter::new(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Direct host access for frame driving. Not reachable from scripts.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn calls(&self) -> &CallCounter {
        &self.calls
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn scenery(&self) -> &SceneryManager {
        &self.scenery
    }

    pub fn instances(&self) -> &InstanceManager {
        &self.instances
    }

    fn record<T>(&mut self, op: &'static str, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            tracing::debug!(op, error = %err, "bridge call failed");
        }
        self.calls.record(op, result.is_ok());
        result
    }

    /// Account for a call rejected before it reached the bridge
    /// (malformed script arguments).
    pub fn reject(&mut self, op: &'static str, err: BridgeError) -> BridgeError {
        tracing::debug!(op, error = %err, "bridge call rejected");
        self.calls.record(op, false);
        err
    }

    // ------------------------------------------------------------------------
    // XPlane.dataref
    // ------------------------------------------------------------------------

    pub fn find(&mut self, path: &str) -> Result<()> {
        let result = self.registry.resolve(&self.host, path).map(|_| ());
        self.record("dataref.find", result)
    }

    pub fn can_write(&mut self, path: &str) -> Result<bool> {
        let result = self.registry.can_write(&self.host, path);
        self.record("dataref.canWrite", result)
    }

    pub fn get_types(&mut self, path: &str) -> Result<DataTypes> {
        let result = self.registry.types(&self.host, path);
        self.record("dataref.getTypes", result)
    }

    pub fn get_int(&mut self, path: &str) -> Result<i32> {
        let result = self
            .registry
            .resolve(&self.host, path)
            .and_then(|descriptor| marshal::read_int(&self.host, descriptor));
        self.record("dataref.getInt", result)
    }

    pub fn get_float(&mut self, path: &str) -> Result<f32> {
        let result = self
            .registry
            .resolve(&self.host, path)
            .and_then(|descriptor| marshal::read_float(&self.host, descriptor));
        self.record("dataref.getFloat", result)
    }

    pub fn get_double(&mut self, path: &str) -> Result<f64> {
        let result = self
            .registry
            .resolve(&self.host, path)
            .and_then(|descriptor| marshal::read_double(&self.host, descriptor));
        self.record("dataref.getDouble", result)
    }

    pub fn get_int_array(&mut self, path: &str, span: Span) -> Result<Vec<i32>> {
        let result = self
            .registry
            .resolve(&self.host, path)
            .and_then(|descriptor| marshal::read_array(&self.host, descriptor, span));
        self.record("dataref.getIntArray", result)
    }

    pub fn get_float_array(&mut self, path: &str, span: Span) -> Result<Vec<f32>> {
        let result = self
            .registry
            .resolve(&self.host, path)
            .and_then(|descriptor| marshal::read_array(&self.host, descriptor, span));
        self.record("dataref.getFloatArray", result)
    }

    pub fn get_data(&mut self, path: &str, span: Span) -> Result<Vec<u8>> {
        let result = self
            .registry
            .resolve(&self.host, path)
            .and_then(|descriptor| marshal::read_bytes(&self.host, descriptor, span));
        self.record("dataref.getData", result)
    }

    pub fn set_int(&mut self, path: &str, value: i32) -> Result<()> {
        let result = self
            .registry
            .resolve(&self.host, path)
            .and_then(|descriptor| marshal::write_int(&mut self.host, descriptor, value));
        self.record("dataref.setInt", result)
    }

    pub fn set_float(&mut self, path: &str, value: f32) -> Result<()> {
        let result = self
            .registry
            .resolve(&self.host, path)
            .and_then(|descriptor| marshal::write_float(&mut self.host, descriptor, value));
        self.record("dataref.setFloat", result)
    }

    pub fn set_double(&mut self, path: &str, value: f64) -> Result<()> {
        let result = self
            .registry
            .resolve(&self.host, path)
            .and_then(|descriptor| marshal::write_double(&mut self.host, descriptor, value));
        self.record("dataref.setDouble", result)
    }

    /// Returns how many elements landed.
    pub fn set_int_array(&mut self, path: &str, values: &[i32], offset: usize) -> Result<usize> {
        let result = self
            .registry
            .resolve(&self.host, path)
            .and_then(|descriptor| {
                marshal::write_array(&mut self.host, descriptor, values, offset)
            });
        self.record("dataref.setIntArray", result)
    }

    pub fn set_float_array(&mut self, path: &str, values: &[f32], offset: usize) -> Result<usize> {
        let result = self
            .registry
            .resolve(&self.host, path)
            .and_then(|descriptor| {
                marshal::write_array(&mut self.host, descriptor, values, offset)
            });
        self.record("dataref.setFloatArray", result)
    }

    pub fn set_data(
        &mut self,
        path: &str,
        bytes: &[u8],
        offset: usize,
        max_bytes: Option<usize>,
    ) -> Result<usize> {
        let result = self.registry.resolve(&self.host, path).and_then(|descriptor| {
            marshal::write_bytes(&mut self.host, descriptor, bytes, offset, max_bytes)
        });
        self.record("dataref.setData", result)
    }

    // ------------------------------------------------------------------------
    // XPlane.scenery
    // ------------------------------------------------------------------------

    pub fn load_object(&mut self, path: &str) -> Result<ObjectHandle> {
        let result = self.scenery.load_object(&mut self.host, path);
        self.record("scenery.loadObject", result)
    }

    pub fn unload_object(&mut self, handle: &ObjectHandle) -> Result<()> {
        let result = self.scenery.unload_object(&mut self.host, handle);
        self.record("scenery.unloadObject", result)
    }

    pub fn create_probe(&mut self, probe_type: ProbeType) -> Result<ProbeHandle> {
        let result = self.scenery.create_probe(&mut self.host, probe_type);
        self.record("scenery.createProbe", result)
    }

    pub fn destroy_probe(&mut self, handle: ProbeHandle) -> Result<()> {
        let result = self.scenery.destroy_probe(&mut self.host, handle);
        self.record("scenery.destroyProbe", result)
    }

    pub fn probe_terrain(
        &mut self,
        handle: ProbeHandle,
        x: f64,
        y: f64,
        z: f64,
    ) -> TerrainProbeResult {
        let result = self.scenery.probe_terrain(&mut self.host, handle, x, y, z);
        self.calls.record("scenery.probeTerrain", result.is_hit());
        result
    }

    pub fn magnetic_variation(&mut self, latitude: f64, longitude: f64) -> Result<f64> {
        let result = scenery::magnetic_variation(&self.host, latitude, longitude);
        self.record("scenery.getMagneticVariation", result)
    }

    pub fn deg_true_to_magnetic(&mut self, heading: f64) -> Result<f64> {
        let result = scenery::deg_true_to_magnetic(&self.host, heading);
        self.record("scenery.degTrueToMagnetic", result)
    }

    pub fn deg_magnetic_to_true(&mut self, heading: f64) -> Result<f64> {
        let result = scenery::deg_magnetic_to_true(&self.host, heading);
        self.record("scenery.degMagneticToTrue", result)
    }

    // ------------------------------------------------------------------------
    // XPlane.instance
    // ------------------------------------------------------------------------

    pub fn create_instance(
        &mut self,
        object: &ObjectHandle,
        datarefs: &[String],
    ) -> Result<InstanceHandle> {
        let result = self
            .instances
            .create(&mut self.host, &mut self.scenery, object, datarefs);
        self.record("instance.create", result)
    }

    pub fn destroy_instance(&mut self, handle: InstanceHandle) -> Result<()> {
        let result = self
            .instances
            .destroy(&mut self.host, &mut self.scenery, handle);
        self.record("instance.destroy", result)
    }

    pub fn set_instance_position(
        &mut self,
        handle: InstanceHandle,
        position: &InstancePosition,
        data: &[f32],
    ) -> Result<()> {
        let result = self
            .instances
            .set_position(&mut self.host, &mut self.scenery, handle, position, data);
        self.record("instance.setPosition", result)
    }

    // ------------------------------------------------------------------------
    // XPlane.graphics
    // ------------------------------------------------------------------------

    pub fn world_to_local(&mut self, world: WorldCoordinates) -> Result<LocalCoordinates> {
        let result = coords::world_to_local(&self.host, world);
        self.record("graphics.worldToLocal", result)
    }

    pub fn local_to_world(&mut self, local: LocalCoordinates) -> Result<WorldCoordinates> {
        let result = coords::local_to_world(&self.host, local);
        self.record("graphics.localToWorld", result)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Release every native resource scripts created.
    ///
    /// Instances go first so their objects are unpinned before the object
    /// pass runs.
    pub fn teardown(&mut self) -> TeardownReport {
        let instances = self.instances.teardown(&mut self.host, &mut self.scenery);
        let (objects, probes) = self.scenery.teardown(&mut self.host);
        let report = TeardownReport {
            instances,
            probes,
            objects,
        };
        if report.total() > 0 {
            tracing::info!(
                instances = report.instances,
                probes = report.probes,
                objects = report.objects,
                "released script resources"
            );
        }
        report
    }
}

impl<H: Host> Drop for Bridge<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}
