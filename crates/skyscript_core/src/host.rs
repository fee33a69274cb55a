//! The native simulator surface consumed by the bridge.
//!
//! Everything behind this trait belongs to the host: native ids are opaque,
//! may be invalidated by the host at frame boundaries, and are only ever
//! handed to scripts through the handle tables.

use crate::dataref::DataTypes;

/// Host-side dataref reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeDataRef(pub u64);

/// Host-side loaded object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeObject(pub u64);

/// Host-side object instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeInstance(pub u64);

/// Host-side terrain probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeProbe(pub u64);

/// Terrain probe flavours understood by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProbeType {
    /// Vertical probe: drops a ray along the local Y axis.
    #[default]
    Y,
}

impl ProbeType {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Y),
            _ => None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Self::Y => 0,
        }
    }
}

/// Placement handed to the host for one instance update.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DrawInfo {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub pitch: f32,
    pub heading: f32,
    pub roll: f32,
}

/// Surface data reported by a successful probe.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProbeInfo {
    pub location: [f32; 3],
    pub normal: [f32; 3],
    pub velocity: [f32; 3],
    pub is_wet: bool,
}

/// Raw outcome of a native terrain query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeProbeResult {
    HitTerrain(ProbeInfo),
    Error,
    Missed,
}

pub trait Host {
    // Data access

    fn find_dataref(&self, path: &str) -> Option<NativeDataRef>;
    /// Changes whenever the set of published datarefs changes.
    fn dataref_epoch(&self) -> u64;
    fn dataref_types(&self, dataref: NativeDataRef) -> DataTypes;
    fn can_write(&self, dataref: NativeDataRef) -> bool;

    fn get_int(&self, dataref: NativeDataRef) -> i32;
    fn get_float(&self, dataref: NativeDataRef) -> f32;
    fn get_double(&self, dataref: NativeDataRef) -> f64;
    fn set_int(&mut self, dataref: NativeDataRef, value: i32);
    fn set_float(&mut self, dataref: NativeDataRef, value: f32);
    fn set_double(&mut self, dataref: NativeDataRef, value: f64);

    fn int_array_len(&self, dataref: NativeDataRef) -> usize;
    /// Copies up to `out.len()` elements starting at `offset`; returns the count copied.
    fn read_ints(&self, dataref: NativeDataRef, offset: usize, out: &mut [i32]) -> usize;
    fn write_ints(&mut self, dataref: NativeDataRef, offset: usize, values: &[i32]);

    fn float_array_len(&self, dataref: NativeDataRef) -> usize;
    fn read_floats(&self, dataref: NativeDataRef, offset: usize, out: &mut [f32]) -> usize;
    fn write_floats(&mut self, dataref: NativeDataRef, offset: usize, values: &[f32]);

    fn data_len(&self, dataref: NativeDataRef) -> usize;
    fn read_bytes(&self, dataref: NativeDataRef, offset: usize, out: &mut [u8]) -> usize;
    fn write_bytes(&mut self, dataref: NativeDataRef, offset: usize, values: &[u8]);

    // Scenery

    fn load_object(&mut self, path: &str) -> Option<NativeObject>;
    fn unload_object(&mut self, object: NativeObject);
    fn object_is_live(&self, object: NativeObject) -> bool;

    fn create_probe(&mut self, probe_type: ProbeType) -> Option<NativeProbe>;
    fn destroy_probe(&mut self, probe: NativeProbe);
    fn probe_is_live(&self, probe: NativeProbe) -> bool;
    fn probe_terrain(&mut self, probe: NativeProbe, x: f32, y: f32, z: f32) -> NativeProbeResult;

    fn magnetic_variation(&self, latitude: f64, longitude: f64) -> f32;
    /// Converts using the variation at the aircraft's current position.
    fn deg_true_to_magnetic(&self, heading_true: f32) -> f32;
    fn deg_magnetic_to_true(&self, heading_magnetic: f32) -> f32;

    // Instancing

    fn create_instance(
        &mut self,
        object: NativeObject,
        datarefs: &[String],
    ) -> Option<NativeInstance>;
    fn destroy_instance(&mut self, instance: NativeInstance);
    fn instance_is_live(&self, instance: NativeInstance) -> bool;
    /// `data` holds exactly one value per dataref bound at creation.
    fn instance_set_position(&mut self, instance: NativeInstance, draw: &DrawInfo, data: &[f32]);

    // Graphics

    fn local_to_world(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64);
    fn world_to_local(&self, latitude: f64, longitude: f64, altitude: f64) -> (f64, f64, f64);
}
