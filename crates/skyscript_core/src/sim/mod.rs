//! Deterministic in-memory host.
//!
//! Stands in for the simulator in tests and in the `skyscript` runner. It
//! keeps just enough world state to behave like the real thing at the
//! bridge boundary: published datarefs, object files, flat terrain, a
//! movable local origin and a magnetic model.

mod datarefs;
mod geodesy;
mod terrain;

pub use datarefs::SimDataRef;
pub use terrain::TerrainPatch;

use crate::coords::WorldCoordinates;
use crate::dataref::DataTypes;
use crate::host::{
    DrawInfo, Host, NativeDataRef, NativeInstance, NativeObject, NativeProbe, NativeProbeResult,
    ProbeType,
};
use crate::scenery::normalize_heading;
use datarefs::DataRefTable;
use geodesy::LocalFrame;
use glam::DVec3;
use std::collections::{BTreeMap, HashSet};

const RUNNING_TIME: &str = "sim/time/total_running_time_sec";

/// Host-side view of one placed instance.
#[derive(Debug, Clone, PartialEq)]
pub struct SimInstance {
    pub object_path: String,
    pub channels: Vec<String>,
    pub draw: DrawInfo,
    pub data: Vec<f32>,
    /// Number of position updates applied.
    pub updates: u32,
}

pub struct SimHost {
    datarefs: DataRefTable,
    object_files: HashSet<String>,
    objects: BTreeMap<u64, String>,
    probes: BTreeMap<u64, ProbeType>,
    instances: BTreeMap<u64, SimInstance>,
    terrain: Vec<TerrainPatch>,
    frame: LocalFrame,
    aircraft: WorldCoordinates,
    elapsed: f64,
    next_id: u64,
}

impl SimHost {
    pub fn new() -> Self {
        Self {
            datarefs: DataRefTable::default(),
            object_files: HashSet::new(),
            objects: BTreeMap::new(),
            probes: BTreeMap::new(),
            instances: BTreeMap::new(),
            terrain: Vec::new(),
            frame: LocalFrame::new(0.0, 0.0),
            aircraft: WorldCoordinates::default(),
            elapsed: 0.0,
            next_id: 1,
        }
    }

    /// A parked airliner at Seattle-Tacoma with some ramp equipment on disk.
    pub fn demo() -> Self {
        let (lat, lon, elevation) = (47.4647, -122.3144, 132.5);
        let mut host = Self::new()
            .with_origin(lat, lon)
            .with_aircraft(WorldCoordinates::new(lat, lon, elevation));

        host.add_dataref(SimDataRef::int("sim/cockpit/radios/nav1_freq_hz", 11030).writable());
        host.add_dataref(SimDataRef::int("sim/cockpit/radios/com1_freq_hz", 12210).writable());
        host.add_dataref(SimDataRef::double("sim/flightmodel/position/latitude", lat));
        host.add_dataref(SimDataRef::double("sim/flightmodel/position/longitude", lon));
        host.add_dataref(SimDataRef::double("sim/flightmodel/position/elevation", elevation));
        host.add_dataref(
            SimDataRef::float("sim/weather/barometer_sea_level_inhg", 29.92).writable(),
        );
        host.add_dataref(SimDataRef::float(RUNNING_TIME, 0.0));
        host.add_dataref(
            SimDataRef::float_array("sim/cockpit2/engine/actuators/throttle_ratio", vec![0.0; 8])
                .writable(),
        );
        host.add_dataref(SimDataRef::float_array(
            "sim/cockpit2/engine/indicators/N1_percent",
            vec![0.0; 8],
        ));
        host.add_dataref(SimDataRef::int_array("sim/aircraft/prop/acf_prop_type", vec![0; 8]));
        host.add_dataref(SimDataRef::data("sim/aircraft/view/acf_ICAO", 40, b"B738"));
        host.add_dataref(
            SimDataRef::data("sim/aircraft/view/acf_tailnum", 40, b"N737SK").writable(),
        );

        for path in [
            "lib/airport/vehicles/pushback/tug.obj",
            "lib/airport/vehicles/fuel/truck.obj",
            "lib/airport/Ramp_Equipment/Cone_1.obj",
        ] {
            host.add_object_file(path);
        }

        host.add_terrain(TerrainPatch::new(-5000.0, 5000.0, -5000.0, 5000.0, elevation as f32));
        // Angle Lake, south-east of the field
        host.add_terrain(TerrainPatch::new(1200.0, 1800.0, 2000.0, 2600.0, 110.0).wet());
        host
    }

    pub fn with_origin(mut self, latitude: f64, longitude: f64) -> Self {
        self.frame = LocalFrame::new(latitude, longitude);
        self
    }

    pub fn with_aircraft(mut self, position: WorldCoordinates) -> Self {
        self.aircraft = position;
        self
    }

    /// Move the local reference point, as the host does when the aircraft
    /// travels far from the current one.
    pub fn shift_origin(&mut self, latitude: f64, longitude: f64) {
        tracing::debug!(latitude, longitude, "shifting local origin");
        self.frame = LocalFrame::new(latitude, longitude);
    }

    pub fn origin(&self) -> (f64, f64) {
        self.frame.origin()
    }

    pub fn aircraft(&self) -> WorldCoordinates {
        self.aircraft
    }

    fn aircraft_variation(&self) -> f64 {
        geodesy::magnetic_variation(self.aircraft.latitude, self.aircraft.longitude)
    }

    /// Advance simulated time.
    pub fn tick(&mut self, dt: f64) {
        self.elapsed += dt;
        if let Some(dataref) = self.datarefs.by_path_mut(RUNNING_TIME) {
            dataref.drive(self.elapsed);
        }
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    // ------------------------------------------------------------------------
    // World setup
    // ------------------------------------------------------------------------

    pub fn add_dataref(&mut self, dataref: SimDataRef) -> NativeDataRef {
        self.datarefs.insert(dataref)
    }

    /// Unpublish a dataref (another plugin unloading, say).
    pub fn remove_dataref(&mut self, path: &str) -> Option<SimDataRef> {
        self.datarefs.remove(path)
    }

    /// Number of `find_dataref` calls served so far.
    pub fn find_count(&self) -> usize {
        self.datarefs.lookups()
    }

    pub fn add_object_file(&mut self, path: &str) {
        self.object_files.insert(path.to_string());
    }

    pub fn add_terrain(&mut self, patch: TerrainPatch) {
        self.terrain.push(patch);
    }

    /// Tear down every loaded copy of `path` behind the bridge's back.
    pub fn evict_objects(&mut self, path: &str) {
        self.objects.retain(|_, loaded| loaded != path);
    }

    /// Tear down every probe behind the bridge's back.
    pub fn evict_probes(&mut self) {
        self.probes.clear();
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    pub fn live_objects(&self) -> usize {
        self.objects.len()
    }

    pub fn live_probes(&self) -> usize {
        self.probes.len()
    }

    pub fn live_instances(&self) -> usize {
        self.instances.len()
    }

    pub fn instances(&self) -> impl Iterator<Item = &SimInstance> {
        self.instances.values()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for SimHost {
    fn find_dataref(&self, path: &str) -> Option<NativeDataRef> {
        self.datarefs.find(path)
    }

    fn dataref_epoch(&self) -> u64 {
        self.datarefs.epoch()
    }

    fn dataref_types(&self, dataref: NativeDataRef) -> DataTypes {
        self.datarefs
            .get(dataref)
            .map_or(DataTypes::empty(), |d| d.types())
    }

    fn can_write(&self, dataref: NativeDataRef) -> bool {
        self.datarefs.get(dataref).is_some_and(|d| d.is_writable())
    }

    fn get_int(&self, dataref: NativeDataRef) -> i32 {
        self.datarefs.get(dataref).map_or(0, |d| d.get() as i32)
    }

    fn get_float(&self, dataref: NativeDataRef) -> f32 {
        self.datarefs.get(dataref).map_or(0.0, |d| d.get() as f32)
    }

    fn get_double(&self, dataref: NativeDataRef) -> f64 {
        self.datarefs.get(dataref).map_or(0.0, |d| d.get())
    }

    fn set_int(&mut self, dataref: NativeDataRef, value: i32) {
        if let Some(d) = self.datarefs.get_mut(dataref) {
            d.set(value as f64);
        }
    }

    fn set_float(&mut self, dataref: NativeDataRef, value: f32) {
        if let Some(d) = self.datarefs.get_mut(dataref) {
            d.set(value as f64);
        }
    }

    fn set_double(&mut self, dataref: NativeDataRef, value: f64) {
        if let Some(d) = self.datarefs.get_mut(dataref) {
            d.set(value);
        }
    }

    fn int_array_len(&self, dataref: NativeDataRef) -> usize {
        self.datarefs.get(dataref).map_or(0, |d| d.ints().len())
    }

    fn read_ints(&self, dataref: NativeDataRef, offset: usize, out: &mut [i32]) -> usize {
        self.datarefs
            .get(dataref)
            .map_or(0, |d| read_clamped(d.ints(), offset, out))
    }

    fn write_ints(&mut self, dataref: NativeDataRef, offset: usize, values: &[i32]) {
        if let Some(d) = self.datarefs.get_mut(dataref) {
            d.write_ints(offset, values);
        }
    }

    fn float_array_len(&self, dataref: NativeDataRef) -> usize {
        self.datarefs.get(dataref).map_or(0, |d| d.floats().len())
    }

    fn read_floats(&self, dataref: NativeDataRef, offset: usize, out: &mut [f32]) -> usize {
        self.datarefs
            .get(dataref)
            .map_or(0, |d| read_clamped(d.floats(), offset, out))
    }

    fn write_floats(&mut self, dataref: NativeDataRef, offset: usize, values: &[f32]) {
        if let Some(d) = self.datarefs.get_mut(dataref) {
            d.write_floats(offset, values);
        }
    }

    fn data_len(&self, dataref: NativeDataRef) -> usize {
        self.datarefs.get(dataref).map_or(0, |d| d.bytes().len())
    }

    fn read_bytes(&self, dataref: NativeDataRef, offset: usize, out: &mut [u8]) -> usize {
        self.datarefs
            .get(dataref)
            .map_or(0, |d| read_clamped(d.bytes(), offset, out))
    }

    fn write_bytes(&mut self, dataref: NativeDataRef, offset: usize, values: &[u8]) {
        if let Some(d) = self.datarefs.get_mut(dataref) {
            d.write_bytes(offset, values);
        }
    }

    fn load_object(&mut self, path: &str) -> Option<NativeObject> {
        if !self.object_files.contains(path) {
            tracing::warn!(path, "object file not found");
            return None;
        }
        let id = self.next_id();
        self.objects.insert(id, path.to_string());
        Some(NativeObject(id))
    }

    fn unload_object(&mut self, object: NativeObject) {
        self.objects.remove(&object.0);
    }

    fn object_is_live(&self, object: NativeObject) -> bool {
        self.objects.contains_key(&object.0)
    }

    fn create_probe(&mut self, probe_type: ProbeType) -> Option<NativeProbe> {
        let id = self.next_id();
        self.probes.insert(id, probe_type);
        Some(NativeProbe(id))
    }

    fn destroy_probe(&mut self, probe: NativeProbe) {
        self.probes.remove(&probe.0);
    }

    fn probe_is_live(&self, probe: NativeProbe) -> bool {
        self.probes.contains_key(&probe.0)
    }

    fn probe_terrain(&mut self, probe: NativeProbe, x: f32, _y: f32, z: f32) -> NativeProbeResult {
        if !self.probe_is_live(probe) {
            return NativeProbeResult::Error;
        }
        match terrain::probe(&self.terrain, x, z) {
            Some(info) => NativeProbeResult::HitTerrain(info),
            None => NativeProbeResult::Missed,
        }
    }

    fn magnetic_variation(&self, latitude: f64, longitude: f64) -> f32 {
        geodesy::magnetic_variation(latitude, longitude) as f32
    }

    fn deg_true_to_magnetic(&self, heading_true: f32) -> f32 {
        normalize_heading(heading_true as f64 - self.aircraft_variation()) as f32
    }

    fn deg_magnetic_to_true(&self, heading_magnetic: f32) -> f32 {
        normalize_heading(heading_magnetic as f64 + self.aircraft_variation()) as f32
    }

    fn create_instance(
        &mut self,
        object: NativeObject,
        datarefs: &[String],
    ) -> Option<NativeInstance> {
        let object_path = self.objects.get(&object.0)?.clone();
        let id = self.next_id();
        self.instances.insert(
            id,
            SimInstance {
                object_path,
                channels: datarefs.to_vec(),
                draw: DrawInfo::default(),
                data: vec![0.0; datarefs.len()],
                updates: 0,
            },
        );
        Some(NativeInstance(id))
    }

    fn destroy_instance(&mut self, instance: NativeInstance) {
        self.instances.remove(&instance.0);
    }

    fn instance_is_live(&self, instance: NativeInstance) -> bool {
        self.instances.contains_key(&instance.0)
    }

    fn instance_set_position(&mut self, instance: NativeInstance, draw: &DrawInfo, data: &[f32]) {
        if let Some(placed) = self.instances.get_mut(&instance.0) {
            placed.draw = *draw;
            placed.data = data.to_vec();
            placed.updates += 1;
        }
    }

    fn local_to_world(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
        self.frame.to_world(DVec3::new(x, y, z))
    }

    fn world_to_local(&self, latitude: f64, longitude: f64, altitude: f64) -> (f64, f64, f64) {
        let local = self.frame.to_local(latitude, longitude, altitude);
        (local.x, local.y, local.z)
    }
}

fn read_clamped<T: Copy>(src: &[T], offset: usize, out: &mut [T]) -> usize {
    if offset >= src.len() {
        return 0;
    }
    let n = (src.len() - offset).min(out.len());
    out[..n].copy_from_slice(&src[offset..offset + n]);
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_world() {
        let host = SimHost::demo();
        let lat = host.find_dataref("sim/flightmodel/position/latitude").unwrap();
        assert_eq!(host.get_double(lat), 47.4647);
        assert!(host.dataref_types(lat).contains(DataTypes::DOUBLE));
        assert!(!host.can_write(lat));
        assert_eq!(host.origin(), (47.4647, -122.3144));
    }

    #[test]
    fn test_tick_drives_read_only_time() {
        let mut host = SimHost::demo();
        host.tick(0.5);
        host.tick(0.25);
        let time = host.find_dataref(RUNNING_TIME).unwrap();
        assert_eq!(host.get_float(time), 0.75);
        assert_eq!(host.elapsed(), 0.75);
    }

    #[test]
    fn test_instances_need_live_object() {
        let mut host = SimHost::new();
        host.add_object_file("a.obj");
        let object = host.load_object("a.obj").unwrap();
        host.unload_object(object);
        assert!(host.create_instance(object, &[]).is_none());
    }

    #[test]
    fn test_native_ids_start_at_one() {
        let mut host = SimHost::new();
        assert_eq!(host.create_probe(ProbeType::Y), Some(NativeProbe(1)));
        assert!(host.load_object("missing.obj").is_none());
    }

    #[test]
    fn test_shift_origin_moves_local_frame() {
        let mut host = SimHost::demo();
        let (x, _, z) = host.world_to_local(47.4647, -122.3144, 0.0);
        assert!(x.abs() < 1e-6 && z.abs() < 1e-6);

        host.shift_origin(47.5, -122.3144);
        let (_, _, z) = host.world_to_local(47.4647, -122.3144, 0.0);
        // The old origin is now south of the new one
        assert!(z > 3000.0);
    }
}
