//! Placed instances of loaded objects.
//!
//! An instance binds an ordered list of dataref names at creation time; those
//! names become the per-instance animation channels fed by `set_position`.

use crate::error::{BridgeError, Result};
use crate::handle::{InstanceHandle, InstanceKind, ResourceKind};
use crate::handle_table::HandleTable;
use crate::host::{DrawInfo, Host, NativeInstance};
use crate::scenery::{unknown_handle, ObjectHandle, ObjectPin, SceneryManager};
use serde::{Deserialize, Serialize};

/// Where and how to draw an instance, in local OpenGL coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct InstancePosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub heading: f64,
    #[serde(default)]
    pub roll: f64,
}

impl InstancePosition {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            ..Default::default()
        }
    }

    pub fn with_attitude(mut self, pitch: f64, heading: f64, roll: f64) -> Self {
        self.pitch = pitch;
        self.heading = heading;
        self.roll = roll;
        self
    }

    fn to_draw_info(self) -> Result<DrawInfo> {
        let fields = [
            ("x", self.x),
            ("y", self.y),
            ("z", self.z),
            ("pitch", self.pitch),
            ("heading", self.heading),
            ("roll", self.roll),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(BridgeError::invalid(name, format!("{value} is not finite")));
            }
        }
        Ok(DrawInfo {
            x: self.x as f32,
            y: self.y as f32,
            z: self.z as f32,
            pitch: self.pitch as f32,
            heading: self.heading as f32,
            roll: self.roll as f32,
        })
    }
}

struct InstanceRecord {
    native: NativeInstance,
    object: ObjectHandle,
    pin: ObjectPin,
    channels: Vec<String>,
    /// Last value applied per channel.
    values: Vec<f32>,
}

pub struct InstanceManager {
    instances: HandleTable<InstanceKind, InstanceRecord>,
}

impl InstanceManager {
    pub fn new() -> Self {
        Self::with_limit(None)
    }

    pub fn with_limit(max_instances: Option<usize>) -> Self {
        Self {
            instances: HandleTable::with_limit(max_instances),
        }
    }

    pub fn create<H: Host>(
        &mut self,
        host: &mut H,
        scenery: &mut SceneryManager,
        object: &ObjectHandle,
        datarefs: &[String],
    ) -> Result<InstanceHandle> {
        if let Some(empty) = datarefs.iter().position(|name| name.is_empty()) {
            return Err(BridgeError::invalid(
                "datarefs",
                format!("channel {empty} has an empty name"),
            ));
        }

        let pin = scenery.pin(host, object)?;
        let Some(native) = host.create_instance(pin.native, datarefs) else {
            scenery.unpin(host, object.as_str(), &pin);
            return Err(BridgeError::HostAllocation {
                kind: InstanceKind::NAME,
            });
        };

        let record = InstanceRecord {
            native,
            object: object.clone(),
            pin,
            channels: datarefs.to_vec(),
            values: vec![0.0; datarefs.len()],
        };
        match self.instances.allocate(record) {
            Ok(handle) => {
                tracing::debug!(
                    %handle,
                    object = %object,
                    channels = datarefs.len(),
                    "created instance"
                );
                Ok(handle)
            }
            Err(err) => {
                host.destroy_instance(native);
                scenery.unpin(host, object.as_str(), &pin);
                Err(err)
            }
        }
    }

    pub fn destroy<H: Host>(
        &mut self,
        host: &mut H,
        scenery: &mut SceneryManager,
        handle: InstanceHandle,
    ) -> Result<()> {
        let record = self
            .instances
            .release(handle)
            .ok_or_else(|| unknown_handle(handle))?;
        if host.instance_is_live(record.native) {
            host.destroy_instance(record.native);
        }
        scenery.unpin(host, record.object.as_str(), &record.pin);
        tracing::debug!(%handle, object = %record.object, "destroyed instance");
        Ok(())
    }

    /// Move an instance and feed its channels in one host call.
    ///
    /// Extra values beyond the bound channels are ignored. Channels without a
    /// value keep whatever was applied last.
    pub fn set_position<H: Host>(
        &mut self,
        host: &mut H,
        scenery: &mut SceneryManager,
        handle: InstanceHandle,
        position: &InstancePosition,
        data: &[f32],
    ) -> Result<()> {
        let draw = position.to_draw_info()?;

        let native = self
            .instances
            .get(handle)
            .map(|record| record.native)
            .ok_or_else(|| unknown_handle(handle))?;
        if !host.instance_is_live(native) {
            tracing::warn!(%handle, "instance was destroyed by the host, dropping handle");
            if let Some(record) = self.instances.release(handle) {
                scenery.unpin(host, record.object.as_str(), &record.pin);
            }
            return Err(unknown_handle(handle));
        }

        let Some(record) = self.instances.get_mut(handle) else {
            return Err(unknown_handle(handle));
        };
        for (slot, value) in record.values.iter_mut().zip(data) {
            *slot = *value;
        }
        host.instance_set_position(native, &draw, &record.values);
        Ok(())
    }

    /// Dataref names bound to an instance, in channel order.
    pub fn channels(&self, handle: InstanceHandle) -> Option<&[String]> {
        self.instances
            .get(handle)
            .map(|record| record.channels.as_slice())
    }

    pub fn object(&self, handle: InstanceHandle) -> Option<&ObjectHandle> {
        self.instances.get(handle).map(|record| &record.object)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Destroy every instance. Returns how many were live.
    pub fn teardown<H: Host>(&mut self, host: &mut H, scenery: &mut SceneryManager) -> usize {
        let drained = self.instances.drain();
        for (_, record) in &drained {
            if host.instance_is_live(record.native) {
                host.destroy_instance(record.native);
            }
            scenery.unpin(host, record.object.as_str(), &record.pin);
        }
        drained.len()
    }
}

impl Default for InstanceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sim::SimHost;

    const TUG: &str = "lib/airport/vehicles/pushback/tug.obj";

    struct Fixture {
        host: SimHost,
        scenery: SceneryManager,
        instances: InstanceManager,
        tug: ObjectHandle,
    }

    fn fixture() -> Fixture {
        let mut host = SimHost::new();
        host.add_object_file(TUG);
        let mut scenery = SceneryManager::new();
        let tug = scenery.load_object(&mut host, TUG).unwrap();
        Fixture {
            host,
            scenery,
            instances: InstanceManager::new(),
            tug,
        }
    }

    fn channels(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_create_and_destroy() {
        let mut f = fixture();
        let handle = f
            .instances
            .create(&mut f.host, &mut f.scenery, &f.tug, &[])
            .unwrap();
        assert_eq!(f.host.live_instances(), 1);
        assert_eq!(f.instances.object(handle), Some(&f.tug));

        f.instances.destroy(&mut f.host, &mut f.scenery, handle).unwrap();
        assert_eq!(f.host.live_instances(), 0);
        assert_eq!(
            f.instances
                .destroy(&mut f.host, &mut f.scenery, handle)
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
        // Destroying the instance leaves the script's reference alone
        assert_eq!(f.scenery.ref_count(TUG), Some(1));
    }

    #[test]
    fn test_create_requires_loaded_object() {
        let mut f = fixture();
        f.scenery.unload_object(&mut f.host, &f.tug).unwrap();
        let err = f
            .instances
            .create(&mut f.host, &mut f.scenery, &f.tug, &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(f.host.live_instances(), 0);
    }

    #[test]
    fn test_extra_data_is_truncated() {
        let mut f = fixture();
        let names = channels(&["sim/flightmodel/controls/wing1l_ail1def", "sim/custom/door"]);
        let handle = f
            .instances
            .create(&mut f.host, &mut f.scenery, &f.tug, &names)
            .unwrap();
        let position = InstancePosition::new(10.0, 0.0, -5.0).with_attitude(0.0, 90.0, 0.0);

        f.instances
            .set_position(&mut f.host, &mut f.scenery, handle, &position, &[0.5, 1.0, 9.0, 9.0])
            .unwrap();
        let truncated = f.host.instances().next().unwrap().clone();

        f.instances
            .set_position(&mut f.host, &mut f.scenery, handle, &position, &[0.5, 1.0])
            .unwrap();
        let exact = f.host.instances().next().unwrap();

        assert_eq!(truncated.data, vec![0.5, 1.0]);
        assert_eq!(exact.data, truncated.data);
        assert_eq!(exact.draw.heading, 90.0);
        assert_eq!(exact.updates, 2);
    }

    #[test]
    fn test_missing_channels_keep_previous_values() {
        let mut f = fixture();
        let names = channels(&["a/one", "a/two", "a/three"]);
        let handle = f
            .instances
            .create(&mut f.host, &mut f.scenery, &f.tug, &names)
            .unwrap();
        let position = InstancePosition::new(0.0, 0.0, 0.0);

        f.instances
            .set_position(&mut f.host, &mut f.scenery, handle, &position, &[1.0, 2.0, 3.0])
            .unwrap();
        f.instances
            .set_position(&mut f.host, &mut f.scenery, handle, &position, &[7.0])
            .unwrap();
        assert_eq!(f.host.instances().next().unwrap().data, vec![7.0, 2.0, 3.0]);
    }

    #[test]
    fn test_non_finite_position_rejected() {
        let mut f = fixture();
        let handle = f
            .instances
            .create(&mut f.host, &mut f.scenery, &f.tug, &[])
            .unwrap();
        let position = InstancePosition::new(f64::NAN, 0.0, 0.0);
        let err = f
            .instances
            .set_position(&mut f.host, &mut f.scenery, handle, &position, &[])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(f.host.instances().next().unwrap().updates, 0);
    }

    #[test]
    fn test_instance_pins_object_after_unload() {
        let mut f = fixture();
        let handle = f
            .instances
            .create(&mut f.host, &mut f.scenery, &f.tug, &[])
            .unwrap();

        f.scenery.unload_object(&mut f.host, &f.tug).unwrap();
        assert!(!f.scenery.is_loaded(&f.host, &f.tug));
        assert_eq!(f.host.live_objects(), 1);

        f.instances.destroy(&mut f.host, &mut f.scenery, handle).unwrap();
        assert_eq!(f.host.live_objects(), 0);
    }

    #[test]
    fn test_stale_pin_leaves_reloaded_object_alone() {
        let mut f = fixture();
        let old = f
            .instances
            .create(&mut f.host, &mut f.scenery, &f.tug, &[])
            .unwrap();

        // Host drops the object on its own; the script loads the path again
        f.host.evict_objects(TUG);
        let tug = f.scenery.load_object(&mut f.host, TUG).unwrap();
        let fresh = f
            .instances
            .create(&mut f.host, &mut f.scenery, &tug, &[])
            .unwrap();

        f.instances.destroy(&mut f.host, &mut f.scenery, old).unwrap();
        f.scenery.unload_object(&mut f.host, &tug).unwrap();
        assert_eq!(f.host.live_objects(), 1);
        assert!(f
            .instances
            .set_position(
                &mut f.host,
                &mut f.scenery,
                fresh,
                &InstancePosition::new(0.0, 0.0, 0.0),
                &[],
            )
            .is_ok());

        f.instances.destroy(&mut f.host, &mut f.scenery, fresh).unwrap();
        assert_eq!(f.host.live_objects(), 0);
    }

    #[test]
    fn test_teardown_unpins() {
        let mut f = fixture();
        for _ in 0..3 {
            f.instances
                .create(&mut f.host, &mut f.scenery, &f.tug, &[])
                .unwrap();
        }
        f.scenery.unload_object(&mut f.host, &f.tug).unwrap();

        assert_eq!(f.instances.teardown(&mut f.host, &mut f.scenery), 3);
        assert!(f.instances.is_empty());
        assert_eq!(f.host.live_instances(), 0);
        assert_eq!(f.host.live_objects(), 0);
    }

    #[test]
    fn test_empty_channel_name_rejected() {
        let mut f = fixture();
        let err = f
            .instances
            .create(&mut f.host, &mut f.scenery, &f.tug, &channels(&["ok", ""]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
