use crate::host::ProbeInfo;

/// Axis-aligned flat patch of ground in local coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerrainPatch {
    min_x: f32,
    max_x: f32,
    min_z: f32,
    max_z: f32,
    elevation: f32,
    wet: bool,
}

impl TerrainPatch {
    pub fn new(min_x: f32, max_x: f32, min_z: f32, max_z: f32, elevation: f32) -> Self {
        Self {
            min_x: min_x.min(max_x),
            max_x: max_x.max(min_x),
            min_z: min_z.min(max_z),
            max_z: max_z.max(min_z),
            elevation,
            wet: false,
        }
    }

    /// Mark the patch as water.
    pub fn wet(mut self) -> Self {
        self.wet = true;
        self
    }

    pub fn contains(&self, x: f32, z: f32) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_z..=self.max_z).contains(&z)
    }

    pub(super) fn probe(&self, x: f32, z: f32) -> ProbeInfo {
        ProbeInfo {
            location: [x, self.elevation, z],
            normal: [0.0, 1.0, 0.0],
            velocity: [0.0; 3],
            is_wet: self.wet,
        }
    }
}

/// Later patches are drawn over earlier ones.
pub(super) fn probe(patches: &[TerrainPatch], x: f32, z: f32) -> Option<ProbeInfo> {
    patches
        .iter()
        .rev()
        .find(|patch| patch.contains(x, z))
        .map(|patch| patch.probe(x, z))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_later_patch_wins() {
        let patches = [
            TerrainPatch::new(-100.0, 100.0, -100.0, 100.0, 10.0),
            TerrainPatch::new(0.0, 50.0, 0.0, 50.0, 2.0).wet(),
        ];
        let ground = probe(&patches, -10.0, -10.0).unwrap();
        assert_eq!(ground.location[1], 10.0);
        assert!(!ground.is_wet);

        let pond = probe(&patches, 10.0, 10.0).unwrap();
        assert_eq!(pond.location, [10.0, 2.0, 10.0]);
        assert!(pond.is_wet);

        assert!(probe(&patches, 500.0, 0.0).is_none());
    }

    #[test]
    fn test_reversed_bounds_are_normalized() {
        let patch = TerrainPatch::new(10.0, -10.0, 5.0, -5.0, 0.0);
        assert!(patch.contains(0.0, 0.0));
    }
}
