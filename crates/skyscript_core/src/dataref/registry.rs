use crate::dataref::DataTypes;
use crate::error::{BridgeError, Result};
use crate::host::{Host, NativeDataRef};
use std::collections::HashMap;

/// Cached facts about one host variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDescriptor {
    path: String,
    native: NativeDataRef,
    types: DataTypes,
    writable: bool,
    element_count: usize,
}

impl VariableDescriptor {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn native(&self) -> NativeDataRef {
        self.native
    }

    pub fn types(&self) -> DataTypes {
        self.types
    }

    pub fn supports(&self, types: DataTypes) -> bool {
        self.types.contains(types)
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Declared length at resolve time: array elements or data bytes, 0 for scalars.
    pub fn element_count(&self) -> usize {
        self.element_count
    }
}

/// Resolves dataref paths to descriptors, caching hits.
///
/// The cache is flushed when the host reports a new dataref epoch. Misses
/// are never cached, so a dataref published later by another plugin
/// resolves on the next lookup.
pub struct Registry {
    cache: HashMap<String, VariableDescriptor>,
    epoch: Option<u64>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            cache: HashMap::new(),
            epoch: None,
        }
    }

    pub fn resolve<H: Host>(&mut self, host: &H, path: &str) -> Result<&VariableDescriptor> {
        if path.is_empty() {
            return Err(BridgeError::invalid("path", "dataref path is empty"));
        }

        let epoch = host.dataref_epoch();
        if self.epoch != Some(epoch) {
            if !self.cache.is_empty() {
                tracing::debug!(
                    cached = self.cache.len(),
                    epoch,
                    "host dataref set changed, flushing descriptor cache"
                );
            }
            self.cache.clear();
            self.epoch = Some(epoch);
        }

        if self.cache.contains_key(path) {
            return Ok(&self.cache[path]);
        }

        let native = host
            .find_dataref(path)
            .ok_or_else(|| BridgeError::DataRefNotFound {
                path: path.to_string(),
            })?;
        let types = host.dataref_types(native);
        let element_count = if types.contains(DataTypes::FLOAT_ARRAY) {
            host.float_array_len(native)
        } else if types.contains(DataTypes::INT_ARRAY) {
            host.int_array_len(native)
        } else if types.contains(DataTypes::DATA) {
            host.data_len(native)
        } else {
            0
        };

        let descriptor = VariableDescriptor {
            path: path.to_string(),
            native,
            types,
            writable: host.can_write(native),
            element_count,
        };
        tracing::trace!(path, types = ?descriptor.types, "resolved dataref");

        Ok(self.cache.entry(path.to_string()).or_insert(descriptor))
    }

    pub fn can_write<H: Host>(&mut self, host: &H, path: &str) -> Result<bool> {
        self.resolve(host, path).map(|d| d.is_writable())
    }

    pub fn types<H: Host>(&mut self, host: &H, path: &str) -> Result<DataTypes> {
        self.resolve(host, path).map(|d| d.types())
    }

    pub fn is_cached(&self, path: &str) -> bool {
        self.cache.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::sim::{SimDataRef, SimHost};

    fn host() -> SimHost {
        let mut host = SimHost::new();
        host.add_dataref(SimDataRef::int("sim/cockpit/radios/nav1_freq_hz", 11030).writable());
        host.add_dataref(SimDataRef::float_array(
            "sim/cockpit2/engine/actuators/throttle_ratio",
            vec![0.0; 8],
        ));
        host
    }

    #[test]
    fn test_resolve_caches_hits() {
        let host = host();
        let mut registry = Registry::new();

        let descriptor = registry
            .resolve(&host, "sim/cockpit/radios/nav1_freq_hz")
            .unwrap();
        assert!(descriptor.supports(DataTypes::INT));
        assert!(descriptor.is_writable());
        assert_eq!(descriptor.element_count(), 0);
        assert!(registry.is_cached("sim/cockpit/radios/nav1_freq_hz"));

        let lookups = host.find_count();
        registry
            .resolve(&host, "sim/cockpit/radios/nav1_freq_hz")
            .unwrap();
        assert_eq!(host.find_count(), lookups);
    }

    #[test]
    fn test_projections_agree_on_missing_path() {
        let host = host();
        let mut registry = Registry::new();

        let missing = "sim/does/not/exist";
        assert_eq!(
            registry.resolve(&host, missing).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            registry.can_write(&host, missing).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            registry.types(&host, missing).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_array_descriptor_reports_length() {
        let host = host();
        let mut registry = Registry::new();
        let descriptor = registry
            .resolve(&host, "sim/cockpit2/engine/actuators/throttle_ratio")
            .unwrap();
        assert!(descriptor.types().is_array());
        assert!(!descriptor.is_writable());
        assert_eq!(descriptor.element_count(), 8);
    }

    #[test]
    fn test_epoch_change_flushes_cache() {
        let mut host = host();
        let mut registry = Registry::new();
        registry
            .resolve(&host, "sim/cockpit/radios/nav1_freq_hz")
            .unwrap();

        host.remove_dataref("sim/cockpit/radios/nav1_freq_hz");
        assert!(registry
            .resolve(&host, "sim/cockpit/radios/nav1_freq_hz")
            .is_err());
        assert!(!registry.is_cached("sim/cockpit/radios/nav1_freq_hz"));
    }

    #[test]
    fn test_late_publication_resolves() {
        let mut host = host();
        let mut registry = Registry::new();
        assert!(registry.resolve(&host, "plugin/late/value").is_err());

        host.add_dataref(SimDataRef::double("plugin/late/value", 1.5));
        assert!(registry.resolve(&host, "plugin/late/value").is_ok());
    }

    #[test]
    fn test_empty_path_is_invalid() {
        let host = host();
        let mut registry = Registry::new();
        assert_eq!(
            registry.resolve(&host, "").unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }
}
