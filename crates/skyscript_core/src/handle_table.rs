//! Arena of slots addressed by generation-tagged handles.

use crate::error::{BridgeError, Result};
use crate::handle::{Handle, ResourceKind, MAX_GENERATION};

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Owns every live entry of one handle space.
///
/// Released slots are recycled with a bumped generation, so a handle is
/// never issued twice. A slot that reaches [`MAX_GENERATION`] is retired
/// for good instead of wrapping.
pub struct HandleTable<K: ResourceKind, T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
    limit: Option<usize>,
    _kind: std::marker::PhantomData<fn() -> K>,
}

impl<K: ResourceKind, T> HandleTable<K, T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            limit: None,
            _kind: std::marker::PhantomData,
        }
    }

    /// Table that refuses to hold more than `limit` live entries.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::new()
        }
    }

    /// Store `value` and return the handle that now owns it.
    pub fn allocate(&mut self, value: T) -> Result<Handle<K>> {
        if let Some(limit) = self.limit {
            if self.live >= limit {
                return Err(BridgeError::HandleLimit {
                    kind: K::NAME,
                    limit,
                });
            }
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len())
                    .map_err(|_| BridgeError::HostAllocation { kind: K::NAME })?;
                self.slots.push(Slot {
                    generation: 1,
                    value: None,
                });
                index
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.value = Some(value);
        self.live += 1;
        Ok(Handle::new(index, slot.generation))
    }

    /// Remove the entry behind `handle`.
    ///
    /// Returns `None` if the handle is stale or was never issued.
    pub fn release(&mut self, handle: Handle<K>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        self.live -= 1;

        if slot.generation < MAX_GENERATION {
            slot.generation += 1;
            self.free.push(handle.index());
        } else {
            tracing::debug!(kind = K::NAME, index = handle.index(), "retiring exhausted slot");
        }
        Some(value)
    }

    pub fn get(&self, handle: Handle<K>) -> Option<&T> {
        let slot = self.slots.get(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle<K>) -> Option<&mut T> {
        self.slot_mut(handle)?.value.as_mut()
    }

    pub fn contains(&self, handle: Handle<K>) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<K>, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (Handle::new(index as u32, slot.generation), value))
        })
    }

    /// Release every live entry, in slot order.
    pub fn drain(&mut self) -> Vec<(Handle<K>, T)> {
        let handles: Vec<Handle<K>> = self.iter().map(|(handle, _)| handle).collect();
        handles
            .into_iter()
            .filter_map(|handle| self.release(handle).map(|value| (handle, value)))
            .collect()
    }

    fn slot_mut(&mut self, handle: Handle<K>) -> Option<&mut Slot<T>> {
        let slot = self.slots.get_mut(handle.index() as usize)?;
        if slot.generation != handle.generation() {
            return None;
        }
        Some(slot)
    }
}

impl<K: ResourceKind, T> Default for HandleTable<K, T> {
    fn default() -> Self {
        Self::new()
    }
}
