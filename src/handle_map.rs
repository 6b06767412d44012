//! Translation table between physical and virtual connection handles.
use crate::handle::{PhysicalHandle, VirtualHandle};
use crate::Error;

/// One slot of the translation table.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MappingStorage {
    pub valid: bool,
    pub virt: VirtualHandle,
    pub phys: PhysicalHandle,
}

impl MappingStorage {
    pub(crate) const EMPTY: MappingStorage = MappingStorage {
        valid: false,
        virt: VirtualHandle::from_wire(0),
        phys: PhysicalHandle::new(0),
    };
}

/// Fixed capacity partial bijection between physical and virtual handles.
///
/// Lookups scan the slots linearly. Callers must not map a physical handle twice
/// without unmapping it first.
pub struct HandleMap<const N: usize> {
    slots: [MappingStorage; N],
}

impl<const N: usize> Default for HandleMap<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> HandleMap<N> {
    pub const fn new() -> Self {
        Self {
            slots: [MappingStorage::EMPTY; N],
        }
    }

    /// Insert a mapping into the first free slot.
    pub fn map(&mut self, phys: PhysicalHandle, virt: VirtualHandle) -> Result<(), Error> {
        for slot in self.slots.iter_mut() {
            if !slot.valid {
                slot.virt = virt;
                slot.phys = phys;
                slot.valid = true;
                return Ok(());
            }
        }
        trace!("[map] no free slot for handle {:#x}", phys.raw());
        Err(Error::TableFull)
    }

    /// Remove the mapping of a physical handle, returning the virtual handle it had.
    pub fn unmap_by_physical(&mut self, phys: PhysicalHandle) -> Result<VirtualHandle, Error> {
        for slot in self.slots.iter_mut() {
            if slot.valid && slot.phys == phys {
                slot.valid = false;
                return Ok(slot.virt);
            }
        }
        Err(Error::NotFound)
    }

    /// Remove the mapping of a virtual handle, returning the physical handle it had.
    pub fn unmap_by_virtual(&mut self, virt: VirtualHandle) -> Result<PhysicalHandle, Error> {
        for slot in self.slots.iter_mut() {
            if slot.valid && slot.virt == virt {
                slot.valid = false;
                return Ok(slot.phys);
            }
        }
        Err(Error::NotFound)
    }

    pub fn lookup_virtual(&self, phys: PhysicalHandle) -> Option<VirtualHandle> {
        self.slots.iter().find(|s| s.valid && s.phys == phys).map(|s| s.virt)
    }

    pub fn lookup_physical(&self, virt: VirtualHandle) -> Option<PhysicalHandle> {
        self.slots.iter().find(|s| s.valid && s.virt == virt).map(|s| s.phys)
    }

    /// Iterate over the valid `(physical, virtual)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (PhysicalHandle, VirtualHandle)> + '_ {
        self.slots.iter().filter(|s| s.valid).map(|s| (s.phys, s.virt))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.valid).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(|s| s.valid)
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.valid = false;
        }
    }
}
