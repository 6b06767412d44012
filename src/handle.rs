//! Connection handle spaces and the virtual handle allocator.
use bt_hci::param::ConnHandle;

/// Number of values in the virtual handle space, `0x0000..=0x0EFF`.
pub const VIRTUAL_HANDLE_SPACE: u16 = 0x0F00;

/// Mask of the connection handle bits in a 16-bit handle field.
pub(crate) const HANDLE_MASK: u16 = 0x0FFF;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidHandle;

/// A connection handle as presented to the host stack.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct VirtualHandle(u16);

impl VirtualHandle {
    /// Create a virtual handle, rejecting values outside `0x0000..=0x0EFF`.
    pub const fn new(handle: u16) -> Result<Self, InvalidHandle> {
        if handle >= VIRTUAL_HANDLE_SPACE {
            return Err(InvalidHandle);
        }
        Ok(Self(handle))
    }

    /// Wrap a handle read from a host packet. Only the 12 handle bits are kept.
    pub(crate) const fn from_wire(raw: u16) -> Self {
        Self(raw & HANDLE_MASK)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl From<VirtualHandle> for ConnHandle {
    fn from(handle: VirtualHandle) -> Self {
        ConnHandle::new(handle.0)
    }
}

/// A connection handle as assigned by the real controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PhysicalHandle(u16);

impl PhysicalHandle {
    pub const fn new(handle: u16) -> Self {
        Self(handle & HANDLE_MASK)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl From<ConnHandle> for PhysicalHandle {
    fn from(handle: ConnHandle) -> Self {
        Self::new(handle.raw())
    }
}

impl From<PhysicalHandle> for ConnHandle {
    fn from(handle: PhysicalHandle) -> Self {
        ConnHandle::new(handle.0)
    }
}

/// Issues virtual handles in sequence, wrapping at [`VIRTUAL_HANDLE_SPACE`].
///
/// There is no check against handles that are still mapped: once the sequence wraps, a
/// long-lived connection may share its virtual handle with a newly issued one.
#[derive(Debug)]
pub struct HandleAllocator {
    next: u16,
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleAllocator {
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Returns the next handle in sequence. Never fails.
    pub fn allocate(&mut self) -> VirtualHandle {
        let handle = VirtualHandle(self.next);
        self.next = (self.next + 1) % VIRTUAL_HANDLE_SPACE;
        handle
    }
}
