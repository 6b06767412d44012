//! HciVirtualizer
//!
//! The virtualizer holds the connection handle translation state shared by all interceptors,
//! and is the entry point for every packet crossing the host/controller boundary.
use core::cell::RefCell;

use bt_hci::param::BdAddr;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;

use crate::config::MAX_CONNECTIONS;
use crate::driver::{FakeDevices, Platform};
use crate::handle::{HandleAllocator, PhysicalHandle, VirtualHandle};
use crate::handle_map::HandleMap;
use crate::snoop::{DeviceClass, Snoop};

/// Connection Request event code.
const EVENT_CONNECTION_REQUEST: u8 = 0x04;
/// Connection Request event size: header, address, class of device, link type.
const CONNECTION_REQUEST_LEN: usize = 2 + 6 + 3 + 1;

/// What the transport should do with a packet after interception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Disposition {
    /// Forward to the real controller or host unchanged.
    Forward,
    /// A handle was rewritten in place (and flushed); forward it.
    Rewritten,
    /// A fake device handled the packet; do not forward it to the controller.
    Emulated,
}

impl Disposition {
    pub fn forward_to_controller(&self) -> bool {
        !matches!(self, Disposition::Emulated)
    }

    pub fn is_modified(&self) -> bool {
        matches!(self, Disposition::Rewritten)
    }
}

/// Link type of a synthesized connection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum LinkType {
    Sco = 0x00,
    Acl = 0x01,
    Esco = 0x02,
}

pub(crate) struct State {
    pub(crate) map: HandleMap<MAX_CONNECTIONS>,
    pub(crate) alloc: HandleAllocator,
    pub(crate) snoop: Snoop,
}

impl State {
    const fn new() -> Self {
        Self {
            map: HandleMap::new(),
            alloc: HandleAllocator::new(),
            snoop: Snoop::new(),
        }
    }
}

/// An HCI virtualization layer.
///
/// Sits between a host stack and a real controller, hands out its own connection handles to
/// the host and lets fake devices take over some of the traffic.
///
/// The state is guarded by a blocking mutex of type `M`. Use `NoopRawMutex` when both
/// directions are dispatched from the same context and `CriticalSectionRawMutex` when they
/// run in different interrupt contexts. The lock is never held while calling into the fake
/// devices.
pub struct HciVirtualizer<M: RawMutex, F, P> {
    state: Mutex<M, RefCell<State>>,
    pub(crate) fake_devices: F,
    pub(crate) platform: P,
}

impl<M, F, P> HciVirtualizer<M, F, P>
where
    M: RawMutex,
    F: FakeDevices,
    P: Platform,
{
    /// Create a virtualizer with no connections, scanning disabled and a zero class of device.
    pub fn new(fake_devices: F, platform: P) -> Self {
        Self {
            state: Mutex::new(RefCell::new(State::new())),
            fake_devices,
            platform,
        }
    }

    pub fn fake_devices(&self) -> &F {
        &self.fake_devices
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        self.state.lock(|state| f(&mut state.borrow_mut()))
    }

    /// Physical handle of a connection the host refers to. Panics if it is not mapped.
    pub(crate) fn physical_for(&self, virt: VirtualHandle) -> PhysicalHandle {
        let phys = self.with_state(|state| state.map.lookup_physical(virt));
        unwrap!(phys, "no controller connection for virtual handle {:#x}", virt.raw())
    }

    /// Virtual handle of a connection the controller refers to. Panics if it is not mapped.
    pub(crate) fn virtual_for(&self, phys: PhysicalHandle) -> VirtualHandle {
        let virt = self.with_state(|state| state.map.lookup_virtual(phys));
        unwrap!(virt, "no virtual handle for physical handle {:#x}", phys.raw())
    }

    /// Whether a fake device owns `virt`. Does not hand anything over.
    pub fn is_fake_device_owner(&self, virt: VirtualHandle) -> bool {
        self.fake_devices.owns(virt)
    }

    /// Physical handle currently mapped to `virt`, if any.
    pub fn lookup_physical(&self, virt: VirtualHandle) -> Option<PhysicalHandle> {
        self.with_state(|state| state.map.lookup_physical(virt))
    }

    /// Virtual handle currently mapped to `phys`, if any.
    pub fn lookup_virtual(&self, phys: PhysicalHandle) -> Option<VirtualHandle> {
        self.with_state(|state| state.map.lookup_virtual(phys))
    }

    /// Number of controller connections currently mapped.
    pub fn connections(&self) -> usize {
        self.with_state(|state| state.map.len())
    }

    /// Last scan enable value written by the host.
    pub fn scan_enable(&self) -> u8 {
        self.with_state(|state| state.snoop.scan_enable())
    }

    pub fn page_scan_enabled(&self) -> bool {
        self.with_state(|state| state.snoop.page_scan_enabled())
    }

    /// Last class of device written by the host.
    pub fn device_class(&self) -> DeviceClass {
        self.with_state(|state| state.snoop.device_class())
    }

    /// The host queued a buffer for HCI events.
    pub fn on_event_buffer_request(&self, len: usize) {
        self.fake_devices.on_event_buffer_request(len);
    }

    /// The host queued a buffer for inbound ACL data.
    pub fn on_acl_in_buffer_request(&self, len: usize) {
        self.fake_devices.on_acl_in_buffer_request(len);
    }

    /// Announce an incoming connection from a fake device to the host.
    ///
    /// Returns `Ok(false)` without doing anything when page scan is disabled, since the real
    /// controller would not have seen the request either.
    pub fn request_connection(&self, addr: BdAddr, class: DeviceClass, link_type: LinkType) -> Result<bool, P::Error> {
        if !self.page_scan_enabled() {
            debug!("[virt] page scan disabled, dropping connection request from {:?}", addr);
            return Ok(false);
        }

        let mut event: Vec<u8, CONNECTION_REQUEST_LEN> = Vec::new();
        // Capacity is exactly the event size.
        unwrap!(event.extend_from_slice(&[EVENT_CONNECTION_REQUEST, (CONNECTION_REQUEST_LEN - 2) as u8]));
        unwrap!(event.extend_from_slice(addr.raw()));
        unwrap!(event.extend_from_slice(&class.raw()));
        unwrap!(event.push(link_type as u8));

        self.platform.enqueue_event(&event)?;
        info!("[virt] connection request from {:?} queued", addr);
        Ok(true)
    }
}
