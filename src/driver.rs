//! Interfaces to the collaborators around the virtualization layer.
use bt_hci::param::BdAddr;

use crate::handle::VirtualHandle;

/// Role requested by the host when accepting a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Role {
    /// Become the central of the link (role switch).
    Central = 0x00,
    /// Remain the peripheral of the link.
    Peripheral = 0x01,
}

impl Role {
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0x00 => Some(Role::Central),
            0x01 => Some(Role::Peripheral),
            _ => None,
        }
    }
}

/// Platform services used by the virtualization layer.
pub trait Platform {
    type Error: core::fmt::Debug;

    /// Make a rewritten region visible to DMA capable hardware.
    ///
    /// Called after every in-place rewrite with exactly the header plus declared length of the packet.
    fn sync_after_write(&self, data: &[u8]);

    /// Deliver a synthesized HCI event packet (without the packet indicator) to the host.
    fn enqueue_event(&self, packet: &[u8]) -> Result<(), Self::Error>;
}

/// The emulated peripheral subsystem.
///
/// Every method returning `bool` returns `true` when a fake device took over the packet, in
/// which case it must not reach the real controller.
pub trait FakeDevices {
    /// Whether a fake device owns the connection `handle`.
    fn owns(&self, handle: VirtualHandle) -> bool;

    /// Offer a command addressed to `handle` to the fake devices.
    fn handle_command(&self, handle: VirtualHandle, packet: &[u8]) -> bool;

    /// Offer a pending incoming connection to the fake devices.
    fn accept_connection(&self, addr: &BdAddr, role: Role) -> bool;

    /// Offer an outbound ACL packet addressed to `handle` to the fake devices.
    fn handle_acl_out(&self, handle: VirtualHandle, packet: &[u8]) -> bool;

    /// The host queued a buffer for HCI events.
    fn on_event_buffer_request(&self, len: usize);

    /// The host queued a buffer for inbound ACL data.
    fn on_acl_in_buffer_request(&self, len: usize);
}

/// No fake devices: everything goes to the real controller.
pub struct NoFakeDevices;

impl FakeDevices for NoFakeDevices {
    fn owns(&self, _: VirtualHandle) -> bool {
        false
    }

    fn handle_command(&self, _: VirtualHandle, _: &[u8]) -> bool {
        false
    }

    fn accept_connection(&self, _: &BdAddr, _: Role) -> bool {
        false
    }

    fn handle_acl_out(&self, _: VirtualHandle, _: &[u8]) -> bool {
        false
    }

    fn on_event_buffer_request(&self, _: usize) {}

    fn on_acl_in_buffer_request(&self, _: usize) {}
}
