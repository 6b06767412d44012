//! ACL data in both directions.
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::driver::{FakeDevices, Platform};
use crate::handle::{PhysicalHandle, VirtualHandle};
use crate::packet::AclPacket;
use crate::virtualizer::{Disposition, HciVirtualizer};
use crate::Error;

impl<M, F, P> HciVirtualizer<M, F, P>
where
    M: RawMutex,
    F: FakeDevices,
    P: Platform,
{
    /// Process an ACL packet on its way from the controller to the host.
    ///
    /// Panics if the packet belongs to a connection that is not mapped.
    pub fn on_acl_from_controller(&self, packet: &mut [u8]) -> Result<Disposition, Error> {
        let mut acl = AclPacket::new(packet)?;
        let phys = PhysicalHandle::new(acl.handle());
        let virt = self.virtual_for(phys);

        acl.set_handle(virt.raw());
        self.platform.sync_after_write(acl.as_bytes());
        Ok(Disposition::Rewritten)
    }

    /// Process an ACL packet on its way from the host to the controller.
    ///
    /// Packets for fake devices are handed over and not forwarded. Panics if the packet
    /// belongs to neither a fake device nor a mapped connection.
    pub fn on_acl_from_host(&self, packet: &mut [u8]) -> Result<Disposition, Error> {
        let mut acl = AclPacket::new(packet)?;
        let virt = VirtualHandle::from_wire(acl.handle());

        if self.fake_devices.handle_acl_out(virt, acl.as_bytes()) {
            return Ok(Disposition::Emulated);
        }

        let phys = self.physical_for(virt);
        acl.set_handle(phys.raw());
        self.platform.sync_after_write(acl.as_bytes());
        Ok(Disposition::Rewritten)
    }
}
