//! Controller to host events.
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::command::{self, CommandKind};
use crate::driver::{FakeDevices, Platform};
use crate::handle::PhysicalHandle;
use crate::packet::EventPacket;
use crate::virtualizer::{Disposition, HciVirtualizer};
use crate::Error;

pub mod codes {
    pub const CONNECTION_COMPLETE: u8 = 0x03;
    pub const CONNECTION_REQUEST: u8 = 0x04;
    pub const DISCONNECTION_COMPLETE: u8 = 0x05;
    pub const AUTHENTICATION_COMPLETE: u8 = 0x06;
    pub const ENCRYPTION_CHANGE: u8 = 0x08;
    pub const CHANGE_CONNECTION_LINK_KEY_COMPLETE: u8 = 0x09;
    pub const MASTER_LINK_KEY_COMPLETE: u8 = 0x0A;
    pub const READ_REMOTE_SUPPORTED_FEATURES_COMPLETE: u8 = 0x0B;
    pub const READ_REMOTE_VERSION_INFORMATION_COMPLETE: u8 = 0x0C;
    pub const QOS_SETUP_COMPLETE: u8 = 0x0D;
    pub const COMMAND_COMPLETE: u8 = 0x0E;
    pub const COMMAND_STATUS: u8 = 0x0F;
    pub const FLUSH_OCCURRED: u8 = 0x11;
    pub const NUMBER_OF_COMPLETED_PACKETS: u8 = 0x13;
    pub const MODE_CHANGE: u8 = 0x14;
    pub const MAX_SLOTS_CHANGE: u8 = 0x1B;
    pub const READ_CLOCK_OFFSET_COMPLETE: u8 = 0x1C;
    pub const CONNECTION_PACKET_TYPE_CHANGED: u8 = 0x1D;
    pub const QOS_VIOLATION: u8 = 0x1E;
    pub const FLOW_SPECIFICATION_COMPLETE: u8 = 0x21;
    pub const READ_REMOTE_EXTENDED_FEATURES_COMPLETE: u8 = 0x23;
    pub const SYNCHRONOUS_CONNECTION_COMPLETE: u8 = 0x2C;
    pub const SYNCHRONOUS_CONNECTION_CHANGED: u8 = 0x2D;
    pub const SNIFF_SUBRATING: u8 = 0x2E;
    pub const ENCRYPTION_KEY_REFRESH_COMPLETE: u8 = 0x30;
    pub const LINK_SUPERVISION_TIMEOUT_CHANGED: u8 = 0x38;
    pub const ENHANCED_FLUSH_COMPLETE: u8 = 0x39;
}

/// Status code for success.
const SUCCESS: u8 = 0x00;

/// Offset of the handle in events that start with a status byte.
const AFTER_STATUS: usize = 1;

/// How an event is treated on its way to the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// A new controller connection, gets a virtual handle.
    ConnectionComplete,
    /// A controller connection is gone, its virtual handle is released.
    DisconnectionComplete,
    /// Carries the handle of an active connection at `offset` in its parameters.
    ConnHandle { offset: usize },
    /// Number Of Completed Packets, a list of handle and count pairs.
    CompletedPackets,
    /// Command Complete, may echo a handle in its return parameters.
    CommandComplete,
}

use self::codes::*;

static EVENTS: &[(u8, EventKind)] = &[
    (CONNECTION_COMPLETE, EventKind::ConnectionComplete),
    (DISCONNECTION_COMPLETE, EventKind::DisconnectionComplete),
    (COMMAND_COMPLETE, EventKind::CommandComplete),
    (NUMBER_OF_COMPLETED_PACKETS, EventKind::CompletedPackets),
    (AUTHENTICATION_COMPLETE, EventKind::ConnHandle { offset: AFTER_STATUS }),
    (ENCRYPTION_CHANGE, EventKind::ConnHandle { offset: AFTER_STATUS }),
    (CHANGE_CONNECTION_LINK_KEY_COMPLETE, EventKind::ConnHandle { offset: AFTER_STATUS }),
    (MASTER_LINK_KEY_COMPLETE, EventKind::ConnHandle { offset: AFTER_STATUS }),
    (READ_REMOTE_SUPPORTED_FEATURES_COMPLETE, EventKind::ConnHandle { offset: AFTER_STATUS }),
    (READ_REMOTE_VERSION_INFORMATION_COMPLETE, EventKind::ConnHandle { offset: AFTER_STATUS }),
    (QOS_SETUP_COMPLETE, EventKind::ConnHandle { offset: AFTER_STATUS }),
    (FLUSH_OCCURRED, EventKind::ConnHandle { offset: 0 }),
    (MODE_CHANGE, EventKind::ConnHandle { offset: AFTER_STATUS }),
    (MAX_SLOTS_CHANGE, EventKind::ConnHandle { offset: 0 }),
    (READ_CLOCK_OFFSET_COMPLETE, EventKind::ConnHandle { offset: AFTER_STATUS }),
    (CONNECTION_PACKET_TYPE_CHANGED, EventKind::ConnHandle { offset: AFTER_STATUS }),
    (QOS_VIOLATION, EventKind::ConnHandle { offset: 0 }),
    (FLOW_SPECIFICATION_COMPLETE, EventKind::ConnHandle { offset: AFTER_STATUS }),
    (READ_REMOTE_EXTENDED_FEATURES_COMPLETE, EventKind::ConnHandle { offset: AFTER_STATUS }),
    // The handle of a new synchronous link is never mapped, so this is fatal unless the
    // controller reuses the handle of a mapped connection.
    (SYNCHRONOUS_CONNECTION_COMPLETE, EventKind::ConnHandle { offset: AFTER_STATUS }),
    (SYNCHRONOUS_CONNECTION_CHANGED, EventKind::ConnHandle { offset: AFTER_STATUS }),
    (SNIFF_SUBRATING, EventKind::ConnHandle { offset: AFTER_STATUS }),
    (ENCRYPTION_KEY_REFRESH_COMPLETE, EventKind::ConnHandle { offset: AFTER_STATUS }),
    (LINK_SUPERVISION_TIMEOUT_CHANGED, EventKind::ConnHandle { offset: 0 }),
    (ENHANCED_FLUSH_COMPLETE, EventKind::ConnHandle { offset: 0 }),
];

/// Look up how an event code is handled. Unknown events are `None`.
pub fn classify(code: u8) -> Option<EventKind> {
    EVENTS.iter().find(|(c, _)| *c == code).map(|(_, kind)| *kind)
}

impl<M, F, P> HciVirtualizer<M, F, P>
where
    M: RawMutex,
    F: FakeDevices,
    P: Platform,
{
    /// Process an event on its way from the controller to the host.
    ///
    /// Creates and removes handle mappings as connections come and go, and rewrites the
    /// handles embedded in events from physical to virtual. Panics when an event refers to a
    /// connection that is not mapped, or when a new connection does not fit in the table.
    pub fn on_event_from_controller(&self, packet: &mut [u8]) -> Result<Disposition, Error> {
        let mut event = EventPacket::new(packet)?;
        let code = event.code();

        let Some(kind) = classify(code) else {
            return Ok(Disposition::Forward);
        };

        let modified = match kind {
            EventKind::ConnectionComplete => {
                let status = event.read_u8(0)?;
                let phys = PhysicalHandle::new(event.read_u16(AFTER_STATUS)?);
                info!("[evt] connection complete: status {:#x}, handle {:#x}", status, phys.raw());
                if status != SUCCESS {
                    return Ok(Disposition::Forward);
                }

                let virt = self.with_state(|state| {
                    let virt = state.alloc.allocate();
                    state.map.map(phys, virt).map(|_| virt)
                });
                let virt = unwrap!(virt, "no room for connection {:#x}", phys.raw());
                info!("[evt] new connection: p {:#x} -> v {:#x}", phys.raw(), virt.raw());
                event.write_u16(AFTER_STATUS, virt.raw())?;
                true
            }
            EventKind::DisconnectionComplete => {
                let status = event.read_u8(0)?;
                let phys = PhysicalHandle::new(event.read_u16(AFTER_STATUS)?);
                info!(
                    "[evt] disconnection complete: status {:#x}, handle {:#x}",
                    status,
                    phys.raw()
                );
                if status != SUCCESS {
                    return Ok(Disposition::Forward);
                }

                let virt = self.with_state(|state| {
                    let virt = state.map.lookup_virtual(phys)?;
                    state.map.unmap_by_virtual(virt).ok().map(|_| virt)
                });
                let virt = unwrap!(virt, "disconnection of unknown connection {:#x}", phys.raw());
                info!("[evt] connection removed: p {:#x} -> v {:#x}", phys.raw(), virt.raw());
                event.write_u16(AFTER_STATUS, virt.raw())?;
                true
            }
            EventKind::ConnHandle { offset } => {
                let phys = PhysicalHandle::new(event.read_u16(offset)?);
                let virt = self.virtual_for(phys);
                trace!(
                    "[evt] event {:#x} handle p {:#x} -> v {:#x}",
                    code,
                    phys.raw(),
                    virt.raw()
                );
                event.write_u16(offset, virt.raw())?;
                true
            }
            EventKind::CompletedPackets => {
                let entries = event.read_u8(0)? as usize;
                // Reject a short list before rewriting any entry.
                if 1 + entries * 4 > event.param_len() {
                    return Err(Error::Truncated);
                }
                for i in 0..entries {
                    let offset = 1 + i * 4;
                    let phys = PhysicalHandle::new(event.read_u16(offset)?);
                    let virt = self.virtual_for(phys);
                    event.write_u16(offset, virt.raw())?;
                }
                entries > 0
            }
            EventKind::CommandComplete => self.translate_command_complete(&mut event)?,
        };

        if !modified {
            return Ok(Disposition::Forward);
        }
        self.platform.sync_after_write(event.as_bytes());
        Ok(Disposition::Rewritten)
    }

    /// Command Complete: number of packets (1), opcode (2), then the return parameters which
    /// start with a status byte for all the commands we translate.
    fn translate_command_complete(&self, event: &mut EventPacket<'_>) -> Result<bool, Error> {
        const OPCODE: usize = 1;
        const STATUS: usize = 3;
        const HANDLE: usize = 4;

        let opcode = event.read_u16(OPCODE)?;
        let Some(CommandKind::ConnHandle {
            returns_handle: true, ..
        }) = command::classify(opcode)
        else {
            return Ok(false);
        };

        let status = event.read_u8(STATUS)?;
        let phys = PhysicalHandle::new(event.read_u16(HANDLE)?);
        let virt = if status == SUCCESS {
            self.virtual_for(phys)
        } else {
            // Failed commands may echo a handle the controller never assigned.
            match self.lookup_virtual(phys) {
                Some(virt) => virt,
                None => return Ok(false),
            }
        };
        trace!(
            "[evt] command complete {:#x} handle p {:#x} -> v {:#x}",
            opcode,
            phys.raw(),
            virt.raw()
        );
        event.write_u16(HANDLE, virt.raw())?;
        Ok(true)
    }
}
