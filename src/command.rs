//! Host to controller commands.
use bt_hci::param::BdAddr;

use crate::driver::{FakeDevices, Platform, Role};
use crate::handle::VirtualHandle;
use crate::packet::CommandPacket;
use crate::snoop::DeviceClass;
use crate::virtualizer::{Disposition, HciVirtualizer};
use crate::Error;

/// Opcode group field.
#[derive(Copy, Clone, Debug)]
#[repr(u8)]
pub enum Ogf {
    LinkControl = 0x01,
    LinkPolicy = 0x02,
    ControllerAndBaseband = 0x03,
    InformationalParameters = 0x04,
    StatusParameters = 0x05,
    Testing = 0x06,
    LeController = 0x08,
}

pub const fn opcode(ogf: Ogf, ocf: u16) -> u16 {
    ((ogf as u16) << 10) | (ocf & 0x03FF)
}

pub mod opcodes {
    use super::{opcode, Ogf};

    pub const INQUIRY: u16 = opcode(Ogf::LinkControl, 0x0001);
    pub const CREATE_CONNECTION: u16 = opcode(Ogf::LinkControl, 0x0005);
    pub const DISCONNECT: u16 = opcode(Ogf::LinkControl, 0x0006);
    pub const ADD_SCO_CONNECTION: u16 = opcode(Ogf::LinkControl, 0x0007);
    pub const ACCEPT_CONNECTION_REQUEST: u16 = opcode(Ogf::LinkControl, 0x0009);
    pub const REJECT_CONNECTION_REQUEST: u16 = opcode(Ogf::LinkControl, 0x000A);
    pub const CHANGE_CONNECTION_PACKET_TYPE: u16 = opcode(Ogf::LinkControl, 0x000F);
    pub const AUTHENTICATION_REQUESTED: u16 = opcode(Ogf::LinkControl, 0x0011);
    pub const SET_CONNECTION_ENCRYPTION: u16 = opcode(Ogf::LinkControl, 0x0013);
    pub const CHANGE_CONNECTION_LINK_KEY: u16 = opcode(Ogf::LinkControl, 0x0015);
    pub const READ_REMOTE_SUPPORTED_FEATURES: u16 = opcode(Ogf::LinkControl, 0x001B);
    pub const READ_REMOTE_EXTENDED_FEATURES: u16 = opcode(Ogf::LinkControl, 0x001C);
    pub const READ_REMOTE_VERSION_INFORMATION: u16 = opcode(Ogf::LinkControl, 0x001D);
    pub const READ_CLOCK_OFFSET: u16 = opcode(Ogf::LinkControl, 0x001F);
    pub const READ_LMP_HANDLE: u16 = opcode(Ogf::LinkControl, 0x0020);
    pub const SETUP_SYNCHRONOUS_CONNECTION: u16 = opcode(Ogf::LinkControl, 0x0028);

    pub const HOLD_MODE: u16 = opcode(Ogf::LinkPolicy, 0x0001);
    pub const SNIFF_MODE: u16 = opcode(Ogf::LinkPolicy, 0x0003);
    pub const EXIT_SNIFF_MODE: u16 = opcode(Ogf::LinkPolicy, 0x0004);
    pub const PARK_STATE: u16 = opcode(Ogf::LinkPolicy, 0x0005);
    pub const EXIT_PARK_STATE: u16 = opcode(Ogf::LinkPolicy, 0x0006);
    pub const QOS_SETUP: u16 = opcode(Ogf::LinkPolicy, 0x0007);
    pub const ROLE_DISCOVERY: u16 = opcode(Ogf::LinkPolicy, 0x0009);
    pub const READ_LINK_POLICY_SETTINGS: u16 = opcode(Ogf::LinkPolicy, 0x000C);
    pub const WRITE_LINK_POLICY_SETTINGS: u16 = opcode(Ogf::LinkPolicy, 0x000D);
    pub const FLOW_SPECIFICATION: u16 = opcode(Ogf::LinkPolicy, 0x0010);
    pub const SNIFF_SUBRATING: u16 = opcode(Ogf::LinkPolicy, 0x0011);

    pub const SET_EVENT_FILTER: u16 = opcode(Ogf::ControllerAndBaseband, 0x0005);
    pub const FLUSH: u16 = opcode(Ogf::ControllerAndBaseband, 0x0008);
    pub const WRITE_LOCAL_NAME: u16 = opcode(Ogf::ControllerAndBaseband, 0x0013);
    pub const WRITE_SCAN_ENABLE: u16 = opcode(Ogf::ControllerAndBaseband, 0x001A);
    pub const WRITE_CLASS_OF_DEVICE: u16 = opcode(Ogf::ControllerAndBaseband, 0x0024);
    pub const READ_AUTOMATIC_FLUSH_TIMEOUT: u16 = opcode(Ogf::ControllerAndBaseband, 0x0027);
    pub const WRITE_AUTOMATIC_FLUSH_TIMEOUT: u16 = opcode(Ogf::ControllerAndBaseband, 0x0028);
    pub const READ_TRANSMIT_POWER_LEVEL: u16 = opcode(Ogf::ControllerAndBaseband, 0x002D);
    pub const HOST_NUMBER_OF_COMPLETED_PACKETS: u16 = opcode(Ogf::ControllerAndBaseband, 0x0035);
    pub const READ_LINK_SUPERVISION_TIMEOUT: u16 = opcode(Ogf::ControllerAndBaseband, 0x0036);
    pub const WRITE_LINK_SUPERVISION_TIMEOUT: u16 = opcode(Ogf::ControllerAndBaseband, 0x0037);
    pub const WRITE_INQUIRY_SCAN_TYPE: u16 = opcode(Ogf::ControllerAndBaseband, 0x0043);
    pub const WRITE_INQUIRY_MODE: u16 = opcode(Ogf::ControllerAndBaseband, 0x0045);
    pub const WRITE_PAGE_SCAN_TYPE: u16 = opcode(Ogf::ControllerAndBaseband, 0x0047);
    pub const REFRESH_ENCRYPTION_KEY: u16 = opcode(Ogf::ControllerAndBaseband, 0x0053);
    pub const ENHANCED_FLUSH: u16 = opcode(Ogf::ControllerAndBaseband, 0x005F);

    pub const READ_FAILED_CONTACT_COUNTER: u16 = opcode(Ogf::StatusParameters, 0x0001);
    pub const RESET_FAILED_CONTACT_COUNTER: u16 = opcode(Ogf::StatusParameters, 0x0002);
    pub const READ_LINK_QUALITY: u16 = opcode(Ogf::StatusParameters, 0x0003);
    pub const READ_RSSI: u16 = opcode(Ogf::StatusParameters, 0x0005);
    pub const READ_AFH_CHANNEL_MAP: u16 = opcode(Ogf::StatusParameters, 0x0006);
    pub const READ_CLOCK: u16 = opcode(Ogf::StatusParameters, 0x0007);
}

/// How a command is treated on its way to the controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandKind {
    /// Forwarded untouched.
    Passthrough,
    /// Write Scan Enable, remembered then forwarded.
    ScanEnable,
    /// Write Class of Device, remembered then forwarded.
    ClassOfDevice,
    /// Accept Connection Request, may be claimed by a fake device.
    AcceptConnection,
    /// Carries a connection handle at `offset` in its parameters. When `returns_handle` is set,
    /// the Command Complete event echoes the handle right after the status byte.
    ConnHandle { offset: usize, returns_handle: bool },
}

const fn handle(returns_handle: bool) -> CommandKind {
    CommandKind::ConnHandle {
        offset: 0,
        returns_handle,
    }
}

use self::opcodes::*;

static COMMANDS: &[(u16, CommandKind)] = &[
    (INQUIRY, CommandKind::Passthrough),
    (CREATE_CONNECTION, CommandKind::Passthrough),
    (ACCEPT_CONNECTION_REQUEST, CommandKind::AcceptConnection),
    (REJECT_CONNECTION_REQUEST, CommandKind::Passthrough),
    (WRITE_LOCAL_NAME, CommandKind::Passthrough),
    (WRITE_SCAN_ENABLE, CommandKind::ScanEnable),
    (WRITE_CLASS_OF_DEVICE, CommandKind::ClassOfDevice),
    (WRITE_INQUIRY_SCAN_TYPE, CommandKind::Passthrough),
    (WRITE_PAGE_SCAN_TYPE, CommandKind::Passthrough),
    (WRITE_INQUIRY_MODE, CommandKind::Passthrough),
    (SET_EVENT_FILTER, CommandKind::Passthrough),
    // TODO: translate the handle list once host flow control is enabled towards the controller.
    (HOST_NUMBER_OF_COMPLETED_PACKETS, CommandKind::Passthrough),
    (DISCONNECT, handle(false)),
    (ADD_SCO_CONNECTION, handle(false)),
    (CHANGE_CONNECTION_PACKET_TYPE, handle(false)),
    (AUTHENTICATION_REQUESTED, handle(false)),
    (SET_CONNECTION_ENCRYPTION, handle(false)),
    (CHANGE_CONNECTION_LINK_KEY, handle(false)),
    (READ_REMOTE_SUPPORTED_FEATURES, handle(false)),
    (READ_REMOTE_EXTENDED_FEATURES, handle(false)),
    (READ_REMOTE_VERSION_INFORMATION, handle(false)),
    (READ_CLOCK_OFFSET, handle(false)),
    (READ_LMP_HANDLE, handle(true)),
    (SETUP_SYNCHRONOUS_CONNECTION, handle(false)),
    (HOLD_MODE, handle(false)),
    (SNIFF_MODE, handle(false)),
    (EXIT_SNIFF_MODE, handle(false)),
    (PARK_STATE, handle(false)),
    (EXIT_PARK_STATE, handle(false)),
    (QOS_SETUP, handle(false)),
    (ROLE_DISCOVERY, handle(true)),
    (READ_LINK_POLICY_SETTINGS, handle(true)),
    (WRITE_LINK_POLICY_SETTINGS, handle(true)),
    (FLOW_SPECIFICATION, handle(false)),
    (SNIFF_SUBRATING, handle(true)),
    (FLUSH, handle(true)),
    (READ_AUTOMATIC_FLUSH_TIMEOUT, handle(true)),
    (WRITE_AUTOMATIC_FLUSH_TIMEOUT, handle(true)),
    (READ_TRANSMIT_POWER_LEVEL, handle(true)),
    (READ_LINK_SUPERVISION_TIMEOUT, handle(true)),
    (WRITE_LINK_SUPERVISION_TIMEOUT, handle(true)),
    (REFRESH_ENCRYPTION_KEY, handle(false)),
    (ENHANCED_FLUSH, handle(false)),
    (READ_FAILED_CONTACT_COUNTER, handle(true)),
    (RESET_FAILED_CONTACT_COUNTER, handle(true)),
    (READ_LINK_QUALITY, handle(true)),
    (READ_RSSI, handle(true)),
    (READ_AFH_CHANNEL_MAP, handle(true)),
    (READ_CLOCK, handle(true)),
];

/// Look up how a command opcode is handled. Unknown opcodes are `None`.
pub fn classify(opcode: u16) -> Option<CommandKind> {
    COMMANDS.iter().find(|(op, _)| *op == opcode).map(|(_, kind)| *kind)
}

impl<M, F, P> HciVirtualizer<M, F, P>
where
    M: embassy_sync::blocking_mutex::raw::RawMutex,
    F: FakeDevices,
    P: Platform,
{
    /// Process a command on its way from the host to the controller.
    ///
    /// Handles embedded in the command are rewritten in place from virtual to physical.
    /// Panics if a command references a virtual handle that is neither owned by a fake device
    /// nor mapped to a controller connection.
    pub fn on_command_from_host(&self, packet: &mut [u8]) -> Result<Disposition, Error> {
        let mut cmd = CommandPacket::new(packet)?;
        let opcode = cmd.opcode();

        let Some(kind) = classify(opcode) else {
            trace!("[cmd] opcode {:#x} not recognized, forwarding", opcode);
            return Ok(Disposition::Forward);
        };

        match kind {
            CommandKind::Passthrough => {
                trace!("[cmd] opcode {:#x} forwarded", opcode);
                Ok(Disposition::Forward)
            }
            CommandKind::ScanEnable => {
                let params = cmd.params();
                let scan_enable = *params.first().ok_or(Error::Truncated)?;
                debug!("[cmd] write scan enable {:#x}", scan_enable);
                self.with_state(|state| state.snoop.set_scan_enable(scan_enable));
                Ok(Disposition::Forward)
            }
            CommandKind::ClassOfDevice => {
                let params = cmd.params();
                let class = params.get(..3).ok_or(Error::Truncated)?;
                let class = DeviceClass([class[0], class[1], class[2]]);
                debug!("[cmd] write class of device {:?}", class);
                self.with_state(|state| state.snoop.set_device_class(class));
                Ok(Disposition::Forward)
            }
            CommandKind::AcceptConnection => {
                let params = cmd.params();
                if params.len() < 7 {
                    return Err(Error::Truncated);
                }
                let mut raw = [0; 6];
                raw.copy_from_slice(&params[..6]);
                let addr = BdAddr::new(raw);
                let Some(role) = Role::from_raw(params[6]) else {
                    warn!("[cmd] accept connection with invalid role {:#x}", params[6]);
                    return Ok(Disposition::Forward);
                };
                info!("[cmd] accept connection from {:?} as {:?}", addr, role);
                if self.fake_devices.accept_connection(&addr, role) {
                    debug!("[cmd] connection accepted by a fake device");
                    Ok(Disposition::Emulated)
                } else {
                    Ok(Disposition::Forward)
                }
            }
            CommandKind::ConnHandle { offset, .. } => {
                let virt = VirtualHandle::from_wire(cmd.read_u16(offset)?);
                if self.fake_devices.handle_command(virt, cmd.as_bytes()) {
                    debug!("[cmd] opcode {:#x} for {:#x} handled by a fake device", opcode, virt.raw());
                    return Ok(Disposition::Emulated);
                }

                let phys = self.physical_for(virt);
                trace!(
                    "[cmd] opcode {:#x} handle v {:#x} -> p {:#x}",
                    opcode,
                    virt.raw(),
                    phys.raw()
                );
                cmd.write_u16(offset, phys.raw())?;
                self.platform.sync_after_write(cmd.as_bytes());
                Ok(Disposition::Rewritten)
            }
        }
    }
}
