#![allow(unused)]

use std::sync::Mutex;

use bt_hci::param::BdAddr;
use hci_virt::{FakeDevices, Platform, Role, VirtualHandle};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Fake devices owning a configurable set of virtual handles and peer addresses.
#[derive(Default)]
pub struct MockFakeDevices {
    pub owned: Mutex<Vec<u16>>,
    pub peers: Mutex<Vec<[u8; 6]>>,
    pub commands: Mutex<Vec<(u16, Vec<u8>)>>,
    pub acl_out: Mutex<Vec<(u16, Vec<u8>)>>,
    pub accepted: Mutex<Vec<([u8; 6], Role)>>,
    pub event_requests: Mutex<Vec<usize>>,
    pub acl_in_requests: Mutex<Vec<usize>>,
}

impl MockFakeDevices {
    pub fn owning(handles: &[u16]) -> Self {
        let fake = Self::default();
        fake.owned.lock().unwrap().extend_from_slice(handles);
        fake
    }

    pub fn with_peer(self, addr: [u8; 6]) -> Self {
        self.peers.lock().unwrap().push(addr);
        self
    }
}

impl FakeDevices for MockFakeDevices {
    fn owns(&self, handle: VirtualHandle) -> bool {
        self.owned.lock().unwrap().contains(&handle.raw())
    }

    fn handle_command(&self, handle: VirtualHandle, packet: &[u8]) -> bool {
        if self.owns(handle) {
            self.commands.lock().unwrap().push((handle.raw(), packet.to_vec()));
            true
        } else {
            false
        }
    }

    fn accept_connection(&self, addr: &BdAddr, role: Role) -> bool {
        let mut raw = [0; 6];
        raw.copy_from_slice(addr.raw());
        if self.peers.lock().unwrap().contains(&raw) {
            self.accepted.lock().unwrap().push((raw, role));
            true
        } else {
            false
        }
    }

    fn handle_acl_out(&self, handle: VirtualHandle, packet: &[u8]) -> bool {
        if self.owns(handle) {
            self.acl_out.lock().unwrap().push((handle.raw(), packet.to_vec()));
            true
        } else {
            false
        }
    }

    fn on_event_buffer_request(&self, len: usize) {
        self.event_requests.lock().unwrap().push(len);
    }

    fn on_acl_in_buffer_request(&self, len: usize) {
        self.acl_in_requests.lock().unwrap().push(len);
    }
}

/// Records cache flushes and synthesized events.
#[derive(Default)]
pub struct MockPlatform {
    pub flushed: Mutex<Vec<Vec<u8>>>,
    pub events: Mutex<Vec<Vec<u8>>>,
}

impl MockPlatform {
    pub fn flush_count(&self) -> usize {
        self.flushed.lock().unwrap().len()
    }
}

impl Platform for MockPlatform {
    type Error = ();

    fn sync_after_write(&self, data: &[u8]) {
        self.flushed.lock().unwrap().push(data.to_vec());
    }

    fn enqueue_event(&self, packet: &[u8]) -> Result<(), ()> {
        self.events.lock().unwrap().push(packet.to_vec());
        Ok(())
    }
}

pub fn command(opcode: u16, params: &[u8]) -> Vec<u8> {
    let mut packet = opcode.to_le_bytes().to_vec();
    packet.push(params.len() as u8);
    packet.extend_from_slice(params);
    packet
}

pub fn event(code: u8, params: &[u8]) -> Vec<u8> {
    let mut packet = vec![code, params.len() as u8];
    packet.extend_from_slice(params);
    packet
}

pub fn acl(handle: u16, boundary: u8, broadcast: u8, payload: &[u8]) -> Vec<u8> {
    let raw = (handle & 0x0FFF) | ((boundary as u16 & 0b11) << 12) | ((broadcast as u16 & 0b11) << 14);
    let mut packet = raw.to_le_bytes().to_vec();
    packet.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    packet.extend_from_slice(payload);
    packet
}

pub fn connection_complete(status: u8, phys: u16, addr: [u8; 6]) -> Vec<u8> {
    let mut params = vec![status];
    params.extend_from_slice(&phys.to_le_bytes());
    params.extend_from_slice(&addr);
    // ACL link, encryption disabled
    params.extend_from_slice(&[0x01, 0x00]);
    event(0x03, &params)
}

pub fn disconnection_complete(status: u8, phys: u16, reason: u8) -> Vec<u8> {
    let mut params = vec![status];
    params.extend_from_slice(&phys.to_le_bytes());
    params.push(reason);
    event(0x05, &params)
}

pub fn u16_at(packet: &[u8], pos: usize) -> u16 {
    u16::from_le_bytes([packet[pos], packet[pos + 1]])
}
