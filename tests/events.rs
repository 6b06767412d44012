use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use hci_virt::event::codes;
use hci_virt::{Disposition, Error, HciVirtualizer, NoFakeDevices, PhysicalHandle, VirtualHandle};

mod common;
use common::*;

type Virtualizer = HciVirtualizer<NoopRawMutex, NoFakeDevices, MockPlatform>;

const PEER: [u8; 6] = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66];

fn virtualizer() -> Virtualizer {
    init_logger();
    HciVirtualizer::new(NoFakeDevices, MockPlatform::default())
}

fn connect(virt: &Virtualizer, phys: u16) -> u16 {
    let mut packet = connection_complete(0x00, phys, PEER);
    assert_eq!(virt.on_event_from_controller(&mut packet), Ok(Disposition::Rewritten));
    u16_at(&packet, 3)
}

fn vh(raw: u16) -> VirtualHandle {
    VirtualHandle::new(raw).unwrap()
}

#[test]
fn connection_complete_creates_mapping() {
    let virt = virtualizer();
    let mut packet = connection_complete(0x00, 0x0005, PEER);

    let disposition = virt.on_event_from_controller(&mut packet).unwrap();
    assert!(disposition.is_modified());
    assert!(disposition.forward_to_controller());

    // First handle of a fresh allocator.
    assert_eq!(u16_at(&packet, 3), 0x0000);
    assert_eq!(virt.connections(), 1);
    assert_eq!(virt.lookup_virtual(PhysicalHandle::new(0x0005)), Some(vh(0x0000)));
    assert_eq!(virt.lookup_physical(vh(0x0000)), Some(PhysicalHandle::new(0x0005)));

    // The rest of the event is untouched and the whole event is flushed.
    assert_eq!(&packet[5..11], &PEER);
    let flushed = virt.platform().flushed.lock().unwrap();
    assert_eq!(flushed.len(), 1);
    assert_eq!(flushed[0], packet);
}

#[test]
fn disconnection_complete_removes_mapping() {
    let virt = virtualizer();
    let v = connect(&virt, 0x0005);

    let mut packet = disconnection_complete(0x00, 0x0005, 0x13);
    assert_eq!(virt.on_event_from_controller(&mut packet), Ok(Disposition::Rewritten));
    assert_eq!(u16_at(&packet, 3), v);
    assert_eq!(packet[5], 0x13);

    assert_eq!(virt.connections(), 0);
    assert_eq!(virt.lookup_virtual(PhysicalHandle::new(0x0005)), None);
    assert_eq!(virt.lookup_physical(vh(v)), None);
}

#[test]
fn failed_connection_is_not_mapped() {
    let virt = virtualizer();
    // Page timeout
    let mut packet = connection_complete(0x04, 0x0005, PEER);
    let original = packet.clone();

    assert_eq!(virt.on_event_from_controller(&mut packet), Ok(Disposition::Forward));
    assert_eq!(packet, original);
    assert_eq!(virt.connections(), 0);
    assert_eq!(virt.platform().flush_count(), 0);

    // The allocator is only advanced by successful connections.
    assert_eq!(connect(&virt, 0x0006), 0x0000);
}

#[test]
fn failed_disconnection_keeps_mapping() {
    let virt = virtualizer();
    let v = connect(&virt, 0x0005);

    let mut packet = disconnection_complete(0x0C, 0x0005, 0x13);
    let original = packet.clone();
    assert_eq!(virt.on_event_from_controller(&mut packet), Ok(Disposition::Forward));
    assert_eq!(packet, original);
    assert_eq!(virt.lookup_physical(vh(v)), Some(PhysicalHandle::new(0x0005)));
}

#[test]
fn virtual_handles_are_not_reused_immediately() {
    let virt = virtualizer();
    assert_eq!(connect(&virt, 0x0040), 0x0000);

    let mut packet = disconnection_complete(0x00, 0x0040, 0x16);
    virt.on_event_from_controller(&mut packet).unwrap();

    // The controller may reuse its handle, we issue the next virtual one.
    assert_eq!(connect(&virt, 0x0040), 0x0001);
}

#[test]
fn connection_events_are_translated() {
    let virt = virtualizer();
    connect(&virt, 0x0020);
    let v = connect(&virt, 0x0021);

    // Authentication Complete: status, handle
    let mut packet = event(codes::AUTHENTICATION_COMPLETE, &[0x00, 0x21, 0x00]);
    assert_eq!(virt.on_event_from_controller(&mut packet), Ok(Disposition::Rewritten));
    assert_eq!(u16_at(&packet, 3), v);

    // Flush Occurred: handle only
    let mut packet = event(codes::FLUSH_OCCURRED, &[0x21, 0x00]);
    assert_eq!(virt.on_event_from_controller(&mut packet), Ok(Disposition::Rewritten));
    assert_eq!(u16_at(&packet, 2), v);

    // Mode Change: status, handle, mode, interval
    let mut packet = event(codes::MODE_CHANGE, &[0x00, 0x21, 0x00, 0x02, 0x20, 0x00]);
    assert_eq!(virt.on_event_from_controller(&mut packet), Ok(Disposition::Rewritten));
    assert_eq!(u16_at(&packet, 3), v);
    assert_eq!(&packet[5..], &[0x02, 0x20, 0x00]);

    assert_eq!(virt.platform().flush_count(), 2 + 3);
}

#[test]
fn unknown_events_pass_through() {
    let virt = virtualizer();
    // Inquiry Complete
    let mut packet = event(0x01, &[0x00]);
    assert_eq!(virt.on_event_from_controller(&mut packet), Ok(Disposition::Forward));
    // LE Meta
    let mut packet = event(0x3E, &[0x01, 0x00, 0x40, 0x00]);
    let original = packet.clone();
    assert_eq!(virt.on_event_from_controller(&mut packet), Ok(Disposition::Forward));
    assert_eq!(packet, original);
    assert_eq!(virt.platform().flush_count(), 0);
}

#[test]
fn completed_packets_are_translated() {
    let virt = virtualizer();
    let a = connect(&virt, 0x0030);
    let b = connect(&virt, 0x0031);

    let mut packet = event(
        codes::NUMBER_OF_COMPLETED_PACKETS,
        &[0x02, 0x31, 0x00, 0x05, 0x00, 0x30, 0x00, 0x01, 0x00],
    );
    assert_eq!(virt.on_event_from_controller(&mut packet), Ok(Disposition::Rewritten));
    assert_eq!(u16_at(&packet, 3), b);
    assert_eq!(u16_at(&packet, 5), 5);
    assert_eq!(u16_at(&packet, 7), a);
    assert_eq!(u16_at(&packet, 9), 1);
}

#[test]
fn short_completed_packets_list_is_left_untouched() {
    let virt = virtualizer();
    connect(&virt, 0x0030);
    let flushes = virt.platform().flush_count();

    // Declares two entries, carries one.
    let mut packet = event(codes::NUMBER_OF_COMPLETED_PACKETS, &[0x02, 0x30, 0x00, 0x01, 0x00]);
    let original = packet.clone();
    assert_eq!(virt.on_event_from_controller(&mut packet), Err(Error::Truncated));
    assert_eq!(packet, original);
    assert_eq!(virt.platform().flush_count(), flushes);
}

#[test]
#[should_panic]
fn completed_packets_for_unknown_connection_panics() {
    let virt = virtualizer();
    connect(&virt, 0x0030);
    let mut packet = event(
        codes::NUMBER_OF_COMPLETED_PACKETS,
        &[0x02, 0x30, 0x00, 0x01, 0x00, 0x44, 0x00, 0x01, 0x00],
    );
    let _ = virt.on_event_from_controller(&mut packet);
}

#[test]
#[should_panic]
fn successful_command_complete_for_unknown_connection_panics() {
    let virt = virtualizer();
    // Read RSSI: packets, opcode, status, handle, rssi
    let mut packet = event(codes::COMMAND_COMPLETE, &[0x01, 0x05, 0x14, 0x00, 0x99, 0x00, 0xF0]);
    let _ = virt.on_event_from_controller(&mut packet);
}

#[test]
fn failed_command_complete_for_known_connection_is_translated() {
    let virt = virtualizer();
    let v = connect(&virt, 0x0051);

    // Read Link Quality failing with an unsupported feature error.
    let mut packet = event(codes::COMMAND_COMPLETE, &[0x01, 0x03, 0x14, 0x11, 0x51, 0x00, 0x00]);
    assert_eq!(virt.on_event_from_controller(&mut packet), Ok(Disposition::Rewritten));
    assert_eq!(packet[5], 0x11);
    assert_eq!(u16_at(&packet, 6), v);
    assert_eq!(virt.platform().flushed.lock().unwrap().last().unwrap(), &packet);
}

#[test]
fn command_complete_handles_are_translated() {
    let virt = virtualizer();
    connect(&virt, 0x0050);
    let v = connect(&virt, 0x0051);

    // Read RSSI: packets, opcode, status, handle, rssi
    let mut packet = event(codes::COMMAND_COMPLETE, &[0x01, 0x05, 0x14, 0x00, 0x51, 0x00, 0xF0]);
    assert_eq!(virt.on_event_from_controller(&mut packet), Ok(Disposition::Rewritten));
    assert_eq!(u16_at(&packet, 6), v);
    assert_eq!(packet[8], 0xF0);

    // Failed Read RSSI for a handle the controller does not know stays as is.
    let mut packet = event(codes::COMMAND_COMPLETE, &[0x01, 0x05, 0x14, 0x02, 0x99, 0x00, 0x00]);
    let original = packet.clone();
    assert_eq!(virt.on_event_from_controller(&mut packet), Ok(Disposition::Forward));
    assert_eq!(packet, original);

    // Write Scan Enable completes without a handle.
    let mut packet = event(codes::COMMAND_COMPLETE, &[0x01, 0x1A, 0x0C, 0x00]);
    assert_eq!(virt.on_event_from_controller(&mut packet), Ok(Disposition::Forward));
}

#[test]
fn truncated_event_is_rejected() {
    let virt = virtualizer();
    let mut packet = vec![codes::CONNECTION_COMPLETE, 11, 0x00, 0x05];
    assert_eq!(virt.on_event_from_controller(&mut packet), Err(Error::Truncated));
    assert_eq!(virt.connections(), 0);
}

#[test]
#[should_panic]
fn event_for_unknown_connection_panics() {
    let virt = virtualizer();
    let mut packet = event(codes::ENCRYPTION_CHANGE, &[0x00, 0x07, 0x00, 0x01]);
    let _ = virt.on_event_from_controller(&mut packet);
}

#[test]
#[should_panic]
fn disconnection_of_unknown_connection_panics() {
    let virt = virtualizer();
    let mut packet = disconnection_complete(0x00, 0x0007, 0x13);
    let _ = virt.on_event_from_controller(&mut packet);
}

#[test]
#[should_panic]
fn connection_table_overflow_panics() {
    let virt = virtualizer();
    for i in 0..hci_virt::config::MAX_CONNECTIONS as u16 {
        connect(&virt, 0x0100 + i);
    }
    let mut packet = connection_complete(0x00, 0x0200, PEER);
    let _ = virt.on_event_from_controller(&mut packet);
}

#[test]
#[should_panic]
fn synchronous_connection_on_new_handle_panics() {
    let virt = virtualizer();
    connect(&virt, 0x0010);
    // Status, handle, address, link type (eSCO), then timing and air mode fields.
    let mut params = vec![0x00, 0x0B, 0x00];
    params.extend_from_slice(&PEER);
    params.extend_from_slice(&[0x02, 0x06, 0x02, 0x3C, 0x00, 0x3C, 0x00, 0x02]);
    let mut packet = event(codes::SYNCHRONOUS_CONNECTION_COMPLETE, &params);
    let _ = virt.on_event_from_controller(&mut packet);
}
