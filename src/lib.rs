//! HCI connection handle virtualization.
//!
//! `hci-virt` sits on the HCI link between a Bluetooth host stack and a real controller. It
//! hands out its own ("virtual") connection handles to the host, translates them to and from
//! the handles the controller assigned, and lets emulated ("fake") devices take over the
//! commands and data addressed to connections they own.
//!
//! Every packet crossing the link goes through one of the interceptors on [`HciVirtualizer`],
//! which rewrites it in place and returns a [`Disposition`] telling the transport what to do
//! with it.
#![cfg_attr(not(test), no_std)]

mod fmt;

mod acl;
mod snoop;
mod virtualizer;

pub mod command;
pub mod config;
pub mod driver;
pub mod event;
pub mod handle;
pub mod handle_map;
pub mod packet;

pub use driver::{FakeDevices, NoFakeDevices, Platform, Role};
pub use handle::{HandleAllocator, PhysicalHandle, VirtualHandle, VIRTUAL_HANDLE_SPACE};
pub use handle_map::HandleMap;
pub use snoop::{DeviceClass, INQUIRY_SCAN_ENABLE, PAGE_SCAN_ENABLE};
pub use virtualizer::{Disposition, HciVirtualizer, LinkType};

/// Errors returned by the translation table and packet parsing.
///
/// Broken handle invariants are not reported through this type: they panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The buffer is shorter than its header, or than the length declared in it.
    Truncated,
    /// Every slot of the translation table is in use.
    TableFull,
    /// No mapping for the requested handle.
    NotFound,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Truncated => write!(f, "truncated packet"),
            Error::TableFull => write!(f, "connection table full"),
            Error::NotFound => write!(f, "connection handle not found"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Error::Truncated => {
                defmt::write!(fmt, "Truncated")
            }
            Error::TableFull => {
                defmt::write!(fmt, "TableFull")
            }
            Error::NotFound => {
                defmt::write!(fmt, "NotFound")
            }
        }
    }
}
