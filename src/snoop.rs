//! Controller configuration snooped from host commands.

/// Scan enable bit for inquiry scan.
pub const INQUIRY_SCAN_ENABLE: u8 = 0x01;
/// Scan enable bit for page scan.
pub const PAGE_SCAN_ENABLE: u8 = 0x02;

/// Class of device, as written by the host (little endian, 3 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceClass(pub [u8; 3]);

impl DeviceClass {
    pub const fn raw(&self) -> [u8; 3] {
        self.0
    }
}

/// The part of the controller configuration the host has written which we need to remember.
#[derive(Debug, Default)]
pub(crate) struct Snoop {
    scan_enable: u8,
    device_class: DeviceClass,
}

impl Snoop {
    pub(crate) const fn new() -> Self {
        Self {
            scan_enable: 0,
            device_class: DeviceClass([0; 3]),
        }
    }

    pub(crate) fn set_scan_enable(&mut self, scan_enable: u8) {
        self.scan_enable = scan_enable;
    }

    pub(crate) fn scan_enable(&self) -> u8 {
        self.scan_enable
    }

    /// Without page scan the controller does not see incoming connection requests.
    pub(crate) fn page_scan_enabled(&self) -> bool {
        self.scan_enable & PAGE_SCAN_ENABLE != 0
    }

    pub(crate) fn set_device_class(&mut self, class: DeviceClass) {
        self.device_class = class;
    }

    pub(crate) fn device_class(&self) -> DeviceClass {
        self.device_class
    }
}
