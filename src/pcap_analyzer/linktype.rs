//! Link-layer USB 2.0 capture link types

use pcap_parser::Linktype;
use usbll_engine::Speed;

/// USB 2.0 packets, speed not recorded
pub const USB_2_0: i32 = 288;
pub const USB_2_0_LOW_SPEED: i32 = 293;
pub const USB_2_0_FULL_SPEED: i32 = 294;
pub const USB_2_0_HIGH_SPEED: i32 = 295;

/// What a link type says about the packets of an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSpeed {
    /// Link-layer USB with a known (or unknown) bus speed
    Usb(Option<Speed>),
    /// Anything else; packets are skipped
    Unsupported(i32),
}

pub fn link_speed(linktype: Linktype) -> LinkSpeed {
    match linktype.0 {
        USB_2_0 => LinkSpeed::Usb(None),
        USB_2_0_LOW_SPEED => LinkSpeed::Usb(Some(Speed::Low)),
        USB_2_0_FULL_SPEED => LinkSpeed::Usb(Some(Speed::Full)),
        USB_2_0_HIGH_SPEED => LinkSpeed::Usb(Some(Speed::High)),
        other => LinkSpeed::Unsupported(other),
    }
}
