//! Wire-level record exchanged between senders, routers, and receivers.
//!
//! A [`Packet`] is immutable after construction: once a sender or receiver
//! builds one, nothing downstream mutates it — a link merely holds it for a
//! delay, a router either forwards it untouched or lets it cease to exist
//! (tail-drop), and an endpoint retires it on delivery.

use std::fmt;

/// Fixed payload size of a data segment, in bytes.
pub const MSS: usize = 1024;

/// Per-packet header overhead counted against router buffer budgets and
/// link timing, but never against application throughput.
pub const HEADER_BYTES: usize = 20;

/// Stable index into a [`crate::topology::Topology`]'s endpoint arena.
pub type EndpointId = usize;

/// Packet flag bits. `SYN`/`FIN` are defined for completeness but never set —
/// this simulator models only the data-plus-ACK half of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags(u8);

impl Flags {
    pub const DATA: Flags = Flags(0b0000_0001);
    pub const ACK: Flags = Flags(0b0000_0010);
    pub const SYN: Flags = Flags(0b0000_0100);
    pub const FIN: Flags = Flags(0b0000_1000);

    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Flags {
    type Output = Flags;
    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

/// An immutable packet in flight between two simulation endpoints.
///
/// Data segments occupy the sequence range `[seq, seq + size)`; ACK packets
/// carry no sequence space of their own and instead report `ack_num`, the
/// next byte the receiver expects (cumulative), and `rwnd`, the receiver's
/// advertised window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    /// Endpoint this packet is addressed to.
    pub destination: EndpointId,
    /// Endpoint that originated this packet — used only so a receiver's ACK
    /// can find its way back to the sender that is waiting for it.
    pub source: EndpointId,
    /// Starting sequence number of a data segment; `0` on an ACK.
    pub seq: u64,
    /// Payload size in bytes; `0` on an ACK.
    pub size: usize,
    /// Cumulative next-expected-byte, meaningful only when `flags` has `ACK`.
    pub ack_num: u64,
    /// Advertised receiver window, meaningful only when `flags` has `ACK`.
    pub rwnd: usize,
    pub flags: Flags,
}

impl Packet {
    /// Total size on the wire, including the fixed header.
    pub fn wire_size(&self) -> usize {
        HEADER_BYTES + self.size
    }

    pub fn is_data(&self) -> bool {
        self.flags.contains(Flags::DATA)
    }

    pub fn is_ack(&self) -> bool {
        self.flags.contains(Flags::ACK)
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_data() {
            write!(
                f,
                "DATA seq={} size={} {}->{}",
                self.seq, self.size, self.source, self.destination
            )
        } else {
            write!(
                f,
                "ACK ack={} rwnd={} {}->{}",
                self.ack_num, self.rwnd, self.source, self.destination
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_size_includes_header() {
        let p = Packet {
            destination: 1,
            source: 0,
            seq: 0,
            size: MSS,
            ack_num: 0,
            rwnd: 0,
            flags: Flags::DATA,
        };
        assert_eq!(p.wire_size(), MSS + HEADER_BYTES);
    }

    #[test]
    fn flags_roundtrip() {
        let f = Flags::DATA | Flags::ACK;
        assert!(f.contains(Flags::DATA));
        assert!(f.contains(Flags::ACK));
        assert!(!f.contains(Flags::SYN));
    }
}
