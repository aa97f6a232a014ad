//! Cumulative-ACK generation with duplicate-ACK emission on out-of-order
//! arrivals.

use std::collections::BTreeSet;

/// Tracks the highest in-order byte received and emits ACKs. The
/// out-of-order set is a `BTreeSet` rather than a `HashSet` on principle,
/// matching the preference for ordered containers seen in
/// `iface::neighbor::Cache` and `iface::route::Routes`, even where
/// iteration order does not currently leak into observable output.
#[derive(Debug)]
pub struct Receiver {
    rcv_nxt: u64,
    window: usize,
    out_of_order: BTreeSet<(u64, u64)>,
    last_acked: u64,
}

impl Receiver {
    pub fn new(window: usize) -> Self {
        Self {
            rcv_nxt: 0,
            window,
            out_of_order: BTreeSet::new(),
            last_acked: 0,
        }
    }

    pub fn rcv_nxt(&self) -> u64 {
        self.rcv_nxt
    }

    fn out_of_order_bytes(&self) -> usize {
        self.out_of_order.iter().map(|(s, e)| (e - s) as usize).sum()
    }

    /// Process an arriving data segment: in-order advances `rcv_nxt` and
    /// drains any now-contiguous out-of-order ranges, ahead-of-order buffers
    /// the gap, and a retransmit of already-delivered data is a no-op.
    pub fn on_segment(&mut self, seq: u64, size: usize) {
        if size == 0 {
            return;
        }
        let end = seq + size as u64;
        if seq == self.rcv_nxt {
            self.rcv_nxt = end;
            loop {
                let next = self.out_of_order.iter().find(|&&(s, _)| s == self.rcv_nxt).copied();
                match next {
                    Some(range) => {
                        self.out_of_order.remove(&range);
                        self.rcv_nxt = range.1;
                    }
                    None => break,
                }
            }
        } else if seq > self.rcv_nxt {
            self.out_of_order.insert((seq, end));
        }
        // seq < rcv_nxt: retransmit of already-delivered data, accepted silently.
    }

    /// Emit a single ACK reflecting current state. Returns
    /// `(ack_num, rwnd, is_duplicate)`; `is_duplicate` iff `rcv_nxt` is
    /// unchanged from the previous ACK emitted.
    pub fn emit_ack(&mut self) -> (u64, usize, bool) {
        let is_duplicate = self.rcv_nxt == self.last_acked;
        let rwnd = self.window.saturating_sub(self.out_of_order_bytes());
        self.last_acked = self.rcv_nxt;
        (self.rcv_nxt, rwnd, is_duplicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_order_arrival_advances_rcv_nxt() {
        let mut r = Receiver::new(65536);
        r.on_segment(0, 1024);
        assert_eq!(r.rcv_nxt(), 1024);
    }

    #[test]
    fn out_of_order_is_buffered_then_drained() {
        let mut r = Receiver::new(65536);
        r.on_segment(1024, 1024); // out of order
        assert_eq!(r.rcv_nxt(), 0);
        r.on_segment(0, 1024); // fills the gap
        assert_eq!(r.rcv_nxt(), 2048);
    }

    #[test]
    fn retransmit_of_delivered_data_is_silently_accepted() {
        let mut r = Receiver::new(65536);
        r.on_segment(0, 1024);
        r.on_segment(0, 1024); // duplicate of already-delivered data
        assert_eq!(r.rcv_nxt(), 1024);
    }

    #[test]
    fn duplicate_ack_detected_when_rcv_nxt_unchanged() {
        let mut r = Receiver::new(65536);
        r.on_segment(0, 1024);
        let (_, _, dup1) = r.emit_ack();
        assert!(!dup1);
        r.on_segment(2048, 1024); // out of order, rcv_nxt unchanged
        let (_, _, dup2) = r.emit_ack();
        assert!(dup2);
    }

    #[test]
    fn rwnd_shrinks_by_out_of_order_bytes() {
        let mut r = Receiver::new(4096);
        r.on_segment(1024, 1024);
        let (_, rwnd, _) = r.emit_ack();
        assert_eq!(rwnd, 4096 - 1024);
    }
}
