//! Couples one [`Sender`] and one [`Receiver`] behind a single
//! [`EndpointId`], dispatching inbound packets to the half that cares and
//! driving outbound traffic onto the endpoint's first-hop link.

use crate::packet::{EndpointId, Flags, Packet};
use crate::receiver::Receiver;
use crate::sender::{Algorithm, Sender};
use crate::timer::{SenderId, TimerWheel};

/// One side of a connection. A bulk-transfer sender and a (mostly idle, on
/// this side) receiver share an id the way a real host multiplexes both
/// roles over one address; the simulator only ever drives one role per
/// endpoint in a given topology; the other stays present but quiet.
pub struct Endpoint {
    pub id: EndpointId,
    pub sender: Sender,
    pub receiver: Receiver,
}

impl Endpoint {
    pub fn new(id: EndpointId, peer: EndpointId, algorithm: Algorithm, initial_rwnd: usize) -> Self {
        let sender_id: SenderId = id;
        Self {
            id,
            sender: Sender::new(sender_id, id, peer, algorithm, initial_rwnd),
            receiver: Receiver::new(initial_rwnd),
        }
    }

    /// Pace new data and arm/refresh the RTO timer. Called once per external
    /// tick for every endpoint that is a transfer's sender side.
    pub fn tick(&mut self, now: u64, timers: &mut TimerWheel) -> Vec<Packet> {
        self.sender.tick(now, timers)
    }

    /// Dispatch a single inbound packet: data segments go to the receiver
    /// (which does not itself reply — the caller must call `emit_ack` once
    /// per delivered data packet, not once per tick), ACKs go to the sender.
    pub fn on_receive(&mut self, packet: Packet, now: u64, timers: &mut TimerWheel) -> Vec<Packet> {
        if packet.is_ack() {
            self.sender.on_ack(packet.ack_num, packet.rwnd, now, timers)
        } else {
            self.receiver.on_segment(packet.seq, packet.size);
            Vec::new()
        }
    }

    /// Build an ACK reflecting the receiver's current state, addressed back
    /// to the sender on the other end of the connection. Call once per
    /// delivered data segment — one ACK per arrival, not one batched ACK per
    /// tick.
    pub fn emit_ack(&mut self, peer: EndpointId) -> Packet {
        let (ack_num, rwnd, _is_duplicate) = self.receiver.emit_ack();
        Packet {
            destination: peer,
            source: self.id,
            seq: 0,
            size: 0,
            ack_num,
            rwnd,
            flags: Flags::ACK,
        }
    }

    /// RTO fired for this endpoint's sender.
    pub fn on_timeout(&mut self, now: u64, timers: &mut TimerWheel) -> Vec<Packet> {
        self.sender.on_timeout(now, timers)
    }
}
