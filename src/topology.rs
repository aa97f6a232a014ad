//! Arena construction and the deterministic tick scheduler. `Direct` and
//! `Cloud` are both instances of one generic client/router-chain/server
//! builder — `Direct` is simply `Cloud` with exactly one client/server pair
//! and a slower last-hop link.
//!
//! Endpoint and link identities are stable arena indices, never raw
//! references, so sender and receiver can cross-reference each other
//! without cyclic ownership.

use log::debug;

use crate::endpoint::Endpoint;
use crate::error::SimError;
use crate::link::{Link, Phase};
use crate::packet::EndpointId;
use crate::reporting::Reporting;
use crate::router::{LinkId, Router};
use crate::sender::Algorithm;
use crate::stats::Stats;
use crate::timer::TimerWheel;

const FAST_TX: f64 = 0.001;
const SLOW_TX: f64 = 0.01;
const PROP: f64 = 0.001;

/// A fully wired simulation: endpoints, routers, links, and the scheduler's
/// own clock and timer registry. Owns every entity for the run's lifetime.
pub struct Topology {
    endpoints: Vec<Endpoint>,
    routers: Vec<Router>,
    links: Vec<Link>,
    clients: Vec<EndpointId>,
    servers: Vec<EndpointId>,
    client_links: Vec<LinkId>,
    router_links: Vec<LinkId>,
    server_links: Vec<LinkId>,
    timers: TimerWheel,
    now: u64,
    reporting: Reporting,
}

impl Topology {
    pub fn direct(algorithm: Algorithm, n_routers: usize, buffer_size: usize, rwnd: usize, reporting: Reporting) -> Topology {
        Self::build(algorithm, 1, n_routers, buffer_size, rwnd, true, reporting)
    }

    pub fn cloud(
        algorithm: Algorithm,
        n_clients: usize,
        n_routers: usize,
        buffer_size: usize,
        rwnd: usize,
        reporting: Reporting,
    ) -> Topology {
        Self::build(algorithm, n_clients, n_routers, buffer_size, rwnd, false, reporting)
    }

    fn build(
        algorithm: Algorithm,
        n_clients: usize,
        n_routers: usize,
        buffer_size: usize,
        rwnd: usize,
        bottleneck_last_hop: bool,
        reporting: Reporting,
    ) -> Topology {
        assert!(n_routers >= 1, "topology requires at least one router");
        assert!(n_clients >= 1, "topology requires at least one client");

        let mut endpoints = Vec::new();
        let mut links = Vec::new();
        let mut routers = Vec::new();

        // Endpoint ids: clients first, then paired servers, so index i's
        // client and server are always `i` and `n_clients + i`.
        let clients: Vec<EndpointId> = (0..n_clients).collect();
        let servers: Vec<EndpointId> = (n_clients..2 * n_clients).collect();

        for (client, server) in clients.iter().zip(servers.iter()) {
            endpoints.push(Endpoint::new(*client, *server, algorithm, rwnd));
        }
        for (client, server) in clients.iter().zip(servers.iter()) {
            endpoints.push(Endpoint::new(*server, *client, algorithm, rwnd));
        }

        let mut client_links = Vec::with_capacity(n_clients);
        for _ in 0..n_clients {
            client_links.push(links.len());
            links.push(Link::new(FAST_TX, PROP));
        }

        let mut router_links = Vec::with_capacity(n_routers.saturating_sub(1));
        for _ in 0..n_routers.saturating_sub(1) {
            router_links.push(links.len());
            links.push(Link::new(FAST_TX, PROP));
        }

        let mut server_links = Vec::with_capacity(n_clients);
        let last_hop_tx = if bottleneck_last_hop { SLOW_TX } else { FAST_TX };
        for _ in 0..n_clients {
            server_links.push(links.len());
            links.push(Link::new(last_hop_tx, PROP));
        }

        for i in 0..n_routers {
            routers.push(Router::new(i, buffer_size));
        }

        // Forward (data, toward servers) routes.
        for (i, router) in routers.iter_mut().enumerate() {
            let downstream_is_last = i == n_routers - 1;
            if downstream_is_last {
                for (server, &lid) in servers.iter().zip(server_links.iter()) {
                    router.add_route(*server, lid);
                }
            } else {
                for server in &servers {
                    router.add_route(*server, router_links[i]);
                }
            }
        }
        // Reverse (ACK, toward clients) routes.
        for (i, router) in routers.iter_mut().enumerate() {
            let upstream_is_first = i == 0;
            if upstream_is_first {
                for (client, &lid) in clients.iter().zip(client_links.iter()) {
                    router.add_route(*client, lid);
                }
            } else {
                for client in &clients {
                    router.add_route(*client, router_links[i - 1]);
                }
            }
        }

        Topology {
            endpoints,
            routers,
            links,
            clients,
            servers,
            client_links,
            router_links,
            server_links,
            timers: TimerWheel::new(),
            now: 0,
            reporting,
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    fn drain_timers(&mut self, sender: EndpointId, outputs: &mut Vec<(usize, crate::packet::Packet)>, link: usize) {
        let fired = self.timers.take_expired(sender, self.now);
        for target in fired {
            if self.reporting.contains(Reporting::RTO) {
                debug!(target: "tcpsim::rto", "tick {} sender {} RTO fired", self.now, target.sender);
            }
            let packets = self.endpoints[sender].on_timeout(self.now, &mut self.timers);
            for p in packets {
                outputs.push((link, p));
            }
        }
    }

    /// Run the eight-phase deterministic tick.
    pub fn tick(&mut self) -> Result<(), SimError> {
        self.now += 1;
        let now = self.now;

        // Phase 1: deliver inbound ACKs on each client link.
        let mut ack_deliveries: Vec<(usize, crate::packet::Packet)> = Vec::new();
        for (i, &lid) in self.client_links.iter().enumerate() {
            self.links[lid].process(Phase::Deliver);
            for p in self.links[lid].take_delivered() {
                ack_deliveries.push((i, p));
            }
        }

        // Phase 2: sender endpoints handle arrived ACKs, then pace new data.
        let mut to_offer: Vec<(usize, crate::packet::Packet)> = Vec::new();
        for (i, packet) in ack_deliveries {
            let client_id = self.clients[i];
            let out = self.endpoints[client_id].on_receive(packet, now, &mut self.timers);
            for p in out {
                to_offer.push((i, p));
            }
            self.drain_timers(client_id, &mut to_offer, i);
        }
        for i in 0..self.clients.len() {
            let client_id = self.clients[i];
            let out = self.endpoints[client_id].tick(now, &mut self.timers);
            for p in out {
                to_offer.push((i, p));
            }
            self.drain_timers(client_id, &mut to_offer, i);
        }
        for (i, packet) in to_offer {
            if self.reporting.contains(Reporting::SENDERS) {
                debug!(target: "tcpsim::sender", "tick {now} client {i} -> {packet}");
            }
            self.links[self.client_links[i]].offer(packet);
        }

        // Phase 3: carry new segments onto the client links.
        for &lid in &self.client_links {
            self.links[lid].process(Phase::Transmit);
        }

        // Phase 4: forward traversal sender-side -> receiver-side.
        for i in 0..self.routers.len() {
            let upstream: Vec<LinkId> = if i == 0 {
                self.client_links.clone()
            } else {
                vec![self.router_links[i - 1]]
            };
            for &lid in &upstream {
                self.links[lid].process(Phase::Deliver);
                let delivered = self.links[lid].take_delivered();
                if self.reporting.contains(Reporting::LINKS) && !delivered.is_empty() {
                    debug!(target: "tcpsim::link", "tick {now} link {lid} delivered {} packet(s) to router {i}", delivered.len());
                }
                for p in delivered {
                    self.routers[i].accept(p);
                }
            }
            self.routers[i].process(&mut self.links[..])?;
            if self.reporting.contains(Reporting::ROUTERS) {
                debug!(target: "tcpsim::router", "tick {now} router {i} occupancy={}", self.routers[i].occupancy());
            }
            let downstream: Vec<LinkId> = if i == self.routers.len() - 1 {
                self.server_links.clone()
            } else {
                vec![self.router_links[i]]
            };
            for &lid in &downstream {
                self.links[lid].process(Phase::Transmit);
            }
        }

        // Phase 5: deliver onto the receiver-adjacent links.
        for &lid in &self.server_links {
            self.links[lid].process(Phase::Deliver);
        }

        // Phase 6: receiver endpoints accept data and emit one ACK per
        // delivered segment. Batching every arrival of a tick into a single
        // cumulative ACK would throttle slow-start growth to +MSS per tick
        // regardless of how many segments land, and would collapse a burst
        // of out-of-order arrivals into one duplicate ACK instead of one
        // per arrival, starving the 3-dup-ACK fast-retransmit trigger.
        let mut ack_replies: Vec<(usize, crate::packet::Packet)> = Vec::new();
        for (i, &lid) in self.server_links.iter().enumerate() {
            let server_id = self.servers[i];
            let peer = self.clients[i];
            let delivered = self.links[lid].take_delivered();
            for packet in delivered {
                if self.reporting.contains(Reporting::RECEIVERS) {
                    debug!(target: "tcpsim::receiver", "tick {now} server {i} <- {packet}");
                }
                self.endpoints[server_id].on_receive(packet, now, &mut self.timers);
                let ack = self.endpoints[server_id].emit_ack(peer);
                ack_replies.push((i, ack));
            }
        }
        for (i, ack) in ack_replies {
            self.links[self.server_links[i]].offer(ack);
        }

        // Phase 7: carry ACKs onto the server-adjacent links.
        for &lid in &self.server_links {
            self.links[lid].process(Phase::Transmit);
        }

        // Phase 8: reverse traversal receiver-side -> sender-side.
        for i in (0..self.routers.len()).rev() {
            let upstream: Vec<LinkId> = if i == self.routers.len() - 1 {
                self.server_links.clone()
            } else {
                vec![self.router_links[i]]
            };
            for &lid in &upstream {
                self.links[lid].process(Phase::Deliver);
                for p in self.links[lid].take_delivered() {
                    self.routers[i].accept(p);
                }
            }
            self.routers[i].process(&mut self.links)?;
            let downstream: Vec<LinkId> = if i == 0 {
                self.client_links.clone()
            } else {
                vec![self.router_links[i - 1]]
            };
            for &lid in &downstream {
                self.links[lid].process(Phase::Transmit);
            }
        }

        if self.reporting.contains(Reporting::SIMULATOR) {
            debug!(target: "tcpsim::simulator", "tick {now} complete");
        }

        Ok(())
    }

    pub fn run(&mut self, iterations: u64) -> Result<(), SimError> {
        for _ in 0..iterations {
            self.tick()?;
        }
        Ok(())
    }

    /// Aggregate statistics across every client's sender.
    pub fn stats(&self) -> Stats {
        let mut total = Stats::default();
        for &client in &self.clients {
            total.add(&self.endpoints[client].sender.stats);
        }
        total
    }

    /// Per-client statistics, in client index order; summing across clients
    /// reproduces the aggregate totals from [`Topology::stats`].
    pub fn per_client_stats(&self) -> Vec<Stats> {
        self.clients
            .iter()
            .map(|&id| {
                let mut s = Stats::default();
                s.add(&self.endpoints[id].sender.stats);
                s
            })
            .collect()
    }

    pub fn n_senders(&self) -> usize {
        self.clients.len()
    }

    pub fn n_routers(&self) -> usize {
        self.routers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::Reporting;

    #[test]
    fn direct_topology_has_one_client_and_server() {
        let topo = Topology::direct(Algorithm::Tahoe, 1, crate::router::default_buffer_size(), 65536, Reporting::NONE);
        assert_eq!(topo.n_senders(), 1);
        assert_eq!(topo.n_routers(), 1);
    }

    #[test]
    fn direct_topology_runs_without_sim_error() {
        let mut topo = Topology::direct(Algorithm::Tahoe, 1, 65536, 65536, Reporting::NONE);
        topo.run(20).unwrap();
        assert!(topo.stats().bytes_transmitted > 0);
    }

    #[test]
    fn cloud_topology_wires_n_clients() {
        let topo = Topology::cloud(Algorithm::Reno, 4, 1, 6 * crate::packet::MSS, 65536, Reporting::NONE);
        assert_eq!(topo.n_senders(), 4);
    }

    #[test]
    fn cloud_topology_runs_and_each_client_makes_progress() {
        let mut topo = Topology::cloud(Algorithm::Reno, 4, 1, 6 * crate::packet::MSS, 65536, Reporting::NONE);
        topo.run(50).unwrap();
        for s in topo.per_client_stats() {
            assert!(s.bytes_transmitted > 0);
        }
    }

    #[test]
    fn multi_router_chain_runs_without_error() {
        let mut topo = Topology::direct(Algorithm::NewReno, 10, 65536, 65536, Reporting::NONE);
        topo.run(20).unwrap();
    }

    #[test]
    fn small_buffer_forces_retransmissions() {
        let mut topo = Topology::direct(Algorithm::Reno, 1, 4 * crate::packet::MSS, 65536, Reporting::NONE);
        topo.run(30).unwrap();
        let stats = topo.stats();
        assert!(stats.bytes_transmitted > 0);
    }
}
