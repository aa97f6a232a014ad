//! Congestion-control core: segmentation, cwnd/ssthresh/effective-window
//! pacing, RTO estimation, the retransmit buffer, and the Tahoe/Reno/NewReno
//! state machine. This is the largest module in the crate.
//!
//! Modeled as a single type tagged by [`Algorithm`] and dispatched on in the
//! duplicate-ACK and new-ACK handlers, rather than a trait object per
//! algorithm — `congestion::AnyController` takes the same enum-dispatch shape
//! instead of a `Box<dyn CongestionController>` hierarchy.

use crate::packet::{EndpointId, Flags, Packet, MSS};
use crate::timer::{SenderId, TimerKind, TimerWheel};

/// Initial slow-start threshold: large enough to not gate early growth.
pub const INITIAL_SSTHRESH: f64 = 65536.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Tahoe,
    Reno,
    NewReno,
}

impl std::str::FromStr for Algorithm {
    type Err = crate::error::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tahoe" => Ok(Algorithm::Tahoe),
            "reno" => Ok(Algorithm::Reno),
            "newreno" => Ok(Algorithm::NewReno),
            _ => Err(crate::error::ConfigError::UnknownAlgorithm(s.to_string())),
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Algorithm::Tahoe => "Tahoe",
            Algorithm::Reno => "Reno",
            Algorithm::NewReno => "NewReno",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    SlowStart,
    CongestionAvoidance,
    FastRecovery,
}

/// Smoothed RTT / RTO estimator, a direct port of `socket::tcp::RttEstimator`
/// — same field names, same smoothing constants — generalized from
/// wall-clock `Instant`/`Duration` to integer tick counts, since the
/// simulator has no wall-clock time at all.
#[derive(Debug, Clone, Copy)]
struct RttEstimator {
    have_measurement: bool,
    srtt: f64,
    rttvar: f64,
    rto: f64,
}

impl RttEstimator {
    const MIN_RTO: f64 = 1.0;
    const MAX_RTO: f64 = 60.0;
    /// No measurement yet: a conservative initial RTO in ticks.
    const INITIAL_RTO: f64 = 3.0;

    fn new() -> Self {
        Self {
            have_measurement: false,
            srtt: 0.0,
            rttvar: 0.0,
            rto: Self::INITIAL_RTO,
        }
    }

    /// Standard smoothing. Karn's rule — never call this for a
    /// retransmitted segment — is enforced by the caller.
    fn sample(&mut self, r: f64) {
        if !self.have_measurement {
            self.srtt = r;
            self.rttvar = r / 2.0;
            self.have_measurement = true;
        } else {
            self.rttvar = 0.75 * self.rttvar + 0.25 * (self.srtt - r).abs();
            self.srtt = 0.875 * self.srtt + 0.125 * r;
        }
        self.rto = (self.srtt + 4.0 * self.rttvar).clamp(Self::MIN_RTO, Self::MAX_RTO);
    }

    /// Exponential backoff on timeout, capped at `MAX_RTO`.
    fn backoff(&mut self) {
        self.rto = (self.rto * 2.0).min(Self::MAX_RTO);
    }
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    seq: u64,
    size: usize,
    sent_at: u64,
    retransmitted: bool,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SenderStats {
    pub bytes_transmitted: u64,
    pub bytes_retransmitted: u64,
    pub timeouts: u64,
}

/// Per-connection sender state. Models an unbounded bulk
/// transfer: the simulator studies throughput over a fixed number of ticks,
/// not the draining of a finite buffer, so "data remains" is always true
/// and pacing is limited only by `effective_window`.
#[derive(Debug)]
pub struct Sender {
    id: SenderId,
    self_endpoint: EndpointId,
    peer: EndpointId,
    algorithm: Algorithm,
    mode: Mode,
    cwnd: f64,
    ssthresh: f64,
    flight_size: usize,
    rwnd: usize,
    snd_una: u64,
    snd_nxt: u64,
    snd_max: u64,
    recover: u64,
    dup_ack_count: u32,
    retransmit_buffer: std::collections::VecDeque<Segment>,
    rtte: RttEstimator,
    timer_armed: bool,
    pub stats: SenderStats,
}

impl Sender {
    pub fn new(id: SenderId, self_endpoint: EndpointId, peer: EndpointId, algorithm: Algorithm, initial_rwnd: usize) -> Self {
        Self {
            id,
            self_endpoint,
            peer,
            algorithm,
            mode: Mode::SlowStart,
            cwnd: MSS as f64,
            ssthresh: INITIAL_SSTHRESH,
            flight_size: 0,
            rwnd: initial_rwnd,
            snd_una: 0,
            snd_nxt: 0,
            snd_max: 0,
            recover: 0,
            dup_ack_count: 0,
            retransmit_buffer: std::collections::VecDeque::new(),
            rtte: RttEstimator::new(),
            timer_armed: false,
            stats: SenderStats::default(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn cwnd(&self) -> f64 {
        self.cwnd
    }

    pub fn ssthresh(&self) -> f64 {
        self.ssthresh
    }

    pub fn flight_size(&self) -> usize {
        self.flight_size
    }

    fn effective_window(&self) -> f64 {
        self.cwnd.min(self.rwnd as f64) - self.flight_size as f64
    }

    fn make_data_packet(&self, seq: u64, size: usize) -> Packet {
        Packet {
            destination: self.peer,
            source: self.self_endpoint,
            seq,
            size,
            ack_num: 0,
            rwnd: 0,
            flags: Flags::DATA,
        }
    }

    /// Pace new segments onto the wire while the effective window allows,
    /// and arm the RTO timer if data is outstanding and none is running.
    pub fn tick(&mut self, now: u64, timers: &mut TimerWheel) -> Vec<Packet> {
        let mut out = Vec::new();
        while self.effective_window() >= MSS as f64 {
            let seq = self.snd_nxt;
            self.retransmit_buffer.push_back(Segment {
                seq,
                size: MSS,
                sent_at: now,
                retransmitted: false,
            });
            self.flight_size += MSS;
            self.snd_nxt += MSS as u64;
            self.snd_max = self.snd_max.max(self.snd_nxt);
            self.stats.bytes_transmitted += MSS as u64;
            out.push(self.make_data_packet(seq, MSS));
        }
        if !self.retransmit_buffer.is_empty() && !self.timer_armed {
            self.arm_rto(now, timers);
        }
        out
    }

    fn arm_rto(&mut self, now: u64, timers: &mut TimerWheel) {
        let fire_at = now + self.rtte.rto.ceil() as u64;
        timers
            .arm(self.id, TimerKind::Rto, fire_at)
            .expect("RTO timer double-armed: scheduler invariant violated");
        self.timer_armed = true;
    }

    fn cancel_rto(&mut self, timers: &mut TimerWheel) {
        if self.timer_armed {
            timers
                .cancel(self.id, TimerKind::Rto)
                .expect("RTO timer not armed: scheduler invariant violated");
            self.timer_armed = false;
        }
    }

    fn restart_rto(&mut self, now: u64, timers: &mut TimerWheel) {
        self.cancel_rto(timers);
        if !self.retransmit_buffer.is_empty() {
            self.arm_rto(now, timers);
        }
    }

    fn retransmit_front(&mut self, now: u64) -> Option<Packet> {
        let seq = self.retransmit_buffer.front()?.seq;
        let size = self.retransmit_buffer.front()?.size;
        if let Some(seg) = self.retransmit_buffer.iter_mut().find(|s| s.seq == seq) {
            seg.retransmitted = true;
        }
        self.stats.bytes_transmitted += size as u64;
        self.stats.bytes_retransmitted += size as u64;
        let _ = now;
        Some(self.make_data_packet(seq, size))
    }

    fn flush_acked(&mut self, ack_num: u64) {
        while let Some(front) = self.retransmit_buffer.front() {
            if front.seq + front.size as u64 <= ack_num {
                self.retransmit_buffer.pop_front();
            } else {
                break;
            }
        }
    }

    /// Handle an inbound ACK: new-ACK growth, duplicate-ACK recovery
    /// dispatched on `self.algorithm`, and RTT sampling. Returns any packets
    /// the response produces (retransmissions, or newly paced segments).
    pub fn on_ack(&mut self, ack_num: u64, rwnd: usize, now: u64, timers: &mut TimerWheel) -> Vec<Packet> {
        self.rwnd = rwnd;
        let mut out = Vec::new();

        let is_duplicate = ack_num == self.snd_una;
        if is_duplicate {
            self.on_duplicate_ack(now, timers, &mut out);
            return out;
        }
        if ack_num < self.snd_una {
            return out;
        }

        let acked_bytes = (ack_num - self.snd_una) as usize;
        let sample = self.retransmit_buffer.front().and_then(|seg| {
            if !seg.retransmitted {
                Some((now.saturating_sub(seg.sent_at)) as f64)
            } else {
                None
            }
        });

        let in_fast_recovery = self.mode == Mode::FastRecovery;
        let newreno_partial = self.algorithm == Algorithm::NewReno && in_fast_recovery && ack_num < self.recover;

        self.snd_una = ack_num;
        self.flush_acked(ack_num);
        self.flight_size = self.flight_size.saturating_sub(acked_bytes);
        self.dup_ack_count = 0;

        if let Some(r) = sample {
            self.rtte.sample(r);
        }

        if newreno_partial {
            if let Some(p) = self.retransmit_front(now) {
                out.push(p);
            }
            self.cwnd = (self.cwnd - acked_bytes as f64).max(MSS as f64);
            // remains in FastRecovery
        } else if in_fast_recovery {
            // Reno: first new ACK after fast recovery. NewReno: full ACK (ack_num >= recover).
            self.cwnd = self.ssthresh;
            self.mode = Mode::CongestionAvoidance;
        } else {
            match self.mode {
                Mode::SlowStart => {
                    self.cwnd += MSS as f64;
                    if self.cwnd >= self.ssthresh {
                        self.mode = Mode::CongestionAvoidance;
                    }
                }
                Mode::CongestionAvoidance => {
                    self.cwnd += (MSS * MSS) as f64 / self.cwnd;
                }
                Mode::FastRecovery => unreachable!("handled above"),
            }
        }

        self.restart_rto(now, timers);
        out.extend(self.tick(now, timers));
        out
    }

    fn on_duplicate_ack(&mut self, now: u64, timers: &mut TimerWheel, out: &mut Vec<Packet>) {
        match self.mode {
            Mode::FastRecovery => {
                // Both Reno and NewReno inflate cwnd by one MSS per
                // additional duplicate while in fast recovery, permitting
                // one more segment if the window allows. Tahoe never
                // reaches this arm — its 3rd-dup-ACK handler goes straight
                // to SlowStart.
                if self.algorithm == Algorithm::Reno || self.algorithm == Algorithm::NewReno {
                    self.cwnd += MSS as f64;
                    out.extend(self.tick(now, timers));
                }
            }
            Mode::SlowStart | Mode::CongestionAvoidance => {
                self.dup_ack_count += 1;
                if self.dup_ack_count == 3 {
                    self.dup_ack_count = 0;
                    match self.algorithm {
                        Algorithm::Tahoe => {
                            self.ssthresh = (self.flight_size as f64 / 2.0).max(2.0 * MSS as f64);
                            self.cwnd = MSS as f64;
                            if let Some(p) = self.retransmit_front(now) {
                                out.push(p);
                            }
                            self.mode = Mode::SlowStart;
                            self.restart_rto(now, timers);
                        }
                        Algorithm::Reno => {
                            self.ssthresh = (self.flight_size as f64 / 2.0).max(2.0 * MSS as f64);
                            if let Some(p) = self.retransmit_front(now) {
                                out.push(p);
                            }
                            self.cwnd = self.ssthresh + 3.0 * MSS as f64;
                            self.mode = Mode::FastRecovery;
                            self.restart_rto(now, timers);
                        }
                        Algorithm::NewReno => {
                            self.recover = self.snd_max;
                            self.ssthresh = (self.flight_size as f64 / 2.0).max(2.0 * MSS as f64);
                            if let Some(p) = self.retransmit_front(now) {
                                out.push(p);
                            }
                            self.cwnd = self.ssthresh + 3.0 * MSS as f64;
                            self.mode = Mode::FastRecovery;
                            self.restart_rto(now, timers);
                        }
                    }
                }
            }
        }
    }

    /// RTO expiry: halve the window, reset to one MSS, back off the RTO,
    /// retransmit the oldest unacknowledged segment, and re-enter slow
    /// start.
    pub fn on_timeout(&mut self, now: u64, timers: &mut TimerWheel) -> Vec<Packet> {
        let mut out = Vec::new();
        self.ssthresh = (self.flight_size as f64 / 2.0).max(2.0 * MSS as f64);
        self.cwnd = MSS as f64;
        self.rtte.backoff();
        if let Some(p) = self.retransmit_front(now) {
            out.push(p);
        }
        self.stats.timeouts += 1;
        self.mode = Mode::SlowStart;
        self.dup_ack_count = 0;
        self.timer_armed = false; // the fired timer was already removed by the wheel
        self.arm_rto(now, timers);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender(algorithm: Algorithm) -> (Sender, TimerWheel) {
        (Sender::new(0, 0, 1, algorithm, 65536), TimerWheel::new())
    }

    #[test]
    fn slow_start_doubles_cwnd_per_rtt_with_no_loss() {
        let (mut s, mut t) = sender(Algorithm::Tahoe);
        let sent = s.tick(0, &mut t);
        assert_eq!(sent.len(), 1); // cwnd = 1 MSS initially
        // Ack all of it: cwnd += MSS -> 2 MSS, triggers 2 new segments next tick.
        let more = s.on_ack(MSS as u64, 65536, 1, &mut t);
        assert_eq!(more.len(), 2);
        assert_eq!(s.cwnd(), 2.0 * MSS as f64);
    }

    #[test]
    fn congestion_avoidance_grows_roughly_one_mss_per_rtt() {
        let (mut s, mut t) = sender(Algorithm::Tahoe);
        s.ssthresh = MSS as f64; // force immediate entry into CA
        s.tick(0, &mut t);
        let before = s.cwnd();
        s.on_ack(MSS as u64, 65536, 1, &mut t);
        assert_eq!(s.mode(), Mode::CongestionAvoidance);
        assert!(s.cwnd() > before);
    }

    #[test]
    fn tahoe_triple_dup_resets_to_one_mss_and_slow_start() {
        let (mut s, mut t) = sender(Algorithm::Tahoe);
        s.cwnd = 8.0 * MSS as f64;
        s.flight_size = 8 * MSS;
        s.snd_una = 0;
        s.snd_nxt = 8 * MSS as u64;
        s.snd_max = 8 * MSS as u64;
        for _ in 0..3 {
            s.on_ack(0, 65536, 5, &mut t);
        }
        assert_eq!(s.cwnd(), MSS as f64);
        assert_eq!(s.ssthresh(), 4.0 * MSS as f64);
        assert_eq!(s.mode(), Mode::SlowStart);
    }

    #[test]
    fn reno_enters_fast_recovery_and_deflates_on_new_ack() {
        let (mut s, mut t) = sender(Algorithm::Reno);
        s.cwnd = 8.0 * MSS as f64;
        s.flight_size = 8 * MSS;
        s.snd_nxt = 8 * MSS as u64;
        s.snd_max = 8 * MSS as u64;
        for _ in 0..3 {
            s.on_ack(0, 65536, 5, &mut t);
        }
        assert_eq!(s.mode(), Mode::FastRecovery);
        assert_eq!(s.cwnd(), s.ssthresh() + 3.0 * MSS as f64);
        // one more duplicate inflates further
        s.on_ack(0, 65536, 5, &mut t);
        assert_eq!(s.cwnd(), s.ssthresh() + 4.0 * MSS as f64);
        // new ack deflates and exits fast recovery
        s.on_ack(MSS as u64, 65536, 6, &mut t);
        assert_eq!(s.mode(), Mode::CongestionAvoidance);
        assert_eq!(s.cwnd(), s.ssthresh());
    }

    #[test]
    fn newreno_partial_ack_stays_in_fast_recovery() {
        let (mut s, mut t) = sender(Algorithm::NewReno);
        s.cwnd = 8.0 * MSS as f64;
        s.flight_size = 8 * MSS;
        s.snd_nxt = 8 * MSS as u64;
        s.snd_max = 8 * MSS as u64;
        for _ in 0..3 {
            s.on_ack(0, 65536, 5, &mut t);
        }
        assert_eq!(s.mode(), Mode::FastRecovery);
        let recover = s.recover;
        assert_eq!(recover, 8 * MSS as u64);
        // partial ack: below recover
        s.on_ack(MSS as u64, 65536, 6, &mut t);
        assert_eq!(s.mode(), Mode::FastRecovery);
        // full ack: reaches recover
        s.on_ack(recover, 65536, 7, &mut t);
        assert_eq!(s.mode(), Mode::CongestionAvoidance);
    }

    #[test]
    fn newreno_dup_ack_inflates_cwnd_during_fast_recovery() {
        let (mut s, mut t) = sender(Algorithm::NewReno);
        s.cwnd = 8.0 * MSS as f64;
        s.flight_size = 8 * MSS;
        s.snd_nxt = 8 * MSS as u64;
        s.snd_max = 8 * MSS as u64;
        for _ in 0..3 {
            s.on_ack(0, 65536, 5, &mut t);
        }
        assert_eq!(s.mode(), Mode::FastRecovery);
        let after_entry = s.cwnd();
        s.on_ack(0, 65536, 5, &mut t);
        assert_eq!(s.cwnd(), after_entry + MSS as f64);
    }

    #[test]
    fn timeout_halves_window_and_resets_cwnd() {
        let (mut s, mut t) = sender(Algorithm::Reno);
        s.tick(0, &mut t);
        s.flight_size = 4 * MSS;
        let out = s.on_timeout(10, &mut t);
        assert_eq!(out.len(), 1);
        assert_eq!(s.cwnd(), MSS as f64);
        assert_eq!(s.ssthresh(), 2.0 * MSS as f64);
        assert_eq!(s.stats.timeouts, 1);
        assert_eq!(s.mode(), Mode::SlowStart);
    }

    #[test]
    fn flight_size_never_exceeds_window_plus_one_segment() {
        let (mut s, mut t) = sender(Algorithm::NewReno);
        for tick in 0..5u64 {
            s.tick(tick, &mut t);
            assert!(s.flight_size() as f64 <= s.cwnd().min(65536.0) + MSS as f64);
        }
    }
}
