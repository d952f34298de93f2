use std::net::IpAddr;
use std::time::Duration;

use crate::transport::EchoReply;

/// Final statistics of a probe session
///
/// Created exactly once, when the transport reports completion. All round-trip times are zero if
/// no reply was received.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub addr: IpAddr,
    pub packets_sent: u64,
    pub packets_received: u64,
    pub packet_loss: f64,
    pub min_rtt: Duration,
    pub avg_rtt: Duration,
    pub max_rtt: Duration,
    pub stddev_rtt: Duration,
}

/// Accumulates round-trip times over the whole session
///
/// Only replies accepted by the session are recorded, duplicates never make it in here. The
/// summary is derived in `finish`, which consumes the aggregator.
#[derive(Debug, Default)]
pub struct Statistics {
    samples: Vec<Duration>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the round-trip time of an accepted reply
    pub fn record(&mut self, reply: &EchoReply) {
        self.samples.push(reply.rtt);
    }

    /// Number of replies recorded so far
    pub fn received(&self) -> u64 {
        self.samples.len() as u64
    }

    /// Derive the session summary
    ///
    /// Loss is reported in percent of the packets sent and is zero if nothing was sent. The
    /// standard deviation is the population standard deviation, i.e. the sum of squared
    /// deviations is divided by `n`, not `n - 1`.
    pub fn finish(self, addr: IpAddr, packets_sent: u64) -> SessionSummary {
        let packets_received = self.received();

        let packet_loss = if packets_sent == 0 {
            0f64
        } else {
            packets_sent.saturating_sub(packets_received) as f64 * 100f64 / packets_sent as f64
        };

        let (min_rtt, avg_rtt, max_rtt, stddev_rtt) = match self.samples.len() {
            0 => (Duration::ZERO, Duration::ZERO, Duration::ZERO, Duration::ZERO),
            n => {
                let min = self.samples.iter().min().copied().unwrap_or_default();
                let max = self.samples.iter().max().copied().unwrap_or_default();
                let total: Duration = self.samples.iter().sum();
                let avg = total / n as u32;

                let mean = total.as_secs_f64() / n as f64;
                let variance = self
                    .samples
                    .iter()
                    .map(|rtt| (rtt.as_secs_f64() - mean).powi(2))
                    .sum::<f64>()
                    / n as f64;

                (min, avg, max, Duration::from_secs_f64(variance.sqrt()))
            }
        };

        SessionSummary {
            addr,
            packets_sent,
            packets_received,
            packet_loss,
            min_rtt,
            avg_rtt,
            max_rtt,
            stddev_rtt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use test_case::test_case;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn reply(seq: u16, millis: u64) -> EchoReply {
        EchoReply {
            sequence: seq,
            bytes: 64,
            rtt: Duration::from_millis(millis),
            source: LOCALHOST,
            ttl: None,
            duplicate: false,
        }
    }

    fn with_replies(received: u16) -> Statistics {
        let mut stats = Statistics::new();
        for seq in 0..received {
            stats.record(&reply(seq, 1));
        }
        stats
    }

    #[test_case(10, 7, 30.0; "three of ten lost")]
    #[test_case(5, 4, 20.0; "one of five lost")]
    #[test_case(4, 4, 0.0; "nothing lost")]
    #[test_case(3, 0, 100.0; "everything lost")]
    #[test_case(0, 0, 0.0; "nothing sent")]
    fn packet_loss(sent: u64, received: u16, expected: f64) {
        let summary = with_replies(received).finish(LOCALHOST, sent);
        assert_eq!(summary.packets_sent, sent);
        assert_eq!(summary.packets_received, u64::from(received));
        assert!((summary.packet_loss - expected).abs() < 1e-9);
    }

    #[test]
    fn round_trip_distribution() {
        let mut stats = Statistics::new();
        stats.record(&reply(0, 10));
        stats.record(&reply(1, 20));
        stats.record(&reply(2, 30));

        let summary = stats.finish(LOCALHOST, 3);
        assert_eq!(summary.min_rtt, Duration::from_millis(10));
        assert_eq!(summary.avg_rtt, Duration::from_millis(20));
        assert_eq!(summary.max_rtt, Duration::from_millis(30));

        // Population standard deviation: sqrt(200 / 3) ms
        let stddev = summary.stddev_rtt.as_secs_f64() * 1000f64;
        assert!((stddev - 8.165).abs() < 1e-3, "stddev was {}", stddev);
    }

    #[test]
    fn empty_session_reports_zero_durations() {
        let summary = Statistics::new().finish(LOCALHOST, 2);
        assert_eq!(summary.packets_received, 0);
        assert_eq!(summary.min_rtt, Duration::ZERO);
        assert_eq!(summary.avg_rtt, Duration::ZERO);
        assert_eq!(summary.max_rtt, Duration::ZERO);
        assert_eq!(summary.stddev_rtt, Duration::ZERO);
        assert!((summary.packet_loss - 100.0).abs() < 1e-9);
    }

    #[test]
    fn more_replies_than_requests_do_not_underflow() {
        let summary = with_replies(3).finish(LOCALHOST, 2);
        assert_eq!(summary.packet_loss, 0.0);
    }
}
