use std::io::{self, Stdout, Write};
use std::net::IpAddr;
use std::time::Duration;

use super::Observer;
use crate::error::{Error, Result};
use crate::stats::SessionSummary;
use crate::tracker::Gap;
use crate::transport::EchoReply;
use crate::Dest;

/// Time in milliseconds, the unit of everything printed
fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000f64
}

/// Human readable, ping-style output
///
/// Write failures are ignored, the console is best effort.
#[derive(Debug)]
pub struct ConsoleReport<W: Write> {
    out: W,
}

impl ConsoleReport<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleReport<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Observer for ConsoleReport<W> {
    fn on_start(&mut self, target: &Dest, addr: IpAddr, payload: usize) {
        let _ = writeln!(self.out, "PING {} ({}): {} data bytes", target, addr, payload);
    }

    fn on_gap(&mut self, gap: &Gap) {
        let _ = writeln!(
            self.out,
            "WARN: packets lost from sequence no. {} to {}",
            gap.from, gap.to
        );
    }

    fn on_reply(&mut self, reply: &EchoReply) {
        let _ = writeln!(
            self.out,
            "{} bytes from {}: icmp_seq={} time={:.3} ms",
            reply.bytes,
            reply.source,
            reply.sequence,
            millis(reply.rtt)
        );
    }

    fn on_duplicate(&mut self, reply: &EchoReply) {
        let ttl = reply
            .ttl
            .map(|ttl| format!(" ttl={}", ttl))
            .unwrap_or_default();
        let _ = writeln!(
            self.out,
            "{} bytes from {}: icmp_seq={} time={:.3} ms{} (DUP!)",
            reply.bytes,
            reply.source,
            reply.sequence,
            millis(reply.rtt),
            ttl
        );
    }

    fn on_send_error(&mut self, error: &Error) {
        let _ = writeln!(self.out, "WARN: {}", error);
    }

    fn on_stopping(&mut self) {
        let _ = writeln!(self.out);
    }

    fn on_finish(&mut self, summary: &SessionSummary) -> Result<()> {
        let _ = writeln!(self.out, "\n--- {} ping statistics ---", summary.addr);
        let _ = writeln!(
            self.out,
            "{} packets transmitted, {} packets received, {:.1}% packet loss",
            summary.packets_sent, summary.packets_received, summary.packet_loss
        );
        let _ = writeln!(
            self.out,
            "round-trip min/avg/max/stddev = {:.3}/{:.3}/{:.3}/{:.3} ms",
            millis(summary.min_rtt),
            millis(summary.avg_rtt),
            millis(summary.max_rtt),
            millis(summary.stddev_rtt)
        );
        let _ = self.out.flush();
        Ok(())
    }
}
