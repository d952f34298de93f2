use pnet::transport::TransportReceiver;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::{EchoReply, EventSender, TransportEvent};
use crate::interrupt::InterruptSignal;
use crate::packet::ReplyPacket;

/// Departure record of a single echo request
#[derive(Debug, Copy, Clone)]
struct Record {
    departure: Instant,
    answered: bool,
}

/// Book keeping of outstanding echo requests
///
/// Requests are keyed by sequence number. When the sequence number wraps around, the old record is
/// simply replaced by the new one.
#[derive(Debug, Default)]
pub(super) struct Records {
    requests: HashMap<u16, Record>,
    answered: u64,
}

impl Records {
    /// Register echo request right after send out
    pub fn register(&mut self, seq: u16, departure: Instant) {
        self.requests.insert(
            seq,
            Record {
                departure,
                answered: false,
            },
        );
    }

    /// Match an echo reply against its request
    ///
    /// Returns the time in transit and whether the request had already been answered before, or
    /// `None` if no request with this sequence number was registered.
    pub fn resolve(&mut self, seq: u16, arrival: Instant) -> Option<(Duration, bool)> {
        let record = self.requests.get_mut(&seq)?;
        let lapsed = arrival.saturating_duration_since(record.departure);
        let duplicate = record.answered;
        if !duplicate {
            record.answered = true;
            self.answered += 1;
        }
        Some((lapsed, duplicate))
    }

    /// Number of requests that received at least one reply
    pub fn answered(&self) -> u64 {
        self.answered
    }

    /// Turn a parsed reply into the event for the session
    fn correlate(
        &mut self,
        reply: &ReplyPacket,
        source: IpAddr,
        arrival: Instant,
    ) -> Option<TransportEvent> {
        let (rtt, duplicate) = self.resolve(reply.get_sequence(), arrival)?;
        let reply = EchoReply {
            sequence: reply.get_sequence(),
            bytes: reply.get_size(),
            rtt,
            source,
            ttl: Some(reply.get_ttl()),
            duplicate,
        };

        Some(if duplicate {
            TransportEvent::Duplicate(reply)
        } else {
            TransportEvent::Reply(reply)
        })
    }
}

/// Shared handle to the request `Records`
#[derive(Debug, Clone, Default)]
pub(super) struct Registry(Arc<Mutex<Records>>);

impl Registry {
    /// Lock the records
    ///
    /// The records stay consistent even if a thread panicked while holding the lock, so a
    /// poisoned mutex is simply recovered.
    pub fn lock(&self) -> MutexGuard<'_, Records> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Listen to incoming echo replies
///
/// Returns a joinable handle to the listening thread.
///
/// The listening thread owns the [`TransportReceiver`][rx], which delivers whole IPv4 datagrams so
/// the time to live of every reply can be read. Every packet is timestamped as promptly as possible, then checked against this process' identifier and correlated with its
/// request. The thread unblocks every 0.1 secs to check whether it should shut down.
///
/// [rx]: https://docs.rs/pnet/latest/pnet/transport/struct.TransportReceiver.html
pub(super) fn listen(
    mut rx: TransportReceiver,
    id: u16,
    registry: Registry,
    events: EventSender,
    done: InterruptSignal,
) -> JoinHandle<()> {
    use pnet::transport::ipv4_packet_iter;

    thread::spawn(move || {
        trace!("Start listening thread for incoming ICMP packets");

        let mut incoming = ipv4_packet_iter(&mut rx);
        while !done.is_triggered() {
            match incoming.next_with_timeout(Duration::from_millis(100)) {
                Ok(Some((datagram, addr))) => {
                    let arrival = Instant::now();

                    // Make sure this packet is a reply that belongs to this session
                    let reply = match ReplyPacket::parse(&datagram) {
                        Some(reply) if reply.get_id() == id => reply,
                        _ => continue,
                    };

                    let event = registry.lock().correlate(&reply, addr, arrival);
                    match event {
                        Some(event) => {
                            let _ = events.send(event);
                        }
                        None => debug!("Reply for unknown sequence {}", reply.get_sequence()),
                    }
                }

                // Unblock and check, whether we are still listening
                Ok(None) => (),

                // Errors come from the operating system, the listener carries on regardless
                Err(e) => error!("Error occurred while reading incoming: {}", e),
            }
        }

        trace!("Shutting down listening thread");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::tests::echo_reply_datagram;
    use pnet::packet::ipv4::Ipv4Packet;
    use std::net::Ipv4Addr;

    const SOURCE: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    #[test]
    fn resolve_marks_first_reply_only() {
        let mut records = Records::default();
        let departure = Instant::now();
        records.register(0, departure);

        let arrival = departure + Duration::from_millis(12);
        assert_eq!(
            records.resolve(0, arrival),
            Some((Duration::from_millis(12), false))
        );
        assert_eq!(
            records.resolve(0, arrival + Duration::from_millis(1)),
            Some((Duration::from_millis(13), true))
        );
        assert_eq!(records.answered(), 1);
    }

    #[test]
    fn unknown_sequence_is_ignored() {
        let mut records = Records::default();
        records.register(1, Instant::now());

        assert_eq!(records.resolve(2, Instant::now()), None);
        assert_eq!(records.answered(), 0);
    }

    #[test]
    fn wrapped_sequence_replaces_record() {
        let mut records = Records::default();
        let first = Instant::now();
        records.register(5, first);
        let _ = records.resolve(5, first);

        let second = first + Duration::from_secs(1);
        records.register(5, second);
        assert_eq!(records.resolve(5, second), Some((Duration::ZERO, false)));
        assert_eq!(records.answered(), 2);
    }

    #[test]
    fn correlate_emits_reply_then_duplicate() {
        let buf = echo_reply_datagram(9, 3, 56, 52);
        let reply = ReplyPacket::parse(&Ipv4Packet::new(&buf).unwrap()).unwrap();

        let registry = Registry::default();
        let departure = Instant::now();
        registry.lock().register(3, departure);

        let first = registry.lock().correlate(&reply, SOURCE, departure);
        match first {
            Some(TransportEvent::Reply(echo)) => {
                assert_eq!(echo.sequence, 3);
                assert_eq!(echo.bytes, 64);
                assert_eq!(echo.source, SOURCE);
                assert_eq!(echo.ttl, Some(52));
                assert!(!echo.duplicate);
            }
            other => panic!("Expected reply, got {:?}", other),
        }

        let second = registry.lock().correlate(&reply, SOURCE, departure);
        match second {
            Some(TransportEvent::Duplicate(echo)) => {
                assert!(echo.duplicate);
                assert_eq!(echo.ttl, Some(52));
            }
            other => panic!("Expected duplicate, got {:?}", other),
        }
    }
}
