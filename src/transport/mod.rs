//! Echo request transport
//!
//! The `Transport` is the seam between the probe session and the network. It issues echo
//! requests on its own schedule and hands everything it observes to the session as
//! `TransportEvent`s over a [crossbeam][crossbeam] channel. The session is the single consumer
//! of that channel, so events are processed in exactly the order the transport emits them.
//!
//! [crossbeam]: https://docs.rs/crossbeam/0.8/crossbeam/channel/index.html

use crossbeam::channel::Sender;
use pnet::transport::{TransportReceiver, TransportSender};
use std::io;
use std::net::IpAddr;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::interrupt::InterruptSignal;
use crate::packet::{process_id, Outbox};
use crate::{Config, Dest, ICMP_HEADER_SIZE};
use receiver::Registry;

mod receiver;

/// Granularity at which waiting threads check for an interrupt
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A received echo reply
#[derive(Debug, Clone, PartialEq)]
pub struct EchoReply {
    pub sequence: u16,
    pub bytes: usize,
    pub rtt: Duration,
    pub source: IpAddr,
    pub ttl: Option<u8>,
    pub duplicate: bool,
}

/// Everything a transport reports back to the session
#[derive(Debug)]
pub enum TransportEvent {
    /// First reply for an outstanding request
    Reply(EchoReply),
    /// Another reply for a request that has already been answered
    Duplicate(EchoReply),
    /// A single request could not be sent, the transport carries on with the next one
    SendError(Error),
    /// The transport has stopped for good, no further events follow
    Complete { sent: u64, received: u64 },
}

/// Sending half of the event channel
pub type EventSender = Sender<TransportEvent>;

/// Source of echo replies
pub trait Transport {
    /// Start issuing echo requests of `size` bytes (ICMP header included) to `target`
    ///
    /// Returns the resolved address of the target. All events are delivered through `events`;
    /// the last one is always `TransportEvent::Complete`. Once `interrupt` is triggered no new
    /// requests are issued, but replies still in flight are reported.
    ///
    /// # Errors
    ///
    /// Fails synchronously if the target cannot be resolved or the transport cannot be set up.
    fn start(
        &mut self,
        target: &Dest,
        size: usize,
        events: EventSender,
        interrupt: InterruptSignal,
    ) -> Result<IpAddr>;
}

/// Raw socket ICMP transport
///
/// Sending happens on a dedicated thread, which also lingers for in-flight replies after the last
/// request and finally reports completion. Replies are read by a listener thread, see
/// `receiver::listen`.
#[derive(Debug)]
pub struct IcmpTransport {
    delay: Duration,
    ttl: u8,
    count: Option<u64>,
    linger: Duration,
    interrupt: Option<InterruptSignal>,
    handle: Option<JoinHandle<()>>,
}

impl IcmpTransport {
    pub fn new(config: &Config) -> Self {
        Self {
            delay: config.delay(),
            ttl: config.ttl(),
            count: config.count(),
            linger: config.linger(),
            interrupt: None,
            handle: None,
        }
    }

    /// Open new channels for ICMP transmission
    ///
    /// Requests go out through a layer 4 channel, so the kernel builds the IPv4 header and honors
    /// the configured time to live. Replies are read from a layer 3 channel, which keeps the IPv4
    /// header of every datagram. Both channels have a buffer of 4 KB in size. Ownership of the
    /// endpoints is later transferred to the sending and receiving threads. Opening raw sockets
    /// requires elevated privileges on most systems.
    fn open_transport_channel() -> io::Result<(TransportSender, TransportReceiver)> {
        use pnet::packet::ip::IpNextHeaderProtocols::Icmp;
        use pnet::transport::{
            self, TransportChannelType::Layer3, TransportChannelType::Layer4,
            TransportProtocol::Ipv4,
        };

        trace!("Opening transport channels to transmit network packets");

        let (tx, _) = transport::transport_channel(4096, Layer4(Ipv4(Icmp)))?;
        let (_, rx) = transport::transport_channel(4096, Layer3(Icmp))?;
        Ok((tx, rx))
    }
}

impl Transport for IcmpTransport {
    fn start(
        &mut self,
        target: &Dest,
        size: usize,
        events: EventSender,
        interrupt: InterruptSignal,
    ) -> Result<IpAddr> {
        if size < ICMP_HEADER_SIZE {
            return Err(Error::Config(format!(
                "packet size {} is smaller than the {} byte ICMP header",
                size, ICMP_HEADER_SIZE
            )));
        }

        let addr = resolve(target)?;
        let (mut tx, rx) = Self::open_transport_channel().map_err(Error::Socket)?;

        info!("Set time to live: {}", self.ttl);
        tx.set_ttl(self.ttl).map_err(Error::Socket)?;

        let mut outbox = Outbox::new(addr, size - ICMP_HEADER_SIZE, process_id());
        let registry = Registry::default();

        // The listener outlives the send loop by the linger period
        let done = InterruptSignal::new();
        let listener =
            receiver::listen(rx, outbox.get_id(), registry.clone(), events.clone(), done.clone());

        let delay = self.delay;
        let count = self.count;
        let linger = self.linger;
        let stop = interrupt.clone();

        let sender = thread::spawn(move || {
            trace!("Start sending thread for echo requests");

            let mut sent = 0u64;
            while !stop.is_triggered() && count.map_or(true, |max| sent < max) {
                // Holding the registry while sending keeps the listener from looking up a reply
                // before its request has been registered
                let result = {
                    let mut records = registry.lock();
                    let outcome = outbox.send(&mut tx);
                    if let Ok((seq, departure)) = outcome {
                        records.register(seq, departure);
                    }
                    outcome
                };

                match result {
                    Ok(_) => sent += 1,
                    Err(e) => {
                        warn!("Error occurred during send of echo request");
                        let _ = events.send(TransportEvent::SendError(Error::Send(e)));
                    }
                }

                if count.map_or(false, |max| sent >= max) {
                    break;
                }
                pause(&stop, delay);
            }

            trace!("Stopped sending after {} requests - lingering for replies", sent);

            let deadline = Instant::now() + linger;
            while registry.lock().answered() < sent && Instant::now() < deadline {
                thread::sleep(POLL_INTERVAL);
            }

            done.trigger();
            if listener.join().is_err() {
                error!("Listening thread panicked");
            }

            let received = registry.lock().answered();
            let _ = events.send(TransportEvent::Complete { sent, received });

            trace!("Shutting down sending thread");
        });

        self.interrupt = Some(interrupt);
        self.handle = Some(sender);
        Ok(addr)
    }
}

impl Drop for IcmpTransport {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Some(interrupt) = &self.interrupt {
                interrupt.trigger();
            }
            if handle.join().is_err() {
                error!("Sending thread panicked");
            }
        }
    }
}

/// Resolve the target to an IPv4 address
///
/// Host names are looked up via the system resolver and the first IPv4 address wins.
///
/// # Errors
///
/// Fails if the lookup fails, or if the target only has IPv6 addresses.
pub fn resolve(target: &Dest) -> Result<IpAddr> {
    use dns_lookup::lookup_host;

    match target {
        Dest::Ip(addr @ IpAddr::V4(_)) => Ok(*addr),
        Dest::Ip(addr) => Err(Error::NoIpv4Address(addr.to_string())),
        Dest::Host(host) => {
            let addr = lookup_host(host)
                .map_err(|source| Error::Resolve {
                    host: host.clone(),
                    source,
                })?
                .into_iter()
                .find(IpAddr::is_ipv4)
                .ok_or_else(|| Error::NoIpv4Address(host.clone()))?;

            info!("Resolved host {} to IP {}", host, addr);
            Ok(addr)
        }
    }
}

/// Sleep for `duration`, waking up early if `interrupt` is triggered
fn pause(interrupt: &InterruptSignal, duration: Duration) {
    let deadline = Instant::now() + duration;
    loop {
        let now = Instant::now();
        if interrupt.is_triggered() || now >= deadline {
            break;
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn resolve_ipv4_literal() {
        let addr = IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1));
        assert_eq!(resolve(&Dest::Ip(addr)).unwrap(), addr);
    }

    #[test]
    fn reject_ipv6_literal() {
        let err = resolve(&Dest::Ip(IpAddr::V6(Ipv6Addr::LOCALHOST))).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn reject_unresolvable_host() {
        let err = resolve(&Dest::Host(String::from("no-such-host.invalid"))).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn reject_undersized_request() {
        let config = crate::cli::App::parse_from(vec!["seqping", "-h", "127.0.0.1"]).unwrap();
        let mut transport = IcmpTransport::new(&config);
        let (tx, _rx) = crossbeam::channel::unbounded();

        let err = transport
            .start(config.dest(), 4, tx, InterruptSignal::new())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn pause_returns_early_on_interrupt() {
        let interrupt = InterruptSignal::new();
        interrupt.trigger();

        let start = Instant::now();
        pause(&interrupt, Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
