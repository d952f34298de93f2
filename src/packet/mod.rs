use pnet::packet::icmp::{echo_reply::EchoReplyPacket, IcmpTypes};
use pnet::packet::ip::IpNextHeaderProtocols;
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::Packet;
use pnet::transport::TransportSender;
use std::io;
use std::net::IpAddr;
use std::time::Instant;

use request::RequestPacket;

mod request;

/// Echo request layout with sender information
///
/// The `Outbox` maintains only what is needed to stamp out new echo requests on the fly, not the
/// packets themselves, as they are consumed by the `TransportSender`. Sequence numbers start at 0
/// and wrap around after 65535.
#[derive(Debug)]
pub struct Outbox {
    addr: IpAddr,
    payload: usize,
    id: u16,
    sequence: u16,
}

impl Outbox {
    /// Configure a new `Outbox` for requests carrying `payload` bytes
    pub fn new(addr: IpAddr, payload: usize, id: u16) -> Self {
        Self {
            addr,
            payload,
            id,
            sequence: 0,
        }
    }

    /// Get the identifier stamped into every request
    pub fn get_id(&self) -> u16 {
        self.id
    }

    /// Build the next echo request without consuming its sequence number
    fn build(&self) -> Result<RequestPacket, io::Error> {
        let mut packet = RequestPacket::new(self.payload)?;
        packet.set_header_and_payload(self.id, self.sequence);
        packet.set_checksum();
        Ok(packet)
    }

    /// Send the next echo request
    ///
    /// Returns the sequence number of the request and the instant right before it was handed to
    /// the [`TransportSender`][tx]. The sequence number is only consumed if the send succeeded.
    ///
    /// # Errors
    ///
    /// If the transport fails, due to an error in a lower layer handled by the Operating System,
    /// then the function returns the error received by OS.
    ///
    /// [tx]: https://docs.rs/pnet/latest/pnet/transport/struct.TransportSender.html
    pub fn send(&mut self, tx: &mut TransportSender) -> Result<(u16, Instant), io::Error> {
        let packet = self.build()?;
        let seq = self.sequence;

        let start = Instant::now();
        tx.send_to(packet, self.addr)?;

        self.sequence = self.sequence.wrapping_add(1);
        Ok((seq, start))
    }
}

/// An echo reply after receipt
///
/// Only retains what is needed to correlate the reply with its request: identifier, sequence
/// number, the size of the whole ICMP message and the time to live left in the IPv4 header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPacket {
    id: u16,
    seq: u16,
    size: usize,
    ttl: u8,
}

impl ReplyPacket {
    /// Parse an inbound IPv4 datagram
    ///
    /// Returns `None` for anything but a well-formed ICMP echo reply.
    pub fn parse(datagram: &Ipv4Packet<'_>) -> Option<Self> {
        if datagram.get_next_level_protocol() != IpNextHeaderProtocols::Icmp {
            return None;
        }

        let reply = EchoReplyPacket::new(datagram.payload())?;
        if reply.get_icmp_type() != IcmpTypes::EchoReply {
            return None;
        }

        Some(Self {
            id: reply.get_identifier(),
            seq: reply.get_sequence_number(),
            size: datagram.payload().len(),
            ttl: datagram.get_ttl(),
        })
    }

    /// Get the identifier of the packet
    pub fn get_id(&self) -> u16 {
        self.id
    }

    /// Get the sequence number of the packet
    pub fn get_sequence(&self) -> u16 {
        self.seq
    }

    /// Get the length of the ICMP message, header included
    pub fn get_size(&self) -> usize {
        self.size
    }

    /// Get the time to live of the carrying datagram
    pub fn get_ttl(&self) -> u8 {
        self.ttl
    }
}

/// Identifier for this process' echo requests
pub fn process_id() -> u16 {
    std::process::id() as u16
}
