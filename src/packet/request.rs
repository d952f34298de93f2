use pnet::packet::{
    icmp::{echo_request::MutableEchoRequestPacket, IcmpTypes},
    Packet,
};
use pnet::packet::util::checksum;
use std::io;

use crate::ICMP_HEADER_SIZE;

/// An echo request before send-out
///
/// Low-level wrapper around an owned ICMP echo request buffer. The buffer holds the 8 byte ICMP
/// header followed by the payload.
#[derive(Debug)]
pub(super) struct RequestPacket(MutableEchoRequestPacket<'static>);

impl RequestPacket {
    /// Create a new echo request packet carrying `payload` bytes of payload
    ///
    /// # Errors
    ///
    /// The function could theoretically return an error, if the buffer were smaller than the
    /// minimum required size. As the header is always added on top, this should never occur.
    pub fn new(payload: usize) -> Result<Self, io::Error> {
        MutableEchoRequestPacket::owned(vec![0; payload + ICMP_HEADER_SIZE])
            .map(|mut pkg| {
                pkg.set_icmp_type(IcmpTypes::EchoRequest);
                Self(pkg)
            })
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "icmp echo request"))
    }

    /// Populate identifier and sequence number and fill the payload with random bytes
    pub fn set_header_and_payload(&mut self, id: u16, sequence: u16) {
        let len = self.0.payload().len();
        let payload: Vec<u8> = (0..len).map(|_| rand::random::<u8>()).collect();

        self.0.set_identifier(id);
        self.0.set_sequence_number(sequence);
        self.0.set_payload(&payload);
    }

    /// Set the checksum field over the whole ICMP message
    pub fn set_checksum(&mut self) {
        self.0.set_checksum(0);
        let sum = checksum(self.0.packet(), 1);
        self.0.set_checksum(sum);
    }
}

impl Packet for RequestPacket {
    fn packet(&self) -> &[u8] {
        self.0.packet()
    }

    fn payload(&self) -> &[u8] {
        self.0.payload()
    }
}
