//! # SEQPING latency probe
//!
//! This crate provides the components of an ICMP latency probe that flags gaps in the reply
//! sequence as probable packet loss. It consists of three major components:
//! - The `Transport` which sends echo requests and delivers replies as events over a channel
//! - The `ProbeSession` which consumes those events, does the bookkeeping and fans them out
//! - The report observers which render console lines and the tabular export
//!
//! The `ProbeSession` is the single consumer of transport events. Sequence tracking and round-trip
//! statistics are only ever mutated from its run loop, while the Ctrl + C listener merely trips a
//! shared `InterruptSignal`.

#[macro_use]
extern crate clap;
#[macro_use]
extern crate log;

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

pub mod cli;
pub mod error;
pub mod interrupt;
pub mod logger;
pub mod packet;
pub mod report;
pub mod session;
pub mod stats;
pub mod tracker;
pub mod transport;

pub use error::{Error, Result};

/// Size of the ICMP echo header preceding the payload
pub const ICMP_HEADER_SIZE: usize = 8;

/// Application configuration
///
/// The `Config` is handed to the `ProbeSession` as a single immutable value. The session only
/// reads the target and the request size, the remaining fields steer the transport and the
/// export observer.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub(crate) dest: Dest,
    pub(crate) size: usize,
    pub(crate) export: PathBuf,
    pub(crate) count: Option<u64>,
    pub(crate) delay: Duration,
    pub(crate) ttl: u8,
    pub(crate) linger: Duration,
}

impl Config {
    /// Target of the probe
    pub fn dest(&self) -> &Dest {
        &self.dest
    }

    /// Total size of an echo request in bytes, ICMP header included
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of payload bytes carried after the ICMP header
    pub fn payload_size(&self) -> usize {
        self.size.saturating_sub(ICMP_HEADER_SIZE)
    }

    /// Location of the tabular export
    pub fn export(&self) -> &PathBuf {
        &self.export
    }

    pub fn count(&self) -> Option<u64> {
        self.count
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn ttl(&self) -> u8 {
        self.ttl
    }

    pub fn linger(&self) -> Duration {
        self.linger
    }
}

/// Destination for the probe
///
/// The user can choose to either provide an IP-address or a host name. Host names are resolved
/// by the transport when the session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dest {
    Ip(IpAddr),
    Host(String),
}

impl std::fmt::Display for Dest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dest::Ip(addr) => write!(f, "{}", addr),
            Dest::Host(host) => write!(f, "{}", host),
        }
    }
}
