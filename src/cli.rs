//! Command line interface

use clap::ArgMatches;
use std::ffi::OsString;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::logger::StdLogger;
use crate::{Config, Dest, ICMP_HEADER_SIZE};

/// Largest payload that fits an Ethernet frame without fragmentation
const MAX_UNFRAGMENTED_PAYLOAD: usize = 1472;

/// Application initialization
pub struct App;

impl App {
    /// Define the command line interface
    fn interface() -> clap::App<'static, 'static> {
        clap_app!(seqping =>
            (version: crate_version!())
            (about: "Probe a host with ICMP echo requests, flag lost replies and export every reply")
            (@arg host: -h --host +takes_value "Host name or IPv4 address to probe (default www.google.com)")
            (@arg size: -s --size +takes_value "Size of each ICMP packet in bytes, header included (default 64)")
            (@arg excel: -x --excel +takes_value "Spreadsheet to write the reply table to (default output.xlsx)")
            (@arg count: -c --count +takes_value "Stop after sending this many requests")
            (@arg delay: -d --delay +takes_value "Interval between requests in ms (default 1000)")
            (@arg ttl: -t --ttl +takes_value "Sets the time to live (default 64)")
            (@arg linger: -w --linger +takes_value "Time to wait for outstanding replies in ms (default 1000)")
            (@arg verbose: -v --verbose "Sets the level of verbosity"))
    }

    /// Retrieve user input from command line
    ///
    /// The user can modify the following parameters of the application:
    /// - host: Either as IPv4 address or domain name (default www.google.com)
    /// - size: The total ICMP packet size (default 64 bytes, i.e. 56 bytes of payload)
    /// - excel: Path of the exported reply spreadsheet (default output.xlsx)
    /// - count: Number of requests before the session ends (default unbounded)
    /// - delay: The interval between the sending of packets (default 1,000ms)
    /// - ttl: The time to live for packets (default 64)
    /// - linger: How long to wait for in-flight replies once sending stopped (default 1,000ms)
    ///
    /// Prints usage and exits the process if the arguments cannot be parsed. Also initializes the
    /// logger, according to the verbosity requested.
    pub fn parse_args() -> Result<Config> {
        let matches = Self::interface().get_matches();

        StdLogger::init(matches.is_present("verbose"));

        Self::configure(&matches)
    }

    /// Parse the provided arguments, the first of which is the binary name
    pub fn parse_from<I, T>(args: I) -> Result<Config>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::interface()
            .get_matches_from_safe(args)
            .map_err(|e| Error::Config(e.message))?;

        Self::configure(&matches)
    }

    fn configure(matches: &ArgMatches) -> Result<Config> {
        let dest = Self::destination(matches.value_of("host").unwrap_or("www.google.com"));

        let size: usize = value_of(matches, "size", "64")?;
        if size < ICMP_HEADER_SIZE {
            return Err(Error::Config(format!(
                "packet size must be at least {} bytes",
                ICMP_HEADER_SIZE
            )));
        }
        if size - ICMP_HEADER_SIZE > MAX_UNFRAGMENTED_PAYLOAD {
            warn!("Beware of the Maximum Transmission Unit supported by your network device");
            warn!("If you do not receive any responses, try a smaller packet size");
        }

        let count = match matches.value_of("count") {
            Some(val) => match val.parse::<u64>() {
                Ok(0) => return Err(Error::Config(String::from("count must be positive"))),
                Ok(val) => Some(val),
                Err(e) => return Err(invalid("count", val, e)),
            },
            None => None,
        };

        let export = PathBuf::from(matches.value_of("excel").unwrap_or("output.xlsx"));
        let delay = value_of(matches, "delay", "1000").map(Duration::from_millis)?;
        let ttl = value_of(matches, "ttl", "64")?;
        let linger = value_of(matches, "linger", "1000").map(Duration::from_millis)?;

        trace!("Parsed configuration.");

        Ok(Config {
            dest,
            size,
            export,
            count,
            delay,
            ttl,
            linger,
        })
    }

    /// IP literals are taken as they are, everything else is resolved when the session starts
    fn destination(val: &str) -> Dest {
        if let Ok(ip) = val.parse::<Ipv4Addr>() {
            return Dest::Ip(IpAddr::V4(ip));
        }
        if let Ok(ip) = val.parse::<Ipv6Addr>() {
            return Dest::Ip(IpAddr::V6(ip));
        }
        Dest::Host(val.to_string())
    }
}

fn invalid(name: &str, val: &str, e: impl Display) -> Error {
    Error::Config(format!("invalid {} '{}': {}", name, val, e))
}

/// Parse an optional argument, falling back to `default`
fn value_of<T>(matches: &ArgMatches, name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let val = matches.value_of(name).unwrap_or(default);
    val.parse::<T>().map_err(|e| invalid(name, val, e))
}
