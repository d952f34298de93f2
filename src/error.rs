use rust_xlsxwriter::XlsxError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A probe result.
pub type Result<T> = std::result::Result<T, Error>;

/// A probe error.
///
/// Configuration errors are fatal and surface before any request is sent. Send errors are
/// recoverable and only ever travel to observers as a warning. Export errors terminate the
/// reporting phase after the console summary has been shown.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("could not resolve host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },
    #[error("host {0} has no IPv4 address")]
    NoIpv4Address(String),
    #[error("could not open raw ICMP socket: {0}")]
    Socket(#[source] io::Error),
    #[error("could not install interrupt handler: {0}")]
    Interrupt(#[from] ctrlc::Error),
    #[error("failed to send echo request: {0}")]
    Send(#[source] io::Error),
    #[error("failed to write export to {}: {source}", .path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: XlsxError,
    },
    #[error("probe session has already been started")]
    AlreadyStarted,
    #[error("transport hung up before completing the session")]
    Disconnected,
}

impl Error {
    /// Return `true` if this error stems from an unusable configuration or transport setup
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Resolve { .. }
                | Self::NoIpv4Address(_)
                | Self::Socket(_)
                | Self::Interrupt(_)
        )
    }
}
