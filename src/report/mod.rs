//! Consumers of session events
//!
//! Everything the session learns is fanned out to its registered observers, in the order the
//! events were processed: a gap warning always precedes the reply that revealed it.

use std::net::IpAddr;

use crate::error::{Error, Result};
use crate::stats::SessionSummary;
use crate::tracker::Gap;
use crate::transport::EchoReply;
use crate::Dest;

pub mod console;
pub mod export;

pub use console::ConsoleReport;
pub use export::ExportReport;

/// Receiver of probe session events
///
/// All methods default to doing nothing, so observers only implement what they render.
pub trait Observer {
    /// The transport is up and about to send the first request
    fn on_start(&mut self, _target: &Dest, _addr: IpAddr, _payload: usize) {}

    /// Replies between `gap.from` and `gap.to` are presumed lost
    fn on_gap(&mut self, _gap: &Gap) {}

    /// First reply for a request
    fn on_reply(&mut self, _reply: &EchoReply) {}

    /// Repeated reply for a request that has already been answered
    fn on_duplicate(&mut self, _reply: &EchoReply) {}

    /// A single request failed to go out, the session carries on
    fn on_send_error(&mut self, _error: &Error) {}

    /// A stop was requested, replies still in flight will follow
    fn on_stopping(&mut self) {}

    /// The session is over
    ///
    /// Called exactly once per session.
    fn on_finish(&mut self, _summary: &SessionSummary) -> Result<()> {
        Ok(())
    }
}
