use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use std::net::IpAddr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::interrupt::InterruptSignal;
use crate::report::Observer;
use crate::stats::{SessionSummary, Statistics};
use crate::tracker::SequenceTracker;
use crate::transport::{Transport, TransportEvent};
use crate::Config;

/// Longest the run loop blocks before checking for an interrupt
const WAKEUP: Duration = Duration::from_millis(100);

/// Lifecycle of a probe session
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    /// Configured, nothing sent yet
    Created,
    /// Requests are being issued
    Running,
    /// A stop was requested, waiting for the transport to complete
    Stopping,
    /// The summary has been produced
    Finished,
}

/// One run of the probe against a single target
///
/// The session is the single consumer of the transport's events. Sequence tracking, statistics
/// and observers are only ever touched from its run loop; other threads interact with the session
/// exclusively through its `InterruptSignal`.
pub struct ProbeSession<T> {
    config: Config,
    transport: T,
    interrupt: InterruptSignal,
    observers: Vec<Box<dyn Observer>>,
    state: State,
    addr: Option<IpAddr>,
    events: Option<Receiver<TransportEvent>>,
    tracker: SequenceTracker,
    stats: Statistics,
}

impl<T: Transport> ProbeSession<T> {
    /// Create a new session
    ///
    /// Triggering `interrupt` from any thread stops the session from issuing further requests.
    /// The session still runs to completion and produces its summary.
    pub fn new(config: Config, transport: T, interrupt: InterruptSignal) -> Self {
        Self {
            config,
            transport,
            interrupt,
            observers: Vec::new(),
            state: State::Created,
            addr: None,
            events: None,
            tracker: SequenceTracker::new(),
            stats: Statistics::new(),
        }
    }

    /// Register an observer
    ///
    /// Observers are notified in the order of registration.
    pub fn observe<O: Observer + 'static>(&mut self, observer: O) {
        self.observers.push(Box::new(observer));
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Handle for requesting a stop from another thread
    pub fn interrupt(&self) -> InterruptSignal {
        self.interrupt.clone()
    }

    /// Start the transport
    ///
    /// Returns the resolved address of the target.
    ///
    /// # Errors
    ///
    /// If the transport cannot be set up, the error is returned and the session stays `Created`.
    pub fn start(&mut self) -> Result<IpAddr> {
        if self.state != State::Created {
            return Err(Error::AlreadyStarted);
        }

        let (tx, rx) = channel::unbounded();
        let addr = self.transport.start(
            self.config.dest(),
            self.config.size(),
            tx,
            self.interrupt.clone(),
        )?;

        info!("Probing {} ({})", self.config.dest(), addr);

        let payload = self.config.payload_size();
        for observer in self.observers.iter_mut() {
            observer.on_start(self.config.dest(), addr, payload);
        }

        self.addr = Some(addr);
        self.events = Some(rx);
        self.state = State::Running;
        Ok(addr)
    }

    /// Run the session to completion
    ///
    /// Starts the transport if that has not happened yet, then processes events until the
    /// transport reports completion. The summary is handed to every observer exactly once.
    ///
    /// # Errors
    ///
    /// Returns start-up errors, `Error::Disconnected` if the transport vanished without
    /// completing, or the first error an observer raised while finishing. All observers are
    /// notified of the summary even if an earlier one failed.
    pub fn run(mut self) -> Result<SessionSummary> {
        if self.state == State::Created {
            self.start()?;
        }

        let (addr, events) = match (self.addr, self.events.take()) {
            (Some(addr), Some(events)) => (addr, events),
            _ => return Err(Error::Disconnected),
        };

        let sent = loop {
            let received = events.recv_timeout(WAKEUP);
            self.check_interrupt();

            match received {
                Ok(event) => {
                    if let Some(sent) = self.dispatch(event) {
                        break sent;
                    }
                }
                Err(RecvTimeoutError::Timeout) => (),
                Err(RecvTimeoutError::Disconnected) => return Err(Error::Disconnected),
            }
        };

        // No further events are read once the transport has completed
        drop(events);
        self.state = State::Finished;

        let summary = self.stats.finish(addr, sent);
        trace!(
            "Finished session after icmp_seq={:?}: {:?}",
            self.tracker.last(),
            summary
        );

        let mut outcome = Ok(());
        for observer in self.observers.iter_mut() {
            if let Err(e) = observer.on_finish(&summary) {
                if outcome.is_ok() {
                    outcome = Err(e);
                } else {
                    error!("{}", e);
                }
            }
        }
        outcome.map(|_| summary)
    }

    /// Move into `Stopping` once an interrupt has been requested
    fn check_interrupt(&mut self) {
        if self.state == State::Running && self.interrupt.is_triggered() {
            info!("Registered interrupt - waiting for the transport to complete");
            self.state = State::Stopping;
            for observer in self.observers.iter_mut() {
                observer.on_stopping();
            }
        }
    }

    /// Process a single transport event
    ///
    /// Returns the number of requests sent once the transport reports completion.
    fn dispatch(&mut self, event: TransportEvent) -> Option<u64> {
        match event {
            TransportEvent::Reply(reply) => {
                let gap = self.tracker.observe(reply.sequence);
                self.stats.record(&reply);

                if let Some(gap) = gap {
                    debug!("{} replies missing before icmp_seq={}", gap.missing(), gap.to);
                    for observer in self.observers.iter_mut() {
                        observer.on_gap(&gap);
                    }
                }
                for observer in self.observers.iter_mut() {
                    observer.on_reply(&reply);
                }
                None
            }

            // Duplicates bypass tracker and statistics altogether
            TransportEvent::Duplicate(reply) => {
                for observer in self.observers.iter_mut() {
                    observer.on_duplicate(&reply);
                }
                None
            }

            TransportEvent::SendError(e) => {
                warn!("{}", e);
                for observer in self.observers.iter_mut() {
                    observer.on_send_error(&e);
                }
                None
            }

            TransportEvent::Complete { sent, received } => {
                if received != self.stats.received() {
                    debug!(
                        "Transport counted {} replies, session accepted {}",
                        received,
                        self.stats.received()
                    );
                }
                Some(sent)
            }
        }
    }
}
