#[macro_use]
extern crate log;

use seqping::{
    cli::App,
    interrupt::InterruptSignal,
    report::{ConsoleReport, ExportReport},
    session::ProbeSession,
    transport::IcmpTransport,
    Error,
};

fn main() {
    let config = match App::parse_args() {
        Ok(config) => config,
        Err(e) => {
            error!("Could not parse provided argument: {}", e);
            std::process::exit(1);
        }
    };

    // Ctrl + C only requests a stop, the session still completes and reports
    let interrupt = InterruptSignal::new();
    let handler = interrupt.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if handler.trigger() {
            trace!("Registered signal interrupt -- Signalling stop to transport");
        }
    }) {
        error!("Could not configure ping session: {}", Error::from(e));
        std::process::exit(1);
    }

    trace!("Set up new probe session");

    let transport = IcmpTransport::new(&config);
    let export = ExportReport::new(config.export());
    let mut session = ProbeSession::new(config, transport, interrupt);
    session.observe(ConsoleReport::stdout());
    session.observe(export);

    if let Err(e) = session.start() {
        if e.is_configuration() {
            error!("Could not configure ping session: {}", e);
        } else {
            error!("Could not start ping session: {}", e);
        }
        std::process::exit(1);
    }

    trace!("Start ping session");

    match session.run() {
        Ok(summary) => trace!("Successfully ended ping session: {:?}", summary),
        Err(e) => {
            error!("Ping session failed: {}", e);
            std::process::exit(1);
        }
    }

    trace!("Shutting down...");
}
