use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use serialpnp_host::{Notification, SessionState};

use crate::cmd::MonitorArgs;
use crate::exit::{CliError, CliResult, FAILURE, INTERNAL, SUCCESS};
use crate::output::{print_value, OutputFormat};

pub fn run(args: MonitorArgs, format: OutputFormat) -> CliResult<i32> {
    let session = args.connect.connect()?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let (tx, rx) = mpsc::channel::<(&'static str, Notification)>();
    let events = tx.clone();
    session.subscribe_events(move |n| {
        let _ = events.send(("event", n.clone()));
    });
    if !args.events_only {
        session.subscribe_property_notifications(move |n| {
            let _ = tx.send(("property", n.clone()));
        });
    }

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok((kind, n)) => {
                print_value(kind, &n.interface_id, &n.name, &n.value, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if session.state() == SessionState::Disconnected {
                    return Err(CliError::new(FAILURE, "device disconnected"));
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    tracing::debug!(printed, "monitor stopped");
    session.close();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
