//! Connect to a peripheral, print its interfaces, then print every event
//! until the device goes away.
//!
//! Run with:
//!   cargo run --features cli -- simulate /tmp/serialpnp-demo.sock --interval 500ms
//!
//! In another terminal:
//!   cargo run --example watch-events --features host -- /tmp/serialpnp-demo.sock

use std::sync::mpsc;

use serialpnp::host::{self, Notification};
use serialpnp::transport::Endpoint;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let endpoint: Endpoint = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/tmp/serialpnp-demo.sock".to_string())
        .parse()?;

    let session = host::connect(&endpoint)?;
    let descriptor = session.descriptor();
    eprintln!("Connected to {}", descriptor.display_name);
    for (index, iface) in descriptor.interfaces.iter().enumerate() {
        eprintln!(
            "  {index}: {} ({} properties, {} commands, {} events)",
            iface.id,
            iface.properties.len(),
            iface.commands.len(),
            iface.events.len()
        );
    }

    let (tx, rx) = mpsc::channel::<Notification>();
    session.subscribe_events(move |n| {
        let _ = tx.send(n.clone());
    });

    // The sender lives in the session's subscriber list, so the channel
    // stays open until the session is closed.
    while session.state() == host::SessionState::Ready {
        match rx.recv_timeout(std::time::Duration::from_millis(500)) {
            Ok(n) => println!("{}/{} = {}", n.interface_id, n.name, n.value),
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    eprintln!("Device disconnected");
    session.close();
    Ok(())
}
