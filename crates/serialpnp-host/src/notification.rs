use std::sync::Arc;

use parking_lot::Mutex;
use serialpnp_descriptor::Value;

/// A decoded event or property notification from the device.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Wire index of the interface.
    pub interface: u8,
    /// Interface id from the descriptor.
    pub interface_id: String,
    /// Event or property name.
    pub name: String,
    pub value: Value,
}

pub(crate) type Callback = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Registered callbacks for one kind of notification.
#[derive(Default)]
pub(crate) struct Subscribers {
    callbacks: Mutex<Vec<Callback>>,
}

impl Subscribers {
    pub fn add(&self, callback: Callback) {
        self.callbacks.lock().push(callback);
    }

    /// Invoke every callback. The list is snapshotted first so callbacks may
    /// subscribe further without deadlocking.
    pub fn notify(&self, notification: &Notification) -> usize {
        let snapshot: Vec<Callback> = self.callbacks.lock().clone();
        for callback in &snapshot {
            callback(notification);
        }
        snapshot.len()
    }

    pub fn len(&self) -> usize {
        self.callbacks.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn every_subscriber_sees_each_notification() {
        let subscribers = Subscribers::default();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            subscribers.add(Arc::new(move |n: &Notification| {
                assert_eq!(n.name, "temperature");
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }

        let delivered = subscribers.notify(&Notification {
            interface: 0,
            interface_id: "thermo".into(),
            name: "temperature".into(),
            value: Value::Float(21.5),
        });
        assert_eq!(delivered, 3);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(subscribers.len(), 3);
    }
}
