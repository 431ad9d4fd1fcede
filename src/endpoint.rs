use std::sync::{Arc, RwLock};

/// A concrete forwarding target: replica address and resolved port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Endpoint {
            address: address.into(),
            port,
        }
    }

    /// The `address:port` form used for outbound connections.
    pub fn full_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Shared handle to the currently selected endpoint.
///
/// Single writer (the selector), arbitrarily many concurrent readers (request
/// flows). The value is replaced wholesale under the lock, so a reader never
/// sees the address of one selection paired with the port of another.
#[derive(Clone, Debug, Default)]
pub struct SharedEndpoint {
    inner: Arc<RwLock<Option<Endpoint>>>,
}

impl SharedEndpoint {
    /// Create an unset handle; no target is known until the first selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current selection, if any.
    pub fn get(&self) -> Option<Endpoint> {
        self.inner.read().expect("endpoint lock poisoned").clone()
    }

    /// Publish a new selection.
    pub fn set(&self, endpoint: Endpoint) {
        *self.inner.write().expect("endpoint lock poisoned") = Some(endpoint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn full_address_joins_host_and_port() {
        let ep = Endpoint::new("10.0.0.5", 8080);
        assert_eq!(ep.full_address(), "10.0.0.5:8080");
    }

    #[test]
    fn starts_unset() {
        assert_eq!(SharedEndpoint::new().get(), None);
    }

    #[test]
    fn set_replaces_previous_value() {
        let shared = SharedEndpoint::new();
        shared.set(Endpoint::new("10.0.0.5", 80));
        shared.set(Endpoint::new("10.0.0.6", 8080));
        assert_eq!(shared.get(), Some(Endpoint::new("10.0.0.6", 8080)));
    }

    /// Hammer the handle from one writer and several readers. Each published
    /// value pairs a distinct address with a distinct port, so a torn read
    /// would surface as a mismatched pair.
    #[test]
    fn concurrent_readers_never_observe_torn_pairs() {
        let shared = SharedEndpoint::new();
        shared.set(Endpoint::new("10.0.0.1", 1111));

        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let shared = shared.clone();
            let stop = stop.clone();
            thread::spawn(move || {
                let mut flip = false;
                while !stop.load(Ordering::Relaxed) {
                    let ep = if flip {
                        Endpoint::new("10.0.0.1", 1111)
                    } else {
                        Endpoint::new("10.0.0.2", 2222)
                    };
                    shared.set(ep);
                    flip = !flip;
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                let stop = stop.clone();
                thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let ep = shared.get().expect("endpoint was set before spawning");
                        let expected_port = match ep.address.as_str() {
                            "10.0.0.1" => 1111,
                            "10.0.0.2" => 2222,
                            other => panic!("unexpected address {other}"),
                        };
                        assert_eq!(ep.port, expected_port, "torn endpoint pair");
                    }
                })
            })
            .collect();

        thread::sleep(std::time::Duration::from_millis(200));
        stop.store(true, Ordering::Relaxed);

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
