//! Sticky-primary selection over membership snapshots.
//!
//! Each delivered `Endpoints` payload is reduced to at most one update of the
//! shared endpoint: the current target is kept for as long as it stays listed
//! and replaced only once it disappears, so a re-reported but unchanged
//! membership list never causes target churn.

use k8s_openapi::api::core::v1::{Endpoints, EndpointSubset};

use crate::endpoint::{Endpoint, SharedEndpoint};

/// Port used when no listed port matches the configured name.
const FALLBACK_PORT: u16 = 80;

/// Reduces membership snapshots to the single current forwarding target.
pub struct PrimarySelector {
    service: String,
    port_name: String,
    endpoint: SharedEndpoint,
}

impl PrimarySelector {
    pub fn new(service: &str, port_name: &str, endpoint: SharedEndpoint) -> Self {
        PrimarySelector {
            service: service.to_owned(),
            port_name: port_name.to_owned(),
            endpoint,
        }
    }

    /// Apply one membership snapshot.
    ///
    /// Snapshots with no addresses never change the selection, in particular
    /// they do not clear an existing target.
    pub fn observe(&self, endpoints: &Endpoints) {
        let Some(subset) = listed_subset(endpoints) else {
            log::warn!("service '{}' has no endpoints", self.service);
            return;
        };

        match self.endpoint.get() {
            None => {
                let target = self.select(subset);
                log::info!("initializing endpoint with '{}'", target.full_address());
                self.endpoint.set(target);
            }
            Some(current) if lists_address(subset, &current.address) => {
                log::debug!("endpoint '{}' is still available", current.address);
            }
            Some(current) => {
                let target = self.select(subset);
                log::info!(
                    "endpoint '{}' is no longer listed, switching to '{}'",
                    current.full_address(),
                    target.full_address()
                );
                self.endpoint.set(target);
            }
        }
    }

    /// First-listed address in source delivery order, with the port resolved
    /// by name. Callers must have checked that the subset lists addresses.
    fn select(&self, subset: &EndpointSubset) -> Endpoint {
        let addresses = subset.addresses.as_deref().unwrap_or_default();
        Endpoint::new(
            addresses[0].ip.clone(),
            resolve_port(subset, &self.port_name),
        )
    }
}

/// The subset a snapshot is read from, or `None` when the snapshot counts as
/// having no endpoints. Only the first subset is consulted.
fn listed_subset(endpoints: &Endpoints) -> Option<&EndpointSubset> {
    let subset = endpoints.subsets.as_deref()?.first()?;
    match subset.addresses.as_deref() {
        Some(addresses) if !addresses.is_empty() => Some(subset),
        _ => None,
    }
}

fn lists_address(subset: &EndpointSubset, address: &str) -> bool {
    subset
        .addresses
        .iter()
        .flatten()
        .any(|listed| listed.ip == address)
}

/// Resolve the numeric port for the configured port name. Later entries with
/// the same name override earlier ones; entries outside the valid port range
/// cannot win.
fn resolve_port(subset: &EndpointSubset, name: &str) -> u16 {
    let mut found = FALLBACK_PORT;
    for port in subset.ports.iter().flatten() {
        if port.name.as_deref() == Some(name) {
            if let Ok(numeric) = u16::try_from(port.port) {
                found = numeric;
            }
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{EndpointAddress, EndpointPort};

    fn snapshot(addresses: &[&str], ports: &[(Option<&str>, i32)]) -> Endpoints {
        Endpoints {
            subsets: Some(vec![EndpointSubset {
                addresses: Some(
                    addresses
                        .iter()
                        .map(|ip| EndpointAddress {
                            ip: ip.to_string(),
                            ..Default::default()
                        })
                        .collect(),
                ),
                ports: Some(
                    ports
                        .iter()
                        .map(|(name, port)| EndpointPort {
                            name: name.map(str::to_owned),
                            port: *port,
                            ..Default::default()
                        })
                        .collect(),
                ),
                ..Default::default()
            }]),
            ..Default::default()
        }
    }

    fn selector(endpoint: &SharedEndpoint) -> PrimarySelector {
        PrimarySelector::new("web", "http", endpoint.clone())
    }

    #[test]
    fn first_snapshot_selects_first_listed_address() {
        let shared = SharedEndpoint::new();
        selector(&shared).observe(&snapshot(
            &["10.0.0.5", "10.0.0.6"],
            &[(Some("http"), 8080)],
        ));
        assert_eq!(shared.get(), Some(Endpoint::new("10.0.0.5", 8080)));
    }

    #[test]
    fn selection_is_sticky_while_address_stays_listed() {
        let shared = SharedEndpoint::new();
        let selector = selector(&shared);
        selector.observe(&snapshot(&["10.0.0.5"], &[(Some("http"), 80)]));

        // Unrelated changes: new replicas ahead of the current one, a changed
        // port mapping. The pair must stay exactly as selected.
        selector.observe(&snapshot(
            &["10.0.0.9", "10.0.0.5", "10.0.0.7"],
            &[(Some("http"), 9090)],
        ));
        assert_eq!(shared.get(), Some(Endpoint::new("10.0.0.5", 80)));
    }

    #[test]
    fn failover_picks_first_listed_replacement() {
        let shared = SharedEndpoint::new();
        let selector = selector(&shared);
        selector.observe(&snapshot(&["10.0.0.5"], &[(Some("http"), 80)]));

        selector.observe(&snapshot(
            &["10.0.0.6", "10.0.0.7"],
            &[(Some("http"), 8080)],
        ));
        assert_eq!(shared.get(), Some(Endpoint::new("10.0.0.6", 8080)));
    }

    #[test]
    fn empty_snapshot_is_ignored_while_unset() {
        let shared = SharedEndpoint::new();
        selector(&shared).observe(&snapshot(&[], &[]));
        assert_eq!(shared.get(), None);
    }

    #[test]
    fn empty_snapshot_keeps_existing_target() {
        let shared = SharedEndpoint::new();
        let selector = selector(&shared);
        selector.observe(&snapshot(&["10.0.0.5"], &[(Some("http"), 80)]));

        selector.observe(&snapshot(&[], &[]));
        assert_eq!(shared.get(), Some(Endpoint::new("10.0.0.5", 80)));
    }

    #[test]
    fn missing_subsets_count_as_no_endpoints() {
        let shared = SharedEndpoint::new();
        selector(&shared).observe(&Endpoints::default());
        assert_eq!(shared.get(), None);
    }

    #[test]
    fn last_matching_port_name_wins() {
        let shared = SharedEndpoint::new();
        selector(&shared).observe(&snapshot(
            &["10.0.0.5"],
            &[
                (Some("https"), 443),
                (Some("http"), 8080),
                (Some("http"), 9090),
            ],
        ));
        assert_eq!(shared.get(), Some(Endpoint::new("10.0.0.5", 9090)));
    }

    #[test]
    fn unmatched_port_names_fall_back_to_80() {
        let shared = SharedEndpoint::new();
        selector(&shared).observe(&snapshot(
            &["10.0.0.5"],
            &[(Some("https"), 443), (None, 9000)],
        ));
        assert_eq!(shared.get(), Some(Endpoint::new("10.0.0.5", 80)));
    }

    #[test]
    fn port_resolution_honors_configured_name() {
        let shared = SharedEndpoint::new();
        let selector = PrimarySelector::new("web", "admin", shared.clone());
        selector.observe(&snapshot(
            &["10.0.0.5"],
            &[(Some("http"), 8080), (Some("admin"), 9443)],
        ));
        assert_eq!(shared.get(), Some(Endpoint::new("10.0.0.5", 9443)));
    }

    #[test]
    fn out_of_range_port_entries_cannot_win() {
        let shared = SharedEndpoint::new();
        selector(&shared).observe(&snapshot(
            &["10.0.0.5"],
            &[(Some("http"), 8080), (Some("http"), 90000)],
        ));
        assert_eq!(shared.get(), Some(Endpoint::new("10.0.0.5", 8080)));
    }
}
