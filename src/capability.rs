//! Capability Index (C3): a model-name → hosts-that-serve-it lookup built
//! fresh from the registry's latest probe results.
//!
//! The index is a point-in-time snapshot, not a live view — it's rebuilt
//! from a `&[HostStatus]` slice every time the router needs one, which keeps
//! it trivially consistent with whatever probe data produced it.

use crate::types::{Host, HostStatus};
use std::collections::HashMap;

/// Maps exact model names to the online hosts that serve them.
#[derive(Debug, Default)]
pub struct CapabilityIndex {
    by_model: HashMap<String, Vec<Host>>,
}

impl CapabilityIndex {
    /// Builds an index from a set of probe results. Offline hosts contribute
    /// nothing — only a host's inventory at the moment it was last seen
    /// online counts.
    pub fn build(statuses: &[HostStatus]) -> Self {
        let mut online: Vec<&HostStatus> = statuses.iter().filter(|s| s.online).collect();
        online.sort_by(|a, b| a.latency.cmp(&b.latency));

        let mut by_model: HashMap<String, Vec<Host>> = HashMap::new();

        for status in online {
            for model in &status.models {
                by_model
                    .entry(model.name.clone())
                    .or_default()
                    .push(status.host.clone());
            }
        }

        Self { by_model }
    }

    /// Hosts serving `model`, in ascending latency order. Empty if no
    /// online host serves it.
    pub fn hosts_for(&self, model: &str) -> &[Host] {
        self.by_model.get(model).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn serves(&self, model: &str) -> bool {
        !self.hosts_for(model).is_empty()
    }

    /// Every distinct model name known to be served by at least one online
    /// host, in no particular order.
    pub fn known_models(&self) -> Vec<&str> {
        self.by_model.keys().map(String::as_str).collect()
    }

    /// The first model from the first online host's inventory, used by the
    /// router's final fallback step (§4.5 step 3) when a preferred model
    /// isn't served anywhere.
    pub fn any_model(&self, statuses: &[HostStatus]) -> Option<(String, Host)> {
        statuses
            .iter()
            .find(|s| s.online && !s.models.is_empty())
            .map(|s| (s.models[0].name.clone(), s.host.clone()))
    }
}
