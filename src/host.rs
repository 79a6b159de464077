//! Host Registry & Probe (C2): tracks the declared fleet, caches a
//! [`GenerationClient`] per host, and refreshes online/offline state and
//! inventory by probing each host concurrently.
//!
//! The registry never mutates a [`HostStatus`] in place — each probe produces
//! a fresh one, which replaces whatever was there before. A host that fails
//! to respond is recorded as offline with the failure reason rather than
//! being dropped from the registry; offline hosts still count as "known" for
//! `clood hosts` to report on.
//!
//! There is no background probe loop (§4.2): probing only ever happens on
//! demand, driven by a CLI command or a routing call.

use crate::client::GenerationClient;
use crate::types::{Host, HostStatus};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// One result from [`HostRegistry::check_all_hosts_streaming`], tagged with
/// its position in the declared fleet so a consumer can reassemble
/// declaration order even though completion order is unconstrained.
#[derive(Debug)]
pub struct IndexedStatus {
    pub index: usize,
    pub status: HostStatus,
}

/// Tracks a declared fleet, its last-probed status, and a cache of
/// per-host [`GenerationClient`]s.
///
/// The client cache is the one piece of shared mutable state the registry
/// exposes across task boundaries (§5); it's read-mostly and guarded by a
/// single mutex rather than handed out as `&mut`.
pub struct HostRegistry {
    hosts: Vec<Host>,
    probe_timeout: Duration,
    clients: Mutex<HashMap<String, GenerationClient>>,
}

impl HostRegistry {
    pub fn new(hosts: Vec<Host>) -> Self {
        Self {
            hosts,
            probe_timeout: Duration::from_secs(3),
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Adds hosts to the declared fleet, skipping names already present.
    pub fn add_hosts(&mut self, hosts: impl IntoIterator<Item = Host>) {
        for host in hosts {
            if !self.hosts.iter().any(|h| h.name == host.name) {
                self.hosts.push(host);
            }
        }
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn get_host(&self, name: &str) -> Option<&Host> {
        self.hosts.iter().find(|h| h.name == name)
    }

    pub fn get_all_hosts(&self) -> &[Host] {
        &self.hosts
    }

    /// Returns the cached client for `name`, constructing and caching one
    /// on first use. The cache is keyed by host name, not base URL, so a
    /// reconfigured host (same name, new URL) must go through a fresh
    /// registry rather than mutate the cache in place.
    pub fn get_client(&self, name: &str) -> crate::Result<GenerationClient> {
        let host = self
            .get_host(name)
            .ok_or_else(|| crate::Error::no_host(format!("no such declared host: {name}")))?;

        let mut clients = self.clients.lock().expect("client cache mutex poisoned");
        if let Some(client) = clients.get(name) {
            return Ok(client.clone());
        }

        let client = GenerationClient::new(&host.base_url)?.with_probe_timeout(self.probe_timeout);
        clients.insert(name.to_string(), client.clone());
        Ok(client)
    }

    /// Probes every declared host concurrently and returns a fresh status
    /// for each, in declaration order. One slow or dead host never blocks
    /// the others — each probe races its own deadline independently.
    pub async fn check_all_hosts(&self) -> Vec<HostStatus> {
        let futures = self.hosts.iter().map(|h| self.check_host(h.clone()));
        join_all(futures).await
    }

    /// Same probe set as [`Self::check_all_hosts`], but results are sent to
    /// the returned channel in completion order rather than collected into
    /// a batch, each tagged with its declaration index (§4.2, scenario S2).
    pub fn check_all_hosts_streaming(&self) -> mpsc::Receiver<IndexedStatus> {
        let (tx, rx) = mpsc::channel(self.hosts.len().max(1));

        for (index, host) in self.hosts.iter().cloned().enumerate() {
            let tx = tx.clone();
            let probe_timeout = self.probe_timeout;
            tokio::spawn(async move {
                let status = probe_host(host, probe_timeout).await;
                let _ = tx.send(IndexedStatus { index, status }).await;
            });
        }

        rx
    }

    /// Probes a single host: `version` then `list_models`, both bounded by
    /// the registry's probe deadline. Any failure — timeout, connection
    /// refused, malformed response — yields an offline status carrying the
    /// reason. Idempotent and side-effect-free apart from client-cache
    /// population.
    pub async fn check_host(&self, host: Host) -> HostStatus {
        let _ = self.get_client(&host.name);
        probe_host(host, self.probe_timeout).await
    }

    /// Among `statuses`, the online host with the lowest latency; ties
    /// broken by declaration order (the order `statuses` is already in,
    /// per §4.2's best-host rule).
    pub fn best_host<'a>(&self, statuses: &'a [HostStatus]) -> Option<&'a HostStatus> {
        statuses.iter().filter(|s| s.online).min_by_key(|s| s.latency)
    }

    /// Online hosts whose inventory lists `model` by exact name, sorted by
    /// ascending latency (§4.2's `FindModel`).
    pub fn find_model<'a>(&self, model: &str, statuses: &'a [HostStatus]) -> Vec<&'a HostStatus> {
        let mut matches: Vec<&HostStatus> = statuses.iter().filter(|s| s.serves(model)).collect();
        matches.sort_by_key(|s| s.latency);
        matches
    }

    /// The inverse capability index: every known model name mapped to the
    /// names of the online hosts that serve it, in latency order
    /// (§4.2's `GetAllModels`).
    pub fn get_all_models(&self, statuses: &[HostStatus]) -> HashMap<String, Vec<String>> {
        let mut sorted: Vec<&HostStatus> = statuses.iter().filter(|s| s.online).collect();
        sorted.sort_by_key(|s| s.latency);

        let mut out: HashMap<String, Vec<String>> = HashMap::new();
        for status in sorted {
            for model in &status.models {
                out.entry(model.name.clone()).or_default().push(status.host.name.clone());
            }
        }
        out
    }

    /// Applies the local-alias heuristic (§4.2, §9 open question): when a
    /// host named `localhost` is present alongside `other`, they're treated
    /// as the same machine if either the machine's own short hostname
    /// matches `other`'s declared name, or `other`'s (version, model-count)
    /// tuple matches `localhost`'s. This never affects routing — it's a
    /// display hint only, and both records stay in the registry regardless.
    pub fn detect_local_alias(localhost: &HostStatus, other: &HostStatus) -> bool {
        if let Ok(short) = hostname::get() {
            if let Some(short) = short.to_str() {
                if short.eq_ignore_ascii_case(&other.host.name) {
                    return true;
                }
            }
        }

        localhost.online
            && other.online
            && localhost.version == other.version
            && localhost.models.len() == other.models.len()
    }

    /// Whether `host`'s base URL resolves to loopback
    /// (`localhost`/`127.0.0.1`/`::1`). A display/diagnostic heuristic only
    /// — it never affects routing decisions.
    pub fn is_local(host: &Host) -> bool {
        let url = &host.base_url;
        url.contains("://localhost") || url.contains("://127.0.0.1") || url.contains("://[::1]")
    }
}

async fn probe_host(host: Host, probe_timeout: Duration) -> HostStatus {
    let start = Instant::now();

    let client = match GenerationClient::new(&host.base_url) {
        Ok(c) => c.with_probe_timeout(probe_timeout),
        Err(e) => return HostStatus::offline(host, e.to_string()),
    };

    let version = match client.version().await {
        Ok(v) => v,
        Err(e) => return HostStatus::offline(host, e.to_string()),
    };

    let models = match client.list_models().await {
        Ok(m) => m,
        Err(e) => return HostStatus::offline(host, e.to_string()),
    };

    HostStatus::online(host, start.elapsed(), version, models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelEntry;
    use std::time::SystemTime;

    fn model(name: &str) -> ModelEntry {
        ModelEntry { name: name.to_string(), size: 0, parameter_size: String::new(), quantization_level: String::new() }
    }

    fn online(name: &str, latency_ms: u64, models: Vec<&str>) -> HostStatus {
        HostStatus {
            host: Host::new(name, format!("http://{name}:11434")),
            online: true,
            latency: Duration::from_millis(latency_ms),
            version: "0.1.0".to_string(),
            models: models.into_iter().map(model).collect(),
            error: None,
            probed_at: SystemTime::now(),
        }
    }

    #[test]
    fn test_is_local_detects_loopback_variants() {
        assert!(HostRegistry::is_local(&Host::new("a", "http://localhost:11434")));
        assert!(HostRegistry::is_local(&Host::new("b", "http://127.0.0.1:11434")));
        assert!(HostRegistry::is_local(&Host::new("c", "http://[::1]:11434")));
    }

    #[test]
    fn test_is_local_rejects_remote_hosts() {
        assert!(!HostRegistry::is_local(&Host::new("d", "http://gpu-box.lan:11434")));
        assert!(!HostRegistry::is_local(&Host::new("e", "http://10.0.0.5:11434")));
    }

    #[tokio::test]
    async fn test_check_host_unreachable_host_is_offline() {
        let registry = HostRegistry::new(vec![]).with_probe_timeout(Duration::from_millis(200));
        let host = Host::new("dead", "http://127.0.0.1:1");
        let status = registry.check_host(host).await;
        assert!(!status.online);
        assert!(status.error.is_some());
    }

    #[tokio::test]
    async fn test_check_all_hosts_empty_registry_returns_empty() {
        let registry = HostRegistry::new(vec![]);
        assert!(registry.check_all_hosts().await.is_empty());
    }

    #[test]
    fn test_hosts_accessor_preserves_declaration_order() {
        let registry = HostRegistry::new(vec![
            Host::new("a", "http://localhost:11434"),
            Host::new("b", "http://localhost:11435"),
        ]);
        assert_eq!(registry.hosts()[0].name, "a");
        assert_eq!(registry.hosts()[1].name, "b");
    }

    #[test]
    fn test_add_hosts_skips_duplicate_names() {
        let mut registry = HostRegistry::new(vec![Host::new("a", "http://a:11434")]);
        registry.add_hosts(vec![Host::new("a", "http://different:11434"), Host::new("b", "http://b:11434")]);
        assert_eq!(registry.hosts().len(), 2);
        assert_eq!(registry.get_host("a").unwrap().base_url, "http://a:11434");
    }

    #[test]
    fn test_get_client_is_cached_across_calls() {
        let registry = HostRegistry::new(vec![Host::new("a", "http://localhost:11434")]);
        let c1 = registry.get_client("a").unwrap();
        let c2 = registry.get_client("a").unwrap();
        assert_eq!(c1.base_url(), c2.base_url());
    }

    #[test]
    fn test_get_client_unknown_host_is_no_host() {
        let registry = HostRegistry::new(vec![]);
        let err = registry.get_client("missing").unwrap_err();
        assert_eq!(err.kind(), "no_host");
    }

    #[test]
    fn test_best_host_picks_lowest_latency() {
        let registry = HostRegistry::new(vec![]);
        let statuses = vec![online("slow", 50, vec!["m"]), online("fast", 5, vec!["m"])];
        assert_eq!(registry.best_host(&statuses).unwrap().host.name, "fast");
    }

    #[test]
    fn test_best_host_ignores_offline() {
        let registry = HostRegistry::new(vec![]);
        let offline = HostStatus::offline(Host::new("down", "http://down:11434"), "timeout");
        let statuses = vec![offline];
        assert!(registry.best_host(&statuses).is_none());
    }

    #[test]
    fn test_find_model_sorted_by_latency() {
        let registry = HostRegistry::new(vec![]);
        let statuses = vec![online("b", 50, vec!["llama3:8b"]), online("a", 5, vec!["llama3:8b"])];
        let found = registry.find_model("llama3:8b", &statuses);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].host.name, "a");
    }

    #[test]
    fn test_get_all_models_builds_inverse_index_in_latency_order() {
        let registry = HostRegistry::new(vec![]);
        let statuses = vec![online("b", 50, vec!["m1"]), online("a", 5, vec!["m1"])];
        let index = registry.get_all_models(&statuses);
        assert_eq!(index.get("m1").unwrap(), &vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_detect_local_alias_matches_on_version_and_model_count() {
        let localhost = online("localhost", 1, vec!["m1", "m2"]);
        let other = online("gpu-box", 10, vec!["m1", "m2"]);
        assert!(HostRegistry::detect_local_alias(&localhost, &other));
    }

    #[test]
    fn test_detect_local_alias_false_on_mismatched_inventory() {
        let localhost = online("localhost", 1, vec!["m1"]);
        let other = online("gpu-box", 10, vec!["m1", "m2"]);
        assert!(!HostRegistry::detect_local_alias(&localhost, &other));
    }
}
