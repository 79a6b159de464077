//! Tournament Executor (C6): fans one prompt out to many (host, model)
//! pairs concurrently, crowns a champion, and reports a parallel-speedup
//! metric.
//!
//! The only cross-task coordination rule is the **per-host serialization
//! invariant** (§4.6): tasks on the same host run one after another (so a
//! single GPU is never asked to serve two concurrent generations), while
//! hosts themselves run fully in parallel.

use crate::client::GenerationClient;
use crate::types::{Host, HostStatus, Tournament, TournamentResult};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

pub struct TournamentExecutor {
    /// Inventory truncation applied per host when `fast` mode is requested.
    fast_model_cap: usize,
}

impl TournamentExecutor {
    pub fn new() -> Self {
        Self { fast_model_cap: 3 }
    }

    /// Runs a tournament across `hosts`. `models` restricts the candidate
    /// set to its intersection with each host's inventory; `None` uses the
    /// whole inventory (truncated to `fast_model_cap` entries if `fast`).
    pub async fn run(
        &self,
        prompt: &str,
        hosts: &[HostStatus],
        models: Option<&[String]>,
        fast: bool,
        cancel: CancellationToken,
    ) -> Tournament {
        let wall_start = Instant::now();

        let online: Vec<&HostStatus> = hosts.iter().filter(|h| h.online).collect();

        let per_host_futures = online.into_iter().map(|status| {
            let effective = self.effective_models(status, models, fast);
            self.run_host_sequentially(status.host.clone(), effective, prompt, cancel.clone())
        });

        let mut results: Vec<TournamentResult> = futures::future::join_all(per_host_futures)
            .await
            .into_iter()
            .flatten()
            .collect();

        let wall_clock = wall_start.elapsed();

        // Ascending duration, errors last; stable within equal durations.
        results.sort_by(|a, b| match (a.error.is_some(), b.error.is_some()) {
            (false, true) => std::cmp::Ordering::Less,
            (true, false) => std::cmp::Ordering::Greater,
            _ => a.duration.cmp(&b.duration),
        });

        let champion_index = results.iter().position(|r| r.error.is_none());

        Tournament {
            prompt: prompt.to_string(),
            results,
            champion_index,
            wall_clock,
        }
    }

    fn effective_models(&self, status: &HostStatus, models: Option<&[String]>, fast: bool) -> Vec<String> {
        let inventory: Vec<String> = status.models.iter().map(|m| m.name.clone()).collect();

        let mut effective = match models {
            Some(requested) => inventory.into_iter().filter(|m| requested.contains(m)).collect(),
            None => inventory,
        };

        if fast {
            effective.truncate(self.fast_model_cap);
        }

        effective
    }

    /// Issues one generation per model on `host`, one at a time — the
    /// per-host serialization invariant.
    async fn run_host_sequentially(
        &self,
        host: Host,
        models: Vec<String>,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Vec<TournamentResult> {
        let mut results = Vec::with_capacity(models.len());

        let client = match GenerationClient::new(&host.base_url) {
            Ok(c) => c,
            Err(e) => {
                for model in models {
                    results.push(TournamentResult {
                        host: host.name.clone(),
                        model,
                        response: String::new(),
                        duration: Duration::ZERO,
                        eval_count: 0,
                        error: Some(e.to_string()),
                    });
                }
                return results;
            }
        };

        for model in models {
            if cancel.is_cancelled() {
                break;
            }

            let start = Instant::now();
            let run = tokio::select! {
                _ = cancel.cancelled() => None,
                r = client.generate_with_stats(&model, prompt) => Some(r),
            };

            match run {
                None => break,
                Some(Ok(outcome)) => {
                    results.push(TournamentResult {
                        host: host.name.clone(),
                        model,
                        response: outcome.text,
                        duration: start.elapsed(),
                        eval_count: outcome.eval_count,
                        error: None,
                    });
                }
                Some(Err(e)) => {
                    results.push(TournamentResult {
                        host: host.name.clone(),
                        model,
                        response: String::new(),
                        duration: start.elapsed(),
                        eval_count: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        results
    }
}

impl Default for TournamentExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ModelEntry;
    use std::time::SystemTime;

    fn model(name: &str) -> ModelEntry {
        ModelEntry {
            name: name.to_string(),
            size: 0,
            parameter_size: String::new(),
            quantization_level: String::new(),
        }
    }

    fn offline_status(name: &str) -> HostStatus {
        HostStatus::offline(Host::new(name, format!("http://{name}:11434")), "down")
    }

    #[tokio::test]
    async fn test_run_skips_offline_hosts_entirely() {
        let executor = TournamentExecutor::new();
        let statuses = vec![offline_status("dead")];
        let result = executor.run("hi", &statuses, None, false, CancellationToken::new()).await;
        assert!(result.results.is_empty());
        assert!(result.champion_index.is_none());
    }

    #[test]
    fn test_effective_models_intersects_requested_with_inventory() {
        let executor = TournamentExecutor::new();
        let status = HostStatus::online(
            Host::new("a", "http://a:11434"),
            Duration::from_millis(1),
            "0.1".to_string(),
            vec![model("m1"), model("m2"), model("m3")],
        );
        let requested = vec!["m1".to_string(), "m3".to_string(), "m9".to_string()];
        let effective = executor.effective_models(&status, Some(&requested), false);
        assert_eq!(effective, vec!["m1".to_string(), "m3".to_string()]);
    }

    #[test]
    fn test_effective_models_fast_mode_truncates() {
        let executor = TournamentExecutor::new();
        let status = HostStatus::online(
            Host::new("a", "http://a:11434"),
            Duration::from_millis(1),
            "0.1".to_string(),
            vec![model("m1"), model("m2"), model("m3"), model("m4")],
        );
        let effective = executor.effective_models(&status, None, true);
        assert_eq!(effective.len(), 3);
    }

    #[test]
    fn test_tournament_champion_is_first_error_free_after_sort() {
        let mut results = vec![
            TournamentResult {
                host: "a".to_string(),
                model: "slow".to_string(),
                response: "x".to_string(),
                duration: Duration::from_millis(200),
                eval_count: 10,
                error: None,
            },
            TournamentResult {
                host: "b".to_string(),
                model: "failed".to_string(),
                response: String::new(),
                duration: Duration::from_millis(50),
                eval_count: 0,
                error: Some("timed out".to_string()),
            },
            TournamentResult {
                host: "c".to_string(),
                model: "fast".to_string(),
                response: "y".to_string(),
                duration: Duration::from_millis(100),
                eval_count: 10,
                error: None,
            },
        ];
        results.sort_by(|a, b| match (a.error.is_some(), b.error.is_some()) {
            (false, true) => std::cmp::Ordering::Less,
            (true, false) => std::cmp::Ordering::Greater,
            _ => a.duration.cmp(&b.duration),
        });
        let champion_index = results.iter().position(|r| r.error.is_none());
        assert_eq!(champion_index, Some(0));
        assert_eq!(results[0].model, "fast");
    }

    #[test]
    fn test_parallel_speedup_above_one_for_concurrent_hosts() {
        let tournament = Tournament {
            prompt: "hi".to_string(),
            results: vec![
                TournamentResult {
                    host: "a".to_string(),
                    model: "m1".to_string(),
                    response: "x".to_string(),
                    duration: Duration::from_millis(100),
                    eval_count: 1,
                    error: None,
                },
                TournamentResult {
                    host: "b".to_string(),
                    model: "m2".to_string(),
                    response: "y".to_string(),
                    duration: Duration::from_millis(100),
                    eval_count: 1,
                    error: None,
                },
            ],
            champion_index: Some(0),
            wall_clock: Duration::from_millis(110),
        };
        assert!(tournament.parallel_speedup() > 1.0);
    }
}
