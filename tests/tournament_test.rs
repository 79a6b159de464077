//! Tournament Executor (C6) integration test covering scenario S4: two
//! hosts, two models each, one (host, model) pair fails. The champion must
//! come from a surviving pair and the parallel-speedup factor must exceed
//! the slowest single serialized host.

use clood::{Host, HostStatus, Tournament, TournamentExecutor};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ndjson_ok(text: &str) -> ResponseTemplate {
    let body = format!("{{\"response\":{text:?},\"done\":false}}\n{{\"response\":\"\",\"done\":true,\"eval_count\":1}}\n");
    ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson")
}

fn model_entry(name: &str) -> clood::ModelEntry {
    clood::ModelEntry {
        name: name.to_string(),
        size: 0,
        parameter_size: String::new(),
        quantization_level: String::new(),
    }
}

#[tokio::test]
async fn tournament_run_across_two_hosts_survives_one_failing_pair_scenario_s4() {
    let host_a = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({"model": "alpha"})))
        .respond_with(ndjson_ok("from alpha on a"))
        .mount(&host_a)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({"model": "beta"})))
        .respond_with(ndjson_ok("from beta on a"))
        .mount(&host_a)
        .await;

    let host_b = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({"model": "alpha"})))
        .respond_with(ndjson_ok("from alpha on b"))
        .mount(&host_b)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({"model": "beta"})))
        .respond_with(ResponseTemplate::new(500))
        .mount(&host_b)
        .await;

    let statuses = vec![
        HostStatus::online(
            Host::new("a", host_a.uri()),
            Duration::from_millis(1),
            "0.1".to_string(),
            vec![model_entry("alpha"), model_entry("beta")],
        ),
        HostStatus::online(
            Host::new("b", host_b.uri()),
            Duration::from_millis(1),
            "0.1".to_string(),
            vec![model_entry("alpha"), model_entry("beta")],
        ),
    ];

    let executor = TournamentExecutor::new();
    let result: Tournament = executor
        .run("hi", &statuses, None, false, tokio_util::sync::CancellationToken::new())
        .await;

    assert_eq!(result.results.len(), 4);
    let failed = result.results.iter().filter(|r| r.error.is_some()).count();
    assert_eq!(failed, 1);

    let champion = result.champion_index.expect("a champion must be crowned");
    assert!(result.results[champion].error.is_none());
    assert_eq!(result.results[champion].host, "b");
    assert_eq!(result.results[champion].model, "alpha");

    assert!(result.parallel_speedup() > 1.0);
}
