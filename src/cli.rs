//! Command-line surface (§6). Thin by design: every subcommand loads
//! configuration, drives the library components, and renders either a
//! human-readable summary or a single JSON line on stdout. All of the
//! interesting behavior lives in the core modules this file only wires
//! together.

use std::io::{Read, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::tools::{read_file_tool, shell_execute_tool};
use crate::types::HostStatus;
use crate::{
    Agent, Classifier, Config, Error, HostRegistry, Result, Router, Saga, SlashOutcome, Tier,
    TournamentExecutor,
};

#[derive(Parser, Debug)]
#[command(name = "clood", version, about = "Dispatch prompts across a fleet of self-hosted inference hosts")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the YAML config file. Defaults to `~/.config/clood/config.yaml`,
    /// falling back to programmatic defaults if it doesn't exist.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// One-shot routed generation.
    Ask {
        prompt: Option<String>,
        #[arg(long)]
        tier: Option<u8>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        no_stream: bool,
        #[arg(long)]
        no_context: bool,
        #[arg(long)]
        show_route: bool,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        stdin: bool,
    },
    /// Probe all declared hosts and print status.
    Hosts {
        #[arg(long)]
        json: bool,
    },
    /// Capability index: which hosts serve which models.
    Models {
        #[arg(long)]
        json: bool,
        #[arg(long)]
        host: Option<String>,
    },
    /// Environment summary.
    Preflight {
        #[arg(long)]
        json: bool,
    },
    /// Parallel fan-out across every capable host ("thunderdome").
    Tournament {
        prompt: String,
        #[arg(long, value_delimiter = ',')]
        hosts: Option<Vec<String>>,
        #[arg(long, value_delimiter = ',')]
        models: Option<Vec<String>>,
        #[arg(long)]
        fast: bool,
        #[arg(long)]
        top: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Streams a primary model, dispatching embedded sub-queries to expert
    /// models, reading one prompt per line from stdin until EOF.
    Inception {
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        expert: Option<String>,
    },
    /// Saga REPL for the current directory.
    Chat,
    /// Tool-calling loop.
    Agent {
        prompt: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        max_turns: Option<u32>,
        #[arg(long)]
        verbose: bool,
        #[arg(long)]
        json: bool,
    },
}

/// Runs the parsed CLI and returns the process exit status (§6, §7). Never
/// panics on a core error — every `Error` is caught, rendered, and mapped to
/// [`Error::exit_status`].
pub async fn run(cli: Cli) -> i32 {
    let config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => return fail(&e, false),
    };

    let result = match cli.command {
        Commands::Ask { prompt, tier, model, host, no_stream, no_context, show_route, json, stdin } => {
            cmd_ask(&config, prompt, stdin, tier, model, host, no_stream, no_context, show_route, json).await
        }
        Commands::Hosts { json } => cmd_hosts(&config, json).await,
        Commands::Models { json, host } => cmd_models(&config, json, host).await,
        Commands::Preflight { json } => cmd_preflight(&config, json).await,
        Commands::Tournament { prompt, hosts, models, fast, top, json } => {
            cmd_tournament(&config, prompt, hosts, models, fast, top, json).await
        }
        Commands::Inception { model, expert } => cmd_inception(&config, model, expert).await,
        Commands::Chat => cmd_chat(&config).await,
        Commands::Agent { prompt, model, max_turns, verbose, json } => {
            cmd_agent(&config, prompt, model, max_turns, verbose, json).await
        }
    };

    match result {
        Ok(code) => code,
        Err((e, json)) => fail(&e, json),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(p) => Config::load(p),
        None => Config::load_default(),
    }
}

fn fail(err: &Error, json: bool) -> i32 {
    if json {
        println!("{}", json!({ "error": err.to_string(), "kind": err.kind() }));
    } else {
        tracing::error!(kind = err.kind(), "{err}");
    }
    err.exit_status()
}

fn tier_from_ordinal(n: u8) -> Option<Tier> {
    match n {
        1 => Some(Tier::Fast),
        2 => Some(Tier::Deep),
        3 => Some(Tier::Analysis),
        4 => Some(Tier::Writing),
        _ => None,
    }
}

/// Merges the positional prompt with `--stdin` per §7's "empty prompt after
/// stdin merge" edge case: reading stdin is additive, and the merged result
/// must be non-empty.
fn build_prompt(positional: Option<String>, read_stdin: bool) -> Result<String> {
    let mut prompt = positional.unwrap_or_default();

    if read_stdin {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| Error::bad_input(format!("reading stdin: {e}")))?;
        let trimmed = buf.trim();
        if !trimmed.is_empty() {
            if !prompt.is_empty() {
                prompt.push('\n');
            }
            prompt.push_str(trimmed);
        }
    }

    if prompt.trim().is_empty() {
        return Err(Error::bad_input("empty prompt"));
    }

    Ok(prompt)
}

async fn registry_with_statuses(config: &Config) -> (HostRegistry, Vec<HostStatus>) {
    let registry = HostRegistry::new(config.hosts.clone())
        .with_probe_timeout(std::time::Duration::from_millis(config.probe_timeout_ms));
    let statuses = registry.check_all_hosts().await;
    (registry, statuses)
}

type CmdResult = std::result::Result<i32, (Error, bool)>;

#[allow(clippy::too_many_arguments)]
async fn cmd_ask(
    config: &Config,
    prompt: Option<String>,
    stdin: bool,
    tier: Option<u8>,
    model: Option<String>,
    host: Option<String>,
    no_stream: bool,
    no_context: bool,
    show_route: bool,
    json: bool,
) -> CmdResult {
    let prompt = build_prompt(prompt, stdin).map_err(|e| (e, json))?;

    // `ask` is one-shot and never appends to the saga, but it still reads the
    // current project's standing context blob (if any) unless suppressed.
    let project_context = if no_context {
        None
    } else {
        std::env::current_dir()
            .ok()
            .and_then(|dir| Saga::load_or_create(dir).ok().flatten())
            .and_then(|s| s.project_context)
    };

    let forced_tier = match tier {
        Some(n) => match tier_from_ordinal(n) {
            Some(t) => Some(t),
            None => return Err((Error::bad_input(format!("unknown tier: {n}")), json)),
        },
        None => None,
    };

    let (registry, mut statuses) = registry_with_statuses(config).await;

    if let Some(ref name) = host {
        statuses.retain(|s| &s.host.name == name);
    }

    let classifier = Classifier::new();
    let router = Router::new(&classifier, &config.tiers, config.fallback);
    let route = router
        .route(&prompt, forced_tier, model.as_deref(), &statuses)
        .map_err(|e| (e, json))?;

    if show_route {
        if json {
            println!("{}", json!({ "routing": route }));
        } else {
            println!(
                "tier={} model={} host={} confidence={:.2}",
                route.tier, route.model, route.host.name, route.confidence
            );
        }
        return Ok(0);
    }

    let client = registry.get_client(&route.host.name).map_err(|e| (e, json))?;
    let options = config.tier_profile(route.tier).map(|p| p.options.clone());

    let system = project_context.as_deref();

    let text = if no_stream || json {
        // Streaming is a terminal-UX concern; --json collects the full
        // response so the output stays one parseable line.
        client
            .generate_with_options(&route.model, &prompt, system, options)
            .await
            .map_err(|e| (e, json))?
    } else {
        client
            .generate_stream(&route.model, &prompt, system, options, |chunk| {
                print!("{chunk}");
                let _ = std::io::stdout().flush();
            })
            .await
            .map_err(|e| (e, json))?
    };

    if json {
        println!("{}", json!({ "response": text, "routing": route }));
    } else if no_stream {
        println!("{text}");
    } else {
        println!();
    }

    Ok(0)
}

async fn cmd_hosts(config: &Config, json: bool) -> CmdResult {
    let (_registry, statuses) = registry_with_statuses(config).await;
    let any_online = statuses.iter().any(|s| s.online);

    if json {
        println!("{}", json!({ "hosts": statuses }));
    } else {
        for s in &statuses {
            if s.online {
                println!(
                    "{}  online   {:>6.0}ms  {} ({} models)",
                    s.host.name,
                    s.latency.as_secs_f64() * 1000.0,
                    s.version,
                    s.models.len()
                );
            } else {
                println!("{}  offline  {}", s.host.name, s.error.as_deref().unwrap_or("unknown error"));
            }
        }
    }

    Ok(if any_online { 0 } else { 1 })
}

async fn cmd_models(config: &Config, json: bool, host: Option<String>) -> CmdResult {
    let (registry, statuses) = registry_with_statuses(config).await;
    let index = registry.get_all_models(&statuses);

    let filtered: std::collections::HashMap<String, Vec<String>> = match &host {
        Some(name) => index
            .into_iter()
            .filter_map(|(model, hosts)| {
                let hosts: Vec<String> = hosts.into_iter().filter(|h| h == name).collect();
                if hosts.is_empty() { None } else { Some((model, hosts)) }
            })
            .collect(),
        None => index,
    };

    let any = !filtered.is_empty();

    if json {
        println!("{}", json!({ "models": filtered }));
    } else {
        let mut names: Vec<&String> = filtered.keys().collect();
        names.sort();
        for name in names {
            println!("{}: {}", name, filtered[name].join(", "));
        }
    }

    Ok(if any { 0 } else { 1 })
}

async fn cmd_preflight(config: &Config, json: bool) -> CmdResult {
    let (_registry, statuses) = registry_with_statuses(config).await;
    let online_count = statuses.iter().filter(|s| s.online).count();

    if json {
        println!(
            "{}",
            json!({
                "declared_hosts": config.hosts.len(),
                "online_hosts": online_count,
                "fallback": config.fallback,
                "tiers": config.tiers.len(),
            })
        );
    } else {
        println!(
            "{} of {} declared hosts online; fallback={}; {} tier(s) configured",
            online_count,
            config.hosts.len(),
            config.fallback,
            config.tiers.len()
        );
    }

    Ok(0)
}

#[allow(clippy::too_many_arguments)]
async fn cmd_tournament(
    config: &Config,
    prompt: String,
    hosts: Option<Vec<String>>,
    models: Option<Vec<String>>,
    fast: bool,
    top: Option<usize>,
    json: bool,
) -> CmdResult {
    let (_registry, mut statuses) = registry_with_statuses(config).await;

    if let Some(names) = &hosts {
        statuses.retain(|s| names.contains(&s.host.name));
    }

    let executor = TournamentExecutor::new();
    let mut tournament = executor
        .run(&prompt, &statuses, models.as_deref(), fast, CancellationToken::new())
        .await;

    if let Some(n) = top {
        tournament.results.truncate(n);
        tournament.champion_index = tournament.results.iter().position(|r| r.error.is_none());
    }

    let any_success = tournament.results.iter().any(|r| r.error.is_none());

    if json {
        println!(
            "{}",
            json!({
                "prompt": tournament.prompt,
                "results": tournament.results,
                "champion": tournament.champion(),
                "parallel_speedup": tournament.parallel_speedup(),
            })
        );
    } else {
        for r in &tournament.results {
            match &r.error {
                Some(e) => println!("{}/{}: error: {}", r.host, r.model, e),
                None => println!(
                    "{}/{}: {:.1} tok/s ({:?})",
                    r.host,
                    r.model,
                    r.tokens_per_second(),
                    r.duration
                ),
            }
        }
        if let Some(champ) = tournament.champion() {
            println!("champion: {}/{}", champ.host, champ.model);
        }
        println!("parallel speedup: {:.2}x", tournament.parallel_speedup());
    }

    Ok(if any_success { 0 } else { 1 })
}

async fn cmd_inception(config: &Config, model: Option<String>, expert: Option<String>) -> CmdResult {
    let (registry, statuses) = registry_with_statuses(config).await;

    let primary_host = statuses
        .iter()
        .find(|s| s.online)
        .ok_or_else(|| (Error::no_host("no online host available"), false))?;
    let primary_model = model.unwrap_or_else(|| {
        config.tier_profile(Tier::Deep).map(|p| p.preferred_model.clone()).unwrap_or_default()
    });
    let primary_client = registry.get_client(&primary_host.host.name).map_err(|e| (e, false))?;

    let expert_host_name = expert
        .or_else(|| config.inception.expert_host.clone())
        .or_else(|| registry.best_host(&statuses).map(|s| s.host.name.clone()))
        .ok_or_else(|| (Error::no_host("no online host available for expert calls"), false))?;
    let expert_client = registry.get_client(&expert_host_name).map_err(|e| (e, false))?;

    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = stdin.read_line(&mut line).map_err(|e| (Error::bad_input(e.to_string()), false))?;
        if bytes_read == 0 {
            break;
        }
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }

        let cancel = CancellationToken::new();
        let result = crate::run_inception(
            &primary_client,
            &primary_model,
            prompt,
            &expert_client,
            &config.inception.aliases,
            cancel,
            |event| print_inception_event(&event),
        )
        .await;

        match result {
            Ok((_, expert_answers)) => {
                println!();
                if config.inception.auto_continuation && !expert_answers.is_empty() {
                    let continuation = crate::build_continuation_message(&expert_answers);
                    let reply = primary_client
                        .generate_stream(&primary_model, &continuation, None, None, |chunk| {
                            print!("{chunk}");
                            let _ = std::io::stdout().flush();
                        })
                        .await;
                    match reply {
                        Ok(_) => println!(),
                        Err(e) => tracing::error!(kind = e.kind(), "{e}"),
                    }
                }
            }
            Err(e) => tracing::error!(kind = e.kind(), "{e}"),
        }
    }

    Ok(0)
}

fn print_inception_event(event: &crate::InceptionEvent) {
    match event {
        crate::InceptionEvent::Text(t) => {
            print!("{t}");
            let _ = std::io::stdout().flush();
        }
        crate::InceptionEvent::SubQueryStart { alias, model, prompt } => {
            eprintln!("\n[expert:{alias} -> {model}] {prompt}");
        }
        crate::InceptionEvent::SubQueryChunk(c) => {
            eprint!("{c}");
        }
        crate::InceptionEvent::SubQueryEnd => {
            eprintln!();
        }
    }
}

async fn cmd_chat(config: &Config) -> CmdResult {
    let project_path = std::env::current_dir().map_err(|e| (Error::Io(e), false))?;
    let mut saga = match Saga::load_or_create(&project_path).map_err(|e| (e, false))? {
        Some(saga) => saga,
        None => {
            println!("saga disabled for this project (.cloodignore present)");
            return Ok(0);
        }
    };

    let (registry, statuses) = registry_with_statuses(config).await;
    let classifier = Classifier::new();
    let router = Router::new(&classifier, &config.tiers, config.fallback);

    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        line.clear();
        let bytes_read = stdin.read_line(&mut line).map_err(|e| (Error::Io(e), false))?;
        if bytes_read == 0 {
            break;
        }
        let input = line.trim_end();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            match saga.handle_slash(input, config.saga.context_ceiling) {
                Ok(Some(SlashOutcome::Quit)) => break,
                Ok(Some(SlashOutcome::Saved(path))) => println!("saved to {}", path.display()),
                Ok(Some(SlashOutcome::Cleared)) => println!("history cleared"),
                Ok(Some(SlashOutcome::Stats(stats))) => println!(
                    "{} messages, {}/{} tokens ({:.0}%)",
                    stats.message_count,
                    stats.total_tokens,
                    stats.max_tokens,
                    stats.usage_percent
                ),
                Ok(Some(SlashOutcome::ContextShown(ctx))) => {
                    println!("{}", ctx.unwrap_or_else(|| "(no project context set)".to_string()))
                }
                Ok(Some(SlashOutcome::Help(text))) => println!("{text}"),
                Ok(None) => {}
                Err(e) => tracing::error!(kind = e.kind(), "{e}"),
            }
            continue;
        }

        saga.append_user(input);

        let route = match router.route(input, None, None, &statuses) {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(kind = e.kind(), "{e}");
                continue;
            }
        };

        let client = match registry.get_client(&route.host.name) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(kind = e.kind(), "{e}");
                continue;
            }
        };

        let options = config.tier_profile(route.tier).map(|p| p.options.clone());
        let messages = saga.assemble_prompt(config.saga.history_window);
        let system = messages
            .iter()
            .find(|m| matches!(m.role, crate::MessageRole::System))
            .map(|m| m.text_content());

        let reply = client
            .generate_with_options(&route.model, input, system.as_deref(), options)
            .await;

        match reply {
            Ok(text) => {
                println!("{text}");
                saga.append_assistant(text);
                if saga.is_approaching_limit(config.saga.context_ceiling, config.saga.warn_threshold) {
                    let stats = saga.stats(config.saga.context_ceiling);
                    eprintln!(
                        "warning: context usage at {:.0}% ({}/{} tokens) — consider /clear or /save",
                        stats.usage_percent, stats.total_tokens, stats.max_tokens
                    );
                }
            }
            Err(e) => tracing::error!(kind = e.kind(), "{e}"),
        }

        if let Err(e) = saga.save() {
            tracing::error!(kind = e.kind(), "{e}");
        }
    }

    Ok(0)
}

async fn cmd_agent(
    config: &Config,
    prompt: String,
    model: Option<String>,
    max_turns: Option<u32>,
    verbose: bool,
    json: bool,
) -> CmdResult {
    let (registry, statuses) = registry_with_statuses(config).await;
    let best = registry.best_host(&statuses).ok_or_else(|| (Error::no_host("no online host available"), json))?;
    let client = registry.get_client(&best.host.name).map_err(|e| (e, json))?;

    let model = model.unwrap_or_else(|| {
        config.tier_profile(Tier::Deep).map(|p| p.preferred_model.clone()).unwrap_or_default()
    });

    let mut registry_tools = crate::ToolRegistry::new();
    registry_tools
        .register(shell_execute_tool(config.agent.shell_output_cap).map_err(|e| (e, json))?);
    registry_tools.register(read_file_tool(config.agent.file_read_cap).map_err(|e| (e, json))?);

    let mut agent_config = config.agent.clone();
    if let Some(n) = max_turns {
        agent_config.max_turns = n;
    }

    let agent = Agent::new(&client, model, &registry_tools, agent_config);
    let system = "You are a careful assistant with access to a small set of restricted tools.";
    let result = agent.run(system, &prompt).await.map_err(|e| (e, json))?;

    if verbose && !json {
        for (i, turn) in result.turns.iter().enumerate() {
            println!("-- turn {} --", i + 1);
            if !turn.assistant_text.is_empty() {
                println!("{}", turn.assistant_text);
            }
            for call in &turn.tool_calls {
                println!("  tool {} -> {}", call.name, call.output);
            }
        }
    }

    if json {
        println!(
            "{}",
            json!({
                "final_text": result.final_text,
                "total_tool_calls": result.total_tool_calls,
                "success": result.success,
            })
        );
    } else {
        println!("{}", result.final_text);
    }

    Ok(if result.success { 0 } else { 1 })
}
