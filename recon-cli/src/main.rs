//! Recon orchestrator CLI
//!
//! Scope-gated reconnaissance driven by an LLM (or scripted) planner.

mod config;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

use recon_agents::{
    create_backend, BackendConfig, LlmPlanner, PromptRegistry, Provider, SharedPlanner,
    StaticPlanner,
};
use recon_core::{Report, ScopeConfig, TracingAudit};
use recon_runtime::{Orchestrator, OrchestratorConfig};
use recon_tools::ToolInvoker;

use config::ReconConfig;

#[derive(Parser)]
#[command(name = "recon-orch")]
#[command(author, version, about = "Scope-gated reconnaissance orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

/// Scope entries, appended to those from the config file
#[derive(Args, Debug, Default)]
struct ScopeArgs {
    /// In-scope domain (repeatable)
    #[arg(short, long = "domain")]
    domains: Vec<String>,

    /// In-scope IP range in CIDR notation (repeatable)
    #[arg(short, long = "ip-range")]
    ip_ranges: Vec<String>,

    /// In-scope wildcard such as *.example.com (repeatable)
    #[arg(short, long = "wildcard")]
    wildcards: Vec<String>,
}

impl ScopeArgs {
    fn merge_into(self, scope: &mut ScopeConfig) {
        scope.domains.extend(self.domains);
        scope.ip_ranges.extend(self.ip_ranges);
        scope.wildcards.extend(self.wildcards);
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run an assessment
    Run {
        /// Free-text instruction for the planner
        instruction: String,

        #[command(flatten)]
        scope: ScopeArgs,

        /// Planner provider: ollama, openai, openrouter or anthropic
        #[arg(long, default_value = "ollama")]
        provider: String,

        /// LLM model to use
        #[arg(short, long, default_value = "mistral")]
        model: String,

        /// Override the provider endpoint
        #[arg(long)]
        base_url: Option<String>,

        /// Anthropic API key (or set ANTHROPIC_API_KEY env var)
        #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
        anthropic_key: Option<String>,

        /// OpenAI API key (or set OPENAI_API_KEY env var)
        #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// OpenRouter API key (or set OPENROUTER_API_KEY env var)
        #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
        openrouter_key: Option<String>,

        /// Use a fixed JSON plan instead of an LLM planner
        #[arg(long)]
        plan_file: Option<PathBuf>,

        /// Directory of prompt profile overrides (*.toml)
        #[arg(long)]
        prompts_dir: Option<PathBuf>,

        /// Output file for the report (default: report_<timestamp>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum number of rounds
        #[arg(long)]
        max_rounds: Option<usize>,

        /// Maximum runtime in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Tool invocations allowed at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Per-invocation tool timeout in seconds
        #[arg(long)]
        tool_timeout: Option<u64>,

        /// Default wordlist for discovery tools
        #[arg(long)]
        wordlist: Option<PathBuf>,
    },

    /// Check targets against a scope
    Scope {
        /// Targets to check
        targets: Vec<String>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    /// Show which tool binaries are available
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let mut config = ReconConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            instruction,
            scope,
            provider,
            model,
            base_url,
            anthropic_key,
            api_key,
            openrouter_key,
            plan_file,
            prompts_dir,
            output,
            max_rounds,
            timeout,
            concurrency,
            tool_timeout,
            wordlist,
        } => {
            scope.merge_into(&mut config.scope);
            if let Some(rounds) = max_rounds {
                config.orchestrator.max_rounds = rounds;
            }
            if let Some(secs) = timeout {
                config.orchestrator.max_runtime_secs = secs;
            }
            if let Some(n) = concurrency {
                config.orchestrator.max_concurrent = n;
            }
            if let Some(secs) = tool_timeout {
                config.tools.timeout_secs = secs;
            }
            if wordlist.is_some() {
                config.tools.default_wordlist = wordlist;
            }

            let provider: Provider = provider.parse()?;
            let key = match provider {
                Provider::Anthropic => anthropic_key,
                Provider::OpenAI => api_key,
                Provider::OpenRouter => openrouter_key,
                Provider::Ollama => None,
            };
            let backend_config = BackendConfig::new(provider, &model)
                .with_api_key(key)
                .with_base_url(base_url);

            run_assessment(
                &instruction,
                config,
                backend_config,
                plan_file.as_deref(),
                prompts_dir.as_deref(),
                output,
            )
            .await?;
        }
        Commands::Scope { targets, scope } => {
            scope.merge_into(&mut config.scope);
            check_scope(&config.scope, &targets)?;
        }
        Commands::Tools => {
            check_tools(&config);
        }
    }

    Ok(())
}

async fn run_assessment(
    instruction: &str,
    config: ReconConfig,
    backend_config: BackendConfig,
    plan_file: Option<&Path>,
    prompts_dir: Option<&Path>,
    output: Option<PathBuf>,
) -> Result<()> {
    println!("🛰️  Recon Orchestrator\n");

    if config.scope.is_empty() {
        anyhow::bail!("Scope is empty; pass --domain/--ip-range/--wildcard or a [scope] table");
    }
    let scope = config.scope.build()?;
    let tools = ToolInvoker::with_defaults(&config.tools);

    let planner: SharedPlanner = match plan_file {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read plan file {}", path.display()))?;
            let planner = StaticPlanner::from_plan_text(&text)?;
            println!("📋 Planner: static plan ({} tasks) from {}", planner.proposals().len(), path.display());
            Arc::new(planner)
        }
        None => {
            let backend = create_backend(&backend_config)?;
            let mut prompts = PromptRegistry::load_embedded();
            if let Some(dir) = prompts_dir {
                let loaded = prompts.load_overrides(dir)?;
                println!("📝 Loaded {} prompt override(s) from {}", loaded, dir.display());
            }
            let names = tools.names().into_iter().map(str::to_string).collect();
            println!("📡 Provider: {} | Model: {}", backend_config.provider, backend_config.model);
            Arc::new(LlmPlanner::new(backend, names).with_prompts(prompts))
        }
    };

    println!("🎯 Scope: {} domain(s), {} range(s), {} wildcard(s)",
        config.scope.domains.len(), config.scope.ip_ranges.len(), config.scope.wildcards.len());
    println!("🔧 Tools: {}", tools.names().join(", "));
    println!("🔍 Instruction: {}\n", instruction);

    let audit = TracingAudit::new();
    println!("🆔 Run id: {}", audit.run_id());

    let cancel = CancellationToken::new();
    let mut orchestrator_config = OrchestratorConfig::new(planner, tools, scope)
        .with_audit(Arc::new(audit))
        .with_cancel(cancel.clone());
    orchestrator_config.max_rounds = config.orchestrator.max_rounds;
    orchestrator_config.max_runtime = config.orchestrator.max_runtime();
    orchestrator_config.max_concurrent = config.orchestrator.max_concurrent;
    orchestrator_config.retry_limit = config.orchestrator.retry_limit;
    let orchestrator = Orchestrator::new(orchestrator_config);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    println!("🚀 Starting assessment...");
    let result = orchestrator.run(instruction).await;

    let output_path = output.unwrap_or_else(|| {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S");
        PathBuf::from(format!("report_{}.json", timestamp))
    });

    match result {
        Ok(report) => {
            save_report(&report, &output_path)?;
            println!("\n✅ Assessment complete!");
            println!("📄 Report saved to: {}", output_path.display());
            print_report(&report);
            Ok(())
        }
        Err(e) => {
            // Whatever ran before the failure is still worth keeping
            let report = orchestrator.report();
            save_report(&report, &output_path)?;
            println!("\n⚠️  Assessment stopped: {}", e);
            println!("📄 Partial report saved to: {}", output_path.display());
            print_report(&report);
            Err(e.into())
        }
    }
}

fn save_report(report: &Report, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json).with_context(|| format!("Failed to write report to {}", path.display()))
}

fn print_report(report: &Report) {
    println!("\n{}", "=".repeat(60));
    println!("📊 {}", report.summary);
    for finding in report.findings.iter().take(50) {
        println!("   • {}", finding);
    }
    if report.findings.len() > 50 {
        println!("   ...[truncated - see full report in output file]");
    }
}

fn check_scope(scope: &ScopeConfig, targets: &[String]) -> Result<()> {
    let scope = scope.build()?;
    if scope.is_empty() {
        println!("⚠️  Scope is empty; every target is out of scope\n");
    }

    for target in targets {
        if scope.is_in_scope(target) {
            println!("✅ {} is in scope", target);
        } else {
            println!("❌ {} is out of scope", target);
        }
    }
    Ok(())
}

fn check_tools(config: &ReconConfig) {
    println!("🔧 Checking tool availability...\n");

    let invoker = ToolInvoker::with_defaults(&config.tools);
    for (name, available) in invoker.check_available() {
        if available {
            println!("✅ {}", name);
        } else {
            println!("❌ {} (not found on PATH)", name);
        }
    }

    match &config.tools.default_wordlist {
        Some(path) if path.is_file() => println!("\n📚 Default wordlist: {}", path.display()),
        Some(path) => println!("\n⚠️  Default wordlist missing: {}", path.display()),
        None => println!("\n⚠️  No default wordlist configured"),
    }
}
