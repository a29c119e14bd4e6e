//! Checks a JSON history of key-value store operations for linearizability.
//!
//! Exit status: 0 linearizable, 1 not linearizable, 2 undetermined within the budget, 3 the
//! history or configuration could not be read.

use {
    anyhow::{Context, Result},
    clap::Parser,
    kv_checker::{CheckResult, Checker, CheckerConfig, SearchRecord},
    kv_history::History,
    std::{
        fs::File,
        io::{self, BufReader, IsTerminal},
        path::{Path, PathBuf},
        process::ExitCode,
        time::Duration,
    },
    tracing_subscriber::EnvFilter,
};

#[derive(Parser)]
#[command(name = "kv-checker")]
#[command(about = "Check a recorded key-value store history for linearizability")]
#[command(version)]
struct Cli {
    /// JSON array of events, or `-` for standard input
    history: PathBuf,

    /// Give up after applying this many operations (overrides KV_CHECKER_STEP_BUDGET)
    #[arg(long)]
    max_steps: Option<u64>,

    /// Give up after this many milliseconds (overrides KV_CHECKER_TIME_BUDGET_MS)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Disable caching of explored subproblems
    #[arg(long)]
    no_memo: bool,

    /// Print every search step to stderr
    #[arg(long)]
    trace: bool,

    /// Print the linearization found, if any
    #[arg(long)]
    witness: bool,

    /// Print the verdict as JSON
    #[arg(long)]
    json: bool,

    /// Never highlight the verdict
    #[arg(long)]
    no_color: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(result) => match result {
            CheckResult::Linearizable { .. } => ExitCode::SUCCESS,
            CheckResult::NotLinearizable { .. } => ExitCode::from(1),
            _ => ExitCode::from(2),
        },
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(3)
        }
    }
}

fn run(cli: Cli) -> Result<CheckResult> {
    let history = read_history(&cli.history)?;
    tracing::info!(
        events = history.len(),
        pending = history.pending_count(),
        "Loaded history."
    );

    let mut config = CheckerConfig::from_env().context("invalid checker configuration")?;
    if let Some(steps) = cli.max_steps {
        config = config.step_budget(steps);
    }
    if let Some(ms) = cli.timeout_ms {
        config = config.time_budget(Duration::from_millis(ms));
    }
    if cli.no_memo {
        config = config.memoize(false);
    }

    let mut checker = Checker::with_config(config);
    if cli.trace {
        checker = checker.visitor(|record: &SearchRecord| eprintln!("{record}"));
    }
    let result = checker.check(&history);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&verdict_json(&result, cli.witness))?);
    } else {
        if cli.no_color || !io::stdout().is_terminal() {
            print!("{result}");
        } else {
            print!("{}", result.colored_report());
        }
        if let (true, Some(witness)) = (cli.witness, result.witness()) {
            println!("Witness:");
            let mut i = 1;
            for event in witness {
                println!("\t{i}. {event}");
                i += 1;
            }
        }
    }
    Ok(result)
}

fn read_history(path: &Path) -> Result<History> {
    if path.as_os_str() == "-" {
        return History::from_reader(io::stdin().lock()).context("failed to parse standard input");
    }
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    History::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse {}", path.display()))
}

fn verdict_json(result: &CheckResult, include_witness: bool) -> serde_json::Value {
    let mut json = serde_json::json!({
        "verdict": result.verdict(),
        "stats": result.stats(),
    });
    match result {
        CheckResult::Linearizable { witness, .. } if include_witness => {
            json["witness"] = witness
                .iter()
                .map(|event| usize::from(event.id()))
                .collect();
        }
        CheckResult::NotLinearizable {
            deepest_mismatch: Some(mismatch),
            ..
        } => {
            json["mismatch"] = serde_json::json!({
                "depth": mismatch.depth,
                "event": usize::from(mismatch.event),
                "predicted": mismatch.predicted,
                "observed": mismatch.observed,
                "prefix": mismatch
                    .prefix
                    .iter()
                    .map(|event| usize::from(event.id()))
                    .collect::<Vec<_>>(),
            });
        }
        CheckResult::Indeterminate { reason, .. } => {
            json["reason"] = reason.to_string().into();
        }
        _ => {}
    }
    json
}
