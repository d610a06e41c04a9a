//! restep CLI - declarative HTTP test case runner.

use anyhow::Result;
use clap::Parser;
use restep::{
    loader, CaseOutcome, CaseRunner, DefaultCaseRunner, Environment,
};
use serde_json::Value;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// restep - run declarative HTTP test cases against a live
/// endpoint.
#[derive(Parser, Debug)]
#[command(name = "restep", version, about)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Case file paths and key=value environment seeds, in any
    /// order. Files run in argument order; seeds apply to all of
    /// them.
    args: Vec<String>,
}

fn init_tracing(verbose: bool) {
    if std::env::var_os("RUST_LOG").is_none() {
        let level = if verbose { "debug" } else { "info" };
        std::env::set_var("RUST_LOG", level);
    }

    if tracing::dispatcher::has_been_set() {
        return;
    }

    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.verbose);

    // A single persistent environment for the whole invocation:
    // command-line seeds first (they win over case globals), then
    // whatever each case leaves behind for the next one.
    let mut env = Environment::new();
    let mut files = Vec::new();
    for arg in &args.args {
        match arg.split_once('=') {
            Some((key, value)) => {
                env.set(key, Value::String(value.to_string()))
            }
            None => files.push(arg.clone()),
        }
    }

    let runner = DefaultCaseRunner::new();
    for file in &files {
        // A failing case never stops subsequent files.
        let case = match loader::load_case(file) {
            Ok(case) => case,
            Err(e) => {
                error!("Error loading testcase {file}: {e:#}");
                continue;
            }
        };

        match runner.run(&case, &mut env).await {
            Ok(CaseOutcome::Completed) => {
                info!("\x1b[32mPASS\x1b[0m {file}")
            }
            Ok(CaseOutcome::Aborted { reason }) => {
                error!("\x1b[31mFAIL\x1b[0m {file}: {reason}")
            }
            Err(e) => {
                error!("Case execution error: {file} - {e:#}")
            }
        }
    }

    Ok(())
}
