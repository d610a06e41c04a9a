//! Case execution: the step state machine.
//!
//! Walks a case's steps in declaration order, applies control
//! directives (`sleep`, `skip`, missing url), and for each
//! repetition resolves the step against the current environment,
//! builds the payload, issues the request through the shared
//! session, evaluates assertions and runs extraction rules.
//! Communication errors and assertion failures abort the case;
//! everything else is contained at the point of detection.

use crate::asserts;
use crate::environment::{
    Environment, ITERATION_COUNTER, REPEAT_COUNTER, STEP_COUNTER,
};
use crate::expression;
use crate::model::{CaseOutcome, TestCase};
use crate::payload;
use crate::session::Session;
use crate::template;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

/// Case runner seam. The default implementation drives a fresh
/// [`Session`] per case; alternates can swap the transport for
/// tests or instrumentation.
#[async_trait]
pub trait CaseRunner: Send + Sync {
    /// Execute one case against `env`. The environment is mutated
    /// in place and persists across calls, enabling cross-case
    /// chaining.
    async fn run(
        &self,
        case: &TestCase,
        env: &mut Environment,
    ) -> Result<CaseOutcome>;
}

/// Default sequential runner.
#[derive(Debug, Default)]
pub struct DefaultCaseRunner;

impl DefaultCaseRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CaseRunner for DefaultCaseRunner {
    #[instrument(skip(self, case, env), fields(name = case.name.as_deref().unwrap_or("")))]
    async fn run(
        &self,
        case: &TestCase,
        env: &mut Environment,
    ) -> Result<CaseOutcome> {
        info!("{}", case.name.as_deref().unwrap_or(""));

        // Globals never overwrite keys seeded earlier.
        if let Some(seed) =
            case.globals.as_ref().and_then(|g| g.seed())
        {
            env.merge(seed);
        }

        // One session per case: cookies persist across steps and
        // repetitions by default.
        let mut session = Session::new();

        for step in &case.test_steps {
            // Directive steps never issue a request. The duration
            // is strictly this step's own declaration.
            if let Some(secs) = step.sleep {
                debug!("Sleeping {secs}s");
                tokio::time::sleep(Duration::from_secs_f64(secs))
                    .await;
                continue;
            }
            if step.skip {
                continue;
            }
            // An incomplete step is silently ignored, not an
            // error.
            if step.target_url().is_none() {
                continue;
            }

            let step_number = env
                .get(STEP_COUNTER)
                .and_then(Value::as_u64)
                .unwrap_or(0)
                + 1;
            env.set(STEP_COUNTER, json!(step_number));
            env.set(REPEAT_COUNTER, json!(step.repeat));

            for count in 0..step.repeat {
                env.set(ITERATION_COUNTER, json!(count));

                // Deep copy + resolution against the current
                // environment snapshot; later mutations of `env`
                // never reach this iteration retroactively.
                let resolved = template::resolve_step(step, env)?;
                let url = resolved
                    .target_url()
                    .unwrap_or_default()
                    .to_string();

                info!(
                    "  {}",
                    resolved
                        .name
                        .clone()
                        .unwrap_or_else(|| step_number.to_string())
                );

                let body = match payload::build(&resolved) {
                    Ok(body) => body,
                    Err(e) => {
                        error!("Payload error: {e:#}");
                        return Ok(CaseOutcome::aborted(format!(
                            "payload error: {e:#}"
                        )));
                    }
                };

                // Documented quirk: disabling cookies drops the
                // jar contents accumulated from all prior steps,
                // not just this request's outgoing cookies.
                if !resolved.cookies {
                    session.jar.clear();
                }

                let ctx = match session
                    .execute(&resolved, &url, body)
                    .await
                {
                    Ok(ctx) => ctx,
                    Err(e) => {
                        error!("Communication error: {e:#}");
                        return Ok(CaseOutcome::aborted(format!(
                            "communication error: {e:#}"
                        )));
                    }
                };

                if let Some(declared) = &resolved.asserts {
                    if let Some(reason) =
                        asserts::evaluate(declared, &ctx)
                    {
                        error!("Assertion failed: {reason}");
                        return Ok(CaseOutcome::aborted(reason));
                    }
                }

                // Extraction failures skip the entry and keep the
                // case running — the asymmetry with assertions is
                // intentional.
                if !resolved.setenv.is_empty() {
                    let bindings = ctx.bindings();
                    for (name, expr) in &resolved.setenv {
                        // Keys are template-resolved themselves,
                        // allowing dynamic variable names.
                        let key = template::resolve_text(name, env);
                        match expression::resolve_value(
                            expr, &bindings,
                        ) {
                            Ok(value) => {
                                debug!(
                                    "setenv '{key}' = {value:?}"
                                );
                                env.set(key, value);
                            }
                            Err(e) => {
                                warn!(
                                    "Failed to evaluate setenv \
                                     '{name}' ({expr}): {e}"
                                );
                            }
                        }
                    }
                }
            }
        }

        Ok(CaseOutcome::Completed)
    }
}
