//! Document loader: turns a file path into a validated in-memory
//! case, or reports why it cannot proceed. A load error skips
//! that file only; subsequent files still run.

use crate::model::TestCase;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Load one case file, dispatching on the file extension:
/// `.json` or `.yaml`/`.yml`; anything else is unsupported.
pub fn load_case<P: AsRef<Path>>(path: P) -> Result<TestCase> {
    let path = path.as_ref();
    info!("Loading test case from {}", path.display());

    let content = fs::read_to_string(path).with_context(|| {
        format!("failed to read test case: {}", path.display())
    })?;

    let case = match extension(path) {
        Some("json") => TestCase::from_json(&content)
            .with_context(|| {
                format!("invalid json: {}", path.display())
            })?,
        Some("yaml") | Some("yml") => TestCase::from_yaml(&content)
            .with_context(|| {
                format!("invalid yaml: {}", path.display())
            })?,
        _ => bail!(
            "unsupported extension: {}",
            path.display()
        ),
    };

    if case.test_steps.is_empty() {
        bail!(
            "invalid test case {}: testSteps must not be empty",
            path.display()
        );
    }

    debug!(
        "Loaded test case: {}",
        case.name.as_deref().unwrap_or("")
    );
    Ok(case)
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}
