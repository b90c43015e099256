//! Structural validation of a script description file.

use anyhow::{Context as _, Result, bail};
use chatflow_core::script::ScriptSource;
use std::path::Path;

pub fn run(script: &Path) -> Result<()> {
    let content = std::fs::read_to_string(script)
        .with_context(|| format!("failed to read script file {:?}", script))?;

    let source = if script.extension().is_some_and(|ext| ext == "json") {
        ScriptSource::from_json_str(&content)?
    } else {
        ScriptSource::from_toml_str(&content)?
    };

    let issues = source.validate_structure();
    if issues.is_empty() {
        let nodes: usize = source.flows.iter().map(|f| f.nodes.len()).sum();
        println!(
            "ok: {} flow(s), {} node(s), start {}, fallback {}",
            source.flows.len(),
            nodes,
            source.start,
            source.fallback
        );
        return Ok(());
    }

    for issue in &issues {
        eprintln!("error: {}", issue);
    }
    bail!("{} issue(s) found", issues.len());
}
