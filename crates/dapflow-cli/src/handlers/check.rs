use anyhow::{Context, Result, bail};
use dapflow_runtime::DebugConfig;
use std::collections::HashSet;
use std::path::Path;

pub fn handle(config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        println!(
            "No config file at {}; built-in defaults apply",
            config_path.display()
        );
        return Ok(());
    }

    let config = DebugConfig::load_from(config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    let problems = validate(&config);
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("  - {}", problem);
        }
        bail!(
            "{} problem(s) found in {}",
            problems.len(),
            config_path.display()
        );
    }

    println!(
        "Config OK: {} ({} launch configuration(s))",
        config_path.display(),
        config.configurations.len()
    );
    Ok(())
}

/// Problems that would make sessions misbehave, in file order
pub fn validate(config: &DebugConfig) -> Vec<String> {
    let mut problems = Vec::new();

    let timing = &config.timing;
    if timing.poll_interval_ms == 0 {
        problems.push("timing.poll_interval_ms must be greater than 0".to_string());
    }
    if timing.poll_interval_ms > timing.poll_timeout_ms {
        problems.push(format!(
            "timing.poll_interval_ms ({}) exceeds timing.poll_timeout_ms ({})",
            timing.poll_interval_ms, timing.poll_timeout_ms
        ));
    }
    if timing.thread_retry_attempts == 0 {
        problems.push("timing.thread_retry_attempts must be at least 1".to_string());
    }
    if config.output.quiescence_attempts == 0 {
        problems.push("output.quiescence_attempts must be at least 1".to_string());
    }

    let mut seen = HashSet::new();
    for (index, configuration) in config.configurations.iter().enumerate() {
        let label = if configuration.name.is_empty() {
            format!("configurations[{}]", index)
        } else {
            format!("configuration '{}'", configuration.name)
        };

        if configuration.name.is_empty() {
            problems.push(format!("{} has no name", label));
        } else if !seen.insert(configuration.name.as_str()) {
            problems.push(format!("{} is defined more than once", label));
        }
        if configuration.kind.is_empty() {
            problems.push(format!("{} has no type", label));
        }
        if !matches!(configuration.request.as_str(), "launch" | "attach") {
            problems.push(format!(
                "{} has request '{}' (expected launch or attach)",
                label, configuration.request
            ));
        }
    }

    problems
}
