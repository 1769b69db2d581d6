use anyhow::{Context, Result, bail};
use dapflow_runtime::{DebugConfig, prepare};
use dapflow_types::{LaunchMode, LaunchParams};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub struct ResolveRequest {
    pub program: Option<PathBuf>,
    pub mode: Option<LaunchMode>,
    pub name: Option<String>,
    pub cwd: Option<PathBuf>,
    pub args: Vec<String>,
    pub env: Vec<String>,
}

pub fn handle(config: &DebugConfig, request: ResolveRequest) -> Result<()> {
    let params = LaunchParams {
        program: request.program,
        mode: request.mode,
        config_name: request.name,
        cwd: request.cwd,
        env: parse_env(&request.env)?,
        args: request.args,
        ..LaunchParams::default()
    };

    let prepared = prepare(&params, &config.configurations)
        .context("Failed to resolve a launch configuration")?;
    tracing::debug!(name = %prepared.configuration.name, "launch configuration resolved");

    let output = json!({
        "configuration": prepared.configuration,
        "entryBreakpoint": prepared.entry,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn parse_env(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut env = BTreeMap::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Invalid --env '{}': expected KEY=VALUE", pair);
        };
        if key.is_empty() {
            bail!("Invalid --env '{}': empty variable name", pair);
        }
        env.insert(key.to_string(), value.to_string());
    }
    Ok(env)
}
