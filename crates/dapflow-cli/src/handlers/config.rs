use crate::args::ConfigFormat;
use anyhow::Result;
use dapflow_runtime::DebugConfig;

pub fn show(config: &DebugConfig, format: ConfigFormat) -> Result<()> {
    let rendered = match format {
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}
