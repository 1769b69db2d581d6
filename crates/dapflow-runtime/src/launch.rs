//! Launch configuration resolution.
//!
//! A launch either names a registered configuration or is synthesized from the
//! program's file extension (or an explicit mode). Caller parameters are then
//! layered on top and an entry breakpoint replaces `stopOnEntry`.

use crate::{Error, Result, pytest};
use dapflow_core::{expand_tilde, normalize_path};
use dapflow_types::{LaunchConfiguration, LaunchMode, LaunchParams, Location};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

/// Adapter fields a caller may never override
const IDENTITY_FIELDS: [&str; 3] = ["name", "type", "request"];

/// Environment flag read by the pytest plugin to re-raise test failures
pub const PYTEST_RAISE_ENV: &str = "_PYTEST_RAISE";

/// A configuration ready for the host plus the synthetic entry breakpoint
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedLaunch {
    pub configuration: LaunchConfiguration,
    pub entry: Option<Location>,
}

/// Infer the runtime from a program's extension
pub fn detect_mode(program: &Path) -> Option<LaunchMode> {
    let extension = program.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "py" => Some(LaunchMode::Python),
        "js" | "mjs" | "cjs" => Some(LaunchMode::Node),
        "ts" | "mts" | "cts" => Some(LaunchMode::TypeScript),
        _ => None,
    }
}

/// Build a launch configuration for `program` from the built-in templates
pub fn synthesize(program: &Path, mode: Option<LaunchMode>) -> Result<LaunchConfiguration> {
    let mode = mode.or_else(|| detect_mode(program)).ok_or_else(|| {
        Error::UnsupportedLaunchTarget(format!(
            "cannot infer a debugger for {} (supported: .py, .js, .mjs, .cjs, .ts, .mts, .cts)",
            program.display()
        ))
    })?;

    let file_name = program
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.display().to_string());
    let mut config = LaunchConfiguration::new(format!("dapflow: {}", file_name), "");
    config.cwd = program.parent().map(Path::to_path_buf);

    match mode {
        LaunchMode::Python => {
            config.kind = "debugpy".to_string();
            config.program = Some(program.to_path_buf());
            python_defaults(&mut config);
        }
        LaunchMode::Pytest => {
            config.kind = "debugpy".to_string();
            config.args = vec![
                "-p".to_string(),
                pytest::PLUGIN_MODULE.to_string(),
                program.display().to_string(),
            ];
            config.env.insert(PYTEST_RAISE_ENV.to_string(), "1".to_string());
            config.extra.insert("module".to_string(), json!("pytest"));
            python_defaults(&mut config);
        }
        LaunchMode::Node => {
            config.kind = "pwa-node".to_string();
            config.program = Some(program.to_path_buf());
            node_defaults(&mut config);
        }
        LaunchMode::TypeScript => {
            config.kind = "pwa-node".to_string();
            config.program = Some(program.to_path_buf());
            config
                .extra
                .insert("runtimeArgs".to_string(), json!(["-r", "ts-node/register"]));
            node_defaults(&mut config);
        }
    }

    Ok(config)
}

fn python_defaults(config: &mut LaunchConfiguration) {
    config
        .extra
        .insert("console".to_string(), json!("integratedTerminal"));
    config.extra.insert("justMyCode".to_string(), json!(false));
}

fn node_defaults(config: &mut LaunchConfiguration) {
    config
        .extra
        .insert("console".to_string(), json!("integratedTerminal"));
    config
        .extra
        .insert("skipFiles".to_string(), json!(["<node_internals>/**"]));
}

/// Look up a registered configuration by name
pub fn resolve<'a>(name: &str, registry: &'a [LaunchConfiguration]) -> Result<&'a LaunchConfiguration> {
    registry
        .iter()
        .find(|config| config.name == name)
        .ok_or_else(|| Error::UnknownConfiguration(name.to_string()))
}

/// Layer caller parameters onto a configuration.
///
/// `cwd` replaces, `env` merges, `args` append and every other field
/// overrides, except the identity fields.
pub fn apply_overrides(config: &mut LaunchConfiguration, params: &LaunchParams) {
    if let Some(program) = &params.program
        && config.program.is_some()
    {
        config.program = Some(program_path(program));
    }
    if let Some(cwd) = &params.cwd {
        config.cwd = Some(cwd.clone());
    }
    config
        .env
        .extend(params.env.iter().map(|(k, v)| (k.clone(), v.clone())));
    config.args.extend(params.args.iter().cloned());
    if let Some(stop_on_entry) = params.stop_on_entry {
        config.stop_on_entry = stop_on_entry;
    }

    for (key, value) in &params.overrides {
        if IDENTITY_FIELDS.contains(&key.as_str()) {
            tracing::debug!(field = %key, "ignoring override of identity field");
            continue;
        }
        apply_field(config, key, value);
    }
}

/// Route typed fields to their struct members so they cannot shadow them
fn apply_field(config: &mut LaunchConfiguration, key: &str, value: &Value) {
    match (key, value) {
        ("stopOnEntry", Value::Bool(flag)) => config.stop_on_entry = *flag,
        ("program", Value::String(path)) => config.program = Some(PathBuf::from(path)),
        ("cwd", Value::String(path)) => config.cwd = Some(PathBuf::from(path)),
        _ => {
            config.extra.insert(key.to_string(), value.clone());
        }
    }
}

fn program_path(program: &Path) -> PathBuf {
    normalize_path(&expand_tilde(&program.to_string_lossy()))
}

/// Resolve `params` into the configuration handed to the host.
///
/// When a program is known, the debuggee pauses through a breakpoint on its
/// first line instead of the adapter's `stopOnEntry`, which is forced off.
pub fn prepare(params: &LaunchParams, registry: &[LaunchConfiguration]) -> Result<PreparedLaunch> {
    let program = params.program.as_deref().map(program_path);

    let mut configuration = match (&params.config_name, &program) {
        (Some(name), _) => resolve(name, registry)?.clone(),
        (None, Some(program)) => synthesize(program, params.mode)?,
        (None, None) => {
            return Err(Error::InvalidInput(
                "launch needs a program path or a configuration name".to_string(),
            ));
        }
    };
    apply_overrides(&mut configuration, params);

    if params.config_name.is_none() && params.mode == Some(LaunchMode::Pytest) {
        let plugin_dir = pytest::install_plugin()?;
        pytest::wire_plugin(&mut configuration, &plugin_dir)?;
    }

    let entry_program = program.or_else(|| configuration.program.clone());
    let entry = entry_program.map(|path| Location::new(path, 1));
    if entry.is_some() {
        configuration.stop_on_entry = false;
    }

    tracing::debug!(
        name = %configuration.name,
        kind = %configuration.kind,
        entry = ?entry.as_ref().map(|l| l.path.display().to_string()),
        "prepared launch configuration"
    );
    Ok(PreparedLaunch {
        configuration,
        entry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_json_snapshot;

    #[test]
    fn test_detect_mode_from_extension() {
        assert_eq!(detect_mode(Path::new("a.py")), Some(LaunchMode::Python));
        assert_eq!(detect_mode(Path::new("a.MJS")), Some(LaunchMode::Node));
        assert_eq!(detect_mode(Path::new("a.cts")), Some(LaunchMode::TypeScript));
        assert_eq!(detect_mode(Path::new("a.rb")), None);
        assert_eq!(detect_mode(Path::new("Makefile")), None);
    }

    #[test]
    fn test_synthesize_python() {
        let config = synthesize(Path::new("/work/app.py"), None).unwrap();
        assert_json_snapshot!(config, @r#"
        {
          "name": "dapflow: app.py",
          "type": "debugpy",
          "request": "launch",
          "program": "/work/app.py",
          "cwd": "/work",
          "stopOnEntry": false,
          "console": "integratedTerminal",
          "justMyCode": false
        }
        "#);
    }

    #[test]
    fn test_synthesize_pytest() {
        let config = synthesize(Path::new("/work/test_app.py"), Some(LaunchMode::Pytest)).unwrap();
        assert_json_snapshot!(config, @r#"
        {
          "name": "dapflow: test_app.py",
          "type": "debugpy",
          "request": "launch",
          "cwd": "/work",
          "env": {
            "_PYTEST_RAISE": "1"
          },
          "args": [
            "-p",
            "dapflow_pytest_raise",
            "/work/test_app.py"
          ],
          "stopOnEntry": false,
          "console": "integratedTerminal",
          "justMyCode": false,
          "module": "pytest"
        }
        "#);
    }

    #[test]
    fn test_synthesize_typescript() {
        let config = synthesize(Path::new("/work/main.ts"), None).unwrap();
        assert_json_snapshot!(config, @r#"
        {
          "name": "dapflow: main.ts",
          "type": "pwa-node",
          "request": "launch",
          "program": "/work/main.ts",
          "cwd": "/work",
          "stopOnEntry": false,
          "console": "integratedTerminal",
          "runtimeArgs": [
            "-r",
            "ts-node/register"
          ],
          "skipFiles": [
            "<node_internals>/**"
          ]
        }
        "#);
    }

    #[test]
    fn test_synthesize_rejects_unknown_extension() {
        let err = synthesize(Path::new("/work/app.rb"), None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedLaunchTarget(_)));
    }

    #[test]
    fn test_overrides_merge_env_append_args_and_keep_identity() {
        let mut config = LaunchConfiguration::new("app", "debugpy");
        config.env.insert("A".to_string(), "1".to_string());
        config.args = vec!["--base".to_string()];

        let mut params = LaunchParams::default()
            .with_env("B", "2")
            .with_args(["--extra"])
            .with_cwd("/tmp/run");
        params.overrides.insert("name".to_string(), json!("hijacked"));
        params.overrides.insert("type".to_string(), json!("node"));
        params.overrides.insert("justMyCode".to_string(), json!(true));

        apply_overrides(&mut config, &params);

        assert_eq!(config.name, "app");
        assert_eq!(config.kind, "debugpy");
        assert_eq!(config.cwd, Some(PathBuf::from("/tmp/run")));
        assert_eq!(config.env.len(), 2);
        assert_eq!(config.args, vec!["--base", "--extra"]);
        assert_eq!(config.extra.get("justMyCode"), Some(&json!(true)));
    }

    #[test]
    fn test_prepare_forces_entry_breakpoint() {
        let params = LaunchParams {
            stop_on_entry: Some(true),
            ..LaunchParams::program("/work/app.py")
        };
        let prepared = prepare(&params, &[]).unwrap();

        assert!(!prepared.configuration.stop_on_entry);
        assert_eq!(prepared.entry, Some(Location::new("/work/app.py", 1)));
    }

    #[test]
    fn test_prepare_pytest_loads_reraise_plugin() {
        let params = LaunchParams::program("/work/test_app.py").with_mode(LaunchMode::Pytest);
        let prepared = prepare(&params, &[]).unwrap();
        let config = &prepared.configuration;

        assert_eq!(config.args[..2], ["-p", pytest::PLUGIN_MODULE]);
        let plugin_dir = std::env::split_paths(&config.env["PYTHONPATH"])
            .next()
            .unwrap();
        assert!(plugin_dir.join("dapflow_pytest_raise.py").is_file());
        assert_eq!(config.env.get(PYTEST_RAISE_ENV).map(String::as_str), Some("1"));
        assert_eq!(prepared.entry, Some(Location::new("/work/test_app.py", 1)));
    }

    #[test]
    fn test_prepare_unknown_configuration() {
        let err = prepare(&LaunchParams::named("missing"), &[]).unwrap_err();
        assert!(matches!(err, Error::UnknownConfiguration(name) if name == "missing"));
    }

    #[test]
    fn test_prepare_named_configuration_without_program_keeps_stop_on_entry() {
        let mut registered = LaunchConfiguration::new("server", "debugpy");
        registered.stop_on_entry = true;
        registered.extra.insert("module".to_string(), json!("app.server"));

        let prepared = prepare(&LaunchParams::named("server"), &[registered]).unwrap();

        assert!(prepared.entry.is_none());
        assert!(prepared.configuration.stop_on_entry);
    }

    #[test]
    fn test_prepare_requires_program_or_name() {
        let err = prepare(&LaunchParams::default(), &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
