// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;
mod session_file;

use anyhow::{Context, Result, anyhow};
use config::Config;
use inspecta_api::Client;
use inspecta_app::{AppState, SessionContext, SessionStore};
use runtime::ApiRuntime;
use session_file::FileSessionStore;
use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `inspecta --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let store = FileSessionStore::new(FileSessionStore::default_path()?);
    if options.logout {
        store.erase()?;
        println!("signed out; removed {}", store.path().display());
        return Ok(());
    }

    let client = Client::new(config.base_url(), config.timeout()?).with_context(|| {
        format!(
            "invalid [api] config in {}; fix base_url/timeout values",
            options.config_path.display()
        )
    })?;
    let log_path = config.log_path()?;
    if options.check_only {
        return Ok(());
    }

    init_logging(&config.log_filter(), &log_path)?;
    tracing::info!(base_url = config.base_url(), config = %options.config_path.display(), "starting inspecta");

    let session = SessionContext::open(store);
    let mut runtime = ApiRuntime::new(client, session);
    let mut state = AppState::default();
    let result = inspecta_tui::run_app(&mut state, &mut runtime, config.default_view());
    if let Err(error) = &result {
        tracing::error!(error = %format!("{error:#}"), "inspecta exited with an error");
    }
    result
}

/// Routes tracing output to a file so the terminal UI stays clean.
fn init_logging(filter: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| {
            format!(
                "open log file {} -- set [log].path to a writable file",
                path.display()
            )
        })?;
    let filter = EnvFilter::try_new(filter)
        .with_context(|| format!("invalid log filter {filter:?}; check INSPECTA_LOG or [log].filter"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|error| anyhow!("install log subscriber: {error}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    logout: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        check_only: false,
        logout: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--logout" => {
                options.logout = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("inspecta");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --check                  Validate config and API settings, then exit");
    println!("  --logout                 Forget the stored session");
    println!("  --help                   Show this help");
    println!();
    println!("Logs go to the data directory; INSPECTA_LOG sets the filter.");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, init_logging, parse_cli_args};
    use anyhow::Result;
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/inspecta-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                print_config_path: false,
                print_example: false,
                check_only: false,
                logout: false,
                show_help: false,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_reads_config_override_and_flags() -> Result<()> {
        let options = parse_cli_args(
            ["--config", "/tmp/custom.toml", "--check", "--print-config-path"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/tmp/custom.toml"));
        assert!(options.check_only);
        assert!(options.print_config_path);
        assert!(!options.logout);
        Ok(())
    }

    #[test]
    fn parse_cli_args_accepts_logout_and_short_help() -> Result<()> {
        let options = parse_cli_args(["--logout", "-h"], default_options_path())?;
        assert!(options.logout);
        assert!(options.show_help);
        Ok(())
    }

    #[test]
    fn parse_cli_args_requires_config_value() {
        let error = parse_cli_args(["--config"], default_options_path())
            .expect_err("missing value should fail");
        assert!(error.to_string().contains("--config requires a file path"));
    }

    #[test]
    fn parse_cli_args_rejects_unknown_argument() {
        let error = parse_cli_args(["--demo"], default_options_path())
            .expect_err("unknown argument should fail");
        assert!(error.to_string().contains("unknown argument \"--demo\""));
    }

    #[test]
    fn bad_log_filter_is_reported_before_installing() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs").join("inspecta.log");
        let error = init_logging("inspecta_api=loud", &path).expect_err("bad filter should fail");
        assert!(error.to_string().contains("INSPECTA_LOG"));
        assert!(path.exists());
        Ok(())
    }
}
