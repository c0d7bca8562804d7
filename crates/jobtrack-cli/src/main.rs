// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use jobtrack_api::Client;
use jobtrack_app::AppState;
use jobtrack_cache::Cache;
use runtime::{ApiRuntime, DemoRuntime};
use std::env;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use time::OffsetDateTime;
use tracing::info;
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
            "load config {}; run `jobtrack --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let cache_path = config.cache_path()?;
    if options.print_cache_path {
        println!("{}", cache_path.display());
        return Ok(());
    }

    if options.clear_cache {
        let cache = open_cache(&cache_path)?;
        let removed = cache.clear()?;
        println!("removed {removed} cached snapshot(s) from {}", cache_path.display());
        return Ok(());
    }

    let log_path = match &options.log_file {
        Some(path) => path.clone(),
        None => default_log_path()?,
    };
    if !options.check_only {
        init_logging(&log_path)?;
    }

    let mut state = AppState::default();
    if options.demo {
        if options.check_only {
            return Ok(());
        }
        info!("starting with demo data");
        let mut runtime = DemoRuntime::new(OffsetDateTime::now_utc(), config.status_colors());
        return jobtrack_tui::run_app(&mut state, &mut runtime);
    }

    let token = config.api_token();
    let client = Client::new(config.api_base_url(), token, config.api_timeout()?)
        .with_context(|| {
            format!(
                "invalid [api] config in {}; fix base_url/timeout values",
                options.config_path.display()
            )
        })?;
    let cache = if config.cache_enabled() {
        Some(open_cache(&cache_path)?)
    } else {
        None
    };

    if options.check_only {
        if client.token().is_none() {
            bail!("api token is missing -- set [api].token or JOBTRACK_TOKEN and retry");
        }
        return Ok(());
    }

    info!(
        base_url = client.base_url(),
        cache = cache.is_some(),
        "starting"
    );
    let mut runtime = ApiRuntime::new(
        client,
        cache,
        config.cache_max_age()?,
        config.status_colors(),
    );
    jobtrack_tui::run_app(&mut state, &mut runtime)
}

fn open_cache(path: &Path) -> Result<Cache> {
    let cache = Cache::open(path).with_context(|| {
        format!(
            "open cache {} -- if this path is wrong, set [cache].db_path or JOBTRACK_CACHE_PATH",
            path.display()
        )
    })?;
    cache.bootstrap()?;
    Ok(cache)
}

fn default_log_path() -> Result<PathBuf> {
    let dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("cannot resolve a data directory for the log file; pass --log-file"))?;
    Ok(dir.join(jobtrack_cache::APP_NAME).join("jobtrack.log"))
}

/// Log to a file; the terminal belongs to the table view.
fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;

    let directives = env::var("JOBTRACK_LOG")
        .or_else(|_| env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_owned());
    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid log filter {directives:?} in JOBTRACK_LOG/RUST_LOG"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|error| anyhow!("initialize logging: {error}"))?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_cache_path: bool,
    print_example: bool,
    demo: bool,
    check_only: bool,
    clear_cache: bool,
    log_file: Option<PathBuf>,
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
        print_cache_path: false,
        print_example: false,
        demo: false,
        check_only: false,
        clear_cache: false,
        log_file: None,
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
            "--log-file" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--log-file requires a file path"))?;
                options.log_file = Some(PathBuf::from(value.as_ref()));
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-cache-path" => {
                options.print_cache_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--clear-cache" => {
                options.clear_cache = true;
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
    println!("jobtrack - job application tracker");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-cache-path       Print resolved offline cache path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Launch with generated demo data (no server)");
    println!("  --check                  Validate config, token and cache, then exit");
    println!("  --clear-cache            Delete every cached snapshot and exit");
    println!("  --log-file <path>        Write logs to this file");
    println!("  --help                   Show this help");
}
