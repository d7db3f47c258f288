mod args;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use injective::logging::{init_logging, LoggingConfig, OperationTimer};
use injective::{FileLoader, Injector, InjectiveConfig, Location, Resolved};

use args::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(LoggingConfig::from_verbosity(args.verbose))
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let cwd = std::env::current_dir().context("cannot determine the working directory")?;
    let (config, config_dir) = load_config(&args, &cwd)?;
    let origin = config
        .base_path
        .clone()
        .unwrap_or_else(|| config_dir.to_string_lossy().into_owned());

    let loader = args
        .library_dirs
        .iter()
        .fold(FileLoader::new(), |loader, dir| loader.with_library_dir(absolute(&cwd, dir)));
    let main_entries = config.main.clone();
    let injector = Injector::new(config, Arc::new(loader)).with_origin(origin);

    match args.command {
        Command::Resolve { names, compact } => {
            let names = if names.is_empty() { main_entries } else { names };
            if names.is_empty() {
                bail!("no names given and the configuration has no `main` entry");
            }

            let timer = OperationTimer::new(format!("resolve {}", names.join(" ")));
            let mut output = Map::new();
            for name in &names {
                let resolved = injector
                    .resolve(name)
                    .await
                    .with_context(|| format!("failed to resolve `{}`", name))?;
                output.insert(name.clone(), to_json(&resolved));
            }
            timer.finish();

            let stats = injector.stats();
            tracing::info!(
                resolutions = stats.total_resolutions,
                cache_hits = stats.cache_hits,
                instantiations = stats.instantiations,
                "Resolution finished"
            );
            print_json(&Value::Object(output), compact)?;
        }
        Command::Locate { names } => {
            let mut output = Map::new();
            for name in &names {
                let location = injector
                    .locate(name)
                    .with_context(|| format!("failed to locate `{}`", name))?;
                output.insert(name.clone(), location_to_json(&location));
            }
            print_json(&Value::Object(output), false)?;
        }
    }

    Ok(())
}

/// 显式配置优先，其次在当前目录查找；返回配置与相对名称的默认起点
fn load_config(args: &Args, cwd: &Path) -> Result<(InjectiveConfig, PathBuf)> {
    let (mut config, config_dir) = match &args.config {
        Some(path) => {
            let path = absolute(cwd, path);
            let config = InjectiveConfig::from_file(&path)?;
            let dir = path.parent().map(Path::to_path_buf).unwrap_or_else(|| cwd.to_path_buf());
            (config, dir)
        }
        None => match InjectiveConfig::discover(cwd)? {
            Some((path, config)) => {
                tracing::debug!("Using configuration {}", path.display());
                (config, cwd.to_path_buf())
            }
            None => (InjectiveConfig::default(), cwd.to_path_buf()),
        },
    };

    if let Some(base_path) = &args.base_path {
        config.base_path = Some(absolute(cwd, base_path).to_string_lossy().into_owned());
    }
    Ok((config, config_dir))
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn to_json(resolved: &Resolved) -> Value {
    match resolved {
        Resolved::Bundle(members) => Value::Array(members.iter().map(to_json).collect()),
        Resolved::Instance(value) => match value.downcast_ref::<Value>() {
            Some(json) => json.clone(),
            None if value.is::<Injector>() => Value::String("<injector>".to_string()),
            None => Value::String("<opaque>".to_string()),
        },
    }
}

fn location_to_json(location: &Location) -> Value {
    match location {
        Location::Single(location) => Value::String(location.clone()),
        Location::Bundle(members) => Value::Array(members.iter().map(location_to_json).collect()),
    }
}

fn print_json(value: &Value, compact: bool) -> Result<()> {
    let rendered = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", rendered);
    Ok(())
}
