//! Default header inspection binary.
//!
//! Resolves the headers a PUT to `--path` would be defaulted with, given a
//! cluster configuration and snapshots of the account and container
//! persisted metadata. Metadata snapshots are JSON objects in provider form,
//! e.g. `{"default-object-x-delete-after": "86400"}`.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use defaults_resolution::{
    DefaultSource, DefaulterConfig, DefaultsResolver, FormatArgs, SysmetaMap,
};
use serde::Serialize;
use storage_namespace::{ResourcePath, ResourceType};

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Resolve the default headers a PUT would receive")]
struct Args {
    /// Request path, e.g. `/v1/acct/cont/obj`.
    #[arg(long)]
    path: String,

    /// TOML file with `use_formatting` and `default-*` cluster entries.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// JSON snapshot of the account's persisted metadata.
    #[arg(long, value_name = "FILE")]
    account_metadata: Option<PathBuf>,

    /// JSON snapshot of the container's persisted metadata.
    #[arg(long, value_name = "FILE")]
    container_metadata: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[derive(Debug, Serialize)]
struct Report {
    path: String,
    target: ResourceType,
    defaults: BTreeMap<String, ReportEntry>,
}

#[derive(Debug, Serialize)]
struct ReportEntry {
    value: String,
    source: DefaultSource,
    cleared: bool,
}

fn run(args: Args) -> Result<()> {
    let path = ResourcePath::parse(&args.path)
        .with_context(|| format!("{} is not an account, container, or object path", args.path))?;
    let config = match &args.config {
        Some(file) => {
            let raw = fs::read_to_string(file)
                .with_context(|| format!("reading config from {}", file.display()))?;
            DefaulterConfig::from_toml_str(&raw)
                .with_context(|| format!("parsing config from {}", file.display()))?
        }
        None => DefaulterConfig::default(),
    };

    let target = path.resource_type();
    let account = match (&args.account_metadata, target) {
        (Some(file), ResourceType::Container | ResourceType::Object) => load_metadata(file)?,
        _ => SysmetaMap::new(),
    };
    let container = match (&args.container_metadata, target) {
        (Some(file), ResourceType::Object) => load_metadata(file)?,
        _ => SysmetaMap::new(),
    };

    let resolver = DefaultsResolver::new(Arc::new(config));
    let defaults = resolver.resolve(target, &FormatArgs::from_path(&path), &account, &container);
    let report = Report {
        path: args.path.clone(),
        target,
        defaults: defaults
            .iter()
            .map(|(attribute, resolved)| {
                (
                    attribute.to_string(),
                    ReportEntry {
                        value: resolved.value.clone(),
                        source: resolved.source,
                        cleared: resolved.is_tombstone(),
                    },
                )
            })
            .collect(),
    };

    let mut out = io::stdout().lock();
    match args.format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &report).context("serialising report")?;
            writeln!(out)?;
        }
        OutputFormat::Text => write_text(&mut out, &report)?,
    }
    Ok(())
}

fn load_metadata(path: &Path) -> Result<SysmetaMap> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading metadata from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing metadata from {}", path.display()))
}

fn write_text<W: Write>(mut out: W, report: &Report) -> Result<()> {
    writeln!(out, "{} ({})", report.path, report.target)?;
    if report.defaults.is_empty() {
        writeln!(out, "  no defaults")?;
    }
    for (attribute, entry) in &report.defaults {
        let source = match entry.source {
            DefaultSource::Cluster => "cluster",
            DefaultSource::Account => "account",
            DefaultSource::Container => "container",
        };
        if entry.cleared {
            writeln!(out, "  {attribute}: <cleared> [{source}]")?;
        } else {
            writeln!(out, "  {attribute}: {} [{source}]", entry.value)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    run(Args::parse())
}
