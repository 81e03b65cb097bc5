//! Dashboard document CLI
//!
//! Inspect and validate exported dashboard documents (a JSON object of
//! `componentId → WidgetConfiguration`) without opening an editor.

use anyhow::{bail, Context};
use card_config::WidgetConfiguration;
use card_events::ConfigEventBus;
use card_store::{ConfigStateManager, ValidationContext};
use clap::{value_parser, Arg, ArgAction, Command};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

fn cli() -> Command {
    Command::new("card-session")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Card dashboard configuration tooling")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("inspect")
                .about("Summarize an exported dashboard document")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Path to the exported dashboard JSON"),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Validate every widget configuration in a document")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Path to the exported dashboard JSON"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Emit the validation reports as JSON"),
                ),
        )
}

fn load_document(path: &PathBuf) -> anyhow::Result<BTreeMap<String, WidgetConfiguration>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw).context("document is not valid JSON")?;
    let Value::Object(widgets) = value else {
        bail!("document root must be an object of componentId -> configuration");
    };

    let mut out = BTreeMap::new();
    for (id, config) in widgets {
        let config = WidgetConfiguration::from_value(config)
            .with_context(|| format!("widget '{id}' does not match the configuration schema"))?;
        out.insert(id, config);
    }
    Ok(out)
}

fn inspect(path: &PathBuf) -> anyhow::Result<()> {
    let widgets = load_document(path)?;
    println!("{} widget(s)", widgets.len());
    for (id, config) in &widgets {
        println!(
            "  {id}: title={:?} source={} interactions={} hash={}",
            config.base.title.as_deref().unwrap_or("-"),
            config.data_source.type_name(),
            config.interaction.len(),
            config.content_hash().short(),
        );
    }
    Ok(())
}

fn validate(path: &PathBuf, as_json: bool) -> anyhow::Result<()> {
    let widgets = load_document(path)?;
    let store = ConfigStateManager::new(Arc::new(ConfigEventBus::new()));

    let mut failed = false;
    let mut reports = BTreeMap::new();
    for (id, config) in &widgets {
        let report = store.validate(config, &ValidationContext::default());
        failed |= !report.is_valid();
        reports.insert(id.clone(), report);
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for (id, report) in &reports {
            println!("{id}: {report}");
            for issue in &report.issues {
                println!("    [{:?}] {}: {}", issue.severity, issue.path, issue.message);
            }
        }
    }

    if failed {
        bail!("validation failed");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match cli().get_matches().subcommand() {
        Some(("inspect", matches)) => {
            let file = matches
                .get_one::<PathBuf>("file")
                .expect("required argument");
            inspect(file)
        }
        Some(("validate", matches)) => {
            let file = matches
                .get_one::<PathBuf>("file")
                .expect("required argument");
            validate(file, matches.get_flag("json"))
        }
        _ => unreachable!("subcommand required"),
    }
}
