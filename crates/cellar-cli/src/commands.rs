use std::path::Path;

use anyhow::Context;
use cellar_builder::{default_builders, default_resolvers, Buildable, ClientExt, PutOptions};
use cellar_client::{Client, ClientConfig, InMemoryClient};
use colored::Colorize;
use serde_json::json;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Put(args) => cmd_put(config, args, &cli.format),
        Command::Builders(_) => cmd_builders(&cli.format),
        Command::Config(_) => cmd_config(&config, &cli.format),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ClientConfig> {
    let base = match path {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => ClientConfig::default(),
    };
    base.with_overrides(|key| std::env::var(key).ok())
        .context("applying CELLAR_* overrides")
}

fn parse_value(raw: &str, kind: ValueKind) -> anyhow::Result<Box<dyn Buildable>> {
    let invalid = |what: &str| format!("{raw:?} is not {what}");
    let value: Box<dyn Buildable> = match kind {
        ValueKind::Int => Box::new(raw.parse::<i64>().with_context(|| invalid("an int"))?),
        ValueKind::Float => Box::new(raw.parse::<f64>().with_context(|| invalid("a float"))?),
        ValueKind::Bool => Box::new(raw.parse::<bool>().with_context(|| invalid("a bool"))?),
        ValueKind::String => Box::new(raw.to_string()),
        ValueKind::Bytes => Box::new(hex::decode(raw).with_context(|| invalid("hex"))?),
    };
    Ok(value)
}

fn cmd_put(config: ClientConfig, args: PutArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let value = parse_value(&args.value, args.kind)?;
    let client = InMemoryClient::with_config(config);

    let mut options = PutOptions::new().persist(args.persist);
    if let Some(name) = &args.name {
        options = options.name(name.clone());
    }
    let Some(id) = client.put(&*value, options)? else {
        println!("Builder created no object.");
        return Ok(());
    };

    let meta = client.get_meta(&id)?;
    let bound = match &args.name {
        Some(name) => client.get_name(name).ok() == Some(id),
        None => false,
    };

    match format {
        OutputFormat::Json => {
            let out = json!({ "id": id.to_string(), "name_bound": bound, "meta": meta });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("{} Put {}", "✓".green().bold(), id.to_string().yellow().bold());
            println!("  Type: {}", meta.typename.cyan());
            println!("  Bytes: {}", meta.nbytes);
            println!("  Persistent: {}", meta.persistent);
            for (key, field) in &meta.fields {
                println!("  Field {}: {}", key.bold(), field);
            }
            for (key, member) in &meta.members {
                println!("  Member {}: {}", key.bold(), member.to_string().yellow());
            }
            if let Some(name) = &args.name {
                if bound {
                    println!("  Name: {}", name.green());
                } else {
                    println!("  Name: {} ({})", name, "skipped, not persistent".dimmed());
                }
            }
        }
    }
    Ok(())
}

fn cmd_builders(format: &OutputFormat) -> anyhow::Result<()> {
    let builders = default_builders().type_names();
    let resolvers = default_resolvers().typenames();
    match format {
        OutputFormat::Json => {
            let out = json!({ "builders": builders, "resolvers": resolvers });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        OutputFormat::Text => {
            println!("{}", "Builders:".bold());
            for name in builders {
                println!("  {}", name.cyan());
            }
            println!("{}", "Resolvers:".bold());
            for name in resolvers {
                println!("  {}", name.cyan());
            }
        }
    }
    Ok(())
}

fn cmd_config(config: &ClientConfig, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text => {
            println!("instance_id = {}", config.instance_id.0);
            println!("memory_limit = {}", config.memory_limit);
            match &config.name_prefix {
                Some(prefix) => println!("name_prefix = {}", prefix.bold()),
                None => println!("name_prefix = (not set)"),
            }
        }
    }
    Ok(())
}
