use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use arbor_context::{
    ContextHandle, Direction, Environment, ServerMode, StatementContext, StatementContextResolver, WildcardResolver,
};
use arbor_core::{AddressTemplate, TemplateResolver};
use arbor_hub::HttpDispatcher;
use arbor_meta::{MetadataLookup, Settings};
use arbor_store::Metadata;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "arborctl", version, about = "Arbor CLI: management address templates and metadata")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Server mode (default: ARBOR_MODE or standalone)
    #[arg(long = "mode", global = true, value_parser = parse_mode)]
    mode: Option<ServerMode>,

    /// Placeholder binding, e.g. --set selected.host=primary (repeatable)
    #[arg(long = "set", global = true, value_parser = parse_binding, action = ArgAction::Append)]
    bindings: Vec<(String, String)>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a template and show its segments
    Parse {
        /// Encoded template, e.g. "/subsystem=logging/logger=org\/jboss"
        template: String,
    },
    /// Resolve placeholders and wildcards into a concrete address
    Resolve {
        template: String,
        /// Values for `*` segments, in substitution order (repeatable)
        #[arg(long = "wildcard", action = ArgAction::Append)]
        wildcards: Vec<String>,
        /// Substitute wildcards from the right
        #[arg(long = "rtl", action = ArgAction::SetTrue)]
        right_to_left: bool,
    },
    /// Print canonical cache keys
    Key {
        #[arg(required = true)]
        templates: Vec<String>,
    },
    /// Fetch metadata from a management endpoint
    Lookup {
        #[arg(required = true)]
        templates: Vec<String>,
        /// Include children up to ARBOR_RECURSIVE_DEPTH
        #[arg(long = "recursive", action = ArgAction::SetTrue)]
        recursive: bool,
        /// Management endpoint
        #[arg(long = "url", env = "ARBOR_URL", default_value = "http://localhost:9990/management")]
        url: String,
    },
    /// Fetch metadata, then print the repository contents
    Dump {
        templates: Vec<String>,
        #[arg(long = "url", env = "ARBOR_URL", default_value = "http://localhost:9990/management")]
        url: String,
    },
}

fn init_tracing() {
    let env = std::env::var("ARBOR_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("ARBOR_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid ARBOR_METRICS_ADDR; expected host:port");
        }
    }
}

fn parse_mode(s: &str) -> Result<ServerMode, String> { s.parse() }

fn parse_binding(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim().to_string(), value.to_string())),
        _ => Err(format!("invalid binding '{}' (expect name=value)", s)),
    }
}

fn statement_context(mode: ServerMode, bindings: &[(String, String)]) -> StatementContext {
    let mut ctx = StatementContext::new(Environment::new(mode));
    for (name, value) in bindings {
        ctx.assign_name(name, value.as_str());
    }
    ctx
}

#[derive(Serialize)]
struct SegmentRow<'a> {
    key: Option<&'a str>,
    value: &'a str,
    placeholder: bool,
}

#[derive(Serialize)]
struct ParsedTemplate<'a> {
    template: &'a str,
    fully_qualified: bool,
    segments: Vec<SegmentRow<'a>>,
}

#[derive(Serialize)]
struct Resolved {
    template: String,
    address: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
struct MetadataRow {
    template: String,
    key: String,
    empty: bool,
    recursive: bool,
    description: Option<String>,
    attributes: usize,
    operations: usize,
    readable: bool,
    writable: bool,
}

impl MetadataRow {
    fn new(template: &AddressTemplate, key: String, metadata: &Metadata) -> Self {
        let rd = metadata.resource_description();
        let sc = metadata.security_context();
        Self {
            template: template.to_string(),
            key,
            empty: metadata.is_empty(),
            recursive: metadata.is_recursive(),
            description: rd.description().map(str::to_string),
            attributes: rd.attributes().map_or(0, |a| a.len()),
            operations: rd.operations().map_or(0, |o| o.len()),
            readable: sc.readable(),
            writable: sc.writable(),
        }
    }
}

fn lookup_service(url: &str, context: ContextHandle, settings: Settings) -> Result<MetadataLookup> {
    let dispatcher = HttpDispatcher::new(url).context("creating management client")?;
    info!(endpoint = %url, mode = %settings.mode, "management endpoint");
    Ok(MetadataLookup::new(Arc::new(dispatcher), context, settings))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    let mut settings = Settings::from_env();
    if let Some(mode) = cli.mode {
        settings.mode = mode;
    }
    let context = ContextHandle::new(statement_context(settings.mode, &cli.bindings));

    match cli.command {
        Commands::Parse { template } => {
            let parsed = AddressTemplate::parse(&template);
            let rows = ParsedTemplate {
                template: parsed.template(),
                fully_qualified: parsed.is_fully_qualified(),
                segments: parsed
                    .iter()
                    .map(|s| SegmentRow { key: s.key.as_deref(), value: &s.value, placeholder: s.contains_placeholder() })
                    .collect(),
            };
            match cli.output {
                Output::Human => {
                    println!("template: {}", rows.template);
                    println!("fully qualified: {}", rows.fully_qualified);
                    println!("KEY                  VALUE");
                    for row in &rows.segments {
                        let marker = if row.placeholder { " (placeholder)" } else { "" };
                        println!("{:<20} {}{}", row.key.unwrap_or("-"), row.value, marker);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
            }
        }
        Commands::Resolve { template, wildcards, right_to_left } => {
            let direction = if right_to_left { Direction::RightToLeft } else { Direction::LeftToRight };
            let resolver = StatementContextResolver::new(context.load())
                .and_then(WildcardResolver::with_direction(direction, wildcards));
            let parsed = AddressTemplate::parse(&template);
            let resolved = resolver.resolve(&parsed);
            let out = match parsed.resolve(&resolver) {
                Ok(address) => Resolved { template: resolved.to_string(), address: Some(address.to_string()), error: None },
                Err(e) => Resolved { template: resolved.to_string(), address: None, error: Some(e.to_string()) },
            };
            match cli.output {
                Output::Human => match (&out.address, &out.error) {
                    (Some(address), _) => println!("{}", address),
                    (None, Some(e)) => {
                        println!("{}", out.template);
                        eprintln!("not concrete: {}", e);
                    }
                    (None, None) => println!("{}", out.template),
                },
                Output::Json => println!("{}", serde_json::to_string_pretty(&out)?),
            }
        }
        Commands::Key { templates } => {
            let repository = arbor_store::MetadataRepository::new(1, context);
            let keys: Vec<(String, String)> = templates
                .iter()
                .map(|t| (t.clone(), repository.canonical(&AddressTemplate::parse(t))))
                .collect();
            match cli.output {
                Output::Human => {
                    for (template, key) in &keys {
                        println!("{} → {}", template, key);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&keys)?),
            }
        }
        Commands::Lookup { templates, recursive, url } => {
            let service = lookup_service(&url, context, settings)?;
            let parsed: Vec<AddressTemplate> = templates.iter().map(|t| AddressTemplate::parse(t)).collect();
            let metadata = match service.process(&parsed, recursive).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    error!(error = %e, "lookup failed");
                    return Err(e).context("metadata lookup failed");
                }
            };
            let rows: Vec<MetadataRow> = parsed
                .iter()
                .zip(&metadata)
                .map(|(t, m)| MetadataRow::new(t, service.canonical(t), m))
                .collect();
            match cli.output {
                Output::Human => {
                    println!("TEMPLATE                                 ATTRS  OPS  R/W  DESCRIPTION");
                    for row in &rows {
                        let rw = format!("{}{}", if row.readable { "r" } else { "-" }, if row.writable { "w" } else { "-" });
                        let description = if row.empty { "(no metadata)".to_string() } else { row.description.clone().unwrap_or_default() };
                        println!("{:<40} {:>5} {:>4}  {:<3}  {}", row.template, row.attributes, row.operations, rw, description);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
            }
        }
        Commands::Dump { templates, url } => {
            let service = lookup_service(&url, context, settings)?;
            let parsed: Vec<AddressTemplate> = templates.iter().map(|t| AddressTemplate::parse(t)).collect();
            service.process(&parsed, false).await.context("metadata lookup failed")?;
            let dump = service.dump();
            match cli.output {
                Output::Human => {
                    println!("first-level: {}  second-level: {}", dump.first_level, dump.second_level);
                    for entry in &dump.entries {
                        println!("  {}", entry);
                    }
                    for processed in &dump.processed {
                        println!("{} → {}", processed.requested, processed.resolved.join(", "));
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&dump)?),
            }
        }
    }

    Ok(())
}
