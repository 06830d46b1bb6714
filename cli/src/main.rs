//! Operator CLI for the notebook runner core
//!
//! Exercises preprocessing, rendering and output path resolution without
//! the HTTP layer. Templates are loaded from a JSON file into the
//! in-memory store, so resolution behavior can be inspected against the
//! same template set the service would use.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use notebook_runner_core_rs::{
    paths, InMemoryTemplateStore, LocationKind, OutputPathResolver, ResolutionSource, RunRequest,
    SystemClock, Template, TemplateArgs, TemplateRenderer, TemplateSpec, TimeParts,
};

#[derive(Parser)]
#[command(name = "nbrun", about = "Inspect notebook output-path resolution")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Location {
    /// Object storage
    S3,
    /// Local filesystem
    Local,
}

impl From<Location> for LocationKind {
    fn from(location: Location) -> Self {
        match location {
            Location::S3 => LocationKind::ObjectStore,
            Location::Local => LocationKind::Local,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print the output filename a run started now would produce
    Filename {
        /// Raw notebook reference
        notebook: String,
    },

    /// Classify a notebook reference and print its components
    Classify {
        /// Raw notebook reference
        notebook: String,

        /// Storage kind; inferred from the scheme prefix when omitted
        #[arg(long, value_enum)]
        location: Option<Location>,
    },

    /// Render a template string against the standard arguments
    Render {
        /// Template content, e.g. "s3://reports/{{args.year}}/"
        content: String,

        /// Extra argument as name=value (repeatable)
        #[arg(long = "arg", value_parser = parse_key_val)]
        args: Vec<(String, String)>,
    },

    /// Resolve the output location for a hypothetical run
    Resolve {
        /// Raw notebook reference
        notebook: String,

        /// Storage kind; inferred from the scheme prefix when omitted
        #[arg(long, value_enum)]
        location: Option<Location>,

        /// JSON template file: [{"name", "content", "default"?}]
        #[arg(long)]
        templates: Option<PathBuf>,

        /// Name of a stored template to render
        #[arg(long)]
        template: Option<String>,

        /// Output path supplied directly (exclusive with --template)
        #[arg(long)]
        output_path: Option<String>,

        /// Template argument as name=value (repeatable)
        #[arg(long = "arg", value_parser = parse_key_val)]
        args: Vec<(String, String)>,
    },
}

/// One entry of the JSON template file
#[derive(Debug, Deserialize)]
struct TemplateEntry {
    name: String,
    content: String,
    #[serde(default)]
    default: bool,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got {:?}", raw))
}

fn load_store(path: Option<&PathBuf>) -> Result<InMemoryTemplateStore> {
    let mut store = InMemoryTemplateStore::new();
    let Some(path) = path else {
        return Ok(store);
    };

    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read template file {}", path.display()))?;
    let entries: Vec<TemplateEntry> = serde_json::from_str(&raw)
        .with_context(|| format!("malformed template file {}", path.display()))?;

    for entry in entries {
        store.insert(Template::new(&entry.name, &entry.content))?;
        if entry.default {
            store.set_default(&entry.name)?;
        }
    }
    Ok(store)
}

fn source_label(source: &ResolutionSource) -> String {
    match source {
        ResolutionSource::NamedTemplate { name } => format!("template '{}'", name),
        ResolutionSource::ExplicitPath => "explicit output path".to_string(),
        ResolutionSource::DefaultTemplate { name } => format!("default template '{}'", name),
        ResolutionSource::SourceDirectory => "notebook source directory".to_string(),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let clock = SystemClock;

    match cli.command {
        Command::Filename { notebook } => {
            let parts = TimeParts::now(&clock);
            println!("{}", paths::build_output_filename(&notebook, &parts));
        }

        Command::Classify { notebook, location } => {
            let classified = paths::classify(&notebook, location.map(Into::into))?;
            println!("{}", serde_json::to_string_pretty(&classified)?);
        }

        Command::Render { content, args } => {
            let mut template_args: TemplateArgs = args.into_iter().collect();
            template_args.apply_time(&TimeParts::now(&clock));
            let rendered = TemplateRenderer::new().render(&content, &template_args)?;
            println!("{}", rendered);
        }

        Command::Resolve {
            notebook,
            location,
            templates,
            template,
            output_path,
            args,
        } => {
            let store = load_store(templates.as_ref())?;

            let mut request = RunRequest::prepare(&notebook, location.map(Into::into), &clock)?;
            if let Some(name) = template {
                let mut spec = TemplateSpec::named(name);
                for (key, value) in args {
                    spec = spec.with_arg(key, value);
                }
                request = request.with_template(spec);
            }
            if let Some(path) = output_path {
                request = request.with_output_path(path);
            }

            OutputPathResolver::validate(&request)?;
            let resolved = OutputPathResolver::new().resolve(&store, &request, &clock)?;

            println!("{}", resolved.path());
            eprintln!(
                "via {}; output file {}",
                source_label(resolved.source()),
                paths::join_output(resolved.path(), request.computed_output_filename())
            );
        }
    }

    Ok(())
}
