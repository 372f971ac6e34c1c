//! Flowcore CLI - Command-line interface for the flowcore runtime
//!
//! Provides subcommands for inspecting actor definitions and running them
//! behind a string source.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use flowcore::runtime::actor::{self, Actor};
use flowcore::runtime::actors::{Display, StringConstants};
use flowcore::runtime::loader::ActorDefinition;
use flowcore::runtime::registry::{ActorCatalog, Registry};
use flowcore::runtime::render::{PresentationSurface, Renderer};
use flowcore::runtime::token::Token;
use flowcore::{Flow, FlowConfig};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "flowcore")]
#[command(about = "Actor execution core for visual dataflow workbenches", long_about = None)]
struct Cli {
    /// Flow configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Named setups, as NAME=DEFINITION.json
    #[arg(long = "setup", value_parser = parse_pair)]
    setups: Vec<(String, String)>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show kind, capabilities and options of an actor definition
    Inspect {
        /// Actor definition file
        definition: PathBuf,
    },

    /// Feed strings through an actor definition
    Run {
        /// Actor definition file
        definition: PathBuf,

        /// Strings emitted by the source, one token each
        #[arg(short, long = "token")]
        tokens: Vec<String>,

        /// Flow variables, as NAME=VALUE
        #[arg(long = "var", value_parser = parse_pair)]
        vars: Vec<(String, String)>,

        /// Run without presentation surface
        #[arg(long)]
        headless: bool,
    },

    /// List registered actor kinds
    Kinds,
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))
}

/// Prints every rendered token to stdout
struct ConsoleRenderer;

impl Renderer for ConsoleRenderer {
    fn render(&mut self, actor: &str, token: &Token) -> Result<(), String> {
        println!("[{}] {}", actor, token);
        Ok(())
    }
}

fn registry(setups: &[(String, String)]) -> anyhow::Result<Registry> {
    let mut registry = ActorCatalog::global().snapshot();
    for (name, path) in setups {
        let definition = ActorDefinition::read(Path::new(path))
            .with_context(|| format!("Failed to load setup '{}'", name))?;
        registry = registry.with_setup(name.clone(), definition);
    }
    Ok(registry)
}

fn load_actor(path: &Path, registry: &Registry) -> anyhow::Result<Box<dyn Actor>> {
    let definition = ActorDefinition::read(path)?;
    let actor = registry
        .instantiate(&definition)
        .with_context(|| format!("Failed to instantiate {:?}", path))?;
    Ok(actor)
}

fn inspect(actor: &mut dyn Actor) {
    println!("Kind: {}", actor.core().kind());
    println!("Name: {}", actor.core().name());
    println!("Capabilities: {}", actor::capabilities(actor));
    if let Some(consumer) = actor.as_consumer() {
        println!("Accepts: {}", consumer.accepts());
    }
    if let Some(producer) = actor.as_producer() {
        println!("Generates: {}", producer.generates());
    }

    println!("Options:");
    let descriptors: Vec<_> = actor::describe(actor).collect();
    for descriptor in descriptors {
        let value = actor::option_value(actor, descriptor.name)
            .map(|v| v.to_string())
            .unwrap_or_default();
        match actor.core().bindings().variable_for(descriptor.name) {
            Some(variable) => println!("  {} = @{{{}}}", descriptor.name, variable),
            None => println!("  {} = {}", descriptor.name, value),
        }
    }

    if let Some(info) = actor.quick_info() {
        println!("Quick info: {}", info);
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let registry = registry(&cli.setups)?;

    match cli.command {
        Commands::Inspect { definition } => {
            let mut actor = load_actor(&definition, &registry)?;
            inspect(actor.as_mut());
        }

        Commands::Run {
            definition,
            tokens,
            vars,
            headless,
        } => {
            let mut config = match &cli.config {
                Some(path) => FlowConfig::load(path)?,
                None => FlowConfig::default(),
            };
            config.headless |= headless;
            if config.definitions_root.is_none() {
                config.definitions_root = definition.parent().map(Path::to_path_buf);
            }

            let mut actor = load_actor(&definition, &registry)?;
            let needs_display = actor.as_producer().is_some();

            let mut flow = Flow::with_registry(config, registry);
            for (name, value) in vars {
                flow.context_mut().variables_mut().set(name, value);
            }

            let surface = if flow.config().headless {
                None
            } else {
                let surface = PresentationSurface::spawn(ConsoleRenderer)?;
                flow.context_mut().attach_surface(surface.handle());
                Some(surface)
            };

            flow.add(Box::new(StringConstants::with_strings(tokens)));
            flow.add(actor);
            if needs_display {
                flow.add(Box::new(Display::default()));
            }

            let report = flow.run();
            flow.tear_down();
            flow.context_mut().detach_surface();
            drop(flow);
            if let Some(surface) = surface {
                surface.join();
            }

            let report = report?;
            println!("Processed {} tokens", report.tokens);
            for error in &report.errors {
                println!("  error: {}", error);
            }
            if let Some(message) = report.stopped {
                println!("Stopped: {}", message);
            }
        }

        Commands::Kinds => {
            for kind in registry.list_kinds() {
                println!("{}", kind);
            }
            for setup in registry.list_setups() {
                println!("setup: {}", setup);
            }
        }
    }

    Ok(())
}
