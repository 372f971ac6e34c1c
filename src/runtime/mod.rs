//! Flow driver and public API
//!
//! This module provides the [`Flow`] struct, a minimal sequential driver that
//! assembles a linear pipeline of actors, checks their type contracts, runs
//! tokens through them, and applies the error handling policy.

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

// Submodules
pub mod actor;
pub mod actors;
pub mod context;
pub mod error;
pub mod indirection;
pub mod loader;
pub mod options;
pub mod registry;
pub mod render;
pub mod snapshot;
pub mod storage;
pub mod token;
pub mod variables;

use actor::{Actor, ActorCore};
use context::{FlowContext, StopSignal};
use error::{ActorError, FlowError, Result};
use indirection::SharedActor;
use registry::{ActorCatalog, Registry};
use token::{check_compatibility, Compatibility, Token};

/// How the driver reacts to an actor error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorHandling {
    /// Stop only if the failing actor has `stop-flow-on-error` set
    #[default]
    ActorsDecide,
    /// Stop on any actor error
    AlwaysStop,
}

/// Configuration for a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FlowConfig {
    /// Name of the flow, the root of every actor's full name
    pub name: String,

    /// Error handling policy
    pub error_handling: ErrorHandling,

    /// Run without presentation; display actors drop their tokens
    pub headless: bool,

    /// Base directory for relative external actor references
    pub definitions_root: Option<PathBuf>,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            name: "Flow".into(),
            error_handling: ErrorHandling::default(),
            headless: false,
            definitions_root: None,
        }
    }
}

impl FlowConfig {
    /// Load flow configuration
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read(path)
            .with_context(|| format!("Failed to read file: {:?}", path))?;
        let config: FlowConfig = serde_json::from_slice(&data)
            .context("Failed to deserialize config")?;

        Ok(config)
    }

    /// Write flow configuration
    ///
    /// Writes a temporary file, syncs it, then renames it into place.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(self)
            .context("Failed to serialize config")?;

        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {:?}", temp_path))?;
        file.write_all(&json)
            .context("Failed to write data")?;
        file.sync_all()
            .context("Failed to sync file")?;
        drop(file);

        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

        Ok(())
    }
}

/// Outcome of one pass through the flow
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Tokens emitted by the source
    pub tokens: usize,

    /// Recorded actor errors, each prefixed with the actor's full name
    pub errors: Vec<String>,

    /// Stop message, if the flow was stopped
    pub stopped: Option<String>,
}

impl RunReport {
    /// Whether the pass finished without errors or stop
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.stopped.is_none()
    }
}

/// A linear flow: one source followed by transformers and a final consumer
pub struct Flow {
    config: FlowConfig,
    context: FlowContext,
    actors: Vec<Box<dyn Actor>>,
}

impl Flow {
    /// Create a flow over the global catalog
    pub fn new(config: FlowConfig) -> Self {
        Self::with_registry(config, ActorCatalog::global().snapshot())
    }

    /// Create a flow over a specific registry snapshot
    pub fn with_registry(config: FlowConfig, registry: Registry) -> Self {
        let mut context = FlowContext::new(registry);
        context.set_headless(config.headless);
        context.set_definitions_root(config.definitions_root.clone());

        Self {
            config,
            context,
            actors: Vec::new(),
        }
    }

    /// Get the current configuration
    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Shared runtime environment
    pub fn context(&self) -> &FlowContext {
        &self.context
    }

    /// Mutable runtime environment
    pub fn context_mut(&mut self) -> &mut FlowContext {
        &mut self.context
    }

    /// Append an actor to the pipeline
    pub fn add(&mut self, mut actor: Box<dyn Actor>) -> &mut Self {
        actor.core_mut().set_parent(Some(self.config.name.clone()));
        self.actors.push(actor);
        self
    }

    /// Add an actor to the callable namespace
    pub fn add_callable(&mut self, mut actor: Box<dyn Actor>) -> Result<SharedActor> {
        actor
            .core_mut()
            .set_parent(Some(format!("{}.callables", self.config.name)));
        Ok(self.context.callables_mut().register(actor)?)
    }

    /// Pipeline actors in order
    pub fn actors(&self) -> &[Box<dyn Actor>] {
        &self.actors
    }

    /// Mutable access to a pipeline actor
    pub fn actor_mut(&mut self, index: usize) -> Option<&mut dyn Actor> {
        self.actors.get_mut(index).map(|actor| actor.as_mut() as &mut dyn Actor)
    }

    /// Stop signal, for stopping the flow from elsewhere
    pub fn stop_signal(&self) -> StopSignal {
        self.context.stop_signal()
    }

    /// Request a cooperative stop
    pub fn stop(&self, message: impl Into<String>) {
        self.context.stop(message);
    }

    /// Check the pipeline shape and the type contracts between neighbours
    pub fn assemble(&mut self) -> Result<()> {
        let count = self.actors.len();
        if count == 0 {
            return Err(FlowError::Assembly("flow contains no actors".into()));
        }

        for index in 0..count {
            let actor = &mut self.actors[index];
            let name = actor.core().full_name();
            if index == 0 && actor.as_producer().is_none() {
                return Err(FlowError::Assembly(format!("'{}' is not a source", name)));
            }
            if index > 0 && actor.as_consumer().is_none() {
                return Err(FlowError::Assembly(format!("'{}' does not accept input", name)));
            }
            if index > 0 && index + 1 < count && actor.as_producer().is_none() {
                return Err(FlowError::Assembly(format!("'{}' does not produce output", name)));
            }
        }

        for index in 1..count {
            let (producer, generates) = {
                let actor = &mut self.actors[index - 1];
                let generates = actor.as_producer().map(|p| p.generates()).unwrap_or_default();
                (actor.core().full_name(), generates)
            };
            let (consumer, accepts) = {
                let actor = &mut self.actors[index];
                let accepts = actor.as_consumer().map(|c| c.accepts()).unwrap_or_default();
                (actor.core().full_name(), accepts)
            };

            match check_compatibility(&generates, &accepts) {
                Compatibility::Compatible => {}
                Compatibility::Deferred => {
                    tracing::debug!(producer = %producer, consumer = %consumer, "type check deferred until resolution");
                }
                Compatibility::Incompatible => {
                    return Err(FlowError::Assembly(format!(
                        "'{}' generates {} but '{}' accepts {}",
                        producer, generates, consumer, accepts
                    )));
                }
            }
        }

        Ok(())
    }

    /// Set up the callable namespace, then every pipeline actor
    pub fn set_up(&mut self) -> Result<()> {
        self.context.stop_signal().clear();
        self.context.set_up_callables()?;

        for actor in self.actors.iter_mut() {
            let name = actor.core().full_name();
            actor::set_up(actor.as_mut(), &mut self.context).map_err(|e| e.context(name))?;
        }

        tracing::info!(flow = %self.config.name, actors = self.actors.len(), "flow set up");
        Ok(())
    }

    /// Execute the source once and push every token it emits downstream
    pub fn execute(&mut self) -> Result<RunReport> {
        let policy = self.config.error_handling;
        let context = &mut self.context;
        let Some((source, rest)) = self.actors.split_first_mut() else {
            return Err(FlowError::Assembly("flow contains no actors".into()));
        };

        let mut report = RunReport::default();
        if let Err(err) = actor::execute(source.as_mut(), context) {
            handle_error(source.core(), err, context, policy, &mut report)?;
        }

        while !context.is_stopped() {
            let Some(token) = actor::output(source.as_mut()) else {
                break;
            };
            report.tokens += 1;
            forward(rest, token, context, policy, &mut report)?;
        }

        report.stopped = context.stop_signal().message();
        if let Some(message) = &report.stopped {
            tracing::info!(flow = %self.config.name, "flow stopped: {}", message);
        }
        Ok(report)
    }

    /// Assemble, set up, execute once, and wrap up
    ///
    /// A failed set-up still wraps up whatever was set up before it.
    pub fn run(&mut self) -> Result<RunReport> {
        self.assemble()?;
        if let Err(err) = self.set_up() {
            self.wrap_up();
            return Err(err);
        }
        let report = self.execute();
        self.wrap_up();
        report
    }

    /// Wrap up every actor, pipeline first
    pub fn wrap_up(&mut self) {
        for actor in self.actors.iter_mut() {
            actor::wrap_up(actor.as_mut());
        }
        self.context.wrap_up_callables();
    }

    /// Tear down every actor and discard the blackboard
    pub fn tear_down(&mut self) {
        for actor in self.actors.iter_mut() {
            actor::tear_down(actor.as_mut());
        }
        self.context.tear_down_callables();
        self.context.storage_mut().clear();
    }
}

fn forward(
    actors: &mut [Box<dyn Actor>],
    token: Token,
    context: &mut FlowContext,
    policy: ErrorHandling,
    report: &mut RunReport,
) -> Result<()> {
    let Some((head, tail)) = actors.split_first_mut() else {
        return Ok(());
    };
    if context.is_stopped() {
        return Ok(());
    }

    let executed = match actor::input(head.as_mut(), token) {
        Ok(()) => actor::execute(head.as_mut(), context),
        Err(err) => Err(err),
    };
    if let Err(err) = executed {
        // outputs of a failed execution are not forwarded
        while actor::output(head.as_mut()).is_some() {}
        return handle_error(head.core(), err, context, policy, report);
    }

    while let Some(output) = actor::output(head.as_mut()) {
        forward(tail, output, context, policy, report)?;
        if context.is_stopped() {
            break;
        }
    }
    Ok(())
}

fn handle_error(
    core: &ActorCore,
    err: ActorError,
    context: &FlowContext,
    policy: ErrorHandling,
    report: &mut RunReport,
) -> Result<()> {
    let full_name = core.full_name();
    let message = format!("{}: {}", full_name, err);
    actor::report_error(core, &err);
    report.errors.push(message.clone());

    if policy == ErrorHandling::AlwaysStop || core.stop_flow_on_error() {
        context.stop(message);
        return Err(FlowError::Actor(err.context(full_name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_read_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("flow.json");

        let config = FlowConfig {
            name: "Main".into(),
            error_handling: ErrorHandling::AlwaysStop,
            headless: true,
            definitions_root: Some(temp.path().to_path_buf()),
        };
        config.save(&path).unwrap();

        assert_eq!(FlowConfig::load(&path).unwrap(), config);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_config_defaults_and_kebab_case() {
        let config: FlowConfig =
            serde_json::from_str(r#"{"error-handling": "always-stop"}"#).unwrap();
        assert_eq!(config.name, "Flow");
        assert_eq!(config.error_handling, ErrorHandling::AlwaysStop);
        assert!(!config.headless);
    }

    #[test]
    fn test_empty_flow_does_not_assemble() {
        let mut flow = Flow::new(FlowConfig::default());
        assert!(matches!(flow.assemble(), Err(FlowError::Assembly(_))));
    }
}
