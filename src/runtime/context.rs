//! Flow context
//!
//! Everything an actor may touch besides its own state is reached through the
//! [`FlowContext`] handed to `set_up` and `execute`: the blackboard, the flow
//! variables, the callable namespace, the registry snapshot and loader used
//! for indirection, the presentation surface, injected resources, and the
//! cooperative stop flag.

use parking_lot::Mutex;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::actor::{self, Actor};
use super::error::{ActorError, ActorResult};
use super::indirection::{share, SharedActor};
use super::loader::{ActorLoader, DefinitionLoader};
use super::registry::{ActorCatalog, Registry};
use super::render::SurfaceHandle;
use super::storage::Storage;
use super::variables::Variables;

/// Actors addressable by name from callable indirections
#[derive(Default)]
pub struct Callables {
    actors: BTreeMap<String, SharedActor>,
}

impl Callables {
    /// Create an empty namespace
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an actor under its own name
    pub fn register(&mut self, actor: Box<dyn Actor>) -> ActorResult<SharedActor> {
        let name = actor.core().name().to_string();
        if self.actors.contains_key(&name) {
            return Err(ActorError::configuration(format!(
                "duplicate callable actor name '{}'",
                name
            )));
        }

        let shared = share(actor);
        self.actors.insert(name, Arc::clone(&shared));
        Ok(shared)
    }

    /// Find a callable actor
    pub fn lookup(&self, name: &str) -> Option<SharedActor> {
        self.actors.get(name).map(Arc::clone)
    }

    /// Remove a callable actor
    pub fn remove(&mut self, name: &str) -> Option<SharedActor> {
        self.actors.remove(name)
    }

    /// Names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actors.keys().map(String::as_str)
    }

    /// All callable actors in name order
    pub fn handles(&self) -> Vec<SharedActor> {
        self.actors.values().map(Arc::clone).collect()
    }

    /// Number of callable actors
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Whether the namespace is empty
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

/// Cooperative stop flag shared between the driver and its callers
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
    message: Arc<Mutex<Option<String>>>,
}

impl StopSignal {
    /// Create an unset signal
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop; the first message wins
    pub fn stop(&self, message: impl Into<String>) {
        let mut slot = self.message.lock();
        if slot.is_none() {
            *slot = Some(message.into());
        }
        self.stopped.store(true, Ordering::Release);
    }

    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Message of the stop request
    pub fn message(&self) -> Option<String> {
        self.message.lock().clone()
    }

    /// Clear the signal for another run
    pub fn clear(&self) {
        *self.message.lock() = None;
        self.stopped.store(false, Ordering::Release);
    }
}

/// Runtime environment of a flow, passed to every actor hook
pub struct FlowContext {
    storage: Storage,
    variables: Variables,
    callables: Callables,
    registry: Registry,
    loader: Arc<dyn ActorLoader>,
    surface: Option<SurfaceHandle>,
    resources: HashMap<String, Arc<dyn Any + Send + Sync>>,
    stop: StopSignal,
    headless: bool,
    definitions_root: Option<PathBuf>,
}

impl FlowContext {
    /// Create a context around a registry snapshot
    pub fn new(registry: Registry) -> Self {
        Self {
            storage: Storage::new(),
            variables: Variables::new(),
            callables: Callables::new(),
            registry,
            loader: Arc::new(DefinitionLoader),
            surface: None,
            resources: HashMap::new(),
            stop: StopSignal::new(),
            headless: false,
            definitions_root: None,
        }
    }

    /// Context over the global catalog, for driving actors outside a flow
    pub fn detached() -> Self {
        Self::new(ActorCatalog::global().snapshot())
    }

    /// The blackboard
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Mutable blackboard
    pub fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }

    /// Flow variables
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Mutable flow variables
    pub fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }

    /// Callable namespace
    pub fn callables(&self) -> &Callables {
        &self.callables
    }

    /// Mutable callable namespace
    pub fn callables_mut(&mut self) -> &mut Callables {
        &mut self.callables
    }

    /// Registry snapshot
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Replace the registry snapshot
    pub fn set_registry(&mut self, registry: Registry) {
        self.registry = registry;
    }

    /// Loader for external references
    pub fn loader(&self) -> &dyn ActorLoader {
        self.loader.as_ref()
    }

    /// Replace the loader
    pub fn set_loader(&mut self, loader: Arc<dyn ActorLoader>) {
        self.loader = loader;
    }

    /// Attached presentation surface
    pub fn surface(&self) -> Option<&SurfaceHandle> {
        self.surface.as_ref()
    }

    /// Attach a presentation surface
    pub fn attach_surface(&mut self, surface: SurfaceHandle) {
        self.surface = Some(surface);
    }

    /// Detach the presentation surface
    pub fn detach_surface(&mut self) -> Option<SurfaceHandle> {
        self.surface.take()
    }

    /// Whether display actors should skip rendering
    pub fn is_headless(&self) -> bool {
        self.headless
    }

    /// Set headless mode
    pub fn set_headless(&mut self, headless: bool) {
        self.headless = headless;
    }

    /// Base directory for relative external references
    pub fn definitions_root(&self) -> Option<&Path> {
        self.definitions_root.as_deref()
    }

    /// Set the base directory for relative external references
    pub fn set_definitions_root(&mut self, root: Option<PathBuf>) {
        self.definitions_root = root;
    }

    /// Expand variables in a path and anchor it at the definitions root
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        let expanded = PathBuf::from(self.variables.expand(&path.to_string_lossy()));
        match &self.definitions_root {
            Some(root) if expanded.is_relative() => root.join(expanded),
            _ => expanded,
        }
    }

    /// Inject a shared resource under a key
    pub fn inject_resource<T: Any + Send + Sync>(&mut self, key: impl Into<String>, resource: Arc<T>) {
        self.resources.insert(key.into(), resource);
    }

    /// Remove an injected resource
    pub fn remove_resource(&mut self, key: &str) -> bool {
        self.resources.remove(key).is_some()
    }

    /// Fetch an injected resource of the expected type
    pub fn resource<T: Any + Send + Sync>(&self, key: &str) -> ActorResult<Arc<T>> {
        let resource = self.resources.get(key).ok_or_else(|| {
            ActorError::configuration(format!("resource '{}' not available", key))
        })?;

        Arc::clone(resource).downcast::<T>().map_err(|_| {
            ActorError::configuration(format!(
                "resource '{}' is not a {}",
                key,
                std::any::type_name::<T>()
            ))
        })
    }

    /// Stop signal shared with the driver
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Request a cooperative stop
    pub fn stop(&self, message: impl Into<String>) {
        self.stop.stop(message);
    }

    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Set up every callable actor, in name order
    pub fn set_up_callables(&mut self) -> ActorResult<()> {
        for handle in self.callables.handles() {
            let mut guard = handle.lock();
            let name = guard.core().full_name();
            actor::set_up(&mut **guard, self).map_err(|e| e.context(name))?;
        }
        Ok(())
    }

    /// Wrap up every callable actor
    pub fn wrap_up_callables(&mut self) {
        for handle in self.callables.handles() {
            actor::wrap_up(&mut **handle.lock());
        }
    }

    /// Tear down every callable actor and empty the namespace
    pub fn tear_down_callables(&mut self) {
        for handle in self.callables.handles() {
            actor::tear_down(&mut **handle.lock());
        }
        self.callables = Callables::new();
    }
}
