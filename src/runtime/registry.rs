//! Actor kind and named-setup registry
//!
//! Provides a global catalog for registering actor factories and named setups
//! before a flow starts. Each flow clones an immutable snapshot of the catalog,
//! so kinds or setups registered later do not change a running flow.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::actor::{self, Actor};
use super::actors;
use super::error::LoadError;
use super::loader::ActorDefinition;

/// Factory creating a default-configured actor of one kind
pub type ActorFactory = Arc<dyn Fn() -> Box<dyn Actor> + Send + Sync>;

/// Global catalog of actor kinds and named setups.
pub struct ActorCatalog {
    kinds: RwLock<HashMap<String, ActorFactory>>,
    setups: RwLock<HashMap<String, ActorDefinition>>,
}

static CATALOG: Lazy<ActorCatalog> = Lazy::new(|| {
    let catalog = ActorCatalog::new();
    actors::register_builtins(&catalog);
    catalog
});

impl ActorCatalog {
    /// Create an empty catalog (the global one comes with the built-in kinds)
    pub fn new() -> Self {
        Self {
            kinds: RwLock::new(HashMap::new()),
            setups: RwLock::new(HashMap::new()),
        }
    }

    /// Access the global catalog singleton.
    pub fn global() -> &'static Self {
        &CATALOG
    }

    /// Register an actor kind with a factory function.
    pub fn register<F>(&self, kind: &str, factory: F)
    where
        F: Fn() -> Box<dyn Actor> + Send + Sync + 'static,
    {
        self.kinds.write().insert(kind.to_string(), Arc::new(factory));
    }

    /// Register an actor kind that implements `Default`.
    pub fn register_default<T>(&self, kind: &str)
    where
        T: Actor + Default + 'static,
    {
        self.register(kind, || Box::new(T::default()));
    }

    /// Register a named setup, replacing any previous one of the same name.
    pub fn register_setup(&self, name: &str, definition: ActorDefinition) {
        self.setups.write().insert(name.to_string(), definition);
    }

    /// Remove a named setup.
    pub fn remove_setup(&self, name: &str) -> Option<ActorDefinition> {
        self.setups.write().remove(name)
    }

    /// Check whether a kind is registered.
    pub fn has_kind(&self, kind: &str) -> bool {
        self.kinds.read().contains_key(kind)
    }

    /// Produce an immutable snapshot for a flow.
    pub fn snapshot(&self) -> Registry {
        Registry {
            kinds: Arc::new(self.kinds.read().clone()),
            setups: Arc::new(self.setups.read().clone()),
        }
    }
}

impl Default for ActorCatalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable flow view of the catalog.
#[derive(Clone, Default)]
pub struct Registry {
    kinds: Arc<HashMap<String, ActorFactory>>,
    setups: Arc<HashMap<String, ActorDefinition>>,
}

impl Registry {
    /// Instantiate a default-configured actor of the given kind.
    pub fn create(&self, kind: &str) -> Result<Box<dyn Actor>, LoadError> {
        let factory = self
            .kinds
            .get(kind)
            .ok_or_else(|| LoadError::UnknownKind(kind.to_string()))?;
        Ok(factory())
    }

    /// Instantiate and configure an actor from a definition.
    pub fn instantiate(&self, definition: &ActorDefinition) -> Result<Box<dyn Actor>, LoadError> {
        let mut created = self.create(&definition.kind)?;

        if let Some(name) = &definition.name {
            created.core_mut().set_name(name.clone());
        }
        for (name, value) in &definition.options {
            actor::configure(&mut *created, name, value.clone())?;
        }
        for (property, variable) in &definition.variables {
            actor::bind_variable(&mut *created, property, variable)?;
        }

        Ok(created)
    }

    /// Look up a named setup.
    pub fn setup(&self, name: &str) -> Option<&ActorDefinition> {
        self.setups.get(name)
    }

    /// Instantiate a named setup; `None` if no setup has that name.
    pub fn instantiate_setup(&self, name: &str) -> Option<Result<Box<dyn Actor>, LoadError>> {
        self.setups.get(name).map(|definition| {
            let mut created = self.instantiate(definition)?;
            if definition.name.is_none() {
                created.core_mut().set_name(name);
            }
            Ok(created)
        })
    }

    /// Add a named setup to this snapshot only.
    pub fn with_setup(mut self, name: impl Into<String>, definition: ActorDefinition) -> Self {
        Arc::make_mut(&mut self.setups).insert(name.into(), definition);
        self
    }

    /// Add an actor kind to this snapshot only.
    pub fn with_kind<F>(mut self, kind: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Actor> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.kinds).insert(kind.into(), Arc::new(factory));
        self
    }

    /// Check whether the snapshot contains the specified kind.
    pub fn has_kind(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// List all kinds known to this snapshot, sorted.
    pub fn list_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.kinds.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// List all named setups known to this snapshot, sorted.
    pub fn list_setups(&self) -> Vec<String> {
        let mut setups: Vec<String> = self.setups.keys().cloned().collect();
        setups.sort();
        setups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::options::OptionValue;

    #[test]
    fn test_global_has_builtins() {
        let registry = ActorCatalog::global().snapshot();
        for kind in ["null", "string-constants", "callable-sink", "setup-sink", "external-sink"] {
            assert!(registry.has_kind(kind), "missing {}", kind);
        }
    }

    #[test]
    fn test_snapshot_is_isolated() {
        let catalog = ActorCatalog::new();
        let before = catalog.snapshot();
        catalog.register_setup("later", ActorDefinition::new("null"));

        assert!(before.setup("later").is_none());
        assert!(catalog.snapshot().setup("later").is_some());
    }

    #[test]
    fn test_instantiate_definition() {
        let registry = ActorCatalog::global().snapshot();
        let definition = ActorDefinition::new("null")
            .with_name("drain")
            .with_option("silent", true);

        let created = registry.instantiate(&definition).unwrap();
        assert_eq!(created.core().name(), "drain");
        assert_eq!(
            actor::option_value(&*created, "silent"),
            Some(OptionValue::Boolean(true))
        );
    }

    #[test]
    fn test_instantiate_errors() {
        let registry = ActorCatalog::global().snapshot();
        assert!(matches!(
            registry.instantiate(&ActorDefinition::new("no-such-kind")),
            Err(LoadError::UnknownKind(_))
        ));
        assert!(matches!(
            registry.instantiate(&ActorDefinition::new("null").with_option("bogus", 1i64)),
            Err(LoadError::Option(_))
        ));
    }

    #[test]
    fn test_named_setup_takes_setup_name() {
        let registry = Registry::default()
            .with_kind("null", || Box::new(actors::Null::default()))
            .with_setup("S", ActorDefinition::new("null"));

        let created = registry.instantiate_setup("S").unwrap().unwrap();
        assert_eq!(created.core().name(), "S");
        assert!(registry.instantiate_setup("T").is_none());
    }
}
