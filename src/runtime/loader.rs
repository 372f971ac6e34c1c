//! Actor definitions and the external-definition loader
//!
//! An [`ActorDefinition`] names an actor kind plus its option values and
//! variable bindings. Named setups are definitions kept in the registry;
//! external references are definition files read by an [`ActorLoader`].

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::actor::Actor;
use super::error::LoadError;
use super::options::OptionValue;
use super::registry::Registry;

/// Serializable description of one actor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ActorDefinition {
    /// Registered kind
    pub kind: String,

    /// Actor name; the kind's default name when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Option values by property name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, OptionValue>,

    /// Variable bindings by property name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
}

impl ActorDefinition {
    /// Definition of a kind with default settings
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            options: BTreeMap::new(),
            variables: BTreeMap::new(),
        }
    }

    /// Set the name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set an option value
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    /// Bind an option to a variable
    pub fn with_variable(mut self, property: impl Into<String>, variable: impl Into<String>) -> Self {
        self.variables.insert(property.into(), variable.into());
        self
    }

    /// Read a definition file
    pub fn read(path: &Path) -> Result<Self, LoadError> {
        let data = fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_slice(&data).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write a definition file
    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(self).context("Failed to serialize actor definition")?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write actor definition: {:?}", path))
    }
}

/// Turns a definition file into an actor
pub trait ActorLoader: Send + Sync {
    /// Load and instantiate the actor defined at `path`
    fn load(&self, path: &Path, registry: &Registry) -> Result<Box<dyn Actor>, LoadError>;
}

/// Loader for JSON [`ActorDefinition`] files
#[derive(Debug, Clone, Copy, Default)]
pub struct DefinitionLoader;

impl ActorLoader for DefinitionLoader {
    fn load(&self, path: &Path, registry: &Registry) -> Result<Box<dyn Actor>, LoadError> {
        let definition = ActorDefinition::read(path)?;
        tracing::debug!(path = ?path, kind = %definition.kind, "loading actor definition");
        registry.instantiate(&definition)
    }
}
