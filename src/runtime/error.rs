//! Error types for the flowcore runtime
//!
//! Domain errors use thiserror. Everything that crosses an actor boundary is
//! an [`ActorError`], whose `Display` output is the plain human-readable
//! message handed to the flow driver.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by actors from `set_up` and `execute`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActorError {
    /// Configuration is invalid; raised by `set_up` before any token is processed
    #[error("{0}")]
    Configuration(String),

    /// An indirection target lacks the capability the indirection site requires
    #[error("{0}")]
    RoleMismatch(String),

    /// A named or file reference could not be found or loaded
    #[error("{0}")]
    Resolution(String),

    /// The actor's own work failed
    #[error("{0}")]
    Execution(String),
}

impl ActorError {
    /// Build a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Build a role-mismatch error
    pub fn role_mismatch(msg: impl Into<String>) -> Self {
        Self::RoleMismatch(msg.into())
    }

    /// Build a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Build an execution error
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// The message without the kind
    pub fn message(&self) -> &str {
        match self {
            Self::Configuration(msg)
            | Self::RoleMismatch(msg)
            | Self::Resolution(msg)
            | Self::Execution(msg) => msg,
        }
    }

    /// Short label for the error kind, used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::RoleMismatch(_) => "role-mismatch",
            Self::Resolution(_) => "resolution",
            Self::Execution(_) => "execution",
        }
    }

    /// Prepend a contextual prefix, keeping the error kind
    ///
    /// Each indirection hop adds one prefix, so a failure several references
    /// deep still reads as a single line.
    pub fn context(self, prefix: impl std::fmt::Display) -> Self {
        let wrap = |msg: String| format!("{}: {}", prefix, msg);
        match self {
            Self::Configuration(msg) => Self::Configuration(wrap(msg)),
            Self::RoleMismatch(msg) => Self::RoleMismatch(wrap(msg)),
            Self::Resolution(msg) => Self::Resolution(wrap(msg)),
            Self::Execution(msg) => Self::Execution(wrap(msg)),
        }
    }
}

/// Convenience result alias for actor operations
pub type ActorResult<T> = std::result::Result<T, ActorError>;

/// Blackboard errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// No value stored under the key
    #[error("storage item '{0}' not found")]
    NotFound(String),

    /// The stored value has a different shape than requested
    #[error("storage item '{key}' is a {actual}, expected {expected}")]
    TypeMismatch {
        /// Storage key
        key: String,
        /// Requested type
        expected: &'static str,
        /// Type actually stored
        actual: &'static str,
    },

    /// The key contains characters outside the allowed set
    #[error("invalid storage name '{0}'")]
    InvalidName(String),

    /// No LRU cache was added under the name
    #[error("storage cache '{0}' not found")]
    UnknownCache(String),
}

/// Convenience result alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for ActorError {
    fn from(err: StorageError) -> Self {
        ActorError::Execution(err.to_string())
    }
}

/// Errors raised while loading an external actor definition
#[derive(Debug, Error)]
pub enum LoadError {
    /// The definition file could not be read
    #[error("failed to read actor definition {path:?}: {source}")]
    Io {
        /// Definition path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// The definition file is not a valid definition
    #[error("failed to parse actor definition {path:?}: {source}")]
    Parse {
        /// Definition path
        path: PathBuf,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// The definition names an actor kind nobody registered
    #[error("unknown actor kind '{0}'")]
    UnknownKind(String),

    /// An option in the definition was rejected by the actor
    #[error("invalid option: {0}")]
    Option(#[from] ActorError),
}

impl From<LoadError> for ActorError {
    fn from(err: LoadError) -> Self {
        match err {
            // option errors keep their own kind
            LoadError::Option(inner) => inner,
            other => ActorError::Resolution(other.to_string()),
        }
    }
}

/// Render rendezvous errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// A render job for the same actor instance is still outstanding
    #[error("render job for '{0}' still in progress")]
    Busy(String),

    /// The single render slot is occupied by another job
    #[error("render slot occupied")]
    SlotOccupied,

    /// The presentation surface has shut down
    #[error("presentation surface closed")]
    SurfaceClosed,

    /// The surface dropped the job without raising the completion signal
    #[error("render job abandoned by presentation surface")]
    Abandoned,

    /// The surface reported a rendering failure
    #[error("rendering failed: {0}")]
    Failed(String),
}

impl From<RenderError> for ActorError {
    fn from(err: RenderError) -> Self {
        ActorError::Execution(err.to_string())
    }
}

/// Flow driver errors
#[derive(Debug, Error)]
pub enum FlowError {
    /// Adjacent actors cannot be connected
    #[error("Assembly error: {0}")]
    Assembly(String),

    /// An actor failed and the error handling policy stopped the flow
    #[error("Actor error: {0}")]
    Actor(#[from] ActorError),
}

/// Result type using FlowError
pub type Result<T> = std::result::Result<T, FlowError>;
