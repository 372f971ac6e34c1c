//! Indirection actors
//!
//! An [`Indirection`] forwards its tokens to a target actor found through a
//! [`Reference`]: a callable actor in the flow's namespace, a named setup in
//! the registry, or an actor definition file. The target is resolved lazily,
//! validated against the [`Role`] of the indirection site, and cached until
//! the next `reset`.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::actor::{
    self, Actor, ActorCore, Capabilities, Capability, InputConsumer, OutputProducer, Resettable,
    VariableAware,
};
use super::context::FlowContext;
use super::error::{ActorError, ActorResult};
use super::options::{OptionDescriptor, OptionValue, QuickInfo};
use super::snapshot::StateSnapshot;
use super::token::{Token, TypeSet};

/// An actor shared between its owner and the indirections pointing at it
pub type SharedActor = Arc<Mutex<Box<dyn Actor>>>;

/// Wrap an actor for sharing
pub fn share(actor: Box<dyn Actor>) -> SharedActor {
    Arc::new(Mutex::new(actor))
}

/// How a reference is looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Name in the flow's callable namespace
    Callable,
    /// Name in the registry's named setups
    NamedSetup,
    /// Path of an actor definition file
    External,
}

impl ReferenceKind {
    /// Property holding the reference
    pub fn option_name(self) -> &'static str {
        match self {
            ReferenceKind::Callable => "callable",
            ReferenceKind::NamedSetup => "setup",
            ReferenceKind::External => "file",
        }
    }

    /// Build a reference of this kind
    pub fn reference(self, value: &str) -> Reference {
        match self {
            ReferenceKind::Callable => Reference::Callable(value.to_string()),
            ReferenceKind::NamedSetup => Reference::NamedSetup(value.to_string()),
            ReferenceKind::External => Reference::External(PathBuf::from(value)),
        }
    }

    fn options(self) -> &'static [OptionDescriptor] {
        match self {
            ReferenceKind::Callable => CALLABLE_OPTIONS,
            ReferenceKind::NamedSetup => SETUP_OPTIONS,
            ReferenceKind::External => EXTERNAL_OPTIONS,
        }
    }
}

/// Lookup key of an indirection target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Callable actor name
    Callable(String),
    /// Named setup name
    NamedSetup(String),
    /// Actor definition file
    External(PathBuf),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Callable(name) => write!(f, "callable actor '{}'", name),
            Reference::NamedSetup(name) => write!(f, "named setup '{}'", name),
            Reference::External(path) => write!(f, "external actor '{}'", path.display()),
        }
    }
}

/// Capability an indirection site requires from its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Generates tokens
    Source,
    /// Accepts and generates tokens
    Transformer,
    /// Accepts tokens
    Sink,
}

impl Role {
    /// Human-readable role name
    pub fn label(self) -> &'static str {
        match self {
            Role::Source => "source",
            Role::Transformer => "transformer",
            Role::Sink => "sink",
        }
    }

    /// Capabilities the target must have
    pub fn required(self) -> &'static [Capability] {
        match self {
            Role::Source => &[Capability::OutputProducer],
            Role::Transformer => &[Capability::InputConsumer, Capability::OutputProducer],
            Role::Sink => &[Capability::InputConsumer],
        }
    }

    /// Whether a capability table satisfies this role
    pub fn admits(self, capabilities: Capabilities) -> bool {
        self.required().iter().all(|c| capabilities.contains(*c))
    }
}

/// A resolved and validated indirection target
#[derive(Clone)]
pub struct ResolvedTarget {
    reference: Reference,
    actor: SharedActor,
    owned: bool,
    epoch: u64,
}

impl ResolvedTarget {
    /// Reference the target was resolved from
    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    /// The target
    pub fn actor(&self) -> &SharedActor {
        &self.actor
    }

    /// Whether the indirection instantiated the target itself
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Configuration epoch of the resolution
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Release the target; owned targets are wrapped up and torn down
    fn retire(self) {
        if !self.owned {
            return;
        }

        match self.actor.try_lock() {
            Some(mut guard) => actor::tear_down(&mut **guard),
            None => tracing::warn!(reference = %self.reference, "owned target busy, not torn down"),
        }
    }
}

static CALLABLE_OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor::text("callable", "", "The name of the callable actor to use."),
    OptionDescriptor::flag(
        "optional",
        false,
        "If set, a callable actor that cannot be found is ignored.",
    ),
];

static SETUP_OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor::text("setup", "", "The name of the named setup to instantiate."),
    OptionDescriptor::flag(
        "optional",
        false,
        "If set, a named setup that cannot be found is ignored.",
    ),
];

static EXTERNAL_OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor::text("file", "", "The actor definition file to load."),
    OptionDescriptor::flag(
        "optional",
        false,
        "If set, a definition file that does not exist is ignored.",
    ),
];

/// Registered kind name for a reference kind and role
pub fn kind_name(kind: ReferenceKind, role: Role) -> &'static str {
    match (kind, role) {
        (ReferenceKind::Callable, Role::Source) => "callable-source",
        (ReferenceKind::Callable, Role::Transformer) => "callable-transformer",
        (ReferenceKind::Callable, Role::Sink) => "callable-sink",
        (ReferenceKind::NamedSetup, Role::Source) => "setup-source",
        (ReferenceKind::NamedSetup, Role::Transformer) => "setup-transformer",
        (ReferenceKind::NamedSetup, Role::Sink) => "setup-sink",
        (ReferenceKind::External, Role::Source) => "external-source",
        (ReferenceKind::External, Role::Transformer) => "external-transformer",
        (ReferenceKind::External, Role::Sink) => "external-sink",
    }
}

/// Actor that forwards to a late-bound target
pub struct Indirection {
    core: ActorCore,
    kind: ReferenceKind,
    role: Role,
    target: String,
    optional: bool,
    resolved: Option<ResolvedTarget>,
    missing_epoch: Option<u64>,
    epoch: u64,
    lookups: u64,
    outputs: VecDeque<Token>,
}

impl Indirection {
    /// Create an unconfigured indirection
    pub fn new(kind: ReferenceKind, role: Role) -> Self {
        let name = kind_name(kind, role);
        Self {
            core: ActorCore::new(name, name),
            kind,
            role,
            target: String::new(),
            optional: false,
            resolved: None,
            missing_epoch: None,
            epoch: 0,
            lookups: 0,
            outputs: VecDeque::new(),
        }
    }

    /// Indirection to a callable actor
    pub fn callable(role: Role, name: impl Into<String>) -> Self {
        Self::new(ReferenceKind::Callable, role).with_target(name)
    }

    /// Indirection to a named setup
    pub fn named_setup(role: Role, name: impl Into<String>) -> Self {
        Self::new(ReferenceKind::NamedSetup, role).with_target(name)
    }

    /// Indirection to an actor definition file
    pub fn external(role: Role, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self::new(ReferenceKind::External, role).with_target(path.to_string_lossy())
    }

    /// Set the reference value
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Mark as optional
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    /// Current reference
    pub fn reference(&self) -> Reference {
        self.kind.reference(&self.target)
    }

    /// Role of this site
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether an unresolvable reference is ignored
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Cached target, if resolved
    pub fn resolved(&self) -> Option<&ResolvedTarget> {
        self.resolved.as_ref()
    }

    /// Configuration epoch; bumped by every reset
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of lookups performed so far
    pub fn lookups(&self) -> u64 {
        self.lookups
    }

    /// Resolve the target, reusing the cached one if present
    ///
    /// Returns `None` when an optional reference cannot be found; that outcome
    /// is remembered until the next reset.
    pub fn resolve(&mut self, ctx: &mut FlowContext) -> ActorResult<Option<SharedActor>> {
        if let Some(resolved) = &self.resolved {
            tracing::debug!(actor = %self.core.full_name(), reference = %resolved.reference, "cached target");
            return Ok(Some(Arc::clone(&resolved.actor)));
        }
        if self.missing_epoch == Some(self.epoch) {
            return Ok(None);
        }

        let reference = self.reference();
        self.lookups += 1;

        let Some((target, owned)) = self.lookup(&reference, ctx)? else {
            if self.optional {
                tracing::info!(actor = %self.core.full_name(), "{} not found, ignoring", reference);
                self.missing_epoch = Some(self.epoch);
                return Ok(None);
            }
            return Err(ActorError::resolution(format!("couldn't find {}", reference)));
        };

        {
            let mut guard = target.try_lock().ok_or_else(|| {
                ActorError::execution(format!("{} is currently executing", reference))
            })?;

            let capabilities = actor::capabilities(&mut **guard);
            if !self.role.admits(capabilities) {
                return Err(ActorError::role_mismatch(format!(
                    "{} is not a {}",
                    reference,
                    self.role.label()
                )));
            }

            if owned {
                guard.core_mut().set_parent(Some(self.core.full_name()));
                actor::set_up(&mut **guard, ctx).map_err(|e| e.context(&reference))?;
            }
        }

        tracing::info!(actor = %self.core.full_name(), reference = %reference, owned, "resolved");
        self.resolved = Some(ResolvedTarget {
            reference,
            actor: Arc::clone(&target),
            owned,
            epoch: self.epoch,
        });
        Ok(Some(target))
    }

    fn lookup(
        &self,
        reference: &Reference,
        ctx: &mut FlowContext,
    ) -> ActorResult<Option<(SharedActor, bool)>> {
        match reference {
            Reference::Callable(name) => Ok(ctx.callables().lookup(name).map(|a| (a, false))),
            Reference::NamedSetup(name) => match ctx.registry().instantiate_setup(name) {
                None => Ok(None),
                Some(created) => {
                    let created = created.map_err(|e| ActorError::from(e).context(reference))?;
                    Ok(Some((share(created), true)))
                }
            },
            Reference::External(path) => {
                let path = ctx.resolve_path(path);
                if !path.is_file() {
                    return Ok(None);
                }
                let loaded = ctx
                    .loader()
                    .load(&path, ctx.registry())
                    .map_err(ActorError::from)?;
                Ok(Some((share(loaded), true)))
            }
        }
    }

    fn forward(&mut self, target: &SharedActor, ctx: &mut FlowContext) -> ActorResult<()> {
        let token = self.core.take_input();
        if self.role != Role::Source && token.is_none() {
            return Ok(());
        }

        let mut guard = target.try_lock().ok_or_else(|| {
            ActorError::execution(format!("{} is currently executing", self.reference()))
        })?;
        let prefix = guard.core().full_name();

        if let Some(token) = token {
            actor::input(&mut **guard, token).map_err(|e| e.context(&prefix))?;
        }
        actor::execute(&mut **guard, ctx).map_err(|e| e.context(&prefix))?;

        if self.role != Role::Sink {
            while let Some(token) = actor::output(&mut **guard) {
                self.outputs.push_back(token);
            }
        }
        Ok(())
    }
}

impl Actor for Indirection {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn options(&self) -> &'static [OptionDescriptor] {
        self.kind.options()
    }

    fn set_option(&mut self, name: &str, value: &OptionValue) -> ActorResult<()> {
        match (name, value) {
            (n, OptionValue::Text(target)) if n == self.kind.option_name() => {
                self.target = target.clone();
                Ok(())
            }
            ("optional", OptionValue::Boolean(optional)) => {
                self.optional = *optional;
                Ok(())
            }
            _ => Err(ActorError::configuration(format!(
                "unknown option '{}' for {}",
                name,
                self.core.kind()
            ))),
        }
    }

    fn option(&self, name: &str) -> Option<OptionValue> {
        match name {
            n if n == self.kind.option_name() => Some(OptionValue::Text(self.target.clone())),
            "optional" => Some(OptionValue::Boolean(self.optional)),
            _ => None,
        }
    }

    fn quick_info(&self) -> Option<String> {
        let property = self.kind.option_name();
        QuickInfo::new(self.core.bindings())
            .value(property, property, &self.target)
            .flag("optional", "optional", self.optional)
            .finish()
    }

    fn set_up(&mut self, ctx: &mut FlowContext) -> ActorResult<()> {
        let property = self.kind.option_name();
        if self.core.is_bound(property) {
            tracing::debug!(actor = %self.core.full_name(), "reference is variable-bound, resolving at execution");
            return Ok(());
        }

        if self.target.is_empty() {
            return Err(ActorError::configuration(format!("no '{}' specified", property)));
        }

        self.resolve(ctx).map(|_| ())
    }

    fn do_execute(&mut self, ctx: &mut FlowContext) -> ActorResult<()> {
        let Some(target) = self.resolve(ctx)? else {
            self.core.clear_input();
            return Ok(());
        };
        self.forward(&target, ctx)
    }

    fn wrap_up(&mut self) {
        self.outputs.clear();
        if let Some(resolved) = self.resolved.take() {
            resolved.retire();
        }
    }

    fn as_consumer(&mut self) -> Option<&mut dyn InputConsumer> {
        if self.role == Role::Source {
            None
        } else {
            Some(self)
        }
    }

    fn as_producer(&mut self) -> Option<&mut dyn OutputProducer> {
        if self.role == Role::Sink {
            None
        } else {
            Some(self)
        }
    }

    fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
        Some(self)
    }

    fn as_variable_aware(&mut self) -> Option<&mut dyn VariableAware> {
        Some(self)
    }
}

impl InputConsumer for Indirection {
    fn accepts(&self) -> TypeSet {
        self.resolved
            .as_ref()
            .and_then(|resolved| resolved.actor.try_lock())
            .and_then(|mut guard| guard.as_consumer().map(|c| c.accepts()))
            .unwrap_or_else(TypeSet::unknown)
    }
}

impl OutputProducer for Indirection {
    fn generates(&self) -> TypeSet {
        self.resolved
            .as_ref()
            .and_then(|resolved| resolved.actor.try_lock())
            .and_then(|mut guard| guard.as_producer().map(|p| p.generates()))
            .unwrap_or_else(TypeSet::unknown)
    }

    fn has_pending_output(&self) -> bool {
        !self.outputs.is_empty()
    }

    fn output(&mut self) -> Option<Token> {
        self.outputs.pop_front()
    }
}

impl Resettable for Indirection {
    fn reset(&mut self) {
        self.epoch += 1;
        self.missing_epoch = None;
        self.outputs.clear();
        if let Some(resolved) = self.resolved.take() {
            resolved.retire();
        }
    }
}

impl VariableAware for Indirection {
    fn backup_state(&mut self, snapshot: &mut StateSnapshot) {
        snapshot.resolved_target = self.resolved.take();
        if !self.outputs.is_empty() {
            snapshot.pending_output = Some(std::mem::take(&mut self.outputs));
        }
        self.core.backup_state(snapshot);
    }

    fn restore_state(&mut self, snapshot: &mut StateSnapshot) {
        if let Some(mut backed_up) = snapshot.resolved_target.take() {
            if backed_up.reference == self.reference() {
                backed_up.epoch = self.epoch;
                let fresh = self.resolved.replace(backed_up);
                if let (Some(fresh), Some(current)) = (fresh, &self.resolved) {
                    if !Arc::ptr_eq(&fresh.actor, &current.actor) {
                        fresh.retire();
                    }
                }
            } else {
                tracing::debug!(
                    actor = %self.core.full_name(),
                    previous = %backed_up.reference,
                    "reference changed, discarding cached target"
                );
                backed_up.retire();
            }
        }

        if let Some(outputs) = snapshot.pending_output.take() {
            self.outputs = outputs;
        }
        self.core.restore_state(snapshot);
    }
}
