//! Actors, capabilities, and the lifecycle driver
//!
//! Every actor implements [`Actor`], which gives access to its [`ActorCore`]
//! (name, common flags, pending input, variable bindings, lifecycle state)
//! and the hooks the driver calls. Optional behaviour is exposed through the
//! capability accessors (`as_consumer`, `as_producer`, ...) so the runtime can
//! ask a type-erased actor what it can do without downcasting.
//!
//! The free functions in this module ([`set_up`], [`execute`], [`wrap_up`],
//! [`tear_down`]) are the only way the runtime drives an actor. They enforce
//! the lifecycle ordering and the transient-state guarantees; the trait
//! methods of the same names are the per-actor hooks.

use std::fmt;
use uuid::Uuid;

use super::context::FlowContext;
use super::error::{ActorError, ActorResult};
use super::options::{
    find_descriptor, Bindings, OptionDescriptor, OptionKind, OptionValue, COMMON_OPTIONS,
};
use super::snapshot::{self, StateSnapshot};
use super::token::{Token, TypeSet};
use super::variables::{self, Variables};

/// Lifecycle position of an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Created, nothing configured yet
    Constructed,
    /// At least one option applied
    Configured,
    /// `set_up` succeeded; tokens may be fed in
    ReadyForInput,
    /// Inside `execute`
    Executing,
    /// `wrap_up` ran; a new `set_up` starts another run
    WrappedUp,
    /// Terminal
    TornDown,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Constructed => "constructed",
            LifecycleState::Configured => "configured",
            LifecycleState::ReadyForInput => "ready-for-input",
            LifecycleState::Executing => "executing",
            LifecycleState::WrappedUp => "wrapped-up",
            LifecycleState::TornDown => "torn-down",
        };
        f.write_str(name)
    }
}

/// A single capability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Lifecycle hooks; every actor has it
    Lifecycle,
    /// Accepts tokens through `input`
    InputConsumer,
    /// Emits tokens through `output`
    OutputProducer,
    /// Has cached state that `reset` clears
    Resettable,
    /// Carries state across reconfiguration through backup/restore
    VariableAware,
}

impl Capability {
    fn bit(self) -> u8 {
        match self {
            Capability::Lifecycle => 1,
            Capability::InputConsumer => 1 << 1,
            Capability::OutputProducer => 1 << 2,
            Capability::Resettable => 1 << 3,
            Capability::VariableAware => 1 << 4,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Capability::Lifecycle => "lifecycle",
            Capability::InputConsumer => "input-consumer",
            Capability::OutputProducer => "output-producer",
            Capability::Resettable => "resettable",
            Capability::VariableAware => "variable-aware",
        }
    }

    const ALL: [Capability; 5] = [
        Capability::Lifecycle,
        Capability::InputConsumer,
        Capability::OutputProducer,
        Capability::Resettable,
        Capability::VariableAware,
    ];
}

/// Capability table of one actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    /// Add a capability
    pub fn with(self, capability: Capability) -> Self {
        Self(self.0 | capability.bit())
    }

    /// Whether the table has the capability
    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    /// Iterate over the capabilities present
    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels: Vec<&str> = self.iter().map(Capability::label).collect();
        f.write_str(&labels.join(", "))
    }
}

/// State shared by every actor, owned by the actor itself
#[derive(Debug)]
pub struct ActorCore {
    id: Uuid,
    kind: &'static str,
    name: String,
    parent: Option<String>,
    state: LifecycleState,
    skip: bool,
    silent: bool,
    stop_flow_on_error: bool,
    input: Option<Token>,
    bindings: Bindings,
    executions: u64,
}

impl ActorCore {
    /// Create a core for an actor of the given kind
    pub fn new(kind: &'static str, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: name.into(),
            parent: None,
            state: LifecycleState::Constructed,
            skip: false,
            silent: false,
            stop_flow_on_error: false,
            input: None,
            bindings: Bindings::default(),
            executions: 0,
        }
    }

    /// Instance identity
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Registered kind name
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Short name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the actor
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Set the full name of the enclosing container
    pub fn set_parent(&mut self, parent: Option<String>) {
        self.parent = parent;
    }

    /// Dotted path from the flow root, used as error prefix
    pub fn full_name(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{}.{}", parent, self.name),
            None => self.name.clone(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Whether the actor is skipped
    pub fn skip(&self) -> bool {
        self.skip
    }

    /// Whether failures are kept off the console
    pub fn silent(&self) -> bool {
        self.silent
    }

    /// Whether a failure of this actor stops the flow
    pub fn stop_flow_on_error(&self) -> bool {
        self.stop_flow_on_error
    }

    /// Store a token for the next execution
    pub fn set_input(&mut self, token: Token) {
        self.input = Some(token);
    }

    /// Take the pending token
    pub fn take_input(&mut self) -> Option<Token> {
        self.input.take()
    }

    /// Borrow the pending token
    pub fn current_input(&self) -> Option<&Token> {
        self.input.as_ref()
    }

    /// Whether a token is pending
    pub fn has_input(&self) -> bool {
        self.input.is_some()
    }

    /// Drop the pending token
    pub fn clear_input(&mut self) {
        self.input = None;
    }

    /// Variable bindings
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Mutable variable bindings
    pub fn bindings_mut(&mut self) -> &mut Bindings {
        &mut self.bindings
    }

    /// Whether a property is bound to a variable
    ///
    /// Set-up checks that depend on a bound property are deferred to the
    /// first execution, since the variable may only be set while running.
    pub fn is_bound(&self, property: &str) -> bool {
        self.bindings.is_bound(property)
    }

    /// Number of completed executions
    pub fn executions(&self) -> u64 {
        self.executions
    }

    /// Move the pending token into the snapshot
    pub fn backup_state(&mut self, snapshot: &mut StateSnapshot) {
        snapshot.pending_input = self.input.take();
    }

    /// Reinstate the pending token from the snapshot, consuming it
    pub fn restore_state(&mut self, snapshot: &mut StateSnapshot) {
        if let Some(token) = snapshot.pending_input.take() {
            self.input = Some(token);
        }
    }

    fn set_common_option(&mut self, name: &str, value: &OptionValue) -> Option<ActorResult<()>> {
        match (name, value) {
            ("name", OptionValue::Text(text)) => {
                if text.is_empty() {
                    return Some(Err(ActorError::configuration("actor name cannot be empty")));
                }
                self.name = text.clone();
            }
            ("skip", OptionValue::Boolean(b)) => self.skip = *b,
            ("silent", OptionValue::Boolean(b)) => self.silent = *b,
            ("stop-flow-on-error", OptionValue::Boolean(b)) => self.stop_flow_on_error = *b,
            _ => return None,
        }
        Some(Ok(()))
    }

    fn common_option(&self, name: &str) -> Option<OptionValue> {
        match name {
            "name" => Some(OptionValue::Text(self.name.clone())),
            "skip" => Some(OptionValue::Boolean(self.skip)),
            "silent" => Some(OptionValue::Boolean(self.silent)),
            "stop-flow-on-error" => Some(OptionValue::Boolean(self.stop_flow_on_error)),
            _ => None,
        }
    }
}

/// A unit of computation in a flow
pub trait Actor: Send {
    /// Shared actor state
    fn core(&self) -> &ActorCore;

    /// Mutable shared actor state
    fn core_mut(&mut self) -> &mut ActorCore;

    /// Actor-specific properties (the common ones are added by the runtime)
    fn options(&self) -> &'static [OptionDescriptor] {
        &[]
    }

    /// Apply an actor-specific property; the value already has the declared kind
    fn set_option(&mut self, name: &str, _value: &OptionValue) -> ActorResult<()> {
        Err(ActorError::configuration(format!(
            "unknown option '{}' for {}",
            name,
            self.core().kind()
        )))
    }

    /// Current value of an actor-specific property
    fn option(&self, _name: &str) -> Option<OptionValue> {
        None
    }

    /// One-line summary of the important settings
    fn quick_info(&self) -> Option<String> {
        None
    }

    /// Validate configuration and acquire what execution needs
    fn set_up(&mut self, _ctx: &mut FlowContext) -> ActorResult<()> {
        Ok(())
    }

    /// Runs before `do_execute`, after variable updates
    fn pre_execute(&mut self, _ctx: &mut FlowContext) -> ActorResult<()> {
        Ok(())
    }

    /// The actor's actual work
    fn do_execute(&mut self, ctx: &mut FlowContext) -> ActorResult<()>;

    /// Runs after a successful `do_execute`
    fn post_execute(&mut self, _ctx: &mut FlowContext) -> ActorResult<()> {
        Ok(())
    }

    /// Release per-run state; must tolerate a failed or missing `set_up`
    fn wrap_up(&mut self) {}

    /// Release everything; the actor is not used afterwards
    fn tear_down(&mut self) {}

    /// Input side, if the actor consumes tokens
    fn as_consumer(&mut self) -> Option<&mut dyn InputConsumer> {
        None
    }

    /// Output side, if the actor emits tokens
    fn as_producer(&mut self) -> Option<&mut dyn OutputProducer> {
        None
    }

    /// Reset access, if the actor caches state
    fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
        None
    }

    /// Backup/restore access, if the actor carries state across reconfiguration
    fn as_variable_aware(&mut self) -> Option<&mut dyn VariableAware> {
        None
    }
}

/// Actors that accept tokens
pub trait InputConsumer: Actor {
    /// Types this actor accepts; `{Unknown}` defers the check
    fn accepts(&self) -> TypeSet;

    /// Store a token for the next execution
    ///
    /// Has no side effect beyond storing it. A skipped actor drops it.
    fn input(&mut self, token: Token) {
        let core = self.core_mut();
        if core.skip() {
            tracing::debug!(actor = %core.full_name(), "skipped, dropping token");
            return;
        }
        core.set_input(token);
    }

    /// Whether a token is pending
    fn has_input(&self) -> bool {
        self.core().has_input()
    }

    /// Borrow the pending token
    fn current_input(&self) -> Option<&Token> {
        self.core().current_input()
    }
}

/// Actors that emit tokens
pub trait OutputProducer: Actor {
    /// Types this actor generates; `{Unknown}` defers the check
    fn generates(&self) -> TypeSet;

    /// Whether a token is ready to be collected
    fn has_pending_output(&self) -> bool;

    /// Collect the next token
    fn output(&mut self) -> Option<Token>;
}

/// Actors with cached state
pub trait Resettable: Actor {
    /// Clear cached state; the next use recomputes it
    fn reset(&mut self);
}

/// Actors that carry state across a variable-triggered reconfiguration
///
/// Overrides back up their own fields and then delegate to the core, so the
/// pending input is always preserved.
pub trait VariableAware: Actor {
    /// Move transient state into the snapshot
    fn backup_state(&mut self, snapshot: &mut StateSnapshot) {
        self.core_mut().backup_state(snapshot);
    }

    /// Reinstate transient state, consuming the fields used
    fn restore_state(&mut self, snapshot: &mut StateSnapshot) {
        self.core_mut().restore_state(snapshot);
    }
}

/// Capability table of an actor
pub fn capabilities(actor: &mut dyn Actor) -> Capabilities {
    let mut caps = Capabilities::default().with(Capability::Lifecycle);
    if actor.as_consumer().is_some() {
        caps = caps.with(Capability::InputConsumer);
    }
    if actor.as_producer().is_some() {
        caps = caps.with(Capability::OutputProducer);
    }
    if actor.as_resettable().is_some() {
        caps = caps.with(Capability::Resettable);
    }
    if actor.as_variable_aware().is_some() {
        caps = caps.with(Capability::VariableAware);
    }
    caps
}

/// Every property of an actor, common ones first
pub fn describe(actor: &dyn Actor) -> impl Iterator<Item = &'static OptionDescriptor> {
    COMMON_OPTIONS.iter().chain(actor.options().iter())
}

fn descriptor(actor: &dyn Actor, name: &str) -> Option<&'static OptionDescriptor> {
    find_descriptor(COMMON_OPTIONS, name).or_else(|| find_descriptor(actor.options(), name))
}

/// Apply a property value, coercing it to the declared kind
pub fn configure(actor: &mut dyn Actor, name: &str, value: OptionValue) -> ActorResult<()> {
    let Some(descriptor) = descriptor(actor, name) else {
        return Err(ActorError::configuration(format!(
            "unknown option '{}' for {}",
            name,
            actor.core().kind()
        )));
    };

    let value = value
        .coerce(descriptor.kind)
        .map_err(|e| ActorError::configuration(format!("option '{}': {}", name, e)))?;

    match actor.core_mut().set_common_option(name, &value) {
        Some(result) => result?,
        None => actor.set_option(name, &value)?,
    }

    let core = actor.core_mut();
    if core.state == LifecycleState::Constructed {
        core.state = LifecycleState::Configured;
    }
    Ok(())
}

/// Current value of a property
pub fn option_value(actor: &dyn Actor, name: &str) -> Option<OptionValue> {
    actor
        .core()
        .common_option(name)
        .or_else(|| actor.option(name))
}

/// Bind a property to a variable (`name` or `@{name}`)
pub fn bind_variable(actor: &mut dyn Actor, property: &str, variable: &str) -> ActorResult<()> {
    if property == "name" || descriptor(actor, property).is_none() {
        return Err(ActorError::configuration(format!(
            "option '{}' of {} cannot be bound to a variable",
            property,
            actor.core().kind()
        )));
    }

    let name = variables::extract_name(variable);
    if !variables::is_valid_name(name) {
        return Err(ActorError::configuration(format!(
            "invalid variable name '{}'",
            variable
        )));
    }

    actor.core_mut().bindings_mut().bind(property, name);
    Ok(())
}

/// Bound values that differ from the ones last applied
///
/// With `require` unset, bindings whose variable is not defined yet are
/// skipped; with it set they are a configuration error.
pub(crate) fn changed_bindings(
    actor: &dyn Actor,
    vars: &Variables,
    require: bool,
) -> ActorResult<Vec<(String, OptionValue)>> {
    let bindings = actor.core().bindings();
    let mut changed = Vec::new();

    for (property, variable) in bindings.iter() {
        let Some(raw) = vars.get(variable) else {
            if require {
                return Err(ActorError::configuration(format!(
                    "variable '{}' bound to option '{}' is not set",
                    variables::pad_name(variable),
                    property
                )));
            }
            continue;
        };

        let kind = descriptor(actor, property)
            .map(|d| d.kind)
            .unwrap_or(OptionKind::Text);
        let value = OptionValue::parse(kind, &raw).map_err(|e| {
            ActorError::configuration(format!(
                "variable '{}' bound to option '{}': {}",
                variables::pad_name(variable),
                property,
                e
            ))
        })?;

        if bindings.applied(property) != Some(&value) {
            changed.push((property.to_string(), value));
        }
    }

    Ok(changed)
}

pub(crate) fn apply_bindings(
    actor: &mut dyn Actor,
    values: Vec<(String, OptionValue)>,
) -> ActorResult<()> {
    for (property, value) in values {
        configure(actor, &property, value.clone())?;
        actor.core_mut().bindings_mut().mark_applied(&property, value);
    }
    Ok(())
}

/// Invoke `reset` if the actor is resettable
pub fn reset(actor: &mut dyn Actor) {
    if let Some(resettable) = actor.as_resettable() {
        resettable.reset();
    }
}

pub(crate) fn set_up_hooks(actor: &mut dyn Actor, ctx: &mut FlowContext) -> ActorResult<()> {
    reset(actor);
    actor.set_up(ctx)
}

/// Set the actor up for a run
///
/// Applies the bound values whose variables are already defined, resets
/// cached state and runs the actor's set-up checks. Safe to call again after
/// `wrap_up`. On failure the actor stays unable to execute.
pub fn set_up(actor: &mut dyn Actor, ctx: &mut FlowContext) -> ActorResult<()> {
    if actor.core().state() == LifecycleState::TornDown {
        return Err(ActorError::configuration(format!(
            "'{}' has been torn down",
            actor.core().full_name()
        )));
    }

    let initial = changed_bindings(actor, ctx.variables(), false)?;
    apply_bindings(actor, initial)?;
    set_up_hooks(actor, ctx)?;

    let core = actor.core_mut();
    core.state = LifecycleState::ReadyForInput;
    tracing::debug!(actor = %core.full_name(), kind = core.kind(), "set up");
    Ok(())
}

/// Feed a token to an actor
pub fn input(actor: &mut dyn Actor, token: Token) -> ActorResult<()> {
    let name = actor.core().full_name();
    let Some(consumer) = actor.as_consumer() else {
        return Err(ActorError::role_mismatch(format!(
            "'{}' does not accept input",
            name
        )));
    };

    let accepts = consumer.accepts();
    if !accepts.admits(token.data_type()) {
        return Err(ActorError::execution(format!(
            "'{}' accepts {} but received {}",
            name,
            accepts,
            token.data_type()
        )));
    }

    consumer.input(token);
    Ok(())
}

/// Collect the next output token, if any
pub fn output(actor: &mut dyn Actor) -> Option<Token> {
    actor.as_producer().and_then(|producer| producer.output())
}

/// Execute the actor once
///
/// Skipped actors and stopped flows are no-ops. Before the actor's own hooks
/// run, variable-bound properties are re-read and the actor is reconfigured
/// if any of them changed; a bound `skip` is honoured after that update. The
/// pending input is always gone afterwards, whether execution succeeded or
/// not.
pub fn execute(actor: &mut dyn Actor, ctx: &mut FlowContext) -> ActorResult<()> {
    if actor.core().skip() && !actor.core().is_bound("skip") {
        actor.core_mut().clear_input();
        return Ok(());
    }

    if ctx.is_stopped() {
        let core = actor.core_mut();
        tracing::debug!(actor = %core.full_name(), "flow stopped, not executing");
        core.clear_input();
        return Ok(());
    }

    let state = actor.core().state();
    if state != LifecycleState::ReadyForInput {
        let core = actor.core_mut();
        core.clear_input();
        return Err(ActorError::configuration(format!(
            "'{}' cannot execute while {}",
            core.full_name(),
            state
        )));
    }

    actor.core_mut().state = LifecycleState::Executing;
    let result = run_stages(actor, ctx);

    let core = actor.core_mut();
    core.input = None;
    core.state = LifecycleState::ReadyForInput;
    match result {
        Ok(true) => {
            core.executions += 1;
            Ok(())
        }
        Ok(false) => Ok(()),
        Err(err) => Err(err),
    }
}

/// Returns whether the actor's hooks ran
fn run_stages(actor: &mut dyn Actor, ctx: &mut FlowContext) -> ActorResult<bool> {
    snapshot::update_variables(actor, ctx)?;
    if actor.core().skip() {
        tracing::debug!(actor = %actor.core().full_name(), "skipped after reconfiguration");
        return Ok(false);
    }
    actor.pre_execute(ctx)?;
    actor.do_execute(ctx)?;
    actor.post_execute(ctx)?;
    Ok(true)
}

/// Wrap the actor up; idempotent
pub fn wrap_up(actor: &mut dyn Actor) {
    if matches!(
        actor.core().state(),
        LifecycleState::WrappedUp | LifecycleState::TornDown
    ) {
        return;
    }

    actor.wrap_up();

    let core = actor.core_mut();
    core.input = None;
    core.bindings.clear_applied();
    core.state = LifecycleState::WrappedUp;
    tracing::debug!(actor = %core.full_name(), "wrapped up");
}

/// Wrap up if needed, then release everything
pub fn tear_down(actor: &mut dyn Actor) {
    if actor.core().state() == LifecycleState::TornDown {
        return;
    }

    wrap_up(actor);
    actor.tear_down();
    actor.core_mut().state = LifecycleState::TornDown;
}

/// Report an actor failure on the console unless the actor is silent
pub fn report_error(core: &ActorCore, err: &ActorError) {
    if core.silent() {
        tracing::debug!(actor = %core.full_name(), kind = err.kind(), "{}", err);
    } else {
        tracing::error!(actor = %core.full_name(), kind = err.kind(), "{}", err);
    }
}
