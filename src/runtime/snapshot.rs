//! Reconfiguration snapshots
//!
//! When a variable-bound property changes, the actor's transient state is
//! moved into a [`StateSnapshot`], the new values are applied, the actor is
//! reset and set up again, and the state is moved back. The snapshot is a
//! plain struct with one optional field per kind of state, so every kind is
//! known at compile time and restoring it is a `take()`.

use std::collections::VecDeque;
use std::fmt;

use super::actor::{self, Actor};
use super::context::FlowContext;
use super::error::ActorResult;
use super::indirection::ResolvedTarget;
use super::token::Token;

/// Transient actor state carried across a reconfiguration
#[derive(Default)]
pub struct StateSnapshot {
    /// Token accepted through `input` but not executed yet
    pub pending_input: Option<Token>,
    /// Cached indirection target
    pub resolved_target: Option<ResolvedTarget>,
    /// Tokens produced but not collected yet
    pub pending_output: Option<VecDeque<Token>>,
}

impl StateSnapshot {
    /// Key of [`StateSnapshot::pending_input`]
    pub const PENDING_INPUT: &'static str = "pending-input";
    /// Key of [`StateSnapshot::resolved_target`]
    pub const RESOLVED_TARGET: &'static str = "resolved-target";
    /// Key of [`StateSnapshot::pending_output`]
    pub const PENDING_OUTPUT: &'static str = "pending-output";

    /// Keys of the fields currently holding state
    pub fn keys(&self) -> Vec<&'static str> {
        let Self {
            pending_input,
            resolved_target,
            pending_output,
        } = self;

        let mut keys = Vec::new();
        if pending_input.is_some() {
            keys.push(Self::PENDING_INPUT);
        }
        if resolved_target.is_some() {
            keys.push(Self::RESOLVED_TARGET);
        }
        if pending_output.is_some() {
            keys.push(Self::PENDING_OUTPUT);
        }
        keys
    }

    /// Whether every field has been consumed
    pub fn is_empty(&self) -> bool {
        self.keys().is_empty()
    }
}

impl fmt::Debug for StateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateSnapshot")
            .field("keys", &self.keys())
            .finish()
    }
}

/// Move the actor's transient state into a new snapshot
pub fn backup(actor: &mut dyn Actor) -> StateSnapshot {
    let mut snapshot = StateSnapshot::default();
    match actor.as_variable_aware() {
        Some(aware) => aware.backup_state(&mut snapshot),
        None => actor.core_mut().backup_state(&mut snapshot),
    }
    snapshot
}

/// Move the snapshot's state back into the actor
///
/// Every field must be consumed by the actor; a leftover field means the
/// actor backs up state it never restores.
pub fn restore(actor: &mut dyn Actor, snapshot: &mut StateSnapshot) {
    match actor.as_variable_aware() {
        Some(aware) => aware.restore_state(snapshot),
        None => actor.core_mut().restore_state(snapshot),
    }

    let leftovers = snapshot.keys();
    if !leftovers.is_empty() {
        tracing::error!(
            actor = %actor.core().full_name(),
            keys = ?leftovers,
            "state snapshot not fully restored"
        );
        debug_assert!(leftovers.is_empty(), "unconsumed snapshot keys: {:?}", leftovers);
    }
}

/// Re-read variable-bound properties and reconfigure on change
///
/// Returns `true` if the actor was reconfigured. A bound variable that is not
/// set is a configuration error at this point.
pub fn update_variables(actor: &mut dyn Actor, ctx: &mut FlowContext) -> ActorResult<bool> {
    if actor.core().bindings().is_empty() {
        return Ok(false);
    }

    let changed = actor::changed_bindings(actor, ctx.variables(), true)?;
    if changed.is_empty() {
        return Ok(false);
    }

    let properties: Vec<&str> = changed.iter().map(|(p, _)| p.as_str()).collect();
    tracing::info!(
        actor = %actor.core().full_name(),
        properties = ?properties,
        "variable-bound options changed, reconfiguring"
    );

    let mut snapshot = backup(actor);
    let result = actor::apply_bindings(actor, changed)
        .and_then(|()| actor::set_up_hooks(actor, ctx));
    restore(actor, &mut snapshot);

    result.map(|()| true)
}
