//! Display sink handing tokens to the presentation surface

use std::sync::Arc;

use crate::runtime::actor::{Actor, ActorCore, InputConsumer, VariableAware};
use crate::runtime::context::FlowContext;
use crate::runtime::error::ActorResult;
use crate::runtime::render::RenderRendezvous;
use crate::runtime::token::TypeSet;

/// Renders each token on the attached presentation surface
///
/// Execution blocks until the surface has finished rendering. Without a
/// surface, or in headless mode, tokens are dropped.
#[derive(Debug)]
pub struct Display {
    core: ActorCore,
    rendezvous: Arc<RenderRendezvous>,
    rendered: u64,
}

impl Display {
    /// Registered kind
    pub const KIND: &'static str = "display";

    /// Rendezvous of this instance
    pub fn rendezvous(&self) -> Arc<RenderRendezvous> {
        Arc::clone(&self.rendezvous)
    }

    /// Tokens rendered since construction
    pub fn rendered(&self) -> u64 {
        self.rendered
    }
}

impl Default for Display {
    fn default() -> Self {
        Self {
            core: ActorCore::new(Self::KIND, "Display"),
            rendezvous: Arc::new(RenderRendezvous::new()),
            rendered: 0,
        }
    }
}

impl Actor for Display {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn do_execute(&mut self, ctx: &mut FlowContext) -> ActorResult<()> {
        let Some(token) = self.core.take_input() else {
            return Ok(());
        };

        if ctx.is_headless() {
            tracing::debug!(actor = %self.core.full_name(), "headless, not rendering");
            return Ok(());
        }
        let Some(surface) = ctx.surface() else {
            tracing::debug!(actor = %self.core.full_name(), "no presentation surface attached");
            return Ok(());
        };

        self.rendezvous
            .render(surface, &self.core.full_name(), token)?;
        self.rendered += 1;
        Ok(())
    }

    fn as_consumer(&mut self) -> Option<&mut dyn InputConsumer> {
        Some(self)
    }

    fn as_variable_aware(&mut self) -> Option<&mut dyn VariableAware> {
        Some(self)
    }
}

impl InputConsumer for Display {
    fn accepts(&self) -> TypeSet {
        TypeSet::any_concrete()
    }
}

// only the pending input needs to survive reconfiguration
impl VariableAware for Display {}
