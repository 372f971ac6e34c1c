//! Sink that discards its input

use crate::runtime::actor::{Actor, ActorCore, InputConsumer};
use crate::runtime::context::FlowContext;
use crate::runtime::error::ActorResult;
use crate::runtime::token::TypeSet;

/// Accepts any token and drops it
#[derive(Debug)]
pub struct Null {
    core: ActorCore,
}

impl Null {
    /// Registered kind
    pub const KIND: &'static str = "null";
}

impl Default for Null {
    fn default() -> Self {
        Self {
            core: ActorCore::new(Self::KIND, "Null"),
        }
    }
}

impl Actor for Null {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn do_execute(&mut self, _ctx: &mut FlowContext) -> ActorResult<()> {
        self.core.clear_input();
        Ok(())
    }

    fn as_consumer(&mut self) -> Option<&mut dyn InputConsumer> {
        Some(self)
    }
}

impl InputConsumer for Null {
    fn accepts(&self) -> TypeSet {
        TypeSet::any_concrete()
    }
}
