//! Actors working on the blackboard

use std::collections::VecDeque;

use crate::runtime::actor::{Actor, ActorCore, InputConsumer, OutputProducer, Resettable};
use crate::runtime::context::FlowContext;
use crate::runtime::error::{ActorError, ActorResult};
use crate::runtime::options::{OptionDescriptor, OptionValue, QuickInfo};
use crate::runtime::storage::PublishContext;
use crate::runtime::token::{Token, TypeSet};
use crate::runtime::variables;

static SET_STORAGE_VALUE_OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor::text(
        "storage-name",
        "storage",
        "The name of the storage item to store the payload under.",
    ),
    OptionDescriptor::text(
        "cache",
        "",
        "The LRU cache to store the payload in; empty for regular storage.",
    ),
];

static PUBLISH_OPTIONS: &[OptionDescriptor] = &[OptionDescriptor::text(
    "handler",
    "handler",
    "The storage name of the publish/subscribe handler.",
)];

fn check_name(core: &ActorCore, property: &str, name: &str) -> ActorResult<()> {
    if core.is_bound(property) || variables::is_valid_name(name) {
        Ok(())
    } else {
        Err(ActorError::configuration(format!(
            "invalid storage name '{}'",
            name
        )))
    }
}

/// Stores the payload of each token and passes the token on
#[derive(Debug)]
pub struct SetStorageValue {
    core: ActorCore,
    storage_name: String,
    cache: String,
    outputs: VecDeque<Token>,
}

impl SetStorageValue {
    /// Registered kind
    pub const KIND: &'static str = "set-storage-value";

    /// Store under the given name
    pub fn new(storage_name: impl Into<String>) -> Self {
        Self {
            storage_name: storage_name.into(),
            ..Self::default()
        }
    }

    /// Store in the named LRU cache instead
    pub fn in_cache(mut self, cache: impl Into<String>) -> Self {
        self.cache = cache.into();
        self
    }
}

impl Default for SetStorageValue {
    fn default() -> Self {
        Self {
            core: ActorCore::new(Self::KIND, "SetStorageValue"),
            storage_name: "storage".into(),
            cache: String::new(),
            outputs: VecDeque::new(),
        }
    }
}

impl Actor for SetStorageValue {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn options(&self) -> &'static [OptionDescriptor] {
        SET_STORAGE_VALUE_OPTIONS
    }

    fn set_option(&mut self, name: &str, value: &OptionValue) -> ActorResult<()> {
        match (name, value) {
            ("storage-name", OptionValue::Text(text)) => {
                self.storage_name = text.clone();
                Ok(())
            }
            ("cache", OptionValue::Text(text)) => {
                self.cache = text.clone();
                Ok(())
            }
            _ => Err(ActorError::configuration(format!(
                "unknown option '{}' for {}",
                name,
                Self::KIND
            ))),
        }
    }

    fn option(&self, name: &str) -> Option<OptionValue> {
        match name {
            "storage-name" => Some(OptionValue::Text(self.storage_name.clone())),
            "cache" => Some(OptionValue::Text(self.cache.clone())),
            _ => None,
        }
    }

    fn quick_info(&self) -> Option<String> {
        let info = QuickInfo::new(self.core.bindings())
            .value("storage-name", "name", &self.storage_name);
        if self.cache.is_empty() && !self.core.is_bound("cache") {
            return info.finish();
        }
        info.value("cache", "cache", &self.cache).finish()
    }

    fn set_up(&mut self, _ctx: &mut FlowContext) -> ActorResult<()> {
        check_name(&self.core, "storage-name", &self.storage_name)
    }

    fn do_execute(&mut self, ctx: &mut FlowContext) -> ActorResult<()> {
        let Some(token) = self.core.take_input() else {
            return Ok(());
        };

        let payload = token.payload().clone();
        if self.cache.is_empty() {
            ctx.storage_mut().put(self.storage_name.as_str(), payload)?;
        } else {
            ctx.storage_mut()
                .put_cached(&self.cache, self.storage_name.as_str(), payload)?;
        }
        self.outputs.push_back(token);
        Ok(())
    }

    fn wrap_up(&mut self) {
        self.outputs.clear();
    }

    fn as_consumer(&mut self) -> Option<&mut dyn InputConsumer> {
        Some(self)
    }

    fn as_producer(&mut self) -> Option<&mut dyn OutputProducer> {
        Some(self)
    }

    fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
        Some(self)
    }
}

impl InputConsumer for SetStorageValue {
    fn accepts(&self) -> TypeSet {
        TypeSet::any_concrete()
    }
}

impl OutputProducer for SetStorageValue {
    fn generates(&self) -> TypeSet {
        TypeSet::any_concrete()
    }

    fn has_pending_output(&self) -> bool {
        !self.outputs.is_empty()
    }

    fn output(&mut self) -> Option<Token> {
        self.outputs.pop_front()
    }
}

impl Resettable for SetStorageValue {
    fn reset(&mut self) {
        self.outputs.clear();
    }
}

/// Publishes each payload through a publish/subscribe handler
#[derive(Debug)]
pub struct Publish {
    core: ActorCore,
    handler: String,
}

impl Publish {
    /// Registered kind
    pub const KIND: &'static str = "publish";

    /// Publish through the handler stored under the given name
    pub fn new(handler: impl Into<String>) -> Self {
        Self {
            handler: handler.into(),
            ..Self::default()
        }
    }
}

impl Default for Publish {
    fn default() -> Self {
        Self {
            core: ActorCore::new(Self::KIND, "Publish"),
            handler: "handler".into(),
        }
    }
}

impl Actor for Publish {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn options(&self) -> &'static [OptionDescriptor] {
        PUBLISH_OPTIONS
    }

    fn set_option(&mut self, name: &str, value: &OptionValue) -> ActorResult<()> {
        match (name, value) {
            ("handler", OptionValue::Text(text)) => {
                self.handler = text.clone();
                Ok(())
            }
            _ => Err(ActorError::configuration(format!(
                "unknown option '{}' for {}",
                name,
                Self::KIND
            ))),
        }
    }

    fn option(&self, name: &str) -> Option<OptionValue> {
        (name == "handler").then(|| OptionValue::Text(self.handler.clone()))
    }

    fn quick_info(&self) -> Option<String> {
        QuickInfo::new(self.core.bindings())
            .value("handler", "handler", &self.handler)
            .finish()
    }

    fn set_up(&mut self, _ctx: &mut FlowContext) -> ActorResult<()> {
        check_name(&self.core, "handler", &self.handler)
    }

    fn do_execute(&mut self, ctx: &mut FlowContext) -> ActorResult<()> {
        let Some(token) = self.core.take_input() else {
            return Ok(());
        };

        let publish = PublishContext {
            publisher: self.core.full_name(),
            key: self.handler.clone(),
        };
        ctx.storage_mut()
            .publish(&self.handler, &publish, &token.shared_payload())?;
        Ok(())
    }

    fn as_consumer(&mut self) -> Option<&mut dyn InputConsumer> {
        Some(self)
    }
}

impl InputConsumer for Publish {
    fn accepts(&self) -> TypeSet {
        TypeSet::any_concrete()
    }
}
