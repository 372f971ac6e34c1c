//! Transformer setting a flow variable

use std::collections::VecDeque;

use crate::runtime::actor::{Actor, ActorCore, InputConsumer, OutputProducer, Resettable};
use crate::runtime::context::FlowContext;
use crate::runtime::error::{ActorError, ActorResult};
use crate::runtime::options::{OptionDescriptor, OptionValue, QuickInfo};
use crate::runtime::token::{Token, TypeSet};
use crate::runtime::variables;

static OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor::text("variable-name", "variable", "The variable to set."),
    OptionDescriptor::text(
        "variable-value",
        "",
        "The value to set; variables get expanded. Empty uses the token's payload.",
    ),
];

/// Sets a variable from each token (or a fixed value) and passes the token on
#[derive(Debug)]
pub struct SetVariable {
    core: ActorCore,
    variable_name: String,
    variable_value: String,
    outputs: VecDeque<Token>,
}

impl SetVariable {
    /// Registered kind
    pub const KIND: &'static str = "set-variable";

    /// Set the named variable from the payload
    pub fn new(variable_name: &str) -> Self {
        Self {
            variable_name: variables::extract_name(variable_name).to_string(),
            ..Self::default()
        }
    }

    /// Use a fixed value instead of the payload
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.variable_value = value.into();
        self
    }
}

impl Default for SetVariable {
    fn default() -> Self {
        Self {
            core: ActorCore::new(Self::KIND, "SetVariable"),
            variable_name: "variable".into(),
            variable_value: String::new(),
            outputs: VecDeque::new(),
        }
    }
}

impl Actor for SetVariable {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn options(&self) -> &'static [OptionDescriptor] {
        OPTIONS
    }

    fn set_option(&mut self, name: &str, value: &OptionValue) -> ActorResult<()> {
        match (name, value) {
            ("variable-name", OptionValue::Text(text)) => {
                self.variable_name = variables::extract_name(text).to_string();
                Ok(())
            }
            ("variable-value", OptionValue::Text(text)) => {
                self.variable_value = text.clone();
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
            "variable-name" => Some(OptionValue::Text(self.variable_name.clone())),
            "variable-value" => Some(OptionValue::Text(self.variable_value.clone())),
            _ => None,
        }
    }

    fn quick_info(&self) -> Option<String> {
        let value = if self.variable_value.is_empty() {
            "<payload>"
        } else {
            &self.variable_value
        };
        QuickInfo::new(self.core.bindings())
            .value("variable-name", "name", variables::pad_name(&self.variable_name))
            .value("variable-value", "value", value)
            .finish()
    }

    fn set_up(&mut self, _ctx: &mut FlowContext) -> ActorResult<()> {
        if self.core.is_bound("variable-name") || variables::is_valid_name(&self.variable_name) {
            Ok(())
        } else {
            Err(ActorError::configuration(format!(
                "invalid variable name '{}'",
                self.variable_name
            )))
        }
    }

    fn do_execute(&mut self, ctx: &mut FlowContext) -> ActorResult<()> {
        let Some(token) = self.core.take_input() else {
            return Ok(());
        };

        let value = if self.variable_value.is_empty() {
            token.payload().to_string()
        } else {
            ctx.variables().expand(&self.variable_value)
        };
        tracing::debug!(actor = %self.core.full_name(), variable = %self.variable_name, %value, "setting variable");
        ctx.variables_mut().set(self.variable_name.as_str(), value);

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

impl InputConsumer for SetVariable {
    fn accepts(&self) -> TypeSet {
        TypeSet::any_concrete()
    }
}

impl OutputProducer for SetVariable {
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

impl Resettable for SetVariable {
    fn reset(&mut self) {
        self.outputs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::actor;

    #[test]
    fn test_sets_from_payload_or_value() {
        let mut ctx = FlowContext::detached();
        ctx.variables_mut().set("base", "/data");

        let mut from_payload = SetVariable::new("@{target}");
        actor::set_up(&mut from_payload, &mut ctx).unwrap();
        actor::input(&mut from_payload, Token::new("sink-a")).unwrap();
        actor::execute(&mut from_payload, &mut ctx).unwrap();
        assert_eq!(ctx.variables().get("target").as_deref(), Some("sink-a"));
        assert!(actor::output(&mut from_payload).is_some());

        let mut fixed = SetVariable::new("dir").with_value("@{base}/out");
        actor::set_up(&mut fixed, &mut ctx).unwrap();
        actor::input(&mut fixed, Token::new("ignored")).unwrap();
        actor::execute(&mut fixed, &mut ctx).unwrap();
        assert_eq!(ctx.variables().get("dir").as_deref(), Some("/data/out"));
    }
}
