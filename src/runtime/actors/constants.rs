//! Source emitting a fixed list of strings

use std::collections::VecDeque;

use crate::runtime::actor::{
    Actor, ActorCore, OutputProducer, Resettable, VariableAware,
};
use crate::runtime::context::FlowContext;
use crate::runtime::error::{ActorError, ActorResult};
use crate::runtime::options::{OptionDescriptor, OptionValue, QuickInfo};
use crate::runtime::snapshot::StateSnapshot;
use crate::runtime::token::{DataType, Token, TypeSet};

static OPTIONS: &[OptionDescriptor] = &[OptionDescriptor::text(
    "strings",
    "",
    "The strings to output, one per line.",
)];

/// Emits one string token per configured string on each execution
#[derive(Debug)]
pub struct StringConstants {
    core: ActorCore,
    strings: Vec<String>,
    outputs: VecDeque<Token>,
}

impl StringConstants {
    /// Registered kind
    pub const KIND: &'static str = "string-constants";

    /// Source with the given strings
    pub fn with_strings<I, S>(strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            strings: strings.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Configured strings
    pub fn strings(&self) -> &[String] {
        &self.strings
    }
}

impl Default for StringConstants {
    fn default() -> Self {
        Self {
            core: ActorCore::new(Self::KIND, "StringConstants"),
            strings: Vec::new(),
            outputs: VecDeque::new(),
        }
    }
}

impl Actor for StringConstants {
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
            ("strings", OptionValue::Text(text)) => {
                self.strings = text.lines().map(String::from).collect();
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
        (name == "strings").then(|| OptionValue::Text(self.strings.join("\n")))
    }

    fn quick_info(&self) -> Option<String> {
        QuickInfo::new(self.core.bindings())
            .value("strings", "strings", self.strings.join(", "))
            .finish()
    }

    fn do_execute(&mut self, _ctx: &mut FlowContext) -> ActorResult<()> {
        let origin = self.core.full_name();
        for s in &self.strings {
            self.outputs
                .push_back(Token::from_actor(origin.clone(), s.as_str()));
        }
        Ok(())
    }

    fn wrap_up(&mut self) {
        self.outputs.clear();
    }

    fn as_producer(&mut self) -> Option<&mut dyn OutputProducer> {
        Some(self)
    }

    fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
        Some(self)
    }

    fn as_variable_aware(&mut self) -> Option<&mut dyn VariableAware> {
        Some(self)
    }
}

impl OutputProducer for StringConstants {
    fn generates(&self) -> TypeSet {
        TypeSet::of(&[DataType::String])
    }

    fn has_pending_output(&self) -> bool {
        !self.outputs.is_empty()
    }

    fn output(&mut self) -> Option<Token> {
        self.outputs.pop_front()
    }
}

impl Resettable for StringConstants {
    fn reset(&mut self) {
        self.outputs.clear();
    }
}

impl VariableAware for StringConstants {
    fn backup_state(&mut self, snapshot: &mut StateSnapshot) {
        if !self.outputs.is_empty() {
            snapshot.pending_output = Some(std::mem::take(&mut self.outputs));
        }
        self.core.backup_state(snapshot);
    }

    fn restore_state(&mut self, snapshot: &mut StateSnapshot) {
        if let Some(outputs) = snapshot.pending_output.take() {
            self.outputs = outputs;
        }
        self.core.restore_state(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::actor;

    #[test]
    fn test_emits_in_order() {
        let mut ctx = FlowContext::detached();
        let mut source = StringConstants::with_strings(["a", "b"]);
        actor::set_up(&mut source, &mut ctx).unwrap();
        actor::execute(&mut source, &mut ctx).unwrap();

        let first = actor::output(&mut source).unwrap();
        assert_eq!(first.payload().as_str(), Some("a"));
        assert_eq!(first.origin(), Some("StringConstants"));
        assert_eq!(actor::output(&mut source).unwrap().to_string(), "b");
        assert!(actor::output(&mut source).is_none());
    }

    #[test]
    fn test_strings_option_is_line_based() {
        let mut source = StringConstants::default();
        actor::configure(&mut source, "strings", "x\ny".into()).unwrap();
        assert_eq!(source.strings(), ["x", "y"]);
        assert_eq!(source.quick_info().as_deref(), Some("strings: x, y"));
    }

    #[test]
    fn test_pending_output_survives_reconfiguration() {
        let mut ctx = FlowContext::detached();
        let mut source = StringConstants::with_strings(["a"]);
        actor::set_up(&mut source, &mut ctx).unwrap();
        actor::execute(&mut source, &mut ctx).unwrap();

        let mut snapshot = crate::runtime::snapshot::backup(&mut source);
        assert_eq!(snapshot.keys(), vec![StateSnapshot::PENDING_OUTPUT]);
        actor::reset(&mut source);
        crate::runtime::snapshot::restore(&mut source, &mut snapshot);
        assert!(source.has_pending_output());
    }
}
