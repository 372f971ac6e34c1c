//! Shared test actors

#![allow(dead_code)]

use flowcore::runtime::actor::{Actor, ActorCore, InputConsumer, OutputProducer, Resettable};
use flowcore::runtime::context::FlowContext;
use flowcore::runtime::error::{ActorError, ActorResult};
use flowcore::runtime::options::{OptionDescriptor, OptionValue};
use flowcore::runtime::token::{DataType, Token, TypeSet};
use std::collections::VecDeque;
use parking_lot::Mutex;
use std::sync::Arc;

static RECORDER_OPTIONS: &[OptionDescriptor] = &[
    OptionDescriptor::text("prefix", "", "Prepended to every recorded payload."),
    OptionDescriptor::text("fail-on", "", "Payload that makes execution fail."),
];

/// Log of recorded payloads, shared with the test
pub type Log = Arc<Mutex<Vec<String>>>;

/// String sink recording what it receives
pub struct Recorder {
    core: ActorCore,
    prefix: String,
    fail_on: String,
    log: Log,
    resets: Arc<Mutex<usize>>,
}

impl Recorder {
    pub const KIND: &'static str = "recorder";

    pub fn new(name: &str) -> Self {
        Self {
            core: ActorCore::new(Self::KIND, name),
            prefix: String::new(),
            fail_on: String::new(),
            log: Log::default(),
            resets: Arc::default(),
        }
    }

    pub fn failing_on(mut self, payload: &str) -> Self {
        self.fail_on = payload.to_string();
        self
    }

    pub fn log(&self) -> Log {
        Arc::clone(&self.log)
    }

    pub fn resets(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.resets)
    }
}

impl Actor for Recorder {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn options(&self) -> &'static [OptionDescriptor] {
        RECORDER_OPTIONS
    }

    fn set_option(&mut self, name: &str, value: &OptionValue) -> ActorResult<()> {
        match (name, value) {
            ("prefix", OptionValue::Text(text)) => self.prefix = text.clone(),
            ("fail-on", OptionValue::Text(text)) => self.fail_on = text.clone(),
            _ => return Err(ActorError::configuration(format!("unknown option '{}'", name))),
        }
        Ok(())
    }

    fn option(&self, name: &str) -> Option<OptionValue> {
        match name {
            "prefix" => Some(OptionValue::Text(self.prefix.clone())),
            "fail-on" => Some(OptionValue::Text(self.fail_on.clone())),
            _ => None,
        }
    }

    fn do_execute(&mut self, _ctx: &mut FlowContext) -> ActorResult<()> {
        let Some(token) = self.core.take_input() else {
            return Ok(());
        };
        let payload = token.to_string();
        if !self.fail_on.is_empty() && payload == self.fail_on {
            return Err(ActorError::execution(format!("refusing '{}'", payload)));
        }
        self.log.lock().push(format!("{}{}", self.prefix, payload));
        Ok(())
    }

    fn as_consumer(&mut self) -> Option<&mut dyn InputConsumer> {
        Some(self)
    }

    fn as_resettable(&mut self) -> Option<&mut dyn Resettable> {
        Some(self)
    }
}

impl InputConsumer for Recorder {
    fn accepts(&self) -> TypeSet {
        TypeSet::of(&[DataType::String])
    }
}

impl Resettable for Recorder {
    fn reset(&mut self) {
        *self.resets.lock() += 1;
    }
}

/// Source emitting the integers `0..count`
pub struct Numbers {
    core: ActorCore,
    count: i64,
    outputs: VecDeque<Token>,
}

impl Numbers {
    pub fn new(count: i64) -> Self {
        Self {
            core: ActorCore::new("numbers", "Numbers"),
            count,
            outputs: VecDeque::new(),
        }
    }
}

impl Actor for Numbers {
    fn core(&self) -> &ActorCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut ActorCore {
        &mut self.core
    }

    fn do_execute(&mut self, _ctx: &mut FlowContext) -> ActorResult<()> {
        for i in 0..self.count {
            self.outputs.push_back(Token::new(i));
        }
        Ok(())
    }

    fn as_producer(&mut self) -> Option<&mut dyn OutputProducer> {
        Some(self)
    }
}

impl OutputProducer for Numbers {
    fn generates(&self) -> TypeSet {
        TypeSet::of(&[DataType::Integer])
    }

    fn has_pending_output(&self) -> bool {
        !self.outputs.is_empty()
    }

    fn output(&mut self) -> Option<Token> {
        self.outputs.pop_front()
    }
}
