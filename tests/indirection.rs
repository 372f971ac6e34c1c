//! Indirection tests
//!
//! Covers resolution caching, optional references, type delegation, role
//! checks and the ownership split between callable and instantiated targets.

mod common;

use common::Recorder;
use flowcore::runtime::actor::{self, Actor, InputConsumer, LifecycleState, OutputProducer};
use flowcore::runtime::context::FlowContext;
use flowcore::runtime::indirection::{Indirection, Role};
use flowcore::runtime::loader::ActorDefinition;
use flowcore::runtime::registry::ActorCatalog;
use flowcore::runtime::token::{DataType, Token, TypeSet};
use flowcore::{Flow, FlowConfig};
use std::sync::Arc;

fn with_callable(recorder: Recorder) -> FlowContext {
    let mut ctx = FlowContext::detached();
    ctx.callables_mut().register(Box::new(recorder)).unwrap();
    ctx.set_up_callables().unwrap();
    ctx
}

fn with_setup(name: &str, definition: ActorDefinition) -> FlowContext {
    let registry = ActorCatalog::global().snapshot().with_setup(name, definition);
    FlowContext::new(registry)
}

#[test]
fn test_resolution_is_cached_per_epoch() {
    let mut ctx = with_callable(Recorder::new("X"));
    let mut sink = Indirection::callable(Role::Sink, "X");

    let first = sink.resolve(&mut ctx).unwrap().unwrap();
    let second = sink.resolve(&mut ctx).unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(sink.lookups(), 1);

    let epoch = sink.epoch();
    actor::reset(&mut sink);
    assert_eq!(sink.epoch(), epoch + 1);
    assert!(sink.resolved().is_none());

    let third = sink.resolve(&mut ctx).unwrap().unwrap();
    assert_eq!(sink.lookups(), 2);
    assert!(Arc::ptr_eq(&first, &third));
    assert_eq!(sink.resolved().unwrap().epoch(), epoch + 1);

    let mut absent = Indirection::callable(Role::Sink, "Y").with_optional(true);
    actor::set_up(&mut absent, &mut ctx).unwrap();
    for payload in ["a", "b", "c"] {
        actor::input(&mut absent, Token::new(payload)).unwrap();
        actor::execute(&mut absent, &mut ctx).unwrap();
    }
    assert_eq!(absent.lookups(), 1);

    actor::reset(&mut absent);
    actor::input(&mut absent, Token::new("d")).unwrap();
    actor::execute(&mut absent, &mut ctx).unwrap();
    assert_eq!(absent.lookups(), 2);
    assert!(absent.resolved().is_none());
}

#[test]
fn test_optional_missing_callable_is_ignored() {
    let mut ctx = FlowContext::detached();
    let mut sink = Indirection::callable(Role::Sink, "X").with_optional(true);

    actor::set_up(&mut sink, &mut ctx).unwrap();
    actor::input(&mut sink, Token::new("dropped")).unwrap();
    actor::execute(&mut sink, &mut ctx).unwrap();

    assert!(!sink.has_input());
    assert!(sink.resolved().is_none());
    assert_eq!(sink.core().executions(), 1);
}

#[test]
fn test_required_missing_callable_names_reference() {
    let mut ctx = FlowContext::detached();
    let mut sink = Indirection::callable(Role::Sink, "X");

    let err = actor::set_up(&mut sink, &mut ctx).unwrap_err();
    assert_eq!(err.kind(), "resolution");
    assert_eq!(err.to_string(), "couldn't find callable actor 'X'");
}

#[test]
fn test_empty_reference_is_configuration_error() {
    let mut ctx = FlowContext::detached();
    let mut sink = Indirection::callable(Role::Sink, "");

    let err = actor::set_up(&mut sink, &mut ctx).unwrap_err();
    assert_eq!(err.kind(), "configuration");
    assert!(err.to_string().contains("'callable'"));
}

#[test]
fn test_types_delegate_after_resolution() {
    let mut ctx = with_callable(Recorder::new("X"));
    let mut sink = Indirection::callable(Role::Sink, "X");
    assert_eq!(sink.accepts(), TypeSet::unknown());

    actor::set_up(&mut sink, &mut ctx).unwrap();
    assert_eq!(sink.accepts(), TypeSet::of(&[DataType::String]));
}

#[test]
fn test_setup_without_input_is_not_a_sink() {
    let mut ctx = with_setup("S", ActorDefinition::new("string-constants"));
    let mut sink = Indirection::named_setup(Role::Sink, "S");

    let err = actor::set_up(&mut sink, &mut ctx).unwrap_err();
    assert_eq!(err.kind(), "role-mismatch");
    assert!(err.to_string().contains("is not a sink"));
}

#[test]
fn test_named_setup_source_emits_through_indirection() {
    let definition =
        ActorDefinition::new("string-constants").with_option("strings", "a\nb");
    let mut ctx = with_setup("letters", definition);
    let mut source = Indirection::named_setup(Role::Source, "letters");
    source.core_mut().set_parent(Some("Flow".into()));

    actor::set_up(&mut source, &mut ctx).unwrap();
    assert_eq!(source.generates(), TypeSet::of(&[DataType::String]));
    actor::execute(&mut source, &mut ctx).unwrap();

    let first = actor::output(&mut source).unwrap();
    assert_eq!(first.to_string(), "a");
    assert_eq!(first.origin(), Some("Flow.setup-source.letters"));
    assert_eq!(actor::output(&mut source).unwrap().to_string(), "b");
    assert!(actor::output(&mut source).is_none());
}

#[test]
fn test_named_setup_transformer_forwards_tokens() {
    let definition = ActorDefinition::new("set-variable").with_option("variable-name", "seen");
    let mut ctx = with_setup("remember", definition);
    let mut transformer = Indirection::named_setup(Role::Transformer, "remember");

    actor::set_up(&mut transformer, &mut ctx).unwrap();
    actor::input(&mut transformer, Token::new("hello")).unwrap();
    actor::execute(&mut transformer, &mut ctx).unwrap();

    assert_eq!(ctx.variables().get("seen").as_deref(), Some("hello"));
    assert_eq!(actor::output(&mut transformer).unwrap().to_string(), "hello");
    assert!(transformer.resolved().unwrap().is_owned());
}

#[test]
fn test_owned_target_torn_down_on_wrap_up() {
    let mut ctx = with_setup("S", ActorDefinition::new("null"));
    let mut sink = Indirection::named_setup(Role::Sink, "S");
    actor::set_up(&mut sink, &mut ctx).unwrap();
    let target = Arc::clone(sink.resolved().unwrap().actor());

    actor::wrap_up(&mut sink);
    assert!(sink.resolved().is_none());
    assert_eq!(target.lock().core().state(), LifecycleState::TornDown);
}

#[test]
fn test_callable_target_survives_wrap_up() {
    let mut ctx = with_callable(Recorder::new("X"));
    let mut sink = Indirection::callable(Role::Sink, "X");
    actor::set_up(&mut sink, &mut ctx).unwrap();
    let target = Arc::clone(sink.resolved().unwrap().actor());
    assert!(!sink.resolved().unwrap().is_owned());

    actor::wrap_up(&mut sink);
    assert_eq!(target.lock().core().state(), LifecycleState::ReadyForInput);
}

#[test]
fn test_self_reference_is_detected() {
    let mut ctx = FlowContext::detached();
    let mut looping = Indirection::callable(Role::Sink, "loop");
    looping.core_mut().set_name("loop");
    ctx.callables_mut().register(Box::new(looping)).unwrap();

    let err = ctx.set_up_callables().unwrap_err();
    assert_eq!(err.kind(), "execution");
    assert!(err.to_string().contains("callable actor 'loop' is currently executing"));
}

#[test]
fn test_target_errors_are_prefixed_with_its_name() {
    let mut ctx = with_callable(Recorder::new("X").failing_on("boom"));
    let mut sink = Indirection::callable(Role::Sink, "X");
    actor::set_up(&mut sink, &mut ctx).unwrap();

    actor::input(&mut sink, Token::new("boom")).unwrap();
    let err = actor::execute(&mut sink, &mut ctx).unwrap_err();
    assert_eq!(err.to_string(), "X: refusing 'boom'");
    assert!(!sink.has_input());
}

#[test]
fn test_errors_through_nested_indirections_stay_on_one_line() {
    let mut ctx = FlowContext::detached();
    ctx.callables_mut()
        .register(Box::new(Recorder::new("B").failing_on("boom")))
        .unwrap();
    let mut hop = Indirection::callable(Role::Sink, "B");
    hop.core_mut().set_name("A");
    ctx.callables_mut().register(Box::new(hop)).unwrap();
    ctx.set_up_callables().unwrap();

    let mut sink = Indirection::callable(Role::Sink, "A");
    actor::set_up(&mut sink, &mut ctx).unwrap();
    actor::input(&mut sink, Token::new("boom")).unwrap();

    let err = actor::execute(&mut sink, &mut ctx).unwrap_err();
    assert_eq!(err.kind(), "execution");
    assert_eq!(err.to_string(), "A: B: refusing 'boom'");
    assert!(!err.to_string().contains('\n'));
}

#[test]
fn test_flow_reports_nested_indirection_error_with_full_names() {
    let mut flow = Flow::new(FlowConfig::default());
    flow.add_callable(Box::new(Recorder::new("B").failing_on("b")))
        .unwrap();
    let mut hop = Indirection::callable(Role::Sink, "B");
    hop.core_mut().set_name("A");
    flow.add_callable(Box::new(hop)).unwrap();

    flow.add(Box::new(flowcore::runtime::actors::StringConstants::with_strings(["a", "b"])))
        .add(Box::new(Indirection::callable(Role::Sink, "A")));
    let report = flow.run().unwrap();

    assert_eq!(
        report.errors,
        vec!["Flow.callable-sink: Flow.callables.A: Flow.callables.B: refusing 'b'".to_string()]
    );
}
