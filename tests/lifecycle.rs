//! Actor lifecycle tests
//!
//! Drives actors through set-up, execution, wrap-up and tear-down and checks
//! that pending input never outlives an execution.

mod common;

use common::Recorder;
use flowcore::runtime::actor::{self, Actor, LifecycleState};
use flowcore::runtime::context::FlowContext;
use flowcore::runtime::options::OptionValue;
use flowcore::runtime::token::Token;
use proptest::prelude::*;

fn ready(recorder: &mut Recorder, ctx: &mut FlowContext) {
    actor::set_up(recorder, ctx).unwrap();
    assert_eq!(recorder.core().state(), LifecycleState::ReadyForInput);
}

#[test]
fn test_input_cleared_after_success_and_failure() {
    let mut ctx = FlowContext::detached();
    let mut recorder = Recorder::new("rec").failing_on("bad");
    ready(&mut recorder, &mut ctx);

    actor::input(&mut recorder, Token::new("good")).unwrap();
    actor::execute(&mut recorder, &mut ctx).unwrap();
    assert!(!recorder.core().has_input());

    actor::input(&mut recorder, Token::new("bad")).unwrap();
    let err = actor::execute(&mut recorder, &mut ctx).unwrap_err();
    assert_eq!(err.kind(), "execution");
    assert!(!recorder.core().has_input());

    assert_eq!(*recorder.log().lock(), vec!["good".to_string()]);
    assert_eq!(recorder.core().executions(), 1);
    assert_eq!(recorder.core().state(), LifecycleState::ReadyForInput);
}

#[test]
fn test_type_mismatch_rejected_at_input() {
    let mut ctx = FlowContext::detached();
    let mut recorder = Recorder::new("rec");
    ready(&mut recorder, &mut ctx);

    let err = actor::input(&mut recorder, Token::new(3i64)).unwrap_err();
    assert_eq!(err.kind(), "execution");
    assert!(err.to_string().contains("accepts {String}"));
    assert!(!recorder.core().has_input());
}

#[test]
fn test_skipped_actor_is_a_no_op() {
    let mut ctx = FlowContext::detached();
    let mut recorder = Recorder::new("rec");
    actor::configure(&mut recorder, "skip", OptionValue::Boolean(true)).unwrap();
    ready(&mut recorder, &mut ctx);

    actor::input(&mut recorder, Token::new("ignored")).unwrap();
    assert!(!recorder.core().has_input());
    actor::execute(&mut recorder, &mut ctx).unwrap();

    assert!(recorder.log().lock().is_empty());
    assert_eq!(recorder.core().executions(), 0);
}

#[test]
fn test_execute_requires_set_up() {
    let mut ctx = FlowContext::detached();
    let mut recorder = Recorder::new("rec");

    actor::input(&mut recorder, Token::new("early")).unwrap();
    let err = actor::execute(&mut recorder, &mut ctx).unwrap_err();
    assert_eq!(err.kind(), "configuration");
    assert!(err.to_string().contains("cannot execute while constructed"));
    assert!(!recorder.core().has_input());
}

#[test]
fn test_stopped_flow_skips_execution() {
    let mut ctx = FlowContext::detached();
    let mut recorder = Recorder::new("rec");
    ready(&mut recorder, &mut ctx);

    ctx.stop("user request");
    actor::input(&mut recorder, Token::new("late")).unwrap();
    actor::execute(&mut recorder, &mut ctx).unwrap();

    assert!(recorder.log().lock().is_empty());
    assert!(!recorder.core().has_input());
}

#[test]
fn test_wrap_up_then_set_up_again() {
    let mut ctx = FlowContext::detached();
    let mut recorder = Recorder::new("rec");
    ready(&mut recorder, &mut ctx);

    actor::input(&mut recorder, Token::new("pending")).unwrap();
    actor::wrap_up(&mut recorder);
    actor::wrap_up(&mut recorder);
    assert_eq!(recorder.core().state(), LifecycleState::WrappedUp);
    assert!(!recorder.core().has_input());

    ready(&mut recorder, &mut ctx);
    actor::input(&mut recorder, Token::new("second run")).unwrap();
    actor::execute(&mut recorder, &mut ctx).unwrap();
    assert_eq!(*recorder.log().lock(), vec!["second run".to_string()]);
}

#[test]
fn test_torn_down_actor_cannot_be_set_up() {
    let mut ctx = FlowContext::detached();
    let mut recorder = Recorder::new("rec");
    ready(&mut recorder, &mut ctx);

    actor::tear_down(&mut recorder);
    assert_eq!(recorder.core().state(), LifecycleState::TornDown);

    let err = actor::set_up(&mut recorder, &mut ctx).unwrap_err();
    assert!(err.to_string().contains("torn down"));
}

#[test]
fn test_common_options_are_described() {
    let recorder = Recorder::new("rec");
    let names: Vec<_> = actor::describe(&recorder).map(|d| d.name).collect();
    assert_eq!(
        names,
        vec!["name", "skip", "silent", "stop-flow-on-error", "prefix", "fail-on"]
    );
}

#[test]
fn test_name_is_not_bindable() {
    let mut recorder = Recorder::new("rec");
    assert!(actor::bind_variable(&mut recorder, "name", "n").is_err());
    assert!(actor::bind_variable(&mut recorder, "unknown", "n").is_err());
    assert!(actor::bind_variable(&mut recorder, "prefix", "not valid").is_err());
    assert!(actor::bind_variable(&mut recorder, "prefix", "@{p}").is_ok());
    assert_eq!(recorder.core().bindings().variable_for("prefix"), Some("p"));
}

proptest! {
    #[test]
    fn prop_no_input_survives_execute(payloads in proptest::collection::vec("[a-z]{0,4}", 1..12)) {
        let mut ctx = FlowContext::detached();
        let mut recorder = Recorder::new("rec").failing_on("a");
        actor::set_up(&mut recorder, &mut ctx).unwrap();

        for payload in payloads {
            actor::input(&mut recorder, Token::new(payload.as_str())).unwrap();
            let _ = actor::execute(&mut recorder, &mut ctx);
            prop_assert!(!recorder.core().has_input());
        }
    }
}
