//! External actor definition tests
//!
//! Definitions are JSON files loaded relative to the definitions root, with
//! variables expanded in the path.

mod common;

use common::Recorder;
use flowcore::runtime::actor::{self, Actor};
use flowcore::runtime::context::FlowContext;
use flowcore::runtime::indirection::{Indirection, Role};
use flowcore::runtime::loader::ActorDefinition;
use flowcore::runtime::token::Token;
use flowcore::{Flow, FlowConfig};
use std::fs;
use tempfile::TempDir;

fn context_in(dir: &TempDir) -> FlowContext {
    let mut ctx = FlowContext::detached();
    ctx.set_definitions_root(Some(dir.path().to_path_buf()));
    ctx
}

#[test]
fn test_relative_definition_is_loaded_and_owned() {
    let temp = TempDir::new().unwrap();
    ActorDefinition::new("set-variable")
        .with_name("remember")
        .with_option("variable-name", "last")
        .write(&temp.path().join("remember.json"))
        .unwrap();

    let mut ctx = context_in(&temp);
    ctx.variables_mut().set("which", "remember");
    let mut transformer = Indirection::external(Role::Transformer, "@{which}.json");

    actor::set_up(&mut transformer, &mut ctx).unwrap();
    assert!(transformer.resolved().unwrap().is_owned());
    assert_eq!(
        transformer.resolved().unwrap().actor().lock().core().name(),
        "remember"
    );

    actor::input(&mut transformer, Token::new("payload")).unwrap();
    actor::execute(&mut transformer, &mut ctx).unwrap();
    assert_eq!(ctx.variables().get("last").as_deref(), Some("payload"));
    assert_eq!(actor::output(&mut transformer).unwrap().to_string(), "payload");
}

#[test]
fn test_missing_file_respects_optional() {
    let temp = TempDir::new().unwrap();
    let mut ctx = context_in(&temp);

    let mut optional = Indirection::external(Role::Sink, "absent.json").with_optional(true);
    actor::set_up(&mut optional, &mut ctx).unwrap();
    actor::input(&mut optional, Token::new("x")).unwrap();
    actor::execute(&mut optional, &mut ctx).unwrap();
    assert!(optional.resolved().is_none());

    let mut required = Indirection::external(Role::Sink, "absent.json");
    let err = actor::set_up(&mut required, &mut ctx).unwrap_err();
    assert_eq!(err.kind(), "resolution");
    assert!(err.to_string().contains("couldn't find external actor"));
    assert!(err.to_string().contains("absent.json"));
}

#[test]
fn test_unparsable_file_fails_even_when_optional() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("broken.json"), "{ not json").unwrap();
    let mut ctx = context_in(&temp);

    let mut sink = Indirection::external(Role::Sink, "broken.json").with_optional(true);
    let err = actor::set_up(&mut sink, &mut ctx).unwrap_err();
    assert_eq!(err.kind(), "resolution");
    assert!(err.to_string().contains("failed to parse actor definition"));
}

#[test]
fn test_unknown_kind_in_definition() {
    let temp = TempDir::new().unwrap();
    ActorDefinition::new("no-such-kind")
        .write(&temp.path().join("odd.json"))
        .unwrap();
    let mut ctx = context_in(&temp);

    let mut sink = Indirection::external(Role::Sink, "odd.json");
    let err = actor::set_up(&mut sink, &mut ctx).unwrap_err();
    assert!(err.to_string().contains("unknown actor kind 'no-such-kind'"));
}

#[test]
fn test_external_sink_in_flow_wraps_callable() {
    let temp = TempDir::new().unwrap();
    ActorDefinition::new("callable-sink")
        .with_option("callable", "collector")
        .write(&temp.path().join("to-collector.json"))
        .unwrap();

    let mut flow = Flow::new(FlowConfig {
        definitions_root: Some(temp.path().to_path_buf()),
        ..FlowConfig::default()
    });
    let collector = Recorder::new("collector");
    let log = collector.log();
    flow.add_callable(Box::new(collector)).unwrap();

    flow.add(Box::new(flowcore::runtime::actors::StringConstants::with_strings(["a", "b"])));
    flow.add(Box::new(Indirection::external(Role::Sink, "to-collector.json")));

    let report = flow.run().unwrap();
    assert!(report.is_clean());
    assert_eq!(*log.lock(), vec!["a".to_string(), "b".to_string()]);
}
