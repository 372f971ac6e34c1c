//! Blackboard and publish/subscribe tests

use flowcore::runtime::actors::{Publish, SetStorageValue, StringConstants};
use flowcore::runtime::storage::{PubSubHandler, PublishContext};
use flowcore::runtime::token::Payload;
use flowcore::{Flow, FlowConfig};
use parking_lot::Mutex;
use std::sync::Arc;

type Seen = Arc<Mutex<Vec<(String, Arc<Payload>)>>>;

fn record(seen: &Seen, id: &'static str) -> impl FnMut(&PublishContext, &Arc<Payload>) + Send + 'static {
    let seen = Arc::clone(seen);
    move |_ctx: &PublishContext, payload: &Arc<Payload>| seen.lock().push((id.to_string(), Arc::clone(payload)))
}

#[test]
fn test_publish_reaches_subscribers_in_order_with_same_payload() {
    let seen = Seen::default();
    let mut flow = Flow::new(FlowConfig::default());
    {
        let storage = flow.context_mut().storage_mut();
        storage.subscribe("events", "first", record(&seen, "first")).unwrap();
        storage.subscribe("events", "second", record(&seen, "second")).unwrap();
    }

    flow.add(Box::new(StringConstants::with_strings(["hello"])));
    flow.add(Box::new(Publish::new("events")));
    let report = flow.run().unwrap();
    assert!(report.is_clean());

    let seen = seen.lock();
    let ids: Vec<_> = seen.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["first", "second"]);
    assert!(Arc::ptr_eq(&seen[0].1, &seen[1].1));
    assert_eq!(*seen[0].1, Payload::String("hello".into()));
}

#[test]
fn test_publisher_identity_is_passed_along() {
    let publishers = Arc::new(Mutex::new(Vec::new()));
    let mut handler = PubSubHandler::new();
    let sink = Arc::clone(&publishers);
    handler.subscribe("watch", move |ctx: &PublishContext, _: &Arc<Payload>| {
        sink.lock().push(format!("{}@{}", ctx.publisher, ctx.key));
    });

    let mut flow = Flow::new(FlowConfig::default());
    flow.context_mut().storage_mut().put("bus", handler).unwrap();
    flow.add(Box::new(StringConstants::with_strings(["a", "b"])));
    flow.add(Box::new(Publish::new("bus")));
    flow.run().unwrap();

    assert_eq!(
        *publishers.lock(),
        vec!["Flow.Publish@bus".to_string(), "Flow.Publish@bus".to_string()]
    );
}

#[test]
fn test_storage_survives_wrap_up_but_not_tear_down() {
    let mut flow = Flow::new(FlowConfig::default());
    flow.add(Box::new(StringConstants::with_strings(["first", "last"])));
    flow.add(Box::new(SetStorageValue::new("latest")));
    let report = flow.run().unwrap();
    assert_eq!(report.tokens, 2);

    let latest = flow.context().storage().get::<Payload>("latest").unwrap();
    assert_eq!(latest, &Payload::String("last".into()));
    assert_eq!(flow.context().storage().expand("got %{latest}"), "got last");

    flow.tear_down();
    assert!(!flow.context().storage().has("latest"));
}

#[test]
fn test_publishing_to_plain_value_fails() {
    let mut flow = Flow::new(FlowConfig::default());
    flow.context_mut().storage_mut().put("bus", 42i64).unwrap();
    flow.add(Box::new(StringConstants::with_strings(["x"])));
    flow.add(Box::new(Publish::new("bus")));

    let report = flow.run().unwrap();
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("Flow.Publish: storage item 'bus' is a i64"));
}
