#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use arbor_context::{ContextHandle, Environment, ServerMode, StatementContext};
use arbor_core::{AddressTemplate, Placeholder};
use arbor_hub::{Composite, DispatchError, Dispatcher, Operation};
use arbor_meta::{MetadataLookup, ParserError, ProcessError, Settings};
use async_trait::async_trait;
use serde_json::{json, Value};

#[derive(Debug, Clone)]
enum Request {
    Single(Operation),
    Composite(Composite),
}

enum Reply {
    Single(Value),
    Composite(Vec<Value>),
    Transport(&'static str),
}

/// Answers requests from a script and records what it was asked.
struct ScriptedDispatcher {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedDispatcher {
    fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies.into()), requests: Mutex::default() })
    }

    fn requests(&self) -> Vec<Request> { self.requests.lock().unwrap().clone() }

    fn next(&self) -> Result<Reply, DispatchError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| DispatchError::Transport("script exhausted".into()))
    }
}

#[async_trait]
impl Dispatcher for ScriptedDispatcher {
    async fn execute(&self, operation: &Operation) -> Result<Value, DispatchError> {
        self.requests.lock().unwrap().push(Request::Single(operation.clone()));
        match self.next()? {
            Reply::Single(v) => Ok(v),
            Reply::Transport(m) => Err(DispatchError::Transport(m.into())),
            Reply::Composite(_) => Err(DispatchError::MalformedResponse("expected single".into())),
        }
    }

    async fn execute_composite(&self, composite: &Composite) -> Result<Vec<Value>, DispatchError> {
        self.requests.lock().unwrap().push(Request::Composite(composite.clone()));
        match self.next()? {
            Reply::Composite(steps) => Ok(steps),
            Reply::Transport(m) => Err(DispatchError::Transport(m.into())),
            Reply::Single(_) => Err(DispatchError::MalformedResponse("expected composite".into())),
        }
    }
}

fn description(text: &str) -> Value {
    json!({
        "description": text,
        "attributes": {},
        "operations": {},
        "access-control": { "default": { "read": true, "write": true, "attributes": {}, "operations": {} } }
    })
}

fn ok(result: Value) -> Value { json!({ "outcome": "success", "result": result }) }

fn lookup_service(dispatcher: Arc<ScriptedDispatcher>, mode: ServerMode) -> MetadataLookup {
    let context = ContextHandle::new(StatementContext::new(Environment::new(mode)));
    MetadataLookup::new(dispatcher, context, Settings::default())
}

fn t(s: &str) -> AddressTemplate { AddressTemplate::parse(s) }

fn templates(n: usize) -> Vec<AddressTemplate> { (0..n).map(|i| t(&format!("/subsystem=s{i}"))).collect() }

fn composite_reply(n: usize) -> Reply { Reply::Composite((0..n).map(|i| ok(description(&format!("d{i}")))).collect()) }

#[tokio::test]
async fn lookup_fetches_once_then_serves_from_cache() {
    let dispatcher = ScriptedDispatcher::new(vec![Reply::Single(description("The IO subsystem"))]);
    let service = lookup_service(dispatcher.clone(), ServerMode::Standalone);

    let metadata = service.lookup(&t("/subsystem=io")).await.unwrap();
    assert!(!metadata.is_empty());
    assert_eq!(metadata.resource_description().description(), Some("The IO subsystem"));
    assert!(service.contains(&t("/subsystem=io")));
    assert!(!service.get(&t("/subsystem=io")).is_empty());

    let again = service.lookup(&t("/subsystem=io")).await.unwrap();
    assert_eq!(again, metadata);

    let requests = dispatcher.requests();
    assert_eq!(requests.len(), 1);
    let Request::Single(op) = &requests[0] else { panic!("expected a single request") };
    assert_eq!(op.name(), "read-resource-description");
    assert_eq!(op.address().to_string(), "/subsystem=io");
    assert_eq!(op.get_param("operations"), Some(&json!(true)));
    assert_eq!(op.get_param("access-control"), Some(&json!("combined-descriptions")));
    assert_eq!(op.get_param("locale"), Some(&json!("en")));
}

#[tokio::test]
async fn requests_are_batched_by_three() {
    for (m, expected) in [(2usize, vec![2usize]), (3, vec![3]), (4, vec![3, 1]), (7, vec![3, 3, 1])] {
        let replies = expected.iter().map(|&n| composite_reply(n)).collect();
        let dispatcher = ScriptedDispatcher::new(replies);
        let service = lookup_service(dispatcher.clone(), ServerMode::Standalone);

        let all = templates(m);
        let metadata = service.process(&all, false).await.unwrap();
        assert_eq!(metadata.len(), m);
        assert!(metadata.iter().all(|md| !md.is_empty()));

        let sizes: Vec<usize> = dispatcher
            .requests()
            .iter()
            .map(|r| match r {
                Request::Composite(c) => c.len(),
                Request::Single(_) => panic!("unexpected single request for {m} templates"),
            })
            .collect();
        assert_eq!(sizes, expected, "m = {m}");
        // requests keep the order of the templates
        let addresses: Vec<String> = dispatcher
            .requests()
            .iter()
            .flat_map(|r| match r {
                Request::Composite(c) => c.steps().iter().map(|s| s.address().to_string()).collect::<Vec<_>>(),
                Request::Single(_) => Vec::new(),
            })
            .collect();
        let wanted: Vec<String> = all.iter().map(ToString::to_string).collect();
        assert_eq!(addresses, wanted);
    }
}

#[tokio::test]
async fn failed_step_aborts_without_committing() {
    let dispatcher = ScriptedDispatcher::new(vec![Reply::Composite(vec![
        ok(description("d0")),
        json!({ "outcome": "failed", "failure-description": "WFLYCTL0216: Management resource not found" }),
    ])]);
    let service = lookup_service(dispatcher, ServerMode::Standalone);

    let err = service.process(&templates(2), false).await.unwrap_err();
    assert!(matches!(err, ProcessError::Parse(ParserError::FailedStep { step: 2, .. })));
    assert!(err.to_string().starts_with("Failed step 'step-2' in composite result"));
    assert!(!service.contains(&t("/subsystem=s0")));
}

#[tokio::test]
async fn dispatch_failure_stops_remaining_batches() {
    let dispatcher = ScriptedDispatcher::new(vec![composite_reply(3), Reply::Transport("connection reset"), composite_reply(1)]);
    let service = lookup_service(dispatcher.clone(), ServerMode::Standalone);

    let err = service.process(&templates(7), false).await.unwrap_err();
    assert!(matches!(err, ProcessError::Dispatch(DispatchError::Transport(_))));
    assert_eq!(dispatcher.requests().len(), 2);
    assert!(!service.contains(&t("/subsystem=s0")));
}

#[tokio::test]
async fn server_relative_results_get_host_and_server_prefix() {
    let dispatcher = ScriptedDispatcher::new(vec![Reply::Composite(vec![
        ok(json!([
            { "address": [ { "interface": "public" } ], "outcome": "success", "result": description("public") },
            { "address": [ { "interface": "management" } ], "outcome": "success", "result": description("management") }
        ])),
        ok(description("io")),
    ])]);
    let service = lookup_service(dispatcher, ServerMode::Domain);

    let wildcard = t("/host=primary/server=server-one/interface=*");
    service.process(&[wildcard.clone(), t("/profile=full/subsystem=io")], false).await.unwrap();

    assert!(service.contains(&t("/host=primary/server=server-one/interface=public")));
    assert!(service.contains(&t("/host=primary/server=server-one/interface=management")));
    assert!(!service.contains(&t("/interface=public")));
    assert!(service.contains(&wildcard));
    assert!(service.contains(&t("/profile=default/subsystem=io")));
}

#[tokio::test]
async fn single_server_relative_request_gets_host_and_server_prefix() {
    let dispatcher = ScriptedDispatcher::new(vec![Reply::Single(json!([
        { "address": [ { "interface": "public" } ], "outcome": "success", "result": description("public") }
    ]))]);
    let service = lookup_service(dispatcher.clone(), ServerMode::Domain);
    let wildcard = t("/host=primary/server=server-one/interface=*");

    let metadata = service.lookup(&wildcard).await.unwrap();
    assert_eq!(metadata.resource_description().description(), Some("public"));

    let requests = dispatcher.requests();
    assert_eq!(requests.len(), 1);
    assert!(matches!(requests[0], Request::Single(_)));
    assert!(service.contains(&t("/host=primary/server=server-one/interface=public")));
    assert!(!service.contains(&t("/interface=public")));
    assert_eq!(
        service.dump().processed[0].resolved,
        vec!["/host=primary/server=server-one/interface=public".to_string()]
    );
}

#[tokio::test]
async fn selected_placeholders_resolve_before_fetching() {
    let dispatcher = ScriptedDispatcher::new(vec![Reply::Single(description("io"))]);
    let context = ContextHandle::new(StatementContext::new(Environment::new(ServerMode::Domain)));
    context.assign(Placeholder::SELECTED_HOST, "primary");
    let service = MetadataLookup::new(dispatcher.clone(), context, Settings::default());

    service.lookup(&t("{selected.host}/subsystem=io")).await.unwrap();
    let requests = dispatcher.requests();
    let Request::Single(op) = &requests[0] else { panic!("expected a single request") };
    assert_eq!(op.address().to_string(), "/host=primary/subsystem=io");
    assert!(service.contains(&t("/host=primary/subsystem=io")));
}

#[tokio::test]
async fn wildcard_lookup_expands_to_concrete_entries() {
    let dispatcher = ScriptedDispatcher::new(vec![Reply::Single(json!([
        { "address": [ { "subsystem": "logging" }, { "logger": "a" } ], "outcome": "success", "result": description("a") },
        { "address": [ { "subsystem": "logging" }, { "logger": "b" } ], "outcome": "success", "result": description("b") }
    ]))]);
    let service = lookup_service(dispatcher.clone(), ServerMode::Standalone);
    let wildcard = t("/subsystem=logging/logger=*");

    // several resources: no single answer
    assert!(service.lookup(&wildcard).await.unwrap().is_empty());
    assert!(service.contains(&wildcard));
    assert_eq!(
        service.get(&t("/subsystem=logging/logger=b")).resource_description().description(),
        Some("b")
    );

    assert!(service.lookup(&wildcard).await.unwrap().is_empty());
    assert_eq!(dispatcher.requests().len(), 1);

    let dump = service.dump();
    assert_eq!(dump.processed.len(), 1);
    assert_eq!(dump.processed[0].requested, "/subsystem=logging/logger=*");
    assert_eq!(dump.processed[0].resolved.len(), 2);
}

#[tokio::test]
async fn recursive_processing_tags_metadata_and_sends_depth() {
    let nested = json!({
        "description": "io",
        "access-control": {
            "default": { "read": true, "write": true },
            "exceptions": {
                "worker": { "address": [ { "subsystem": "io" }, { "worker": "default" } ], "read": true, "write": false }
            }
        },
        "children": { "worker": { "model-description": { "default": {
            "description": "worker",
            "access-control": { "default": { "read": true, "write": true } }
        } } } }
    });
    let dispatcher = ScriptedDispatcher::new(vec![Reply::Single(json!({ "description": "io" })), Reply::Single(nested)]);
    let service = lookup_service(dispatcher.clone(), ServerMode::Standalone);
    let io = t("/subsystem=io");

    // plain lookup first; without access control the entry falls back to read-only
    let plain = service.lookup(&io).await.unwrap();
    assert!(!plain.is_recursive());
    assert!(!plain.security_context().writable());

    // a recursive request for a non-recursive entry fetches again
    let metadata = service.process(&[io.clone()], true).await.unwrap();
    let requests = dispatcher.requests();
    assert_eq!(requests.len(), 2);
    let Request::Single(op) = &requests[1] else { panic!("expected a single request") };
    assert_eq!(op.get_param("recursive-depth"), Some(&json!(1)));
    // the recursive description replaces the flat one
    assert!(metadata[0].is_recursive());
    assert!(metadata[0].security_context().writable());

    // and settles: asking again recursively is served from the cache
    let again = service.process(&[io.clone()], true).await.unwrap();
    assert!(again[0].is_recursive());
    assert_eq!(dispatcher.requests().len(), 2);

    let worker = service.get(&t("/subsystem=io/worker=default"));
    assert!(worker.is_recursive());
    assert!(!worker.security_context().writable(), "the exception seen first wins");
}

#[tokio::test]
async fn nothing_to_do_makes_no_requests() {
    let dispatcher = ScriptedDispatcher::new(Vec::new());
    let service = lookup_service(dispatcher.clone(), ServerMode::Standalone);
    assert!(service.process(&[], false).await.unwrap().is_empty());
    assert!(dispatcher.requests().is_empty());
    assert!(service.get(&t("/subsystem=unknown")).is_empty());
}
