//! End-to-end tests driving a whole session through the scriptable
//! transport and parser fakes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use futures::executor::block_on;
use serde_json::json;

use refrag::{
    Completion, Config, Document, FetchResponse, LoadRequest, NodeBuilder, OrchestrationError,
    Session, TestParser, TestParserState, TestTransport, TestTransportState,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn live_document() -> Document {
    let mut document = Document::new(NodeBuilder::element("body"));
    let root_id = document.root_id();

    document.insert(
        root_id,
        NodeBuilder::element("h1")
            .attribute("data-load", "title")
            .child(NodeBuilder::text("Old title")),
    );
    document.insert(
        root_id,
        NodeBuilder::element("p")
            .attribute("data-load", "footer")
            .child(NodeBuilder::text("Old footer")),
    );

    document
}

fn start_session(config: Config) -> (TestTransportState, TestParserState, Session) {
    let _ = env_logger::try_init();

    let (transport_state, transport) = TestTransport::new();
    let (parser_state, parser) = TestParser::new();
    let session = Session::new(
        config,
        live_document(),
        Arc::new(transport),
        Arc::new(parser),
    );

    (transport_state, parser_state, session)
}

fn on_channel(
    sender: mpsc::Sender<Result<Completion, OrchestrationError>>,
) -> impl FnOnce(Result<Completion, OrchestrationError>) + Send + 'static {
    move |result| {
        let _ = sender.send(result);
    }
}

fn requested_urls(state: &TestTransportState) -> Vec<String> {
    state
        .requests()
        .into_iter()
        .map(|request| request.url)
        .collect()
}

#[test]
fn empty_request_completes_without_touching_the_transport() {
    let (transport_state, _, session) = start_session(Config::default());
    let (sender, receiver) = mpsc::channel();

    session.load(LoadRequest::new().on_complete(on_channel(sender)));

    let completion = receiver.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!(completion.data, json!({}));
    assert!(transport_state.requests().is_empty());
}

#[test]
fn named_data_requests_run_in_order_and_nest_under_their_names() {
    let (transport_state, _, session) = start_session(Config::default());
    transport_state.respond("a.json", FetchResponse::ok(r#"{"x": 1}"#));
    transport_state.respond("b.json", FetchResponse::ok("[2]"));

    let (sender, receiver) = mpsc::channel();
    session.load(
        LoadRequest::new()
            .json_named("a", "a.json")
            .json_named("b", "b.json")
            .on_complete(on_channel(sender)),
    );

    let completion = receiver.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!(completion.data, json!({ "a": { "x": 1 }, "b": [2] }));
    assert_eq!(requested_urls(&transport_state), vec!["a.json", "b.json"]);
}

#[test]
fn a_sole_data_request_becomes_the_whole_result() {
    let (transport_state, _, session) = start_session(Config::default());
    transport_state.respond("data.json", FetchResponse::ok(r#"{"user": "iva"}"#));

    let (sender, receiver) = mpsc::channel();
    session.load(
        LoadRequest::new()
            .json("data.json")
            .on_complete(on_channel(sender)),
    );

    let completion = receiver.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!(completion.data, json!({ "user": "iva" }));
}

#[test]
fn a_failed_data_request_abandons_the_rest_of_the_queue() {
    let (transport_state, _, session) = start_session(Config::default());
    transport_state.respond("b.json", FetchResponse::ok("[2]"));

    let (sender, receiver) = mpsc::channel();
    session.load(
        LoadRequest::new()
            .json_named("a", "a.json")
            .json_named("b", "b.json")
            .on_complete(on_channel(sender)),
    );

    let result = receiver.recv_timeout(TIMEOUT).unwrap();
    match result {
        Err(OrchestrationError::FetchFailed { file, status }) => {
            assert_eq!(file, "a.json");
            assert_eq!(status, 404);
        }
        other => panic!("unexpected result: {:?}", other.map(|c| c.data)),
    }

    assert_eq!(requested_urls(&transport_state), vec!["a.json"]);
}

#[test]
fn malformed_data_fails_the_orchestration() {
    let (transport_state, _, session) = start_session(Config::default());
    transport_state.respond("data.json", FetchResponse::ok("not json"));

    let (sender, receiver) = mpsc::channel();
    session.load(
        LoadRequest::new()
            .json("data.json")
            .on_complete(on_channel(sender)),
    );

    let result = receiver.recv_timeout(TIMEOUT).unwrap();
    assert!(matches!(
        result,
        Err(OrchestrationError::MalformedData { .. })
    ));
}

#[test]
fn transport_failures_surface_as_io_errors() {
    let (transport_state, _, session) = start_session(Config::default());
    transport_state.fail_io("data.json");

    let (sender, receiver) = mpsc::channel();
    session.load(
        LoadRequest::new()
            .json("data.json")
            .on_complete(on_channel(sender)),
    );

    let result = receiver.recv_timeout(TIMEOUT).unwrap();
    assert!(matches!(result, Err(OrchestrationError::Io { .. })));
}

#[test]
fn loading_a_view_swaps_matching_fragments_in_place() {
    let (transport_state, parser_state, session) = start_session(Config::default());

    let body = r#"<h1 data-load="title">Hello</h1>"#;
    transport_state.respond("views/home.html", FetchResponse::ok(body));

    let mut incoming = Document::new(NodeBuilder::element("body"));
    let root_id = incoming.root_id();
    incoming.insert(
        root_id,
        NodeBuilder::element("h1")
            .attribute("data-load", "title")
            .child(NodeBuilder::text("Hello")),
    );
    parser_state.register(body, incoming);

    let (sender, receiver) = mpsc::channel();
    session.load(LoadRequest::new().view("home").on_complete(on_channel(sender)));

    receiver.recv_timeout(TIMEOUT).unwrap().unwrap();

    let flash = session.flash_handle();
    let flash = flash.lock().unwrap();

    let title = flash.find("title").unwrap();
    assert_eq!(title.lock().unwrap().get(), "Hello");

    let footer = flash.find("footer").unwrap();
    assert_eq!(footer.lock().unwrap().get(), "Old footer");

    let doc = session.document();
    let doc = doc.lock().unwrap();
    let element = title.lock().unwrap().elements()[0];
    assert_eq!(doc.content(element), "Hello");
}

#[test]
fn completed_swaps_land_on_the_change_feed() {
    let (transport_state, parser_state, session) = start_session(Config::default());

    let body = r#"<h1 data-load="title">Hello</h1>"#;
    transport_state.respond("views/home.html", FetchResponse::ok(body));

    let mut incoming = Document::new(NodeBuilder::element("body"));
    let root_id = incoming.root_id();
    incoming.insert(
        root_id,
        NodeBuilder::element("h1")
            .attribute("data-load", "title")
            .child(NodeBuilder::text("Hello")),
    );
    parser_state.register(body, incoming);

    let (sender, receiver) = mpsc::channel();
    session.load(LoadRequest::new().view("home").on_complete(on_channel(sender)));
    receiver.recv_timeout(TIMEOUT).unwrap().unwrap();

    let (_, changes) = block_on(session.changes().subscribe(0)).unwrap();
    assert!(changes
        .iter()
        .any(|change| change.name == "title" && change.value == "Hello"));
}

#[test]
fn a_newer_load_supersedes_the_one_in_flight() {
    let (transport_state, _, session) = start_session(Config::default());

    transport_state.hold("views/slow.html");
    transport_state.respond("views/slow.html", FetchResponse::ok(""));
    transport_state.respond("views/fast.html", FetchResponse::ok(""));

    let (slow_sender, slow_receiver) = mpsc::channel();
    session.load(
        LoadRequest::new()
            .view("slow")
            .on_complete(on_channel(slow_sender)),
    );
    transport_state.wait_for_request("views/slow.html");

    let (fast_sender, fast_receiver) = mpsc::channel();
    session.load(
        LoadRequest::new()
            .view("fast")
            .on_complete(on_channel(fast_sender)),
    );
    transport_state.release("views/slow.html");

    fast_receiver.recv_timeout(TIMEOUT).unwrap().unwrap();

    // The superseded load's callback must never fire, success or failure.
    assert!(slow_receiver.recv_timeout(Duration::from_millis(200)).is_err());
    assert!(transport_state.aborts() >= 1);
}

#[test]
fn a_superseded_load_never_reports_its_failure() {
    let (transport_state, _, session) = start_session(Config::default());

    // slow.json has no scripted response, so releasing it answers 404.
    transport_state.hold("slow.json");
    transport_state.respond("fast.json", FetchResponse::ok("{}"));

    let (slow_sender, slow_receiver) = mpsc::channel();
    session.load(
        LoadRequest::new()
            .json("slow.json")
            .on_complete(on_channel(slow_sender)),
    );
    transport_state.wait_for_request("slow.json");

    let (fast_sender, fast_receiver) = mpsc::channel();
    session.load(
        LoadRequest::new()
            .json("fast.json")
            .on_complete(on_channel(fast_sender)),
    );
    transport_state.release("slow.json");

    fast_receiver.recv_timeout(TIMEOUT).unwrap().unwrap();

    // The stale load's fetch failed, but its callback must stay a no-op.
    assert!(slow_receiver.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn the_global_complete_callback_sees_every_success() {
    let calls = Arc::new(AtomicUsize::new(0));

    let config = Config {
        complete: Some({
            let calls = Arc::clone(&calls);
            Arc::new(move |_completion: &Completion| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        }),
        ..Default::default()
    };

    let (transport_state, _, session) = start_session(config);
    transport_state.respond("data.json", FetchResponse::ok("{}"));
    transport_state.fail_io("bad.json");

    let (sender, receiver) = mpsc::channel();
    session.load(
        LoadRequest::new()
            .json("data.json")
            .on_complete(on_channel(sender)),
    );
    receiver.recv_timeout(TIMEOUT).unwrap().unwrap();

    let (sender, receiver) = mpsc::channel();
    session.load(
        LoadRequest::new()
            .json("bad.json")
            .on_complete(on_channel(sender)),
    );
    assert!(receiver.recv_timeout(TIMEOUT).unwrap().is_err());

    // One success, one failure: the global callback only saw the success.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn the_base_path_prefixes_every_fetch() {
    let config = Config {
        base: Some("app".to_owned()),
        ..Default::default()
    };

    let (transport_state, _, session) = start_session(config);
    transport_state.respond("app/data.json", FetchResponse::ok("{}"));

    let (sender, receiver) = mpsc::channel();
    session.load(
        LoadRequest::new()
            .json("data.json")
            .on_complete(on_channel(sender)),
    );

    receiver.recv_timeout(TIMEOUT).unwrap().unwrap();
    assert_eq!(requested_urls(&transport_state), vec!["app/data.json"]);
}

#[test]
fn session_wide_transitions_drive_the_swap() {
    let calls = Arc::new(AtomicUsize::new(0));

    let mut config = Config::default();
    {
        let calls = Arc::clone(&calls);
        config.transitions.insert("title", move |job: refrag::TransitionJob| {
            calls.fetch_add(1, Ordering::SeqCst);
            job.completion.finish();
        });
    }

    let (transport_state, parser_state, session) = start_session(config);

    let body = r#"<h1 data-load="title">Hello</h1>"#;
    transport_state.respond("views/home.html", FetchResponse::ok(body));

    let mut incoming = Document::new(NodeBuilder::element("body"));
    let root_id = incoming.root_id();
    incoming.insert(
        root_id,
        NodeBuilder::element("h1")
            .attribute("data-load", "title")
            .child(NodeBuilder::text("Hello")),
    );
    parser_state.register(body, incoming);

    let (sender, receiver) = mpsc::channel();
    session.load(LoadRequest::new().view("home").on_complete(on_channel(sender)));
    receiver.recv_timeout(TIMEOUT).unwrap().unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let flash = session.flash_handle();
    let flash = flash.lock().unwrap();
    assert_eq!(flash.find("title").unwrap().lock().unwrap().get(), "Hello");
}
