use crate::common::{
    config_body, controller, report_body, status_body, MockReply, MockTransport,
};
use omniping::core::dashboard::{
    ActiveView, DashboardEvent, EngineAction, HttpVerb, PollingIndicator, RunState,
    ServerIndicator, SetupForm,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::{sleep, Instant};

fn engine_reply(message: &str, polling: Option<bool>) -> MockReply {
    let mut body = json!({ "message": message });
    if let Some(polling) = polling {
        body["polling"] = Value::Bool(polling);
    }
    MockReply::ok(body)
}

fn actions_sent(transport: &MockTransport) -> Vec<String> {
    transport
        .calls_to(HttpVerb::Post, "engine")
        .into_iter()
        .filter_map(|call| call.body?.get("action")?.as_str().map(str::to_string))
        .collect()
}

// Initialization

#[tokio::test(start_paused = true)]
async fn test_initialize_running_engine_opens_report() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Get, "version", MockReply::ok(status_body(Some(true))));
    transport.on(HttpVerb::Get, "run", MockReply::ok(report_body(true)));
    let (controller, view) = controller(&transport);

    controller.initialize().await;

    let state = controller.state();
    assert_eq!(controller.run_state(), RunState::Running);
    assert_eq!(state.polling_indicator, PollingIndicator::On);
    assert_eq!(state.server_indicator, ServerIndicator::On);
    assert_eq!(state.view, ActiveView::Report);
    assert!(!state.curtain);
    assert_eq!(transport.count(HttpVerb::Get, "run"), 1);
    assert_eq!(transport.count(HttpVerb::Get, "tests"), 0);

    let messages = view.messages();
    assert_eq!(messages[0], "checking Server...");
    assert!(messages.contains(&"Engine ready".to_string()));

    let events = view.events();
    let banner = events
        .iter()
        .find_map(|event| match event {
            DashboardEvent::Banner(banner) => Some(banner.clone()),
            _ => None,
        })
        .expect("banner emitted");
    assert_eq!(banner.version.as_deref(), Some("2.1"));
    assert_eq!(banner.text_colour, "#DDDDDD");
    assert!(events.contains(&DashboardEvent::RunControl(EngineAction::Stop)));
    assert!(events
        .iter()
        .any(|event| matches!(event, DashboardEvent::Report(report) if report.tests.len() == 1)));
}

#[tokio::test(start_paused = true)]
async fn test_initialize_stopped_engine_opens_setup() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Get, "version", MockReply::ok(status_body(Some(false))));
    transport.on(HttpVerb::Get, "tests", MockReply::ok(config_body()));
    let (controller, view) = controller(&transport);

    controller.initialize().await;

    let state = controller.state();
    assert_eq!(controller.run_state(), RunState::Stopped);
    assert_eq!(state.polling_indicator, PollingIndicator::Off);
    assert_eq!(state.view, ActiveView::Setup);
    assert_eq!(transport.count(HttpVerb::Get, "run"), 0);

    let setup = view
        .events()
        .into_iter()
        .find_map(|event| match event {
            DashboardEvent::Setup(setup) => Some(setup),
            _ => None,
        })
        .expect("setup emitted");
    assert_eq!(
        setup.tests_text,
        "10.0.0.1 ; Router ; PING\n# www.example.com ; Site ; HTTPS"
    );
    assert_eq!(setup.fields.get("interval").map(String::as_str), Some("30"));
    assert_eq!(setup.fields.get("heading").map(String::as_str), Some("Branch Office"));
    assert!(!setup.fields.contains_key("tests"));
    assert_eq!(setup.content.len(), 2);
    assert!(view
        .events()
        .contains(&DashboardEvent::RunControl(EngineAction::Start)));
}

#[tokio::test(start_paused = true)]
async fn test_initialize_without_running_flag_is_unknown() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Get, "version", MockReply::ok(status_body(None)));
    let (controller, _) = controller(&transport);

    controller.initialize().await;

    assert_eq!(controller.run_state(), RunState::Unknown);
    assert_eq!(controller.state().polling_indicator, PollingIndicator::Err);
    assert_eq!(controller.state().server_indicator, ServerIndicator::On);
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_initialize_unreachable_server() {
    let transport = MockTransport::new();
    let (controller, view) = controller(&transport);

    controller.initialize().await;

    let state = controller.state();
    assert_eq!(controller.run_state(), RunState::Unknown);
    assert_eq!(state.server_indicator, ServerIndicator::Err);
    assert_eq!(state.polling_indicator, PollingIndicator::Err);
    assert!(state.curtain);
    assert!(view.messages().contains(&"connection refused".to_string()));
    assert!(view.events().contains(&DashboardEvent::Curtain(true)));
}

#[tokio::test(start_paused = true)]
async fn test_initialize_after_outage_lifts_curtain() {
    let transport = MockTransport::new();
    transport.on(
        HttpVerb::Get,
        "version",
        MockReply::Unreachable("timed out".to_string()),
    );
    transport.on(HttpVerb::Get, "version", MockReply::ok(status_body(None)));
    let (controller, _) = controller(&transport);

    controller.initialize().await;
    assert!(controller.state().curtain);

    controller.initialize().await;
    assert!(!controller.state().curtain);
    assert_eq!(controller.state().server_indicator, ServerIndicator::On);
}

// Run control

#[tokio::test(start_paused = true)]
async fn test_toggle_run_starts_then_stops() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Post, "engine", engine_reply("Polling started", Some(true)));
    transport.on(HttpVerb::Post, "engine", engine_reply("Polling stopped", Some(false)));
    let (controller, view) = controller(&transport);

    controller.toggle_run().await;
    assert_eq!(controller.run_state(), RunState::Running);
    assert_eq!(controller.state().polling_indicator, PollingIndicator::On);

    controller.toggle_run().await;
    assert_eq!(controller.run_state(), RunState::Stopped);
    assert_eq!(controller.state().polling_indicator, PollingIndicator::Off);

    assert_eq!(actions_sent(&transport), vec!["start", "stop"]);
    let messages = view.messages();
    assert!(messages.contains(&"Polling started".to_string()));
    assert!(messages.contains(&"Polling stopped".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_toggle_run_from_unknown_issues_start() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Post, "engine", engine_reply("ok", None));
    let (controller, _) = controller(&transport);

    controller.toggle_run().await;

    assert_eq!(actions_sent(&transport), vec!["start"]);
    // Response without a polling flag
    assert_eq!(controller.run_state(), RunState::Unknown);
    assert_eq!(controller.state().polling_indicator, PollingIndicator::Err);
}

#[tokio::test(start_paused = true)]
async fn test_toggle_run_failure_keeps_run_state() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Post, "engine", engine_reply("Polling started", Some(true)));
    transport.on(
        HttpVerb::Post,
        "engine",
        MockReply::Json(500, json!({"message": "engine busy"})),
    );
    let (controller, view) = controller(&transport);

    controller.toggle_run().await;
    controller.toggle_run().await;

    assert_eq!(controller.run_state(), RunState::Running);
    assert_eq!(controller.state().server_indicator, ServerIndicator::Err);
    assert!(view.messages().contains(&"engine busy (500)".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_stop_and_reset() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Post, "engine", engine_reply("Results reset", Some(false)));
    let (controller, view) = controller(&transport);

    controller.stop_and_reset().await;

    assert_eq!(actions_sent(&transport), vec!["reset"]);
    assert_eq!(controller.run_state(), RunState::Stopped);
    assert!(view.messages().contains(&"Results reset".to_string()));
}

// Auto-refresh

#[tokio::test(start_paused = true)]
async fn test_auto_refresh_fetches_immediately_and_every_interval() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Get, "run", MockReply::ok(report_body(true)));
    let (controller, view) = controller(&transport);

    assert!(controller.start_auto_refresh().await);
    assert!(controller.is_auto_refresh_active());
    assert!(controller.state().auto_refresh_active);
    assert_eq!(transport.count(HttpVerb::Get, "run"), 1);

    sleep(Duration::from_millis(9500)).await;
    assert_eq!(transport.count(HttpVerb::Get, "run"), 4);
    assert!(view.events().contains(&DashboardEvent::AutoRefresh(true)));
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_a_no_op() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Get, "run", MockReply::ok(report_body(true)));
    let (controller, _) = controller(&transport);

    assert!(controller.start_auto_refresh().await);
    assert!(!controller.start_auto_refresh().await);
    assert_eq!(transport.count(HttpVerb::Get, "run"), 1);

    // Still a single ticking timer
    sleep(Duration::from_millis(3500)).await;
    assert_eq!(transport.count(HttpVerb::Get, "run"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_auto_refresh_fetches_once_and_cancels_ticks() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Get, "run", MockReply::ok(report_body(true)));
    let (controller, view) = controller(&transport);

    controller.start_auto_refresh().await;
    sleep(Duration::from_millis(3500)).await;
    assert_eq!(transport.count(HttpVerb::Get, "run"), 2);

    controller.stop_auto_refresh().await;
    assert!(!controller.is_auto_refresh_active());
    assert!(!controller.state().auto_refresh_active);
    assert_eq!(transport.count(HttpVerb::Get, "run"), 3);
    assert!(view.events().contains(&DashboardEvent::AutoRefresh(false)));

    sleep(Duration::from_millis(10_000)).await;
    assert_eq!(transport.count(HttpVerb::Get, "run"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_stop_auto_refresh_when_inactive_still_fetches() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Get, "run", MockReply::ok(report_body(false)));
    let (controller, view) = controller(&transport);

    controller.stop_auto_refresh().await;

    assert_eq!(transport.count(HttpVerb::Get, "run"), 1);
    assert!(!view.events().contains(&DashboardEvent::AutoRefresh(false)));
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_fetch_completes_after_stop() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Get, "run", MockReply::ok(report_body(true)));
    transport.on(
        HttpVerb::Get,
        "run",
        MockReply::delayed(2000, MockReply::ok(report_body(false))),
    );
    transport.on(HttpVerb::Get, "run", MockReply::ok(report_body(true)));
    let (controller, _) = controller(&transport);

    controller.start_auto_refresh().await;
    // First tick at 3000ms starts the slow fetch
    sleep(Duration::from_millis(3100)).await;
    assert_eq!(transport.count(HttpVerb::Get, "run"), 2);

    controller.stop_auto_refresh().await;
    assert_eq!(transport.count(HttpVerb::Get, "run"), 3);
    assert_eq!(controller.run_state(), RunState::Running);

    // The slow tick fetch still lands, and no new ticks fire
    sleep(Duration::from_millis(5000)).await;
    assert_eq!(transport.count(HttpVerb::Get, "run"), 3);
    assert_eq!(controller.run_state(), RunState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_controller_stops_ticks() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Get, "run", MockReply::ok(report_body(true)));
    let (controller, _) = controller(&transport);

    controller.start_auto_refresh().await;
    drop(controller);

    sleep(Duration::from_millis(10_000)).await;
    assert_eq!(transport.count(HttpVerb::Get, "run"), 1);
}

// Clearing counters

#[tokio::test(start_paused = true)]
async fn test_clear_counters_restores_active_auto_refresh() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Get, "run", MockReply::ok(report_body(true)));
    transport.on(HttpVerb::Post, "engine", engine_reply("Counters cleared", Some(true)));
    let (controller, view) = controller(&transport);

    controller.start_auto_refresh().await;
    let started = Instant::now();
    controller.clear_counters().await;

    assert!(started.elapsed() >= Duration::from_millis(1000));
    assert_eq!(actions_sent(&transport), vec!["clear"]);
    assert_eq!(transport.count(HttpVerb::Get, "run"), 2);
    assert!(controller.is_auto_refresh_active());

    let toggles: Vec<_> = view
        .events()
        .into_iter()
        .filter(|event| matches!(event, DashboardEvent::AutoRefresh(_)))
        .collect();
    assert_eq!(
        toggles,
        vec![
            DashboardEvent::AutoRefresh(true),
            DashboardEvent::AutoRefresh(false),
            DashboardEvent::AutoRefresh(true),
        ]
    );

    // Restarted timer ticks on a fresh interval
    sleep(Duration::from_millis(3500)).await;
    assert_eq!(transport.count(HttpVerb::Get, "run"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_clear_counters_keeps_inactive_auto_refresh() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Get, "run", MockReply::ok(report_body(false)));
    transport.on(HttpVerb::Post, "engine", engine_reply("Counters cleared", Some(false)));
    let (controller, view) = controller(&transport);

    controller.clear_counters().await;

    assert!(!controller.is_auto_refresh_active());
    assert_eq!(transport.count(HttpVerb::Get, "run"), 1);
    assert!(view.messages().contains(&"Counters cleared".to_string()));

    sleep(Duration::from_millis(10_000)).await;
    assert_eq!(transport.count(HttpVerb::Get, "run"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_clear_counters_failure_marks_polling_err() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Get, "run", MockReply::ok(report_body(true)));
    let (controller, view) = controller(&transport);

    controller.start_auto_refresh().await;
    controller.clear_counters().await;

    assert!(controller.is_auto_refresh_active());
    assert_eq!(controller.state().polling_indicator, PollingIndicator::Err);
    assert!(view.messages().contains(&"connection refused".to_string()));
    assert_eq!(transport.count(HttpVerb::Get, "run"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_clear_counters_rejected_keeps_server_bad() {
    let transport = MockTransport::new();
    transport.on(
        HttpVerb::Post,
        "engine",
        MockReply::Json(500, json!({"message": "clear failed"})),
    );
    let (controller, view) = controller(&transport);

    controller.clear_counters().await;

    let state = controller.state();
    assert_eq!(state.polling_indicator, PollingIndicator::Err);
    assert_eq!(state.server_indicator, ServerIndicator::Bad);
    assert!(view.messages().contains(&"clear failed (500)".to_string()));
}

// Reports

#[tokio::test(start_paused = true)]
async fn test_fetch_report_failure_only_reports_message() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Get, "run", MockReply::ok(report_body(true)));
    transport.on(
        HttpVerb::Get,
        "run",
        MockReply::Unreachable("timed out".to_string()),
    );
    let (controller, view) = controller(&transport);

    controller.fetch_report().await;
    controller.fetch_report().await;

    assert_eq!(controller.run_state(), RunState::Running);
    assert_eq!(controller.state().polling_indicator, PollingIndicator::On);
    assert_eq!(controller.state().server_indicator, ServerIndicator::Err);
    assert_eq!(view.messages().last().map(String::as_str), Some("timed out"));
}

#[tokio::test(start_paused = true)]
async fn test_report_without_running_flag_marks_polling_err() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Get, "run", MockReply::ok(json!({"message": "", "tests": []})));
    let (controller, _) = controller(&transport);

    controller.fetch_report().await;

    assert_eq!(controller.run_state(), RunState::Unknown);
    assert_eq!(controller.state().polling_indicator, PollingIndicator::Err);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_requests_last_completion_wins() {
    let transport = MockTransport::new();
    transport.on(
        HttpVerb::Get,
        "run",
        MockReply::delayed(500, MockReply::ok(report_body(false))),
    );
    transport.on(HttpVerb::Get, "run", MockReply::ok(report_body(true)));
    let (controller, _) = controller(&transport);

    // The first request answers last
    tokio::join!(controller.fetch_report(), controller.fetch_report());

    assert_eq!(controller.run_state(), RunState::Stopped);
    assert_eq!(controller.state().polling_indicator, PollingIndicator::Off);
}

// Setup

#[tokio::test(start_paused = true)]
async fn test_save_config_submits_decoded_tests() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Post, "setup", MockReply::ok(config_body()));
    let (controller, view) = controller(&transport);

    let form = SetupForm {
        fields: BTreeMap::from([
            ("heading".to_string(), "Branch Office".to_string()),
            ("interval".to_string(), "30".to_string()),
        ]),
        tests_text: "10.0.0.1 ; Router ; ping\n# www.example.com : Site : https\nnot a test\n\n"
            .to_string(),
    };
    let outcome = controller.save_config(&form).await;

    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.dropped_lines, 1);

    let calls = transport.calls_to(HttpVerb::Post, "setup");
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].body,
        Some(json!({
            "heading": "Branch Office",
            "interval": "30",
            "tests": [
                {"host": "10.0.0.1", "desc": "Router", "test": "PING", "active": true},
                {"host": "www.example.com", "desc": "Site", "test": "HTTPS", "active": false}
            ]
        }))
    );

    assert!(view
        .messages()
        .contains(&"sending new config: 2 tests".to_string()));
    assert_eq!(controller.state().view, ActiveView::Setup);
}

#[tokio::test(start_paused = true)]
async fn test_save_config_failure_sets_server_err() {
    let transport = MockTransport::new();
    transport.on(
        HttpVerb::Post,
        "setup",
        MockReply::Json(400, json!({"message": "bad interval"})),
    );
    let (controller, view) = controller(&transport);

    controller.save_config(&SetupForm::default()).await;

    assert_eq!(controller.state().server_indicator, ServerIndicator::Err);
    assert!(view.messages().contains(&"bad interval (400)".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_showing_setup_cancels_auto_refresh() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Get, "run", MockReply::ok(report_body(true)));
    transport.on(HttpVerb::Get, "tests", MockReply::ok(config_body()));
    let (controller, _) = controller(&transport);

    controller.start_auto_refresh().await;
    controller.fetch_test_config().await;

    assert!(!controller.is_auto_refresh_active());
    sleep(Duration::from_millis(10_000)).await;
    assert_eq!(transport.count(HttpVerb::Get, "run"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_view_stored_config_strips_display_fields() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Get, "tests", MockReply::ok(config_body()));
    let (controller, view) = controller(&transport);

    controller.view_stored_config().await;

    let text = view
        .events()
        .into_iter()
        .find_map(|event| match event {
            DashboardEvent::StoredConfig(text) => Some(text),
            _ => None,
        })
        .expect("stored config emitted");
    let stored: Value = serde_json::from_str(&text).unwrap();
    assert!(stored.get("content").is_none());
    assert!(stored.get("message").is_none());
    assert_eq!(stored["interval"], json!(30));
    assert!(text.contains('\n'));

    let messages = view.messages();
    assert_eq!(messages, vec!["Fetching Data ...", "Fetched Setup File"]);
}

#[tokio::test(start_paused = true)]
async fn test_view_stored_config_unreachable() {
    let transport = MockTransport::new();
    let (controller, view) = controller(&transport);

    controller.view_stored_config().await;

    assert_eq!(
        view.messages().last().map(String::as_str),
        Some("Couldn't reach server connection refused")
    );
}

// Engine process restart

#[tokio::test(start_paused = true)]
async fn test_restart_reinitializes_after_delay() {
    let transport = MockTransport::new();
    transport.on(HttpVerb::Post, "engine", engine_reply("Restarting", None));
    transport.on(HttpVerb::Get, "version", MockReply::ok(status_body(None)));
    let (controller, view) = controller(&transport);

    let started = Instant::now();
    let reinit = controller
        .restart_engine_process()
        .await
        .expect("restart accepted");

    assert!(controller.state().curtain);
    assert_eq!(actions_sent(&transport), vec!["restart_cp"]);
    assert_eq!(transport.count(HttpVerb::Get, "version"), 0);

    reinit.await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(3000));
    assert_eq!(transport.count(HttpVerb::Get, "version"), 1);
    assert!(!controller.state().curtain);
    assert!(view.messages().contains(&"checking Server...".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_restart_rejected() {
    let transport = MockTransport::new();
    transport.on(
        HttpVerb::Post,
        "engine",
        MockReply::Json(503, json!({"message": "restart unavailable"})),
    );
    let (controller, view) = controller(&transport);

    assert!(controller.restart_engine_process().await.is_none());
    assert!(!controller.state().curtain);
    assert_eq!(controller.state().server_indicator, ServerIndicator::Err);
    assert!(view
        .messages()
        .contains(&"restart unavailable (503)".to_string()));
}
