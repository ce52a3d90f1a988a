use std::sync::Arc;

use notif_bridge::{codes, BridgeError, MethodCall, MethodResponse, NotificationBridge};
use notif_domain::clock::ManualClock;
use notif_domain::events::NotificationEvent;
use notif_domain::memory::{MemoryPresenter, MemoryStore, MemoryTaskRunner};
use notif_domain::notifications::{TaskOutcome, TaskRunner};
use notif_domain::NotificationService;
use serde_json::{json, Value};

const NOW: i64 = 1_700_000_000_000;

struct Harness {
    clock: ManualClock,
    runner: Arc<MemoryTaskRunner>,
    presenter: Arc<MemoryPresenter>,
    bridge: NotificationBridge,
}

fn harness_with(presenter: MemoryPresenter) -> Harness {
    let clock = ManualClock::new(NOW);
    let runner = Arc::new(MemoryTaskRunner::new(Arc::new(clock.clone())));
    let presenter = Arc::new(presenter);
    let service = NotificationService::builder()
        .with_store(Arc::new(MemoryStore::new()))
        .with_task_runner(runner.clone())
        .with_presenter(presenter.clone())
        .with_clock(Arc::new(clock.clone()))
        .build()
        .expect("build service");
    Harness {
        clock,
        runner,
        presenter,
        bridge: NotificationBridge::new(service),
    }
}

fn harness() -> Harness {
    harness_with(MemoryPresenter::new())
}

fn call(h: &Harness, method: &str, arguments: Value) -> Value {
    h.bridge
        .handle(method, &arguments)
        .unwrap_or_else(|err| panic!("{method} failed: {err}"))
}

fn schedule_args(id: &str, at: i64) -> Value {
    json!({
        "id": id,
        "request": {
            "title": "Reminder",
            "body": "Water the plants",
            "actions": [{"id": "done", "title": "Done", "isDestructive": false}],
            "payload": {"plant": "fern"},
            "badgeNumber": 2
        },
        "scheduledDate": at,
        "isRepeating": false
    })
}

#[test]
fn lifecycle_commands_round_trip() {
    let h = harness();
    assert_eq!(call(&h, "initialize", Value::Null), json!(true));
    assert_eq!(call(&h, "scheduleNotification", schedule_args("A", NOW + 10_000)), json!(true));

    let listed = call(&h, "getScheduledNotifications", Value::Null);
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["id"], json!("A"));
    assert_eq!(listed[0]["scheduledDate"], json!(NOW + 10_000));
    assert_eq!(listed[0]["request"]["payload"]["plant"], json!("fern"));

    assert_eq!(call(&h, "cancelScheduledNotification", json!({"id": "A"})), json!(true));
    assert_eq!(call(&h, "getScheduledNotifications", Value::Null), json!([]));
    assert!(h.runner.pending().is_empty());
}

#[test]
fn past_schedule_date_reports_false() {
    let h = harness();
    assert_eq!(call(&h, "scheduleNotification", schedule_args("late", NOW - 1)), json!(false));
    assert_eq!(call(&h, "getScheduledNotifications", Value::Null), json!([]));
}

#[test]
fn missing_arguments_are_validation_failures() {
    let h = harness();
    assert_eq!(call(&h, "showNotification", json!({"id": "x"})), json!(false));
    assert_eq!(call(&h, "scheduleNotification", json!({"id": "x"})), json!(false));
    assert_eq!(call(&h, "cancelScheduledNotification", Value::Null), json!(false));
    assert_eq!(call(&h, "setBadgeCount", json!({})), json!(false));
    assert_eq!(call(&h, "isDuplicateNotification", json!({})), json!(false));
    assert_eq!(call(&h, "updateScheduledNotification", json!({"id": "x"})), json!(false));
}

#[test]
fn duplicate_show_within_window_returns_false() {
    let h = harness();
    let show = json!({
        "id": "promo-1",
        "title": "Flash sale",
        "body": "Ends soon",
        "duplicateKey": "promo",
        "duplicateWindow": 10
    });

    assert_eq!(call(&h, "showNotification", show.clone()), json!(true));
    h.clock.advance_secs(3);
    assert_eq!(call(&h, "showNotification", show.clone()), json!(false));
    assert_eq!(
        call(&h, "isDuplicateNotification", json!({"duplicateKey": "promo", "timeWindow": 10})),
        json!(true)
    );
    assert_eq!(h.presenter.presented_count(), 1);

    h.clock.advance_secs(8);
    assert_eq!(call(&h, "showNotification", show), json!(true));
    assert_eq!(h.presenter.presented_count(), 2);

    assert_eq!(call(&h, "clearNotificationHistory", Value::Null), json!(true));
    assert_eq!(
        call(&h, "isDuplicateNotification", json!({"duplicateKey": "promo"})),
        json!(false)
    );
    assert!(h.presenter.displayed().is_empty());
}

#[test]
fn presenter_failure_maps_to_named_error() {
    let h = harness();
    h.presenter.fail_next_present("channel disabled");
    let err = h
        .bridge
        .handle("showNotification", &json!({"id": "n", "title": "t", "body": "b"}))
        .unwrap_err();
    assert_eq!(err.code(), codes::SHOW_NOTIFICATION);
    assert!(matches!(err, BridgeError::Native { .. }));
}

#[test]
fn unknown_method_is_not_implemented() {
    let h = harness();
    let response = h.bridge.handle_call(&MethodCall {
        method: "teleport".into(),
        arguments: Value::Null,
    });
    match response {
        MethodResponse::Error(body) => assert_eq!(body.code, "NOT_IMPLEMENTED"),
        MethodResponse::Ok(value) => panic!("unexpected success: {value}"),
    }
}

#[test]
fn badge_commands_use_the_store_fallback() {
    let h = harness();
    assert_eq!(call(&h, "getBadgeCount", Value::Null), json!(0));
    assert_eq!(call(&h, "setBadgeCount", json!({"count": 4})), json!(true));
    assert_eq!(call(&h, "getBadgeCount", Value::Null), json!(4));
    assert_eq!(call(&h, "clearBadgeCount", Value::Null), json!(true));
    assert_eq!(call(&h, "getBadgeCount", Value::Null), json!(0));
}

#[test]
fn permission_queries_reflect_the_presenter() {
    let h = harness_with(MemoryPresenter::denied());
    assert_eq!(call(&h, "requestPermissions", Value::Null), json!(false));
    assert_eq!(call(&h, "areNotificationsEnabled", Value::Null), json!(false));
}

#[test]
fn update_moves_the_schedule_and_keeps_content() {
    let h = harness();
    call(&h, "scheduleNotification", schedule_args("A", NOW + 10_000));
    let updated = call(
        &h,
        "updateScheduledNotification",
        json!({"id": "A", "scheduledDate": NOW + 60_000, "isRepeating": true, "repeatInterval": 30}),
    );
    assert_eq!(updated, json!(true));

    let listed = call(&h, "getScheduledNotifications", Value::Null);
    assert_eq!(listed[0]["scheduledDate"], json!(NOW + 60_000));
    assert_eq!(listed[0]["repeatInterval"], json!(30));
    assert_eq!(listed[0]["request"]["body"], json!("Water the plants"));
    assert_eq!(h.runner.pending_for("notification_A").len(), 1);
}

#[test]
fn fired_task_presents_and_native_taps_reach_the_listener() {
    let h = harness();
    let subscription = h.bridge.listen();
    call(&h, "scheduleNotification", schedule_args("A", NOW + 1_000));

    h.clock.advance_ms(1_000);
    for armed in h.runner.take_due() {
        assert_eq!(h.bridge.on_task_fired(&armed.task.payload), TaskOutcome::Success);
    }
    let shown = h.presenter.displayed();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].content.payload["plant"], json!("fern"));

    h.bridge
        .notification_tapped("A", Some(shown[0].content.payload.clone()));
    h.bridge.action_pressed("A", "done");
    let events = subscription.drain();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], NotificationEvent::Tap { notification_id, .. } if notification_id == "A"));
    assert!(matches!(&events[1], NotificationEvent::Action { action_id, .. } if action_id == "done"));

    h.bridge.cancel_listen();
    h.bridge.action_pressed("A", "done");
    assert!(subscription.drain().is_empty());
}

#[test]
fn on_boot_restores_pending_schedules() {
    let h = harness();
    call(&h, "scheduleNotification", schedule_args("A", NOW + 10_000));
    h.runner.cancel_all().unwrap();

    let report = h.bridge.on_boot();
    assert_eq!(report.rearmed, 1);
    assert_eq!(h.runner.pending_for("notification_A").len(), 1);
}
