//! Realtime trigger scenarios
//!
//! These run on a paused tokio clock against the scripted client, so every
//! debounce and grace period is exercised deterministically.
//!
//! Run with: cargo test -p integration-tests --test trigger_tests

use std::sync::Arc;
use std::time::Duration;

use chat_core::{PresenceAction, StatusCategory};
use chat_trigger::{RealtimeTrigger, TriggerOptions, CONNECTION_LOST, SUBSCRIBE_FAILED};
use integration_tests::{
    advance, channel, new_message, settle, typing, user, Call, Harness, ScriptedClient,
    SubscriptionHistory,
};
use serde_json::json;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

/// Spawn and wait out the subscribe debounce
async fn subscribed_harness(name: &str, local: u64) -> Harness {
    let h = Harness::spawn(&channel(name), &user(local));
    advance(ms(501)).await;
    assert!(h.trigger.is_subscribed());
    h
}

// ============================================================================
// Subscription lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_subscribes_after_debounce_and_loads_occupants() {
    let chat = channel("chat-42");
    let client = Arc::new(ScriptedClient::new());
    client.set_occupants(&chat, vec![user(7), user(9)]);
    let h = Harness::spawn_with(client, &chat, &user(7));

    advance(ms(499)).await;
    assert_eq!(h.client.subscribe_count("chat-42"), 0);
    assert!(!h.trigger.is_subscribed());

    advance(ms(2)).await;
    assert_eq!(h.client.subscribe_count("chat-42"), 1);
    assert!(h.trigger.is_subscribed());
    assert_eq!(h.trigger.error(), None);

    // Occupants merged in one batch
    assert_eq!(h.client.here_now_count("chat-42"), 1);
    assert_eq!(h.trigger.presence_version(), 1);
    assert!(h.trigger.contact_presence(&user(9)).is_online);
    assert!(h.trigger.contact_presence(&user(7)).is_online);
    assert!(!h.trigger.contact_presence(&user(99)).is_online);
    assert!(h.trigger.contact_presence(&user(99)).last_seen.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_waits_for_channel_and_user() {
    let client = Arc::new(ScriptedClient::new());
    let trigger = RealtimeTrigger::spawn(client.clone(), TriggerOptions::new());

    trigger.set_user(Some(user(7))).unwrap();
    advance(secs(2)).await;
    assert!(client.calls().is_empty());

    trigger.set_channel(Some(channel("chat-1"))).unwrap();
    advance(ms(501)).await;
    assert_eq!(client.subscribe_count("chat-1"), 1);
    assert!(trigger.is_subscribed());
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_failure_sets_error_and_retries_on_change() {
    let chat = channel("chat-42");
    let client = Arc::new(ScriptedClient::new());
    client.fail_subscribe(true);
    let h = Harness::spawn_with(client, &chat, &user(7));

    advance(ms(501)).await;
    assert!(!h.trigger.is_subscribed());
    assert_eq!(h.trigger.error().as_deref(), Some(SUBSCRIBE_FAILED));
    assert_eq!(h.client.here_now_count("chat-42"), 0);

    // No retry loop on its own
    advance(secs(5)).await;
    assert_eq!(h.client.subscribe_count("chat-42"), 1);

    h.client.fail_subscribe(false);
    h.trigger.set_user(Some(user(8))).unwrap();
    advance(ms(501)).await;
    assert_eq!(h.client.subscribe_count("chat-42"), 2);
    assert!(h.trigger.is_subscribed());
    assert_eq!(h.trigger.error(), None);
}

#[tokio::test(start_paused = true)]
async fn test_user_change_resubscribes_under_new_uuid() {
    let h = subscribed_harness("chat-42", 7).await;

    h.trigger.set_user(Some(user(8))).unwrap();
    settle().await;
    assert!(!h.trigger.is_subscribed());
    assert!(h.client.calls().contains(&Call::Unsubscribe {
        channel: "chat-42".to_string(),
        uuid: "7".to_string(),
    }));

    advance(ms(501)).await;
    assert!(h.trigger.is_subscribed());
    assert_eq!(h.client.here_now_count("chat-42"), 2);
    assert!(h.client.calls().contains(&Call::Subscribe {
        channel: "chat-42".to_string(),
        uuid: "8".to_string(),
    }));
    assert_eq!(h.client.unsubscribe_count("chat-42"), 1);

    // Clearing the user only unsubscribes
    h.trigger.set_user(None).unwrap();
    advance(secs(1)).await;
    assert!(!h.trigger.is_subscribed());
    assert_eq!(h.client.unsubscribe_count("chat-42"), 2);
    assert_eq!(h.client.subscribe_count("chat-42"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_channel_switch_unsubscribes_once_and_drops_pending_presence() {
    let a = channel("chat-a");
    let b = channel("chat-b");
    let h = subscribed_harness("chat-a", 7).await;

    assert!(h.client.presence(&a, PresenceAction::Leave, &user(9)));
    advance(secs(1)).await;

    h.trigger.set_channel(Some(b.clone())).unwrap();
    settle().await;
    assert_eq!(h.client.unsubscribe_count("chat-a"), 1);
    assert!(!h.client.is_listening(&a));
    assert!(!h.trigger.is_subscribed());

    // The debounce for user 9 on chat-a would have fired by now
    advance(secs(3)).await;
    assert_eq!(h.trigger.presence_version(), 0);
    assert!(!h.trigger.presence_data().contains_key(&user(9)));

    // B subscribed after A was released
    assert_eq!(h.client.subscribe_count("chat-b"), 1);
    let calls = h.client.calls();
    let released = calls
        .iter()
        .position(|c| matches!(c, Call::Unsubscribe { channel, .. } if channel == "chat-a"))
        .unwrap();
    let joined = calls
        .iter()
        .position(|c| matches!(c, Call::Subscribe { channel, .. } if channel == "chat-b"))
        .unwrap();
    assert!(released < joined);

    // Same channel again is a no-op
    h.trigger.set_channel(Some(b.clone())).unwrap();
    advance(secs(1)).await;
    assert_eq!(h.client.subscribe_count("chat-b"), 1);
    assert_eq!(h.client.unsubscribe_count("chat-b"), 0);

    // No channel: unsubscribe only
    h.trigger.set_channel(None).unwrap();
    advance(secs(1)).await;
    assert_eq!(h.client.unsubscribe_count("chat-b"), 1);
    assert_eq!(h.client.unsubscribe_count("chat-a"), 1);
    assert_eq!(h.client.calls().len(), calls.len() + 1);
}

#[tokio::test(start_paused = true)]
async fn test_occupants_of_previous_channel_are_discarded() {
    let a = channel("chat-a");
    let b = channel("chat-b");
    let client = Arc::new(ScriptedClient::new());
    client.set_occupants(&a, vec![user(11)]);
    client.set_occupants(&b, vec![user(12)]);
    client.delay_here_now(&a, secs(2));
    let h = Harness::spawn_with(client, &a, &user(7));

    advance(ms(501)).await;
    assert_eq!(h.client.here_now_count("chat-a"), 1);

    h.trigger.set_channel(Some(b)).unwrap();
    advance(ms(600)).await;
    assert!(h.trigger.contact_presence(&user(12)).is_online);
    assert_eq!(h.trigger.presence_version(), 1);

    // chat-a's answer arrives after the switch
    advance(secs(3)).await;
    assert!(!h.trigger.presence_data().contains_key(&user(11)));
    assert_eq!(h.trigger.presence_version(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_unsubscribes() {
    let Harness {
        client, trigger, ..
    } = subscribed_harness("chat-42", 7).await;

    trigger.shutdown().await.unwrap();
    assert_eq!(client.unsubscribe_count("chat-42"), 1);
    assert!(!client.is_listening(&channel("chat-42")));
}

#[tokio::test(start_paused = true)]
async fn test_dropping_handle_unsubscribes() {
    let Harness {
        client, trigger, ..
    } = subscribed_harness("chat-42", 7).await;

    drop(trigger);
    settle().await;
    assert_eq!(client.unsubscribe_count("chat-42"), 1);
}

// ============================================================================
// Messages and typing
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_messages_and_typing_are_routed_apart() {
    let chat = channel("chat-42");
    let h = subscribed_harness("chat-42", 7).await;

    assert!(h.client.message(&chat, typing(&user(9), true)));
    settle().await;
    let seen = h.recorded.typing();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].user_id, user(9));
    assert!(seen[0].is_typing);
    assert!(h.trigger.last_message().is_none());
    assert!(h.recorded.messages().is_empty());

    // Own typing is dropped
    h.client.message(&chat, typing(&user(7), true));
    settle().await;
    assert_eq!(h.recorded.typing().len(), 1);

    // Untyped payloads count as messages
    h.client.message(&chat, json!({ "text": "plain" }));
    settle().await;
    assert_eq!(h.recorded.messages().len(), 1);
    assert_eq!(h.trigger.last_message().unwrap().message["text"], "plain");
}

// ============================================================================
// Presence
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_scenario_chat_42() {
    let chat = channel("chat-42");
    let h = subscribed_harness("chat-42", 7).await;

    assert!(h.client.message(&chat, new_message("hi")));
    settle().await;
    let last = h.trigger.last_message().unwrap();
    assert_eq!(last.message["text"], "hi");
    assert_eq!(h.recorded.messages().len(), 1);

    // Local join is immediate
    h.client.presence(&chat, PresenceAction::Join, &user(7));
    settle().await;
    assert!(h.trigger.contact_presence(&user(7)).is_online);
    let version = h.trigger.presence_version();

    // Leave then join for 9 within the debounce
    h.client.presence(&chat, PresenceAction::Leave, &user(9));
    advance(secs(1)).await;
    h.client.presence(&chat, PresenceAction::Join, &user(9));
    settle().await;
    assert_eq!(h.trigger.presence_version(), version);

    advance(secs(3)).await;
    let presence = h.trigger.contact_presence(&user(9));
    assert!(presence.is_online);
    assert!(presence.last_seen.is_some());
    assert_eq!(h.trigger.presence_version(), version + 1);
}

#[tokio::test(start_paused = true)]
async fn test_remote_presence_holds_for_debounce() {
    let chat = channel("chat-42");
    let client = Arc::new(ScriptedClient::new());
    client.set_occupants(&chat, vec![user(9)]);
    let h = Harness::spawn_with(client, &chat, &user(7));
    advance(ms(501)).await;
    assert!(h.trigger.contact_presence(&user(9)).is_online);

    h.client.presence(&chat, PresenceAction::Timeout, &user(9));
    advance(ms(2_900)).await;
    assert!(h.trigger.contact_presence(&user(9)).is_online);

    advance(ms(200)).await;
    assert!(!h.trigger.contact_presence(&user(9)).is_online);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_event_does_not_bump_version() {
    let chat = channel("chat-42");
    let client = Arc::new(ScriptedClient::new());
    client.set_occupants(&chat, vec![user(9)]);
    let h = Harness::spawn_with(client, &chat, &user(7));
    advance(ms(501)).await;
    let version = h.trigger.presence_version();
    let data = h.trigger.presence_data();

    h.client.presence(&chat, PresenceAction::Join, &user(9));
    advance(secs(4)).await;
    assert_eq!(h.trigger.presence_version(), version);
    assert!(Arc::ptr_eq(&data, &h.trigger.presence_data()));
}

#[tokio::test(start_paused = true)]
async fn test_local_departure_is_ignored() {
    let chat = channel("chat-42");
    let h = subscribed_harness("chat-42", 7).await;

    h.client.presence(&chat, PresenceAction::Join, &user(7));
    settle().await;
    let version = h.trigger.presence_version();

    h.client.presence(&chat, PresenceAction::Leave, &user(7));
    h.client.presence(&chat, PresenceAction::Timeout, &user(7));
    advance(secs(5)).await;

    assert!(h.trigger.contact_presence(&user(7)).is_online);
    assert_eq!(h.trigger.presence_version(), version);
    assert!(h.trigger.is_subscribed());
}

#[tokio::test(start_paused = true)]
async fn test_interval_and_state_change_are_ignored() {
    let chat = channel("chat-42");
    let h = subscribed_harness("chat-42", 7).await;

    h.client.presence(&chat, PresenceAction::Interval, &user(9));
    h.client.presence(&chat, PresenceAction::StateChange, &user(9));
    advance(secs(4)).await;
    assert_eq!(h.trigger.presence_version(), 0);
}

// ============================================================================
// Connection status
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_brief_disconnect_is_invisible() {
    let h = Harness::spawn(&channel("chat-42"), &user(7));
    let history = SubscriptionHistory::watch(h.trigger.watch_state());
    advance(ms(501)).await;

    h.client.status(StatusCategory::Disconnected);
    advance(secs(3)).await;
    assert_eq!(h.trigger.state().reconnect_attempts, 1);
    h.client.status(StatusCategory::Connected);
    advance(secs(10)).await;

    assert!(h.trigger.is_subscribed());
    assert_eq!(h.trigger.state().reconnect_attempts, 0);
    let values = history.values();
    let first_true = values.iter().position(|v| *v).unwrap();
    assert!(values[first_true..].iter().all(|v| *v), "{values:?}");
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_past_grace_is_visible() {
    let h = subscribed_harness("chat-42", 7).await;

    h.client.status(StatusCategory::Disconnected);
    advance(secs(5)).await;
    // A second disconnect does not restart the grace period
    h.client.status(StatusCategory::NetworkDown);
    advance(ms(2_900)).await;
    assert!(h.trigger.is_subscribed());

    advance(ms(200)).await;
    assert!(!h.trigger.is_subscribed());
    assert_eq!(h.trigger.error().as_deref(), Some(CONNECTION_LOST));
    assert_eq!(h.trigger.state().reconnect_attempts, 2);

    h.client.status(StatusCategory::Reconnected);
    settle().await;
    assert!(h.trigger.is_subscribed());
    assert_eq!(h.trigger.error(), None);
}

#[tokio::test(start_paused = true)]
async fn test_status_burst_is_suppressed() {
    let h = subscribed_harness("chat-42", 7).await;
    let mut rx = h.trigger.watch_state();
    rx.borrow_and_update();

    for _ in 0..3 {
        h.client.status(StatusCategory::Connected);
    }
    settle().await;
    assert!(!rx.has_changed().unwrap());

    // Fourth and fifth inside the window
    h.client.status(StatusCategory::Timeout);
    h.client.status(StatusCategory::Disconnected);
    advance(secs(1)).await;
    assert!(!rx.has_changed().unwrap());
    assert_eq!(h.trigger.error(), None);

    // The suppressed disconnect never armed the grace timer
    advance(secs(10)).await;
    assert!(h.trigger.is_subscribed());

    // A new window accepts events again
    h.client.status(StatusCategory::Timeout);
    settle().await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(
        h.trigger.error().as_deref(),
        Some("Connection to notification service timed out")
    );
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_after_burst_cancels_grace() {
    let h = subscribed_harness("chat-42", 7).await;
    let history = SubscriptionHistory::watch(h.trigger.watch_state());

    // Two drops in quick succession, as the client reports them
    h.client.status(StatusCategory::Disconnected);
    h.client.status(StatusCategory::NetworkIssues);
    advance(ms(300)).await;
    h.client.status(StatusCategory::Disconnected);
    h.client.status(StatusCategory::NetworkIssues);
    advance(ms(400)).await;
    h.client.status(StatusCategory::Reconnected);
    settle().await;

    advance(secs(9)).await;
    assert!(h.trigger.is_subscribed());
    assert_eq!(h.trigger.error(), None);
    assert_eq!(h.trigger.state().reconnect_attempts, 0);
    assert!(history.values().iter().all(|subscribed| *subscribed));
}

#[tokio::test(start_paused = true)]
async fn test_consecutive_errors_mark_subscription_lost() {
    let h = subscribed_harness("chat-42", 7).await;

    for i in 1..=5 {
        h.client.status(StatusCategory::NetworkIssues);
        settle().await;
        assert_eq!(h.trigger.is_subscribed(), i < 5, "after error {i}");
        advance(secs(3)).await;
    }
    assert_eq!(
        h.trigger.error().as_deref(),
        Some("Network issues detected. Retrying...")
    );

    h.client.status(StatusCategory::Reconnected);
    settle().await;
    assert!(h.trigger.is_subscribed());
    assert_eq!(h.trigger.error(), None);
}
