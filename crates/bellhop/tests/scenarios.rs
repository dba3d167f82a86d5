//! End-to-end scenarios over an in-memory coordinator.

mod common;

use bellhop::{ActionError, FnAction, Host, HostConfig, IoError, SearchOptions};
use common::Coordinator;
use serde_json::{json, Value};
use tokio::sync::mpsc;

fn host_with(action_name: &str, action: impl bellhop::Action + 'static) -> Host {
    let mut host = Host::new(HostConfig::new("test-key"));
    host.register_action(action_name, action);
    host
}

#[tokio::test]
async fn single_input_resolves_and_completes() {
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let host = host_with(
        "ask_age",
        FnAction::new(move |io, _ctx| {
            let seen_tx = seen_tx.clone();
            async move {
                let age = io.input.number("age").await?;
                let _ = seen_tx.send(age);
                Ok(json!(age))
            }
        }),
    );

    let (handle, mut coordinator) = Coordinator::start(&host).await;
    coordinator.start_transaction("tx1", "ask_age").await;

    let (transaction_id, render) = coordinator.next_io_call().await;
    assert_eq!(transaction_id, "tx1");
    assert_eq!(render.to_render.len(), 1);
    assert_eq!(render.to_render[0].method_name, "INPUT_NUMBER");
    assert_eq!(render.to_render[0].label, "age");

    coordinator
        .respond_io(
            "tx1",
            &common::return_packet(render.input_group_key, vec![json!(42)]),
        )
        .await;

    // Exactly one render, then completion.
    assert_eq!(coordinator.expect_complete().await, "tx1");
    assert_eq!(seen_rx.recv().await.unwrap(), 42.0);
    handle.shutdown();
}

#[tokio::test]
async fn validation_retry_keeps_the_group_key_and_surfaces_the_message() {
    let host = host_with(
        "ask_name",
        FnAction::new(|io, _ctx| async move {
            let name = io
                .input
                .text("name")
                .validate(|value: &String| (value.len() < 2).then(|| "too short".to_string()))
                .await?;
            Ok(json!(name))
        }),
    );

    let (handle, mut coordinator) = Coordinator::start(&host).await;
    coordinator.start_transaction("tx2", "ask_name").await;

    let (_, first) = coordinator.next_io_call().await;
    assert!(first.validation_error_message.is_none());
    coordinator
        .respond_io(
            "tx2",
            &common::return_packet(first.input_group_key, vec![json!("")]),
        )
        .await;

    let (_, retry) = coordinator.next_io_call().await;
    assert_eq!(retry.input_group_key, first.input_group_key);
    assert_eq!(retry.validation_error_message.as_deref(), Some("too short"));

    coordinator
        .respond_io(
            "tx2",
            &common::return_packet(retry.input_group_key, vec![json!("ok")]),
        )
        .await;
    assert_eq!(coordinator.expect_complete().await, "tx2");
    handle.shutdown();
}

#[tokio::test]
async fn group_of_two_preserves_order() {
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let host = host_with(
        "pair",
        FnAction::new(move |io, _ctx| {
            let seen_tx = seen_tx.clone();
            async move {
                let group = io.group((io.input.text("a"), io.input.number("b")))?;
                let (a, b) = group.await?;
                let _ = seen_tx.send((a, b));
                Ok(Value::Null)
            }
        }),
    );

    let (handle, mut coordinator) = Coordinator::start(&host).await;
    coordinator.start_transaction("tx3", "pair").await;

    let (_, render) = coordinator.next_io_call().await;
    let methods: Vec<&str> = render
        .to_render
        .iter()
        .map(|c| c.method_name.as_str())
        .collect();
    assert_eq!(methods, vec!["INPUT_TEXT", "INPUT_NUMBER"]);

    coordinator
        .respond_io(
            "tx3",
            &common::return_packet(render.input_group_key, vec![json!("x"), json!(7)]),
        )
        .await;

    assert_eq!(coordinator.expect_complete().await, "tx3");
    let (a, b) = seen_rx.recv().await.unwrap();
    assert_eq!(a, "x");
    assert_eq!(b, 7.0);
    handle.shutdown();
}

#[tokio::test]
async fn set_state_reshapes_props_and_re_renders_under_the_same_key() {
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let host = host_with(
        "find_user",
        FnAction::new(move |io, _ctx| {
            let seen_tx = seen_tx.clone();
            async move {
                let chosen = io
                    .search(
                        "users",
                        SearchOptions::new(|query| async move {
                            Ok(vec![json!({"id": format!("u-{query}")})])
                        }),
                    )
                    .await?;
                let _ = seen_tx.send(chosen);
                Ok(Value::Null)
            }
        }),
    );

    let (handle, mut coordinator) = Coordinator::start(&host).await;
    coordinator.start_transaction("tx4", "find_user").await;

    let (_, first) = coordinator.next_io_call().await;
    assert_eq!(first.to_render[0].method_name, "SEARCH");
    assert_eq!(first.to_render[0].props, json!({"results": []}));

    coordinator
        .respond_io(
            "tx4",
            &common::set_state_packet(first.input_group_key, vec![json!("abc")]),
        )
        .await;

    let (_, refreshed) = coordinator.next_io_call().await;
    assert_eq!(refreshed.input_group_key, first.input_group_key);
    assert_eq!(
        refreshed.to_render[0].props,
        json!({"results": [{"id": "u-abc"}]})
    );

    coordinator
        .respond_io(
            "tx4",
            &common::return_packet(refreshed.input_group_key, vec![json!({"id": "u1"})]),
        )
        .await;

    assert_eq!(coordinator.expect_complete().await, "tx4");
    assert_eq!(seen_rx.recv().await.unwrap(), json!({"id": "u1"}));
    handle.shutdown();
}

#[tokio::test]
async fn cancel_rejects_current_and_future_io_without_completing() {
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let host = host_with(
        "doomed",
        FnAction::new(move |io, _ctx| {
            let seen_tx = seen_tx.clone();
            async move {
                let first = io.input.text("a").await;
                let _ = seen_tx.send(matches!(first, Err(IoError::Canceled)));
                let second = io.input.text("b").await;
                let _ = seen_tx.send(matches!(second, Err(IoError::TransactionClosed)));
                Err(ActionError::failed("operator canceled"))
            }
        }),
    );

    let (handle, mut coordinator) = Coordinator::start(&host).await;
    coordinator.start_transaction("tx5", "doomed").await;

    let (_, render) = coordinator.next_io_call().await;
    coordinator
        .respond_io("tx5", &common::canceled_packet(render.input_group_key))
        .await;

    assert!(seen_rx.recv().await.unwrap(), "first await must cancel");
    assert!(seen_rx.recv().await.unwrap(), "second await must be closed");
    // No further render and no MARK_TRANSACTION_COMPLETE.
    coordinator.assert_quiet().await;
    handle.shutdown();
}

#[tokio::test]
async fn exclusive_in_group_fails_before_any_render() {
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    let host = host_with(
        "bad_group",
        FnAction::new(move |io, _ctx| {
            let seen_tx = seen_tx.clone();
            async move {
                let result = io.group((io.input.text("a"), io.confirm("sure?")));
                let _ = seen_tx.send(matches!(
                    result,
                    Err(IoError::GroupContainsExclusive)
                ));
                Ok(Value::Null)
            }
        }),
    );

    let (handle, mut coordinator) = Coordinator::start(&host).await;
    coordinator.start_transaction("tx6", "bad_group").await;

    // The very next request is the completion: no SEND_IO_CALL happened.
    assert_eq!(coordinator.expect_complete().await, "tx6");
    assert!(seen_rx.recv().await.unwrap());
    handle.shutdown();
}

#[tokio::test]
async fn loading_updates_travel_beside_the_render() {
    let host = host_with(
        "bulk",
        FnAction::new(|io, ctx| async move {
            ctx.loading
                .start(bellhop::LoadingOptions::title("Crunching").with_items_in_queue(2))
                .await;
            ctx.loading.complete_one().await;
            let note = io.input.text("note").await?;
            Ok(json!(note))
        }),
    );

    let (handle, mut coordinator) = Coordinator::start(&host).await;
    coordinator.start_transaction("tx8", "bulk").await;

    let (call_id, method, inputs) = coordinator.next_request().await;
    assert_eq!(method, "SEND_LOADING_CALL");
    assert_eq!(inputs["loadingState"]["itemsInQueue"], 2);
    assert_eq!(inputs["loadingState"]["itemsCompleted"], 0);
    coordinator.reply(call_id, Value::Null).await;

    let (call_id, method, inputs) = coordinator.next_request().await;
    assert_eq!(method, "SEND_LOADING_CALL");
    assert_eq!(inputs["loadingState"]["itemsCompleted"], 1);
    coordinator.reply(call_id, Value::Null).await;

    let (_, render) = coordinator.next_io_call().await;
    coordinator
        .respond_io(
            "tx8",
            &common::return_packet(render.input_group_key, vec![json!("done")]),
        )
        .await;
    assert_eq!(coordinator.expect_complete().await, "tx8");
    handle.shutdown();
}

#[tokio::test]
async fn stale_response_for_finished_batch_is_dropped() {
    let host = host_with(
        "two_steps",
        FnAction::new(|io, _ctx| async move {
            let first = io.input.text("first").await?;
            let second = io.input.text("second").await?;
            Ok(json!([first, second]))
        }),
    );

    let (handle, mut coordinator) = Coordinator::start(&host).await;
    coordinator.start_transaction("tx7", "two_steps").await;

    let (_, first) = coordinator.next_io_call().await;
    coordinator
        .respond_io(
            "tx7",
            &common::return_packet(first.input_group_key, vec![json!("one")]),
        )
        .await;

    let (_, second) = coordinator.next_io_call().await;
    assert_ne!(second.input_group_key, first.input_group_key);

    // A late duplicate for the finished batch must not resolve the new one.
    coordinator
        .respond_io(
            "tx7",
            &common::return_packet(first.input_group_key, vec![json!("dup")]),
        )
        .await;
    coordinator
        .respond_io(
            "tx7",
            &common::return_packet(second.input_group_key, vec![json!("two")]),
        )
        .await;

    assert_eq!(coordinator.expect_complete().await, "tx7");
    handle.shutdown();
}
