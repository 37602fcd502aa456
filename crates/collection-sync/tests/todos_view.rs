use auth_bridge::{
    AuthContext, MemorySessionProvider, NullAuditSink, ProviderConfig, RecordingNavigator,
    Session, User,
};
use collection_sync::{
    ChangeKind, ChangePayload, MemoryRowStore, RowId, StoreError, SubmitOutcome, Todo, TodosView,
    WriteRecord,
};
use serde_json::json;
use std::sync::Arc;

fn signed_in_auth(user_id: &str) -> Arc<AuthContext> {
    let session = Session {
        access_token: "token".into(),
        refresh_token: "refresh".into(),
        expires_in: Some(3600),
        expires_at: None,
        token_type: "bearer".into(),
        user: User::new(user_id),
    };
    auth_with(MemorySessionProvider::with_session(session))
}

fn auth_with(provider: MemorySessionProvider) -> Arc<AuthContext> {
    Arc::new(AuthContext::init(
        Arc::new(provider),
        Arc::new(NullAuditSink),
        Arc::new(RecordingNavigator::new()),
        ProviderConfig::new("github"),
    ))
}

fn todo(id: i64, text: &str, done: bool) -> Todo {
    Todo {
        id: RowId::from(id),
        text: text.to_string(),
        is_completed: done,
    }
}

#[tokio::test]
async fn seed_is_loaded_in_creation_order() {
    let store = Arc::new(MemoryRowStore::new());
    store.preload(
        "todos",
        vec![
            json!({ "id": 1, "text": "a", "isCompleted": false, "created_at": "2024-01-01T00:00:01Z" }),
            json!({ "id": 2, "text": "b", "isCompleted": false, "created_at": "2024-01-01T00:00:02Z" }),
        ],
    );

    let view = TodosView::load(store.clone(), signed_in_auth("u-1"))
        .await
        .unwrap();
    assert_eq!(view.todos(), vec![todo(1, "a", false), todo(2, "b", false)]);
}

#[tokio::test]
async fn submit_writes_then_event_appends() {
    let store = Arc::new(MemoryRowStore::new());
    let view = TodosView::mount(store.clone(), signed_in_auth("u-1"), vec![]).unwrap();

    view.set_draft("buy milk");
    assert_eq!(view.submit().await, SubmitOutcome::Sent);

    // Write acknowledged: draft cleared, collection untouched.
    assert_eq!(view.draft(), "");
    assert!(view.todos().is_empty());
    assert_eq!(
        store.writes(),
        vec![WriteRecord::Insert {
            table: "todos".into(),
            fields: json!({ "user_id": "u-1", "text": "buy milk" }),
        }]
    );

    // Event delivered: row appended.
    assert_eq!(store.deliver_pending(), 1);
    let todos = view.todos();
    assert_eq!(todos.len(), 1);
    assert_eq!(todos[0].text, "buy milk");
}

#[tokio::test]
async fn blank_submission_writes_nothing() {
    let store = Arc::new(MemoryRowStore::new());
    let view = TodosView::mount(store.clone(), signed_in_auth("u-1"), vec![todo(1, "a", false)])
        .unwrap();

    view.set_draft("   ");
    assert_eq!(view.submit().await, SubmitOutcome::Blank);
    assert!(store.writes().is_empty());
    assert_eq!(view.todos(), vec![todo(1, "a", false)]);
}

#[tokio::test]
async fn failed_submission_keeps_draft_and_records_error() {
    let store = Arc::new(MemoryRowStore::new());
    let view = TodosView::mount(store.clone(), signed_in_auth("u-1"), vec![]).unwrap();
    store.fail_next_write(StoreError::Rejected {
        table: "todos".into(),
        status: 403,
        message: "row-level security".into(),
    });

    view.set_draft("buy milk");
    assert_eq!(view.submit().await, SubmitOutcome::Failed);
    assert_eq!(view.draft(), "buy milk");
    assert!(view.last_error().unwrap().contains("row-level security"));
    assert_eq!(store.pending_len(), 0);
}

#[tokio::test]
async fn submission_without_identity_keeps_draft() {
    let store = Arc::new(MemoryRowStore::new());
    let view = TodosView::mount(store.clone(), auth_with(MemorySessionProvider::new()), vec![])
        .unwrap();

    view.set_draft("buy milk");
    assert_eq!(view.submit().await, SubmitOutcome::NoIdentity);
    assert_eq!(view.draft(), "buy milk");
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn toggle_and_delete_only_change_the_collection_through_events() {
    let store = Arc::new(MemoryRowStore::new());
    store.preload(
        "todos",
        vec![
            json!({ "id": 5, "text": "a", "isCompleted": false }),
            json!({ "id": 6, "text": "b", "isCompleted": false }),
        ],
    );
    let view = TodosView::load(store.clone(), signed_in_auth("u-1"))
        .await
        .unwrap();

    view.toggle(&RowId::new("5"), true).await;
    assert_eq!(view.todos()[0], todo(5, "a", false));
    store.deliver_pending();
    assert_eq!(view.todos()[0], todo(5, "a", true));

    view.delete(&RowId::new("5")).await;
    assert_eq!(view.todos().len(), 2);
    store.deliver_pending();
    assert_eq!(view.todos(), vec![todo(6, "b", false)]);
}

#[tokio::test]
async fn rejected_toggle_and_delete_leave_the_collection_alone() {
    let store = Arc::new(MemoryRowStore::new());
    store.preload("todos", vec![json!({ "id": 5, "text": "a", "isCompleted": false })]);
    let view = TodosView::load(store.clone(), signed_in_auth("u-1"))
        .await
        .unwrap();

    store.fail_next_write(StoreError::Transport("offline".into()));
    view.toggle(&RowId::new("5"), true).await;
    assert!(view.last_error().unwrap().contains("offline"));
    assert_eq!(store.pending_len(), 0);
    store.deliver_pending();
    assert_eq!(view.todos(), vec![todo(5, "a", false)]);

    store.fail_next_write(StoreError::Rejected {
        table: "todos".into(),
        status: 403,
        message: "row-level security".into(),
    });
    view.delete(&RowId::new("5")).await;
    assert!(view.last_error().unwrap().contains("row-level security"));
    assert_eq!(store.pending_len(), 0);
    store.deliver_pending();
    assert_eq!(view.todos(), vec![todo(5, "a", false)]);
    assert!(store.writes().is_empty());
}

#[tokio::test]
async fn partial_update_events_merge_present_fields() {
    let store = Arc::new(MemoryRowStore::new());
    let view = TodosView::mount(store.clone(), signed_in_auth("u-1"), vec![todo(5, "a", false)])
        .unwrap();

    store.push_event(ChangePayload::update("todos", json!({ "id": 5, "isCompleted": true })));
    store.push_event(ChangePayload::update("todos", json!({ "id": 9, "isCompleted": true })));
    store.deliver_pending();

    assert_eq!(view.todos(), vec![todo(5, "a", true)]);
}

#[tokio::test]
async fn reordered_delete_before_update_leaves_row_absent() {
    let store = Arc::new(MemoryRowStore::new());
    let view = TodosView::mount(store.clone(), signed_in_auth("u-1"), vec![todo(5, "a", false)])
        .unwrap();

    store.push_event(ChangePayload::delete("todos", json!({ "id": 5 })));
    store.push_event(ChangePayload::update("todos", json!({ "id": 5, "isCompleted": true })));
    store.deliver_pending();

    assert!(view.todos().is_empty());
}

#[tokio::test]
async fn unmount_releases_each_subscription_once() {
    let store = Arc::new(MemoryRowStore::new());
    let view = TodosView::mount(store.clone(), signed_in_auth("u-1"), vec![]).unwrap();
    for kind in ChangeKind::ALL {
        assert_eq!(store.listener_count("todos", kind), 1);
    }

    assert_eq!(view.unmount(), 3);
    assert_eq!(store.total_listeners(), 0);
    assert_eq!(view.unmount(), 0);

    store.push_event(ChangePayload::insert("todos", json!({ "id": 1, "text": "late" })));
    store.deliver_pending();
    assert!(view.todos().is_empty());
}

#[tokio::test]
async fn failed_activation_releases_acquired_subscriptions() {
    let store = Arc::new(MemoryRowStore::new());
    store.refuse_subscription("todos", ChangeKind::Delete);

    let result = TodosView::mount(store.clone(), signed_in_auth("u-1"), vec![]);
    assert!(matches!(result, Err(StoreError::Subscribe { .. })));
    assert_eq!(store.total_listeners(), 0);
}
