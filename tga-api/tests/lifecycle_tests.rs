//! Lifecycle manager integration tests
//!
//! Drive the manager directly against a temporary database.

mod helpers;

use chrono::Utc;
use helpers::*;
use tga_api::services::{Actor, ListParams};
use tga_api::ApiError;
use tga_common::db::RequestStatus;

fn moderator(id: i64) -> Actor {
    Actor {
        user_id: id,
        is_moderator: true,
    }
}

async fn draft_count(app: &TestApp, creator_id: i64) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM analysis_requests WHERE creator_id = ? AND status = 'draft'",
    )
    .bind(creator_id)
    .fetch_one(&app.pool)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_concurrent_get_or_create_yields_one_draft() {
    let app = create_test_app().await;
    let (alice, _) = create_user(&app, "alice", false).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let lifecycle = app.state.lifecycle.clone();
        handles.push(tokio::spawn(async move {
            lifecycle.get_or_create_draft(alice).await.unwrap().id
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1, "every caller must get the same draft");
    assert_eq!(draft_count(&app, alice).await, 1);
}

#[tokio::test]
async fn test_draft_icon_never_creates_draft() {
    let app = create_test_app().await;
    let (alice, _) = create_user(&app, "alice", false).await;

    let icon = app.state.lifecycle.draft_icon(Some(alice)).await.unwrap();
    assert_eq!(icon.analysis_request_id, 0);
    assert_eq!(icon.genres_in_request_count, 0);
    assert_eq!(draft_count(&app, alice).await, 0);

    let guest = app.state.lifecycle.draft_icon(None).await.unwrap();
    assert_eq!(guest.analysis_request_id, 0);

    let draft = app.state.lifecycle.attach_genre(alice, GENRE_CHRONICLE).await.unwrap();
    let icon = app.state.lifecycle.draft_icon(Some(alice)).await.unwrap();
    assert_eq!(icon.analysis_request_id, draft.id);
    assert_eq!(icon.genres_in_request_count, 1);
}

#[tokio::test]
async fn test_form_checks_text_before_genres() {
    let app = create_test_app().await;
    let (alice, _) = create_user(&app, "alice", false).await;
    let lifecycle = &app.state.lifecycle;
    let draft = lifecycle.get_or_create_draft(alice).await.unwrap();

    // No text and no genres: the text complaint comes first
    let err = lifecycle.form(creator(alice), draft.id).await.unwrap_err();
    match err {
        ApiError::ValidationFailed(msg) => assert!(msg.contains("text"), "got: {}", msg),
        other => panic!("expected ValidationFailed, got {:?}", other),
    }

    lifecycle.edit(creator(alice), draft.id, "Кот смотрит в окно").await.unwrap();
    let err = lifecycle.form(creator(alice), draft.id).await.unwrap_err();
    match err {
        ApiError::ValidationFailed(msg) => assert!(msg.contains("genre"), "got: {}", msg),
        other => panic!("expected ValidationFailed, got {:?}", other),
    }
    assert_eq!(request_status(&app.pool, draft.id).await, "draft");

    lifecycle.attach_genre(alice, GENRE_CHRONICLE).await.unwrap();
    let formed = lifecycle.form(creator(alice), draft.id).await.unwrap();
    assert_eq!(formed.status(), RequestStatus::Formed);
    assert!(formed.lifecycle.formed_at().is_some());
    assert!(formed.lifecycle.moderator_id().is_none());

    // Forming twice is a state error, not a validation error
    let err = lifecycle.form(creator(alice), draft.id).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidState(_)));
}

#[tokio::test]
async fn test_formed_draft_frees_slot_for_new_draft() {
    let app = create_test_app().await;
    let (alice, _) = create_user(&app, "alice", false).await;

    let formed = formed_request(&app, alice, "Первый текст", &[GENRE_CHRONICLE]).await;
    let next = app.state.lifecycle.get_or_create_draft(alice).await.unwrap();
    assert_ne!(next.id, formed);
    assert_eq!(next.status(), RequestStatus::Draft);
}

#[tokio::test]
async fn test_duplicate_attach_conflicts_without_partial_state() {
    let app = create_test_app().await;
    let (alice, _) = create_user(&app, "alice", false).await;
    let lifecycle = &app.state.lifecycle;

    let draft = lifecycle.attach_genre(alice, GENRE_TREATY).await.unwrap();
    let err = lifecycle.attach_genre(alice, GENRE_TREATY).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    assert_eq!(probabilities(&app.pool, draft.id).await, vec![(GENRE_TREATY, 0)]);
    assert_eq!(draft_count(&app, alice).await, 1);
}

#[tokio::test]
async fn test_attach_unknown_or_deleted_genre_is_not_found() {
    let app = create_test_app().await;
    let (alice, _) = create_user(&app, "alice", false).await;

    let err = app.state.lifecycle.attach_genre(alice, 999).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    tga_api::db::genres::soft_delete(&app.pool, GENRE_CHRONICLE).await.unwrap();
    let err = app.state.lifecycle.attach_genre(alice, GENRE_CHRONICLE).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    assert_eq!(draft_count(&app, alice).await, 0);
}

#[tokio::test]
async fn test_update_and_detach_attachment() {
    let app = create_test_app().await;
    let (alice, _) = create_user(&app, "alice", false).await;
    let lifecycle = &app.state.lifecycle;

    let draft = lifecycle.attach_genre(alice, GENRE_CHRONICLE).await.unwrap();
    lifecycle.attach_genre(alice, GENRE_HAGIOGRAPHY).await.unwrap();

    lifecycle
        .update_attachment(alice, GENRE_CHRONICLE, Some("похоже"), Some(30))
        .await
        .unwrap();
    let err = lifecycle
        .update_attachment(alice, GENRE_CHRONICLE, None, Some(101))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::ValidationFailed(_)));

    lifecycle.detach_genre(alice, GENRE_HAGIOGRAPHY).await.unwrap();
    let err = lifecycle.detach_genre(alice, GENRE_HAGIOGRAPHY).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    let view = lifecycle.get(creator(alice), draft.id).await.unwrap();
    assert_eq!(view.genres.len(), 1);
    assert_eq!(view.genres[0].comment, "похоже");
    assert_eq!(view.genres[0].probability_percent, 30);
    assert_eq!(view.genres_completed_count, 1);
}

#[tokio::test]
async fn test_attachments_frozen_after_form() {
    let app = create_test_app().await;
    let (alice, _) = create_user(&app, "alice", false).await;
    let id = formed_request(&app, alice, "Текст", &[GENRE_CHRONICLE]).await;

    // Attaching now goes to a brand new draft
    let next = app.state.lifecycle.attach_genre(alice, GENRE_TREATY).await.unwrap();
    assert_ne!(next.id, id);
    assert_eq!(probabilities(&app.pool, id).await, vec![(GENRE_CHRONICLE, 0)]);

    let err = app
        .state
        .lifecycle
        .edit(creator(alice), id, "Другой текст")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::InvalidState(_)));
}

#[tokio::test]
async fn test_moderation_outside_formed_has_no_side_effect() {
    let app = create_test_app().await;
    let (alice, _) = create_user(&app, "alice", false).await;
    let (moder, _) = create_user(&app, "moder", true).await;

    let draft = app.state.lifecycle.attach_genre(alice, GENRE_CHRONICLE).await.unwrap();

    let err = app.state.gateway.dispatch(moder, draft.id).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidState(_)));
    let err = app.state.lifecycle.reject(moder, draft.id).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidState(_)));

    assert_eq!(request_status(&app.pool, draft.id).await, "draft");
    let dispatches: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM classification_dispatches")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(dispatches, 0);
    assert!(app.classifier.submitted().is_empty());
}

#[tokio::test]
async fn test_reject_records_moderator_and_is_terminal() {
    let app = create_test_app().await;
    let (alice, _) = create_user(&app, "alice", false).await;
    let (moder, _) = create_user(&app, "moder", true).await;
    let id = formed_request(&app, alice, "Текст", &[GENRE_CHRONICLE]).await;

    let rejected = app.state.lifecycle.reject(moder, id).await.unwrap();
    assert_eq!(rejected.status(), RequestStatus::Rejected);
    assert_eq!(rejected.lifecycle.moderator_id(), Some(moder));
    assert!(rejected.lifecycle.completed_at().is_some());

    let err = app.state.lifecycle.delete(creator(alice), id).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidState(_)));
    let err = app.state.lifecycle.reject(moder, id).await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidState(_)));
}

#[tokio::test]
async fn test_visibility_rules() {
    let app = create_test_app().await;
    let (alice, _) = create_user(&app, "alice", false).await;
    let (bob, _) = create_user(&app, "bob", false).await;
    let (moder, _) = create_user(&app, "moder", true).await;
    let lifecycle = &app.state.lifecycle;

    let draft = lifecycle.attach_genre(alice, GENRE_CHRONICLE).await.unwrap();
    let err = lifecycle.get(creator(bob), draft.id).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
    let err = lifecycle.get(moderator(moder), draft.id).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));

    lifecycle.edit(creator(alice), draft.id, "Текст").await.unwrap();
    lifecycle.form(creator(alice), draft.id).await.unwrap();
    let view = lifecycle.get(moderator(moder), draft.id).await.unwrap();
    assert_eq!(view.creator_login, "alice");
    assert_eq!(view.status, RequestStatus::Formed);

    let err = lifecycle.delete(creator(bob), draft.id).await.unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
}

#[tokio::test]
async fn test_deleted_request_disappears() {
    let app = create_test_app().await;
    let (alice, _) = create_user(&app, "alice", false).await;
    let lifecycle = &app.state.lifecycle;
    let draft = lifecycle.attach_genre(alice, GENRE_CHRONICLE).await.unwrap();

    lifecycle.delete(creator(alice), draft.id).await.unwrap();
    assert_eq!(request_status(&app.pool, draft.id).await, "deleted");

    let err = lifecycle.get(creator(alice), draft.id).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    let list = lifecycle.list(creator(alice), &ListParams::default()).await.unwrap();
    assert!(list.is_empty());

    // The one-draft slot is free again
    let next = lifecycle.get_or_create_draft(alice).await.unwrap();
    assert_ne!(next.id, draft.id);
}

#[tokio::test]
async fn test_list_scoping_and_filters() {
    let app = create_test_app().await;
    let (alice, _) = create_user(&app, "alice", false).await;
    let (bob, _) = create_user(&app, "bob", false).await;
    let (moder, _) = create_user(&app, "moder", true).await;
    let lifecycle = &app.state.lifecycle;

    let alice_formed = formed_request(&app, alice, "Текст Алисы", &[GENRE_CHRONICLE]).await;
    let bob_formed = formed_request(&app, bob, "Текст Боба", &[GENRE_TREATY]).await;
    let bob_draft = lifecycle.attach_genre(bob, GENRE_CHRONICLE).await.unwrap().id;
    lifecycle.reject(moder, bob_formed).await.unwrap();

    let ids = |views: Vec<tga_api::models::RequestView>| {
        let mut ids: Vec<i64> = views.into_iter().map(|v| v.id).collect();
        ids.sort();
        ids
    };

    // A creator only sees their own, even when asking for someone else's
    let params = ListParams {
        creator_id: Some(alice),
        ..ListParams::default()
    };
    let mut expected = vec![bob_formed, bob_draft];
    expected.sort();
    assert_eq!(ids(lifecycle.list(creator(bob), &params).await.unwrap()), expected);

    // A moderator sees other users' requests but not their drafts
    let all = ids(lifecycle.list(moderator(moder), &ListParams::default()).await.unwrap());
    assert_eq!(all, vec![alice_formed, bob_formed]);

    let formed_only = ListParams {
        status: Some("formed".to_string()),
        ..ListParams::default()
    };
    assert_eq!(
        ids(lifecycle.list(moderator(moder), &formed_only).await.unwrap()),
        vec![alice_formed]
    );

    let by_creator = ListParams {
        creator_id: Some(bob),
        ..ListParams::default()
    };
    assert_eq!(
        ids(lifecycle.list(moderator(moder), &by_creator).await.unwrap()),
        vec![bob_formed]
    );

    // end_date covers the whole day
    let today = Utc::now().date_naive().format("%Y-%m-%d").to_string();
    let today_only = ListParams {
        start_date: Some(today.clone()),
        end_date: Some(today),
        ..ListParams::default()
    };
    assert_eq!(
        ids(lifecycle.list(moderator(moder), &today_only).await.unwrap()),
        vec![alice_formed, bob_formed]
    );

    let bad = ListParams {
        status: Some("bogus".to_string()),
        ..ListParams::default()
    };
    assert!(matches!(
        lifecycle.list(moderator(moder), &bad).await.unwrap_err(),
        ApiError::ValidationFailed(_)
    ));
}
