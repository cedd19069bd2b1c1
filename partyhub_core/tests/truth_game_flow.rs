/// Integration tests for the Truth (Interrogation) state machine: question
/// submission/selection, face-tracking accumulation, and round reset.
use partyhub_core::game::truth::{self, FaceTrackingSample};
use partyhub_core::{DeviceId, EventBus, GameContext, MemoryStore, RoomRegistry, Scheduler};

async fn ctx() -> GameContext {
    let store = MemoryStore::new();
    let bus = EventBus::new();
    let scheduler = Scheduler::new();
    let registry = RoomRegistry::new(store.clone());
    GameContext::new(store, bus, scheduler, registry)
}

fn calm_sample(t: u64) -> FaceTrackingSample {
    FaceTrackingSample {
        eye_blink_rate: 0.05,
        eye_movement: 0.01,
        facial_tremor: 0.01,
        nostril_movement: 0.01,
        stress_level: 0.1,
        micro_expression: None,
        timestamp: t,
    }
}

#[tokio::test]
async fn answerer_cannot_submit_or_vote_on_questions() {
    let ctx = ctx().await;
    let created = ctx.registry.create_room().await.unwrap();
    let alice = ctx.registry.join(&created.room_id, "alice").await.unwrap().device_id;
    let bob = ctx.registry.join(&created.room_id, "bob").await.unwrap().device_id;
    truth::initialize(&ctx, &created.room_id).await.unwrap();
    truth::select_answerer(&ctx, &created.room_id, Some(alice.clone())).await.unwrap();

    let err = truth::submit_question(&ctx, &created.room_id, &alice, "why?".to_string()).await.unwrap_err();
    assert_eq!(err.kind(), "unauthorized");

    truth::submit_question(&ctx, &created.room_id, &bob, "why?".to_string()).await.unwrap();
}

#[tokio::test]
async fn full_round_selects_a_question_and_scores_calm_samples_as_truthful() {
    let ctx = ctx().await;
    let created = ctx.registry.create_room().await.unwrap();
    let alice = ctx.registry.join(&created.room_id, "alice").await.unwrap().device_id;
    let bob = ctx.registry.join(&created.room_id, "bob").await.unwrap().device_id;
    truth::initialize(&ctx, &created.room_id).await.unwrap();
    truth::select_answerer(&ctx, &created.room_id, Some(alice.clone())).await.unwrap();
    truth::submit_question(&ctx, &created.room_id, &bob, "what's your secret?".to_string()).await.unwrap();
    truth::finish_question_submission(&ctx, &created.room_id).await.unwrap();

    let picked = truth::select_random_question(&ctx, &created.room_id).await.unwrap();
    assert_eq!(picked.text, "what's your secret?");
    truth::confirm_question(&ctx, &created.room_id, &picked.text).await.unwrap();

    for t in 0..10u64 {
        truth::submit_face_sample(&ctx, &created.room_id, &alice, calm_sample(t)).await.unwrap();
    }
    let analysis = truth::finish_answering(&ctx, &created.room_id).await.unwrap();
    assert!(!analysis.is_lie);
    assert!(analysis.confidence < 7);

    truth::start_next_round(&ctx, &created.room_id).await.unwrap();
    // Round 2 starts back at SelectAnswerer, so the answerer must be chosen
    // again before anything else is valid.
    let err = truth::submit_question(&ctx, &created.room_id, &bob, "again?".to_string()).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_state");
}

#[tokio::test]
async fn finishing_submission_with_no_questions_is_rejected() {
    let ctx = ctx().await;
    let created = ctx.registry.create_room().await.unwrap();
    let alice: DeviceId = ctx.registry.join(&created.room_id, "alice").await.unwrap().device_id;
    truth::initialize(&ctx, &created.room_id).await.unwrap();
    truth::select_answerer(&ctx, &created.room_id, Some(alice)).await.unwrap();

    let err = truth::finish_question_submission(&ctx, &created.room_id).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_state");
}

#[tokio::test]
async fn end_game_marks_the_room_ended() {
    let ctx = ctx().await;
    let created = ctx.registry.create_room().await.unwrap();
    ctx.registry.join(&created.room_id, "alice").await.unwrap();
    ctx.registry
        .start_game(&created.room_id, partyhub_core::room::GameCode::Truth)
        .await
        .unwrap();
    truth::initialize(&ctx, &created.room_id).await.unwrap();
    truth::end_game(&ctx, &created.room_id).await.unwrap();

    let info = ctx.registry.info(&created.room_id).await.unwrap().unwrap();
    assert_eq!(info.status, partyhub_core::room::RoomStatus::Ended);
}
