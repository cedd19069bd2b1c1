/// Integration tests driving the Quiz state machine through a full
/// round-robin across teams to a final ranking.
use partyhub_core::game::quiz;
use partyhub_core::{EventBus, GameContext, MemoryStore, RoomRegistry, Scheduler};

async fn ctx() -> GameContext {
    let store = MemoryStore::new();
    let bus = EventBus::new();
    let scheduler = Scheduler::new();
    let registry = RoomRegistry::new(store.clone());
    GameContext::new(store, bus, scheduler, registry)
}

#[tokio::test]
async fn initialize_requires_teams_assigned() {
    let ctx = ctx().await;
    let created = ctx.registry.create_room().await.unwrap();
    ctx.registry.join(&created.room_id, "a").await.unwrap();

    let err = quiz::initialize(&ctx, &created.room_id, "quiz-animals", None).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_state");

    ctx.registry.assign_random_teams(&created.room_id, 2).await.unwrap();
    quiz::initialize(&ctx, &created.room_id, "quiz-animals", None).await.unwrap();
}

#[tokio::test]
async fn full_round_robin_ends_with_a_ranking_and_ends_the_room() {
    let ctx = ctx().await;
    let created = ctx.registry.create_room().await.unwrap();
    for name in ["a", "b", "c", "d"] {
        ctx.registry.join(&created.room_id, name).await.unwrap();
    }
    ctx.registry.assign_random_teams(&created.room_id, 2).await.unwrap();
    ctx.registry
        .start_game(&created.room_id, partyhub_core::room::GameCode::Quiz)
        .await
        .unwrap();
    quiz::initialize(&ctx, &created.room_id, "quiz-animals", Some(5)).await.unwrap();

    // Two teams: play each team's round through to completion, then hand
    // off, until every team has played.
    for _ in 0..2 {
        quiz::start_round(&ctx, &created.room_id).await.unwrap();
        // Drain the whole word list via `correct` so the round ends on its own.
        loop {
            match quiz::correct(&ctx, &created.room_id).await {
                Ok(()) => {}
                Err(e) => panic!("unexpected error draining round: {e}"),
            }
            // start_round cannot be called mid-round; detect completion by
            // probing `pass`, which errors once the round has ended.
            if quiz::pass(&ctx, &created.room_id).await.is_err() {
                break;
            }
        }
        quiz::next_team(&ctx, &created.room_id).await.unwrap();
    }

    let info = ctx.registry.info(&created.room_id).await.unwrap().unwrap();
    assert_eq!(info.status, partyhub_core::room::RoomStatus::Ended);
}

#[tokio::test]
async fn pass_recycles_the_current_word_to_the_back_of_the_queue() {
    let ctx = ctx().await;
    let created = ctx.registry.create_room().await.unwrap();
    ctx.registry.join(&created.room_id, "a").await.unwrap();
    ctx.registry.join(&created.room_id, "b").await.unwrap();
    ctx.registry.assign_random_teams(&created.room_id, 2).await.unwrap();
    quiz::initialize(&ctx, &created.room_id, "quiz-animals", Some(5)).await.unwrap();
    quiz::start_round(&ctx, &created.room_id).await.unwrap();

    // pass() is a no-op error-free call that should never itself error on
    // the very first word, since the round just started with a full queue.
    quiz::pass(&ctx, &created.room_id).await.unwrap();
}

#[tokio::test]
async fn correct_outside_playing_phase_is_rejected() {
    let ctx = ctx().await;
    let created = ctx.registry.create_room().await.unwrap();
    ctx.registry.join(&created.room_id, "a").await.unwrap();
    ctx.registry.assign_random_teams(&created.room_id, 1).await.unwrap();
    quiz::initialize(&ctx, &created.room_id, "quiz-animals", None).await.unwrap();

    let err = quiz::correct(&ctx, &created.room_id).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_state");
}
