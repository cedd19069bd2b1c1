/// Integration tests driving the Liar state machine from role reveal
/// through a pointing round and the liar's final guess.
use partyhub_core::game::liar::{self, Winner};
use partyhub_core::{DeviceId, EventBus, GameContext, MemoryStore, RoomRegistry, Scheduler};

async fn ctx() -> GameContext {
    let store = MemoryStore::new();
    let bus = EventBus::new();
    let scheduler = Scheduler::new();
    let registry = RoomRegistry::new(store.clone());
    GameContext::new(store, bus, scheduler, registry)
}

async fn find_liar(ctx: &GameContext, room_id: &partyhub_core::RoomId, devices: &[DeviceId]) -> (DeviceId, Vec<DeviceId>) {
    let mut liar = None;
    let mut civilians = Vec::new();
    for device in devices {
        let view = liar::player_role(ctx, room_id, device).await.unwrap();
        if view.is_liar {
            liar = Some(device.clone());
        } else {
            civilians.push(device.clone());
        }
    }
    (liar.expect("exactly one liar"), civilians)
}

#[tokio::test]
async fn requires_at_least_three_players() {
    let ctx = ctx().await;
    let created = ctx.registry.create_room().await.unwrap();
    ctx.registry.join(&created.room_id, "a").await.unwrap();
    ctx.registry.join(&created.room_id, "b").await.unwrap();

    let err = liar::initialize(&ctx, &created.room_id, "liar-general").await.unwrap_err();
    assert_eq!(err.kind(), "invalid_state");
}

#[tokio::test]
async fn pointing_the_liar_and_guessing_right_gives_the_liar_the_win() {
    let ctx = ctx().await;
    let created = ctx.registry.create_room().await.unwrap();
    let mut devices = Vec::new();
    for name in ["a", "b", "c"] {
        devices.push(ctx.registry.join(&created.room_id, name).await.unwrap().device_id);
    }
    liar::initialize(&ctx, &created.room_id, "liar-general").await.unwrap();

    let (liar_device, civilians) = find_liar(&ctx, &created.room_id, &devices).await;
    let keyword = liar::player_role(&ctx, &created.room_id, &civilians[0]).await.unwrap().keyword.unwrap();

    liar::on_phase_complete(&ctx, &created.room_id).await.unwrap(); // RoleReveal -> Explanation (turn 0)
    for _ in 0..devices.len() {
        liar::on_phase_complete(&ctx, &created.room_id).await.unwrap(); // advance explainer, then -> VoteMoreRound
    }
    liar::vote_more_round(&ctx, &created.room_id, &civilians[0], false).await.unwrap();
    liar::vote_more_round(&ctx, &created.room_id, &civilians[1], false).await.unwrap();
    liar::on_phase_complete(&ctx, &created.room_id).await.unwrap(); // VoteMoreRound -> Pointing

    liar::start_pointing_vote(&ctx, &created.room_id).await.unwrap();
    liar::vote_pointing(&ctx, &created.room_id, &civilians[0], &liar_device).await.unwrap();
    liar::vote_pointing(&ctx, &created.room_id, &civilians[1], &liar_device).await.unwrap();
    liar::on_phase_complete(&ctx, &created.room_id).await.unwrap(); // PointingVote -> PointingResult (liar caught)
    liar::on_phase_complete(&ctx, &created.room_id).await.unwrap(); // PointingResult -> LiarGuess

    liar::submit_guess(&ctx, &created.room_id, &liar_device, Some(keyword.to_uppercase())).await.unwrap();

    let info = ctx.registry.info(&created.room_id).await.unwrap().unwrap();
    assert_eq!(info.status, partyhub_core::room::RoomStatus::Ended);
}

#[tokio::test]
async fn only_the_liar_may_submit_a_guess() {
    let ctx = ctx().await;
    let created = ctx.registry.create_room().await.unwrap();
    let mut devices = Vec::new();
    for name in ["a", "b", "c"] {
        devices.push(ctx.registry.join(&created.room_id, name).await.unwrap().device_id);
    }
    liar::initialize(&ctx, &created.room_id, "liar-general").await.unwrap();
    let (liar_device, civilians) = find_liar(&ctx, &created.room_id, &devices).await;

    liar::on_phase_complete(&ctx, &created.room_id).await.unwrap();
    for _ in 0..devices.len() {
        liar::on_phase_complete(&ctx, &created.room_id).await.unwrap();
    }
    liar::vote_more_round(&ctx, &created.room_id, &civilians[0], false).await.unwrap();
    liar::vote_more_round(&ctx, &created.room_id, &civilians[1], false).await.unwrap();
    liar::on_phase_complete(&ctx, &created.room_id).await.unwrap();
    liar::start_pointing_vote(&ctx, &created.room_id).await.unwrap();
    liar::vote_pointing(&ctx, &created.room_id, &civilians[0], &liar_device).await.unwrap();
    liar::vote_pointing(&ctx, &created.room_id, &civilians[1], &liar_device).await.unwrap();
    liar::on_phase_complete(&ctx, &created.room_id).await.unwrap();
    liar::on_phase_complete(&ctx, &created.room_id).await.unwrap();

    let err = liar::submit_guess(&ctx, &created.room_id, &civilians[0], Some("whatever".to_string())).await.unwrap_err();
    assert_eq!(err.kind(), "unauthorized");
}
