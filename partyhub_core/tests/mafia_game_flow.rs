/// Integration tests driving the Mafia state machine through a full
/// night/day/vote cycle against real store, bus, and registry instances.
use std::collections::HashMap;

use partyhub_core::game::mafia::{self, Role};
use partyhub_core::room::{GameCode, RoomStatus};
use partyhub_core::{DeviceId, GameContext, MemoryStore};
use partyhub_core::{EventBus, RoomRegistry, Scheduler};

async fn ctx() -> GameContext {
    let store = MemoryStore::new();
    let bus = EventBus::new();
    let scheduler = Scheduler::new();
    let registry = RoomRegistry::new(store.clone());
    GameContext::new(store, bus, scheduler, registry)
}

async fn roles_of(ctx: &GameContext, room_id: &partyhub_core::RoomId, devices: &[DeviceId]) -> HashMap<DeviceId, Role> {
    let mut out = HashMap::new();
    for device in devices {
        out.insert(device.clone(), mafia::player_role(ctx, room_id, device).await.unwrap());
    }
    out
}

#[tokio::test]
async fn four_players_get_exactly_one_mafia_and_no_special_roles() {
    let ctx = ctx().await;
    let created = ctx.registry.create_room().await.unwrap();
    let mut devices = Vec::new();
    for name in ["a", "b", "c", "d"] {
        devices.push(ctx.registry.join(&created.room_id, name).await.unwrap().device_id);
    }
    ctx.registry.start_game(&created.room_id, GameCode::Mafia).await.unwrap();
    mafia::initialize(&ctx, &created.room_id).await.unwrap();

    let roles = roles_of(&ctx, &created.room_id, &devices).await;
    let mafia_count = roles.values().filter(|r| **r == Role::Mafia).count();
    let civilian_count = roles.values().filter(|r| **r == Role::Civilian).count();
    assert_eq!(mafia_count, 1);
    assert_eq!(civilian_count, 3);
    assert!(roles.values().all(|r| *r != Role::Doctor && *r != Role::Police));
}

#[tokio::test]
async fn full_cycle_ends_with_citizen_win_once_mafia_is_executed() {
    let ctx = ctx().await;
    let created = ctx.registry.create_room().await.unwrap();
    let mut devices = Vec::new();
    for name in ["a", "b", "c", "d"] {
        devices.push(ctx.registry.join(&created.room_id, name).await.unwrap().device_id);
    }
    ctx.registry.start_game(&created.room_id, GameCode::Mafia).await.unwrap();
    mafia::initialize(&ctx, &created.room_id).await.unwrap();

    let roles = roles_of(&ctx, &created.room_id, &devices).await;
    let mafia_device = roles.iter().find(|(_, r)| **r == Role::Mafia).unwrap().0.clone();
    let civilians: Vec<DeviceId> = roles
        .iter()
        .filter(|(_, r)| **r == Role::Civilian)
        .map(|(d, _)| d.clone())
        .collect();

    // Night: the lone mafia picks a target. No doctor/police are seeded for
    // 4 players, so this single action closes out the night immediately.
    mafia::mafia_kill(&ctx, &created.room_id, &mafia_device, &civilians[0]).await.unwrap();

    let info = ctx.registry.info(&created.room_id).await.unwrap().unwrap();
    let victim = info.players.iter().find(|p| p.device_id == civilians[0]).unwrap();
    assert!(!victim.alive);
    assert_eq!(info.status, RoomStatus::Playing);

    // Day: announcement -> discussion -> vote.
    mafia::on_phase_complete(&ctx, &created.room_id).await.unwrap();
    mafia::on_phase_complete(&ctx, &created.room_id).await.unwrap();

    // Every surviving player votes to execute the mafia.
    mafia::vote(&ctx, &created.room_id, &civilians[1], &mafia_device).await.unwrap();
    mafia::vote(&ctx, &created.room_id, &civilians[2], &mafia_device).await.unwrap();
    mafia::on_phase_complete(&ctx, &created.room_id).await.unwrap(); // Vote -> VoteResult
    mafia::on_phase_complete(&ctx, &created.room_id).await.unwrap(); // VoteResult -> FinalDefense
    mafia::on_phase_complete(&ctx, &created.room_id).await.unwrap(); // FinalDefense -> FinalVote

    mafia::final_vote(&ctx, &created.room_id, &civilians[1], true).await.unwrap();
    mafia::final_vote(&ctx, &created.room_id, &civilians[2], true).await.unwrap();
    mafia::on_phase_complete(&ctx, &created.room_id).await.unwrap(); // tally -> passed
    mafia::on_phase_complete(&ctx, &created.room_id).await.unwrap(); // execute -> game end

    let info = ctx.registry.info(&created.room_id).await.unwrap().unwrap();
    assert_eq!(info.status, RoomStatus::Ended);
    let executed = info.players.iter().find(|p| p.device_id == mafia_device).unwrap();
    assert!(!executed.alive);
}

#[tokio::test]
async fn accused_cannot_cast_their_own_final_vote() {
    let ctx = ctx().await;
    let created = ctx.registry.create_room().await.unwrap();
    let mut devices = Vec::new();
    for name in ["a", "b", "c", "d"] {
        devices.push(ctx.registry.join(&created.room_id, name).await.unwrap().device_id);
    }
    ctx.registry.start_game(&created.room_id, GameCode::Mafia).await.unwrap();
    mafia::initialize(&ctx, &created.room_id).await.unwrap();

    let roles = roles_of(&ctx, &created.room_id, &devices).await;
    let mafia_device = roles.iter().find(|(_, r)| **r == Role::Mafia).unwrap().0.clone();
    let civilians: Vec<DeviceId> = roles
        .iter()
        .filter(|(_, r)| **r == Role::Civilian)
        .map(|(d, _)| d.clone())
        .collect();

    mafia::mafia_kill(&ctx, &created.room_id, &mafia_device, &civilians[0]).await.unwrap();
    mafia::on_phase_complete(&ctx, &created.room_id).await.unwrap(); // -> DayDiscussion
    mafia::on_phase_complete(&ctx, &created.room_id).await.unwrap(); // -> Vote

    mafia::vote(&ctx, &created.room_id, &civilians[1], &mafia_device).await.unwrap();
    mafia::vote(&ctx, &created.room_id, &civilians[2], &mafia_device).await.unwrap();
    mafia::on_phase_complete(&ctx, &created.room_id).await.unwrap(); // -> VoteResult
    mafia::on_phase_complete(&ctx, &created.room_id).await.unwrap(); // -> FinalDefense
    mafia::on_phase_complete(&ctx, &created.room_id).await.unwrap(); // -> FinalVote

    let err = mafia::final_vote(&ctx, &created.room_id, &mafia_device, false).await.unwrap_err();
    assert_eq!(err.kind(), "invalid_state");
}
