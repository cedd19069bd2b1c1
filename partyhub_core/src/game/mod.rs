//! Per-room phased game state machines (C5).
//!
//! Each of the five games owns its own phase enum, state struct, and action
//! handlers under its own module; they share only the skeleton this module
//! names — `initialize`, `onPhaseComplete`, and a write-then-broadcast
//! convention (spec.md §4.5) — modeled as one `GameStateMachine` capability
//! with five marker-type variants rather than a shared typestate struct,
//! per spec.md §9's explicit note that the five games share no fields.

use std::{future::Future, pin::Pin};

use enum_dispatch::enum_dispatch;

use crate::bus::EventBus;
use crate::catalog::Catalog;
use crate::error::CoreResult;
use crate::room::{GameCode, RoomId, RoomRegistry};
use crate::scheduler::Scheduler;
use crate::store::MemoryStore;

pub mod liar;
pub mod mafia;
pub mod marble;
pub mod quiz;
pub mod truth;

/// Boxed, type-erased future — the manual async-trait-object shape used
/// wherever a trait needs `enum_dispatch` across `async fn` impls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Shared dependency bundle every game module operates against. Cheap to
/// clone — every field is itself a handle over `Arc`-shared state.
#[derive(Clone)]
pub struct GameContext {
    pub store: MemoryStore,
    pub bus: EventBus,
    pub scheduler: Scheduler,
    pub registry: RoomRegistry,
    pub catalog: &'static Catalog,
}

impl GameContext {
    pub fn new(store: MemoryStore, bus: EventBus, scheduler: Scheduler, registry: RoomRegistry) -> Self {
        Self {
            store,
            bus,
            scheduler,
            registry,
            catalog: Catalog::global(),
        }
    }
}

/// The scheduler-invoked dispatcher every game exposes. Action handlers
/// (roll, vote, kill, correct/pass, ...) are not part of this capability —
/// they're called directly by `partyhub_server`'s per-game routes, which
/// already know which game they're routing to.
#[enum_dispatch]
pub trait GameStateMachine {
    fn on_phase_complete<'a>(
        &'a self,
        ctx: &'a GameContext,
        room_id: &'a RoomId,
    ) -> BoxFuture<'a, CoreResult<()>>;
}

pub struct MarbleGame;
pub struct MafiaGame;
pub struct LiarGame;
pub struct QuizGame;
pub struct TruthGame;

impl GameStateMachine for MarbleGame {
    fn on_phase_complete<'a>(
        &'a self,
        _ctx: &'a GameContext,
        _room_id: &'a RoomId,
    ) -> BoxFuture<'a, CoreResult<()>> {
        // Marble has no timer-driven phase (spec.md §4.5.1): every
        // transition is host- or dice-roll-driven, so the scheduler never
        // arms a timer for it and this is never called in practice.
        Box::pin(async { Ok(()) })
    }
}

impl GameStateMachine for MafiaGame {
    fn on_phase_complete<'a>(
        &'a self,
        ctx: &'a GameContext,
        room_id: &'a RoomId,
    ) -> BoxFuture<'a, CoreResult<()>> {
        Box::pin(mafia::on_phase_complete(ctx, room_id))
    }
}

impl GameStateMachine for LiarGame {
    fn on_phase_complete<'a>(
        &'a self,
        ctx: &'a GameContext,
        room_id: &'a RoomId,
    ) -> BoxFuture<'a, CoreResult<()>> {
        Box::pin(liar::on_phase_complete(ctx, room_id))
    }
}

impl GameStateMachine for QuizGame {
    fn on_phase_complete<'a>(
        &'a self,
        ctx: &'a GameContext,
        room_id: &'a RoomId,
    ) -> BoxFuture<'a, CoreResult<()>> {
        Box::pin(quiz::on_phase_complete(ctx, room_id))
    }
}

impl GameStateMachine for TruthGame {
    fn on_phase_complete<'a>(
        &'a self,
        _ctx: &'a GameContext,
        _room_id: &'a RoomId,
    ) -> BoxFuture<'a, CoreResult<()>> {
        // Truth's only deadline is the answering phase, and an expired
        // deadline there is driven by `finish_answering` directly rather
        // than through this generic hook (spec.md §4.5.5 names no
        // timer-driven auto-advance out of `answering`).
        Box::pin(async { Ok(()) })
    }
}

#[enum_dispatch(GameStateMachine)]
pub enum AnyGame {
    Marble(MarbleGame),
    Mafia(MafiaGame),
    Liar(LiarGame),
    Quiz(QuizGame),
    Truth(TruthGame),
}

impl From<GameCode> for AnyGame {
    fn from(code: GameCode) -> Self {
        match code {
            GameCode::Marble => AnyGame::Marble(MarbleGame),
            GameCode::Mafia => AnyGame::Mafia(MafiaGame),
            GameCode::Liar => AnyGame::Liar(LiarGame),
            GameCode::Quiz => AnyGame::Quiz(QuizGame),
            GameCode::Truth => AnyGame::Truth(TruthGame),
        }
    }
}

/// Arm `room_id`'s countdown so its completion routes back through
/// `AnyGame::on_phase_complete` for `game`, logging (not propagating) any
/// error the dispatcher raises — the scheduler's callback has no caller to
/// report to (spec.md §4.4: callback exceptions must be caught and logged).
pub fn arm_phase_timer(
    ctx: GameContext,
    room_id: RoomId,
    game: GameCode,
    duration_sec: i64,
    on_tick_event: &'static str,
) {
    let tick_ctx = ctx.clone();
    let tick_room = room_id.clone();
    let complete_ctx = ctx.clone();
    let complete_room = room_id.clone();
    ctx.scheduler.start_timer(
        room_id,
        duration_sec,
        move |remaining| {
            let ctx = tick_ctx.clone();
            let room_id = tick_room.clone();
            async move {
                ctx.bus
                    .broadcast_all(
                        &room_id,
                        crate::bus::Event::new(on_tick_event, serde_json::json!({ "remaining": remaining })),
                    )
                    .await;
            }
        },
        move || async move {
            let any = AnyGame::from(game);
            if let Err(err) = any.on_phase_complete(&complete_ctx, &complete_room).await {
                tracing::error!(room_id = %complete_room, error = %err, "phase completion failed");
            }
        },
    );
}
