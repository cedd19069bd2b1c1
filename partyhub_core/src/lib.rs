//! # Party Hub Core
//!
//! The stateful heart of a real-time multi-room party-game backend. Each
//! room hosts one of five independent game protocols — Marble, Mafia,
//! Liar, Quiz, Truth — over per-room ephemeral state, with all mutation
//! pushed out to the host display and player devices through a one-way
//! event bus.
//!
//! ## Core modules
//!
//! - [`error`]: the five error kinds every operation in this crate returns.
//! - [`store`]: the TTL-bounded key/value/list/set facility every other
//!   module persists through.
//! - [`bus`]: per-room host/player event streams and broadcast.
//! - [`room`]: room codes, roster, team assignment.
//! - [`scheduler`]: per-room countdown timers and one-shot delayed actions.
//! - [`catalog`]: the read-only seed content (quiz words, keywords,
//!   penalties).
//! - [`game`]: the five game state machines behind one `GameStateMachine`
//!   capability.
//!
//! `partyhub_server` is a thin HTTP/SSE adapter over this crate; none of
//! the game logic lives there.

pub mod bus;
pub mod catalog;
pub mod error;
pub mod game;
pub mod room;
pub mod scheduler;
pub mod store;

pub use bus::EventBus;
pub use catalog::Catalog;
pub use error::{CoreError, CoreResult};
pub use game::{AnyGame, GameContext, GameStateMachine};
pub use room::{DeviceId, GameCode, HostSessionToken, RoomId, RoomRegistry};
pub use scheduler::Scheduler;
pub use store::MemoryStore;
