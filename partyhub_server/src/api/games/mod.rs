//! Per-game action routes, nested under `/games/{game}` in `api::mod`.
//!
//! Each module is a thin translation layer over its `partyhub_core::game`
//! counterpart: parse the request, call the free function, serialize the
//! result. No game rule lives here (spec.md §6).

pub mod liar;
pub mod mafia;
pub mod marble;
pub mod quiz;
pub mod truth;
