//! Library surface for `partyhub_server`, exposed so integration tests
//! under `tests/` can build a router against a real `AppState`.

pub mod api;
pub mod config;
pub mod logging;
