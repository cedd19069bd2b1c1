//! Opaque identifiers: room codes, device ids, host session tokens.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ambiguity-free alphabet for room codes: uppercase letters and digits
/// minus `0`, `O`, `1`, `I` (spec.md §3), grounded on the clean-room-code
/// generator in the retrieval pack's signal-fish-server.
const ROOM_CODE_ALPHABET: &[u8] = b"23456789ABCDEFGHJKLMNPQRSTUVWXYZ";

/// Length of a room code (spec.md §3: "4-character code").
pub const ROOM_CODE_LENGTH: usize = 4;

/// A 4-character room code over the ambiguity-free alphabet.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RoomId(String);

impl RoomId {
    /// Draw one candidate code. Callers perform rejection sampling against
    /// live keys (spec.md §3).
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let code: String = (0..ROOM_CODE_LENGTH)
            .map(|_| {
                let idx = rng.random_range(0..ROOM_CODE_ALPHABET.len());
                ROOM_CODE_ALPHABET[idx] as char
            })
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Every character drawn from the ambiguity-free alphabet.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == ROOM_CODE_LENGTH
            && self
                .0
                .bytes()
                .all(|b| ROOM_CODE_ALPHABET.contains(&b))
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_ascii_uppercase())
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        Self(value.to_ascii_uppercase())
    }
}

/// Opaque per-join player identifier.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Opaque host session token, required to open the host event stream.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct HostSessionToken(String);

impl HostSessionToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostSessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<str> for HostSessionToken {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
