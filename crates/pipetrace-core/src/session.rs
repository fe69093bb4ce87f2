//! Session identifiers - short labels tying one run's events together

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a session identifier in characters
pub const SESSION_ID_LEN: usize = 8;

/// Short, practically unique run label. Not cryptographically unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Current epoch milliseconds followed by a random 6-digit number,
    /// truncated to [`SESSION_ID_LEN`] characters.
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        let random_part: u32 = rand::thread_rng().gen_range(100_000..=999_999);
        let id: String = format!("{}{}", millis, random_part)
            .chars()
            .take(SESSION_ID_LEN)
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
