//! JSON object lines.

use crate::Result;
use linestream_server::LineProducer;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::error;

const USERS: &[&str] = &["alice", "bob", "carol", "dave", "erin", "frank", "grace", "heidi"];
const ACTIONS: &[&str] = &["view", "click", "purchase", "login", "logout"];

/// A synthetic user event, serialized as one JSON line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    pub user: String,
    pub action: String,
    pub amount: f64,
    pub timestamp: u64,
}

/// Produces one compact JSON [`Event`] per line.
#[derive(Debug, Clone)]
pub struct JsonObjects {
    next_id: u64,
    rng: StdRng,
}

impl Default for JsonObjects {
    fn default() -> Self {
        Self {
            next_id: 1,
            rng: StdRng::from_entropy(),
        }
    }
}

impl JsonObjects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed seed for reproducible events. Timestamps still follow the clock.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Generate the next event.
    pub fn next_event(&mut self) -> Event {
        let id = self.next_id;
        self.next_id += 1;

        let user = USERS.choose(&mut self.rng).copied().unwrap_or("anonymous");
        let action = ACTIONS.choose(&mut self.rng).copied().unwrap_or("view");
        let cents: u32 = self.rng.gen_range(0..100_000);

        Event {
            id,
            user: user.to_string(),
            action: action.to_string(),
            amount: f64::from(cents) / 100.0,
            timestamp: now_millis(),
        }
    }

    /// Serialize the next event as compact JSON.
    pub fn next_json(&mut self) -> Result<String> {
        let event = self.next_event();
        Ok(serde_json::to_string(&event)?)
    }
}

impl LineProducer for JsonObjects {
    fn build_line(&mut self) -> String {
        match self.next_json() {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "Failed to serialize event");
                "{}".to_string()
            }
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
