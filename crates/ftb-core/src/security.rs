use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::domain::UserId;

// ============== Access Gate ==============

/// Empty allow-list means open mode. Otherwise the decimal form of the user
/// id must match an entry exactly.
pub fn is_allowed(user_id: UserId, allowed_users: &[String]) -> bool {
    if allowed_users.is_empty() {
        return true;
    }
    let id = user_id.0.to_string();
    allowed_users.iter().any(|u| u == &id)
}

// ============== Rate Limiter ==============

const SHARDS: usize = 16;

/// Per-user minimum-interval gate.
///
/// A user is accepted only when at least `min_interval` has passed since
/// their last *accepted* message. Rejections do not move the window, so a
/// continuous sub-interval burst stays suppressed after the first accept.
pub struct RateLimiter {
    min_interval: Duration,
    shards: Vec<Mutex<HashMap<i64, Instant>>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            shards: (0..SHARDS).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, user_id: UserId) -> &Mutex<HashMap<i64, Instant>> {
        &self.shards[(user_id.0 as u64 % self.shards.len() as u64) as usize]
    }

    pub fn is_limited(&self, user_id: UserId) -> bool {
        self.is_limited_at(user_id, Instant::now())
    }

    pub fn is_limited_at(&self, user_id: UserId, now: Instant) -> bool {
        let mut seen = self.shard(user_id).lock();
        if let Some(last) = seen.get(&user_id.0) {
            if now.duration_since(*last) < self.min_interval {
                return true;
            }
        }
        seen.insert(user_id.0, now);
        false
    }

    /// Evict entries whose last accepted message is older than `idle_for`.
    ///
    /// Last-seen timestamps otherwise grow by one entry per distinct user for
    /// the lifetime of the process. Returns the number of evicted entries.
    pub fn sweep_idle(&self, idle_for: Duration) -> usize {
        self.sweep_idle_at(idle_for, Instant::now())
    }

    fn sweep_idle_at(&self, idle_for: Duration, now: Instant) -> usize {
        let mut evicted = 0;
        for shard in &self.shards {
            let mut seen = shard.lock();
            let before = seen.len();
            seen.retain(|_, last| now.duration_since(*last) < idle_for);
            evicted += before - seen.len();
        }
        evicted
    }
}
