use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use common::{MatchKey, MatchSummary};
use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Idle time after which a startup session is dropped
pub const STARTUP_SESSION_IDLE: Duration = Duration::from_secs(600);

const SHARD_COUNT: usize = 16;

type SessionKey = (MatchKey, String);
type Shard = Mutex<HashMap<SessionKey, StartupSession>>;

#[derive(Debug)]
struct StartupSession {
    ticks: u64,
    limit: u64,
    last_seen: Instant,
}

/// Clients currently shown the simulated loading screen.
/// Sessions are spread over independently locked shards.
#[derive(Clone)]
pub struct StartupSessions {
    shards: Arc<[Shard]>,
}

impl Default for StartupSessions {
    fn default() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }
}

/// Number of last-chunk-info polls answered with the startup snapshot.
/// Clients poll once per second, so this is the loading window in seconds.
pub fn loading_screen_ticks(summary: &MatchSummary) -> u64 {
    let chunks = i64::from(summary.start_chunk_id) - i64::from(summary.end_startup_chunk_id) - 1;
    if chunks <= 0 {
        return 0;
    }
    let millis = chunks as u64 * summary.chunk_interval_ms;
    millis.div_ceil(1000)
}

fn shard_index(session_key: &SessionKey) -> usize {
    let mut hasher = DefaultHasher::new();
    session_key.hash(&mut hasher);
    (hasher.finish() % SHARD_COUNT as u64) as usize
}

impl StartupSessions {
    pub fn new() -> Self {
        Self::default()
    }

    fn shard(&self, session_key: &SessionKey) -> &Shard {
        &self.shards[shard_index(session_key)]
    }

    /// Starts a loading window for the client unless one is running. A zero limit registers nothing.
    pub async fn register(&self, key: MatchKey, client: &str, limit: u64) -> bool {
        if limit == 0 {
            return false;
        }
        let session_key = (key, client.to_string());
        let mut sessions = self.shard(&session_key).lock().await;
        if sessions.contains_key(&session_key) {
            return false;
        }
        debug!(match_key = %key, client, limit, "Client entered replay loading screen");
        sessions.insert(session_key, StartupSession {
            ticks: 0,
            limit,
            last_seen: Instant::now(),
        });
        true
    }

    /// Counts one poll. Returns true while the client should still see the startup snapshot.
    pub async fn advance(&self, key: MatchKey, client: &str) -> bool {
        let session_key = (key, client.to_string());
        let mut sessions = self.shard(&session_key).lock().await;
        let Some(session) = sessions.get_mut(&session_key) else {
            return false;
        };

        session.ticks += 1;
        session.last_seen = Instant::now();
        if session.ticks >= session.limit {
            sessions.remove(&session_key);
            debug!(match_key = %key, client, "Client loading screen finished");
        }
        true
    }

    pub async fn contains(&self, key: MatchKey, client: &str) -> bool {
        let session_key = (key, client.to_string());
        self.shard(&session_key).lock().await.contains_key(&session_key)
    }

    pub async fn len(&self) -> usize {
        let mut total = 0;
        for shard in self.shards.iter() {
            total += shard.lock().await.len();
        }
        total
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops sessions not polled within `max_idle`
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let mut removed = 0;
        for shard in self.shards.iter() {
            let mut sessions = shard.lock().await;
            let before = sessions.len();
            sessions.retain(|_, s| s.last_seen.elapsed() < max_idle);
            removed += before - sessions.len();
        }
        removed
    }

    pub async fn run_sweeper(&self, every: Duration, max_idle: Duration, cancellation_token: CancellationToken) {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => {
                    info!("Startup session sweeper shutting down");
                    break;
                }
                _ = interval.tick() => {
                    let removed = self.sweep_idle(max_idle).await;
                    if removed > 0 {
                        debug!("Swept {} idle startup sessions", removed);
                    }
                }
            }
        }
    }
}
