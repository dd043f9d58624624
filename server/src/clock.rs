use std::future::Future;
use std::panic::AssertUnwindSafe;

use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use tracing::error;

/// Source of wall-clock time for schedules
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Runs one scheduler tick, logging its error or panic instead of propagating it.
/// Returns `None` when the tick did not complete normally.
pub async fn guarded_tick<T, F>(loop_name: &str, tick: F) -> Option<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match AssertUnwindSafe(tick).catch_unwind().await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            error!(error = %e, "{} tick failed", loop_name);
            None
        }
        Err(_) => {
            error!("{} tick panicked", loop_name);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guarded_tick_survives_panic() {
        let ok = guarded_tick("test", async { Ok::<_, anyhow::Error>(5) }).await;
        assert_eq!(ok, Some(5));

        let failed: Option<()> = guarded_tick("test", async { Err(anyhow::anyhow!("boom")) }).await;
        assert_eq!(failed, None);

        let exploding = true;
        let panicked: Option<()> = guarded_tick("test", async move {
            if exploding {
                panic!("tick exploded");
            }
            Ok(())
        })
        .await;
        assert_eq!(panicked, None);
    }
}
