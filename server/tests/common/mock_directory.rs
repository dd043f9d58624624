use std::sync::Mutex;

use async_trait::async_trait;
use common::{Region, SubjectIdentity};
use recorder::error::TransportError;
use recorder::transport::{IdentityDirectory, TransportResult};

/// Identity directory backed by a fixed player list
#[derive(Default)]
pub struct MockDirectory {
    players: Mutex<Vec<SubjectIdentity>>,
    challengers: Mutex<Vec<SubjectIdentity>>,
    version_fails: Mutex<bool>,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_player(&self, region: Region, subject_id: u64, display_name: &str) {
        self.players.lock().unwrap().push(SubjectIdentity {
            region,
            subject_id,
            display_name: display_name.to_string(),
        });
    }

    pub fn add_challenger(&self, region: Region, subject_id: u64, display_name: &str) {
        self.challengers.lock().unwrap().push(SubjectIdentity {
            region,
            subject_id,
            display_name: display_name.to_string(),
        });
    }

    pub fn fail_version(&self) {
        *self.version_fails.lock().unwrap() = true;
    }
}

#[async_trait]
impl IdentityDirectory for MockDirectory {
    async fn subject_by_name(&self, region: Region, name: &str) -> TransportResult<Option<SubjectIdentity>> {
        Ok(self
            .players
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.region == region && p.display_name.eq_ignore_ascii_case(name))
            .cloned())
    }

    async fn challengers(&self, region: Region) -> TransportResult<Vec<SubjectIdentity>> {
        Ok(self
            .challengers
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.region == region)
            .cloned()
            .collect())
    }

    async fn platform_version(&self, _region: Region) -> TransportResult<String> {
        if *self.version_fails.lock().unwrap() {
            return Err(TransportError::Unavailable);
        }
        Ok("5.2.1".to_string())
    }
}
