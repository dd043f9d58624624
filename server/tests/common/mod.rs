#![allow(dead_code)]

pub mod fixtures;
pub mod manual_clock;
pub mod mock_directory;
pub mod mock_transport;

pub use fixtures::*;
pub use manual_clock::ManualClock;
pub use mock_directory::MockDirectory;
pub use mock_transport::{MatchReply, MockTransport};

/// Macro to wrap test functions with a timeout to prevent hanging tests
#[macro_export]
macro_rules! timeout_test {
    ($duration:expr, $body:expr) => {
        tokio::time::timeout($duration, $body)
            .await
            .map_err(|_| anyhow::anyhow!("Test timed out after {:?}", $duration))?
    };
}
