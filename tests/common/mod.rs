//! Common test utilities, fixtures, and mocks shared by the integration tests.
#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;

use std::time::Duration;

/// Common test setup and utilities
pub mod test_utils {
    use std::sync::Once;
    use tracing::Level;

    static INIT: Once = Once::new();

    /// Initialize test environment
    pub fn init() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_max_level(Level::DEBUG)
                .with_test_writer()
                .try_init();
        });
    }
}

/// Lets every other task run until it blocks. Relies on paused time: the
/// clock only auto-advances to this sleep's deadline once nothing else can run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}
