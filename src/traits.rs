use async_trait::async_trait;

use crate::error::Result;
use crate::task::Task;

/// Something the [`TaskCache`](crate::cache::TaskCache) can reload from.
///
/// The real implementation is the [`Registry`](crate::registry::Registry);
/// tests substitute in-memory fakes so that cache behavior can be exercised
/// without a server.
#[async_trait]
pub trait TaskSource {
    /// The profile names this source can fetch for, in a stable order
    fn profile_names(&self) -> Vec<String>;

    /// Fetch the current uncompleted tasks of one profile.
    /// This performs network I/O and can be a long process, or fail.
    async fn fetch_tasks(&self, profile: &str) -> Result<Vec<Task>>;
}
