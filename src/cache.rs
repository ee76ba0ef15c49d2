//! This module provides the in-memory snapshot of fetched tasks

use chrono::{DateTime, Duration, Utc};

use crate::task::Task;
use crate::traits::TaskSource;

/// What a call to [`TaskCache::refresh_if_stale`] did
#[derive(Debug)]
pub enum RefreshOutcome {
    /// The snapshot was still fresh, no network call was made
    Fresh,
    /// A full reload pass ran
    Reloaded(LoadReport),
}

/// The outcome of one full reload pass across all profiles.
///
/// Failures are not aggregated into an error: a reload is worth whatever it
/// could fetch. `skipped` makes the degradation explicit so callers and
/// tests can assert on it instead of inferring it from empty output.
#[derive(Debug)]
pub struct LoadReport {
    /// Number of profiles that loaded successfully
    pub profiles_loaded: usize,
    /// Number of tasks in the new snapshot
    pub tasks_loaded: usize,
    /// Names of the profiles whose fetch failed and was skipped
    pub skipped: Vec<String>,
}

impl LoadReport {
    /// Some profiles loaded, some did not
    pub fn is_partial(&self) -> bool {
        self.profiles_loaded > 0 && self.skipped.is_empty() == false
    }

    /// Every single profile failed; the previous snapshot was kept
    pub fn is_total_failure(&self) -> bool {
        self.profiles_loaded == 0 && self.skipped.is_empty() == false
    }
}

/// The last-fetched set of tasks across all profiles.
///
/// The snapshot is either empty (never loaded) or the result of exactly one
/// reload pass at `last_refreshed`; a reload replaces it as a whole, there
/// are no partial or merged states.
pub struct TaskCache {
    tasks: Vec<Task>,
    last_refreshed: Option<DateTime<Utc>>,
    staleness_threshold: Duration,
}

impl TaskCache {
    /// A cache with the default staleness threshold of five minutes
    pub fn new() -> Self {
        Self::with_staleness_threshold(Duration::minutes(5))
    }

    pub fn with_staleness_threshold(staleness_threshold: Duration) -> Self {
        Self {
            tasks: Vec::new(),
            last_refreshed: None,
            staleness_threshold,
        }
    }

    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed
    }

    /// Whether the snapshot is old enough (or was never loaded) to warrant a reload
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.last_refreshed {
            None => true,
            Some(refreshed_on) => now - refreshed_on >= self.staleness_threshold,
        }
    }

    /// Reload the snapshot in case it is stale, otherwise do nothing.
    ///
    /// This is the sole staleness policy: there is no per-task TTL and no
    /// partial invalidation.
    pub async fn refresh_if_stale<S: TaskSource + Sync>(&mut self, source: &S, now: DateTime<Utc>) -> RefreshOutcome {
        if self.is_stale(now) == false {
            return RefreshOutcome::Fresh;
        }
        RefreshOutcome::Reloaded(self.reload(source, now).await)
    }

    /// Fetch every profile's uncompleted tasks and replace the snapshot.
    ///
    /// A profile whose fetch fails is skipped with a warning, the others
    /// still load. Only when every profile fails is the previous snapshot
    /// (and its `last_refreshed`) kept, so the next query retries instead of
    /// presenting a wrongly-empty list.
    ///
    /// Callers use this directly to force a reload past the staleness check,
    /// e.g. right after a mutation.
    pub async fn reload<S: TaskSource + Sync>(&mut self, source: &S, now: DateTime<Utc>) -> LoadReport {
        let mut tasks = Vec::new();
        let mut skipped = Vec::new();
        let mut profiles_loaded = 0;

        for name in source.profile_names() {
            match source.fetch_tasks(&name).await {
                Ok(mut fetched) => {
                    log::debug!("Loaded {} task(s) from {}", fetched.len(), name);
                    profiles_loaded += 1;
                    tasks.append(&mut fetched);
                },
                Err(err) => {
                    log::warn!("Skipping profile {}: {}", name, err);
                    skipped.push(name);
                },
            }
        }

        if profiles_loaded == 0 && skipped.is_empty() == false {
            log::warn!("Every profile failed to load, keeping the previous snapshot");
            return LoadReport { profiles_loaded, tasks_loaded: 0, skipped };
        }

        // Stable ascending sort by due instant; tasks without a due date sink
        // to the end
        tasks.sort_by_key(|task| match task.due() {
            Some(due) => (false, Some(due.instant())),
            None => (true, None),
        });

        let tasks_loaded = tasks.len();
        self.tasks = tasks;
        self.last_refreshed = Some(now);

        LoadReport { profiles_loaded, tasks_loaded, skipped }
    }

    /// The current snapshot, in cache order
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// The tasks whose title contains `text`, case-insensitively, in cache
    /// order. Empty `text` matches all tasks.
    pub fn query(&self, text: &str) -> Vec<&Task> {
        self.tasks.iter()
            .filter(|task| task.matches(text))
            .collect()
    }
}

impl Default for TaskCache {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::{BTreeMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use url::Url;

    use crate::due::Due;
    use crate::error::Error;

    struct FakeSource {
        tasks: BTreeMap<String, Vec<Task>>,
        failing: HashSet<String>,
        fetch_count: AtomicUsize,
    }

    impl FakeSource {
        fn new() -> Self {
            Self {
                tasks: BTreeMap::new(),
                failing: HashSet::new(),
                fetch_count: AtomicUsize::new(0),
            }
        }

        fn with_profile(mut self, name: &str, tasks: Vec<Task>) -> Self {
            self.tasks.insert(name.to_string(), tasks);
            self
        }

        fn with_failing_profile(mut self, name: &str) -> Self {
            self.failing.insert(name.to_string());
            self
        }

        fn fetches(&self) -> usize {
            self.fetch_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaskSource for FakeSource {
        fn profile_names(&self) -> Vec<String> {
            let mut names: Vec<String> = self.tasks.keys().cloned().collect();
            names.extend(self.failing.iter().cloned());
            names.sort();
            names
        }

        async fn fetch_tasks(&self, profile: &str) -> crate::error::Result<Vec<Task>> {
            self.fetch_count.fetch_add(1, Ordering::SeqCst);
            if self.failing.contains(profile) {
                return Err(Error::ConnectionFailure {
                    profile: profile.to_string(),
                    message: "unreachable".to_string(),
                });
            }
            Ok(self.tasks[profile].clone())
        }
    }

    fn task(profile: &str, uid: &str, summary: &str, due: Option<Due>) -> Task {
        let url: Url = format!("https://cal.example.com/dav/{}/{}.ics", profile, uid).parse().unwrap();
        Task::new(profile.to_string(), url, uid.to_string(), summary.to_string(), due, false)
    }

    fn due_at(hour: u32) -> Due {
        Due::Utc(Utc.with_ymd_and_hms(2021, 6, 15, hour, 0, 0).unwrap())
    }

    fn reference_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 6, 15, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn refresh_within_threshold_is_a_no_op() {
        let source = FakeSource::new()
            .with_profile("Work", vec![task("Work", "a", "Ship report", None)]);
        let mut cache = TaskCache::new();
        let now = reference_now();

        match cache.refresh_if_stale(&source, now).await {
            RefreshOutcome::Reloaded(report) => assert_eq!(report.tasks_loaded, 1),
            other => panic!("expected a reload, got {:?}", other),
        }
        assert_eq!(source.fetches(), 1);

        // One minute later: still fresh, zero network calls
        match cache.refresh_if_stale(&source, now + Duration::minutes(1)).await {
            RefreshOutcome::Fresh => (),
            other => panic!("expected Fresh, got {:?}", other),
        }
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn refresh_past_threshold_reloads() {
        let source = FakeSource::new()
            .with_profile("Work", vec![task("Work", "a", "Ship report", None)]);
        let mut cache = TaskCache::new();
        let now = reference_now();

        cache.refresh_if_stale(&source, now).await;
        assert_eq!(source.fetches(), 1);

        // Exactly at the threshold counts as stale
        match cache.refresh_if_stale(&source, now + Duration::minutes(5)).await {
            RefreshOutcome::Reloaded(_) => (),
            other => panic!("expected a reload, got {:?}", other),
        }
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn empty_query_returns_the_whole_snapshot_in_cache_order() {
        let source = FakeSource::new().with_profile("Work", vec![
            task("Work", "a", "Ship report", Some(due_at(18))),
            task("Work", "b", "Buy Milk", Some(due_at(9))),
            task("Work", "c", "Call Mom", None),
        ]);
        let mut cache = TaskCache::new();
        cache.reload(&source, reference_now()).await;

        let all = cache.query("");
        let uids: Vec<&str> = all.iter().map(|t| t.uid()).collect();
        // Sorted ascending by due, no-due-date tasks last
        assert_eq!(uids, ["b", "a", "c"]);

        let snapshot: Vec<&str> = cache.tasks().iter().map(|t| t.uid()).collect();
        assert_eq!(uids, snapshot);
    }

    #[tokio::test]
    async fn queries_are_case_insensitive_substring_matches() {
        let source = FakeSource::new().with_profile("Work", vec![
            task("Work", "a", "Buy Milk", None),
            task("Work", "b", "Ship report", None),
        ]);
        let mut cache = TaskCache::new();
        cache.reload(&source, reference_now()).await;

        for needle in &["milk", "MILK", "buy"] {
            let found = cache.query(needle);
            assert_eq!(found.len(), 1, "query {:?}", needle);
            assert_eq!(found[0].summary(), "Buy Milk");
        }
        assert!(cache.query("fnord").is_empty());
    }

    #[tokio::test]
    async fn a_failing_profile_does_not_prevent_others_from_loading() {
        let source = FakeSource::new()
            .with_profile("Work", vec![task("Work", "a", "Ship report", None)])
            .with_failing_profile("Home");
        let mut cache = TaskCache::new();

        let report = cache.reload(&source, reference_now()).await;
        assert!(report.is_partial());
        assert_eq!(report.profiles_loaded, 1);
        assert_eq!(report.tasks_loaded, 1);
        assert_eq!(report.skipped, ["Home"]);
        assert_eq!(cache.tasks().len(), 1);
    }

    #[tokio::test]
    async fn total_failure_keeps_the_previous_snapshot() {
        let good = FakeSource::new()
            .with_profile("Work", vec![task("Work", "a", "Ship report", None)]);
        let mut cache = TaskCache::new();
        let now = reference_now();
        cache.reload(&good, now).await;

        let broken = FakeSource::new().with_failing_profile("Work");
        let report = cache.reload(&broken, now + Duration::minutes(10)).await;
        assert!(report.is_total_failure());
        assert_eq!(cache.tasks().len(), 1);
        // last_refreshed untouched, so the next refresh_if_stale retries
        assert_eq!(cache.last_refreshed(), Some(now));
        assert!(cache.is_stale(now + Duration::minutes(10)));
    }

    #[tokio::test]
    async fn reload_replaces_the_snapshot_wholesale() {
        let source = FakeSource::new().with_profile("Work", vec![
            task("Work", "a", "Ship report", None),
            task("Work", "b", "Buy Milk", None),
        ]);
        let mut cache = TaskCache::new();
        cache.reload(&source, reference_now()).await;
        assert_eq!(cache.tasks().len(), 2);

        let source = FakeSource::new()
            .with_profile("Work", vec![task("Work", "b", "Buy Milk", None)]);
        cache.reload(&source, reference_now() + Duration::minutes(6)).await;

        let uids: Vec<&str> = cache.tasks().iter().map(|t| t.uid()).collect();
        assert_eq!(uids, ["b"]);
    }
}
