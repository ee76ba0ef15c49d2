//! One open connection per configured profile, and the mutations that go
//! through them

use std::collections::BTreeMap;

use async_trait::async_trait;
use url::Url;
use uuid::Uuid;

use crate::calendar::RemoteCalendar;
use crate::client::Client;
use crate::config::Profiles;
use crate::due::Due;
use crate::error::{Error, Result};
use crate::task::Task;
use crate::traits::TaskSource;

/// A profile's open session plus its resolved calendar collection.
///
/// `collection` is `None` when no collection on the server matches the
/// profile's configured URL; such a profile yields zero tasks.
pub struct Connection {
    #[allow(dead_code)]
    client: Client,
    collection: Option<RemoteCalendar>,
}

/// All open connections, keyed by profile name.
///
/// Torn down and rebuilt wholesale whenever the profile set changes.
#[derive(Default)]
pub struct Registry {
    connections: BTreeMap<String, Connection>,
}

impl Registry {
    /// Open a session per profile and resolve each profile's collection.
    ///
    /// A profile that fails to connect does not prevent the others from
    /// being opened; the failures are returned alongside the registry so the
    /// caller can log or surface them.
    pub async fn connect(profiles: &Profiles) -> (Self, Vec<(String, Error)>) {
        let mut connections = BTreeMap::new();
        let mut failures = Vec::new();

        for (name, profile) in profiles {
            log::info!("loading {}", name);
            match Self::open(name, &profile.url, &profile.username, &profile.password).await {
                Ok(connection) => {
                    connections.insert(name.clone(), connection);
                },
                Err(err) => {
                    failures.push((name.clone(), err));
                },
            }
        }

        (Self { connections }, failures)
    }

    async fn open(name: &str, url: &Url, username: &str, password: &str) -> Result<Connection> {
        let mut client = Client::new(url.as_str(), username, password)?;
        let collection = client.resolve_collection(url).await
            .map_err(|err| Error::ConnectionFailure {
                profile: name.to_string(),
                message: err.to_string(),
            })?;

        Ok(Connection { client, collection })
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// The resolved collection of a profile, for mutations.
    /// An unknown profile and an unmatched collection are both errors here:
    /// unlike a task load, a mutation must not silently go nowhere.
    fn collection(&self, profile: &str) -> Result<&RemoteCalendar> {
        let connection = self.connections.get(profile)
            .ok_or_else(|| Error::UnknownProfile(profile.to_string()))?;
        connection.collection.as_ref()
            .ok_or_else(|| Error::ConnectionFailure {
                profile: profile.to_string(),
                message: "no calendar collection matches the configured URL".to_string(),
            })
    }

    /// Build a new task on the named profile's collection.
    ///
    /// The cache does not need to be reloaded for this to succeed; a stale
    /// snapshot may simply not show the new task until the next refresh.
    pub async fn create_task(&self, profile: &str, summary: String, due: Option<Due>) -> Result<Task> {
        let collection = self.collection(profile)?;

        let uid = Uuid::new_v4().to_hyphenated().to_string();
        let url = collection.task_url(&uid)?;
        let task = Task::new(profile.to_string(), url, uid, summary, due, false);

        collection.add_task(&task).await?;
        log::info!("added todo {} in {}", task.uid(), profile);
        Ok(task)
    }

    /// Mark a task complete, looking it up on the server (not in any cache)
    /// so that a stale identifier is never acted upon.
    pub async fn complete_task(&self, profile: &str, uid: &str) -> Result<()> {
        let collection = self.collection(profile)?;

        let mut task = collection.fetch_task(profile, uid).await?
            .ok_or_else(|| Error::TaskNotFound { profile: profile.to_string(), uid: uid.to_string() })?;

        task.set_completed(true);
        collection.update_task(&task).await
    }

    /// Set or replace a task's due date, with the same server-side lookup as
    /// [`complete_task`](Registry::complete_task)
    pub async fn reschedule_task(&self, profile: &str, uid: &str, new_due: Due) -> Result<()> {
        let collection = self.collection(profile)?;

        let mut task = collection.fetch_task(profile, uid).await?
            .ok_or_else(|| Error::TaskNotFound { profile: profile.to_string(), uid: uid.to_string() })?;

        task.set_due(Some(new_due));
        collection.update_task(&task).await
    }
}

#[async_trait]
impl TaskSource for Registry {
    fn profile_names(&self) -> Vec<String> {
        self.connections.keys().cloned().collect()
    }

    async fn fetch_tasks(&self, profile: &str) -> Result<Vec<Task>> {
        let connection = self.connections.get(profile)
            .ok_or_else(|| Error::UnknownProfile(profile.to_string()))?;

        match &connection.collection {
            None => {
                // Accepted behavior: a profile whose URL matches no
                // collection loads as empty rather than failing the refresh
                log::debug!("Profile {} has no resolved collection, loading zero tasks", profile);
                Ok(Vec::new())
            },
            Some(collection) => collection.fetch_tasks(profile).await,
        }
    }
}
