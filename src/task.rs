//! To-do tasks (iCal `VTODO` item)

use serde::{Deserialize, Serialize};
use url::Url;

use crate::due::Due;

/// A read-only snapshot of a to-do task.
///
/// The source of truth is the remote server; instances of this type live in
/// the [`TaskCache`](crate::cache::TaskCache) until the next reload replaces
/// them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    /// Name of the profile this task was fetched from
    profile: String,

    /// The task resource URL on its origin server
    url: Url,

    /// Persistent, globally unique identifier for the calendar component
    /// The [RFC](https://tools.ietf.org/html/rfc5545#page-117) recommends concatenating a timestamp with the server's domain name, but UUID are even better
    uid: String,

    /// The display name of the task
    summary: String,

    /// When this task is due, in case a due date is set
    due: Option<Due>,

    /// Whether the server reports this task as completed
    completed: bool,
}

impl Task {
    pub fn new(profile: String, url: Url, uid: String, summary: String,
               due: Option<Due>, completed: bool) -> Self
    {
        Self { profile, url, uid, summary, due, completed }
    }

    pub fn profile(&self) -> &str    { &self.profile }
    pub fn url(&self) -> &Url        { &self.url }
    pub fn uid(&self) -> &str        { &self.uid }
    pub fn summary(&self) -> &str    { &self.summary }
    pub fn due(&self) -> Option<&Due> { self.due.as_ref() }
    pub fn completed(&self) -> bool  { self.completed }

    /// An identifier that is unique across profiles.
    ///
    /// UIDs are only guaranteed unique within one server, so two profiles may
    /// well carry the same UID. Scoping by profile name keeps the host's
    /// entries distinct.
    pub fn display_id(&self) -> String {
        format!("{}:{}", self.profile, self.uid)
    }

    /// Case-insensitive substring match against the task summary.
    /// An empty needle matches every task.
    pub fn matches(&self, text: &str) -> bool {
        self.summary.to_lowercase().contains(&text.to_lowercase())
    }

    pub fn set_due(&mut self, due: Option<Due>) {
        self.due = due;
    }

    pub fn set_completed(&mut self, completed: bool) {
        self.completed = completed;
    }
}
