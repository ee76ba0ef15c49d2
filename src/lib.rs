//! This crate surfaces to-do tasks from CalDAV servers as searchable, actionable launcher entries.
//!
//! It is meant to be loaded by a desktop launcher host: the host registers the two
//! trigger prefixes and forwards each query to a [`Plugin`], which answers with
//! display entries carrying invokable actions. \
//! Because the connection to the servers may be slow, fetched tasks are kept in a
//! [`TaskCache`](cache::TaskCache) that is only reloaded once it has gone stale
//! (or right after a mutation).
//!
//! The CalDAV plumbing lives in the [`client`] and [`calendar`] modules and can be
//! used stand-alone.

pub mod traits;

pub mod calendar;
pub use calendar::RemoteCalendar;
mod task;
pub use task::Task;
mod due;
pub use due::{classify, Due, Urgency};
pub mod cache;
pub use cache::TaskCache;
pub mod registry;
pub use registry::Registry;
pub mod plugin;
pub use plugin::Plugin;

pub mod client;
pub mod config;
pub mod error;
pub use error::{Error, Result};
mod ical;
mod resource;
pub use resource::Resource;

pub mod settings;
pub mod utils;
