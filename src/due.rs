//! Due dates and the urgency classification derived from them

use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A task due date, as found in an iCal `DUE` property.
///
/// RFC5545 allows a date, a floating date-time, or an UTC date-time. All
/// three are kept as parsed; [`Due::instant`] normalizes them to an absolute
/// instant for comparisons.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Due {
    /// A date with no time part (`DUE;VALUE=DATE:20210321`)
    Date(NaiveDate),
    /// A floating date-time, to be interpreted as local time (`DUE:20210321T160000`)
    Floating(NaiveDateTime),
    /// An absolute date-time (`DUE:20210321T160000Z`)
    Utc(DateTime<Utc>),
}

impl Due {
    /// The absolute instant this due date refers to.
    ///
    /// Date-only values count as midnight local time; floating values get the
    /// local offset attached.
    pub fn instant(&self) -> DateTime<Local> {
        match self {
            Due::Date(date) => local_instant(date.and_time(NaiveTime::MIN)),
            Due::Floating(naive) => local_instant(*naive),
            Due::Utc(utc) => utc.with_timezone(&Local),
        }
    }

    /// Build a `Due` from an absolute local time (used for postpone targets)
    pub fn from_local(datetime: DateTime<Local>) -> Self {
        Due::Utc(datetime.with_timezone(&Utc))
    }
}

fn local_instant(naive: NaiveDateTime) -> DateTime<Local> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(instant) => instant,
        LocalResult::Ambiguous(earliest, _) => earliest,
        // The wall-clock time does not exist (DST gap); reading it as UTC is
        // within an hour of any sensible answer
        LocalResult::None => Local.from_utc_datetime(&naive),
    }
}

/// A coarse priority classification derived from due-date proximity
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Urgency {
    Low,
    Medium,
    High,
}

/// How close a due date must be to count as "due soon"
pub fn due_soon_window() -> Duration {
    Duration::hours(12)
}

/// Classify a due date relative to `now`.
///
/// Returns the urgency tier and a human-readable label:
/// * no due date at all is `Low`,
/// * a due date in the past is `High` ("overdue"),
/// * a due date within the next 12 hours is `Medium` ("due soon"),
/// * anything later is `Low`.
pub fn classify(due: Option<&Due>, now: DateTime<Local>) -> (Urgency, String) {
    let due = match due {
        None => return (Urgency::Low, "no due date".to_string()),
        Some(due) => due,
    };

    let instant = due.instant();
    let stamp = instant.format("%Y-%m-%d %H:%M");
    if instant < now {
        (Urgency::High, format!("overdue: {}", stamp))
    } else if instant - now < due_soon_window() {
        (Urgency::Medium, format!("due soon: {}", stamp))
    } else {
        (Urgency::Low, format!("due: {}", stamp))
    }
}
