//! A module to parse ICal files

use chrono::{NaiveDate, NaiveDateTime, TimeZone, Utc};
use ical::parser::ical::component::IcalTodo;
use ical::property::Property;
use url::Url;

use crate::due::Due;
use crate::error::{Error, Result};
use crate::task::Task;

/// Parse an iCal file into a [`Task`] snapshot.
///
/// `profile` is the name of the profile the payload came from and `url` the
/// task's resource URL; both end up in the snapshot so that later mutations
/// can address the right server.
pub fn parse(content: &str, profile: &str, url: Url) -> Result<Task> {
    let mut reader = ical::IcalParser::new(content.as_bytes());
    let parsed_item = match reader.next() {
        None => return Err(Error::Ical(format!("no iCal data to parse for item {}", url))),
        Some(item) => match item {
            Err(err) => return Err(Error::Ical(format!("unable to parse iCal data for item {}: {}", url, err))),
            Ok(item) => item,
        }
    };

    let todo = assert_single_todo(&parsed_item.todos, &url)?;

    let mut uid = None;
    let mut summary = None;
    let mut due = None;
    let mut completed = false;
    for prop in &todo.properties {
        match prop.name.as_str() {
            "UID" => uid = prop.value.clone(),
            "SUMMARY" => summary = prop.value.clone(),
            "DUE" => due = Some(parse_due(prop, &url)?),
            "STATUS" => {
                if prop.value.as_deref() == Some("COMPLETED") {
                    completed = true;
                }
            },
            "COMPLETED" => completed = true,
            _ => continue,
        }
    }

    let uid = match uid {
        Some(uid) => uid,
        None => return Err(Error::Ical(format!("missing UID for item {}", url))),
    };
    let summary = match summary {
        Some(summary) => summary,
        None => return Err(Error::Ical(format!("missing SUMMARY for item {}", url))),
    };

    // What to do with multiple items?
    if reader.next().map(|r| r.is_ok()) == Some(true) {
        return Err(Error::Ical("parsing multiple items is not supported".into()));
    }

    Ok(Task::new(profile.to_string(), url, uid, summary, due, completed))
}

fn assert_single_todo<'a>(todos: &'a [IcalTodo], url: &Url) -> Result<&'a IcalTodo> {
    match todos.len() {
        1 => Ok(&todos[0]),
        n => Err(Error::Ical(format!("expected a single VTODO for item {}, found {}", url, n))),
    }
}

/// Parse a `DUE` property.
///
/// RFC5545 allows three shapes: a `VALUE=DATE` date, a floating local
/// date-time, and an UTC date-time with a `Z` suffix.
fn parse_due(prop: &Property, url: &Url) -> Result<Due> {
    let value = match &prop.value {
        Some(value) => value.as_str(),
        None => return Err(Error::Ical(format!("empty DUE for item {}", url))),
    };

    let is_date_only = prop.params.iter().flatten()
        .any(|(name, values)| name == "VALUE" && values.iter().any(|v| v == "DATE"));

    // Some servers skip the VALUE=DATE parameter, so an 8-char value counts too
    if is_date_only || value.len() == 8 {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d")
            .map_err(|err| Error::Ical(format!("invalid DUE date {:?} for item {}: {}", value, url, err)))?;
        return Ok(Due::Date(date));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%SZ") {
        return Ok(Due::Utc(Utc.from_utc_datetime(&naive)));
    }

    match NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S") {
        Ok(naive) => Ok(Due::Floating(naive)),
        Err(err) => Err(Error::Ical(format!("invalid DUE value {:?} for item {}: {}", value, url, err))),
    }
}
