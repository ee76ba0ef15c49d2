//! A module to build ICal files

use chrono::{DateTime, Utc};
use ics::parameters;
use ics::properties::{Completed, Due as DueProp, Status, Summary};
use ics::{ICalendar, ToDo};

use crate::due::Due;
use crate::task::Task;

/// Create an iCal text from a [`Task`], ready to be `PUT` on its server.
///
/// `dtstamp` is the instant stamped on the VTODO; callers pass `Utc::now()`.
pub fn build_from(task: &Task, dtstamp: DateTime<Utc>) -> String {
    let mut todo = ToDo::new(task.uid(), format_date_time(&dtstamp));
    todo.push(Summary::new(task.summary()));

    match task.due() {
        None => (),
        Some(Due::Date(date)) => {
            let mut due = DueProp::new(date.format("%Y%m%d").to_string());
            due.append(parameters!("VALUE" => "DATE"));
            todo.push(due);
        },
        Some(Due::Floating(naive)) => {
            todo.push(DueProp::new(naive.format("%Y%m%dT%H%M%S").to_string()));
        },
        Some(Due::Utc(utc)) => {
            todo.push(DueProp::new(format_date_time(utc)));
        },
    }

    if task.completed() {
        todo.push(Completed::new(format_date_time(&dtstamp)));
        todo.push(Status::completed());
    } else {
        todo.push(Status::needs_action());
    }

    let mut calendar = ICalendar::new("2.0", crate::ical::default_prod_id());
    calendar.add_todo(todo);

    calendar.to_string()
}

fn format_date_time(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}
