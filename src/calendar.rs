//! Calendar collections on a CalDAV server

use std::convert::TryFrom;

use bitflags::bitflags;
use chrono::Utc;
use minidom::Element;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Method;
use url::Url;

use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::task::Task;
use crate::utils::{find_elem, find_elems};

static TASKS_BODY: &str = r#"
    <C:calendar-query xmlns:C="urn:ietf:params:xml:ns:caldav">
    <D:prop xmlns:D="DAV:">
        <D:getetag/>
        <C:calendar-data/>
    </D:prop>
    <C:filter>
        <C:comp-filter name="VCALENDAR">
        <C:comp-filter name="VTODO">
            <C:prop-filter name="COMPLETED">
            <C:is-not-defined/>
            </C:prop-filter>
            <C:prop-filter name="STATUS">
            <C:text-match
                negate-condition="yes">CANCELLED</C:text-match>
            </C:prop-filter>
        </C:comp-filter>
        </C:comp-filter>
    </C:filter>
    </C:calendar-query>
"#;

bitflags! {
    pub struct SupportedComponents: u8 {
        /// An event, such as a calendar meeting
        const EVENT = 1;
        /// A to-do item, such as a reminder
        const TODO = 2;
    }
}

impl TryFrom<minidom::Element> for SupportedComponents {
    type Error = Error;

    /// Create an instance from an XML <supported-calendar-component-set> element
    fn try_from(element: minidom::Element) -> Result<Self> {
        if element.name() != "supported-calendar-component-set" {
            return Err(Error::Dav("element must be a <supported-calendar-component-set>".into()));
        }

        let mut flags = Self::empty();
        for child in element.children() {
            match child.attr("name") {
                None => continue,
                Some("VEVENT") => flags.insert(Self::EVENT),
                Some("VTODO") => flags.insert(Self::TODO),
                Some(other) => {
                    log::warn!("Unimplemented supported component type: {:?}. Ignoring it", other);
                    continue
                },
            };
        }

        Ok(flags)
    }
}


/// A calendar collection resolved by a [`Client`](crate::client::Client).
///
/// This is where the per-collection CalDAV operations live: listing the
/// uncompleted tasks and putting new or updated ones.
#[derive(Clone)]
pub struct RemoteCalendar {
    name: String,
    resource: Resource,
    supported_components: SupportedComponents,

    http: reqwest::Client,
}

impl RemoteCalendar {
    pub fn new(name: String, resource: Resource, supported_components: SupportedComponents,
               http: reqwest::Client) -> Self
    {
        Self { name, resource, supported_components, http }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn url(&self) -> &Url { self.resource.url() }
    pub fn supported_components(&self) -> SupportedComponents { self.supported_components }

    pub fn supports_todos(&self) -> bool {
        self.supported_components.contains(SupportedComponents::TODO)
    }

    /// The resource URL a new task with this UID will live at
    pub fn task_url(&self, uid: &str) -> Result<Url> {
        let mut collection = self.resource.url().clone();
        if collection.path().ends_with('/') == false {
            // Url::join would replace the last path segment otherwise
            collection.set_path(&format!("{}/", collection.path()));
        }
        Ok(collection.join(&format!("{}.ics", uid))?)
    }

    /// Fetch the uncompleted tasks of this collection.
    ///
    /// Items the server returns but that cannot be interpreted are skipped
    /// with a warning, they do not fail the whole fetch.
    pub async fn fetch_tasks(&self, profile: &str) -> Result<Vec<Task>> {
        let method = Method::from_bytes(b"REPORT")
            .expect("cannot create REPORT method.");

        let res = self.http
            .request(method, self.resource.url().as_str())
            .header("Depth", 1)
            .header(CONTENT_TYPE, "application/xml")
            .basic_auth(self.resource.username(), Some(self.resource.password()))
            .body(TASKS_BODY)
            .send()
            .await?;

        if res.status().is_success() == false {
            return Err(Error::Dav(format!("unexpected HTTP status code {:?}", res.status())));
        }
        let text = res.text().await?;

        let root: Element = text.parse()
            .map_err(|err| Error::Dav(format!("unable to parse REPORT response: {}", err)))?;

        let mut tasks = Vec::new();
        for response in find_elems(&root, "response") {
            let href = match find_elem(response, "href") {
                None => {
                    log::warn!("Unable to extract HREF from a response, ignoring it");
                    continue;
                },
                Some(href) => href.text(),
            };
            let item_url = self.resource.combine(&href).url().clone();

            let calendar_data = match find_elem(response, "calendar-data") {
                None => {
                    log::warn!("No calendar data for item {}, ignoring it", item_url);
                    continue;
                },
                Some(data) => data.text(),
            };

            match crate::ical::parse(&calendar_data, profile, item_url) {
                Ok(task) => tasks.push(task),
                Err(err) => log::warn!("Skipping an unparsable item: {}", err),
            }
        }

        Ok(tasks)
    }

    /// Look a task up by UID, directly on the server.
    ///
    /// This scans the collection rather than any local snapshot, so the
    /// extra round-trip buys an up-to-date answer.
    pub async fn fetch_task(&self, profile: &str, uid: &str) -> Result<Option<Task>> {
        let tasks = self.fetch_tasks(profile).await?;
        Ok(tasks.into_iter().find(|task| task.uid() == uid))
    }

    /// Store a brand new task on the server.
    /// The `If-None-Match` header makes the PUT fail instead of overwriting
    /// in case the UID is somehow taken already.
    pub async fn add_task(&self, task: &Task) -> Result<()> {
        self.put(task, true).await
    }

    /// Overwrite an existing task on the server
    pub async fn update_task(&self, task: &Task) -> Result<()> {
        self.put(task, false).await
    }

    async fn put(&self, task: &Task, new_item: bool) -> Result<()> {
        let ical_text = crate::ical::build_from(task, Utc::now());

        let mut request = self.http
            .put(task.url().clone())
            .header(CONTENT_TYPE, "text/calendar")
            .header(CONTENT_LENGTH, ical_text.len())
            .basic_auth(self.resource.username(), Some(self.resource.password()));
        if new_item {
            request = request.header("If-None-Match", "*");
        }

        let response = request.body(ical_text).send().await?;
        if response.status().is_success() == false {
            return Err(Error::Dav(format!("unexpected HTTP status code {:?}", response.status())));
        }

        Ok(())
    }
}
