//! This module provides a client to connect to a CalDAV server

use std::convert::TryFrom;

use minidom::Element;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use url::Url;

use crate::calendar::{RemoteCalendar, SupportedComponents};
use crate::error::{Error, Result};
use crate::resource::Resource;
use crate::utils::{find_elem, find_elems};

static DAVCLIENT_BODY: &str = r#"
    <d:propfind xmlns:d="DAV:">
       <d:prop>
           <d:current-user-principal />
       </d:prop>
    </d:propfind>
"#;

static HOMESET_BODY: &str = r#"
    <d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav" >
      <d:self/>
      <d:prop>
        <c:calendar-home-set />
      </d:prop>
    </d:propfind>
"#;

static CAL_BODY: &str = r#"
    <d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav" >
       <d:prop>
         <d:displayname />
         <d:resourcetype />
         <c:supported-calendar-component-set />
       </d:prop>
    </d:propfind>
"#;


/// An open session against one CalDAV server.
///
/// Discovery state (principal URL, calendar home set, the collection list) is
/// fetched lazily and kept for the lifetime of the session; a session lives
/// as long as its profile is unchanged.
pub struct Client {
    resource: Resource,
    http: reqwest::Client,

    principal: Option<Url>,
    calendar_home_set: Option<Url>,
    calendars: Option<Vec<RemoteCalendar>>,
}

impl Client {
    /// Create a client. This does not start a connection
    pub fn new<S: AsRef<str>, T: ToString, U: ToString>(url: S, username: T, password: U) -> Result<Self> {
        let url = Url::parse(url.as_ref())?;

        Ok(Self{
            resource: Resource::new(url, username.to_string(), password.to_string()),
            http: reqwest::Client::new(),
            principal: None,
            calendar_home_set: None,
            calendars: None,
        })
    }

    async fn sub_request(&self, url: &Url, body: String, depth: u32) -> Result<String> {
        let method = Method::from_bytes(b"PROPFIND")
            .expect("cannot create PROPFIND method.");

        let res = self.http
            .request(method, url.as_str())
            .header("Depth", depth)
            .header(CONTENT_TYPE, "application/xml")
            .basic_auth(self.resource.username(), Some(self.resource.password()))
            .body(body)
            .send()
            .await?;

        if res.status().is_success() == false {
            return Err(Error::Dav(format!("unexpected HTTP status code {:?}", res.status())));
        }
        Ok(res.text().await?)
    }

    async fn sub_request_and_process(&self, url: &Url, body: String, items: &[&str]) -> Result<String> {
        let text = self.sub_request(url, body, 0).await?;

        let root: Element = text.parse()
            .map_err(|err| Error::Dav(format!("unable to parse PROPFIND response: {}", err)))?;

        let mut current_element = &root;
        for item in items {
            current_element = find_elem(current_element, *item)
                .ok_or_else(|| Error::Dav(format!("missing <{}> in the response from {}", item, url)))?;
        }

        Ok(current_element.text())
    }

    /// Return the Principal URL, or fetch it from server if not known yet
    async fn get_principal(&mut self) -> Result<Url> {
        if let Some(p) = &self.principal {
            return Ok(p.clone());
        }

        let href = self.sub_request_and_process(self.resource.url(), DAVCLIENT_BODY.into(), &["current-user-principal", "href"]).await?;
        let principal_url = self.resource.combine(&href).url().clone();
        self.principal = Some(principal_url.clone());
        log::debug!("Principal URL is {}", href);

        Ok(principal_url)
    }

    /// Return the Homeset URL, or fetch it from server if not known yet
    async fn get_cal_home_set(&mut self) -> Result<Url> {
        if let Some(h) = &self.calendar_home_set {
            return Ok(h.clone());
        }
        let principal_url = self.get_principal().await?;

        let href = self.sub_request_and_process(&principal_url, HOMESET_BODY.into(), &["calendar-home-set", "href"]).await?;
        let chs_url = self.resource.combine(&href).url().clone();
        self.calendar_home_set = Some(chs_url.clone());
        log::debug!("Calendar home set URL is {:?}", chs_url.path());

        Ok(chs_url)
    }

    /// Return the list of calendar collections, or fetch from server if not known yet
    pub async fn get_calendars(&mut self) -> Result<Vec<RemoteCalendar>> {
        if let Some(c) = &self.calendars {
            return Ok(c.clone());
        }
        let cal_home_set = self.get_cal_home_set().await?;

        let text = self.sub_request(&cal_home_set, CAL_BODY.into(), 1).await?;

        let root: Element = text.parse()
            .map_err(|err| Error::Dav(format!("unable to parse the calendar list: {}", err)))?;
        let reps = find_elems(&root, "response");
        let mut calendars = Vec::new();
        for rep in reps {
            let display_name = find_elem(rep, "displayname").map(|e| e.text()).unwrap_or("<no name>".to_string());
            log::debug!("Considering calendar {}", display_name);

            // We filter out non-calendar items
            let resource_types = match find_elem(rep, "resourcetype") {
                None => continue,
                Some(rt) => rt,
            };
            let mut found_calendar_type = false;
            for resource_type in resource_types.children() {
                if resource_type.name() == "calendar" {
                    found_calendar_type = true;
                    break;
                }
            }
            if found_calendar_type == false {
                continue;
            }

            // We filter out the root calendar collection, that has an empty supported-calendar-component-set
            let el_supported_comps = match find_elem(rep, "supported-calendar-component-set") {
                None => continue,
                Some(comps) => comps,
            };
            if el_supported_comps.children().count() == 0 {
                continue;
            }

            let calendar_href = match find_elem(rep, "href") {
                None => {
                    log::warn!("Calendar {} has no URL! Ignoring it.", display_name);
                    continue;
                },
                Some(h) => h.text(),
            };

            let supported_components = match SupportedComponents::try_from(el_supported_comps.clone()) {
                Err(err) => {
                    log::warn!("Calendar {} has invalid supported components ({})! Ignoring it.", display_name, err);
                    continue;
                },
                Ok(sc) => sc,
            };
            let this_calendar = RemoteCalendar::new(
                display_name,
                self.resource.combine(&calendar_href),
                supported_components,
                self.http.clone(),
            );
            log::info!("Found calendar {}", this_calendar.name());
            calendars.push(this_calendar);
        }

        self.calendars = Some(calendars.clone());
        Ok(calendars)
    }

    /// Find the collection whose canonical URL matches `configured`.
    ///
    /// Returns `None` when no collection matches; task loads for such a
    /// profile simply produce zero tasks.
    pub async fn resolve_collection(&mut self, configured: &Url) -> Result<Option<RemoteCalendar>> {
        let calendars = self.get_calendars().await?;
        for calendar in calendars {
            if crate::utils::urls_match(calendar.url(), configured) {
                if calendar.supports_todos() == false {
                    log::warn!("Collection {} does not announce VTODO support", calendar.url());
                }
                return Ok(Some(calendar));
            }
        }

        log::debug!("No collection matches {}", configured);
        Ok(None)
    }
}
