//! The host-facing plugin surface
//!
//! The host launcher registers two textual triggers and hands every query
//! over; this module turns them into display entries. Each entry carries a
//! set of actions the host can invoke later. Actions are plain value records
//! (see [`Invocation`]) rather than callbacks, so the host hands them back to
//! [`Plugin::invoke`] when the user picks one.

use std::path::Path;
use std::path::PathBuf;
use std::process::Command;

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, Utc};

use crate::cache::{RefreshOutcome, TaskCache};
use crate::config;
use crate::config::Profiles;
use crate::due::{classify, Due, Urgency};
use crate::error::Error;
use crate::registry::Registry;
use crate::task::Task;

/// Trigger prefix for listing and filtering todos
pub const LIST_TRIGGER: &str = "t ";
/// Trigger prefix for composing a new todo
pub const ADD_TRIGGER: &str = "ta ";

const TODO_ICON: &str = "appointment-new";
const ADD_ICON: &str = "add";

/// What the host hands over on every keystroke: the matched trigger and the
/// text typed after it
#[derive(Clone, Debug)]
pub struct HostQuery {
    pub trigger: String,
    pub text: String,
}

impl HostQuery {
    pub fn new<T: ToString, U: ToString>(trigger: T, text: U) -> Self {
        Self { trigger: trigger.to_string(), text: text.to_string() }
    }
}

/// A mutation the host can hand back to [`Plugin::invoke`].
///
/// These are immutable value records binding everything the mutation needs
/// (profile name, task UID, target due timestamp) at the time the entry was
/// built.
#[derive(Clone, Debug, PartialEq)]
pub enum Invocation {
    MarkDone { profile: String, uid: String },
    Reschedule { profile: String, uid: String, due: Due },
    Create { profile: String, summary: String, due: Option<Due> },
    Reload,
}

/// One user-selectable action attached to a display entry
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    /// Launch an external process
    Launch { label: String, command: String, args: Vec<String> },
    /// Copy text to the clipboard
    CopyToClipboard { label: String, text: String },
    /// Hand the invocation back to [`Plugin::invoke`]
    Invoke { label: String, invocation: Invocation },
}

/// One entry in the host's result list
#[derive(Clone, Debug)]
pub struct DisplayItem {
    pub id: String,
    pub title: String,
    pub subtitle: String,
    pub icon: String,
    /// Text the host puts in the input line when the entry is tab-completed
    pub completion: String,
    pub urgency: Urgency,
    pub actions: Vec<Action>,
}

/// The per-session service object: configuration, connections and cache in
/// one place, passed by reference to every query and action handler.
pub struct Plugin {
    config_path: PathBuf,
    profiles: Profiles,
    registry: Registry,
    cache: TaskCache,
}

impl Plugin {
    /// Load the configuration and open the connections.
    ///
    /// A missing configuration file is not an error: a template is written
    /// and opened in the user's editor, and the plugin starts without
    /// profiles (every list query then shows the configuration entry).
    pub async fn initialize(config_path: PathBuf) -> Self {
        let mut plugin = Self {
            config_path,
            profiles: Profiles::new(),
            registry: Registry::default(),
            cache: TaskCache::new(),
        };

        match config::load(&plugin.config_path) {
            Ok(profiles) => plugin.install_profiles(profiles).await,
            Err(Error::ConfigMissing(path)) => bootstrap_config(&path),
            Err(Error::ConfigEmpty(_)) => log::info!("No profiles defined in config yet."),
            Err(err) => log::warn!("Unable to load the configuration: {}", err),
        }

        plugin
    }

    /// Replace the profile set: tear down every connection, rebuild, reload
    async fn install_profiles(&mut self, profiles: Profiles) {
        let (registry, failures) = Registry::connect(&profiles).await;
        for (name, err) in &failures {
            log::warn!("Profile {} failed to connect: {}", name, err);
        }

        self.profiles = profiles;
        self.registry = registry;
        self.cache = TaskCache::new();

        let report = self.cache.reload(&self.registry, Utc::now()).await;
        if report.skipped.is_empty() == false {
            log::warn!("Initial load skipped profiles: {:?}", report.skipped);
        }
    }

    /// Re-read the configuration file, in case the user edited it since the
    /// last query
    async fn reload_config(&mut self) {
        match config::load(&self.config_path) {
            Ok(profiles) => self.install_profiles(profiles).await,
            Err(Error::ConfigMissing(_)) | Err(Error::ConfigEmpty(_)) => {
                log::info!("No sections defined in config.");
            },
            Err(err) => log::warn!("Unable to reload the configuration: {}", err),
        }
    }

    /// Entry point for the host: dispatch on the matched trigger
    pub async fn handle_query(&mut self, query: &HostQuery) -> Vec<DisplayItem> {
        match query.trigger.as_str() {
            LIST_TRIGGER => self.handle_list(&query.text).await,
            ADD_TRIGGER => self.handle_add(&query.text),
            _ => Vec::new(),
        }
    }

    async fn handle_list(&mut self, text: &str) -> Vec<DisplayItem> {
        if self.profiles.is_empty() {
            self.reload_config().await;
            if self.profiles.is_empty() {
                return vec![self.config_item()];
            }
        }

        match self.cache.refresh_if_stale(&self.registry, Utc::now()).await {
            RefreshOutcome::Reloaded(report) if report.skipped.is_empty() == false => {
                log::warn!("Refresh skipped profiles: {:?}", report.skipped);
            },
            _ => (),
        }

        let now = Local::now();
        self.cache.query(text).into_iter()
            .map(|task| item_for_task(task, now))
            .collect()
    }

    fn handle_add(&self, text: &str) -> Vec<DisplayItem> {
        if self.profiles.is_empty() {
            return vec![self.config_item()];
        }

        let now = Local::now();
        let mut actions = Vec::new();
        for name in self.profiles.keys() {
            let create = |label: String, due: Option<Due>| Action::Invoke {
                label,
                invocation: Invocation::Create {
                    profile: name.clone(),
                    summary: text.to_string(),
                    due,
                },
            };
            actions.push(create(format!("Create todo in {}", name), None));
            actions.push(create(format!("Create todo in {} for in one hour", name), Some(one_hour_from(now))));
            actions.push(create(format!("Create todo in {} for tomorrow", name), Some(tomorrow_morning(now))));
            actions.push(create(format!("Create todo in {} for next week", name), Some(next_week_morning(now))));
        }

        vec![DisplayItem {
            id: format!("newtodo-{}", text),
            title: text.to_string(),
            subtitle: "Create a new todo".to_string(),
            icon: ADD_ICON.to_string(),
            completion: format!("{}{}", ADD_TRIGGER, text),
            urgency: Urgency::Low,
            actions,
        }]
    }

    /// Perform the mutation behind an action the user picked.
    ///
    /// Failures degrade rather than propagate: a task that no longer exists
    /// is a logged no-op (and does not force a reload), any other failure is
    /// logged and the stale entry stays visible until the next refresh.
    pub async fn invoke(&mut self, invocation: Invocation) {
        match invocation {
            Invocation::MarkDone { profile, uid } => {
                match self.registry.complete_task(&profile, &uid).await {
                    Ok(()) => self.force_reload().await,
                    Err(Error::TaskNotFound { profile, uid }) => {
                        log::warn!("Cannot mark {}:{} done, it no longer exists", profile, uid);
                    },
                    Err(err) => log::warn!("Marking a todo done failed: {}", err),
                }
            },
            Invocation::Reschedule { profile, uid, due } => {
                match self.registry.reschedule_task(&profile, &uid, due).await {
                    Ok(()) => self.force_reload().await,
                    Err(Error::TaskNotFound { profile, uid }) => {
                        log::warn!("Cannot postpone {}:{}, it no longer exists", profile, uid);
                    },
                    Err(err) => log::warn!("Postponing a todo failed: {}", err),
                }
            },
            Invocation::Create { profile, summary, due } => {
                // The snapshot may lag behind until the next refresh; that
                // inconsistency window is accepted
                if let Err(err) = self.registry.create_task(&profile, summary, due).await {
                    log::warn!("Creating a todo failed: {}", err);
                }
            },
            Invocation::Reload => self.force_reload().await,
        }
    }

    async fn force_reload(&mut self) {
        let report = self.cache.reload(&self.registry, Utc::now()).await;
        if report.skipped.is_empty() == false {
            log::warn!("Reload skipped profiles: {:?}", report.skipped);
        }
    }

    /// The single actionable entry shown while no profile is configured
    fn config_item(&self) -> DisplayItem {
        let path = self.config_path.display().to_string();
        DisplayItem {
            id: "config".to_string(),
            title: "Configuration not complete".to_string(),
            subtitle: "No profiles in the configuration file".to_string(),
            icon: TODO_ICON.to_string(),
            completion: String::new(),
            urgency: Urgency::Low,
            actions: vec![
                Action::Launch {
                    label: "Edit configuration in default editor".to_string(),
                    command: "xdg-open".to_string(),
                    args: vec![path.clone()],
                },
                Action::CopyToClipboard {
                    label: "Copy the path of the configuration file".to_string(),
                    text: path,
                },
            ],
        }
    }
}

/// Write the configuration template and open it in the user's editor.
/// Failures end up on standard output, the host UI never sees them.
fn bootstrap_config(path: &Path) {
    match config::write_template(path) {
        Ok(()) => {
            log::info!("Wrote a configuration template to {:?}", path);
            if let Err(err) = Command::new("xdg-open").arg(path).spawn() {
                println!("There was an error opening the file {:?}: {}", path, err);
            }
        },
        Err(err) => {
            println!("There was an error writing the template: {}", err);
        },
    }
}

fn item_for_task(task: &Task, now: DateTime<Local>) -> DisplayItem {
    let (urgency, label) = classify(task.due(), now);

    DisplayItem {
        id: task.display_id(),
        title: format!("{}: {}", task.profile(), task.summary()),
        subtitle: label,
        icon: TODO_ICON.to_string(),
        completion: format!("{}{}", LIST_TRIGGER, task.summary()),
        urgency,
        actions: task_actions(task, now),
    }
}

fn task_actions(task: &Task, now: DateTime<Local>) -> Vec<Action> {
    let invoke = |label: &str, invocation: Invocation| Action::Invoke {
        label: label.to_string(),
        invocation,
    };
    let reschedule = |due: Due| Invocation::Reschedule {
        profile: task.profile().to_string(),
        uid: task.uid().to_string(),
        due,
    };

    vec![
        invoke("Mark done", Invocation::MarkDone {
            profile: task.profile().to_string(),
            uid: task.uid().to_string(),
        }),
        invoke("Postpone for one hour", reschedule(one_hour_from(now))),
        invoke("Postpone 'till 4 P.M.", reschedule(four_pm_today(now))),
        invoke("Postpone 'till tomorrow", reschedule(tomorrow_morning(now))),
        invoke("Postpone 'till next week", reschedule(next_week_morning(now))),
        invoke("Reload todo's", Invocation::Reload),
    ]
}

fn one_hour_from(now: DateTime<Local>) -> Due {
    Due::from_local(now + Duration::hours(1))
}

fn four_pm_today(now: DateTime<Local>) -> Due {
    due_floating(now.date_naive(), 16)
}

// always 9 AM
fn tomorrow_morning(now: DateTime<Local>) -> Due {
    due_floating((now + Duration::days(1)).date_naive(), 9)
}

// always 9 AM
fn next_week_morning(now: DateTime<Local>) -> Due {
    due_floating((now + Duration::days(7)).date_naive(), 9)
}

fn due_floating(date: NaiveDate, hour: u32) -> Due {
    let time = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    Due::Floating(date.and_time(time))
}


#[cfg(test)]
mod tests {
    use super::*;

    use chrono::TimeZone;
    use url::Url;

    fn test_plugin(profiles: Profiles) -> Plugin {
        let unique = uuid::Uuid::new_v4().to_hyphenated().to_string();
        Plugin {
            config_path: std::env::temp_dir().join(format!("tododav-{}.toml", unique)),
            profiles,
            registry: Registry::default(),
            cache: TaskCache::new(),
        }
    }

    fn profile(url: &str) -> crate::config::Profile {
        toml::from_str(&format!(
            r#"url = "{}"
               username = "user"
               password = "pass""#, url
        )).unwrap()
    }

    fn reference_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2021, 6, 15, 12, 0, 0).unwrap()
    }

    fn overdue_task() -> Task {
        let url: Url = "https://cal.example.com/dav/work/a.ics".parse().unwrap();
        let yesterday = Local.with_ymd_and_hms(2021, 6, 14, 12, 0, 0).unwrap();
        Task::new("Work".to_string(), url, "a".to_string(), "Ship report".to_string(),
                  Some(Due::from_local(yesterday)), false)
    }

    #[test]
    fn an_overdue_task_renders_as_high_urgency() {
        let item = item_for_task(&overdue_task(), reference_now());

        assert_eq!(item.id, "Work:a");
        assert_eq!(item.title, "Work: Ship report");
        assert_eq!(item.urgency, Urgency::High);
        assert!(item.subtitle.contains("overdue"));
        assert_eq!(item.completion, "t Ship report");
    }

    #[test]
    fn task_actions_bind_explicit_values() {
        let now = reference_now();
        let actions = task_actions(&overdue_task(), now);
        assert_eq!(actions.len(), 6);

        match &actions[0] {
            Action::Invoke { label, invocation } => {
                assert_eq!(label, "Mark done");
                assert_eq!(invocation, &Invocation::MarkDone {
                    profile: "Work".to_string(),
                    uid: "a".to_string(),
                });
            },
            other => panic!("expected an Invoke action, got {:?}", other),
        }

        // "Postpone for one hour" is anchored to the time the entry was
        // built, not to the time the user picks it
        match &actions[1] {
            Action::Invoke { invocation: Invocation::Reschedule { due, .. }, .. } => {
                assert_eq!(due, &Due::from_local(now + Duration::hours(1)));
            },
            other => panic!("expected a Reschedule action, got {:?}", other),
        }
    }

    #[test]
    fn postpone_targets_anchor_to_the_right_wall_clock_times() {
        let now = reference_now();

        assert_eq!(four_pm_today(now), Due::Floating(
            NaiveDate::from_ymd_opt(2021, 6, 15).unwrap().and_hms_opt(16, 0, 0).unwrap()));
        assert_eq!(tomorrow_morning(now), Due::Floating(
            NaiveDate::from_ymd_opt(2021, 6, 16).unwrap().and_hms_opt(9, 0, 0).unwrap()));
        assert_eq!(next_week_morning(now), Due::Floating(
            NaiveDate::from_ymd_opt(2021, 6, 22).unwrap().and_hms_opt(9, 0, 0).unwrap()));
    }

    #[tokio::test]
    async fn unknown_triggers_yield_nothing() {
        let mut plugin = test_plugin(Profiles::new());
        let items = plugin.handle_query(&HostQuery::new("x ", "whatever")).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn missing_configuration_surfaces_as_one_actionable_entry() {
        let mut plugin = test_plugin(Profiles::new());
        let items = plugin.handle_query(&HostQuery::new(LIST_TRIGGER, "")).await;

        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.id, "config");
        assert_eq!(item.actions.len(), 2);
        let path = plugin.config_path.display().to_string();
        assert_eq!(item.actions[1], Action::CopyToClipboard {
            label: "Copy the path of the configuration file".to_string(),
            text: path,
        });
    }

    #[tokio::test]
    async fn composing_offers_four_choices_per_profile() {
        let mut profiles = Profiles::new();
        profiles.insert("Home".to_string(), profile("https://cal.example.com/dav/home/"));
        profiles.insert("Work".to_string(), profile("https://cal.example.com/dav/work/"));
        let plugin = test_plugin(profiles);

        let items = plugin.handle_add("Buy Milk");
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.id, "newtodo-Buy Milk");
        assert_eq!(item.subtitle, "Create a new todo");
        assert_eq!(item.actions.len(), 8);

        match &item.actions[0] {
            Action::Invoke { label, invocation } => {
                assert_eq!(label, "Create todo in Home");
                assert_eq!(invocation, &Invocation::Create {
                    profile: "Home".to_string(),
                    summary: "Buy Milk".to_string(),
                    due: None,
                });
            },
            other => panic!("expected an Invoke action, got {:?}", other),
        }
    }
}
