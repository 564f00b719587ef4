//! Checkmk Multisite adapter using the JSON output of `view.py`.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Method;
use std::collections::HashMap;
use std::sync::OnceLock;

use super::{
    AcknowledgeInfo, Backend, BackendError, DowntimeInfo, HttpSession, ItemRef, RequestBody,
    SubmitInfo,
};
use crate::config::{MonitorType, ServerConfig};
use crate::model::{parse_attempt, Host, HostMap, ItemFlags, Service, StateType, Status};

const FILTER_PARAMS: &str = "&is_host_acknowledged=-1&is_service_acknowledged=-1\
&is_host_notifications_enabled=-1&is_service_notifications_enabled=-1\
&is_host_active_checks_enabled=-1&is_service_active_checks_enabled=-1\
&host_scheduled_downtime_depth=-1&is_in_downtime=-1";

fn transid_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"name="_transid"\s+value="([^"]+)""#).unwrap())
}

fn map_state(state: &str) -> Status {
    match state {
        "UNREACH" => Status::Unreachable,
        "CRIT" => Status::Critical,
        "WARN" => Status::Warning,
        "UNKN" | "PEND" => Status::Unknown,
        other => other.parse().unwrap_or(Status::Unknown),
    }
}

fn looks_like_html(content: &str) -> bool {
    content.trim_start().starts_with('<') || content.contains("<!DOCTYPE html>")
}

fn on(flag: bool) -> String {
    (if flag { "on" } else { "" }).to_string()
}

fn state_type(attempt: &str) -> Option<StateType> {
    parse_attempt(attempt).map(|(cur, max)| {
        if cur != max {
            StateType::Soft
        } else {
            StateType::Hard
        }
    })
}

/// Turn a view table (header row plus data rows) into keyed rows.
fn table_rows(content: &str) -> Result<Vec<HashMap<String, String>>, BackendError> {
    let table: Vec<Vec<serde_json::Value>> =
        serde_json::from_str(content).map_err(|e| BackendError::Parse(e.to_string()))?;
    let mut rows = table.into_iter();
    let Some(header) = rows.next() else {
        return Ok(Vec::new());
    };
    let header: Vec<String> = header
        .iter()
        .map(|v| v.as_str().unwrap_or_default().to_string())
        .collect();

    Ok(rows
        .map(|row| {
            header
                .iter()
                .cloned()
                .zip(row.into_iter().map(|v| match v {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                }))
                .collect()
        })
        .collect())
}

fn field<'a>(row: &'a HashMap<String, String>, key: &str) -> &'a str {
    row.get(key).map(String::as_str).unwrap_or_default()
}

pub struct CheckmkBackend {
    name: String,
    url: String,
    view_hosts: String,
    view_services: String,
    filter_unreachable: bool,
    session: HttpSession,
}

impl CheckmkBackend {
    pub fn new(cfg: &ServerConfig, session: HttpSession) -> Self {
        let mut url = cfg.monitor_url.trim_end_matches('/').to_string();
        if !url.ends_with("/check_mk") {
            url.push_str("/check_mk");
        }
        Self {
            name: cfg.name.clone(),
            url,
            view_hosts: cfg.checkmk_view_hosts.clone(),
            view_services: cfg.checkmk_view_services.clone(),
            filter_unreachable: false,
            session,
        }
    }

    /// Ask the services view to drop services of unreachable hosts.
    pub fn with_unreachable_filter(mut self, enabled: bool) -> Self {
        self.filter_unreachable = enabled;
        self
    }

    fn view_url(&self, view: &str) -> String {
        format!(
            "{}/view.py?view_name={}&output_format=json&lang=&limit=hard",
            self.url, view
        )
    }

    fn action_url(&self, view: &str, transid: &str) -> String {
        format!(
            "{}/view.py?_transid={}&_do_actions=yes&_do_confirm=Yes!&view_name={}&filled_in=actions&lang=",
            self.url, transid, view
        )
    }

    async fn login(&self) -> Result<(), BackendError> {
        let form = vec![
            ("_username".to_string(), self.session.username()),
            ("_password".to_string(), self.session.password()),
            ("_login".to_string(), "1".to_string()),
            ("_origtarget".to_string(), String::new()),
            ("filled_in".to_string(), "login".to_string()),
        ];
        tracing::debug!(server = %self.name, "Logging in to Checkmk");
        self.session
            .send(
                Method::POST,
                &format!("{}/login.py", self.url),
                RequestBody::Multipart(form),
                &[],
                false,
            )
            .await?;
        Ok(())
    }

    /// Fetch a view, logging in once when the site answers with HTML.
    async fn get_view(&self, url: &str) -> Result<Vec<HashMap<String, String>>, BackendError> {
        let mut content = self.session.get(url).await?;

        if looks_like_html(&content) {
            self.login().await?;
            content = self.session.get(url).await?;
            if looks_like_html(&content) {
                self.session.mark_auth_failure(401);
                return Err(BackendError::Unauthorized(401));
            }
        }

        if content.starts_with("ERROR:") {
            return Err(BackendError::Other(content.trim().to_string()));
        }
        if content.starts_with("WARNING:") {
            let (warning, rest) = content.split_once('\n').unwrap_or((content.as_str(), ""));
            tracing::debug!(server = %self.name, "{}", warning);
            return table_rows(rest);
        }

        table_rows(&content)
    }

    async fn action(
        &self,
        target: &ItemRef,
        params: Vec<(&str, String)>,
    ) -> Result<(), BackendError> {
        let transid = self.transid(target).await?;
        let view = if target.service.is_some() {
            "service"
        } else {
            "hoststatus"
        };
        let mut query = vec![
            ("site", target.site.clone()),
            ("host", target.host.clone()),
            ("service", target.service.clone().unwrap_or_default()),
        ];
        query.extend(params);
        let encoded: Vec<String> = query
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        let url = format!("{}&{}", self.action_url(view, &transid), encoded.join("&"));
        tracing::debug!(server = %self.name, host = %target.host, "Submitting action: {}", url);
        self.session.get(&url).await?;
        Ok(())
    }

    fn comment(&self, author: &str, comment: &str) -> String {
        if author == self.session.username() {
            comment.to_string()
        } else {
            format!("{}: {}", author, comment)
        }
    }
}

#[async_trait]
impl Backend for CheckmkBackend {
    fn kind(&self) -> MonitorType {
        MonitorType::CheckmkMultisite
    }

    fn session(&self) -> &HttpSession {
        &self.session
    }

    async fn get_status(&self) -> Result<HostMap, BackendError> {
        let mut hosts = HostMap::new();

        let host_url = format!("{}{}", self.view_url(&self.view_hosts), FILTER_PARAMS);
        for row in self.get_view(&host_url).await? {
            let name = field(&row, "host").to_string();
            let attempt = field(&row, "host_attempt").to_string();
            let host = Host {
                name: name.clone(),
                address: field(&row, "host_address").to_string(),
                site: field(&row, "sitename_plain").to_string(),
                status: map_state(field(&row, "host_state")),
                status_type: state_type(&attempt),
                last_check: field(&row, "host_check_age").to_string(),
                duration: field(&row, "host_state_age").to_string(),
                status_information: field(&row, "host_plugin_output").replace('\n', " "),
                attempt,
                flags: ItemFlags {
                    acknowledged: field(&row, "host_acknowledged") == "yes",
                    scheduled_downtime: field(&row, "host_in_downtime") == "yes",
                    notifications_disabled: field(&row, "host_notifications_enabled") == "no",
                    ..Default::default()
                },
                ..Default::default()
            };
            hosts.entry(name).or_insert(host);
        }

        let mut service_url = format!("{}{}", self.view_url(&self.view_services), FILTER_PARAMS);
        if self.filter_unreachable {
            service_url.push_str("&hst0=On&hst1=On");
        }
        for row in self.get_view(&service_url).await? {
            let host_name = field(&row, "host").to_string();
            let attempt = field(&row, "svc_attempt").to_string();
            let command = field(&row, "svc_check_command");
            let service = Service {
                host: host_name.clone(),
                name: field(&row, "service_description").to_string(),
                site: field(&row, "sitename_plain").to_string(),
                status: map_state(field(&row, "service_state")),
                status_type: state_type(&attempt),
                last_check: field(&row, "svc_check_age").to_string(),
                duration: field(&row, "svc_state_age").to_string(),
                status_information: field(&row, "svc_plugin_output")
                    .replace('\n', " ")
                    .trim()
                    .to_string(),
                attempt,
                groups: String::new(),
                flags: ItemFlags {
                    acknowledged: field(&row, "svc_acknowledged") == "yes",
                    scheduled_downtime: field(&row, "svc_in_downtime") == "yes",
                    notifications_disabled: field(&row, "svc_notifications_enabled") == "no",
                    // passive Checkmk services can still be rescheduled
                    passive_only: field(&row, "svc_is_active") == "no"
                        && !command.starts_with("check_mk"),
                    flapping: field(&row, "svc_flapping") == "yes",
                },
            };

            let host = hosts.entry(host_name.clone()).or_insert_with(|| Host {
                name: host_name.clone(),
                address: field(&row, "host_address").to_string(),
                site: service.site.clone(),
                status: Status::Up,
                ..Default::default()
            });
            if field(&row, "host_in_downtime") == "yes" {
                host.flags.scheduled_downtime = true;
            }
            host.services.entry(service.name.clone()).or_insert(service);
        }

        Ok(hosts)
    }

    async fn set_recheck(&self, target: &ItemRef) -> Result<(), BackendError> {
        self.action(
            target,
            vec![
                ("_resched_checks", "Reschedule active checks".to_string()),
                ("_resched_pread", "0".to_string()),
            ],
        )
        .await
    }

    async fn set_acknowledge(&self, info: &AcknowledgeInfo) -> Result<(), BackendError> {
        let params = vec![
            ("_acknowledge", "Acknowledge".to_string()),
            ("_ack_sticky", on(info.sticky)),
            ("_ack_notify", on(info.notify)),
            ("_ack_persistent", on(info.persistent)),
            ("_ack_comment", self.comment(&info.author, &info.comment)),
        ];
        self.action(&info.target, params.clone()).await?;

        for service in &info.all_services {
            let target = ItemRef {
                service: Some(service.clone()),
                ..info.target.clone()
            };
            self.action(&target, params.clone()).await?;
        }
        Ok(())
    }

    async fn set_downtime(&self, info: &DowntimeInfo) -> Result<(), BackendError> {
        let split = |value: &str| -> Result<(String, String), BackendError> {
            value
                .trim()
                .split_once(' ')
                .map(|(d, t)| (d.to_string(), t.to_string()))
                .ok_or_else(|| BackendError::Parse(format!("invalid time {:?}", value)))
        };
        let (from_date, from_time) = split(&info.start_time)?;
        let (to_date, to_time) = split(&info.end_time)?;

        let mut params = vec![
            ("_down_comment", self.comment(&info.author, &info.comment)),
            ("_down_flexible", on(!info.fixed)),
            ("_down_custom", "Custom+time+range".to_string()),
            ("_down_from_date", from_date),
            ("_down_from_time", from_time),
            ("_down_to_date", to_date),
            ("_down_to_time", to_time),
            ("_down_duration", format!("{}:{}", info.hours, info.minutes)),
            ("actions", "yes".to_string()),
        ];
        if info.target.service.is_some() {
            params.push((
                "_do_confirm_service_downtime",
                "Schedule+downtime+for+1+service".to_string(),
            ));
        }
        self.action(&info.target, params).await
    }

    async fn set_submit_check_result(&self, _info: &SubmitInfo) -> Result<(), BackendError> {
        Err(BackendError::Unsupported(
            "submitting check results to Checkmk".to_string(),
        ))
    }

    fn supports_recheck_all(&self) -> bool {
        true
    }

    async fn recheck_all(&self) -> Result<(), BackendError> {
        let url = format!(
            "{}&_resched_checks={}",
            self.action_url("svcproblems", "-1"),
            urlencoding::encode("Reschedule active checks")
        );
        tracing::debug!(server = %self.name, "Rechecking all: {}", url);
        self.session.get(&url).await?;
        Ok(())
    }

    async fn transid(&self, target: &ItemRef) -> Result<String, BackendError> {
        // Checkmk 2.x wants a service, any existing one will do
        let service = target.service.clone().unwrap_or_else(|| "PING".to_string());
        let url = format!(
            "{}/view.py?actions=yes&filled_in=actions&host={}&service={}&view_name=service",
            self.url,
            urlencoding::encode(&target.host),
            service.replace(' ', "+")
        );
        let page = self.session.get(&url).await?;
        transid_regex()
            .captures(&page)
            .map(|c| c[1].to_string())
            .ok_or_else(|| BackendError::Parse("no _transid in action page".to_string()))
    }

    fn monitor_url(&self, target: &ItemRef) -> String {
        let start = match &target.service {
            Some(service) => format!(
                "view.py?view_name=service&site={}&host={}&service={}",
                target.site, target.host, service
            ),
            None => format!(
                "view.py?view_name=hoststatus&site={}&host={}",
                target.site, target.host
            ),
        };
        format!("{}/index.py?start_url={}", self.url, urlencoding::encode(&start))
    }

    fn monitor_webpage(&self) -> String {
        format!(
            "{}/index.py?start_url={}",
            self.url,
            urlencoding::encode("view.py?view_name=hostproblems")
        )
    }
}
