//! Icinga 2 REST API adapter.

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    AcknowledgeInfo, Backend, BackendError, DowntimeInfo, HttpSession, ItemRef, SubmitInfo,
    START_END_FORMAT,
};
use crate::config::{MonitorType, ServerConfig};
use crate::model::{format_age, Host, HostMap, ItemFlags, Service, StateType, Status};

#[derive(Debug, Deserialize)]
struct ObjectList<T> {
    #[serde(default)]
    results: Vec<Object<T>>,
}

#[derive(Debug, Deserialize)]
struct Object<T> {
    attrs: T,
}

#[derive(Debug, Default, Deserialize)]
struct CheckResult {
    #[serde(default)]
    output: String,
}

/// Attributes shared by host and service objects.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CheckableAttrs {
    name: String,
    host_name: String,
    address: String,
    state: f64,
    state_type: f64,
    check_attempt: f64,
    max_check_attempts: f64,
    last_check: f64,
    previous_state_change: f64,
    last_check_result: Option<CheckResult>,
    enable_active_checks: bool,
    enable_notifications: bool,
    flapping: bool,
    acknowledgement: f64,
    downtime_depth: f64,
    groups: Vec<String>,
}

impl CheckableAttrs {
    fn attempt(&self) -> String {
        // hard states do not report attempts properly
        let max = self.max_check_attempts as i64;
        if self.state_type > 0.0 {
            format!("{}/{}", max, max)
        } else {
            format!("{}/{}", self.check_attempt as i64, max)
        }
    }

    fn status_type(&self) -> StateType {
        if self.state_type > 0.0 {
            StateType::Hard
        } else {
            StateType::Soft
        }
    }

    fn flags(&self) -> ItemFlags {
        ItemFlags {
            acknowledged: self.acknowledgement > 0.0,
            scheduled_downtime: self.downtime_depth > 0.0,
            notifications_disabled: !self.enable_notifications,
            passive_only: !self.enable_active_checks,
            flapping: self.flapping,
        }
    }

    fn output(&self) -> String {
        match &self.last_check_result {
            Some(r) => r.output.replace('\n', " "),
            None => "UNKNOWN".to_string(),
        }
    }
}

fn host_status(code: f64) -> Status {
    match code as i64 {
        0 => Status::Up,
        1 => Status::Down,
        2 => Status::Unreachable,
        _ => Status::Unknown,
    }
}

fn service_status(code: f64) -> Status {
    match code as i64 {
        0 => Status::Ok,
        1 => Status::Warning,
        2 => Status::Critical,
        _ => Status::Unknown,
    }
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Object type and filter expression addressing a host or service.
fn object_filter(target: &ItemRef) -> (&'static str, String) {
    match &target.service {
        Some(service) => (
            "Service",
            format!(
                "host.name==\"{}\" && service.name==\"{}\"",
                quote(&target.host),
                quote(service)
            ),
        ),
        None => ("Host", format!("host.name==\"{}\"", quote(&target.host))),
    }
}

fn parse_local(value: &str) -> Result<i64, BackendError> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), START_END_FORMAT)
        .map_err(|e| BackendError::Parse(format!("invalid time {:?}: {}", value, e)))?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.timestamp())
        .ok_or_else(|| BackendError::Parse(format!("invalid local time {:?}", value)))
}

pub struct Icinga2Backend {
    name: String,
    url: String,
    session: HttpSession,
}

impl Icinga2Backend {
    pub fn new(cfg: &ServerConfig, session: HttpSession) -> Self {
        Self {
            name: cfg.name.clone(),
            url: cfg.monitor_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    async fn list_objects(
        &self,
        object_type: &str,
        filter: &str,
    ) -> Result<Vec<CheckableAttrs>, BackendError> {
        let url = format!(
            "{}/objects/{}?filter={}",
            self.url,
            object_type,
            urlencoding::encode(filter)
        );
        let value = self.session.get_json(&url).await?;
        let list: ObjectList<CheckableAttrs> =
            serde_json::from_value(value).map_err(|e| BackendError::Parse(e.to_string()))?;
        Ok(list.results.into_iter().map(|o| o.attrs).collect())
    }

    async fn action(&self, name: &str, payload: Value) -> Result<(), BackendError> {
        let url = format!("{}/actions/{}", self.url, name);
        tracing::debug!(server = %self.name, "POST {} {}", url, payload);
        self.session.post_json(&url, payload).await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for Icinga2Backend {
    fn kind(&self) -> MonitorType {
        MonitorType::Icinga2Api
    }

    fn session(&self) -> &HttpSession {
        &self.session
    }

    async fn get_status(&self) -> Result<HostMap, BackendError> {
        let now = Utc::now();
        let mut hosts = HostMap::new();

        for attrs in self.list_objects("hosts", "host.state!=0").await? {
            let host = Host {
                name: attrs.name.clone(),
                address: attrs.address.clone(),
                status: host_status(attrs.state),
                status_type: Some(attrs.status_type()),
                last_check: format_age(attrs.last_check, now),
                duration: format_age(attrs.previous_state_change, now),
                attempt: attrs.attempt(),
                status_information: attrs.output(),
                groups: attrs.groups.join(","),
                flags: attrs.flags(),
                ..Default::default()
            };
            hosts.insert(host.name.clone(), host);
        }

        for attrs in self.list_objects("services", "service.state!=0").await? {
            let service = Service {
                host: attrs.host_name.clone(),
                name: attrs.name.clone(),
                status: service_status(attrs.state),
                status_type: Some(attrs.status_type()),
                last_check: format_age(attrs.last_check, now),
                duration: format_age(attrs.previous_state_change, now),
                attempt: attrs.attempt(),
                status_information: attrs.output(),
                groups: attrs.groups.join(","),
                flags: attrs.flags(),
            };
            // services of healthy hosts need a host entry to live in
            let host = hosts.entry(service.host.clone()).or_insert_with(|| Host {
                name: service.host.clone(),
                ..Default::default()
            });
            host.services.insert(service.name.clone(), service);
        }

        Ok(hosts)
    }

    async fn set_recheck(&self, target: &ItemRef) -> Result<(), BackendError> {
        let (kind, filter) = object_filter(target);
        self.action(
            "reschedule-check",
            json!({"type": kind, "filter": filter, "force": true}),
        )
        .await
    }

    async fn set_acknowledge(&self, info: &AcknowledgeInfo) -> Result<(), BackendError> {
        let mut targets = vec![info.target.clone()];
        targets.extend(info.all_services.iter().map(|s| ItemRef {
            service: Some(s.clone()),
            ..info.target.clone()
        }));

        for target in &targets {
            let (kind, filter) = object_filter(target);
            self.action(
                "acknowledge-problem",
                json!({
                    "type": kind,
                    "filter": filter,
                    "author": info.author,
                    "comment": info.comment,
                    "sticky": info.sticky,
                    "notify": info.notify,
                    "persistent": info.persistent,
                }),
            )
            .await?;
        }
        Ok(())
    }

    async fn set_downtime(&self, info: &DowntimeInfo) -> Result<(), BackendError> {
        let (kind, filter) = object_filter(&info.target);
        let start = parse_local(&info.start_time)?;
        let end = parse_local(&info.end_time)?;
        let duration = u64::from(info.hours) * 3600 + u64::from(info.minutes) * 60;
        self.action(
            "schedule-downtime",
            json!({
                "type": kind,
                "filter": filter,
                "author": info.author,
                "comment": info.comment,
                "start_time": start,
                "end_time": end,
                "fixed": info.fixed,
                "duration": duration,
            }),
        )
        .await
    }

    async fn set_submit_check_result(&self, info: &SubmitInfo) -> Result<(), BackendError> {
        let (kind, filter) = object_filter(&info.target);
        let exit_status = match (info.target.service.is_some(), info.state.as_str()) {
            (false, "up") => 0,
            (false, "down") => 1,
            (false, "unreachable") => 2,
            (true, "ok") => 0,
            (true, "warning") => 1,
            (true, "critical") => 2,
            (true, "unknown") => 3,
            (_, other) => {
                return Err(BackendError::Unsupported(format!(
                    "check result state {:?}",
                    other
                )))
            }
        };
        self.action(
            "process-check-result",
            json!({
                "type": kind,
                "filter": filter,
                "exit_status": exit_status,
                "plugin_output": info.check_output,
                "performance_data": info.performance_data,
            }),
        )
        .await
    }

    fn monitor_url(&self, _target: &ItemRef) -> String {
        // the API has no pages for humans
        self.url.clone()
    }

    fn monitor_webpage(&self) -> String {
        self.url.clone()
    }
}
