// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Typed workload records
//!
//! Raw API objects are deserialized into a narrow wire shape and validated
//! here, so the evaluation code only ever sees well-formed records.

use chrono::{DateTime, Utc};
use k8s_openapi::api::batch::v1 as batch;
use kube::discovery::ApiResource;
use serde::Deserialize;

use super::FetchError;

/// Workload kinds the check knows how to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    CronJob,
    Job,
}

impl WorkloadKind {
    /// Plural resource name, also used in check messages
    pub fn plural(self) -> &'static str {
        match self {
            WorkloadKind::CronJob => "cronjobs",
            WorkloadKind::Job => "jobs",
        }
    }

    /// API resource in the `batch` group at the requested version
    pub fn api_resource(self, version: &str) -> ApiResource {
        let mut ar = match self {
            WorkloadKind::CronJob => ApiResource::erase::<batch::CronJob>(&()),
            WorkloadKind::Job => ApiResource::erase::<batch::Job>(&()),
        };
        ar.version = version.to_string();
        ar.api_version = format!("{}/{}", ar.group, version);
        ar
    }

    /// Convert raw list items into records
    ///
    /// `null` items are dropped. Any item that fails validation rejects the
    /// whole list.
    pub fn parse_items(
        self,
        items: Vec<serde_json::Value>,
    ) -> Result<Vec<ResourceRecord>, FetchError> {
        let mut records = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            if item.is_null() {
                continue;
            }
            let record = self
                .parse_item(item)
                .map_err(|reason| FetchError::InvalidRecord {
                    kind: self.plural(),
                    index,
                    reason,
                })?;
            records.push(record);
        }
        Ok(records)
    }

    fn parse_item(self, item: serde_json::Value) -> Result<ResourceRecord, String> {
        let wire: WireObject = serde_json::from_value(item).map_err(|e| e.to_string())?;
        let spec = wire.spec.unwrap_or_default();
        let status = wire.status.unwrap_or_default();

        let name = wire
            .metadata
            .name
            .filter(|n| !n.is_empty())
            .ok_or("missing metadata.name")?;
        let namespace = wire
            .metadata
            .namespace
            .ok_or_else(|| format!("{}: missing metadata.namespace", name))?;
        let creation_timestamp = wire
            .metadata
            .creation_timestamp
            .ok_or_else(|| format!("{}.{}: missing metadata.creationTimestamp", namespace, name))?;

        let template_node = match self {
            WorkloadKind::CronJob => spec
                .job_template
                .and_then(|t| t.spec)
                .and_then(|s| s.template)
                .and_then(WirePodTemplate::node_name),
            WorkloadKind::Job => spec.template.and_then(WirePodTemplate::node_name),
        };
        let node_name = spec.node_name.or(template_node);

        let schedule = match self {
            WorkloadKind::CronJob => Some(
                spec.schedule
                    .ok_or_else(|| format!("{}.{}: missing spec.schedule", namespace, name))?,
            ),
            WorkloadKind::Job => None,
        };

        Ok(ResourceRecord {
            name,
            namespace,
            node_name,
            schedule,
            last_schedule_time: status.last_schedule_time,
            creation_timestamp,
            failed_count: status.failed.unwrap_or(0),
        })
    }
}

/// One fetched CronJob or Job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: String,
    pub namespace: String,
    /// Node the workload is pinned to, if any
    pub node_name: Option<String>,
    /// Cron expression (CronJobs only)
    pub schedule: Option<String>,
    /// Last time the controller started a run; `None` until the first run
    pub last_schedule_time: Option<DateTime<Utc>>,
    pub creation_timestamp: DateTime<Utc>,
    /// `status.failed` (Jobs only)
    pub failed_count: i32,
}

impl ResourceRecord {
    /// `namespace.name`, as used in check messages
    pub fn identifier(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireObject {
    #[serde(default)]
    metadata: WireMetadata,
    spec: Option<WireSpec>,
    status: Option<WireStatus>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMetadata {
    name: Option<String>,
    namespace: Option<String>,
    creation_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSpec {
    schedule: Option<String>,
    node_name: Option<String>,
    template: Option<WirePodTemplate>,
    job_template: Option<WireJobTemplate>,
}

#[derive(Debug, Default, Deserialize)]
struct WireJobTemplate {
    spec: Option<WireJobSpec>,
}

#[derive(Debug, Default, Deserialize)]
struct WireJobSpec {
    template: Option<WirePodTemplate>,
}

#[derive(Debug, Default, Deserialize)]
struct WirePodTemplate {
    spec: Option<WirePodSpec>,
}

impl WirePodTemplate {
    fn node_name(self) -> Option<String> {
        self.spec.and_then(|s| s.node_name)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePodSpec {
    node_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireStatus {
    last_schedule_time: Option<DateTime<Utc>>,
    failed: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn cronjob_json() -> serde_json::Value {
        json!({
            "apiVersion": "batch/v1",
            "kind": "CronJob",
            "metadata": {
                "name": "nightly",
                "namespace": "batch",
                "creationTimestamp": "2024-01-01T00:00:00Z",
                "labels": {"app": "backup"}
            },
            "spec": {
                "schedule": "0 2 * * *",
                "jobTemplate": {
                    "spec": {
                        "template": {
                            "spec": {"nodeName": "node-7", "containers": []}
                        }
                    }
                }
            },
            "status": {"lastScheduleTime": "2024-03-15T02:00:00Z"}
        })
    }

    #[test]
    fn test_parse_cronjob() {
        let records = WorkloadKind::CronJob
            .parse_items(vec![cronjob_json()])
            .unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.name, "nightly");
        assert_eq!(record.namespace, "batch");
        assert_eq!(record.identifier(), "batch.nightly");
        assert_eq!(record.schedule.as_deref(), Some("0 2 * * *"));
        assert_eq!(record.node_name.as_deref(), Some("node-7"));
        assert_eq!(
            record.last_schedule_time,
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 2, 0, 0).unwrap())
        );
        assert_eq!(record.failed_count, 0);
    }

    #[test]
    fn test_parse_cronjob_never_run() {
        let mut value = cronjob_json();
        value["status"] = json!({});
        let records = WorkloadKind::CronJob.parse_items(vec![value]).unwrap();
        assert!(records[0].last_schedule_time.is_none());
    }

    #[test]
    fn test_parse_cronjob_without_schedule_is_rejected() {
        let mut value = cronjob_json();
        value["spec"]
            .as_object_mut()
            .unwrap()
            .remove("schedule");

        let err = WorkloadKind::CronJob.parse_items(vec![value]).unwrap_err();
        assert!(err.to_string().contains("missing spec.schedule"));
    }

    #[test]
    fn test_parse_job() {
        let value = json!({
            "metadata": {
                "name": "migrate",
                "namespace": "prod",
                "creationTimestamp": "2024-03-15T08:00:00Z"
            },
            "spec": {"template": {"spec": {"nodeName": "node-1"}}},
            "status": {"failed": 1}
        });

        let records = WorkloadKind::Job.parse_items(vec![value]).unwrap();
        let record = &records[0];
        assert_eq!(record.failed_count, 1);
        assert_eq!(record.node_name.as_deref(), Some("node-1"));
        assert!(record.schedule.is_none());
    }

    #[test]
    fn test_spec_node_name_takes_precedence() {
        let value = json!({
            "metadata": {
                "name": "migrate",
                "namespace": "prod",
                "creationTimestamp": "2024-03-15T08:00:00Z"
            },
            "spec": {
                "nodeName": "node-2",
                "template": {"spec": {"nodeName": "node-1"}}
            }
        });

        let records = WorkloadKind::Job.parse_items(vec![value]).unwrap();
        assert_eq!(records[0].node_name.as_deref(), Some("node-2"));
        assert_eq!(records[0].failed_count, 0);
    }

    #[test]
    fn test_null_items_are_dropped() {
        let records = WorkloadKind::CronJob
            .parse_items(vec![serde_json::Value::Null, cronjob_json()])
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let value = json!({"metadata": {"namespace": "prod"}});
        let err = WorkloadKind::Job.parse_items(vec![value]).unwrap_err();
        match err {
            FetchError::InvalidRecord { kind, index, reason } => {
                assert_eq!(kind, "jobs");
                assert_eq!(index, 0);
                assert!(reason.contains("metadata.name"));
            }
            other => panic!("Expected InvalidRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_timestamp_is_rejected() {
        let mut value = cronjob_json();
        value["status"]["lastScheduleTime"] = json!("yesterday");
        assert!(WorkloadKind::CronJob.parse_items(vec![value]).is_err());
    }

    #[test]
    fn test_api_resource_version_override() {
        let ar = WorkloadKind::CronJob.api_resource("v1beta1");
        assert_eq!(ar.group, "batch");
        assert_eq!(ar.kind, "CronJob");
        assert_eq!(ar.plural, "cronjobs");
        assert_eq!(ar.api_version, "batch/v1beta1");

        let ar = WorkloadKind::Job.api_resource("v1");
        assert_eq!(ar.api_version, "batch/v1");
        assert_eq!(ar.plural, "jobs");
    }
}
