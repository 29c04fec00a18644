//! Task-queue registry: queue names, per-queue concurrency policy, and the
//! workflow/activity registration sets each queue hosts.

use thiserror::Error;

pub const QUEUE_ANOMALY: &str = "finops-anomaly";
pub const QUEUE_DETECT: &str = "finops-detect";
pub const QUEUE_EXEC: &str = "finops-exec";

/// Worker options for a single task queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueConfig {
    pub name: &'static str,
    pub max_concurrent_activities: usize,
    pub max_concurrent_workflow_tasks: usize,
    /// Anomaly hosts the lifecycle and sweep workflows plus all activities;
    /// detect hosts scheduled detection; exec hosts activities only (a later
    /// version routes execution activities there from workflow decisions).
    pub hosts_lifecycle: bool,
    pub hosts_sweep: bool,
    pub hosts_detection: bool,
    pub hosts_activities: bool,
}

/// The standard per-queue worker options:
///
///   - anomaly: stateful lifecycle workflows, generous concurrency
///   - detect: read-heavy detection, higher activity concurrency
///   - exec: restricted writes, tight concurrency
pub fn default_configs() -> [QueueConfig; 3] {
    [
        QueueConfig {
            name: QUEUE_ANOMALY,
            max_concurrent_activities: 10,
            max_concurrent_workflow_tasks: 10,
            hosts_lifecycle: true,
            hosts_sweep: true,
            hosts_detection: false,
            hosts_activities: true,
        },
        QueueConfig {
            name: QUEUE_DETECT,
            max_concurrent_activities: 20,
            max_concurrent_workflow_tasks: 5,
            hosts_lifecycle: false,
            hosts_sweep: false,
            hosts_detection: true,
            hosts_activities: true,
        },
        QueueConfig {
            name: QUEUE_EXEC,
            max_concurrent_activities: 3,
            max_concurrent_workflow_tasks: 1,
            hosts_lifecycle: false,
            hosts_sweep: false,
            hosts_detection: false,
            hosts_activities: true,
        },
    ]
}

pub fn config_for(name: &str) -> Option<QueueConfig> {
    default_configs().into_iter().find(|config| config.name == name)
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown queue `{0}`")]
pub struct UnknownQueue(pub String);

/// Parses a comma-separated queue list (e.g. "anomaly,exec") into canonical
/// queue names. Accepts short names ("anomaly") and full names
/// ("finops-anomaly"); duplicates are dropped silently; empty input selects
/// the anomaly queue.
pub fn parse_queues(raw: &str) -> Result<Vec<String>, UnknownQueue> {
    if raw.trim().is_empty() {
        return Ok(vec![QUEUE_ANOMALY.to_string()]);
    }

    let mut selected = Vec::new();
    for part in raw.split(',') {
        let name = part.trim();
        if name.is_empty() {
            continue;
        }
        let full = match name {
            "anomaly" => QUEUE_ANOMALY,
            "detect" => QUEUE_DETECT,
            "exec" => QUEUE_EXEC,
            QUEUE_ANOMALY => QUEUE_ANOMALY,
            QUEUE_DETECT => QUEUE_DETECT,
            QUEUE_EXEC => QUEUE_EXEC,
            other => return Err(UnknownQueue(other.to_string())),
        };
        if !selected.iter().any(|existing| existing == full) {
            selected.push(full.to_string());
        }
    }

    if selected.is_empty() {
        return Ok(vec![QUEUE_ANOMALY.to_string()]);
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::{
        QUEUE_ANOMALY, QUEUE_DETECT, QUEUE_EXEC, UnknownQueue, config_for, default_configs,
        parse_queues,
    };

    #[test]
    fn empty_input_defaults_to_anomaly() {
        assert_eq!(parse_queues("").expect("parse"), vec![QUEUE_ANOMALY]);
        assert_eq!(parse_queues("  ,, ").expect("parse"), vec![QUEUE_ANOMALY]);
    }

    #[test]
    fn short_names_map_to_canonical_names() {
        assert_eq!(
            parse_queues("anomaly,detect,exec").expect("parse"),
            vec![QUEUE_ANOMALY, QUEUE_DETECT, QUEUE_EXEC]
        );
    }

    #[test]
    fn full_names_pass_through() {
        assert_eq!(
            parse_queues("finops-anomaly,finops-exec").expect("parse"),
            vec![QUEUE_ANOMALY, QUEUE_EXEC]
        );
    }

    #[test]
    fn duplicates_are_silently_dropped() {
        assert_eq!(
            parse_queues("anomaly,finops-anomaly,anomaly").expect("parse"),
            vec![QUEUE_ANOMALY]
        );
    }

    #[test]
    fn unknown_names_are_fatal() {
        let error = parse_queues("anomaly,billing").expect_err("unknown queue");
        assert_eq!(error, UnknownQueue("billing".to_string()));
    }

    #[test]
    fn concurrency_policy_matches_queue_roles() {
        let configs = default_configs();

        let anomaly = configs.iter().find(|c| c.name == QUEUE_ANOMALY).expect("anomaly");
        assert_eq!(anomaly.max_concurrent_activities, 10);
        assert_eq!(anomaly.max_concurrent_workflow_tasks, 10);
        assert!(anomaly.hosts_lifecycle && anomaly.hosts_sweep && anomaly.hosts_activities);

        let detect = configs.iter().find(|c| c.name == QUEUE_DETECT).expect("detect");
        assert_eq!(detect.max_concurrent_activities, 20);
        assert_eq!(detect.max_concurrent_workflow_tasks, 5);
        assert!(detect.hosts_detection && !detect.hosts_lifecycle);

        let exec = configs.iter().find(|c| c.name == QUEUE_EXEC).expect("exec");
        assert_eq!(exec.max_concurrent_activities, 3);
        assert_eq!(exec.max_concurrent_workflow_tasks, 1);
        assert!(exec.hosts_activities && !exec.hosts_lifecycle && !exec.hosts_detection);

        assert!(config_for("finops-exec").is_some());
        assert!(config_for("nope").is_none());
    }
}
