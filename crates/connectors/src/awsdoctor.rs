//! Waste-scan runner: wraps the aws-doctor CLI as a subprocess, parsing its
//! JSON report into typed findings. The tool is CLI-only (not importable),
//! so we shell out and treat a non-zero exit as a fatal upstream error.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use finops_core::domain::WasteFinding;
use finops_core::errors::ApplicationError;
use finops_core::triage::{FetchResult, WasteFetcher};

/// Parsed JSON output of `aws-doctor --waste --output json`, limited to the
/// sections we map into findings.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct WasteReport {
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub has_waste: bool,
    #[serde(default)]
    pub stopped_instances: Vec<StoppedInstance>,
    #[serde(default)]
    pub unused_ebs_volumes: Vec<EbsVolume>,
    #[serde(default, rename = "stopped_instance_volumes")]
    pub stopped_volumes: Vec<EbsVolume>,
    #[serde(default)]
    pub orphaned_snapshots: Vec<Snapshot>,
    #[serde(default)]
    pub unused_elastic_ips: Vec<ElasticIp>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct StoppedInstance {
    pub instance_id: String,
    #[serde(default)]
    pub days_ago: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EbsVolume {
    pub volume_id: String,
    #[serde(default)]
    pub size_gib: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Snapshot {
    pub snapshot_id: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub max_potential_savings: f64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ElasticIp {
    pub allocation_id: String,
}

// Rough gp3 storage price used when the scanner reports no dollar figure.
const EBS_GIB_MONTHLY: f64 = 0.08;
const ELASTIC_IP_MONTHLY: f64 = 3.60;

/// Converts a scanner report into domain findings. Every finding carries a
/// concrete resource ID and ARN, never free-form text.
pub fn map_waste_findings(report: &WasteReport, account_id: &str, region: &str) -> Vec<WasteFinding> {
    let mut findings = Vec::new();

    for instance in &report.stopped_instances {
        findings.push(WasteFinding {
            resource_type: "EC2".to_string(),
            resource_id: instance.instance_id.clone(),
            resource_arn: format!(
                "arn:aws:ec2:{region}:{account_id}:instance/{}",
                instance.instance_id
            ),
            reason: format!("instance stopped for {} days", instance.days_ago),
            estimated_monthly_savings: 0.0, // scanner gives no per-instance cost
            region: region.to_string(),
        });
    }

    for volume in &report.unused_ebs_volumes {
        findings.push(WasteFinding {
            resource_type: "EBS".to_string(),
            resource_id: volume.volume_id.clone(),
            resource_arn: format!(
                "arn:aws:ec2:{region}:{account_id}:volume/{}",
                volume.volume_id
            ),
            reason: "unattached EBS volume".to_string(),
            estimated_monthly_savings: volume.size_gib as f64 * EBS_GIB_MONTHLY,
            region: region.to_string(),
        });
    }

    for volume in &report.stopped_volumes {
        findings.push(WasteFinding {
            resource_type: "EBS".to_string(),
            resource_id: volume.volume_id.clone(),
            resource_arn: format!(
                "arn:aws:ec2:{region}:{account_id}:volume/{}",
                volume.volume_id
            ),
            reason: "EBS volume attached to stopped instance".to_string(),
            estimated_monthly_savings: volume.size_gib as f64 * EBS_GIB_MONTHLY,
            region: region.to_string(),
        });
    }

    for snapshot in &report.orphaned_snapshots {
        findings.push(WasteFinding {
            resource_type: "Snapshot".to_string(),
            resource_id: snapshot.snapshot_id.clone(),
            resource_arn: format!(
                "arn:aws:ec2:{region}::snapshot/{}",
                snapshot.snapshot_id
            ),
            reason: snapshot.reason.clone(),
            estimated_monthly_savings: snapshot.max_potential_savings,
            region: region.to_string(),
        });
    }

    for eip in &report.unused_elastic_ips {
        findings.push(WasteFinding {
            resource_type: "ElasticIP".to_string(),
            resource_id: eip.allocation_id.clone(),
            resource_arn: format!(
                "arn:aws:ec2:{region}:{account_id}:elastic-ip/{}",
                eip.allocation_id
            ),
            reason: "unassociated Elastic IP".to_string(),
            estimated_monthly_savings: ELASTIC_IP_MONTHLY,
            region: region.to_string(),
        });
    }

    findings
}

/// Shells out to the aws-doctor binary for waste scans.
#[derive(Clone, Debug)]
pub struct BinaryRunner {
    binary_path: PathBuf,
    timeout: Duration,
}

impl BinaryRunner {
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        Self { binary_path: binary_path.into(), timeout: Duration::from_secs(5 * 60) }
    }

    async fn run(&self, args: &[&str]) -> Result<Vec<u8>, ApplicationError> {
        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.binary_path).args(args).output(),
        )
        .await
        .map_err(|_| {
            ApplicationError::Integration(format!(
                "{} timed out after {:?}",
                self.binary_path.display(),
                self.timeout
            ))
        })?
        .map_err(|err| {
            ApplicationError::Integration(format!("spawn {}: {err}", self.binary_path.display()))
        })?;

        if !output.status.success() {
            return Err(ApplicationError::Integration(format!(
                "{} exited with {} (stderr: {})",
                self.binary_path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl WasteFetcher for BinaryRunner {
    async fn waste(
        &self,
        account_id: &str,
        region: &str,
        profile: &str,
    ) -> FetchResult<Vec<WasteFinding>> {
        let mut args = vec!["--waste", "--output", "json"];
        if !profile.is_empty() {
            args.push("--profile");
            args.push(profile);
        }
        if !region.is_empty() {
            args.push("--region");
            args.push(region);
        }

        let stdout = self.run(&args).await?;
        let report: WasteReport = serde_json::from_slice(&stdout).map_err(|err| {
            ApplicationError::Integration(format!("aws-doctor --waste: parse JSON: {err}"))
        })?;
        let account = if report.account_id.is_empty() { account_id } else { &report.account_id };
        Ok(map_waste_findings(&report, account, region))
    }
}

#[cfg(test)]
mod tests {
    use finops_core::triage::WasteFetcher;

    use super::{BinaryRunner, EbsVolume, StoppedInstance, WasteReport, map_waste_findings};

    #[test]
    fn mapping_covers_every_report_section() {
        let report = WasteReport {
            account_id: "123456789012".to_string(),
            has_waste: true,
            stopped_instances: vec![StoppedInstance {
                instance_id: "i-0abc".to_string(),
                days_ago: 45,
            }],
            unused_ebs_volumes: vec![EbsVolume { volume_id: "vol-1".to_string(), size_gib: 50 }],
            stopped_volumes: vec![EbsVolume { volume_id: "vol-2".to_string(), size_gib: 25 }],
            orphaned_snapshots: vec![super::Snapshot {
                snapshot_id: "snap-1".to_string(),
                reason: "volume deleted".to_string(),
                max_potential_savings: 12.5,
            }],
            unused_elastic_ips: vec![super::ElasticIp {
                allocation_id: "eipalloc-1".to_string(),
            }],
        };

        let findings = map_waste_findings(&report, "123456789012", "eu-west-1");
        assert_eq!(findings.len(), 5);

        let ec2 = &findings[0];
        assert_eq!(ec2.resource_type, "EC2");
        assert_eq!(ec2.reason, "instance stopped for 45 days");
        assert_eq!(
            ec2.resource_arn,
            "arn:aws:ec2:eu-west-1:123456789012:instance/i-0abc"
        );

        let unused_vol = &findings[1];
        assert_eq!(unused_vol.estimated_monthly_savings, 4.0);
        let stopped_vol = &findings[2];
        assert_eq!(stopped_vol.estimated_monthly_savings, 2.0);

        // Snapshots are account-less ARNs.
        assert_eq!(findings[3].resource_arn, "arn:aws:ec2:eu-west-1::snapshot/snap-1");
        assert_eq!(findings[4].estimated_monthly_savings, 3.60);
    }

    #[test]
    fn empty_report_maps_to_no_findings() {
        let findings = map_waste_findings(&WasteReport::default(), "123456789012", "us-east-1");
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn missing_binary_is_an_integration_error() {
        let runner = BinaryRunner::new("/nonexistent/aws-doctor");
        let error = runner
            .waste("123456789012", "us-east-1", "")
            .await
            .expect_err("missing binary must fail");
        assert!(error.to_string().contains("spawn"));
    }
}
