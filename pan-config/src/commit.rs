//! Fleet-wide commits and job polling.
//!
//! The polling loop is the only place this crate waits. A target that does
//! not finish within the timeout is reported as [`JobStatus::TimedOut`] and
//! is not polled again.

use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use pan_xml::XmlNode;
use tracing::{debug, info, warn};

use crate::client::{DeviceApiClient, OpScope};
use crate::error::{CommitFailure, ConfigError};

/// Target name of the job submitted to the controller itself.
pub const CONTROLLER_TARGET: &str = "controller";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::Pending)
    }
}

/// One asynchronous commit on one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitJob {
    pub target: String,
    pub job_id: u64,
    pub submitted_at: DateTime<Utc>,
    pub status: JobStatus,
    /// `details/line` text of the last job report.
    pub messages: Vec<String>,
}

impl CommitJob {
    fn pending(target: impl Into<String>, job_id: u64, submitted_at: DateTime<Utc>) -> Self {
        Self {
            target: target.into(),
            job_id,
            submitted_at,
            status: JobStatus::Pending,
            messages: Vec::new(),
        }
    }
}

/// What to commit and how long to wait for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitRequest {
    /// Limit the commit to one device-group.
    pub devicegroup: Option<String>,
    /// Limit the device-group commit to these serials.
    pub serials: Vec<String>,
    /// Commit command sent instead of the generated `<commit-all>`.
    pub cmd: Option<XmlNode>,
    /// Wait for the controller job.
    pub sync: bool,
    /// Also wait for the job on every target. Implies `sync`.
    pub sync_all: bool,
    /// Fail with [`ConfigError::CommitFailed`] when any job failed.
    pub exception: bool,
}

/// Poll cadence for job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Outcome of [`CommitOrchestrator::commit_fleet`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitResult {
    /// The controller job; `None` when there was nothing to commit.
    pub job: Option<CommitJob>,
    /// Per-target jobs keyed by serial, filled when waiting on targets.
    pub targets: BTreeMap<String, CommitJob>,
}

impl CommitResult {
    pub fn statuses(&self) -> BTreeMap<&str, JobStatus> {
        self.targets
            .iter()
            .map(|(target, job)| (target.as_str(), job.status))
            .collect()
    }

    fn failures(&self) -> Vec<CommitFailure> {
        self.job
            .iter()
            .chain(self.targets.values())
            .filter(|job| job.status == JobStatus::Failed)
            .map(|job| CommitFailure {
                target: job.target.clone(),
                status: job.status,
                messages: job.messages.clone(),
            })
            .collect()
    }
}

/// `<commit-all>` scoped to a device-group and, within it, to serials.
pub fn commit_all_command(devicegroup: Option<&str>, serials: &[String]) -> XmlNode {
    let mut cmd = XmlNode::new("commit-all");
    let Some(devicegroup) = devicegroup else {
        return cmd;
    };
    let mut entry = XmlNode::entry(devicegroup);
    if !serials.is_empty() {
        let mut devices = XmlNode::new("devices");
        devices.children.extend(serials.iter().map(XmlNode::entry));
        entry.children.push(devices);
    }
    let mut group = XmlNode::new("device-group");
    group.children.push(entry);
    let mut policy = XmlNode::new("shared-policy");
    policy.children.push(group);
    cmd.children.push(policy);
    cmd
}

/// Status and messages of a `<job>` report.
pub fn parse_job(report: &XmlNode) -> (JobStatus, Vec<String>) {
    let job = job_element(report);
    let status = match (
        job.get_text(&["status"]).map(str::trim),
        job.get_text(&["result"]).map(str::trim),
    ) {
        (Some("FIN"), Some("OK")) => JobStatus::Succeeded,
        (Some("FIN"), _) => JobStatus::Failed,
        _ => JobStatus::Pending,
    };
    let messages = job
        .get_child("details")
        .map(|details| {
            details
                .get_children("line")
                .into_iter()
                .filter_map(|line| line.text.as_deref())
                .map(|text| text.trim().to_string())
                .collect()
        })
        .unwrap_or_default();
    (status, messages)
}

/// `(serial, job id)` of every device listed in a commit-all job report.
pub fn device_jobs(report: &XmlNode) -> Vec<(String, Option<u64>)> {
    let Some(devices) = job_element(report).get_child("devices") else {
        return Vec::new();
    };
    devices
        .entries()
        .filter_map(|entry| {
            let serial = entry
                .get_text(&["serial-no"])
                .or_else(|| entry.name())?
                .trim()
                .to_string();
            let job_id = entry
                .get_text(&["job-id"])
                .and_then(|id| id.trim().parse().ok());
            Some((serial, job_id))
        })
        .collect()
}

fn job_element(report: &XmlNode) -> &XmlNode {
    if report.tag == "job" {
        return report;
    }
    report.get_child("job").unwrap_or(report)
}

/// Submits commits through a [`DeviceApiClient`] and waits on their jobs.
#[derive(Debug)]
pub struct CommitOrchestrator<C> {
    client: C,
    poll: PollSettings,
}

impl<C: DeviceApiClient> CommitOrchestrator<C> {
    pub fn new(client: C, poll: PollSettings) -> Self {
        Self { client, poll }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Submit one commit and, when asked, wait on the controller job and
    /// then on each target.
    ///
    /// A failed target never stops the others from being polled. Failures
    /// are only raised, all together, when `request.exception` is set.
    pub fn commit_fleet(&self, request: &CommitRequest) -> Result<CommitResult, ConfigError> {
        let cmd = match &request.cmd {
            Some(cmd) => cmd.clone(),
            None => commit_all_command(request.devicegroup.as_deref(), &request.serials),
        };
        let cmd = pan_xml::to_string(&cmd)?;
        let scope = OpScope::local();

        info!(devicegroup = ?request.devicegroup, serials = request.serials.len(), "submitting commit");
        let submitted_at = Utc::now();
        let Some(job_id) = self.client.commit(&cmd, &scope)? else {
            info!("nothing to commit");
            return Ok(CommitResult::default());
        };
        let mut controller = CommitJob::pending(CONTROLLER_TARGET, job_id, submitted_at);
        if !(request.sync || request.sync_all) {
            return Ok(CommitResult {
                job: Some(controller),
                targets: BTreeMap::new(),
            });
        }

        let report = self.wait(&mut controller, &scope)?;
        let controller_ok = controller.status == JobStatus::Succeeded;
        let mut result = CommitResult {
            job: Some(controller),
            targets: BTreeMap::new(),
        };

        if request.sync_all && controller_ok {
            let mut targets = device_jobs(&report);
            if targets.is_empty() {
                targets = request.serials.iter().map(|s| (s.clone(), None)).collect();
            }
            for (serial, target_job) in targets {
                let mut job = CommitJob::pending(
                    serial.as_str(),
                    target_job.unwrap_or(job_id),
                    Utc::now(),
                );
                self.wait(&mut job, &OpScope::target(serial.as_str()))?;
                result.targets.insert(serial, job);
            }
        }

        if request.exception {
            let failures = result.failures();
            if !failures.is_empty() {
                return Err(ConfigError::CommitFailed { failures });
            }
        }
        Ok(result)
    }

    /// Poll until `job` is terminal or the timeout elapses. Returns the
    /// last report.
    fn wait(&self, job: &mut CommitJob, scope: &OpScope) -> Result<XmlNode, ConfigError> {
        let started = Instant::now();
        loop {
            let report = self.client.job_status(job.job_id, scope)?;
            let (status, messages) = parse_job(&report);
            job.status = status;
            job.messages = messages;
            debug!(device = %job.target, job_id = job.job_id, status = ?status, "job status");

            if status.is_terminal() {
                return Ok(report);
            }
            if started.elapsed() >= self.poll.timeout {
                job.status = JobStatus::TimedOut;
                warn!(device = %job.target, job_id = job.job_id, "gave up waiting for job");
                return Ok(report);
            }
            thread::sleep(self.poll.interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use pan_xml::{parse, to_string};
    use pretty_assertions::assert_eq;

    use super::{commit_all_command, device_jobs, parse_job, JobStatus};

    #[test]
    fn commit_all_is_scoped_to_group_and_serials() {
        let cmd = commit_all_command(Some("DG1"), &["S1".to_string(), "S2".to_string()]);
        assert_eq!(
            to_string(&cmd).expect("write"),
            r#"<commit-all><shared-policy><device-group><entry name="DG1"><devices><entry name="S1"/><entry name="S2"/></devices></entry></device-group></shared-policy></commit-all>"#
        );
        assert_eq!(
            to_string(&commit_all_command(None, &["S1".to_string()])).expect("write"),
            "<commit-all/>"
        );
    }

    #[test]
    fn job_report_maps_to_status() {
        let finished = parse(
            br#"<job><status>FIN</status><result>FAIL</result>
                <details><line>rule r1 invalid</line><line>commit failed</line></details></job>"#,
        )
        .expect("parse");
        assert_eq!(
            parse_job(&finished),
            (
                JobStatus::Failed,
                vec!["rule r1 invalid".to_string(), "commit failed".to_string()]
            )
        );

        let wrapped =
            parse(br#"<result><job><status>FIN</status><result>OK</result></job></result>"#)
                .expect("parse");
        assert_eq!(parse_job(&wrapped).0, JobStatus::Succeeded);

        let running = parse(br#"<job><status>ACT</status><result>PEND</result></job>"#)
            .expect("parse");
        assert_eq!(parse_job(&running).0, JobStatus::Pending);
    }

    #[test]
    fn device_jobs_fall_back_to_missing_ids() {
        let report = parse(
            br#"<job><status>FIN</status><result>OK</result><devices>
                  <entry><serial-no>S1</serial-no><job-id>41</job-id></entry>
                  <entry name="S2"/>
                </devices></job>"#,
        )
        .expect("parse");
        assert_eq!(
            device_jobs(&report),
            vec![("S1".to_string(), Some(41)), ("S2".to_string(), None)]
        );
    }
}
