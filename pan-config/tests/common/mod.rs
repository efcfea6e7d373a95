#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use pan_config::{ClientError, DeviceApiClient, OpScope};
use pan_xml::{parse, XmlNode};

/// One call made against [`MockClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Get(String),
    Show(String),
    Set(String, String),
    Edit(String, String),
    Delete(String),
    Op(String, Option<String>),
    Commit(String),
    JobStatus(u64, Option<String>),
}

impl Call {
    pub fn xpath(&self) -> Option<&str> {
        match self {
            Call::Get(x) | Call::Show(x) | Call::Delete(x) => Some(x),
            Call::Set(x, _) | Call::Edit(x, _) => Some(x),
            _ => None,
        }
    }
}

/// Records every call and answers from scripted responses.
///
/// Reads of unknown xpaths return an empty `<result/>`. Job reports are
/// consumed in order; the last one repeats.
#[derive(Default)]
pub struct MockClient {
    pub calls: RefCell<Vec<Call>>,
    config: HashMap<String, String>,
    running: HashMap<String, String>,
    ops: HashMap<String, String>,
    commit_job: Option<u64>,
    jobs: RefCell<HashMap<(u64, Option<String>), VecDeque<String>>>,
    fail_when: Option<Box<dyn Fn(&Call) -> bool>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, xpath: impl Into<String>, result: &str) -> Self {
        self.config.insert(xpath.into(), result.to_string());
        self
    }

    pub fn with_running(mut self, xpath: impl Into<String>, result: &str) -> Self {
        self.running.insert(xpath.into(), result.to_string());
        self
    }

    pub fn with_op(mut self, cmd: &str, result: &str) -> Self {
        self.ops.insert(cmd.to_string(), result.to_string());
        self
    }

    pub fn with_commit_job(mut self, job_id: u64) -> Self {
        self.commit_job = Some(job_id);
        self
    }

    /// Reports returned for `job_id` polled on `target` (`None` for the
    /// connected device).
    pub fn with_job(self, job_id: u64, target: Option<&str>, reports: &[&str]) -> Self {
        self.jobs.borrow_mut().insert(
            (job_id, target.map(str::to_string)),
            reports.iter().map(|r| r.to_string()).collect(),
        );
        self
    }

    pub fn failing_when(mut self, predicate: impl Fn(&Call) -> bool + 'static) -> Self {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: Call) -> Result<(), ClientError> {
        let fail = self.fail_when.as_ref().is_some_and(|f| f(&call));
        self.calls.borrow_mut().push(call);
        if fail {
            return Err(ClientError::Api {
                code: Some("12".to_string()),
                message: "Object doesn't exist".to_string(),
            });
        }
        Ok(())
    }
}

fn result(raw: Option<&String>) -> XmlNode {
    match raw {
        Some(raw) => parse(raw.as_bytes()).expect("scripted response should parse"),
        None => XmlNode::new("result"),
    }
}

impl DeviceApiClient for MockClient {
    fn get(&self, xpath: &str) -> Result<XmlNode, ClientError> {
        self.record(Call::Get(xpath.to_string()))?;
        Ok(result(self.config.get(xpath)))
    }

    fn show(&self, xpath: &str) -> Result<XmlNode, ClientError> {
        self.record(Call::Show(xpath.to_string()))?;
        Ok(result(self.running.get(xpath)))
    }

    fn set(&self, xpath: &str, element: &str) -> Result<(), ClientError> {
        self.record(Call::Set(xpath.to_string(), element.to_string()))
    }

    fn edit(&self, xpath: &str, element: &str) -> Result<(), ClientError> {
        self.record(Call::Edit(xpath.to_string(), element.to_string()))
    }

    fn delete(&self, xpath: &str) -> Result<(), ClientError> {
        self.record(Call::Delete(xpath.to_string()))
    }

    fn op(&self, cmd: &str, scope: &OpScope) -> Result<XmlNode, ClientError> {
        self.record(Call::Op(cmd.to_string(), scope.target.clone()))?;
        Ok(result(self.ops.get(cmd)))
    }

    fn commit(&self, cmd: &str, _scope: &OpScope) -> Result<Option<u64>, ClientError> {
        self.record(Call::Commit(cmd.to_string()))?;
        Ok(self.commit_job)
    }

    fn job_status(&self, job_id: u64, scope: &OpScope) -> Result<XmlNode, ClientError> {
        self.record(Call::JobStatus(job_id, scope.target.clone()))?;
        let mut jobs = self.jobs.borrow_mut();
        let reports = jobs
            .get_mut(&(job_id, scope.target.clone()))
            .expect("job should be scripted");
        let raw = if reports.len() > 1 {
            reports.pop_front().expect("non-empty")
        } else {
            reports.front().cloned().expect("at least one report")
        };
        Ok(parse(raw.as_bytes()).expect("scripted job should parse"))
    }
}
