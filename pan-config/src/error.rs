use thiserror::Error;

use crate::client::ClientError;
use crate::commit::JobStatus;
use crate::kind::EntityKind;

/// Errors produced by the configuration tree and the engines built on it.
#[derive(Debug, Error)]
pub enum ConfigError {
    // Structural errors. These are programming or input mistakes and are
    // never retried.
    #[error("unknown entity kind: {0}")]
    UnknownEntityKind(String),

    #[error("{child} cannot be a child of {parent}")]
    InvalidChildKind {
        parent: EntityKind,
        child: EntityKind,
    },

    #[error("attaching {child} under {parent} would create a cycle")]
    CycleDetected { parent: String, child: String },

    #[error("{kind} has no field named {field}")]
    UnknownField { kind: EntityKind, field: String },

    #[error("invalid value for {kind}.{field}: {reason}")]
    InvalidValue {
        kind: EntityKind,
        field: String,
        reason: String,
    },

    #[error("{0} requires a name to build its xpath")]
    MissingName(EntityKind),

    #[error("{0} is not attached under any scope root")]
    NoScopeRoot(EntityKind),

    #[error("node {0} is no longer part of the tree")]
    StaleNode(usize),

    // Reconciliation lookups.
    #[error("can't find device with serial {serial}{} attached and connected to {controller}", vsys_suffix(.vsys))]
    DeviceNotConnected {
        serial: String,
        vsys: Option<String>,
        controller: String,
    },

    #[error("can't find device with serial {serial}{} attached to {controller}", vsys_suffix(.vsys))]
    DeviceNotAttached {
        serial: String,
        vsys: Option<String>,
        controller: String,
    },

    #[error("unexpected response for {context}: {reason}")]
    UnexpectedResponse { context: String, reason: String },

    // Only raised when the caller asked for commit errors to be surfaced.
    #[error("commit failed on {}", describe_failures(.failures))]
    CommitFailed { failures: Vec<CommitFailure> },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    XmlParse(#[from] pan_xml::ParseError),

    #[error(transparent)]
    XmlWrite(#[from] pan_xml::WriteError),
}

/// One failed target inside [`ConfigError::CommitFailed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitFailure {
    pub target: String,
    pub status: JobStatus,
    pub messages: Vec<String>,
}

fn vsys_suffix(vsys: &Option<String>) -> String {
    match vsys {
        Some(vsys) => format!(" and vsys {vsys}"),
        None => String::new(),
    }
}

fn describe_failures(failures: &[CommitFailure]) -> String {
    failures
        .iter()
        .map(|f| {
            if f.messages.is_empty() {
                f.target.clone()
            } else {
                format!("{} ({})", f.target, f.messages.join("; "))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::{CommitFailure, ConfigError};
    use crate::commit::JobStatus;

    #[test]
    fn not_attached_message_names_vsys_when_known() {
        let err = ConfigError::DeviceNotAttached {
            serial: "S1".to_string(),
            vsys: Some("vsys3".to_string()),
            controller: "panorama".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "can't find device with serial S1 and vsys vsys3 attached to panorama"
        );
    }

    #[test]
    fn commit_failure_lists_every_target() {
        let err = ConfigError::CommitFailed {
            failures: vec![
                CommitFailure {
                    target: "S2".to_string(),
                    status: JobStatus::Failed,
                    messages: vec!["validation error".to_string()],
                },
                CommitFailure {
                    target: "S3".to_string(),
                    status: JobStatus::Failed,
                    messages: Vec::new(),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "commit failed on S2 (validation error), S3"
        );
    }
}
