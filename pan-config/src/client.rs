//! Boundary to the remote management API.
//!
//! Transport, authentication and retries live behind [`DeviceApiClient`];
//! this crate only decides *what* to send and *where*.

use pan_xml::XmlNode;
use thiserror::Error;

/// Opaque failure raised by a [`DeviceApiClient`] implementation.
///
/// Engines return it unchanged; nothing in this crate retries.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[source] anyhow::Error),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("API error{}: {message}", code_suffix(.code))]
    Api {
        code: Option<String>,
        message: String,
    },
}

fn code_suffix(code: &Option<String>) -> String {
    code.as_deref().map(|c| format!(" {c}")).unwrap_or_default()
}

/// Routing for an operational command, commit, or job query.
///
/// `target` is the serial of a managed device reached through the fleet
/// controller; `None` addresses the connected device itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpScope {
    pub target: Option<String>,
    pub vsys: Option<String>,
}

impl OpScope {
    /// Scope addressing the connected device itself.
    pub fn local() -> Self {
        Self::default()
    }

    /// Scope addressing a managed device by serial.
    pub fn target(serial: impl Into<String>) -> Self {
        Self {
            target: Some(serial.into()),
            vsys: None,
        }
    }
}

/// Remote management API consumed by the sync, reconcile and commit engines.
///
/// Configuration reads return the `<result>` element of the response.
/// `set`/`edit` take the compact serialized element. All calls block.
pub trait DeviceApiClient {
    /// Read candidate configuration at `xpath`.
    fn get(&self, xpath: &str) -> Result<XmlNode, ClientError>;

    /// Read running configuration at `xpath`.
    fn show(&self, xpath: &str) -> Result<XmlNode, ClientError>;

    /// Merge `element` under `xpath`.
    fn set(&self, xpath: &str, element: &str) -> Result<(), ClientError>;

    /// Replace the node at `xpath` with `element`.
    fn edit(&self, xpath: &str, element: &str) -> Result<(), ClientError>;

    /// Delete the node at `xpath`.
    fn delete(&self, xpath: &str) -> Result<(), ClientError>;

    /// Run an operational command and return its `<result>` element.
    fn op(&self, cmd: &str, scope: &OpScope) -> Result<XmlNode, ClientError>;

    /// Submit a commit command. `None` means there was nothing to commit.
    fn commit(&self, cmd: &str, scope: &OpScope) -> Result<Option<u64>, ClientError>;

    /// Fetch the `<job>` element describing an asynchronous job.
    fn job_status(&self, job_id: u64, scope: &OpScope) -> Result<XmlNode, ClientError>;
}

impl<C: DeviceApiClient + ?Sized> DeviceApiClient for &C {
    fn get(&self, xpath: &str) -> Result<XmlNode, ClientError> {
        (**self).get(xpath)
    }

    fn show(&self, xpath: &str) -> Result<XmlNode, ClientError> {
        (**self).show(xpath)
    }

    fn set(&self, xpath: &str, element: &str) -> Result<(), ClientError> {
        (**self).set(xpath, element)
    }

    fn edit(&self, xpath: &str, element: &str) -> Result<(), ClientError> {
        (**self).edit(xpath, element)
    }

    fn delete(&self, xpath: &str) -> Result<(), ClientError> {
        (**self).delete(xpath)
    }

    fn op(&self, cmd: &str, scope: &OpScope) -> Result<XmlNode, ClientError> {
        (**self).op(cmd, scope)
    }

    fn commit(&self, cmd: &str, scope: &OpScope) -> Result<Option<u64>, ClientError> {
        (**self).commit(cmd, scope)
    }

    fn job_status(&self, job_id: u64, scope: &OpScope) -> Result<XmlNode, ClientError> {
        (**self).job_status(job_id, scope)
    }
}
