//! Hierarchical PAN-OS configuration tree.
//!
//! Configuration objects (interfaces, routers, zones, address objects,
//! device-groups and the devices themselves) are held as nodes of a
//! [`ConfigTree`]. Every node knows where it lives in the device's XML
//! configuration, how to project itself to and from XML, and which
//! collections elsewhere in the configuration must reference it.
//!
//! # Architecture
//!
//! ## Model
//!
//! - [`schema`]: versioned field declarations and typed values
//! - [`kind`]: static description of every entity kind
//! - [`tree`]: arena of nodes with parent links and dirty tracking
//!
//! ## Projection
//!
//! - [`xpath`]: absolute location of a node and of the things it refers to
//! - [`projector`]: node <-> XML element
//!
//! ## Device operations
//!
//! - [`client`]: the [`DeviceApiClient`] boundary
//! - [`sync`]: push, create, remove and refresh through the client
//! - [`reconcile`]: rebuild the managed-device inventory of a controller
//! - [`commit`]: fleet commits and job polling
//!
//! # Workflow
//!
//! ```text
//! tree.add(..) / tree.set(..)      -> nodes become Modified
//! SyncEngine::sync(tree, root)     -> set/edit/delete + membership calls
//! CommitOrchestrator::commit_fleet -> commit-all, poll jobs per target
//! ```

pub mod client;
pub mod commit;
pub mod error;
pub mod kind;
pub mod projector;
pub mod reconcile;
pub mod schema;
pub mod settings;
pub mod sync;
pub mod tree;
pub mod xpath;

pub use client::{ClientError, DeviceApiClient, OpScope};
pub use commit::{
    CommitJob, CommitOrchestrator, CommitRequest, CommitResult, JobStatus, PollSettings,
};
pub use error::{CommitFailure, ConfigError};
pub use kind::EntityKind;
pub use reconcile::{refresh_devices, DeviceRef, RefreshOptions};
pub use schema::{ParamType, Value};
pub use settings::{Settings, SettingsLoadError};
pub use sync::{Membership, SyncEngine};
pub use tree::{ConfigTree, DirtyState, NodeId};
