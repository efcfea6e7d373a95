//! Device and device-group refresh for a fleet controller.
//!
//! A refresh reads two independent views and joins them:
//!
//! - the operational view (`show devices`, `show devicegroups`): live
//!   inventory keyed by serial, with per-vsys entries and sync status
//! - the configuration view (`.../device-group`): declared group
//!   membership keyed by serial and optionally by vsys
//!
//! The two reads are not a consistent snapshot. Drift between them is
//! resolved by the join rules (placeholders, ungrouped records) and is not
//! an error.

use pan_xml::XmlNode;
use tracing::{debug, info};

use crate::client::{DeviceApiClient, OpScope};
use crate::error::ConfigError;
use crate::kind::EntityKind;
use crate::projector;
use crate::tree::{ConfigTree, NodeId};
use crate::xpath::{DEVICE_ROOT, SHARED};

mod groups;
mod records;

#[cfg(test)]
mod tests;

pub use groups::{Assignment, GroupRecord};
pub use records::DeviceRecord;

/// A device requested for refresh, optionally narrowed to one vsys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRef {
    pub serial: String,
    pub vsys: Option<String>,
}

impl DeviceRef {
    pub fn serial(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            vsys: None,
        }
    }

    pub fn with_vsys(serial: impl Into<String>, vsys: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            vsys: Some(vsys.into()),
        }
    }

    /// The vsys this request is narrowed to; `shared` means all of them.
    pub fn specific_vsys(&self) -> Option<&str> {
        self.vsys.as_deref().filter(|v| *v != SHARED)
    }
}

impl From<&str> for DeviceRef {
    fn from(serial: &str) -> Self {
        Self::serial(serial)
    }
}

/// Options for [`refresh_devices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOptions {
    /// Limit the refresh to these devices. Empty means all.
    pub devices: Vec<DeviceRef>,
    /// Ask for connected devices only, and skip group members that are
    /// not among them.
    pub only_connected: bool,
    /// One record per vsys instead of one per device.
    pub expand_vsys: bool,
    /// Read device-groups and move their members under them.
    pub include_device_groups: bool,
    /// Read the device-group view from the running configuration.
    pub running_config: bool,
    /// Merge the result into the controller node of the tree.
    pub add: bool,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            only_connected: false,
            expand_vsys: true,
            include_device_groups: true,
            running_config: false,
            add: false,
        }
    }
}

/// Raw inputs of a refresh as returned by the device.
#[derive(Debug, Clone, Default)]
pub struct RemoteViews {
    /// `<devices>` from `show devices all|connected`.
    pub devices: XmlNode,
    /// `<device-group>` from the configuration; `None` when no group is
    /// configured.
    pub device_groups: Option<XmlNode>,
    /// `<devicegroups>` from `show devicegroups`.
    pub group_status: Option<XmlNode>,
}

/// Join the two views into device records and device-groups.
///
/// Fails only when a requested device (or requested vsys) is missing from
/// the operational view.
pub fn reconcile(
    views: &RemoteViews,
    opts: &RefreshOptions,
    controller: &str,
) -> Result<Assignment, ConfigError> {
    let entries =
        records::select_devices(&views.devices, &opts.devices, opts.only_connected, controller)?;
    let records = records::device_records(&entries, opts.expand_vsys);
    debug!(devices = entries.len(), records = records.len(), "device records built");

    if !opts.include_device_groups {
        return Ok(Assignment {
            ungrouped: records,
            ..Assignment::default()
        });
    }
    Ok(groups::assign(
        records,
        views.device_groups.as_ref(),
        views.group_status.as_ref(),
        opts,
    ))
}

/// Read both views through `client`, reconcile them and materialize the
/// result under the controller node `panorama`.
///
/// Returns the ungrouped device nodes followed by the device-group nodes.
pub fn refresh_devices<C: DeviceApiClient>(
    client: &C,
    tree: &mut ConfigTree,
    panorama: NodeId,
    opts: &RefreshOptions,
) -> Result<Vec<NodeId>, ConfigError> {
    let controller = tree
        .node(panorama)?
        .name()
        .unwrap_or("panorama")
        .to_string();

    let cmd = if opts.only_connected {
        "show devices connected"
    } else {
        "show devices all"
    };
    debug!(cmd, "op");
    let result = client.op(cmd, &OpScope::local())?;
    let devices = result
        .get_child("devices")
        .cloned()
        .ok_or_else(|| ConfigError::UnexpectedResponse {
            context: cmd.to_string(),
            reason: "no <devices> element".to_string(),
        })?;

    let mut views = RemoteViews {
        devices,
        ..RemoteViews::default()
    };
    if opts.include_device_groups {
        let path = format!("{DEVICE_ROOT}/device-group");
        debug!(xpath = %path, running = opts.running_config, "read device-groups");
        let config = if opts.running_config {
            client.show(&path)?
        } else {
            client.get(&path)?
        };
        views.device_groups = config.get_child("device-group").cloned();

        debug!(cmd = "show devicegroups", "op");
        let status = client.op("show devicegroups", &OpScope::local())?;
        views.group_status = status.get_child("devicegroups").cloned();
    }

    let assignment = reconcile(&views, opts, &controller)?;
    info!(
        groups = assignment.groups.len(),
        grouped = assignment.groups.iter().map(|g| g.devices.len()).sum::<usize>(),
        ungrouped = assignment.ungrouped.len(),
        placeholders = assignment.placeholders,
        "device refresh reconciled"
    );
    materialize(tree, panorama, assignment, opts.add)
}

/// Turn an [`Assignment`] into Clean tree nodes.
///
/// Without `add` the nodes are left detached. With `add`, an existing
/// device-group of the same name keeps its other children and has its
/// device nodes replaced; new groups are attached under `panorama`, and
/// the controller's own device nodes are replaced by the ungrouped ones.
pub fn materialize(
    tree: &mut ConfigTree,
    panorama: NodeId,
    assignment: Assignment,
    add: bool,
) -> Result<Vec<NodeId>, ConfigError> {
    let mut group_ids = Vec::new();
    for group in &assignment.groups {
        let existing = if add {
            tree.find_child(panorama, EntityKind::DeviceGroup, &group.name)
        } else {
            None
        };
        let group_id = match existing {
            Some(id) => {
                for old in tree.children_of_kind(id, EntityKind::Firewall) {
                    tree.remove_subtree(old)?;
                }
                id
            }
            None => {
                let id = projector::build(tree, None, EntityKind::DeviceGroup, &group.config)?;
                if add {
                    tree.attach(id, panorama)?;
                    tree.mark_clean(id)?;
                }
                id
            }
        };
        for record in &group.devices {
            let device = device_node(tree, record)?;
            tree.attach(device, group_id)?;
            tree.mark_clean(device)?;
        }
        group_ids.push(group_id);
    }

    if add {
        for old in tree.children_of_kind(panorama, EntityKind::Firewall) {
            tree.remove_subtree(old)?;
        }
    }
    let mut ids = Vec::new();
    for record in &assignment.ungrouped {
        let device = device_node(tree, record)?;
        if add {
            tree.attach(device, panorama)?;
            tree.mark_clean(device)?;
        }
        ids.push(device);
    }
    ids.extend(group_ids);
    Ok(ids)
}

/// Clean, detached firewall node for a device record.
fn device_node(tree: &mut ConfigTree, record: &DeviceRecord) -> Result<NodeId, ConfigError> {
    let id = tree.insert(EntityKind::Firewall, Some(&record.serial));
    if let Some(status) = &record.status {
        projector::deserialize(tree, id, status)?;
    }
    tree.set(id, "vsys", record.vsys.as_str())?;
    if let Some(name) = &record.vsys_name {
        tree.set(id, "vsys_name", name.as_str())?;
    }
    if let Some(status) = &record.shared_policy_status {
        tree.set(id, "shared_policy_status", status.as_str())?;
    }
    tree.mark_clean(id)?;
    Ok(id)
}
