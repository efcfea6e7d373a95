use std::collections::HashSet;

use indexmap::IndexMap;
use pan_xml::XmlNode;

use super::records::DeviceRecord;
use super::{DeviceRef, RefreshOptions};
use crate::xpath::DEFAULT_VSYS;

/// A device-group from the configuration view with the records it claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub name: String,
    /// The group's config `<entry>` without its `<devices>` list.
    pub config: XmlNode,
    pub devices: Vec<DeviceRecord>,
}

/// Records split into device-groups and the ones no group claimed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignment {
    pub groups: Vec<GroupRecord>,
    pub ungrouped: Vec<DeviceRecord>,
    pub placeholders: usize,
}

/// Join group membership from the configuration view with the device
/// records and the per-group sync status from the operational view.
pub(crate) fn assign(
    records: Vec<DeviceRecord>,
    config: Option<&XmlNode>,
    status: Option<&XmlNode>,
    opts: &RefreshOptions,
) -> Assignment {
    let known: HashSet<(String, String)> = records.iter().map(DeviceRecord::key).collect();
    let mut unclaimed: IndexMap<(String, String), DeviceRecord> =
        records.into_iter().map(|r| (r.key(), r)).collect();
    let mut assignment = Assignment::default();

    for group_entry in config.into_iter().flat_map(|c| c.entries()) {
        let Some(name) = group_entry.name() else {
            continue;
        };
        let mut group = GroupRecord {
            name: name.to_string(),
            config: group_entry.clone(),
            devices: Vec::new(),
        };
        group.config.children.retain(|c| c.tag != "devices");

        let members = group_entry
            .get_child("devices")
            .map(|d| d.entries().collect::<Vec<_>>())
            .unwrap_or_default();
        for member in members {
            let Some(serial) = member.name() else {
                continue;
            };
            if !serial_requested(&opts.devices, serial) {
                continue;
            }
            let mut joined = member.clone();
            if let Some(live) = group_status(status, name, serial) {
                joined.combine(live);
            }

            if !opts.expand_vsys {
                let key = unclaimed.keys().find(|(s, _)| s == serial).cloned();
                let claimed = key.and_then(|key| unclaimed.shift_remove(&key));
                match claimed {
                    Some(mut record) => {
                        record.shared_policy_status = policy_status(&joined, None);
                        group.devices.push(record);
                    }
                    None if !known.iter().any(|(s, _)| s == serial) && !opts.only_connected => {
                        group.devices.push(DeviceRecord::placeholder(serial, DEFAULT_VSYS));
                        assignment.placeholders += 1;
                    }
                    None => {}
                }
                continue;
            }

            // Per-vsys membership is taken as complete when listed; a member
            // without a vsys list is a single-context device in vsys1.
            let mut member_vsys: Vec<&str> = member
                .get_child("vsys")
                .map(|list| list.entries().filter_map(XmlNode::name).collect())
                .unwrap_or_default();
            if member_vsys.is_empty() {
                member_vsys.push(DEFAULT_VSYS);
            }

            for vsys in member_vsys {
                if !vsys_requested(&opts.devices, serial, vsys) {
                    continue;
                }
                let key = (serial.to_string(), vsys.to_string());
                match unclaimed.shift_remove(&key) {
                    Some(mut record) => {
                        record.shared_policy_status = policy_status(&joined, Some(vsys));
                        group.devices.push(record);
                    }
                    None if !known.contains(&key) && !opts.only_connected => {
                        group.devices.push(DeviceRecord::placeholder(serial, vsys));
                        assignment.placeholders += 1;
                    }
                    None => {}
                }
            }
        }
        assignment.groups.push(group);
    }

    assignment.ungrouped = unclaimed.into_values().collect();
    assignment
}

/// Operational `<entry>` for `serial`, looked up in the same-named group
/// first and then in any group.
fn group_status<'a>(status: Option<&'a XmlNode>, group: &str, serial: &str) -> Option<&'a XmlNode> {
    let status = status?;
    let in_group = |entry: &'a XmlNode| entry.get_child("devices")?.find_entry(serial);
    status
        .find_entry(group)
        .and_then(in_group)
        .or_else(|| status.entries().find_map(in_group))
}

fn policy_status(joined: &XmlNode, vsys: Option<&str>) -> Option<String> {
    joined
        .get_text(&["shared-policy-status"])
        .or_else(|| {
            let vsys = vsys?;
            joined
                .get_child("vsys")?
                .find_entry(vsys)?
                .get_text(&["shared-policy-status"])
        })
        .map(|status| status.trim().to_string())
}

fn serial_requested(requested: &[DeviceRef], serial: &str) -> bool {
    requested.is_empty() || requested.iter().any(|d| d.serial == serial)
}

/// Requests are per serial: a serial requested without a vsys (or for
/// `shared`) includes all of its vsys.
fn vsys_requested(requested: &[DeviceRef], serial: &str, vsys: &str) -> bool {
    let mut for_serial = requested.iter().filter(|d| d.serial == serial).peekable();
    if for_serial.peek().is_none() {
        return requested.is_empty();
    }
    for_serial
        .map(DeviceRef::specific_vsys)
        .any(|wanted| wanted.map_or(true, |w| w == vsys))
}
