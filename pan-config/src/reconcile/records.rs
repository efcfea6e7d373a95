use pan_xml::XmlNode;

use super::DeviceRef;
use crate::error::ConfigError;
use crate::xpath::{DEFAULT_VSYS, SHARED};

/// One managed device context found during a refresh.
///
/// Keyed by `(serial, vsys)`. Placeholders for devices a group references
/// but the operational view does not list carry no status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub serial: String,
    pub vsys: String,
    pub vsys_name: Option<String>,
    /// The operational `<entry>` for the device, without its vsys list.
    pub status: Option<XmlNode>,
    pub shared_policy_status: Option<String>,
}

impl DeviceRecord {
    pub fn placeholder(serial: &str, vsys: &str) -> Self {
        Self {
            serial: serial.to_string(),
            vsys: vsys.to_string(),
            vsys_name: None,
            status: None,
            shared_policy_status: None,
        }
    }

    pub fn key(&self) -> (String, String) {
        (self.serial.clone(), self.vsys.clone())
    }

    pub fn is_placeholder(&self) -> bool {
        self.status.is_none()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.status.as_ref()?.get_text(&["hostname"])
    }

    pub fn connected(&self) -> bool {
        self.status
            .as_ref()
            .and_then(|s| s.get_text(&["connected"]))
            == Some("yes")
    }
}

/// Device entries limited to the requested devices.
///
/// A request naming a vsys keeps only the requested vsys entries of that
/// device; a request without one (or for `shared`) keeps them all.
pub(crate) fn select_devices(
    devices: &XmlNode,
    requested: &[DeviceRef],
    only_connected: bool,
    controller: &str,
) -> Result<Vec<XmlNode>, ConfigError> {
    if requested.is_empty() {
        return Ok(devices.entries().cloned().collect());
    }

    let mut selected: Vec<XmlNode> = Vec::new();
    let mut whole: Vec<&str> = Vec::new();
    for device in requested {
        let serial = device.serial.as_str();
        let entry = devices.find_entry(serial).ok_or_else(|| {
            if only_connected {
                ConfigError::DeviceNotConnected {
                    serial: serial.to_string(),
                    vsys: None,
                    controller: controller.to_string(),
                }
            } else {
                ConfigError::DeviceNotAttached {
                    serial: serial.to_string(),
                    vsys: None,
                    controller: controller.to_string(),
                }
            }
        })?;
        let position = selected.iter().position(|e| e.name() == Some(serial));

        let Some(vsys) = device.specific_vsys() else {
            whole.push(serial);
            match position {
                Some(idx) => selected[idx] = entry.clone(),
                None => selected.push(entry.clone()),
            }
            continue;
        };

        let vsys_entry = entry
            .get_child("vsys")
            .and_then(|list| list.find_entry(vsys))
            .ok_or_else(|| ConfigError::DeviceNotAttached {
                serial: serial.to_string(),
                vsys: Some(vsys.to_string()),
                controller: controller.to_string(),
            })?;
        if whole.contains(&serial) {
            continue;
        }
        let idx = match position {
            Some(idx) => idx,
            None => {
                let mut copy = entry.clone();
                copy.upsert_child(XmlNode::new("vsys"));
                selected.push(copy);
                selected.len() - 1
            }
        };
        let list = selected[idx].child_or_insert("vsys");
        if list.find_entry(vsys).is_none() {
            list.children.push(vsys_entry.clone());
        }
    }
    Ok(selected)
}

/// Device records for the selected entries.
///
/// With expansion every vsys entry becomes its own record; a device that
/// lists no vsys becomes a single `vsys1` record. Without expansion a
/// multi-vsys device is one `shared` record and any other is `vsys1`.
pub(crate) fn device_records(entries: &[XmlNode], expand_vsys: bool) -> Vec<DeviceRecord> {
    let mut records = Vec::new();
    for entry in entries {
        let Some(serial) = entry.get_text(&["serial"]).or_else(|| entry.name()) else {
            continue;
        };
        let serial = serial.trim();
        let mut status = entry.clone();
        status.children.retain(|c| c.tag != "vsys");

        if !expand_vsys {
            let vsys = if entry.get_text(&["multi-vsys"]) == Some("yes") {
                SHARED
            } else {
                DEFAULT_VSYS
            };
            records.push(DeviceRecord {
                status: Some(status),
                ..DeviceRecord::placeholder(serial, vsys)
            });
            continue;
        }

        let vsys_entries: Vec<&XmlNode> = entry
            .get_child("vsys")
            .map(|list| list.entries().collect())
            .unwrap_or_default();
        if vsys_entries.is_empty() {
            records.push(DeviceRecord {
                status: Some(status),
                ..DeviceRecord::placeholder(serial, DEFAULT_VSYS)
            });
            continue;
        }
        for vsys_entry in vsys_entries {
            let Some(vsys) = vsys_entry.name() else {
                continue;
            };
            records.push(DeviceRecord {
                vsys_name: vsys_entry
                    .get_text(&["display-name"])
                    .map(|name| name.trim().to_string()),
                status: Some(status.clone()),
                ..DeviceRecord::placeholder(serial, vsys)
            });
        }
    }
    records
}
