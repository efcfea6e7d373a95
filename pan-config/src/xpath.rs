//! Remote addressing of tree nodes.
//!
//! Xpaths are never stored; every call walks the current ancestor chain so
//! a re-parented node resolves to its new location.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ConfigError;
use crate::kind::{EntityKind, Root, Suffix, ALL_KINDS};
use crate::schema::Value;
use crate::tree::{ConfigTree, NodeId};

/// Local configuration of the connected device.
pub const DEVICE_ROOT: &str = "/config/devices/entry[@name='localhost.localdomain']";
pub const SHARED_ROOT: &str = "/config/shared";
pub const MGT_CONFIG_ROOT: &str = "/config/mgt-config";
pub const PANORAMA_ROOT: &str = "/config/panorama";

/// Name of the scope shared by every vsys or device-group.
pub const SHARED: &str = "shared";

/// Vsys assumed for a firewall with no explicit `vsys`.
pub const DEFAULT_VSYS: &str = "vsys1";

static ALTERNATE_PATTERNS: Lazy<Vec<(EntityKind, Regex)>> = Lazy::new(|| {
    ALL_KINDS
        .iter()
        .filter_map(|kind| {
            kind.spec()
                .alternate_parent
                .map(|alt| (*kind, Regex::new(alt.pattern).unwrap()))
        })
        .collect()
});

/// `entry[@name='<name>']`
pub fn entry_predicate(name: &str) -> String {
    format!("entry[@name='{name}']")
}

/// Resolve the xpath of `id` from its position in the tree.
pub fn resolve(tree: &ConfigTree, id: NodeId) -> Result<String, ConfigError> {
    let node = tree.node(id)?;
    let kind = node.kind();
    let spec = kind.spec();

    match kind {
        // The fleet controller is the document itself.
        EntityKind::Panorama => return Ok("/config".to_string()),
        EntityKind::Firewall if node.parent().is_none() => return Ok(DEVICE_ROOT.to_string()),
        EntityKind::DeviceGroup | EntityKind::Vsys if node.name() == Some(SHARED) => {
            return Ok(SHARED_ROOT.to_string())
        }
        _ => {}
    }

    let parent = node.parent().ok_or(ConfigError::NoScopeRoot(kind))?;
    let parent_kind = tree.node(parent)?.kind();

    let base = if parent_kind.is_scope_root() {
        if let Some(path) = alternate_path(tree, id, parent)? {
            return Ok(path);
        }
        scope_xpath(tree, parent, spec.root)?
    } else {
        resolve(tree, parent)?
    };

    let path = format!("{base}{}", own_suffix(kind, node.name())?);
    match member_vsys(tree, id)? {
        Some(vsys) => Ok(format!("{path}/vsys/{}", entry_predicate(&vsys))),
        None => Ok(path),
    }
}

/// Vsys a device-group member record is listed under.
///
/// A group holds a multi-vsys device as
/// `devices/entry[@name=serial]/vsys/entry[@name=vsys]`, so each record
/// addresses its own vsys entry. Records of single-vsys devices and
/// `shared` records stand for the whole device and give `None`.
pub fn member_vsys(tree: &ConfigTree, id: NodeId) -> Result<Option<String>, ConfigError> {
    let node = tree.node(id)?;
    if node.kind() != EntityKind::Firewall {
        return Ok(None);
    }
    let Some(parent) = node.parent() else {
        return Ok(None);
    };
    if tree.node(parent)?.kind() != EntityKind::DeviceGroup {
        return Ok(None);
    }
    if tree.get(id, "multi_vsys")? == Some(Value::Bool(false)) {
        return Ok(None);
    }
    Ok(tree.text(id, "vsys").filter(|vsys| vsys != SHARED))
}

/// Xpath of the collection `id` is a member of (its own path without the
/// trailing `entry` predicate). Fixed kinds return their parent element.
pub fn collection_xpath(tree: &ConfigTree, id: NodeId) -> Result<String, ConfigError> {
    let full = resolve(tree, id)?;
    let mut segments = split_xpath(&full);
    segments.pop();
    Ok(join_xpath(&segments))
}

/// Xpath of the collection holding `kind` children of `parent`.
pub fn child_collection_xpath(
    tree: &ConfigTree,
    parent: NodeId,
    kind: EntityKind,
) -> Result<String, ConfigError> {
    let parent_kind = tree.node(parent)?.kind();
    if !parent_kind.allows_child(kind) {
        return Err(ConfigError::InvalidChildKind {
            parent: parent_kind,
            child: kind,
        });
    }
    let base = if parent_kind.is_scope_root() {
        scope_xpath(tree, parent, kind.spec().root)?
    } else {
        resolve(tree, parent)?
    };
    Ok(format!("{base}{}", kind.spec().segment))
}

/// Xpath of the entity of `target` kind called `name` that lives in the
/// same scope as `from`.
pub fn resolve_in_scope(
    tree: &ConfigTree,
    from: NodeId,
    target: EntityKind,
    name: &str,
) -> Result<String, ConfigError> {
    let scope = scope_of(tree, from)?;
    let base = scope_xpath(tree, scope, target.spec().root)?;
    Ok(format!("{base}{}", own_suffix(target, Some(name))?))
}

/// The nearest scope root strictly above `id`.
pub fn scope_of(tree: &ConfigTree, id: NodeId) -> Result<NodeId, ConfigError> {
    let kind = tree.node(id)?.kind();
    tree.ancestors(id)?
        .into_iter()
        .find(|a| tree.node(*a).map(|n| n.kind().is_scope_root()).unwrap_or(false))
        .ok_or(ConfigError::NoScopeRoot(kind))
}

/// Vsys a node is configured in, if it is a named one.
///
/// The nearest vsys ancestor wins, then a firewall's explicit `vsys`.
/// Shared scope, device-groups and unset firewall vsys give `None`.
pub fn effective_vsys(tree: &ConfigTree, id: NodeId) -> Result<Option<String>, ConfigError> {
    for ancestor in tree.ancestors(id)? {
        let node = tree.node(ancestor)?;
        let vsys = match node.kind() {
            EntityKind::Vsys => node.name().map(str::to_string),
            EntityKind::Firewall => tree.text(ancestor, "vsys"),
            EntityKind::DeviceGroup | EntityKind::Panorama => None,
            _ => continue,
        };
        return Ok(vsys.filter(|v| v != SHARED));
    }
    Ok(None)
}

/// `.../vsys/entry[@name=V]/import/network/<collection>` for `id`, when the
/// kind is importable and `id` belongs to a named vsys.
pub fn vsys_import_xpath(tree: &ConfigTree, id: NodeId) -> Result<Option<String>, ConfigError> {
    let kind = tree.node(id)?.kind();
    let Some(collection) = kind.spec().vsys_import else {
        return Ok(None);
    };
    let Some(vsys) = effective_vsys(tree, id)? else {
        return Ok(None);
    };
    let device = scope_xpath(tree, scope_of(tree, id)?, Root::Device)?;
    Ok(Some(format!(
        "{device}/vsys/{}/import/network/{collection}",
        entry_predicate(&vsys)
    )))
}

/// Xpath that children hanging from `root` resolve under inside `scope`.
fn scope_xpath(tree: &ConfigTree, scope: NodeId, root: Root) -> Result<String, ConfigError> {
    let node = tree.node(scope)?;
    let path = match (node.kind(), root) {
        (_, Root::MgtConfig) if node.kind() != EntityKind::DeviceGroup => {
            MGT_CONFIG_ROOT.to_string()
        }
        (_, Root::Panorama) => PANORAMA_ROOT.to_string(),
        (EntityKind::Panorama, Root::Device) => DEVICE_ROOT.to_string(),
        (EntityKind::Panorama, _) => SHARED_ROOT.to_string(),
        (EntityKind::DeviceGroup, _) => resolve(tree, scope)?,
        (EntityKind::Firewall, Root::Device) => DEVICE_ROOT.to_string(),
        (EntityKind::Firewall, _) => {
            let vsys = tree
                .text(scope, "vsys")
                .unwrap_or_else(|| DEFAULT_VSYS.to_string());
            vsys_root(&vsys)
        }
        (EntityKind::Vsys, Root::Vsys) => resolve(tree, scope)?,
        (EntityKind::Vsys, _) => match tree.node(scope)?.parent() {
            Some(device) => scope_xpath(tree, device, root)?,
            None => DEVICE_ROOT.to_string(),
        },
        (kind, _) => return Err(ConfigError::NoScopeRoot(kind)),
    };
    Ok(path)
}

fn vsys_root(vsys: &str) -> String {
    if vsys == SHARED {
        SHARED_ROOT.to_string()
    } else {
        format!("{DEVICE_ROOT}/vsys/{}", entry_predicate(vsys))
    }
}

fn own_suffix(kind: EntityKind, name: Option<&str>) -> Result<String, ConfigError> {
    let spec = kind.spec();
    match spec.suffix {
        Suffix::Fixed => Ok(spec.segment.to_string()),
        Suffix::Entry => {
            let name = name.ok_or(ConfigError::MissingName(kind))?;
            Ok(format!("{}/{}", spec.segment, entry_predicate(name)))
        }
    }
}

/// Kind-specific override for a node attached straight to a scope root.
fn alternate_path(
    tree: &ConfigTree,
    id: NodeId,
    scope: NodeId,
) -> Result<Option<String>, ConfigError> {
    let node = tree.node(id)?;
    let kind = node.kind();
    let Some(alt) = kind.spec().alternate_parent else {
        return Ok(None);
    };
    let name = node.name().ok_or(ConfigError::MissingName(kind))?;
    let device = scope_xpath(tree, scope, Root::Device)?;

    let base = ALTERNATE_PATTERNS
        .iter()
        .find(|(k, _)| *k == kind)
        .and_then(|(_, pattern)| pattern.captures(name))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str());

    let path = match base {
        Some(base) => format!(
            "{device}{}/{}{}/{}",
            alt.base_segment,
            entry_predicate(base),
            alt.units_segment,
            entry_predicate(name)
        ),
        None => format!("{device}{}/{}", alt.base_segment, entry_predicate(name)),
    };
    Ok(Some(path))
}

/// Split an xpath on `/`, ignoring separators inside `[...]` predicates.
pub fn split_xpath(xpath: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;
    for (idx, ch) in xpath.char_indices() {
        match ch {
            '\'' if depth > 0 => quoted = !quoted,
            '[' if !quoted => depth += 1,
            ']' if !quoted => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                if idx > start {
                    out.push(&xpath[start..idx]);
                }
                start = idx + 1;
            }
            _ => {}
        }
    }
    if start < xpath.len() {
        out.push(&xpath[start..]);
    }
    out
}

pub fn join_xpath(segments: &[&str]) -> String {
    segments.iter().fold(String::new(), |mut acc, seg| {
        acc.push('/');
        acc.push_str(seg);
        acc
    })
}

/// Split `entry[@name='x']` into (`entry`, `Some("x")`); a bare tag has no
/// name.
pub fn parse_segment(segment: &str) -> (&str, Option<&str>) {
    let Some(open) = segment.find('[') else {
        return (segment, None);
    };
    let tag = &segment[..open];
    let name = segment[open..]
        .strip_prefix("[@name='")
        .and_then(|rest| rest.strip_suffix("']"));
    (tag, name)
}
