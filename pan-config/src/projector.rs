//! Field values to and from wire XML.
//!
//! The write path emits fields in declaration order and leaves out values
//! equal to their default. The read path ignores elements it does not
//! know and leaves absent fields unset so they read back as the default.

use std::collections::BTreeMap;

use pan_xml::XmlNode;
use semver::Version;

use crate::error::ConfigError;
use crate::kind::{EntityKind, Suffix};
use crate::schema::{self, ParamSpec, ParamType, Value};
use crate::tree::{unit_tag, ConfigTree, DirtyState, NodeId};
use crate::xpath;

/// Element for one node carrying its own fields only.
pub fn serialize(tree: &ConfigTree, id: NodeId) -> Result<XmlNode, ConfigError> {
    let node = tree.node(id)?;
    let kind = node.kind();
    let mut element = match kind.spec().suffix {
        Suffix::Entry => {
            XmlNode::entry(wire_name(tree, id)?.ok_or(ConfigError::MissingName(kind))?)
        }
        Suffix::Fixed => XmlNode::new(kind.root_tag()),
    };

    let effective = tree.effective_values(id)?;
    for param in schema::resolve(kind.spec().params, tree.version()) {
        if !param.is_serialized() {
            continue;
        }
        let default = param.default_value();
        let value = match node.values().get(param.name) {
            Some(value) if param.always_emit || default.as_ref() != Some(value) => value.clone(),
            Some(_) => continue,
            None if param.always_emit => match default {
                Some(value) => value,
                None => continue,
            },
            None => continue,
        };
        let path = expand_path(kind, param, &effective)?;
        write_value(&mut element, &path, param.ty, &value);
    }
    Ok(element)
}

/// `name` attribute of the element standing for `id` on the device.
///
/// This is the node name, except for a device-group member record listed
/// under one vsys, whose element is that vsys entry.
pub fn wire_name(tree: &ConfigTree, id: NodeId) -> Result<Option<String>, ConfigError> {
    if let Some(vsys) = xpath::member_vsys(tree, id)? {
        return Ok(Some(vsys));
    }
    Ok(tree.node(id)?.name().map(str::to_string))
}

/// Element for a node with every descendant whose xpath lies under the
/// node's own xpath embedded at its relative path.
///
/// Children pending deletion are left out.
pub fn serialize_subtree(tree: &ConfigTree, id: NodeId) -> Result<XmlNode, ConfigError> {
    let mut element = serialize(tree, id)?;
    for (child, containers) in embedded_children(tree, id)? {
        let embedded = serialize_subtree(tree, child)?;
        let mut target = &mut element;
        for segment in &containers {
            target = descend(target, segment);
        }
        target.children.push(embedded);
    }
    Ok(element)
}

/// `id` and every descendant [`serialize_subtree`] embeds, in pre-order.
pub fn embedded_nodes(tree: &ConfigTree, id: NodeId) -> Result<Vec<NodeId>, ConfigError> {
    let mut out = vec![id];
    for (child, _) in embedded_children(tree, id)? {
        out.extend(embedded_nodes(tree, child)?);
    }
    Ok(out)
}

/// Children whose xpath strictly extends the xpath of `id`, with the
/// container segments between the two.
fn embedded_children(
    tree: &ConfigTree,
    id: NodeId,
) -> Result<Vec<(NodeId, Vec<String>)>, ConfigError> {
    let own = xpath::resolve(tree, id)?;
    let mut out = Vec::new();
    for child in tree.node(id)?.children() {
        if tree.node(*child)?.state() == DirtyState::PendingDelete {
            continue;
        }
        let child_path = xpath::resolve(tree, *child)?;
        let Some(rest) = child_path
            .strip_prefix(own.as_str())
            .filter(|rest| rest.starts_with('/'))
        else {
            continue;
        };
        let mut segments: Vec<String> = xpath::split_xpath(rest)
            .into_iter()
            .map(str::to_string)
            .collect();
        if segments.pop().is_none() {
            continue;
        }
        out.push((*child, segments));
    }
    Ok(out)
}

/// Compact wire text of [`serialize_subtree`].
pub fn to_wire(tree: &ConfigTree, id: NodeId) -> Result<String, ConfigError> {
    Ok(pan_xml::to_string(&serialize_subtree(tree, id)?)?)
}

/// Field values found in `element` for `kind` at `version`.
///
/// Only wire fields are read. Fields absent from the element are absent
/// from the map.
pub fn read_values(
    kind: EntityKind,
    version: &Version,
    element: &XmlNode,
) -> Result<BTreeMap<&'static str, Value>, ConfigError> {
    let params = schema::resolve(kind.spec().params, version);

    // Placeholders resolve against what has been read so far, then defaults.
    let mut effective: BTreeMap<&'static str, Value> = params
        .iter()
        .filter_map(|p| p.default_value().map(|v| (p.name, v)))
        .collect();
    let mut values = BTreeMap::new();

    for param in params {
        if param.wire_path().is_none() {
            continue;
        }
        let Ok(path) = expand_path(kind, param, &effective) else {
            continue;
        };
        if let Some(value) = read_value(kind, param, element, &path)? {
            effective.insert(param.name, value.clone());
            values.insert(param.name, value);
        }
    }
    Ok(values)
}

/// Replace the wire fields of `id` with those found in `element`.
///
/// Local and reference fields keep their current values.
pub fn deserialize(
    tree: &mut ConfigTree,
    id: NodeId,
    element: &XmlNode,
) -> Result<(), ConfigError> {
    let node = tree.node(id)?;
    let kind = node.kind();
    let mut values = read_values(kind, tree.version(), element)?;

    for (name, value) in node.values() {
        let kept = kind
            .spec()
            .params
            .iter()
            .any(|p| p.name == *name && p.wire_path().is_none());
        if kept {
            values.insert(*name, value.clone());
        }
    }
    if kind.spec().unit_tag_from_name && !values.contains_key("tag") {
        if let Some(tag) = node.name().and_then(unit_tag) {
            values.insert("tag", Value::Int(tag));
        }
    }
    tree.replace_values(id, values)
}

/// Build a Clean node of `kind` from `element`, attached under `parent`
/// when given.
///
/// Children of non-scope kinds are built from the nested collections.
pub fn build(
    tree: &mut ConfigTree,
    parent: Option<NodeId>,
    kind: EntityKind,
    element: &XmlNode,
) -> Result<NodeId, ConfigError> {
    let name = match kind.spec().suffix {
        Suffix::Entry => Some(element.name().ok_or(ConfigError::MissingName(kind))?),
        Suffix::Fixed => None,
    };
    let id = match parent {
        Some(parent) => tree.add(parent, kind, name)?,
        None => tree.insert(kind, name),
    };
    deserialize(tree, id, element)?;
    read_children(tree, id, element)?;
    tree.mark_clean(id)?;
    Ok(id)
}

/// Rebuild the embedded children of `id` from `element`.
pub(crate) fn read_children(
    tree: &mut ConfigTree,
    id: NodeId,
    element: &XmlNode,
) -> Result<(), ConfigError> {
    let kind = tree.node(id)?.kind();
    if kind.is_scope_root() {
        return Ok(());
    }
    for child_kind in kind.spec().children {
        if child_kind.is_scope_root() {
            continue;
        }
        let spec = child_kind.spec();
        let segments: Vec<&str> = spec.segment.split('/').filter(|s| !s.is_empty()).collect();
        let Some(container) = element.find_path(&segments) else {
            continue;
        };
        match spec.suffix {
            Suffix::Entry => {
                for entry in container.entries() {
                    build(tree, Some(id), *child_kind, entry)?;
                }
            }
            Suffix::Fixed => {
                build(tree, Some(id), *child_kind, container)?;
            }
        }
    }
    Ok(())
}

fn expand_path(
    kind: EntityKind,
    param: &ParamSpec,
    values: &BTreeMap<&'static str, Value>,
) -> Result<Vec<String>, ConfigError> {
    param
        .wire_path()
        .unwrap_or("")
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(field) => values
                .get(field)
                .map(Value::to_string)
                .ok_or_else(|| ConfigError::InvalidValue {
                    kind,
                    field: param.name.to_string(),
                    reason: format!("path placeholder {{{field}}} has no value"),
                }),
            None => Ok(segment.to_string()),
        })
        .collect()
}

fn split_attribute(path: &[String]) -> (&[String], Option<&str>) {
    match path.split_last() {
        Some((last, rest)) if last.starts_with('@') => (rest, Some(&last[1..])),
        _ => (path, None),
    }
}

fn write_value(element: &mut XmlNode, path: &[String], ty: ParamType, value: &Value) {
    let (path, attribute) = split_attribute(path);
    let mut target = element;
    for segment in path {
        target = target.child_or_insert(segment);
    }
    if let Some(attribute) = attribute {
        target
            .attributes
            .insert(attribute.to_string(), value.to_string());
        return;
    }
    match (ty, value) {
        (ParamType::Selector(_), value) => {
            target.child_or_insert(&value.to_string());
        }
        (ParamType::Member, Value::List(items)) => {
            target.children.extend(items.iter().map(XmlNode::member));
        }
        (ParamType::Entry, Value::List(items)) => {
            target.children.extend(items.iter().map(XmlNode::entry));
        }
        (_, value) => target.text = Some(value.to_string()),
    }
}

fn read_value(
    kind: EntityKind,
    param: &ParamSpec,
    element: &XmlNode,
    path: &[String],
) -> Result<Option<Value>, ConfigError> {
    let (path, attribute) = split_attribute(path);
    let segments: Vec<&str> = path.iter().map(String::as_str).collect();
    let Some(target) = element.find_path(&segments) else {
        return Ok(None);
    };

    let raw = match (attribute, param.ty) {
        (Some(attribute), _) => target.attributes.get(attribute).cloned(),
        (None, ParamType::Selector(choices)) => target
            .children
            .iter()
            .find(|c| choices.contains(&c.tag.as_str()))
            .map(|c| c.tag.clone()),
        (None, ParamType::Member) => return Ok(Some(Value::List(target.member_texts()))),
        (None, ParamType::Entry) => {
            let names = target
                .entries()
                .filter_map(XmlNode::name)
                .map(str::to_string)
                .collect();
            return Ok(Some(Value::List(names)));
        }
        (None, _) => target.text.clone(),
    };

    let Some(raw) = raw else {
        return Ok(None);
    };
    param
        .ty
        .parse(&raw)
        .map(Some)
        .map_err(|reason| ConfigError::InvalidValue {
            kind,
            field: param.name.to_string(),
            reason,
        })
}

/// Child of `element` addressed by one xpath segment, created if missing.
fn descend<'a>(element: &'a mut XmlNode, segment: &str) -> &'a mut XmlNode {
    match xpath::parse_segment(segment) {
        (tag, Some(name)) => {
            let idx = match element
                .children
                .iter()
                .position(|c| c.tag == tag && c.name() == Some(name))
            {
                Some(idx) => idx,
                None => {
                    let mut node = XmlNode::new(tag);
                    node.attributes.insert("name".to_string(), name.to_string());
                    element.children.push(node);
                    element.children.len() - 1
                }
            };
            &mut element.children[idx]
        }
        (tag, None) => element.child_or_insert(tag),
    }
}
