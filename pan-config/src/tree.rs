//! Arena-backed configuration tree.
//!
//! Nodes own their children through the arena; the parent link is a plain
//! [`NodeId`], so there is exactly one owning edge per node. The tree is
//! not synchronized: callers serialize mutation of a tree themselves.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;

use crate::error::ConfigError;
use crate::kind::EntityKind;
use crate::schema::{self, ParamSpec, Value};
use crate::sync::Membership;

static UNIT_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.(\d{1,4})$").unwrap());

/// Handle to a node inside a [`ConfigTree`].
///
/// Slots are reused after removal; the generation tells a handle to the
/// removed node apart from one to the slot's new occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

impl NodeId {
    pub fn index(self) -> usize {
        self.index
    }
}

/// Local edit state of a node relative to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
    Clean,
    Modified,
    PendingDelete,
}

/// One configuration object.
#[derive(Debug, Clone)]
pub struct Node {
    kind: EntityKind,
    name: Option<String>,
    values: BTreeMap<&'static str, Value>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    state: DirtyState,
    applied: Option<Vec<Membership>>,
}

impl Node {
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn state(&self) -> DirtyState {
        self.state
    }

    /// Explicitly set values; defaults are not included.
    pub fn values(&self) -> &BTreeMap<&'static str, Value> {
        &self.values
    }

    /// Memberships written to the device by the last push or create of
    /// this node. `None` until the node has been pushed.
    pub fn applied_memberships(&self) -> Option<&[Membership]> {
        self.applied.as_deref()
    }
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Owned, detached copy of a subtree used for structural comparison.
///
/// Holds kind, name, effective field values and children in order; the
/// dirty state is not part of equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub kind: EntityKind,
    pub name: Option<String>,
    pub values: BTreeMap<String, Value>,
    pub children: Vec<NodeSnapshot>,
}

/// A forest of configuration nodes sharing one schema version.
#[derive(Debug, Clone)]
pub struct ConfigTree {
    slots: Vec<Slot>,
    free: Vec<usize>,
    version: Version,
}

impl ConfigTree {
    pub fn new(version: Version) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            version,
        }
    }

    /// Schema version used to resolve field declarations.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Switch the schema version, e.g. after learning the device's
    /// software version. Values set under the old version are kept.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create a detached node. It starts out Modified.
    pub fn insert(&mut self, kind: EntityKind, name: Option<&str>) -> NodeId {
        let mut values = BTreeMap::new();
        if kind.spec().unit_tag_from_name {
            if let Some(tag) = name.and_then(unit_tag) {
                values.insert("tag", Value::Int(tag));
            }
        }
        let node = Node {
            kind,
            name: name.map(str::to_string),
            values,
            parent: None,
            children: Vec::new(),
            state: DirtyState::Modified,
            applied: None,
        };

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.node = Some(node);
            return NodeId {
                index,
                generation: slot.generation,
            };
        }
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeId {
            index: self.slots.len() - 1,
            generation: 0,
        }
    }

    /// Create a node and attach it under `parent` in one step.
    pub fn add(
        &mut self,
        parent: NodeId,
        kind: EntityKind,
        name: Option<&str>,
    ) -> Result<NodeId, ConfigError> {
        let parent_kind = self.node(parent)?.kind;
        if !parent_kind.allows_child(kind) {
            return Err(ConfigError::InvalidChildKind {
                parent: parent_kind,
                child: kind,
            });
        }
        let id = self.insert(kind, name);
        self.attach(id, parent)?;
        Ok(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, ConfigError> {
        self.slots
            .get(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(ConfigError::StaleNode(id.index))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, ConfigError> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(ConfigError::StaleNode(id.index))
    }

    /// Live nodes without a parent.
    pub fn roots(&self) -> Vec<NodeId> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match &slot.node {
                Some(node) if node.parent.is_none() => Some(NodeId {
                    index,
                    generation: slot.generation,
                }),
                _ => None,
            })
            .collect()
    }

    /// Move `child` under `parent`, leaving its former parent first.
    pub fn attach(&mut self, child: NodeId, parent: NodeId) -> Result<(), ConfigError> {
        let child_kind = self.node(child)?.kind;
        let parent_kind = self.node(parent)?.kind;
        if child == parent || self.ancestors(parent)?.contains(&child) {
            return Err(ConfigError::CycleDetected {
                parent: self.describe(parent),
                child: self.describe(child),
            });
        }
        if !parent_kind.allows_child(child_kind) {
            return Err(ConfigError::InvalidChildKind {
                parent: parent_kind,
                child: child_kind,
            });
        }

        self.detach(child)?;
        self.node_mut(parent)?.children.push(child);
        let node = self.node_mut(child)?;
        node.parent = Some(parent);
        node.state = DirtyState::Modified;
        Ok(())
    }

    /// Remove `child` from its parent. Its own children stay with it.
    pub fn detach(&mut self, child: NodeId) -> Result<(), ConfigError> {
        let Some(parent) = self.node(child)?.parent else {
            return Ok(());
        };
        if let Ok(parent_node) = self.node_mut(parent) {
            parent_node.children.retain(|c| *c != child);
        }
        self.node_mut(child)?.parent = None;
        Ok(())
    }

    /// Detach `id` and drop it together with every descendant. The freed
    /// slots are handed out again by later inserts.
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<Vec<NodeId>, ConfigError> {
        self.detach(id)?;
        let removed = self.descendants(id)?;
        for node in &removed {
            let slot = &mut self.slots[node.index];
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(node.index);
        }
        Ok(removed)
    }

    pub fn mark_dirty(&mut self, id: NodeId) -> Result<(), ConfigError> {
        self.node_mut(id)?.state = DirtyState::Modified;
        Ok(())
    }

    pub fn mark_clean(&mut self, id: NodeId) -> Result<(), ConfigError> {
        self.node_mut(id)?.state = DirtyState::Clean;
        Ok(())
    }

    pub fn mark_pending_delete(&mut self, id: NodeId) -> Result<(), ConfigError> {
        self.node_mut(id)?.state = DirtyState::PendingDelete;
        Ok(())
    }

    /// Set a schema-declared field and mark the node Modified.
    pub fn set(
        &mut self,
        id: NodeId,
        field: &str,
        value: impl Into<Value>,
    ) -> Result<(), ConfigError> {
        let spec = self.param(id, field)?;
        let kind = self.node(id)?.kind;
        let value = value.into();
        spec.ty.check(&value).map_err(|reason| ConfigError::InvalidValue {
            kind,
            field: field.to_string(),
            reason,
        })?;
        let node = self.node_mut(id)?;
        node.values.insert(spec.name, value);
        if node.state == DirtyState::Clean {
            node.state = DirtyState::Modified;
        }
        Ok(())
    }

    /// Clear a field back to its schema default.
    pub fn unset(&mut self, id: NodeId, field: &str) -> Result<(), ConfigError> {
        let spec = self.param(id, field)?;
        let node = self.node_mut(id)?;
        if node.values.remove(spec.name).is_some() && node.state == DirtyState::Clean {
            node.state = DirtyState::Modified;
        }
        Ok(())
    }

    /// Current value of a field, falling back to the schema default.
    pub fn get(&self, id: NodeId, field: &str) -> Result<Option<Value>, ConfigError> {
        let spec = self.param(id, field)?;
        let node = self.node(id)?;
        Ok(node
            .values
            .get(spec.name)
            .cloned()
            .or_else(|| spec.default_value()))
    }

    /// Text form of a scalar field, if set or defaulted.
    pub fn text(&self, id: NodeId, field: &str) -> Option<String> {
        match self.get(id, field).ok().flatten()? {
            Value::List(_) => None,
            value => Some(value.to_string()),
        }
    }

    /// Every applicable field with an explicit or default value.
    pub fn effective_values(
        &self,
        id: NodeId,
    ) -> Result<BTreeMap<&'static str, Value>, ConfigError> {
        let node = self.node(id)?;
        let mut out = BTreeMap::new();
        for spec in schema::resolve(node.kind.spec().params, &self.version) {
            let value = node
                .values
                .get(spec.name)
                .cloned()
                .or_else(|| spec.default_value());
            if let Some(value) = value {
                out.insert(spec.name, value);
            }
        }
        Ok(out)
    }

    pub(crate) fn set_applied_memberships(
        &mut self,
        id: NodeId,
        applied: Vec<Membership>,
    ) -> Result<(), ConfigError> {
        self.node_mut(id)?.applied = Some(applied);
        Ok(())
    }

    /// Replace every field value at once; used by the read path.
    pub(crate) fn replace_values(
        &mut self,
        id: NodeId,
        values: BTreeMap<&'static str, Value>,
    ) -> Result<(), ConfigError> {
        self.node_mut(id)?.values = values;
        Ok(())
    }

    pub fn set_name(&mut self, id: NodeId, name: Option<&str>) -> Result<(), ConfigError> {
        let node = self.node_mut(id)?;
        node.name = name.map(str::to_string);
        node.state = DirtyState::Modified;
        Ok(())
    }

    /// Parent chain from the direct parent up to the top.
    pub fn ancestors(&self, id: NodeId) -> Result<Vec<NodeId>, ConfigError> {
        let mut out = Vec::new();
        let mut current = self.node(id)?.parent;
        while let Some(parent) = current {
            if out.contains(&parent) {
                break;
            }
            out.push(parent);
            current = self.node(parent)?.parent;
        }
        Ok(out)
    }

    /// `id` and all its descendants in pre-order.
    pub fn descendants(&self, id: NodeId) -> Result<Vec<NodeId>, ConfigError> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            let node = self.node(current)?;
            stack.extend(node.children.iter().rev().copied());
        }
        Ok(out)
    }

    pub fn children_of_kind(&self, parent: NodeId, kind: EntityKind) -> Vec<NodeId> {
        let Ok(node) = self.node(parent) else {
            return Vec::new();
        };
        node.children
            .iter()
            .copied()
            .filter(|c| self.node(*c).map(|n| n.kind == kind).unwrap_or(false))
            .collect()
    }

    pub fn find_child(&self, parent: NodeId, kind: EntityKind, name: &str) -> Option<NodeId> {
        self.children_of_kind(parent, kind)
            .into_iter()
            .find(|c| self.node(*c).ok().and_then(Node::name) == Some(name))
    }

    /// Owned copy of the subtree at `id` for structural comparison.
    pub fn snapshot(&self, id: NodeId) -> Result<NodeSnapshot, ConfigError> {
        let node = self.node(id)?;
        let values = self
            .effective_values(id)?
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let children = node
            .children
            .iter()
            .map(|c| self.snapshot(*c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NodeSnapshot {
            kind: node.kind,
            name: node.name.clone(),
            values,
            children,
        })
    }

    /// Structural equality of two subtrees, possibly in different trees.
    pub fn structurally_equal(&self, a: NodeId, other: &ConfigTree, b: NodeId) -> bool {
        match (self.snapshot(a), other.snapshot(b)) {
            (Ok(left), Ok(right)) => left == right,
            _ => false,
        }
    }

    fn param(&self, id: NodeId, field: &str) -> Result<&'static ParamSpec, ConfigError> {
        let kind = self.node(id)?.kind;
        schema::find(kind.spec().params, field, &self.version).ok_or_else(|| {
            ConfigError::UnknownField {
                kind,
                field: field.to_string(),
            }
        })
    }

    fn describe(&self, id: NodeId) -> String {
        match self.node(id) {
            Ok(node) => match &node.name {
                Some(name) => format!("{} {name}", node.kind),
                None => node.kind.to_string(),
            },
            Err(_) => format!("node {}", id.index),
        }
    }
}

/// Unit number of a `<base>.<unit>` interface name.
pub fn unit_tag(name: &str) -> Option<i64> {
    UNIT_SUFFIX
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
