//! Pushing tree state to a device and reading it back.
//!
//! Multi-step operations are not transactional: when a membership call
//! fails after the entity call succeeded, the entity stays applied on the
//! device and the error is returned as-is.

use pan_xml::XmlNode;
use tracing::{debug, info};

use crate::client::DeviceApiClient;
use crate::error::ConfigError;
use crate::kind::{EntityKind, Suffix};
use crate::projector;
use crate::schema::Placement;
use crate::tree::{ConfigTree, DirtyState, NodeId};
use crate::xpath;

/// A `<member>` that a collection elsewhere in the configuration must hold
/// for a node to be usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    /// Xpath of the element holding the `<member>` list.
    pub xpath: String,
    pub member: String,
}

impl Membership {
    /// Xpath addressing this single member.
    pub fn member_xpath(&self) -> String {
        format!("{}/member[text()='{}']", self.xpath, self.member)
    }
}

/// Memberships implied by the reference fields and vsys import of `id`.
pub fn memberships(tree: &ConfigTree, id: NodeId) -> Result<Vec<Membership>, ConfigError> {
    let node = tree.node(id)?;
    let kind = node.kind();
    let Some(name) = node.name() else {
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    for param in kind.spec().params {
        let Placement::Reference {
            target,
            member_path,
        } = param.placement
        else {
            continue;
        };
        if !param.applies_to(tree.version()) {
            continue;
        }
        let Some(target_name) = tree.text(id, param.name) else {
            continue;
        };
        let base = xpath::resolve_in_scope(tree, id, target, &target_name)?;
        let path = expand_member_path(tree, id, member_path)?;
        out.push(Membership {
            xpath: format!("{base}/{path}"),
            member: name.to_string(),
        });
    }
    if let Some(import) = xpath::vsys_import_xpath(tree, id)? {
        out.push(Membership {
            xpath: import,
            member: name.to_string(),
        });
    }
    Ok(out)
}

fn expand_member_path(
    tree: &ConfigTree,
    id: NodeId,
    member_path: &str,
) -> Result<String, ConfigError> {
    let kind = tree.node(id)?.kind();
    let segments = member_path
        .split('/')
        .map(|segment| match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(field) => tree.text(id, field).ok_or_else(|| ConfigError::InvalidValue {
                kind,
                field: field.to_string(),
                reason: "needed to address a membership but has no value".to_string(),
            }),
            None => Ok(segment.to_string()),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(segments.join("/"))
}

/// Applies tree changes through a [`DeviceApiClient`].
#[derive(Debug)]
pub struct SyncEngine<C> {
    client: C,
}

impl<C: DeviceApiClient> SyncEngine<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Replace the node on the device with its local subtree, then bring
    /// its memberships up to date.
    ///
    /// Memberships applied by an earlier push that the node no longer
    /// implies, such as the old zone after a zone change, are deleted
    /// before the new ones are added.
    pub fn push(&self, tree: &mut ConfigTree, id: NodeId) -> Result<(), ConfigError> {
        let path = xpath::resolve(tree, id)?;
        let element = projector::to_wire(tree, id)?;
        debug!(xpath = %path, "edit");
        self.client.edit(&path, &element)?;
        self.apply_memberships(tree, id)?;
        self.mark_embedded_clean(tree, id)
    }

    /// Merge the node into its collection on the device, then bring its
    /// memberships up to date.
    pub fn create(&self, tree: &mut ConfigTree, id: NodeId) -> Result<(), ConfigError> {
        let path = xpath::collection_xpath(tree, id)?;
        let element = projector::to_wire(tree, id)?;
        debug!(xpath = %path, "set");
        self.client.set(&path, &element)?;
        self.apply_memberships(tree, id)?;
        self.mark_embedded_clean(tree, id)
    }

    /// Delete the node on the device and drop it from the tree.
    ///
    /// Memberships of the node and its embedded descendants are removed
    /// before the entity: the ones last pushed when the node was pushed,
    /// otherwise the ones its fields imply. The node stays in the tree as
    /// PendingDelete when a call fails.
    pub fn remove(&self, tree: &mut ConfigTree, id: NodeId) -> Result<(), ConfigError> {
        let path = xpath::resolve(tree, id)?;
        let mut memberships_to_drop = Vec::new();
        for node in projector::embedded_nodes(tree, id)? {
            match tree.node(node)?.applied_memberships() {
                Some(applied) => memberships_to_drop.extend_from_slice(applied),
                None => memberships_to_drop.extend(memberships(tree, node)?),
            }
        }
        tree.mark_pending_delete(id)?;

        for membership in &memberships_to_drop {
            let member = membership.member_xpath();
            debug!(xpath = %member, "delete membership");
            self.client.delete(&member)?;
        }
        debug!(xpath = %path, "delete");
        self.client.delete(&path)?;
        tree.remove_subtree(id)?;
        Ok(())
    }

    /// Push every Modified node and remove every PendingDelete node under
    /// `root`, parents before children.
    pub fn sync(&self, tree: &mut ConfigTree, root: NodeId) -> Result<(), ConfigError> {
        let mut pushed = 0usize;
        let mut removed = 0usize;
        for id in tree.descendants(root)? {
            if !tree.contains(id) {
                continue;
            }
            if is_connection(tree, id)? {
                if tree.node(id)?.state() == DirtyState::Modified {
                    tree.mark_clean(id)?;
                }
                continue;
            }
            match tree.node(id)?.state() {
                DirtyState::Clean => {}
                DirtyState::Modified => {
                    self.push(tree, id)?;
                    pushed += 1;
                }
                DirtyState::PendingDelete => {
                    self.remove(tree, id)?;
                    removed += 1;
                }
            }
        }
        info!(pushed, removed, "sync complete");
        Ok(())
    }

    /// Re-read one node from the candidate configuration and mark it Clean.
    ///
    /// Embedded children of non-scope kinds are rebuilt from the response.
    pub fn refresh(&self, tree: &mut ConfigTree, id: NodeId) -> Result<(), ConfigError> {
        let path = xpath::resolve(tree, id)?;
        debug!(xpath = %path, "get");
        let result = self.client.get(&path)?;

        let kind = tree.node(id)?.kind();
        let name = projector::wire_name(tree, id)?;
        let element = find_element(&result, kind, name.as_deref()).ok_or_else(|| {
            ConfigError::UnexpectedResponse {
                context: path.clone(),
                reason: format!("no {} element in response", kind.root_tag()),
            }
        })?;

        projector::deserialize(tree, id, element)?;
        if !kind.is_scope_root() {
            let stale: Vec<NodeId> = tree.node(id)?.children().to_vec();
            for child in stale {
                tree.remove_subtree(child)?;
            }
            projector::read_children(tree, id, element)?;
        }
        tree.mark_clean(id)
    }

    /// Read every `kind` child of `parent` from the device, replacing the
    /// ones held locally.
    pub fn refresh_all(
        &self,
        tree: &mut ConfigTree,
        parent: NodeId,
        kind: EntityKind,
    ) -> Result<Vec<NodeId>, ConfigError> {
        let path = xpath::child_collection_xpath(tree, parent, kind)?;
        debug!(xpath = %path, "get");
        let result = self.client.get(&path)?;

        let elements: Vec<&XmlNode> = match kind.spec().suffix {
            Suffix::Entry => {
                let tag = kind.spec().segment.rsplit('/').next().unwrap_or_default();
                let collection = result.get_child(tag).unwrap_or(&result);
                collection.entries().collect()
            }
            Suffix::Fixed => find_element(&result, kind, None).into_iter().collect(),
        };

        for old in tree.children_of_kind(parent, kind) {
            tree.remove_subtree(old)?;
        }
        let ids = elements
            .into_iter()
            .map(|element| projector::build(tree, Some(parent), kind, element))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(kind = %kind, count = ids.len(), "refreshed collection");
        Ok(ids)
    }

    /// Memberships of `id` and of every node sent embedded with it.
    ///
    /// Stale memberships of every node are deleted first, then the current
    /// ones are set. A node's record is only updated once all of its
    /// memberships are set.
    fn apply_memberships(&self, tree: &mut ConfigTree, id: NodeId) -> Result<(), ConfigError> {
        let nodes = projector::embedded_nodes(tree, id)?;
        let wanted = nodes
            .iter()
            .map(|node| memberships(tree, *node))
            .collect::<Result<Vec<_>, _>>()?;

        for (node, current) in nodes.iter().zip(&wanted) {
            let applied = tree.node(*node)?.applied_memberships().unwrap_or_default();
            for stale in applied.iter().filter(|m| !current.contains(m)) {
                let member = stale.member_xpath();
                debug!(xpath = %member, "delete stale membership");
                self.client.delete(&member)?;
            }
        }

        for (node, current) in nodes.into_iter().zip(wanted) {
            for membership in &current {
                let element = pan_xml::to_string(&XmlNode::member(membership.member.as_str()))?;
                debug!(xpath = %membership.xpath, member = %membership.member, "add membership");
                self.client.set(&membership.xpath, &element)?;
            }
            tree.set_applied_memberships(node, current)?;
        }
        Ok(())
    }

    fn mark_embedded_clean(&self, tree: &mut ConfigTree, id: NodeId) -> Result<(), ConfigError> {
        for node in projector::embedded_nodes(tree, id)? {
            tree.mark_clean(node)?;
        }
        Ok(())
    }
}

/// Nodes standing for the device connection itself rather than a
/// configuration object.
fn is_connection(tree: &ConfigTree, id: NodeId) -> Result<bool, ConfigError> {
    let node = tree.node(id)?;
    Ok(match node.kind() {
        EntityKind::Panorama => true,
        EntityKind::Firewall => node.parent().is_none(),
        _ => false,
    })
}

fn find_element<'a>(
    result: &'a XmlNode,
    kind: EntityKind,
    name: Option<&str>,
) -> Option<&'a XmlNode> {
    let tag = kind.root_tag();
    let matches = |node: &XmlNode| {
        node.tag == tag && (kind.spec().suffix == Suffix::Fixed || node.name() == name)
    };
    if matches(result) {
        return Some(result);
    }
    result.children.iter().find(|child| matches(child))
}
