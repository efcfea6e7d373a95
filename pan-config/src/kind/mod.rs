//! Entity kinds and their static descriptions.
//!
//! A [`KindSpec`] tells the resolver where a kind lives, the tree which
//! children it accepts, and the projector which fields it carries.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use crate::error::ConfigError;
use crate::schema::ParamSpec;

mod device;
mod network;
mod objects;

/// Variant tag of a configuration node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Panorama,
    Firewall,
    DeviceGroup,
    Vsys,
    SystemSettings,
    VirtualRouter,
    StaticRoute,
    StaticRouteV6,
    EthernetInterface,
    Layer3Subinterface,
    VlanInterface,
    Zone,
    AddressObject,
    Tag,
}

/// Which xpath root of the enclosing scope a kind hangs from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Root {
    /// `/config/devices/entry[@name='localhost.localdomain']`
    Device,
    /// The vsys, device-group, or shared configuration of the scope.
    Vsys,
    /// `/config/mgt-config`
    MgtConfig,
    /// `/config/panorama`
    Panorama,
}

/// How a node's own path segment ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suffix {
    /// Keyed collection member: `<segment>/entry[@name='<name>']`.
    Entry,
    /// Singleton: the segment alone.
    Fixed,
}

/// Path override for a kind addressed under another entity when it is
/// attached straight to a scope root.
///
/// A name matching `pattern` (`<base>.<unit>`) resolves to
/// `<base_segment>/entry[@name='<base>']<units_segment>/entry[@name='<name>']`;
/// any other name falls back to `<base_segment>/entry[@name='<name>']`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlternateParent {
    pub pattern: &'static str,
    pub base_segment: &'static str,
    pub units_segment: &'static str,
}

/// Static description of an entity kind.
#[derive(Debug)]
pub struct KindSpec {
    pub kind: EntityKind,
    pub class_name: &'static str,
    pub root: Root,
    pub segment: &'static str,
    pub suffix: Suffix,
    pub children: &'static [EntityKind],
    pub params: &'static [ParamSpec],
    /// Children of this kind resolve relative to it (firewall, device-group,
    /// vsys, panorama).
    pub scope_root: bool,
    /// Collection under `vsys/entry/import/network` that must list this
    /// node when it belongs to a named vsys.
    pub vsys_import: Option<&'static str>,
    pub alternate_parent: Option<AlternateParent>,
    /// Derive the `tag` field from a `<base>.<unit>` name.
    pub unit_tag_from_name: bool,
}

pub const ALL_KINDS: [EntityKind; 14] = [
    EntityKind::Panorama,
    EntityKind::Firewall,
    EntityKind::DeviceGroup,
    EntityKind::Vsys,
    EntityKind::SystemSettings,
    EntityKind::VirtualRouter,
    EntityKind::StaticRoute,
    EntityKind::StaticRouteV6,
    EntityKind::EthernetInterface,
    EntityKind::Layer3Subinterface,
    EntityKind::VlanInterface,
    EntityKind::Zone,
    EntityKind::AddressObject,
    EntityKind::Tag,
];

impl EntityKind {
    pub fn spec(self) -> &'static KindSpec {
        match self {
            EntityKind::Panorama => &device::PANORAMA,
            EntityKind::Firewall => &device::FIREWALL,
            EntityKind::DeviceGroup => &device::DEVICE_GROUP,
            EntityKind::Vsys => &device::VSYS,
            EntityKind::SystemSettings => &device::SYSTEM_SETTINGS,
            EntityKind::VirtualRouter => &network::VIRTUAL_ROUTER,
            EntityKind::StaticRoute => &network::STATIC_ROUTE,
            EntityKind::StaticRouteV6 => &network::STATIC_ROUTE_V6,
            EntityKind::EthernetInterface => &network::ETHERNET_INTERFACE,
            EntityKind::Layer3Subinterface => &network::LAYER3_SUBINTERFACE,
            EntityKind::VlanInterface => &network::VLAN_INTERFACE,
            EntityKind::Zone => &network::ZONE,
            EntityKind::AddressObject => &objects::ADDRESS_OBJECT,
            EntityKind::Tag => &objects::TAG,
        }
    }

    /// Short type name, e.g. `StaticRoute`.
    pub fn short_name(self) -> &'static str {
        let class = self.spec().class_name;
        class.rsplit('.').next().unwrap_or(class)
    }

    pub fn allows_child(self, child: EntityKind) -> bool {
        self.spec().children.contains(&child)
    }

    pub fn is_scope_root(self) -> bool {
        self.spec().scope_root
    }

    /// Element tag the projector emits for this kind.
    pub fn root_tag(self) -> &'static str {
        let spec = self.spec();
        match spec.suffix {
            Suffix::Entry => "entry",
            Suffix::Fixed => spec
                .segment
                .rsplit('/')
                .find(|s| !s.is_empty())
                .unwrap_or("entry"),
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

impl FromStr for EntityKind {
    type Err = ConfigError;

    /// Accepts the class name (`network.StaticRoute`) or the short name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_KINDS
            .iter()
            .copied()
            .find(|kind| kind.spec().class_name == s || kind.short_name() == s)
            .ok_or_else(|| ConfigError::UnknownEntityKind(s.to_string()))
    }
}
