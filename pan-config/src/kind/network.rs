use super::{AlternateParent, EntityKind, KindSpec, Root, Suffix};
use crate::schema::{ParamSpec, ParamType};

const INTERFACE_MODES: &[&str] = &[
    "layer3",
    "layer2",
    "virtual-wire",
    "tap",
    "ha",
    "aggregate-group",
];

const ZONE_MODES: &[&str] = &[
    "layer3",
    "layer2",
    "virtual-wire",
    "tap",
    "external",
    "tunnel",
];

static VIRTUAL_ROUTER_PARAMS: [ParamSpec; 1] =
    [ParamSpec::wire("interface", "interface", ParamType::Member)];

pub(super) static VIRTUAL_ROUTER: KindSpec = KindSpec {
    kind: EntityKind::VirtualRouter,
    class_name: "network.VirtualRouter",
    root: Root::Device,
    segment: "/network/virtual-router",
    suffix: Suffix::Entry,
    children: &[EntityKind::StaticRoute, EntityKind::StaticRouteV6],
    params: &VIRTUAL_ROUTER_PARAMS,
    scope_root: false,
    vsys_import: Some("virtual-router"),
    alternate_parent: None,
    unit_tag_from_name: false,
};

static STATIC_ROUTE_PARAMS: [ParamSpec; 7] = [
    ParamSpec::wire("destination", "destination", ParamType::Text),
    ParamSpec::wire(
        "nexthop_type",
        "nexthop",
        ParamType::Selector(&["ip-address", "discard", "next-vr"]),
    )
    .with_default("ip-address"),
    ParamSpec::wire("nexthop", "nexthop/{nexthop_type}", ParamType::Text),
    ParamSpec::wire("interface", "interface", ParamType::Text),
    ParamSpec::wire("admin_dist", "admin-dist", ParamType::Int),
    ParamSpec::wire("metric", "metric", ParamType::Int).with_default("10"),
    ParamSpec::wire("bfd_profile", "bfd/profile", ParamType::Text).since(7, 1, 0),
];

pub(super) static STATIC_ROUTE: KindSpec = KindSpec {
    kind: EntityKind::StaticRoute,
    class_name: "network.StaticRoute",
    root: Root::Device,
    segment: "/routing-table/ip/static-route",
    suffix: Suffix::Entry,
    children: &[],
    params: &STATIC_ROUTE_PARAMS,
    scope_root: false,
    vsys_import: None,
    alternate_parent: None,
    unit_tag_from_name: false,
};

static STATIC_ROUTE_V6_PARAMS: [ParamSpec; 7] = [
    ParamSpec::wire("destination", "destination", ParamType::Text),
    ParamSpec::wire(
        "nexthop_type",
        "nexthop",
        ParamType::Selector(&["ipv6-address", "discard", "next-vr"]),
    )
    .with_default("ipv6-address"),
    ParamSpec::wire("nexthop", "nexthop/{nexthop_type}", ParamType::Text),
    ParamSpec::wire("interface", "interface", ParamType::Text),
    ParamSpec::wire("admin_dist", "admin-dist", ParamType::Int),
    ParamSpec::wire("metric", "metric", ParamType::Int).with_default("10"),
    ParamSpec::wire("bfd_profile", "bfd/profile", ParamType::Text).since(7, 1, 0),
];

pub(super) static STATIC_ROUTE_V6: KindSpec = KindSpec {
    kind: EntityKind::StaticRouteV6,
    class_name: "network.StaticRouteV6",
    root: Root::Device,
    segment: "/routing-table/ipv6/static-route",
    suffix: Suffix::Entry,
    children: &[],
    params: &STATIC_ROUTE_V6_PARAMS,
    scope_root: false,
    vsys_import: None,
    alternate_parent: None,
    unit_tag_from_name: false,
};

static ETHERNET_INTERFACE_PARAMS: [ParamSpec; 8] = [
    ParamSpec::wire("mode", "", ParamType::Selector(INTERFACE_MODES))
        .with_default("layer3")
        .emitted(),
    ParamSpec::wire("ip", "{mode}/ip", ParamType::Entry),
    ParamSpec::wire(
        "management_profile",
        "{mode}/interface-management-profile",
        ParamType::Text,
    ),
    ParamSpec::wire("link_speed", "link-speed", ParamType::Text),
    ParamSpec::wire("link_duplex", "link-duplex", ParamType::Enum(&["auto", "full", "half"])),
    ParamSpec::wire("comment", "comment", ParamType::Text),
    ParamSpec::reference("zone", EntityKind::Zone, "network/{mode}"),
    ParamSpec::reference("virtual_router", EntityKind::VirtualRouter, "interface"),
];

pub(super) static ETHERNET_INTERFACE: KindSpec = KindSpec {
    kind: EntityKind::EthernetInterface,
    class_name: "network.EthernetInterface",
    root: Root::Device,
    segment: "/network/interface/ethernet",
    suffix: Suffix::Entry,
    children: &[EntityKind::Layer3Subinterface],
    params: &ETHERNET_INTERFACE_PARAMS,
    scope_root: false,
    vsys_import: Some("interface"),
    alternate_parent: None,
    unit_tag_from_name: false,
};

static LAYER3_SUBINTERFACE_PARAMS: [ParamSpec; 6] = [
    ParamSpec::wire("tag", "tag", ParamType::Int),
    ParamSpec::wire("ip", "ip", ParamType::Entry),
    ParamSpec::wire(
        "management_profile",
        "interface-management-profile",
        ParamType::Text,
    ),
    ParamSpec::wire("comment", "comment", ParamType::Text),
    ParamSpec::reference("zone", EntityKind::Zone, "network/layer3"),
    ParamSpec::reference("virtual_router", EntityKind::VirtualRouter, "interface"),
];

pub(super) static LAYER3_SUBINTERFACE: KindSpec = KindSpec {
    kind: EntityKind::Layer3Subinterface,
    class_name: "network.Layer3Subinterface",
    root: Root::Device,
    segment: "/layer3/units",
    suffix: Suffix::Entry,
    children: &[],
    params: &LAYER3_SUBINTERFACE_PARAMS,
    scope_root: false,
    vsys_import: Some("interface"),
    alternate_parent: Some(AlternateParent {
        pattern: r"^(ethernet\d+/\d{1,3})\.\d{1,4}$",
        base_segment: "/network/interface/ethernet",
        units_segment: "/layer3/units",
    }),
    unit_tag_from_name: true,
};

static VLAN_INTERFACE_PARAMS: [ParamSpec; 5] = [
    ParamSpec::wire("ip", "ip", ParamType::Entry),
    ParamSpec::wire(
        "management_profile",
        "interface-management-profile",
        ParamType::Text,
    ),
    ParamSpec::wire("comment", "comment", ParamType::Text),
    ParamSpec::reference("zone", EntityKind::Zone, "network/layer3"),
    ParamSpec::reference("virtual_router", EntityKind::VirtualRouter, "interface"),
];

pub(super) static VLAN_INTERFACE: KindSpec = KindSpec {
    kind: EntityKind::VlanInterface,
    class_name: "network.VlanInterface",
    root: Root::Device,
    segment: "/network/interface/vlan/units",
    suffix: Suffix::Entry,
    children: &[],
    params: &VLAN_INTERFACE_PARAMS,
    scope_root: false,
    vsys_import: Some("interface"),
    alternate_parent: None,
    unit_tag_from_name: false,
};

static ZONE_PARAMS: [ParamSpec; 4] = [
    ParamSpec::wire("mode", "network", ParamType::Selector(ZONE_MODES))
        .with_default("layer3")
        .emitted(),
    ParamSpec::wire("interface", "network/{mode}", ParamType::Member),
    ParamSpec::wire("log_setting", "network/log-setting", ParamType::Text),
    ParamSpec::wire(
        "enable_user_identification",
        "enable-user-identification",
        ParamType::YesNo,
    ),
];

pub(super) static ZONE: KindSpec = KindSpec {
    kind: EntityKind::Zone,
    class_name: "network.Zone",
    root: Root::Vsys,
    segment: "/zone",
    suffix: Suffix::Entry,
    children: &[],
    params: &ZONE_PARAMS,
    scope_root: false,
    vsys_import: None,
    alternate_parent: None,
    unit_tag_from_name: false,
};
