use super::{EntityKind, KindSpec, Root, Suffix};
use crate::schema::{ParamSpec, ParamType};

pub(super) static PANORAMA: KindSpec = KindSpec {
    kind: EntityKind::Panorama,
    class_name: "panorama.Panorama",
    root: Root::Panorama,
    segment: "",
    suffix: Suffix::Fixed,
    children: &[
        EntityKind::Firewall,
        EntityKind::DeviceGroup,
        EntityKind::AddressObject,
        EntityKind::Tag,
    ],
    params: &[],
    scope_root: true,
    vsys_import: None,
    alternate_parent: None,
    unit_tag_from_name: false,
};

// Device records. Status fields come from `show devices` output; `vsys`
// and `vsys_name` are local keys set during reconciliation.
static FIREWALL_PARAMS: [ParamSpec; 11] = [
    ParamSpec::local("vsys"),
    ParamSpec::local("vsys_name"),
    ParamSpec::wire("hostname", "hostname", ParamType::Text).status(),
    ParamSpec::wire("management_ip", "ip-address", ParamType::Text).status(),
    ParamSpec::wire("version", "sw-version", ParamType::Text).status(),
    ParamSpec::wire("model", "model", ParamType::Text).status(),
    ParamSpec::wire("multi_vsys", "multi-vsys", ParamType::YesNo).status(),
    ParamSpec::wire("connected", "connected", ParamType::YesNo).status(),
    ParamSpec::wire("ha_state", "ha/state", ParamType::Text).status(),
    ParamSpec::wire("ha_peer", "ha/peer/serial", ParamType::Text).status(),
    ParamSpec::wire("shared_policy_status", "shared-policy-status", ParamType::Text).status(),
];

pub(super) static FIREWALL: KindSpec = KindSpec {
    kind: EntityKind::Firewall,
    class_name: "firewall.Firewall",
    root: Root::MgtConfig,
    segment: "/devices",
    suffix: Suffix::Entry,
    children: &[
        EntityKind::Vsys,
        EntityKind::SystemSettings,
        EntityKind::VirtualRouter,
        EntityKind::EthernetInterface,
        EntityKind::Layer3Subinterface,
        EntityKind::VlanInterface,
        EntityKind::Zone,
        EntityKind::AddressObject,
        EntityKind::Tag,
    ],
    params: &FIREWALL_PARAMS,
    scope_root: true,
    vsys_import: None,
    alternate_parent: None,
    unit_tag_from_name: false,
};

static DEVICE_GROUP_PARAMS: [ParamSpec; 2] = [
    ParamSpec::wire("description", "description", ParamType::Text),
    ParamSpec::wire("tag", "tag", ParamType::Entry),
];

pub(super) static DEVICE_GROUP: KindSpec = KindSpec {
    kind: EntityKind::DeviceGroup,
    class_name: "panorama.DeviceGroup",
    root: Root::Device,
    segment: "/device-group",
    suffix: Suffix::Entry,
    children: &[
        EntityKind::Firewall,
        EntityKind::AddressObject,
        EntityKind::Tag,
    ],
    params: &DEVICE_GROUP_PARAMS,
    scope_root: true,
    vsys_import: None,
    alternate_parent: None,
    unit_tag_from_name: false,
};

static VSYS_PARAMS: [ParamSpec; 1] =
    [ParamSpec::wire("display_name", "display-name", ParamType::Text)];

pub(super) static VSYS: KindSpec = KindSpec {
    kind: EntityKind::Vsys,
    class_name: "device.Vsys",
    root: Root::Device,
    segment: "/vsys",
    suffix: Suffix::Entry,
    children: &[
        EntityKind::VirtualRouter,
        EntityKind::EthernetInterface,
        EntityKind::Layer3Subinterface,
        EntityKind::VlanInterface,
        EntityKind::Zone,
        EntityKind::AddressObject,
        EntityKind::Tag,
    ],
    params: &VSYS_PARAMS,
    scope_root: true,
    vsys_import: None,
    alternate_parent: None,
    unit_tag_from_name: false,
};

static SYSTEM_SETTINGS_PARAMS: [ParamSpec; 8] = [
    ParamSpec::wire("hostname", "hostname", ParamType::Text),
    ParamSpec::wire("domain", "domain", ParamType::Text),
    ParamSpec::wire("ip_address", "ip-address", ParamType::Text),
    ParamSpec::wire("netmask", "netmask", ParamType::Text),
    ParamSpec::wire("default_gateway", "default-gateway", ParamType::Text),
    ParamSpec::wire("dns_primary", "dns-setting/servers/primary", ParamType::Text),
    ParamSpec::wire("dns_secondary", "dns-setting/servers/secondary", ParamType::Text),
    ParamSpec::wire("timezone", "timezone", ParamType::Text),
];

pub(super) static SYSTEM_SETTINGS: KindSpec = KindSpec {
    kind: EntityKind::SystemSettings,
    class_name: "device.SystemSettings",
    root: Root::Device,
    segment: "/deviceconfig/system",
    suffix: Suffix::Fixed,
    children: &[],
    params: &SYSTEM_SETTINGS_PARAMS,
    scope_root: false,
    vsys_import: None,
    alternate_parent: None,
    unit_tag_from_name: false,
};
