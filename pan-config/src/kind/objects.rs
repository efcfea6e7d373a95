use super::{EntityKind, KindSpec, Root, Suffix};
use crate::schema::{ParamSpec, ParamType};

static ADDRESS_OBJECT_PARAMS: [ParamSpec; 4] = [
    ParamSpec::wire(
        "address_type",
        "",
        ParamType::Selector(&["ip-netmask", "ip-range", "fqdn", "ip-wildcard"]),
    )
    .with_default("ip-netmask"),
    ParamSpec::wire("value", "{address_type}", ParamType::Text),
    ParamSpec::wire("description", "description", ParamType::Text),
    ParamSpec::wire("tag", "tag", ParamType::Member),
];

pub(super) static ADDRESS_OBJECT: KindSpec = KindSpec {
    kind: EntityKind::AddressObject,
    class_name: "objects.AddressObject",
    root: Root::Vsys,
    segment: "/address",
    suffix: Suffix::Entry,
    children: &[],
    params: &ADDRESS_OBJECT_PARAMS,
    scope_root: false,
    vsys_import: None,
    alternate_parent: None,
    unit_tag_from_name: false,
};

static TAG_PARAMS: [ParamSpec; 2] = [
    ParamSpec::wire("color", "color", ParamType::Text),
    ParamSpec::wire("comments", "comments", ParamType::Text),
];

pub(super) static TAG: KindSpec = KindSpec {
    kind: EntityKind::Tag,
    class_name: "objects.Tag",
    root: Root::Vsys,
    segment: "/tag",
    suffix: Suffix::Entry,
    children: &[],
    params: &TAG_PARAMS,
    scope_root: false,
    vsys_import: None,
    alternate_parent: None,
    unit_tag_from_name: false,
};
