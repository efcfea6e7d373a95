use pan_xml::{parse, XmlNode};
use pretty_assertions::assert_eq;
use semver::Version;

use super::{materialize, reconcile, DeviceRef, RefreshOptions, RemoteViews};
use crate::error::ConfigError;
use crate::kind::EntityKind;
use crate::tree::{ConfigTree, DirtyState};

const DEVICES: &[u8] = br#"<devices>
  <entry name="S1">
    <serial>S1</serial>
    <hostname>fw-a</hostname>
    <ip-address>10.0.0.1</ip-address>
    <sw-version>8.0.2</sw-version>
    <model>PA-3020</model>
    <multi-vsys>yes</multi-vsys>
    <connected>yes</connected>
    <vsys>
      <entry name="vsys1"><display-name>Main</display-name></entry>
      <entry name="vsys2"><display-name>Lab</display-name></entry>
    </vsys>
  </entry>
  <entry name="S2">
    <serial>S2</serial>
    <hostname>fw-b</hostname>
    <multi-vsys>no</multi-vsys>
    <connected>no</connected>
    <ha><state>passive</state><peer><serial>S3</serial></peer></ha>
    <vsys><entry name="vsys1"/></vsys>
  </entry>
</devices>"#;

const GROUPS: &[u8] = br#"<device-group>
  <entry name="DG1">
    <description>branch</description>
    <devices>
      <entry name="S1"><vsys><entry name="vsys1"/></vsys></entry>
    </devices>
  </entry>
</device-group>"#;

const GROUP_STATUS: &[u8] = br#"<devicegroups>
  <entry name="DG1">
    <devices>
      <entry name="S1">
        <serial>S1</serial>
        <vsys>
          <entry name="vsys1"><shared-policy-status>In Sync</shared-policy-status></entry>
        </vsys>
      </entry>
    </devices>
  </entry>
</devicegroups>"#;

fn views(groups: &[u8]) -> RemoteViews {
    RemoteViews {
        devices: parse(DEVICES).expect("devices"),
        device_groups: Some(parse(groups).expect("groups")),
        group_status: Some(parse(GROUP_STATUS).expect("status")),
    }
}

fn keys(records: &[super::DeviceRecord]) -> Vec<(String, String)> {
    records.iter().map(|r| r.key()).collect()
}

fn key(serial: &str, vsys: &str) -> (String, String) {
    (serial.to_string(), vsys.to_string())
}

#[test]
fn group_claims_declared_vsys_and_leaves_the_rest_at_root() {
    let assignment =
        reconcile(&views(GROUPS), &RefreshOptions::default(), "panorama").expect("reconcile");

    assert_eq!(assignment.groups.len(), 1);
    let dg1 = &assignment.groups[0];
    assert_eq!(dg1.name, "DG1");
    assert_eq!(keys(&dg1.devices), vec![key("S1", "vsys1")]);
    assert_eq!(dg1.devices[0].shared_policy_status.as_deref(), Some("In Sync"));
    assert_eq!(dg1.config.get_child("devices"), None);

    assert_eq!(
        keys(&assignment.ungrouped),
        vec![key("S1", "vsys2"), key("S2", "vsys1")]
    );
    assert_eq!(assignment.placeholders, 0);
}

#[test]
fn expansion_splits_devices_by_vsys() {
    let opts = RefreshOptions {
        include_device_groups: false,
        ..RefreshOptions::default()
    };
    let assignment = reconcile(&views(GROUPS), &opts, "panorama").expect("reconcile");
    let s1: Vec<_> = assignment
        .ungrouped
        .iter()
        .filter(|r| r.serial == "S1")
        .collect();

    assert_eq!(s1.len(), 2);
    assert_eq!(s1[0].vsys, "vsys1");
    assert_eq!(s1[0].vsys_name.as_deref(), Some("Main"));
    assert_eq!(s1[1].vsys, "vsys2");
    assert_eq!(s1[1].vsys_name.as_deref(), Some("Lab"));
    for record in s1 {
        let status = record.status.as_ref().expect("status");
        assert!(status.get_child("vsys").is_none());
        assert_eq!(record.hostname(), Some("fw-a"));
    }
}

#[test]
fn without_expansion_multi_vsys_devices_are_shared() {
    let opts = RefreshOptions {
        expand_vsys: false,
        ..RefreshOptions::default()
    };
    let assignment = reconcile(&views(GROUPS), &opts, "panorama").expect("reconcile");

    assert_eq!(keys(&assignment.groups[0].devices), vec![key("S1", "shared")]);
    assert_eq!(keys(&assignment.ungrouped), vec![key("S2", "vsys1")]);
}

#[test]
fn member_without_vsys_list_is_taken_as_vsys1() {
    let groups = br#"<device-group>
      <entry name="DG2"><devices><entry name="S2"/></devices></entry>
    </device-group>"#;
    let assignment =
        reconcile(&views(groups), &RefreshOptions::default(), "panorama").expect("reconcile");

    assert_eq!(keys(&assignment.groups[0].devices), vec![key("S2", "vsys1")]);
    assert!(!assignment.groups[0].devices[0].connected());
}

#[test]
fn unknown_group_member_becomes_placeholder() {
    let groups = br#"<device-group>
      <entry name="DG1">
        <devices><entry name="S9"><vsys><entry name="vsys3"/></vsys></entry></devices>
      </entry>
    </device-group>"#;
    let assignment =
        reconcile(&views(groups), &RefreshOptions::default(), "panorama").expect("reconcile");

    let placeholder = &assignment.groups[0].devices[0];
    assert_eq!(placeholder.key(), key("S9", "vsys3"));
    assert!(placeholder.is_placeholder());
    assert_eq!(placeholder.shared_policy_status, None);
    assert_eq!(assignment.placeholders, 1);

    let connected_only = RefreshOptions {
        only_connected: true,
        ..RefreshOptions::default()
    };
    let assignment = reconcile(&views(groups), &connected_only, "panorama").expect("reconcile");
    assert!(assignment.groups[0].devices.is_empty());
    assert_eq!(assignment.placeholders, 0);
}

#[test]
fn requested_device_missing_from_operational_view_fails() {
    let attached = RefreshOptions {
        devices: vec![DeviceRef::serial("S7")],
        ..RefreshOptions::default()
    };
    let err = reconcile(&views(GROUPS), &attached, "pano1").expect_err("missing");
    assert!(matches!(err, ConfigError::DeviceNotAttached { ref serial, .. } if serial == "S7"));

    let connected = RefreshOptions {
        only_connected: true,
        ..attached
    };
    let err = reconcile(&views(GROUPS), &connected, "pano1").expect_err("missing");
    assert_eq!(
        err.to_string(),
        "can't find device with serial S7 attached and connected to pano1"
    );

    let vsys = RefreshOptions {
        devices: vec![DeviceRef::with_vsys("S1", "vsys9")],
        ..RefreshOptions::default()
    };
    let err = reconcile(&views(GROUPS), &vsys, "pano1").expect_err("missing vsys");
    assert!(matches!(
        err,
        ConfigError::DeviceNotAttached { vsys: Some(ref v), .. } if v == "vsys9"
    ));
}

#[test]
fn requested_vsys_limits_records_and_membership() {
    let opts = RefreshOptions {
        devices: vec![DeviceRef::with_vsys("S1", "vsys2")],
        ..RefreshOptions::default()
    };
    let assignment = reconcile(&views(GROUPS), &opts, "panorama").expect("reconcile");

    assert!(assignment.groups[0].devices.is_empty());
    assert_eq!(keys(&assignment.ungrouped), vec![key("S1", "vsys2")]);
    assert_eq!(assignment.placeholders, 0);
}

#[test]
fn plain_serial_request_keeps_every_vsys() {
    let opts = RefreshOptions {
        devices: vec![DeviceRef::from("S1")],
        ..RefreshOptions::default()
    };
    let assignment = reconcile(&views(GROUPS), &opts, "panorama").expect("reconcile");

    assert_eq!(keys(&assignment.groups[0].devices), vec![key("S1", "vsys1")]);
    assert_eq!(keys(&assignment.ungrouped), vec![key("S1", "vsys2")]);
}

fn controller() -> (ConfigTree, crate::tree::NodeId) {
    let mut tree = ConfigTree::new(Version::new(8, 0, 0));
    let panorama = tree.insert(EntityKind::Panorama, None);
    (tree, panorama)
}

#[test]
fn materialized_devices_carry_status_fields() {
    let (mut tree, panorama) = controller();
    let assignment =
        reconcile(&views(GROUPS), &RefreshOptions::default(), "panorama").expect("reconcile");
    let ids = materialize(&mut tree, panorama, assignment, false).expect("materialize");

    assert_eq!(ids.len(), 3);
    let dg1 = ids[2];
    assert_eq!(tree.node(dg1).expect("dg").kind(), EntityKind::DeviceGroup);
    assert_eq!(tree.text(dg1, "description").as_deref(), Some("branch"));
    let member = tree.node(dg1).expect("dg").children()[0];
    assert_eq!(tree.node(member).expect("fw").name(), Some("S1"));
    assert_eq!(tree.text(member, "vsys").as_deref(), Some("vsys1"));
    assert_eq!(tree.text(member, "management_ip").as_deref(), Some("10.0.0.1"));
    assert_eq!(tree.text(member, "multi_vsys").as_deref(), Some("yes"));
    assert_eq!(
        tree.text(member, "shared_policy_status").as_deref(),
        Some("In Sync")
    );

    let s2 = ids[1];
    assert_eq!(tree.text(s2, "ha_peer").as_deref(), Some("S3"));
    assert_eq!(tree.node(s2).expect("s2").parent(), None);
    assert!(tree.node(panorama).expect("panorama").children().is_empty());
}

#[test]
fn add_replaces_devices_but_keeps_group_contents() {
    let (mut tree, panorama) = controller();
    let dg1 = tree
        .add(panorama, EntityKind::DeviceGroup, Some("DG1"))
        .expect("dg1");
    let address = tree
        .add(dg1, EntityKind::AddressObject, Some("web"))
        .expect("address");
    let stale = tree.add(dg1, EntityKind::Firewall, Some("S0")).expect("stale");
    let stray = tree
        .add(panorama, EntityKind::Firewall, Some("S8"))
        .expect("stray");

    let assignment =
        reconcile(&views(GROUPS), &RefreshOptions::default(), "panorama").expect("reconcile");
    let ids = materialize(&mut tree, panorama, assignment, true).expect("materialize");

    assert_eq!(ids.last().copied(), Some(dg1));
    assert!(!tree.contains(stale));
    assert!(!tree.contains(stray));
    let dg_children = tree.node(dg1).expect("dg1").children().to_vec();
    assert_eq!(dg_children[0], address);
    assert_eq!(tree.children_of_kind(dg1, EntityKind::Firewall).len(), 1);
    assert_eq!(tree.children_of_kind(panorama, EntityKind::Firewall).len(), 2);
    for device in &ids[..2] {
        assert_eq!(tree.node(*device).expect("fw").state(), DirtyState::Clean);
    }
}

#[test]
fn refresh_is_idempotent_on_unchanged_views() {
    let opts = RefreshOptions::default();
    let (mut tree, panorama) = controller();

    let first = reconcile(&views(GROUPS), &opts, "panorama").expect("first");
    materialize(&mut tree, panorama, first, true).expect("first materialize");
    let before = tree.snapshot(panorama).expect("snapshot");

    let second = reconcile(&views(GROUPS), &opts, "panorama").expect("second");
    materialize(&mut tree, panorama, second, true).expect("second materialize");
    assert_eq!(tree.snapshot(panorama).expect("snapshot"), before);

    let (mut other, other_panorama) = controller();
    let third = reconcile(&views(GROUPS), &opts, "panorama").expect("third");
    materialize(&mut other, other_panorama, third, true).expect("third materialize");
    assert!(tree.structurally_equal(panorama, &other, other_panorama));
}

#[test]
fn missing_group_views_leave_every_device_ungrouped() {
    let views = RemoteViews {
        devices: parse(DEVICES).expect("devices"),
        device_groups: None,
        group_status: None,
    };
    let assignment = reconcile(&views, &RefreshOptions::default(), "panorama").expect("reconcile");
    assert!(assignment.groups.is_empty());
    assert_eq!(assignment.ungrouped.len(), 3);

    let empty = RemoteViews {
        devices: XmlNode::new("devices"),
        ..RemoteViews::default()
    };
    let assignment = reconcile(&empty, &RefreshOptions::default(), "panorama").expect("empty");
    assert_eq!(assignment, super::Assignment::default());
}
