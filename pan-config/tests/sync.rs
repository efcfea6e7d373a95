mod common;

use pan_config::xpath::{self, DEVICE_ROOT};
use pan_config::{
    ClientError, ConfigError, ConfigTree, DirtyState, EntityKind, NodeId, SyncEngine, Value,
};
use pretty_assertions::assert_eq;
use semver::Version;

use common::{Call, MockClient};

const ETH: &str = "/network/interface/ethernet/entry[@name='ethernet1/1']";

fn firewall() -> (ConfigTree, NodeId) {
    let mut tree = ConfigTree::new(Version::new(8, 0, 0));
    let fw = tree.insert(EntityKind::Firewall, None);
    (tree, fw)
}

fn member(name: &str) -> String {
    format!("<member>{name}</member>")
}

fn zone_interfaces(zone: &str) -> String {
    format!("{DEVICE_ROOT}/vsys/entry[@name='vsys1']/zone/entry[@name='{zone}']/network/layer3")
}

fn router_interfaces(router: &str) -> String {
    format!("{DEVICE_ROOT}/network/virtual-router/entry[@name='{router}']/interface")
}

fn state(tree: &ConfigTree, id: NodeId) -> DirtyState {
    tree.node(id).expect("live node").state()
}

#[test]
fn push_edits_entity_before_adding_memberships() {
    let (mut tree, fw) = firewall();
    let eth = tree
        .add(fw, EntityKind::EthernetInterface, Some("ethernet1/1"))
        .expect("eth");
    tree.set(eth, "zone", "trust").expect("zone");
    tree.set(eth, "virtual_router", "default").expect("vr");

    let client = MockClient::new();
    SyncEngine::new(&client).push(&mut tree, eth).expect("push");

    let calls = client.calls();
    assert_eq!(calls.len(), 3, "{calls:?}");
    match &calls[0] {
        Call::Edit(xpath, element) => {
            assert_eq!(xpath, &format!("{DEVICE_ROOT}{ETH}"));
            assert!(element.starts_with(r#"<entry name="ethernet1/1">"#), "{element}");
        }
        other => panic!("expected edit first, got {other:?}"),
    }
    assert_eq!(
        calls[1..],
        [
            Call::Set(zone_interfaces("trust"), member("ethernet1/1")),
            Call::Set(router_interfaces("default"), member("ethernet1/1")),
        ]
    );
    assert_eq!(state(&tree, eth), DirtyState::Clean);
}

#[test]
fn create_merges_into_collection() {
    let (mut tree, fw) = firewall();
    let zone = tree.add(fw, EntityKind::Zone, Some("dmz")).expect("zone");

    let client = MockClient::new();
    SyncEngine::new(&client).create(&mut tree, zone).expect("create");

    assert_eq!(
        client.calls(),
        vec![Call::Set(
            format!("{DEVICE_ROOT}/vsys/entry[@name='vsys1']/zone"),
            r#"<entry name="dmz"><network><layer3/></network></entry>"#.to_string(),
        )]
    );
    assert_eq!(state(&tree, zone), DirtyState::Clean);
}

#[test]
fn push_covers_embedded_units() {
    let (mut tree, fw) = firewall();
    let eth = tree
        .add(fw, EntityKind::EthernetInterface, Some("ethernet1/1"))
        .expect("eth");
    let unit = tree
        .add(eth, EntityKind::Layer3Subinterface, Some("ethernet1/1.5"))
        .expect("unit");
    tree.set(unit, "zone", "dmz").expect("zone");

    let client = MockClient::new();
    SyncEngine::new(&client).push(&mut tree, eth).expect("push");

    let calls = client.calls();
    assert_eq!(calls.len(), 2, "{calls:?}");
    match &calls[0] {
        Call::Edit(_, element) => assert!(
            element.contains(r#"<units><entry name="ethernet1/1.5"><tag>5</tag></entry></units>"#),
            "{element}"
        ),
        other => panic!("expected edit, got {other:?}"),
    }
    assert_eq!(calls[1], Call::Set(zone_interfaces("dmz"), member("ethernet1/1.5")));
    assert_eq!(state(&tree, unit), DirtyState::Clean);
}

#[test]
fn remove_drops_memberships_before_entity() {
    let (mut tree, fw) = firewall();
    let eth = tree
        .add(fw, EntityKind::EthernetInterface, Some("ethernet1/1"))
        .expect("eth");
    tree.set(eth, "zone", "trust").expect("zone");
    tree.set(eth, "virtual_router", "default").expect("vr");

    let client = MockClient::new();
    SyncEngine::new(&client).remove(&mut tree, eth).expect("remove");

    assert_eq!(
        client.calls(),
        vec![
            Call::Delete(format!("{}/member[text()='ethernet1/1']", zone_interfaces("trust"))),
            Call::Delete(format!(
                "{}/member[text()='ethernet1/1']",
                router_interfaces("default")
            )),
            Call::Delete(format!("{DEVICE_ROOT}{ETH}")),
        ]
    );
    assert!(!tree.contains(eth));
    assert!(tree.node(fw).expect("fw").children().is_empty());
}

#[test]
fn zone_change_moves_interface_membership() {
    let (mut tree, fw) = firewall();
    let eth = tree
        .add(fw, EntityKind::EthernetInterface, Some("ethernet1/1"))
        .expect("eth");
    tree.set(eth, "zone", "trust").expect("zone");

    let client = MockClient::new();
    let engine = SyncEngine::new(&client);
    engine.push(&mut tree, eth).expect("first push");
    tree.set(eth, "zone", "untrust").expect("zone");
    engine.push(&mut tree, eth).expect("second push");

    let calls = client.calls();
    assert_eq!(calls.len(), 5, "{calls:?}");
    assert!(matches!(calls[0], Call::Edit(..)));
    assert_eq!(calls[1], Call::Set(zone_interfaces("trust"), member("ethernet1/1")));
    assert!(matches!(calls[2], Call::Edit(..)));
    assert_eq!(
        calls[3..],
        [
            Call::Delete(format!("{}/member[text()='ethernet1/1']", zone_interfaces("trust"))),
            Call::Set(zone_interfaces("untrust"), member("ethernet1/1")),
        ]
    );

    let applied = tree
        .node(eth)
        .expect("eth")
        .applied_memberships()
        .expect("pushed")
        .to_vec();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].xpath, zone_interfaces("untrust"));
}

#[test]
fn unchanged_push_keeps_memberships() {
    let (mut tree, fw) = firewall();
    let eth = tree
        .add(fw, EntityKind::EthernetInterface, Some("ethernet1/1"))
        .expect("eth");
    tree.set(eth, "zone", "trust").expect("zone");

    let client = MockClient::new();
    let engine = SyncEngine::new(&client);
    engine.push(&mut tree, eth).expect("first push");
    tree.set(eth, "comment", "uplink").expect("comment");
    engine.push(&mut tree, eth).expect("second push");

    assert!(client.calls().iter().all(|c| !matches!(c, Call::Delete(_))));
}

#[test]
fn remove_after_push_drops_pushed_memberships() {
    let (mut tree, fw) = firewall();
    let eth = tree
        .add(fw, EntityKind::EthernetInterface, Some("ethernet1/1"))
        .expect("eth");
    tree.set(eth, "zone", "trust").expect("zone");

    let client = MockClient::new();
    let engine = SyncEngine::new(&client);
    engine.push(&mut tree, eth).expect("push");
    // Changed locally but never pushed: the device still has trust.
    tree.set(eth, "zone", "untrust").expect("zone");
    let start = client.calls().len();
    engine.remove(&mut tree, eth).expect("remove");

    assert_eq!(
        client.calls()[start..],
        [
            Call::Delete(format!("{}/member[text()='ethernet1/1']", zone_interfaces("trust"))),
            Call::Delete(format!("{DEVICE_ROOT}{ETH}")),
        ]
    );
}

#[test]
fn failed_membership_leaves_entity_applied() {
    let (mut tree, fw) = firewall();
    let eth = tree
        .add(fw, EntityKind::EthernetInterface, Some("ethernet1/1"))
        .expect("eth");
    tree.set(eth, "zone", "trust").expect("zone");

    let client = MockClient::new().failing_when(|call| matches!(call, Call::Set(..)));
    let err = SyncEngine::new(&client)
        .push(&mut tree, eth)
        .expect_err("membership set fails");

    assert!(
        matches!(err, ConfigError::Client(ClientError::Api { ref code, .. }) if code.as_deref() == Some("12")),
        "{err}"
    );
    let calls = client.calls();
    assert_eq!(calls.len(), 2);
    assert!(matches!(calls[0], Call::Edit(..)));
    assert!(calls.iter().all(|c| !matches!(c, Call::Delete(_))));
    assert_eq!(state(&tree, eth), DirtyState::Modified);
}

#[test]
fn failed_delete_keeps_node_pending() {
    let (mut tree, fw) = firewall();
    let vr = tree
        .add(fw, EntityKind::VirtualRouter, Some("default"))
        .expect("vr");
    tree.mark_clean(vr).expect("clean");

    let client = MockClient::new().failing_when(|call| matches!(call, Call::Delete(_)));
    SyncEngine::new(&client)
        .remove(&mut tree, vr)
        .expect_err("delete fails");

    assert_eq!(state(&tree, vr), DirtyState::PendingDelete);
}

#[test]
fn sync_walks_parents_first_and_skips_embedded_nodes() {
    let (mut tree, fw) = firewall();
    let vr = tree
        .add(fw, EntityKind::VirtualRouter, Some("default"))
        .expect("vr");
    let route = tree.add(vr, EntityKind::StaticRoute, Some("r1")).expect("route");
    tree.set(route, "destination", "10.0.0.0/8").expect("destination");
    let eth = tree
        .add(fw, EntityKind::EthernetInterface, Some("ethernet1/1"))
        .expect("eth");
    let old = tree.add(fw, EntityKind::Zone, Some("old")).expect("zone");
    tree.mark_pending_delete(old).expect("pending");
    let kept = tree.add(fw, EntityKind::Tag, Some("kept")).expect("tag");
    tree.mark_clean(kept).expect("clean");

    let client = MockClient::new();
    SyncEngine::new(&client).sync(&mut tree, fw).expect("sync");

    let touched: Vec<(&str, String)> = client
        .calls()
        .iter()
        .map(|call| match call {
            Call::Edit(x, _) => ("edit", x.clone()),
            Call::Delete(x) => ("delete", x.clone()),
            other => panic!("unexpected call {other:?}"),
        })
        .collect();
    assert_eq!(
        touched,
        vec![
            (
                "edit",
                format!("{DEVICE_ROOT}/network/virtual-router/entry[@name='default']")
            ),
            ("edit", format!("{DEVICE_ROOT}{ETH}")),
            (
                "delete",
                format!("{DEVICE_ROOT}/vsys/entry[@name='vsys1']/zone/entry[@name='old']")
            ),
        ]
    );
    for id in [fw, vr, route, eth, kept] {
        assert_eq!(state(&tree, id), DirtyState::Clean);
    }
    assert!(!tree.contains(old));
}

#[test]
fn refresh_replaces_values_and_units() {
    let (mut tree, fw) = firewall();
    let eth = tree
        .add(fw, EntityKind::EthernetInterface, Some("ethernet1/1"))
        .expect("eth");
    tree.set(eth, "comment", "stale").expect("comment");
    tree.set(eth, "zone", "trust").expect("zone");
    let gone = tree
        .add(eth, EntityKind::Layer3Subinterface, Some("ethernet1/1.4"))
        .expect("unit");

    let path = xpath::resolve(&tree, eth).expect("xpath");
    let client = MockClient::new().with_config(
        path.as_str(),
        r#"<result total-count="1" count="1">
             <entry name="ethernet1/1">
               <layer3>
                 <ip><entry name="10.1.1.1/24"/></ip>
                 <units><entry name="ethernet1/1.9"><tag>9</tag></entry></units>
               </layer3>
               <comment>uplink</comment>
             </entry>
           </result>"#,
    );
    SyncEngine::new(&client).refresh(&mut tree, eth).expect("refresh");

    assert_eq!(client.calls(), vec![Call::Get(path)]);
    assert_eq!(tree.text(eth, "comment").as_deref(), Some("uplink"));
    assert_eq!(
        tree.get(eth, "ip").expect("ip"),
        Some(Value::List(vec!["10.1.1.1/24".to_string()]))
    );
    assert_eq!(tree.text(eth, "zone").as_deref(), Some("trust"));
    assert!(!tree.contains(gone));

    let units = tree.children_of_kind(eth, EntityKind::Layer3Subinterface);
    assert_eq!(units.len(), 1);
    assert_eq!(tree.node(units[0]).expect("unit").name(), Some("ethernet1/1.9"));
    assert_eq!(tree.text(units[0], "tag").as_deref(), Some("9"));
    assert_eq!(state(&tree, eth), DirtyState::Clean);
}

#[test]
fn refresh_of_missing_object_is_unexpected() {
    let (mut tree, fw) = firewall();
    let zone = tree.add(fw, EntityKind::Zone, Some("ghost")).expect("zone");

    let client = MockClient::new();
    let err = SyncEngine::new(&client)
        .refresh(&mut tree, zone)
        .expect_err("empty result");
    assert!(matches!(err, ConfigError::UnexpectedResponse { .. }), "{err}");
}

#[test]
fn refresh_all_replaces_local_collection() {
    let (mut tree, fw) = firewall();
    let stale = tree.add(fw, EntityKind::Zone, Some("stale")).expect("zone");

    let client = MockClient::new().with_config(
        format!("{DEVICE_ROOT}/vsys/entry[@name='vsys1']/zone"),
        r#"<result><zone>
             <entry name="trust"><network><layer3><member>ethernet1/1</member></layer3></network></entry>
             <entry name="untrust"/>
           </zone></result>"#,
    );
    let ids = SyncEngine::new(&client)
        .refresh_all(&mut tree, fw, EntityKind::Zone)
        .expect("refresh all");

    assert!(!tree.contains(stale));
    let names: Vec<Option<&str>> = ids
        .iter()
        .map(|id| tree.node(*id).expect("zone").name())
        .collect();
    assert_eq!(names, vec![Some("trust"), Some("untrust")]);
    assert_eq!(
        tree.get(ids[0], "interface").expect("interface"),
        Some(Value::List(vec!["ethernet1/1".to_string()]))
    );
    assert_eq!(tree.text(ids[1], "mode").as_deref(), Some("layer3"));
    assert!(ids.iter().all(|id| state(&tree, *id) == DirtyState::Clean));
}
