mod common;

use common::test_helpers::{TestFixtures, indexed, indexed_fixture, utf16le_with_bom};
use validate_arxml::{IdentityMarker, ParseError, PathKey, TreeBuilder, build, index};

fn keys(doc: &str) -> Vec<String> {
    indexed(doc)
        .iter_sorted()
        .map(|(key, _)| key.to_string())
        .collect()
}

#[tokio::test]
async fn test_fixture_paths_use_identity_names() {
    let fixtures = TestFixtures::new();
    let tree = indexed_fixture(&fixtures.complete_ecu()).await;

    let ecu = tree
        .iter()
        .find(|(_, element)| element.tag() == "ECU")
        .map(|(key, _)| key.to_string());
    assert_eq!(ecu.as_deref(), Some("/ECU[BodyController]"));

    let port = tree
        .iter()
        .find(|(_, element)| element.attribute("width") == Some("8"))
        .map(|(key, _)| key.to_string());
    assert_eq!(
        port.as_deref(),
        Some("/ECU[BodyController]/Software-Component[DoorLock]/PORT[LockRequest]")
    );

    assert_eq!(tree.root().tag(), "AUTOSAR");
    assert_eq!(tree.root().attribute("xmlns"), Some("http://autosar.org/schema/r4.0"));
    assert!(tree.has_tag("Communication"));
}

#[tokio::test]
async fn test_every_key_resolves_to_its_node() {
    let fixtures = TestFixtures::new();
    let tree = indexed_fixture(&fixtures.complete_ecu()).await;

    let mut seen = std::collections::HashSet::new();
    for (key, element) in tree.iter() {
        assert!(seen.insert(key.clone()), "duplicate key {}", key);
        let found = tree.lookup(key).expect("key should resolve");
        assert!(std::ptr::eq(found, element));
    }
    assert_eq!(seen.len(), tree.len());
}

#[test]
fn test_keys_are_stable_across_builds() {
    let doc = "<R><A><SHORT-NAME>x</SHORT-NAME></A><A/><B k='1'>t</B></R>";
    assert_eq!(keys(doc), keys(doc));
    assert_eq!(
        keys(doc),
        vec!["/", "/A[#1]", "/A[x]", "/A[x]/SHORT-NAME[#0]", "/B[#0]"]
    );
}

#[test]
fn test_namespaced_identity_tags() {
    let tree = indexed(
        "<ar:AUTOSAR xmlns:ar='urn:x'><ar:ECU><ar:SHORT-NAME>Gw</ar:SHORT-NAME></ar:ECU></ar:AUTOSAR>",
    );
    let ecu = tree.nodes_with_tag("ar:ECU");
    assert_eq!(ecu.len(), 1);
    assert_eq!(tree.key(ecu[0]).to_string(), "/ar:ECU[Gw]");
}

#[test]
fn test_custom_identity_marker() {
    let builder = TreeBuilder::new(IdentityMarker::Suffix("LABEL".to_string()));
    let tree = index(
        builder
            .build(b"<R><X><LABEL>first</LABEL></X><X><SHORT-NAME>n</SHORT-NAME></X></R>")
            .unwrap(),
    );
    let rendered: Vec<String> = tree.iter().map(|(k, _)| k.to_string()).collect();
    assert!(rendered.contains(&"/X[first]".to_string()));
    assert!(rendered.contains(&"/X[#1]".to_string()));

    let disabled = TreeBuilder::new(IdentityMarker::Disabled);
    let tree = index(disabled.build(b"<R><X><SHORT-NAME>n</SHORT-NAME></X></R>").unwrap());
    assert!(tree.iter().all(|(_, element)| element.name().is_none()));
}

#[test]
fn test_utf16_document() {
    let bytes = utf16le_with_bom(
        "<?xml version=\"1.0\" encoding=\"UTF-16\"?><ECU><SHORT-NAME>Ü1</SHORT-NAME></ECU>",
    );
    let tree = build(&bytes).unwrap();
    assert_eq!(tree.root().tag(), "ECU");
    assert_eq!(tree.root().name(), Some("Ü1"));
}

#[tokio::test]
async fn test_malformed_fixture_is_rejected() {
    let fixtures = TestFixtures::new();
    let bytes = tokio::fs::read(fixtures.malformed()).await.unwrap();

    match build(&bytes) {
        Err(ParseError::Syntax { position, message }) => {
            assert_eq!(position.line, 5);
            assert!(message.contains("Diagnostic"), "unexpected message: {}", message);
        }
        other => panic!("expected syntax error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_blank_fixture_is_empty() {
    let fixtures = TestFixtures::new();
    let bytes = tokio::fs::read(fixtures.blank()).await.unwrap();
    assert_eq!(build(&bytes).unwrap_err(), ParseError::Empty);
    assert_eq!(build(b"").unwrap_err(), ParseError::Empty);
}

#[test]
fn test_root_only_document() {
    let tree = indexed("<AUTOSAR/>");
    assert_eq!(tree.len(), 1);
    assert!(tree.tree().is_structurally_empty());
    assert!(tree.contains(&PathKey::root()));
}
