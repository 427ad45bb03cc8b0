use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use serde_json::{json, Value};
use speculate2::speculate;
use storymap::models::*;
use storymap::{IncludeLevel, NodeDoc, StoryMap, StoryMapError, StoryMapStore};
use tempfile::TempDir;

fn fixture() -> Value {
    json!({
        "epics": [{
            "name": "Checkout",
            "sequential_order": 0,
            "domain_concepts": [{"name": "Cart", "description": "Items picked", "owner": "team-a"}],
            "sub_epics": [{
                "name": "Pay by card",
                "sequential_order": 0,
                "test_file": "test_payment.py",
                "sub_epics": [],
                "story_groups": [{
                    "type": "and",
                    "sequential_order": 0,
                    "stories": [
                        {
                            "name": "Enter card details",
                            "sequential_order": 0,
                            "users": ["Shopper"],
                            "story_type": "user",
                            "test_class": "TestEnterCardDetails",
                            "acceptance_criteria": [{"name": "Card number is validated", "sequential_order": 0}],
                            "scenarios": [{
                                "name": "Valid card",
                                "sequential_order": 0,
                                "scenario_type": "happy_path",
                                "background": ["Given a cart with one item"],
                                "examples": {"columns": ["number"], "rows": [["4111"]]},
                                "test_method": "test_valid_card",
                                "steps": [
                                    {"name": "When I pay", "sequential_order": 0},
                                    {"name": "Then the payment is accepted", "sequential_order": 1}
                                ]
                            }]
                        },
                        {"name": "Refund", "sequential_order": 1, "acceptance_criteria": [], "scenarios": []}
                    ]
                }]
            }],
            "story_groups": []
        }],
        "increments": [
            {"name": "MVP", "priority": 1, "stories": ["Enter card details"], "goal": "first release"}
        ]
    })
}

fn write_json(path: &Path, value: &Value) {
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn bump_mtime(path: &Path) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(10))
        .unwrap();
}

/// Drop derived and position-dependent fields before comparing node documents.
fn strip(mut value: Value) -> Value {
    fn drop_links(value: &mut Value) {
        match value {
            Value::Object(obj) => {
                obj.remove("file_link");
                obj.values_mut().for_each(drop_links);
            }
            Value::Array(items) => items.iter_mut().for_each(drop_links),
            _ => {}
        }
    }
    drop_links(&mut value);
    if let Value::Object(obj) = &mut value {
        obj.remove("sequential_order");
    }
    value
}

speculate! {
    before {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("story-graph.json");
        write_json(&path, &fixture());
    }

    describe "load" {
        it "builds the tree from the document" {
            let map = StoryMap::load(&path).unwrap();

            let checkout = map.find_node("Checkout").unwrap();
            let card = map.find_node("Pay by card").unwrap();
            let enter = map.find_story("Enter card details").unwrap();

            assert_eq!(map.epics(), &[checkout]);
            assert_eq!(map.sub_epics(checkout), vec![card]);
            assert_eq!(map.stories(card).len(), 2);
            assert_eq!(map.governing_test_file(enter), Some("test_payment.py"));
            assert_eq!(map.source(), Some(path.as_path()));
            assert_eq!(map.increments().get("MVP").unwrap().stories, vec!["Enter card details"]);

            match map.get(enter).unwrap().data() {
                NodeData::Story(data) => {
                    assert_eq!(data.test_class.as_deref(), Some("TestEnterCardDetails"));
                    assert_eq!(data.users, vec!["Shopper"]);
                }
                other => panic!("expected story data, got {other:?}"),
            }
        }

        it "fails when the file is absent" {
            let err = StoryMap::load(dir.path().join("missing.json")).unwrap_err();
            assert!(matches!(err, StoryMapError::DocumentNotFound(_)));
        }

        it "fails on unparsable JSON" {
            fs::write(&path, "{ \"epics\": [").unwrap();
            assert!(matches!(StoryMap::load(&path), Err(StoryMapError::MalformedDocument(_))));
        }

        it "fails when a required sequential_order is missing" {
            let mut doc = fixture();
            doc["epics"][0]["sub_epics"][0]["story_groups"][0]["stories"][1]
                .as_object_mut()
                .unwrap()
                .remove("sequential_order");
            write_json(&path, &doc);

            match StoryMap::load(&path) {
                Err(StoryMapError::MalformedDocument(msg)) => {
                    assert!(msg.contains("Refund"));
                    assert!(msg.contains("sequential_order"));
                }
                other => panic!("expected a malformed document error, got {other:?}"),
            }
        }

        it "orders siblings by fractional keys and renumbers them" {
            write_json(&path, &json!({
                "epics": [{
                    "name": "E",
                    "sub_epics": [
                        {"name": "B", "sequential_order": 1.5},
                        {"name": "A", "sequential_order": 0.5}
                    ]
                }]
            }));

            let map = StoryMap::load(&path).unwrap();
            let subs = map.sub_epics(map.epics()[0]);
            let names: Vec<&str> = subs.iter().map(|id| map.name(*id).unwrap()).collect();
            let orders: Vec<usize> = subs.iter().map(|id| map.get(*id).unwrap().sequential_order()).collect();
            assert_eq!(names, vec!["A", "B"]);
            assert_eq!(orders, vec![0, 1]);
        }

        it "closes gaps and repeats in whole-number keys" {
            write_json(&path, &json!({
                "epics": [
                    {"name": "Late", "sequential_order": 3},
                    {"name": "Early", "sequential_order": -1, "sub_epics": [
                        {"name": "A", "sequential_order": 0},
                        {"name": "B", "sequential_order": 5},
                        {"name": "C", "sequential_order": 5}
                    ]}
                ]
            }));

            let mut map = StoryMap::load(&path).unwrap();
            let epics = map.epics().to_vec();
            let subs = map.sub_epics(epics[0]);
            let epic_names: Vec<&str> = epics.iter().map(|id| map.name(*id).unwrap()).collect();
            let names: Vec<&str> = subs.iter().map(|id| map.name(*id).unwrap()).collect();
            let orders: Vec<usize> = subs.iter().map(|id| map.get(*id).unwrap().sequential_order()).collect();
            assert_eq!(epic_names, vec!["Early", "Late"]);
            assert_eq!(names, vec!["A", "B", "C"]);
            assert_eq!(orders, vec![0, 1, 2]);

            map.save().unwrap();
            let saved = read_json(&path);
            let written: Vec<&Value> = saved["epics"][0]["sub_epics"]
                .as_array()
                .unwrap()
                .iter()
                .map(|sub| &sub["sequential_order"])
                .collect();
            assert_eq!(written, vec![&json!(0), &json!(1), &json!(2)]);
        }
    }

    describe "save" {
        it "round trips the whole document" {
            let mut map = StoryMap::load(&path).unwrap();
            let before = map.to_document(IncludeLevel::Full).unwrap();

            map.save().unwrap();
            let reloaded = StoryMap::load(&path).unwrap();

            assert_eq!(reloaded.to_document(IncludeLevel::Full).unwrap(), before);
        }

        it "keeps fields written by other tools" {
            let mut map = StoryMap::load(&path).unwrap();
            map.save().unwrap();

            let saved = read_json(&path);
            assert_eq!(saved["epics"][0]["domain_concepts"][0]["owner"], "team-a");
            assert_eq!(saved["increments"][0]["goal"], "first release");
        }

        it "always writes container keys" {
            let mut map = StoryMap::load(&path).unwrap();
            map.save().unwrap();

            let saved = read_json(&path);
            let refund = &saved["epics"][0]["sub_epics"][0]["story_groups"][0]["stories"][1];
            assert_eq!(refund["acceptance_criteria"], json!([]));
            assert_eq!(refund["scenarios"], json!([]));
            assert_eq!(refund["file_link"], "Checkout/Pay by card/Refund.md");
        }

        it "writes every mutation through to the file" {
            let mut map = StoryMap::load(&path).unwrap();
            let card = map.find_node("Pay by card").unwrap();

            map.create_child(card, Some("Saved card"), Some(NodeKind::Story), None).unwrap();

            let reloaded = StoryMap::load(&path).unwrap();
            assert!(reloaded.find_story("Saved card").is_some());
        }

        it "leaves an unbacked map in memory" {
            let mut map = StoryMap::new();
            map.create_epic(Some("Scratch"), None).unwrap();
            assert!(map.source().is_none());
            map.save().unwrap();
        }
    }

    describe "include levels" {
        it "trims descendant detail without touching the tree" {
            let map = StoryMap::load(&path).unwrap();
            let checkout = map.epics()[0];
            let enter = map.find_story("Enter card details").unwrap();

            let concepts = map.to_dict(checkout, IncludeLevel::DomainConcepts).unwrap();
            assert!(concepts.get("story_groups").is_none());
            assert!(concepts["sub_epics"][0].get("story_groups").is_none());
            assert!(concepts["sub_epics"][0].get("test_file").is_none());
            assert_eq!(concepts["domain_concepts"][0]["name"], "Cart");

            let stories = map.to_dict(enter, IncludeLevel::Stories).unwrap();
            assert!(stories.get("acceptance_criteria").is_none());
            assert!(stories.get("scenarios").is_none());

            let scenarios = map.to_dict(enter, IncludeLevel::Scenarios).unwrap();
            assert_eq!(scenarios["acceptance_criteria"][0]["name"], "Card number is validated");
            assert_eq!(scenarios["scenarios"][0]["background"], json!(["Given a cart with one item"]));
            assert!(scenarios["scenarios"][0].get("steps").is_none());
            assert!(scenarios["scenarios"][0].get("test_method").is_none());
            assert!(scenarios.get("test_class").is_none());

            let full = map.to_dict(enter, IncludeLevel::Full).unwrap();
            assert_eq!(full["test_class"], "TestEnterCardDetails");
            assert_eq!(full["file_link"], "Checkout/Pay by card/Enter card details.md");
            assert_eq!(full["scenarios"][0]["steps"][1]["name"], "Then the payment is accepted");

            assert_eq!(map.stories(map.find_node("Pay by card").unwrap()).len(), 2);
        }
    }

    describe "from_dict" {
        it "reproduces every variant from its serialized form" {
            let source = StoryMap::load(&path).unwrap();

            for id in source.subtree(source.epics()[0]) {
                let kind = source.kind(id).unwrap();
                let value = source.to_dict(id, IncludeLevel::Full).unwrap();

                let mut target = StoryMap::new();
                let epic = target.create_epic(Some("T"), None).unwrap();
                let sub = target.create_child(epic, Some("TS"), None, None).unwrap();
                let story = target.create_child(sub, Some("TST"), Some(NodeKind::Story), None).unwrap();
                let scenario = target.create_child(story, Some("TSC"), Some(NodeKind::Scenario), None).unwrap();
                let parent = match kind {
                    NodeKind::Epic => None,
                    NodeKind::SubEpic => Some(epic),
                    NodeKind::StoryGroup | NodeKind::Story => Some(sub),
                    NodeKind::Scenario | NodeKind::AcceptanceCriteria => Some(story),
                    NodeKind::Step => Some(scenario),
                };

                let doc = NodeDoc::from_value(kind, value.clone()).unwrap();
                let copy = target.from_dict(parent, doc).unwrap();

                assert_eq!(target.kind(copy).unwrap(), kind);
                assert_eq!(target.name(copy).unwrap(), source.name(id).unwrap());
                assert_eq!(
                    strip(target.to_dict(copy, IncludeLevel::Full).unwrap()),
                    strip(value),
                    "{kind:?} did not round trip"
                );
            }
        }

        it "rejects a non-epic at the top level" {
            let mut map = StoryMap::load(&path).unwrap();
            let doc = NodeDoc::from_value(NodeKind::Story, json!({"name": "Loose"})).unwrap();
            assert!(matches!(
                map.from_dict(None, doc),
                Err(StoryMapError::HierarchyViolation { .. })
            ));
        }

        it "leaves the map untouched when a nested node is malformed" {
            let mut map = StoryMap::load(&path).unwrap();
            let card = map.find_node("Pay by card").unwrap();
            let count = map.node_count();
            let doc = NodeDoc::from_value(
                NodeKind::Story,
                json!({"name": "Broken", "scenarios": [{"name": "No order"}]}),
            )
            .unwrap();

            assert!(matches!(
                map.from_dict(Some(card), doc),
                Err(StoryMapError::MalformedDocument(_))
            ));
            assert_eq!(map.node_count(), count);
            assert!(map.find_story("Broken").is_none());
        }

        it "places a story in the container's last group" {
            let mut map = StoryMap::load(&path).unwrap();
            let card = map.find_node("Pay by card").unwrap();
            let doc = NodeDoc::from_value(NodeKind::Story, json!({"name": "Wallet"})).unwrap();

            let id = map.from_dict(Some(card), doc).unwrap();

            assert_eq!(map.story_groups(card).len(), 1);
            assert_eq!(map.stories(card).last(), Some(&id));
            assert_eq!(map.get(id).unwrap().sequential_order(), 2);
            assert!(StoryMap::load(&path).unwrap().find_story("Wallet").is_some());
        }

        it "rejects a story group holding a story name already in the container" {
            let mut map = StoryMap::load(&path).unwrap();
            let card = map.find_node("Pay by card").unwrap();
            let count = map.node_count();
            let doc = NodeDoc::from_value(
                NodeKind::StoryGroup,
                json!({"stories": [
                    {"name": "Wallet", "sequential_order": 0},
                    {"name": "Enter card details", "sequential_order": 1}
                ]}),
            )
            .unwrap();

            assert!(matches!(
                map.from_dict(Some(card), doc),
                Err(StoryMapError::DuplicateSiblingName { ref name, .. }) if name == "Enter card details"
            ));
            assert_eq!(map.node_count(), count);
            assert_eq!(map.story_groups(card).len(), 1);
            assert!(map.find_story("Wallet").is_none());
        }
    }

    describe "store" {
        it "serves the cached map until the file changes" {
            let mut store = StoryMapStore::open(&path);
            assert!(store.is_stale());
            assert_eq!(store.map().unwrap().epics().len(), 1);
            assert!(!store.is_stale());

            let mut doc = fixture();
            doc["epics"].as_array_mut().unwrap().push(json!({"name": "Gift cards"}));
            write_json(&path, &doc);
            bump_mtime(&path);

            assert!(store.is_stale());
            let map = store.map().unwrap();
            assert_eq!(map.epics().len(), 2);
            assert!(map.find_node("Gift cards").is_some());
        }

        it "stays fresh across its own writes" {
            let mut store = StoryMapStore::open(&path);
            store.map().unwrap().create_epic(Some("Gift cards"), None).unwrap();
            assert!(!store.is_stale());
            assert_eq!(store.map().unwrap().epics().len(), 2);
        }

        it "reloads after invalidation" {
            let mut store = StoryMapStore::open(&path);
            store.map().unwrap();
            store.invalidate();
            assert!(store.is_stale());
        }

        it "creates an empty document on init" {
            let nested = dir.path().join("docs/story/story-graph.json");
            let mut store = StoryMapStore::init(&nested).unwrap();

            assert_eq!(read_json(&nested), json!({"epics": [], "increments": []}));
            assert!(store.map().unwrap().epics().is_empty());
        }

        it "reports a missing document" {
            let mut store = StoryMapStore::open(dir.path().join("nope.json"));
            assert!(matches!(store.map(), Err(StoryMapError::DocumentNotFound(_))));
        }
    }
}
