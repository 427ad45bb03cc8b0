//! Story moves across sub-epics and the best-effort test code relocation.
//!
//! The relocation runs after the tree change is committed. These tests pin
//! down that a skipped or failed relocation never rolls the move back.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use storymap::models::*;
use storymap::{Relocation, StoryMap, TestCodeMover};
use tempfile::TempDir;

type Calls = Rc<RefCell<Vec<(PathBuf, PathBuf, String)>>>;

/// Mover that records every request and succeeds.
struct RecordingMover {
    calls: Calls,
}

impl TestCodeMover for RecordingMover {
    fn relocate(&self, source: &Path, target: &Path, symbol: &str) -> anyhow::Result<()> {
        self.calls
            .borrow_mut()
            .push((source.to_path_buf(), target.to_path_buf(), symbol.to_string()));
        Ok(())
    }
}

struct Fixture {
    dir: TempDir,
    map: StoryMap,
    calls: Calls,
    payment: NodeId,
    wallet: NodeId,
    refund: NodeId,
}

fn set_test_file(map: &mut StoryMap, sub: NodeId, file: &str) {
    map.update_data(sub, |data| {
        if let NodeData::SubEpic(d) = data {
            d.test_file = Some(file.to_string());
        }
    })
    .expect("Failed to set test file");
}

fn set_test_class(map: &mut StoryMap, story: NodeId, class: Option<&str>) {
    map.update_data(story, |data| {
        if let NodeData::Story(d) = data {
            d.test_class = class.map(str::to_string);
        }
    })
    .expect("Failed to set test class");
}

/// Two sub-epics with their own test files and a story with a test class.
fn build(map: StoryMap, dir: TempDir, calls: Calls) -> Fixture {
    let mut map = map;
    fs::write(dir.path().join("test_payment.py"), "class TestRefund:\n    pass\n").unwrap();
    fs::write(dir.path().join("test_wallet.py"), "").unwrap();

    let epic = map.create_epic(Some("Checkout"), None).unwrap();
    let payment = map.create_child(epic, Some("Payment"), None, None).unwrap();
    let wallet = map.create_child(epic, Some("Wallet"), None, None).unwrap();
    set_test_file(&mut map, payment, "test_payment.py");
    set_test_file(&mut map, wallet, "test_wallet.py");
    let refund = map
        .create_child(payment, Some("Refund"), Some(NodeKind::Story), None)
        .unwrap();
    set_test_class(&mut map, refund, Some("TestRefund"));

    Fixture {
        dir,
        map,
        calls,
        payment,
        wallet,
        refund,
    }
}

fn setup() -> Fixture {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let calls: Calls = Rc::default();
    let map = StoryMap::new().with_test_mover(
        dir.path(),
        RecordingMover {
            calls: Rc::clone(&calls),
        },
    );
    build(map, dir, calls)
}

// ============================================================
// Relocation outcomes
// ============================================================

mod relocation {
    use super::*;

    #[test]
    fn relocates_the_test_class_between_files() {
        let mut fx = setup();

        let outcome = fx.map.move_to(fx.refund, Some(fx.wallet.into()), None).unwrap();

        let source = fx.dir.path().join("test_payment.py");
        let target = fx.dir.path().join("test_wallet.py");
        assert_eq!(
            outcome.relocation,
            Relocation::Relocated {
                symbol: "TestRefund".to_string(),
                from: source.clone(),
                to: target.clone(),
            }
        );
        assert!(!outcome.is_partial());
        assert_eq!(
            fx.calls.borrow().as_slice(),
            &[(source, target, "TestRefund".to_string())]
        );
    }

    #[test]
    fn is_not_required_when_both_sides_share_a_file() {
        let mut fx = setup();
        set_test_file(&mut fx.map, fx.wallet, "test_payment.py");

        let outcome = fx.map.move_to(fx.refund, Some(fx.wallet.into()), None).unwrap();

        assert_eq!(outcome.relocation, Relocation::NotRequired);
        assert!(fx.calls.borrow().is_empty());
    }

    #[test]
    fn is_not_required_for_sub_epic_moves() {
        let mut fx = setup();
        let epic = fx.map.parent(fx.payment).unwrap();
        let holder = fx.map.create_child(epic, Some("Holder"), None, None).unwrap();

        let outcome = fx.map.move_to(fx.wallet, Some(holder.into()), None).unwrap();

        assert_eq!(outcome.relocation, Relocation::NotRequired);
        assert_eq!(fx.map.sub_epics(holder), vec![fx.wallet]);
    }

    #[test]
    fn uses_the_test_file_of_an_enclosing_sub_epic() {
        let mut fx = setup();
        let nested = fx.map.create_child(fx.wallet, Some("Nested"), None, None).unwrap();

        let outcome = fx.map.move_to(fx.refund, Some(nested.into()), None).unwrap();

        assert!(matches!(outcome.relocation, Relocation::Relocated { .. }));
        assert_eq!(fx.map.governing_test_file(fx.refund), Some("test_wallet.py"));
    }
}

// ============================================================
// Partial success
// ============================================================

mod partial_success {
    use super::*;

    #[test]
    fn skips_when_the_target_file_is_missing() {
        let mut fx = setup();
        fs::remove_file(fx.dir.path().join("test_wallet.py")).unwrap();

        let outcome = fx.map.move_to(fx.refund, Some(fx.wallet.into()), None).unwrap();

        assert!(outcome.is_partial());
        assert!(matches!(outcome.relocation, Relocation::Skipped { .. }));
        assert!(fx.calls.borrow().is_empty());
        assert_eq!(fx.map.stories(fx.wallet), vec![fx.refund]);
        assert!(fx.map.stories(fx.payment).is_empty());
    }

    #[test]
    fn skips_when_the_story_has_no_test_class() {
        let mut fx = setup();
        set_test_class(&mut fx.map, fx.refund, None);

        let outcome = fx.map.move_to(fx.refund, Some(fx.wallet.into()), None).unwrap();

        match outcome.relocation {
            Relocation::Skipped { reason } => assert!(reason.contains("test class")),
            other => panic!("expected a skipped relocation, got {other:?}"),
        }
        assert_eq!(fx.map.stories(fx.wallet), vec![fx.refund]);
    }

    #[test]
    fn skips_without_a_configured_mover() {
        let dir = TempDir::new().unwrap();
        let mut fx = build(StoryMap::new(), dir, Calls::default());

        let outcome = fx.map.move_to(fx.refund, Some(fx.wallet.into()), None).unwrap();

        assert!(matches!(outcome.relocation, Relocation::Skipped { .. }));
        assert_eq!(fx.map.stories(fx.wallet), vec![fx.refund]);
    }

    #[test]
    fn reports_a_mover_failure_after_committing_the_move() {
        let dir = TempDir::new().unwrap();
        let failing = |_: &Path, _: &Path, symbol: &str| -> anyhow::Result<()> {
            anyhow::bail!("no block defines {}", symbol)
        };
        let map = StoryMap::new().with_test_mover(dir.path(), failing);
        let mut fx = build(map, dir, Calls::default());
        let document = fx.dir.path().join("story-graph.json");
        fx.map.save_as(&document).unwrap();

        let outcome = fx.map.move_to(fx.refund, Some(fx.wallet.into()), None).unwrap();

        match &outcome.relocation {
            Relocation::Failed { error } => assert!(error.contains("no block defines TestRefund")),
            other => panic!("expected a failed relocation, got {other:?}"),
        }
        assert!(outcome.is_partial());

        let saved = StoryMap::load(&document).unwrap();
        let wallet = saved.find_node("Wallet").unwrap();
        let refund = saved.find_story("Refund").unwrap();
        assert_eq!(saved.stories(wallet), vec![refund]);
    }
}
