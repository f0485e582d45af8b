#![allow(clippy::float_cmp)]

use uuid::Uuid;

use super::*;
use crate::shape::{Geometry, Point, create_shape};

fn stamp(ts: i64) -> Stamp {
    Stamp { ts, origin: Uuid::nil() }
}

fn board() -> (ObjectStore, MutationApplier) {
    (ObjectStore::new(Uuid::new_v4()), MutationApplier::default())
}

fn add(store: &mut ObjectStore, applier: &mut MutationApplier, kind: ShapeKind) -> ObjectId {
    let shape = create_shape(kind, Point::new(10.0, 10.0), None).unwrap();
    applier.create(store, shape).unwrap().object_id
}

// =============================================================
// Scenario
// =============================================================

#[test]
fn rectangle_lifecycle() {
    let (mut store, mut applier) = board();
    let other = add(&mut store, &mut applier, ShapeKind::Circle);

    let shape = create_shape(ShapeKind::Rectangle, Point::new(10.0, 10.0), None).unwrap();
    let created = applier.create(&mut store, shape).unwrap();
    let id = created.object_id;
    assert!(matches!(created.change, Change::Created(_)));
    assert_eq!(store.len(), 2);

    let rect = store.get(id).unwrap();
    assert_eq!(rect.geometry, Geometry::Sized { width: 100.0, height: 100.0 });
    assert_eq!(rect.style.fill.as_deref(), Some("#2d2e2d"));

    let resized = applier
        .modify(&mut store, &Selection::Single(id), PropertyChange::Width(250.0), stamp(1))
        .unwrap();
    assert_eq!(resized.kind, ShapeKind::Rectangle);
    let rect = store.get(id).unwrap();
    assert_eq!(rect.geometry, Geometry::Sized { width: 250.0, height: 100.0 });
    assert_eq!(rect.transform.scale_x, 1.0);

    let moved = applier.bring(&mut store, &Selection::Single(id), Direction::Back).unwrap();
    assert_eq!(moved.change, Change::Reordered(Direction::Back));
    assert_eq!(store.order(), &[id, other]);

    let deleted = applier.delete(&mut store, &[id]);
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].change, Change::Deleted);
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(id), Err(StoreError::NotFound(id)));
}

// =============================================================
// Updates
// =============================================================

#[test]
fn same_update_twice_broadcasts_once() {
    let (mut store, mut applier) = board();
    let id = add(&mut store, &mut applier, ShapeKind::Rectangle);
    let change = [PropertyChange::Fill("#ff0000".into())];

    let first = applier.apply_update(&mut store, id, &change, stamp(1));
    let second = applier.apply_update(&mut store, id, &change, stamp(2));
    assert!(first.is_some());
    assert!(second.is_none());
}

#[test]
fn width_resets_accumulated_scale() {
    let (mut store, mut applier) = board();
    let id = add(&mut store, &mut applier, ShapeKind::Rectangle);
    applier.apply_update(&mut store, id, &[PropertyChange::ScaleX(2.5), PropertyChange::ScaleY(3.0)], stamp(1));

    let desc = applier
        .apply_update(&mut store, id, &[PropertyChange::Width(100.0)], stamp(2))
        .unwrap();
    assert_eq!(desc.change, Change::Updated(vec![PropertyChange::ScaleX(1.0)]));
    let shape = store.get(id).unwrap();
    assert_eq!(shape.transform.scale_x, 1.0);
    assert_eq!(shape.transform.scale_y, 3.0);

    applier.apply_update(&mut store, id, &[PropertyChange::Height(40.0)], stamp(3));
    let shape = store.get(id).unwrap();
    assert_eq!(shape.transform.scale_y, 1.0);
    assert_eq!(shape.geometry, Geometry::Sized { width: 100.0, height: 40.0 });
}

#[test]
fn resize_overrides_scale_in_same_batch() {
    let (mut store, mut applier) = board();
    let id = add(&mut store, &mut applier, ShapeKind::Rectangle);

    let desc = applier
        .apply_update(
            &mut store,
            id,
            &[PropertyChange::Width(250.0), PropertyChange::ScaleX(2.0), PropertyChange::ScaleY(3.0)],
            stamp(1),
        )
        .unwrap();
    let shape = store.get(id).unwrap();
    assert_eq!(shape.geometry, Geometry::Sized { width: 250.0, height: 100.0 });
    assert_eq!(shape.transform.scale_x, 1.0);
    assert_eq!(shape.transform.scale_y, 3.0, "other axis keeps its scale");
    assert_eq!(
        desc.change,
        Change::Updated(vec![PropertyChange::Width(250.0), PropertyChange::ScaleY(3.0)])
    );
}

#[test]
fn numeric_string_nan_never_reaches_the_store() {
    let (mut store, mut applier) = board();
    let id = add(&mut store, &mut applier, ShapeKind::Rectangle);

    let decoded = serde_json::from_value::<Vec<PropertyChange>>(serde_json::json!([{"property": "left", "value": "NaN"}]));
    assert!(decoded.is_err());

    let finite: Vec<PropertyChange> =
        serde_json::from_value(serde_json::json!([{"property": "left", "value": "42"}])).unwrap();
    assert!(applier.apply_update(&mut store, id, &finite, stamp(1)).is_some());
    assert!(applier.apply_update(&mut store, id, &finite, stamp(2)).is_none());
}

#[test]
fn repeated_resize_to_same_size_is_noop() {
    let (mut store, mut applier) = board();
    let id = add(&mut store, &mut applier, ShapeKind::Triangle);
    assert!(applier.apply_update(&mut store, id, &[PropertyChange::Width(120.0)], stamp(1)).is_some());
    assert!(applier.apply_update(&mut store, id, &[PropertyChange::Width(120.0)], stamp(2)).is_none());
}

#[test]
fn inapplicable_property_is_silent_noop() {
    let (mut store, mut applier) = board();
    let id = add(&mut store, &mut applier, ShapeKind::Circle);
    let before = store.get(id).unwrap().clone();
    assert!(applier.apply_update(&mut store, id, &[PropertyChange::Width(10.0)], stamp(1)).is_none());
    assert_eq!(store.get(id).unwrap(), &before);
}

#[test]
fn update_of_missing_object_is_noop() {
    let (mut store, mut applier) = board();
    assert!(applier
        .apply_update(&mut store, Uuid::new_v4(), &[PropertyChange::Left(1.0)], stamp(1))
        .is_none());
}

// =============================================================
// Selection handling
// =============================================================

#[test]
fn multi_selection_is_not_modified() {
    let (mut store, mut applier) = board();
    let a = add(&mut store, &mut applier, ShapeKind::Rectangle);
    let b = add(&mut store, &mut applier, ShapeKind::Rectangle);
    let selection = store.selection_snapshot(&[a, b]);

    assert!(applier.modify(&mut store, &selection, PropertyChange::Fill("#fff".into()), stamp(1)).is_none());
    assert!(applier.bring(&mut store, &selection, Direction::Back).is_none());
    assert_eq!(store.get(a).unwrap().style.fill.as_deref(), Some("#2d2e2d"));
    assert_eq!(store.order(), &[a, b]);
}

#[test]
fn empty_selection_is_not_modified() {
    let (mut store, mut applier) = board();
    assert!(applier.modify(&mut store, &Selection::Empty, PropertyChange::Left(5.0), stamp(1)).is_none());
}

// =============================================================
// Reorder / delete
// =============================================================

#[test]
fn reorder_to_current_position_is_noop() {
    let (mut store, mut applier) = board();
    let _a = add(&mut store, &mut applier, ShapeKind::Rectangle);
    let b = add(&mut store, &mut applier, ShapeKind::Rectangle);
    assert!(applier.apply_reorder(&mut store, b, Direction::Front).is_none());
}

#[test]
fn delete_skips_missing_ids() {
    let (mut store, mut applier) = board();
    let a = add(&mut store, &mut applier, ShapeKind::Rectangle);
    let b = add(&mut store, &mut applier, ShapeKind::Line);
    let ghost = Uuid::new_v4();

    let deleted = applier.delete(&mut store, &[a, ghost, b]);
    let ids: Vec<ObjectId> = deleted.iter().map(|d| d.object_id).collect();
    assert_eq!(ids, vec![a, b]);
    assert_eq!(deleted[1].kind, ShapeKind::Line);
    assert!(store.is_empty());
}

#[test]
fn delete_twice_is_noop() {
    let (mut store, mut applier) = board();
    let a = add(&mut store, &mut applier, ShapeKind::Rectangle);
    assert_eq!(applier.delete(&mut store, &[a]).len(), 1);
    assert!(applier.delete(&mut store, &[a]).is_empty());
    assert!(store.is_empty());
}

#[test]
fn duplicate_create_is_aborted() {
    let (mut store, mut applier) = board();
    let shape = create_shape(ShapeKind::Rectangle, Point::new(0.0, 0.0), None).unwrap();
    assert!(applier.create(&mut store, shape.clone()).is_some());
    assert!(applier.create(&mut store, shape).is_none());
    assert_eq!(store.len(), 1);
}

// =============================================================
// Replay
// =============================================================

#[test]
fn apply_replays_each_change_kind() {
    let (mut source, mut local) = board();
    let (mut replica, mut remote) = board();

    let shape = create_shape(ShapeKind::Text, Point::new(1.0, 2.0), Some("hi")).unwrap();
    let created = local.create(&mut source, shape).unwrap();
    let id = created.object_id;
    remote.apply(&mut replica, created, stamp(1)).unwrap();
    assert_eq!(replica.get(id).unwrap(), source.get(id).unwrap());

    let updated = local
        .apply_update(&mut source, id, &[PropertyChange::Text("bye".into())], stamp(2))
        .unwrap();
    remote.apply(&mut replica, updated, stamp(2)).unwrap();
    assert_eq!(replica.get(id).unwrap(), source.get(id).unwrap());

    let deleted = local.delete(&mut source, &[id]).pop().unwrap();
    remote.apply(&mut replica, deleted, stamp(3)).unwrap();
    assert!(replica.is_empty());
}

// =============================================================
// Resolution policy
// =============================================================

#[test]
fn last_write_wins_applies_older_stamp() {
    let (mut store, mut applier) = board();
    let id = add(&mut store, &mut applier, ShapeKind::Rectangle);
    applier.apply_update(&mut store, id, &[PropertyChange::Fill("#new".into())], stamp(20));
    assert!(applier.apply_update(&mut store, id, &[PropertyChange::Fill("#old".into())], stamp(10)).is_some());
    assert_eq!(store.get(id).unwrap().style.fill.as_deref(), Some("#old"));
}

#[test]
fn field_timestamps_drop_older_stamp() {
    let mut store = ObjectStore::new(Uuid::new_v4());
    let mut applier = MutationApplier::new(ResolutionPolicy::FieldTimestamps);
    let id = add(&mut store, &mut applier, ShapeKind::Rectangle);

    applier.apply_update(&mut store, id, &[PropertyChange::Fill("#new".into())], stamp(20));
    assert!(applier.apply_update(&mut store, id, &[PropertyChange::Fill("#old".into())], stamp(10)).is_none());
    assert_eq!(store.get(id).unwrap().style.fill.as_deref(), Some("#new"));

    // Other fields are stamped independently.
    assert!(applier.apply_update(&mut store, id, &[PropertyChange::Left(3.0)], stamp(10)).is_some());
}

#[test]
fn resolution_policy_parses() {
    assert_eq!("lww".parse::<ResolutionPolicy>(), Ok(ResolutionPolicy::LastWriteWins));
    assert_eq!("field_timestamps".parse::<ResolutionPolicy>(), Ok(ResolutionPolicy::FieldTimestamps));
    assert!("vector_clock".parse::<ResolutionPolicy>().is_err());
}
