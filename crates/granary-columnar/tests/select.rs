use granary_columnar::{
    BlockPlan, ColumnStore, FieldSpec, PositionSink, Record, Request, Result, RowCounter,
    StoreError,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq)]
struct Reading {
    sensor: u8,
    value: i32,
    taken_at: i64,
    label: Option<Arc<str>>,
}

impl Record for Reading {
    fn fields() -> Vec<FieldSpec<Self>> {
        vec![
            FieldSpec::byte(
                "sensor",
                |r: &Reading| r.sensor,
                |r: &mut Reading, v| r.sensor = v,
            ),
            FieldSpec::int(
                "value",
                |r: &Reading| r.value,
                |r: &mut Reading, v| r.value = v,
            ),
            FieldSpec::long(
                "taken_at",
                |r: &Reading| r.taken_at,
                |r: &mut Reading, v| r.taken_at = v,
            ),
            FieldSpec::str(
                "label",
                |r: &Reading| r.label.clone(),
                |r: &mut Reading, v| r.label = v,
            ),
        ]
    }
}

/// Collects accepted positions in arrival order.
#[derive(Default)]
struct Positions(Vec<usize>);

impl PositionSink for Positions {
    fn data(&mut self, position: usize) -> Result<()> {
        self.0.push(position);
        Ok(())
    }
}

fn store_with_values(values: &[i32]) -> ColumnStore<Reading> {
    let readings: Vec<Reading> = values
        .iter()
        .enumerate()
        .map(|(i, &value)| Reading {
            sensor: (i % 4) as u8,
            value,
            taken_at: i as i64,
            label: Some(Arc::from(format!("r{i}"))),
        })
        .collect();
    let mut store = ColumnStore::<Reading>::new(BlockPlan::fixed(8).unwrap()).unwrap();
    store.ingest(&readings).unwrap();
    store
}

#[test]
fn membership_yields_accepted_positions_in_increasing_order() {
    let store = store_with_values(&[1, 4, 2, 5, 3]);

    let mut positions = Positions::default();
    store
        .select(&[Request::member("value", vec![1, 2, 3])], &mut positions)
        .unwrap();
    assert_eq!(positions.0, vec![0, 2, 4]);
}

#[test]
fn membership_tolerates_duplicate_candidates() {
    let store = store_with_values(&[1, 4, 2, 5, 3]);

    let mut positions = Positions::default();
    store
        .select(
            &[Request::member("value", vec![3, 1, 1, 2, 3])],
            &mut positions,
        )
        .unwrap();
    assert_eq!(positions.0, vec![0, 2, 4]);
}

#[test]
fn range_is_inclusive_on_both_ends() {
    let store = store_with_values(&[10, 20, 30, 40, 50]);

    let mut positions = Positions::default();
    store
        .select(&[Request::range("value", 20, 40)], &mut positions)
        .unwrap();
    assert_eq!(positions.0, vec![1, 2, 3]);
}

#[test]
fn inverted_range_is_empty_not_an_error() {
    let store = store_with_values(&[10, 20, 30]);

    let mut positions = Positions::default();
    store
        .select(&[Request::range("value", 40, 20)], &mut positions)
        .unwrap();
    assert_eq!(positions.0, Vec::<usize>::new());
}

#[test]
fn range_applies_to_narrow_integer_columns_via_widening() {
    let store = store_with_values(&[1, 2, 3, 4, 5, 6, 7, 8]);

    // sensor cycles 0..4; accept sensors 2 and 3.
    let mut positions = Positions::default();
    store
        .select(&[Request::range("sensor", 2, 3)], &mut positions)
        .unwrap();
    assert_eq!(positions.0, vec![2, 3, 6, 7]);
}

#[test]
fn like_matches_wildcards_and_rejects_null() {
    let readings = vec![
        Reading {
            sensor: 0,
            value: 1,
            taken_at: 0,
            label: Some(Arc::from("pump-a")),
        },
        Reading {
            sensor: 0,
            value: 2,
            taken_at: 1,
            label: None,
        },
        Reading {
            sensor: 0,
            value: 3,
            taken_at: 2,
            label: Some(Arc::from("pump-b")),
        },
        Reading {
            sensor: 0,
            value: 4,
            taken_at: 3,
            label: Some(Arc::from("valve-a")),
        },
    ];
    let mut store = ColumnStore::<Reading>::new(BlockPlan::fixed(4).unwrap()).unwrap();
    store.ingest(&readings).unwrap();

    let mut positions = Positions::default();
    store
        .select(&[Request::like("label", "pump-*")], &mut positions)
        .unwrap();
    assert_eq!(positions.0, vec![0, 2]);

    let mut positions = Positions::default();
    store
        .select(&[Request::like("label", "*-a")], &mut positions)
        .unwrap();
    assert_eq!(positions.0, vec![0, 3]);
}

#[test]
fn conjunction_requires_every_predicate_to_accept() {
    let store = store_with_values(&[1, 4, 2, 5, 3]);

    let mut positions = Positions::default();
    store
        .select(
            &[
                Request::member("value", vec![1, 2, 3]),
                Request::range("taken_at", 1, 4),
            ],
            &mut positions,
        )
        .unwrap();
    // Position 0 passes membership but fails the timestamp range.
    assert_eq!(positions.0, vec![2, 4]);
}

#[test]
fn empty_request_slice_selects_every_row() {
    let store = store_with_values(&[9, 9, 9]);

    let mut counter = RowCounter::new();
    store.select(&[], &mut counter).unwrap();
    assert_eq!(counter.count(), 3);
}

#[test]
fn unknown_column_fails_before_any_scanning() {
    let store = store_with_values(&[1, 2, 3]);

    let mut positions = Positions::default();
    let err = store
        .select(&[Request::member("missing", vec![1])], &mut positions)
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownColumn(name) if name == "missing"));
    assert!(positions.0.is_empty(), "sink must not observe any position");
}

#[test]
fn binding_checks_predicate_against_column_type() {
    let store = store_with_values(&[1, 2, 3]);

    assert!(matches!(
        store.select(&[Request::like("value", "x*")], &mut Positions::default()),
        Err(StoreError::ColumnTypeMismatch { .. })
    ));
    assert!(matches!(
        store.select(
            &[Request::member("label", vec![1])],
            &mut Positions::default()
        ),
        Err(StoreError::ColumnTypeMismatch { .. })
    ));
}

#[test]
fn rerunning_a_select_keeps_accumulating_into_the_sink() {
    let store = store_with_values(&[1, 4, 2, 5, 3]);
    let requests = [Request::member("value", vec![1, 2, 3])];

    let mut counter = RowCounter::new();
    store.select(&requests, &mut counter).unwrap();
    assert_eq!(counter.count(), 3);

    store.select(&requests, &mut counter).unwrap();
    assert_eq!(counter.count(), 6);
}

#[test]
fn row_collector_reconstructs_accepted_records() {
    let readings = vec![
        Reading {
            sensor: 1,
            value: 10,
            taken_at: 100,
            label: Some(Arc::from("a")),
        },
        Reading {
            sensor: 2,
            value: 20,
            taken_at: 200,
            label: None,
        },
        Reading {
            sensor: 3,
            value: 30,
            taken_at: 300,
            label: Some(Arc::from("c")),
        },
    ];
    let mut store = ColumnStore::<Reading>::new(BlockPlan::fixed(4).unwrap()).unwrap();
    store.ingest(&readings).unwrap();

    let mut collector = store.row_collector();
    store
        .select(&[Request::range("value", 15, 35)], &mut collector)
        .unwrap();
    assert_eq!(collector.rows(), &readings[1..]);

    // No predicates reconstructs the whole batch.
    let mut collector = store.row_collector();
    store.select(&[], &mut collector).unwrap();
    assert_eq!(collector.into_rows(), readings);
}

#[test]
fn positions_at_or_past_the_logical_size_are_rejected() {
    let store = store_with_values(&[7, 8]);
    let value = store.column("value").unwrap();

    assert!(matches!(
        value.value(2),
        Err(StoreError::OutOfRange {
            position: 2,
            len: 2,
            ..
        })
    ));
    assert!(value.get_i32(usize::MAX).is_err());
}
