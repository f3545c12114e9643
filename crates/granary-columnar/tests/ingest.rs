use granary_columnar::{BlockPlan, ColumnStore, ElementType, FieldSpec, Record, StoreError};
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq)]
struct Trade {
    venue: u8,
    book: u8,
    lot: i16,
    price: i32,
    id: i64,
    symbol: Option<Arc<str>>,
}

impl Record for Trade {
    fn fields() -> Vec<FieldSpec<Self>> {
        vec![
            FieldSpec::byte("venue", |t: &Trade| t.venue, |t: &mut Trade, v| t.venue = v),
            FieldSpec::byte("book", |t: &Trade| t.book, |t: &mut Trade, v| t.book = v),
            FieldSpec::short("lot", |t: &Trade| t.lot, |t: &mut Trade, v| t.lot = v),
            FieldSpec::int("price", |t: &Trade| t.price, |t: &mut Trade, v| t.price = v),
            FieldSpec::long("id", |t: &Trade| t.id, |t: &mut Trade, v| t.id = v),
            FieldSpec::str(
                "symbol",
                |t: &Trade| t.symbol.clone(),
                |t: &mut Trade, v| t.symbol = v,
            ),
        ]
    }
}

fn plan() -> BlockPlan {
    BlockPlan::new(vec![4, 8, 16]).unwrap()
}

fn trades(n: usize) -> Vec<Trade> {
    (0..n)
        .map(|i| Trade {
            venue: (i % 3) as u8,
            book: (i % 2) as u8,
            lot: (i * 10) as i16,
            price: 100 + i as i32,
            id: 1_000_000 + i as i64,
            symbol: if i % 5 == 0 {
                None
            } else {
                Some(Arc::from(format!("SYM{}", i % 4)))
            },
        })
        .collect()
}

#[test]
fn size_matches_records_ingested_in_every_column() {
    let mut store = ColumnStore::<Trade>::new(plan()).unwrap();
    assert_eq!(store.row_count(), 0);

    store.ingest(&trades(7)).unwrap();
    assert_eq!(store.row_count(), 7);
    for column in store.columns() {
        assert_eq!(column.len(), 7, "column `{}`", column.name());
    }

    store.ingest(&trades(3)).unwrap();
    assert_eq!(store.row_count(), 10);
    for column in store.columns() {
        assert_eq!(column.len(), 10);
    }
}

#[test]
fn columns_follow_field_declaration_order_and_types() {
    let store = ColumnStore::<Trade>::new(plan()).unwrap();
    let names: Vec<&str> = store.columns().iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["venue", "book", "lot", "price", "id", "symbol"]);

    assert_eq!(store.column("venue").unwrap().element_type(), ElementType::Byte);
    assert_eq!(store.column("lot").unwrap().element_type(), ElementType::Short);
    assert_eq!(store.column("price").unwrap().element_type(), ElementType::Int);
    assert_eq!(store.column("id").unwrap().element_type(), ElementType::Long);
    assert_eq!(store.column("symbol").unwrap().element_type(), ElementType::Str);
}

#[test]
fn all_columns_grow_in_lock_step_under_the_shared_plan() {
    let mut store = ColumnStore::<Trade>::new(plan()).unwrap();
    store.ingest(&trades(13)).unwrap();

    // 4 + 8 = 12 < 13, so every column took the third increment.
    for column in store.columns() {
        assert_eq!(column.allocated(), 28, "column `{}`", column.name());
    }
    assert_eq!(store.allocated_rows(), 28);
    assert!(store.mem_bytes() > 0);
}

#[test]
fn ingested_values_land_at_dense_positions() {
    let mut store = ColumnStore::<Trade>::new(plan()).unwrap();
    let batch = trades(6);
    store.ingest(&batch).unwrap();

    let price = store.column("price").unwrap();
    let symbol = store.column("symbol").unwrap();
    for (i, trade) in batch.iter().enumerate() {
        assert_eq!(price.get_i32(i).unwrap(), trade.price);
        assert_eq!(symbol.get_str(i).unwrap(), trade.symbol.as_deref());
    }
}

#[test]
fn unknown_column_lookup_is_a_configuration_error() {
    let store = ColumnStore::<Trade>::new(plan()).unwrap();
    assert!(matches!(
        store.column("nope"),
        Err(StoreError::UnknownColumn(name)) if name == "nope"
    ));
}

#[test]
fn accessor_table_rejects_unknown_field_names() {
    let store = ColumnStore::<Trade>::new(plan()).unwrap();
    assert!(store.accessors().field("price").is_ok());
    assert!(matches!(
        store.accessors().field("quantity"),
        Err(StoreError::UnknownField(_))
    ));
}

#[test]
fn duplicate_field_names_fail_at_construction() {
    #[derive(Clone, Debug, Default)]
    struct Shadow {
        a: i32,
    }

    impl Record for Shadow {
        fn fields() -> Vec<FieldSpec<Self>> {
            vec![
                FieldSpec::int("a", |s: &Shadow| s.a, |s: &mut Shadow, v| s.a = v),
                FieldSpec::int("a", |s: &Shadow| s.a, |s: &mut Shadow, v| s.a = v),
            ]
        }
    }

    assert!(matches!(
        ColumnStore::<Shadow>::new(plan()),
        Err(StoreError::DuplicateField(name)) if name == "a"
    ));
}

#[test]
fn stats_snapshot_reflects_per_column_accounting() {
    let mut store = ColumnStore::<Trade>::new(plan()).unwrap();
    store.ingest(&trades(5)).unwrap();

    let stats = store.stats();
    assert_eq!(stats.rows, 5);
    assert_eq!(stats.allocated_rows, 12);
    assert_eq!(stats.columns.len(), 6);

    let id = stats.columns.iter().find(|c| c.name == "id").unwrap();
    assert_eq!(id.element_type, ElementType::Long);
    assert_eq!(id.rows, 5);
    assert_eq!(id.allocated_rows, 12);
    assert_eq!(id.mem_bytes, 12 * 8);

    let total: usize = stats.columns.iter().map(|c| c.mem_bytes).sum();
    assert_eq!(total, stats.mem_bytes);
}
