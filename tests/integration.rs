use std::io::Write;
use std::rc::Rc;

use product_dashboard::dashboard::{Dashboard, DashboardConfig, DataSession};
use product_dashboard::product::{
    AggregateValue, DashboardError, Metric, NumericField, PHOTOS_COLUMN,
    product_table::ProductTable, query_builder::QueryCache, selection::CategorySelection,
};
use tempfile::NamedTempFile;

const HEADER: &str = "product_id,product_category_name_english,product_name_lenght,product_photos_qty,product_weight_g,product_length_cm,product_height_cm,product_width_cm\n";

fn write_csv(csv: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().unwrap();
    write!(tmp, "{}", csv).unwrap();
    tmp
}

fn session_for(tmp: &NamedTempFile) -> DataSession {
    DataSession::new(DashboardConfig {
        data_path: tmp.path().to_path_buf(),
        ..DashboardConfig::default()
    })
}

fn pairs(result: &product_dashboard::AggregateResult) -> Vec<(String, f64)> {
    result
        .pairs()
        .into_iter()
        .map(|(c, v)| (c.to_string(), v))
        .collect()
}

#[test]
fn test_end_to_end_three_charts() {
    let tmp = write_csv(&format!(
        "{HEADER}a,toys,40,3,100,10,5,2\nb,toys,41,5,200,8,4,2\nc,books,42,1,300,20,1,15\n"
    ));
    let dashboard = Dashboard::open(&session_for(&tmp)).unwrap();
    let frame = dashboard.frame();

    let count = frame.panel(Metric::Count).unwrap();
    assert_eq!(
        pairs(&count.result),
        vec![("toys".to_string(), 2.0), ("books".to_string(), 1.0)]
    );
    assert_eq!(count.result.entries[0].value, AggregateValue::Int(2));

    let photos = frame.panel(Metric::Mean(NumericField::PhotosQty)).unwrap();
    assert_eq!(
        pairs(&photos.result),
        vec![("toys".to_string(), 4.0), ("books".to_string(), 1.0)]
    );

    let volume = frame.panel(Metric::Mean(NumericField::VolumeCm3)).unwrap();
    assert_eq!(
        pairs(&volume.result),
        vec![("books".to_string(), 300.0), ("toys".to_string(), 82.0)]
    );
}

#[test]
fn test_cleaning_drops_incomplete_rows() {
    let tmp = write_csv(&format!(
        "{HEADER}a,toys,40,3,100,10,5,2\nb,,41,5,200,8,4,2\nc,books,42,,300,20,1,15\nd,books,,2,,1,2,3\n"
    ));
    let (table, summary) = ProductTable::load_csv(tmp.path()).unwrap();

    assert_eq!(table.row_count(), 2);
    assert_eq!(summary.rows_dropped_null, 2);
    for record in table.records() {
        assert!(!record.category.is_empty());
        assert_eq!(
            record.volume_cm3,
            record.length_cm * record.height_cm * record.width_cm
        );
    }
}

#[test]
fn test_missing_file_halts_before_any_chart() {
    let dir = tempfile::tempdir().unwrap();
    let session = DataSession::new(DashboardConfig {
        data_path: dir.path().join("product_final.csv"),
        ..DashboardConfig::default()
    });
    let err = Dashboard::open(&session).unwrap_err();
    assert!(matches!(err, DashboardError::DataSourceNotFound { .. }));
    assert!(err.to_string().contains("product_final.csv"));
}

#[test]
fn test_missing_photo_column_is_schema_mismatch() {
    let tmp = write_csv(
        "product_category_name_english,product_length_cm,product_height_cm,product_width_cm\ntoys,1,1,1\n",
    );
    match Dashboard::open(&session_for(&tmp)) {
        Err(DashboardError::SchemaMismatch { missing }) => {
            assert_eq!(missing, vec![PHOTOS_COLUMN.to_string()])
        }
        other => panic!("Expected SchemaMismatch, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_no_rows_after_cleaning_is_not_an_error() {
    let tmp = write_csv(&format!("{HEADER}a,,40,3,100,10,5,2\n"));
    let dashboard = Dashboard::open(&session_for(&tmp)).unwrap();
    let frame = dashboard.frame();
    assert!(frame.selection.is_empty());
    assert!(frame.panels.iter().all(|p| p.result.is_empty()));
}

#[test]
fn test_top_ten_with_many_categories() {
    let mut csv = String::from(HEADER);
    for i in 0..15 {
        for _ in 0..(i + 1) {
            csv.push_str(&format!("p,cat_{i:02},1,1,1,1,1,1\n"));
        }
    }
    let tmp = write_csv(&csv);
    let table = Rc::new(ProductTable::load_csv(tmp.path()).unwrap().0);
    let cache = Rc::new(QueryCache::new());

    let result = table
        .query_with_cache(&cache)
        .select(&CategorySelection::all(&table))
        .metric(Metric::Count)
        .execute();
    assert_eq!(result.len(), 10);
    assert_eq!(result.entries[0].category, "cat_14");
    assert_eq!(result.entries[9].category, "cat_05");

    let narrowed = table
        .query_with_cache(&cache)
        .select(&CategorySelection::explicit(vec![
            "cat_00".into(),
            "cat_03".into(),
        ]))
        .execute();
    assert_eq!(
        pairs(&narrowed),
        vec![("cat_03".to_string(), 4.0), ("cat_00".to_string(), 1.0)]
    );
}

#[test]
fn test_selection_change_keeps_loaded_table() {
    let tmp = write_csv(&format!(
        "{HEADER}a,toys,40,3,100,10,5,2\nc,books,42,1,300,20,1,15\n"
    ));
    let session = session_for(&tmp);
    let mut dashboard = Dashboard::open(&session).unwrap();
    let before = Rc::clone(dashboard.table());

    dashboard.set_categories(vec!["books".into()]);
    dashboard.set_select_all(true);

    assert!(Rc::ptr_eq(&before, dashboard.table()));
    assert!(Rc::ptr_eq(&before, &session.table().unwrap()));
}
