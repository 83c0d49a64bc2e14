//! Rewrite properties checked over every table shape the loader writes.

use sqlbridge_core::{
    count_placeholders, rebind, Dialect, ParamRule, SqlValue, Statement, StatementKind,
    TableSchema, TranslateError, Translator,
};

const PLANS: &[&str] = &[
    "globalid",
    "createdate",
    "updatedate",
    "regnum",
    "hostingorg",
    "bidderorgcode",
    "documenttype",
    "publishdate",
    "href",
];

const PLAN_LIST: &[&str] = &[
    "globalid",
    "createdate",
    "updatedate",
    "regnum",
    "plan_number",
    "plan_name",
    "publish_date",
    "signing_date",
    "planing_period",
    "org_code",
    "org_name",
    "org_inn",
    "org_kpp",
    "org_ogrn",
    "org_type",
    "budget_code",
    "budget_name",
    "authority",
    "sum_first_year",
    "sum_second_year",
    "sum_third_year",
];

const OBJECTS: &[&str] = &[
    "globalid",
    "createdate",
    "updatedate",
    "id",
    "object_number",
    "status_object",
    "name",
    "type",
    "timing",
    "subject_rf_code",
    "subject_rf_name",
    "location",
    "purpose_code",
    "purpose_name",
    "kad_number",
];

const SINGLE: &[&str] = &["globalid"];

fn shapes() -> Vec<(&'static str, &'static [&'static str])> {
    vec![
        ("privatisationplans", PLANS),
        ("privatisationplanlist", PLAN_LIST),
        ("privatizationobjects", OBJECTS),
        ("single", SINGLE),
    ]
}

fn upsert_sql(table: &str, width: usize) -> String {
    format!(
        "INSERT OR REPLACE INTO {table} VALUES ({})",
        vec!["?"; width].join(", ")
    )
}

fn create_sql(table: &str, columns: &[&str]) -> String {
    let defs: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i == 0 {
                format!("{c} TEXT PRIMARY KEY")
            } else {
                format!("{c} TEXT")
            }
        })
        .collect();
    format!("CREATE TABLE IF NOT EXISTS {table} ({})", defs.join(", "))
}

#[test]
fn merge_binds_two_c_minus_one_values() {
    let translator = Translator::new(Dialect::SqlServer);
    for (table, columns) in shapes() {
        let c = columns.len();
        let sql = upsert_sql(table, c);
        let schema = TableSchema::new(table, columns.iter().copied());
        let plan = translator.translate_sql(&sql, Some(&schema)).unwrap();

        assert_eq!(plan.kind, StatementKind::UpsertInsert, "{table}");
        assert_eq!(count_placeholders(&plan.sql), 2 * c - 1, "{table}");

        let row: Vec<SqlValue> = (0..c).map(|i| SqlValue::from(format!("v{i}"))).collect();
        let bound = rebind(row.clone(), &plan).unwrap();
        assert_eq!(bound.len(), 2 * c - 1, "{table}");
        assert_eq!(&bound[..c], row.as_slice(), "{table}");
        assert_eq!(&bound[c..], &row[1..], "{table}");
    }
}

#[test]
fn single_column_merge_has_no_update_branch() {
    let plan = Translator::new(Dialect::SqlServer)
        .translate_sql(
            &upsert_sql("single", 1),
            Some(&TableSchema::new("single", SINGLE.iter().copied())),
        )
        .unwrap();
    assert!(!plan.sql.contains("WHEN MATCHED THEN"));
    assert_eq!(plan.params, ParamRule::DuplicateNonKey { arity: 1 });
}

#[test]
fn merge_keys_on_first_column() {
    let plan = Translator::new(Dialect::SqlServer)
        .translate_sql(
            &upsert_sql("privatisationplans", PLANS.len()),
            Some(&TableSchema::new("privatisationplans", PLANS.iter().copied())),
        )
        .unwrap();
    assert!(plan
        .sql
        .contains("ON target.[globalid] = source.[globalid]"));
    assert!(!plan.sql.contains("UPDATE SET [globalid]"));
}

#[test]
fn create_table_types_and_idempotence() {
    let translator = Translator::new(Dialect::SqlServer);
    for (table, columns) in shapes() {
        let sql = create_sql(table, columns);
        let once = translator.translate_sql(&sql, None).unwrap().sql;

        assert!(once.contains("globalid NVARCHAR(255) PRIMARY KEY"), "{table}");
        assert_eq!(
            once.matches("NVARCHAR(MAX)").count(),
            columns.len() - 1,
            "{table}"
        );
        assert!(!once.contains(" TEXT"), "{table}");
        assert!(once.starts_with("IF NOT EXISTS (SELECT 1 FROM INFORMATION_SCHEMA.TABLES"));

        let twice = translator.translate_sql(&once, None).unwrap().sql;
        assert_eq!(once, twice, "{table}");
    }
}

#[test]
fn native_dialect_is_identity() {
    let translator = Translator::new(Dialect::Sqlite);
    for (table, columns) in shapes() {
        for sql in [upsert_sql(table, columns.len()), create_sql(table, columns)] {
            let plan = translator.translate_sql(&sql, None).unwrap();
            assert_eq!(plan.sql, sql);
            assert_eq!(plan.params, ParamRule::Identity);
        }
    }
}

#[test]
fn upsert_requires_columns_on_secondary() {
    let sql = upsert_sql("privatisationplans", PLANS.len());
    let stmt = Statement::parse(&sql).unwrap();
    assert!(stmt.schema_request().is_some());

    let err = Translator::new(Dialect::SqlServer)
        .translate(&stmt, None)
        .unwrap_err();
    assert!(matches!(err, TranslateError::MissingSchema { .. }));
}

#[test]
fn rebind_rejects_short_rows() {
    let plan = Translator::new(Dialect::SqlServer)
        .translate_sql(
            &upsert_sql("privatisationplans", PLANS.len()),
            Some(&TableSchema::new("privatisationplans", PLANS.iter().copied())),
        )
        .unwrap();
    assert!(rebind(vec![SqlValue::from("abc")], &plan).is_err());
}
