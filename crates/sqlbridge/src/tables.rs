//! Tables created and written by the loader.
//!
//! Each table is keyed by a text `globalid` in its first column, followed
//! by the `createdate`/`updatedate` audit columns and the payload columns.

use serde_json::{Map, Value};
use sqlbridge_core::SqlValue;
use tracing::info;

use crate::error::{Error, Result};
use crate::executor::Executor;

/// A column of a managed table. All columns are `TEXT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagedColumn {
    /// Column name.
    pub name: &'static str,
    /// The column is declared `NOT NULL`.
    pub not_null: bool,
}

const fn col(name: &'static str) -> ManagedColumn {
    ManagedColumn {
        name,
        not_null: false,
    }
}

const fn required(name: &'static str) -> ManagedColumn {
    ManagedColumn {
        name,
        not_null: true,
    }
}

/// A table with a fixed column list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagedTable {
    /// Table name.
    pub name: &'static str,
    /// Columns in declaration order; the first is the primary key.
    pub columns: &'static [ManagedColumn],
}

/// Privatisation plan index.
pub const PRIVATISATION_PLANS: ManagedTable = ManagedTable {
    name: "privatisationplans",
    columns: &[
        col("globalid"),
        col("createdate"),
        col("updatedate"),
        required("regnum"),
        col("hostingorg"),
        col("bidderorgcode"),
        col("documenttype"),
        col("publishdate"),
        col("href"),
    ],
};

/// Privatisation plan details.
pub const PRIVATISATION_PLAN_LIST: ManagedTable = ManagedTable {
    name: "privatisationplanlist",
    columns: &[
        col("globalid"),
        col("createdate"),
        col("updatedate"),
        col("regnum"),
        col("plan_number"),
        col("plan_name"),
        col("publish_date"),
        col("signing_date"),
        col("planing_period"),
        col("org_code"),
        col("org_name"),
        col("org_inn"),
        col("org_kpp"),
        col("org_ogrn"),
        col("org_type"),
        col("budget_code"),
        col("budget_name"),
        col("authority"),
        col("sum_first_year"),
        col("sum_second_year"),
        col("sum_third_year"),
    ],
};

/// Objects listed in privatisation plans.
pub const PRIVATIZATION_OBJECTS: ManagedTable = ManagedTable {
    name: "privatizationobjects",
    columns: &[
        col("globalid"),
        col("createdate"),
        col("updatedate"),
        col("id"),
        col("object_number"),
        col("status_object"),
        col("name"),
        col("type"),
        col("timing"),
        col("subject_rf_code"),
        col("subject_rf_name"),
        col("location"),
        col("purpose_code"),
        col("purpose_name"),
        col("kad_number"),
    ],
};

/// All managed tables in creation order.
pub const MANAGED_TABLES: [ManagedTable; 3] = [
    PRIVATISATION_PLANS,
    PRIVATISATION_PLAN_LIST,
    PRIVATIZATION_OBJECTS,
];

/// Timestamp format of the audit columns.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

impl ManagedTable {
    /// Looks up a managed table by name, ignoring case.
    #[must_use]
    pub fn find(name: &str) -> Option<Self> {
        MANAGED_TABLES
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Returns the column names in order.
    #[must_use]
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// Returns the SQLite `CREATE TABLE IF NOT EXISTS` statement.
    #[must_use]
    pub fn create_sql(&self) -> String {
        let defs: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let constraint = if i == 0 {
                    " PRIMARY KEY"
                } else if c.not_null {
                    " NOT NULL"
                } else {
                    ""
                };
                format!("    {} TEXT{constraint}", c.name)
            })
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.name,
            defs.join(",\n")
        )
    }

    /// Returns the upsert statement with an explicit column list.
    #[must_use]
    pub fn upsert_sql(&self) -> String {
        format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            self.name,
            self.column_names().join(", "),
            vec!["?"; self.columns.len()].join(", ")
        )
    }

    /// Orders the values of a JSON object into a full row.
    ///
    /// `createdate` and `updatedate` are set to `now` when the object does
    /// not carry them. Other missing columns are `NULL`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRow`] for keys that are not columns, values
    /// that are not scalars, a missing primary key, or a missing `NOT NULL`
    /// column.
    pub fn row_from_json(&self, object: &Map<String, Value>, now: &str) -> Result<Vec<SqlValue>> {
        let invalid = |message: String| Error::InvalidRow {
            table: self.name.to_string(),
            message,
        };

        if let Some(unknown) = object
            .keys()
            .find(|k| !self.columns.iter().any(|c| c.name.eq_ignore_ascii_case(k)))
        {
            return Err(invalid(format!("unknown column '{unknown}'")));
        }

        let mut row = Vec::with_capacity(self.columns.len());
        for (i, column) in self.columns.iter().enumerate() {
            let value = object
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(column.name))
                .map(|(_, v)| v);
            let value = match value {
                Some(Value::Array(_) | Value::Object(_)) => {
                    return Err(invalid(format!("column '{}' needs a scalar value", column.name)));
                }
                Some(Value::String(s)) => SqlValue::Text(s.clone()),
                Some(Value::Bool(b)) => SqlValue::Bool(*b),
                Some(Value::Number(n)) => n
                    .as_i64()
                    .map(SqlValue::Int)
                    .or_else(|| n.as_f64().map(SqlValue::Float))
                    .unwrap_or(SqlValue::Null),
                Some(Value::Null) | None => {
                    if matches!(column.name, "createdate" | "updatedate") {
                        SqlValue::from(now)
                    } else {
                        SqlValue::Null
                    }
                }
            };
            if value.is_null() && (i == 0 || column.not_null) {
                return Err(invalid(format!("column '{}' is required", column.name)));
            }
            row.push(value);
        }
        Ok(row)
    }
}

/// Creates every managed table that does not exist yet.
///
/// # Errors
///
/// Stops at the first table that cannot be created.
pub async fn create_managed_tables(executor: &Executor) -> Result<()> {
    for table in MANAGED_TABLES {
        executor.write(&table.create_sql(), Vec::new()).await?;
        info!(table = table.name, "Ensured table");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_sql() {
        let sql = PRIVATISATION_PLANS.create_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS privatisationplans (\n"));
        assert!(sql.contains("    globalid TEXT PRIMARY KEY,\n"));
        assert!(sql.contains("    regnum TEXT NOT NULL,\n"));
        assert!(sql.ends_with("    href TEXT\n)"));
    }

    #[test]
    fn test_upsert_sql() {
        assert_eq!(
            PRIVATISATION_PLANS.upsert_sql(),
            "INSERT OR REPLACE INTO privatisationplans (globalid, createdate, updatedate, \
             regnum, hostingorg, bidderorgcode, documenttype, publishdate, href) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );
    }

    #[test]
    fn test_column_counts() {
        assert_eq!(PRIVATISATION_PLANS.columns.len(), 9);
        assert_eq!(PRIVATISATION_PLAN_LIST.columns.len(), 21);
        assert_eq!(PRIVATIZATION_OBJECTS.columns.len(), 15);
        for table in MANAGED_TABLES {
            assert_eq!(table.columns[0].name, "globalid");
        }
    }

    #[test]
    fn test_find() {
        assert_eq!(
            ManagedTable::find("PrivatisationPlans"),
            Some(PRIVATISATION_PLANS)
        );
        assert_eq!(ManagedTable::find("users"), None);
    }

    #[test]
    fn test_row_from_json_fills_audit_columns() {
        let object = serde_json::json!({
            "globalid": "abc",
            "regnum": "R1",
            "hostingorg": "OrgA",
        });
        let row = PRIVATISATION_PLANS
            .row_from_json(object.as_object().unwrap(), "2024-05-01T10:00:00")
            .unwrap();
        assert_eq!(row.len(), 9);
        assert_eq!(row[0], SqlValue::from("abc"));
        assert_eq!(row[1], SqlValue::from("2024-05-01T10:00:00"));
        assert_eq!(row[2], SqlValue::from("2024-05-01T10:00:00"));
        assert_eq!(row[3], SqlValue::from("R1"));
        assert_eq!(row[4], SqlValue::from("OrgA"));
        assert_eq!(row[8], SqlValue::Null);
    }

    #[test]
    fn test_row_from_json_rejects_bad_rows() {
        let now = "2024-05-01T10:00:00";
        let unknown = serde_json::json!({ "globalid": "a", "regnum": "R", "color": "red" });
        let err = PRIVATISATION_PLANS
            .row_from_json(unknown.as_object().unwrap(), now)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid row for table 'privatisationplans': unknown column 'color'"
        );

        let no_key = serde_json::json!({ "regnum": "R" });
        assert!(PRIVATISATION_PLANS
            .row_from_json(no_key.as_object().unwrap(), now)
            .is_err());

        let no_regnum = serde_json::json!({ "globalid": "a" });
        assert!(PRIVATISATION_PLANS
            .row_from_json(no_regnum.as_object().unwrap(), now)
            .is_err());
    }
}
