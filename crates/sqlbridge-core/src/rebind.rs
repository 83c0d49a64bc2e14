//! Parameter re-binding for rewritten statements.

use std::fmt;

use crate::dialect::Dialect;
use crate::lexer::{Lexer, TokenKind};
use crate::rewrite::{ParamRule, TranslationPlan};
use crate::value::SqlValue;

/// The caller supplied the wrong number of values for a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebindError {
    /// Value count differs from the placeholders of the original statement.
    Arity {
        /// Values the statement binds.
        expected: usize,
        /// Values supplied.
        actual: usize,
    },
}

impl fmt::Display for RebindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arity { expected, actual } => write!(
                f,
                "Statement binds {expected} value(s) but {actual} were supplied"
            ),
        }
    }
}

impl std::error::Error for RebindError {}

/// Derives the values to bind for `plan` from the caller's values.
///
/// For an upsert rewritten into a `MERGE` the values become
/// `[v1, ..., vC, v2, ..., vC]`.
///
/// # Errors
///
/// Returns [`RebindError::Arity`] if the plan fixes the row width and
/// `params` does not have that many values.
pub fn rebind(params: Vec<SqlValue>, plan: &TranslationPlan) -> Result<Vec<SqlValue>, RebindError> {
    match plan.params {
        ParamRule::Identity => Ok(params),
        ParamRule::DuplicateNonKey { arity } => {
            if params.len() != arity {
                return Err(RebindError::Arity {
                    expected: arity,
                    actual: params.len(),
                });
            }
            let mut out = Vec::with_capacity((2 * arity).saturating_sub(1));
            out.extend(params.iter().cloned());
            out.extend(params.into_iter().skip(1));
            Ok(out)
        }
    }
}

/// Counts `?` placeholders, ignoring those inside literals, quoted names
/// and comments.
#[must_use]
pub fn count_placeholders(sql: &str) -> usize {
    Lexer::new(sql)
        .tokenize()
        .iter()
        .filter(|t| t.kind == TokenKind::Question)
        .count()
}

/// Replaces each `?` placeholder with the bind marker of `dialect`.
///
/// SQL Server drivers bind by position with `@P1`, `@P2`, ... markers.
/// For SQLite the text is returned unchanged.
#[must_use]
pub fn number_placeholders(sql: &str, dialect: Dialect) -> String {
    if dialect == Dialect::Sqlite {
        return sql.to_string();
    }

    let mut out = String::with_capacity(sql.len() + 8);
    let mut cursor = 0;
    let mut index = 0;
    for token in Lexer::new(sql).tokenize() {
        if token.kind == TokenKind::Question {
            index += 1;
            out.push_str(&sql[cursor..token.span.start]);
            out.push_str(&dialect.bind_marker(index));
            cursor = token.span.end;
        }
    }
    out.push_str(&sql[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::StatementKind;

    fn merge_plan(arity: usize) -> TranslationPlan {
        TranslationPlan {
            kind: StatementKind::UpsertInsert,
            sql: String::new(),
            params: ParamRule::DuplicateNonKey { arity },
        }
    }

    #[test]
    fn test_identity_keeps_values() {
        let plan = TranslationPlan::passthrough(StatementKind::RawPassthrough, "SELECT ?");
        let values = vec![SqlValue::from("x"), SqlValue::Null];
        assert_eq!(rebind(values.clone(), &plan).unwrap(), values);
    }

    #[test]
    fn test_duplicate_non_key_values() {
        let values = vec![
            SqlValue::from("abc"),
            SqlValue::from("R1"),
            SqlValue::from("OrgA"),
        ];
        let bound = rebind(values, &merge_plan(3)).unwrap();
        assert_eq!(
            bound,
            vec![
                SqlValue::from("abc"),
                SqlValue::from("R1"),
                SqlValue::from("OrgA"),
                SqlValue::from("R1"),
                SqlValue::from("OrgA"),
            ]
        );
    }

    #[test]
    fn test_single_value_row() {
        let bound = rebind(vec![SqlValue::Int(7)], &merge_plan(1)).unwrap();
        assert_eq!(bound, vec![SqlValue::Int(7)]);
    }

    #[test]
    fn test_arity_mismatch() {
        let err = rebind(vec![SqlValue::Int(1)], &merge_plan(2)).unwrap_err();
        assert_eq!(
            err,
            RebindError::Arity {
                expected: 2,
                actual: 1
            }
        );
        assert_eq!(
            err.to_string(),
            "Statement binds 2 value(s) but 1 were supplied"
        );
    }

    #[test]
    fn test_count_placeholders_skips_literals() {
        assert_eq!(count_placeholders("SELECT ? WHERE a = '?' AND b = ?"), 2);
        assert_eq!(count_placeholders("SELECT 1 -- ?\n"), 0);
        assert_eq!(count_placeholders("SELECT [what?] FROM t"), 0);
    }

    #[test]
    fn test_number_placeholders() {
        assert_eq!(
            number_placeholders("UPDATE t SET a = ?, b = '?' WHERE k = ?", Dialect::SqlServer),
            "UPDATE t SET a = @P1, b = '?' WHERE k = @P2"
        );
        let sql = "SELECT * FROM t WHERE a = ?";
        assert_eq!(number_placeholders(sql, Dialect::Sqlite), sql);
    }
}
