//! Binds a [`QueryDescriptor`] to PostgreSQL for one table.
//!
//! Field names come from the API, so they are only ever resolved through the
//! collection's whitelist; values are always bound as parameters.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::errors::AppError;
use crate::query::descriptor::{Comparison, FieldFilter, FilterValue, Projection, QueryDescriptor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    Timestamp,
    Uuid,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Name exposed to API callers (camelCase, matches the serialized record).
    pub name: &'static str,
    /// SQL expression the field reads from.
    pub column: &'static str,
    pub kind: ColumnKind,
}

/// A queryable table and the API fields it exposes.
#[derive(Debug)]
pub struct Collection {
    pub table: &'static str,
    pub select: &'static str,
    pub fields: &'static [FieldSpec],
    /// Columns covered by the full-text index, in index order.
    pub text_columns: &'static [&'static str],
}

#[derive(Debug, Clone, PartialEq)]
enum BoundValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

impl ColumnKind {
    fn parse(self, field: &str, raw: &str) -> Result<BoundValue, AppError> {
        let invalid = |expected: &str| {
            AppError::InvalidQuery(format!("'{field}' expects {expected}, got '{raw}'"))
        };
        match self {
            ColumnKind::Text => Ok(BoundValue::Text(raw.to_string())),
            ColumnKind::Integer => raw
                .trim()
                .parse()
                .map(BoundValue::Integer)
                .map_err(|_| invalid("an integer")),
            ColumnKind::Float => raw
                .trim()
                .parse()
                .map(BoundValue::Float)
                .map_err(|_| invalid("a number")),
            ColumnKind::Timestamp => parse_timestamp(raw.trim())
                .map(BoundValue::Timestamp)
                .ok_or_else(|| invalid("an RFC 3339 timestamp or YYYY-MM-DD date")),
            ColumnKind::Uuid => raw
                .trim()
                .parse()
                .map(BoundValue::Uuid)
                .map_err(|_| invalid("a UUID")),
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn push_bound(qb: &mut QueryBuilder<'static, Postgres>, value: BoundValue) {
    match value {
        BoundValue::Text(v) => {
            qb.push_bind(v);
        }
        BoundValue::Integer(v) => {
            qb.push_bind(v);
        }
        BoundValue::Float(v) => {
            qb.push_bind(v);
        }
        BoundValue::Timestamp(v) => {
            qb.push_bind(v);
        }
        BoundValue::Uuid(v) => {
            qb.push_bind(v);
        }
    }
}

impl Collection {
    pub fn field(&self, name: &str) -> Result<&FieldSpec, AppError> {
        self.fields.iter().find(|f| f.name == name).ok_or_else(|| {
            AppError::InvalidQuery(format!("unknown field '{name}' for {}", self.table))
        })
    }

    /// SQL for the full-text vector; must match the GIN index expression.
    pub fn text_vector_sql(&self) -> String {
        format!(
            "to_tsvector('english', {})",
            self.text_columns.join(" || ' ' || ")
        )
    }

    /// Compiles the descriptor into a `SELECT` with filters, search, order,
    /// `LIMIT` and `OFFSET`.
    pub fn select_query(
        &self,
        descriptor: &QueryDescriptor,
    ) -> Result<QueryBuilder<'static, Postgres>, AppError> {
        for field in descriptor.projection.fields() {
            self.field(field)?;
        }

        let mut qb = QueryBuilder::new(format!("SELECT {} FROM {}", self.select, self.table));
        let mut has_where = false;

        for filter in &descriptor.filters {
            push_conjunction(&mut qb, &mut has_where);
            self.push_filter(&mut qb, filter)?;
        }

        if let Some(term) = &descriptor.search {
            push_conjunction(&mut qb, &mut has_where);
            qb.push(self.text_vector_sql());
            qb.push(" @@ phraseto_tsquery('english', ");
            qb.push_bind(term.clone());
            qb.push(")");
        }

        qb.push(" ORDER BY ");
        for (i, key) in descriptor.sort.iter().enumerate() {
            let spec = self.field(&key.field)?;
            if i > 0 {
                qb.push(", ");
            }
            qb.push(spec.column);
            qb.push(if key.descending { " DESC" } else { " ASC" });
        }
        // Stable paging across equal sort values.
        if !descriptor.sort.iter().any(|k| k.field == "id") {
            qb.push(", id ASC");
        }

        let window = descriptor.pagination;
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(window.limit));
        qb.push(" OFFSET ");
        qb.push_bind(window.skip() as i64);

        Ok(qb)
    }

    fn push_filter(
        &self,
        qb: &mut QueryBuilder<'static, Postgres>,
        filter: &FieldFilter,
    ) -> Result<(), AppError> {
        let spec = self.field(&filter.field)?;
        match (&filter.value, filter.op) {
            (FilterValue::List(items), Comparison::In) => {
                let values = items
                    .iter()
                    .map(|item| spec.kind.parse(spec.name, item))
                    .collect::<Result<Vec<_>, _>>()?;
                qb.push(spec.column);
                qb.push(" IN (");
                for (i, value) in values.into_iter().enumerate() {
                    if i > 0 {
                        qb.push(", ");
                    }
                    push_bound(qb, value);
                }
                qb.push(")");
            }
            (FilterValue::Single(raw), op) if op != Comparison::In => {
                let value = spec.kind.parse(spec.name, raw)?;
                qb.push(spec.column);
                qb.push(" ");
                qb.push(op.sql_operator());
                qb.push(" ");
                push_bound(qb, value);
            }
            _ => {
                return Err(AppError::InvalidQuery(format!(
                    "operator and value mismatch for '{}'",
                    filter.field
                )))
            }
        }
        Ok(())
    }

    /// Applies the projection to a serialized record.
    pub fn project(&self, record: Value, projection: &Projection) -> Value {
        match record {
            Value::Object(map) if !projection.is_empty() => Value::Object(
                map.into_iter()
                    .filter(|(key, _)| projection.retains(key))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Executes the descriptor and returns projected records.
    pub async fn find<T>(
        &self,
        pool: &PgPool,
        descriptor: &QueryDescriptor,
    ) -> Result<Vec<Value>, AppError>
    where
        T: for<'r> FromRow<'r, PgRow> + Serialize + Send + Unpin,
    {
        let mut qb = self.select_query(descriptor)?;
        let rows: Vec<T> = qb.build_query_as::<T>().fetch_all(pool).await?;

        rows.iter()
            .map(|row| {
                let value = serde_json::to_value(row)
                    .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize record: {e}")))?;
                Ok(self.project(value, &descriptor.projection))
            })
            .collect()
    }
}

fn push_conjunction(qb: &mut QueryBuilder<'static, Postgres>, has_where: &mut bool) {
    qb.push(if *has_where { " AND " } else { " WHERE " });
    *has_where = true;
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;
    use crate::query::descriptor::QueryLimits;

    static TEST_FIELDS: [FieldSpec; 5] = [
        FieldSpec {
            name: "id",
            column: "id",
            kind: ColumnKind::Uuid,
        },
        FieldSpec {
            name: "title",
            column: "title",
            kind: ColumnKind::Text,
        },
        FieldSpec {
            name: "salary",
            column: "salary",
            kind: ColumnKind::Integer,
        },
        FieldSpec {
            name: "lastDate",
            column: "last_date",
            kind: ColumnKind::Timestamp,
        },
        FieldSpec {
            name: "createdAt",
            column: "created_at",
            kind: ColumnKind::Timestamp,
        },
    ];

    static POSTINGS: Collection = Collection {
        table: "postings",
        select: "*",
        fields: &TEST_FIELDS,
        text_columns: &["title", "description"],
    };

    fn descriptor(pairs: &[(&str, &str)]) -> QueryDescriptor {
        let params: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        QueryDescriptor::build(&params, QueryLimits::default()).unwrap()
    }

    #[test]
    fn test_default_query_sql() {
        let qb = POSTINGS.select_query(&descriptor(&[])).unwrap();
        assert_eq!(
            qb.sql(),
            "SELECT * FROM postings ORDER BY created_at DESC, id ASC LIMIT $1 OFFSET $2"
        );
    }

    #[test]
    fn test_filters_search_and_sort_sql() {
        let d = descriptor(&[
            ("salary[gte]", "50000"),
            ("title", "Engineer"),
            ("q", "rust"),
            ("sort", "-salary,title"),
        ]);
        let qb = POSTINGS.select_query(&d).unwrap();
        assert_eq!(
            qb.sql(),
            "SELECT * FROM postings WHERE salary >= $1 AND title = $2 \
             AND to_tsvector('english', title || ' ' || description) @@ phraseto_tsquery('english', $3) \
             ORDER BY salary DESC, title ASC, id ASC LIMIT $4 OFFSET $5"
        );
    }

    #[test]
    fn test_in_filter_binds_each_value() {
        let d = descriptor(&[("salary[in]", "1,2,3")]);
        let qb = POSTINGS.select_query(&d).unwrap();
        assert!(qb.sql().contains("salary IN ($1, $2, $3)"));
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        for pairs in [
            vec![("password", "x")],
            vec![("sort", "password")],
            vec![("fields", "password")],
        ] {
            assert!(matches!(
                POSTINGS.select_query(&descriptor(&pairs)),
                Err(AppError::InvalidQuery(_))
            ));
        }
    }

    #[test]
    fn test_values_are_typed_per_column() {
        assert!(matches!(
            POSTINGS.select_query(&descriptor(&[("salary[gt]", "lots")])),
            Err(AppError::InvalidQuery(_))
        ));
        assert!(matches!(
            POSTINGS.select_query(&descriptor(&[("id", "not-a-uuid")])),
            Err(AppError::InvalidQuery(_))
        ));
        assert!(POSTINGS
            .select_query(&descriptor(&[("lastDate[lt]", "2024-05-01")]))
            .is_ok());
        assert!(POSTINGS
            .select_query(&descriptor(&[("lastDate[lt]", "2024-05-01T10:00:00Z")]))
            .is_ok());
    }

    #[test]
    fn test_parse_timestamp_date_only_is_midnight_utc() {
        let ts = parse_timestamp("2024-05-01").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-05-01T00:00:00+00:00");
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_project_includes_and_excludes() {
        let record = json!({"id": "1", "title": "Dev", "salary": 10, "createdAt": "now"});

        let included = POSTINGS.project(record.clone(), &descriptor(&[("fields", "title")]).projection);
        assert_eq!(included, json!({"id": "1", "title": "Dev"}));

        let excluded = POSTINGS.project(record.clone(), &descriptor(&[("fields", "-salary")]).projection);
        assert_eq!(excluded, json!({"id": "1", "title": "Dev", "createdAt": "now"}));

        let untouched = POSTINGS.project(record.clone(), &Projection::default());
        assert_eq!(untouched, record);
    }
}
