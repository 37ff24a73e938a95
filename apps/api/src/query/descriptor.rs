//! Query Filter Builder: turns a flat `?key=value` mapping into an inert
//! [`QueryDescriptor`].
//!
//! Supported syntax:
//! - `field=value` exact match, `field[gt|gte|lt|lte]=value` comparisons,
//!   `field[in]=a,b,c` membership
//! - `q=term` free-text phrase search (`-` treated as a word separator)
//! - `fields=title,-description` projection
//! - `sort=-salary,title` ordering (default newest first)
//! - `page` / `limit` windowing
//!
//! The descriptor never touches the store; see [`super::collection`] for the
//! SQL binding.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::errors::AppError;

/// Control keys that are never treated as field filters.
pub const RESERVED_KEYS: [&str; 5] = ["sort", "fields", "q", "page", "limit"];

pub const DEFAULT_SORT_FIELD: &str = "createdAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl Comparison {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "gt" => Some(Comparison::Gt),
            "gte" => Some(Comparison::Gte),
            "lt" => Some(Comparison::Lt),
            "lte" => Some(Comparison::Lte),
            "in" => Some(Comparison::In),
            _ => None,
        }
    }

    pub fn sql_operator(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::In => "IN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FilterValue {
    Single(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldFilter {
    pub field: String,
    pub op: Comparison,
    pub value: FilterValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

/// Requested field subset. Disjoint include/exclude lists may coexist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Projection {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Projection {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.include
            .iter()
            .chain(self.exclude.iter())
            .map(String::as_str)
    }

    /// Whether `field` survives the projection. `id` is kept unless excluded.
    pub fn retains(&self, field: &str) -> bool {
        if self.exclude.iter().any(|f| f == field) {
            return false;
        }
        self.include.is_empty() || field == "id" || self.include.iter().any(|f| f == field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn skip(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryDescriptor {
    pub filters: Vec<FieldFilter>,
    pub search: Option<String>,
    pub projection: Projection,
    pub sort: Vec<SortKey>,
    pub pagination: Pagination,
}

impl QueryDescriptor {
    /// Builds a descriptor from raw query parameters.
    ///
    /// Fails with `InvalidQuery` on unknown comparison suffixes, malformed
    /// numbers, out-of-range pages/limits, and conflicting projections.
    pub fn build(params: &HashMap<String, String>, limits: QueryLimits) -> Result<Self, AppError> {
        // Sorted so the filter order is deterministic.
        let params: BTreeMap<&str, &str> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let mut filters = Vec::new();
        for (&key, &raw) in params.iter().filter(|(k, _)| !RESERVED_KEYS.contains(k)) {
            let (field, op) = parse_filter_key(key)?;
            let value = match op {
                Comparison::In => FilterValue::List(parse_list(field, raw)?),
                _ => FilterValue::Single(raw.to_string()),
            };
            filters.push(FieldFilter {
                field: field.to_string(),
                op,
                value,
            });
        }
        filters.sort_by(|a, b| (&a.field, a.op).cmp(&(&b.field, b.op)));

        let search = params
            .get("q")
            .map(|q| q.replace('-', " ").trim().to_string())
            .filter(|q| !q.is_empty());

        let projection = match params.get("fields") {
            Some(raw) => parse_projection(raw)?,
            None => Projection::default(),
        };

        let sort = match params.get("sort") {
            Some(raw) => parse_sort(raw)?,
            None => Vec::new(),
        };
        let sort = if sort.is_empty() {
            vec![SortKey {
                field: DEFAULT_SORT_FIELD.to_string(),
                descending: true,
            }]
        } else {
            sort
        };

        let page = parse_positive("page", params.get("page").copied(), 1)?;
        let limit = parse_positive("limit", params.get("limit").copied(), limits.default_limit)?;
        if limit > limits.max_limit {
            return Err(AppError::InvalidQuery(format!(
                "limit {limit} exceeds the maximum of {}",
                limits.max_limit
            )));
        }

        Ok(QueryDescriptor {
            filters,
            search,
            projection,
            sort,
            pagination: Pagination { page, limit },
        })
    }
}

/// Splits `salary[gte]` into `("salary", Gte)`; untagged keys are `Eq`.
fn parse_filter_key(key: &str) -> Result<(&str, Comparison), AppError> {
    let (field, op) = match key.split_once('[') {
        None => (key, Comparison::Eq),
        Some((field, rest)) => {
            let suffix = rest
                .strip_suffix(']')
                .ok_or_else(|| AppError::InvalidQuery(format!("malformed filter key '{key}'")))?;
            let op = Comparison::from_suffix(suffix).ok_or_else(|| {
                AppError::InvalidQuery(format!("unknown comparison operator '{suffix}' in '{key}'"))
            })?;
            (field, op)
        }
    };

    if field.is_empty() || field.contains(['[', ']']) {
        return Err(AppError::InvalidQuery(format!(
            "malformed filter key '{key}'"
        )));
    }
    Ok((field, op))
}

fn parse_list(field: &str, raw: &str) -> Result<Vec<String>, AppError> {
    let items: Vec<String> = split_csv(raw).map(str::to_string).collect();
    if items.is_empty() {
        return Err(AppError::InvalidQuery(format!(
            "'{field}[in]' requires at least one value"
        )));
    }
    Ok(items)
}

fn parse_projection(raw: &str) -> Result<Projection, AppError> {
    let mut projection = Projection::default();
    for item in split_csv(raw) {
        let (name, excluded) = match item.strip_prefix('-') {
            Some(name) => (name, true),
            None => (item, false),
        };
        if name.is_empty() {
            return Err(AppError::InvalidQuery(
                "empty field name in 'fields'".to_string(),
            ));
        }
        let (same, other) = if excluded {
            (&mut projection.exclude, &projection.include)
        } else {
            (&mut projection.include, &projection.exclude)
        };
        if other.iter().any(|f| f == name) {
            return Err(AppError::InvalidQuery(format!(
                "field '{name}' is both included and excluded"
            )));
        }
        if !same.iter().any(|f| f == name) {
            same.push(name.to_string());
        }
    }
    Ok(projection)
}

fn parse_sort(raw: &str) -> Result<Vec<SortKey>, AppError> {
    let mut keys: Vec<SortKey> = Vec::new();
    for item in split_csv(raw) {
        let (field, descending) = match item.strip_prefix('-') {
            Some(field) => (field, true),
            None => (item, false),
        };
        if field.is_empty() {
            return Err(AppError::InvalidQuery(
                "empty field name in 'sort'".to_string(),
            ));
        }
        if keys.iter().any(|k| k.field == field) {
            return Err(AppError::InvalidQuery(format!(
                "field '{field}' appears more than once in 'sort'"
            )));
        }
        keys.push(SortKey {
            field: field.to_string(),
            descending,
        });
    }
    Ok(keys)
}

fn parse_positive(name: &str, raw: Option<&str>, default: u32) -> Result<u32, AppError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    let value: u32 = raw.trim().parse().map_err(|_| {
        AppError::InvalidQuery(format!("'{name}' must be a positive integer, got '{raw}'"))
    })?;
    if value == 0 {
        return Err(AppError::InvalidQuery(format!("'{name}' must be at least 1")));
    }
    Ok(value)
}

fn split_csv(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn build(pairs: &[(&str, &str)]) -> Result<QueryDescriptor, AppError> {
        QueryDescriptor::build(&params(pairs), QueryLimits::default())
    }

    #[test]
    fn test_empty_params_yield_defaults() {
        let d = build(&[]).unwrap();
        assert!(d.filters.is_empty());
        assert!(d.search.is_none());
        assert!(d.projection.is_empty());
        assert_eq!(
            d.sort,
            vec![SortKey {
                field: "createdAt".to_string(),
                descending: true
            }]
        );
        assert_eq!(d.pagination, Pagination { page: 1, limit: 10 });
        assert_eq!(d.pagination.skip(), 0);
    }

    #[test]
    fn test_plain_params_become_equality_filters_exactly() {
        let input = [("jobType", "Permanent"), ("city", "Boston"), ("salary", "50000")];
        let d = build(&input).unwrap();

        let mut expected: Vec<FieldFilter> = input
            .iter()
            .map(|(k, v)| FieldFilter {
                field: k.to_string(),
                op: Comparison::Eq,
                value: FilterValue::Single(v.to_string()),
            })
            .collect();
        expected.sort_by(|a, b| a.field.cmp(&b.field));
        assert_eq!(d.filters, expected);
    }

    #[test]
    fn test_equality_filters_mirror_varied_keys() {
        let keys = ["a", "job-type", "address.city", "salary2024", "x_1.y-2", "Z"];
        let values = ["", "with space", "50000", "a,b", "ümlaut", "-neg"];

        // Every non-empty subset of the keys, each paired with a rotated value.
        for mask in 1u32..(1 << keys.len()) {
            let input: Vec<(&str, &str)> = keys
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(i, k)| (*k, values[(i + mask as usize) % values.len()]))
                .collect();
            let d = build(&input).unwrap();

            let mut expected: Vec<FieldFilter> = input
                .iter()
                .map(|(k, v)| FieldFilter {
                    field: k.to_string(),
                    op: Comparison::Eq,
                    value: FilterValue::Single(v.to_string()),
                })
                .collect();
            expected.sort_by(|a, b| a.field.cmp(&b.field));
            assert_eq!(d.filters, expected, "mask {mask:#b}");
            assert_eq!(d.pagination, Pagination { page: 1, limit: 10 });
        }
    }

    #[test]
    fn test_reserved_keys_are_never_filters() {
        let d = build(&[
            ("sort", "title"),
            ("fields", "title"),
            ("q", "rust"),
            ("page", "2"),
            ("limit", "5"),
        ])
        .unwrap();
        assert!(d.filters.is_empty());
        assert_eq!(d.search.as_deref(), Some("rust"));
    }

    #[test]
    fn test_comparison_suffixes() {
        let d = build(&[
            ("salary[gte]", "50000"),
            ("salary[lt]", "90000"),
            ("positions[gt]", "1"),
            ("jobType[in]", "Permanent, Internship"),
        ])
        .unwrap();

        assert_eq!(d.filters.len(), 4);
        assert_eq!(
            d.filters[0],
            FieldFilter {
                field: "jobType".to_string(),
                op: Comparison::In,
                value: FilterValue::List(vec!["Permanent".into(), "Internship".into()]),
            }
        );
        assert_eq!(d.filters[1].op, Comparison::Gt);
        assert_eq!(d.filters[2].op, Comparison::Gte);
        assert_eq!(d.filters[3].op, Comparison::Lt);
    }

    #[test]
    fn test_unknown_suffix_is_invalid() {
        assert!(matches!(
            build(&[("salary[ne]", "1")]),
            Err(AppError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_malformed_keys_are_invalid() {
        for key in ["salary[gt", "[gt]", "salary]", "salary[gt]x"] {
            assert!(
                matches!(build(&[(key, "1")]), Err(AppError::InvalidQuery(_))),
                "expected InvalidQuery for {key}"
            );
        }
    }

    #[test]
    fn test_empty_in_list_is_invalid() {
        assert!(matches!(
            build(&[("industry[in]", " , ")]),
            Err(AppError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_sort_parsing() {
        let d = build(&[("sort", "-salary,title")]).unwrap();
        assert_eq!(
            d.sort,
            vec![
                SortKey {
                    field: "salary".to_string(),
                    descending: true
                },
                SortKey {
                    field: "title".to_string(),
                    descending: false
                },
            ]
        );
    }

    #[test]
    fn test_sort_rejects_duplicates_and_bare_dash() {
        assert!(matches!(
            build(&[("sort", "title,-title")]),
            Err(AppError::InvalidQuery(_))
        ));
        assert!(matches!(build(&[("sort", "-")]), Err(AppError::InvalidQuery(_))));
    }

    #[test]
    fn test_blank_sort_falls_back_to_default() {
        let d = build(&[("sort", " , ")]).unwrap();
        assert_eq!(d.sort[0].field, DEFAULT_SORT_FIELD);
        assert!(d.sort[0].descending);
    }

    #[test]
    fn test_projection_mixed_disjoint_fields_accepted() {
        let d = build(&[("fields", "title,-description")]).unwrap();
        assert_eq!(d.projection.include, vec!["title".to_string()]);
        assert_eq!(d.projection.exclude, vec!["description".to_string()]);
    }

    #[test]
    fn test_projection_same_field_conflict_is_invalid() {
        assert!(matches!(
            build(&[("fields", "title,-title")]),
            Err(AppError::InvalidQuery(_))
        ));
        assert!(matches!(
            build(&[("fields", "-title,title")]),
            Err(AppError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_projection_retains() {
        let p = Projection {
            include: vec!["title".into()],
            exclude: vec!["description".into()],
        };
        assert!(p.retains("title"));
        assert!(p.retains("id"));
        assert!(!p.retains("salary"));
        assert!(!p.retains("description"));

        let exclude_only = Projection {
            include: vec![],
            exclude: vec!["id".into()],
        };
        assert!(!exclude_only.retains("id"));
        assert!(exclude_only.retains("salary"));
    }

    #[test]
    fn test_pagination_skip() {
        let d = build(&[("page", "3"), ("limit", "10")]).unwrap();
        assert_eq!(d.pagination.skip(), 20);

        let d = build(&[("page", "1"), ("limit", "100")]).unwrap();
        assert_eq!(d.pagination.skip(), 0);
    }

    #[test]
    fn test_non_numeric_or_zero_pagination_is_invalid() {
        for (key, value) in [
            ("page", "abc"),
            ("page", "0"),
            ("page", "-1"),
            ("limit", "ten"),
            ("limit", "0"),
            ("limit", "2.5"),
        ] {
            assert!(
                matches!(build(&[(key, value)]), Err(AppError::InvalidQuery(_))),
                "expected InvalidQuery for {key}={value}"
            );
        }
    }

    #[test]
    fn test_limit_above_maximum_is_invalid() {
        assert!(matches!(
            build(&[("limit", "500")]),
            Err(AppError::InvalidQuery(_))
        ));
        let strict = QueryLimits {
            default_limit: 10,
            max_limit: 20,
        };
        assert!(QueryDescriptor::build(&params(&[("limit", "20")]), strict).is_ok());
        assert!(QueryDescriptor::build(&params(&[("limit", "21")]), strict).is_err());
    }

    #[test]
    fn test_search_term_normalized() {
        let d = build(&[("q", "node-developer")]).unwrap();
        assert_eq!(d.search.as_deref(), Some("node developer"));

        let d = build(&[("q", "  ")]).unwrap();
        assert!(d.search.is_none());
    }
}
