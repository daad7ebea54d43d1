//! Read-only access to the imported `cv_*` tables.
//!
//! Rows are rendered back into the upstream JSON shape through the static
//! field mapping, and list queries translate upstream `filter`/`sort`/`limit`/
//! `offset` parameters into SQL. Anything the mapping cannot express is a
//! miss, so the caller falls through to the next tier.

use serde_json::{Map, Number, Value};
use tokio_rusqlite::rusqlite::{self, types::Value as SqlValue};

use super::connection::Store;
use crate::Error;
use crate::payload::{MAX_PAGE_SIZE, list_envelope};
use crate::resource::{DATA_COLUMN, FieldKind, FieldMap, QueryParams, ResourceKey, ResourceSpec, ResourceType};

/// One page of locally resolved list results.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage {
    pub results: Vec<Value>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}

impl ListPage {
    /// Wrap the page in the upstream list envelope.
    pub fn into_envelope(self) -> Value {
        list_envelope(self.results, self.total, self.limit, self.offset)
    }
}

/// SQL derived from a list request.
#[derive(Debug, Clone, PartialEq)]
struct ListPlan {
    where_sql: String,
    params: Vec<SqlValue>,
    order_sql: String,
    limit: u32,
    offset: u32,
}

impl Store {
    /// Look up one row by the key's numeric id.
    ///
    /// Returns None for list keys and ids with no local row.
    pub async fn local_lookup(&self, key: &ResourceKey) -> Result<Option<Value>, Error> {
        let Some(id) = key.numeric_id() else {
            return Ok(None);
        };
        let spec = key.resource_type.spec();
        let fields: Vec<&'static FieldMap> = spec.fields().collect();
        let sql = format!("SELECT {} FROM \"{}\" WHERE \"id\" = ?1", select_list(&fields), spec.table);

        self.conn
            .call(move |conn| -> Result<Option<Value>, Error> {
                let result = conn.query_row(&sql, [id], |row| read_values(row, fields.len() + 1));
                match result {
                    Ok(values) => Ok(Some(render_record(&fields, values))),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Resolve a list request against the local table.
    ///
    /// Returns None when the query cannot be expressed locally or no row
    /// matches.
    pub async fn local_list(&self, resource_type: ResourceType, query: &QueryParams) -> Result<Option<ListPage>, Error> {
        let spec = resource_type.spec();
        let Some(plan) = plan_list(spec, query) else {
            tracing::debug!(resource_type = %resource_type, "list query not expressible locally");
            return Ok(None);
        };
        let fields: Vec<&'static FieldMap> = spec.fields().collect();
        let count_sql = format!("SELECT COUNT(*) FROM \"{}\"{}", spec.table, plan.where_sql);
        let select_sql = format!(
            "SELECT {} FROM \"{}\"{}{} LIMIT {} OFFSET {}",
            select_list(&fields),
            spec.table,
            plan.where_sql,
            plan.order_sql,
            plan.limit,
            plan.offset
        );

        self.conn
            .call(move |conn| -> Result<Option<ListPage>, Error> {
                let total: i64 =
                    conn.query_row(&count_sql, rusqlite::params_from_iter(plan.params.iter()), |row| row.get(0))?;
                if total == 0 {
                    return Ok(None);
                }

                let mut stmt = conn.prepare(&select_sql)?;
                let rows = stmt.query_map(rusqlite::params_from_iter(plan.params.iter()), |row| {
                    read_values(row, fields.len() + 1)
                })?;
                let mut results = Vec::new();
                for values in rows {
                    results.push(render_record(&fields, values?));
                }

                Ok(Some(ListPage { results, total: total as u64, limit: plan.limit, offset: plan.offset }))
            })
            .await
            .map_err(Error::from)
    }
}

/// Mapped columns followed by the raw `data` column.
fn select_list(fields: &[&FieldMap]) -> String {
    fields
        .iter()
        .map(|f| f.column)
        .chain(std::iter::once(DATA_COLUMN))
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn read_values(row: &rusqlite::Row<'_>, len: usize) -> rusqlite::Result<Vec<SqlValue>> {
    (0..len).map(|i| row.get::<_, SqlValue>(i)).collect()
}

fn to_json(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Number(i.into()),
        SqlValue::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(b) => Value::String(String::from_utf8_lossy(&b).into_owned()),
    }
}

/// Render one row read through [`select_list`].
///
/// A row carrying a JSON object in `data` is served as that object; otherwise
/// it is rebuilt from the mapped columns.
fn render_record(fields: &[&FieldMap], mut values: Vec<SqlValue>) -> Value {
    if let Some(SqlValue::Text(raw)) = values.pop() {
        match serde_json::from_str::<Value>(&raw) {
            Ok(object @ Value::Object(_)) => return object,
            _ => tracing::warn!("ignoring local data column that is not a JSON object"),
        }
    }
    render_row(fields, values)
}

/// Rebuild the upstream object from flat column values.
///
/// Dotted mappings (`volume.id`, `image.thumb_url`) become nested objects; a
/// nested object whose members are all null is rendered as `null`.
fn render_row(fields: &[&FieldMap], values: Vec<SqlValue>) -> Value {
    let mut obj = Map::new();
    let mut nested: Vec<&str> = Vec::new();

    for (field, value) in fields.iter().zip(values) {
        let value = to_json(value);
        match field.api.split_once('.') {
            Some((parent, child)) => {
                if !nested.contains(&parent) {
                    nested.push(parent);
                }
                let entry = obj.entry(parent).or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(inner) = entry {
                    inner.insert(child.to_string(), value);
                }
            }
            None => {
                obj.insert(field.api.to_string(), value);
            }
        }
    }

    for parent in nested {
        let all_null = obj
            .get(parent)
            .and_then(Value::as_object)
            .is_some_and(|inner| inner.values().all(Value::is_null));
        if all_null {
            obj.insert(parent.to_string(), Value::Null);
        }
    }

    Value::Object(obj)
}

/// Translate list parameters into SQL, or None if any part is unsupported.
fn plan_list(spec: &ResourceSpec, query: &QueryParams) -> Option<ListPlan> {
    let mut clauses = Vec::new();
    let mut params = Vec::new();

    if let Some(filter) = query.get("filter").filter(|f| !f.is_empty()) {
        for term in filter.split(',') {
            let (name, value) = term.split_once(':')?;
            let field = spec.field(name.trim())?;
            let column = field.column;
            match value.split_once('|') {
                Some((low, high)) => {
                    clauses.push(format!("\"{column}\" BETWEEN ? AND ?"));
                    params.push(typed(field.kind, low)?);
                    params.push(typed(field.kind, high)?);
                }
                None => match field.kind {
                    FieldKind::Integer => {
                        clauses.push(format!("\"{column}\" = ?"));
                        params.push(typed(FieldKind::Integer, value)?);
                    }
                    FieldKind::Text => {
                        clauses.push(format!("\"{column}\" LIKE ? ESCAPE '\\'"));
                        params.push(SqlValue::Text(format!("%{}%", escape_like(value))));
                    }
                },
            }
        }
    }

    let order_sql = match query.get("sort").filter(|s| !s.is_empty()) {
        Some(sort) => {
            let (name, direction) = sort.split_once(':').unwrap_or((sort, "asc"));
            let column = spec.field(name.trim())?.column;
            let direction = match direction.trim().to_ascii_lowercase().as_str() {
                "asc" => "ASC",
                "desc" => "DESC",
                _ => return None,
            };
            if column == "id" {
                format!(" ORDER BY \"id\" {direction}")
            } else {
                format!(" ORDER BY \"{column}\" {direction}, \"id\" ASC")
            }
        }
        None => " ORDER BY \"id\" ASC".to_string(),
    };

    let limit = match query.get("limit") {
        Some(raw) => raw.trim().parse::<u32>().ok()?.clamp(1, MAX_PAGE_SIZE),
        None => MAX_PAGE_SIZE,
    };
    let offset = match query.get("offset") {
        Some(raw) => raw.trim().parse::<u32>().ok()?,
        None => 0,
    };

    let where_sql = if clauses.is_empty() { String::new() } else { format!(" WHERE {}", clauses.join(" AND ")) };

    Some(ListPlan { where_sql, params, order_sql, limit, offset })
}

fn typed(kind: FieldKind, raw: &str) -> Option<SqlValue> {
    match kind {
        FieldKind::Integer => raw.trim().parse::<i64>().ok().map(SqlValue::Integer),
        FieldKind::Text => Some(SqlValue::Text(raw.to_string())),
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
