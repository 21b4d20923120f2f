//! Shape-tolerant conversion of an extractor payload into typed records.
//!
//! The external library's return shapes are not fixed: a collection may come
//! back as a list of records, a list of bare names, or a mapping keyed by
//! table. Everything is sniffed here so code above this module only sees
//! [`ExtractedModel`]. Each section is decoded independently; a section that
//! cannot be understood becomes empty without affecting the others.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::envelope::kind_of;
use crate::types::{
    ColumnInfo, ExtractedModel, MeasureInfo, ModelSummary, PowerQueryInfo, RelationshipInfo,
    TableInfo,
};

const UNKNOWN: &str = "Unknown";

/// Convert a `SUCCESS:` payload into a typed model.
pub fn adapt_payload(payload: &Value) -> ExtractedModel {
    let tables = section(payload, "tables", adapt_tables);
    let measures = section(payload, "measures", adapt_measures);
    let relationships = section(payload, "relationships", adapt_relationships);
    let queries = section(payload, "queries", adapt_queries);

    let model_size = payload
        .get("metadata")
        .and_then(|m| field(m, &["model_size", "size"]))
        .and_then(as_count)
        .unwrap_or(0);

    let mut model = ExtractedModel {
        tables,
        measures,
        relationships,
        queries,
        metadata: ModelSummary {
            model_size,
            ..ModelSummary::default()
        },
        schema: payload
            .get("schema")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new())),
    };
    model.recount();
    model
}

fn section<T>(payload: &Value, key: &str, adapt: fn(&Value) -> Result<Vec<T>, String>) -> Vec<T> {
    match payload.get(key) {
        None | Some(Value::Null) => {
            debug!(section = key, "Section absent from payload");
            Vec::new()
        }
        Some(value) => adapt(value).unwrap_or_else(|reason| {
            warn!(section = key, %reason, "Discarding unreadable section");
            Vec::new()
        }),
    }
}

// ── Scalar coercion ───────────────────────────────────────────────

/// First present, non-null value among `keys`.
fn field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let obj = value.as_object()?;
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

fn text_field(value: &Value, keys: &[&str]) -> Option<String> {
    field(value, keys).and_then(as_text)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| *f >= 0.0)
                    .map(|f| f as u64)
            })
        }
        _ => None,
    }
}

fn as_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().is_some_and(|i| i != 0),
        Value::String(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

fn items<'a>(value: &'a Value, what: &str) -> Result<&'a [Value], String> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| format!("expected {what} array, found {}", kind_of(value)))
}

// ── Tables & columns ──────────────────────────────────────────────

fn adapt_tables(value: &Value) -> Result<Vec<TableInfo>, String> {
    match value {
        Value::Array(list) => Ok(list.iter().filter_map(|t| table_from(t, None)).collect()),
        Value::Object(map) => Ok(map
            .iter()
            .filter_map(|(name, details)| table_from(details, Some(name)))
            .collect()),
        other => Err(format!("expected array or object, found {}", kind_of(other))),
    }
}

fn table_from(value: &Value, key_name: Option<&str>) -> Option<TableInfo> {
    let name = match value {
        Value::Object(_) => text_field(value, &["name", "Name", "TableName"])
            .or_else(|| key_name.map(str::to_string)),
        Value::Array(_) => key_name.map(str::to_string),
        scalar => key_name.map(str::to_string).or_else(|| as_text(scalar)),
    }?;
    if name.is_empty() {
        return None;
    }

    let columns: Vec<ColumnInfo> = match value {
        Value::Object(_) => field(value, &["columns", "Columns"])
            .and_then(Value::as_array)
            .map(|cols| cols.iter().filter_map(column_from).collect())
            .unwrap_or_default(),
        Value::Array(cols) => cols.iter().filter_map(column_from).collect(),
        _ => Vec::new(),
    };

    let row_count = field(value, &["row_count", "RowCount", "rows"])
        .and_then(as_count)
        .unwrap_or(0);
    let column_count = field(value, &["column_count", "ColumnCount"])
        .and_then(as_count)
        .unwrap_or(columns.len() as u64);

    Some(TableInfo {
        name,
        row_count,
        column_count,
        columns,
    })
}

fn column_from(value: &Value) -> Option<ColumnInfo> {
    let (name, data_type, is_calculated) = match value {
        Value::Object(_) => (
            text_field(value, &["name", "Name", "ColumnName"])?,
            text_field(value, &["data_type", "DataType", "dataType", "PandasDataType"]),
            field(value, &["is_calculated", "IsCalculated"]).is_some_and(as_flag),
        ),
        scalar => (as_text(scalar)?, None, false),
    };
    if name.is_empty() {
        return None;
    }
    Some(ColumnInfo {
        name,
        data_type: data_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        is_calculated,
    })
}

// ── Measures ──────────────────────────────────────────────────────

fn adapt_measures(value: &Value) -> Result<Vec<MeasureInfo>, String> {
    match value {
        Value::Array(list) => Ok(list.iter().map(|m| measure_from(m, UNKNOWN)).collect()),
        // Mapping of table name to its measures.
        Value::Object(map) => Ok(measures_by_table(map)),
        other => Err(format!("expected array or object, found {}", kind_of(other))),
    }
}

fn measures_by_table(map: &Map<String, Value>) -> Vec<MeasureInfo> {
    let mut out = Vec::new();
    for (table, list) in map {
        match list {
            Value::Array(entries) => out.extend(entries.iter().map(|m| measure_from(m, table))),
            Value::Null => {}
            single => out.push(measure_from(single, table)),
        }
    }
    out
}

fn measure_from(value: &Value, default_table: &str) -> MeasureInfo {
    match value {
        Value::Object(_) => MeasureInfo {
            table_name: text_field(value, &["table_name", "TableName", "table"])
                .unwrap_or_else(|| default_table.to_string()),
            name: text_field(value, &["name", "Name"]).unwrap_or_else(|| UNKNOWN.to_string()),
            expression: text_field(value, &["expression", "Expression"]).unwrap_or_default(),
        },
        scalar => MeasureInfo {
            table_name: default_table.to_string(),
            name: as_text(scalar).unwrap_or_else(|| UNKNOWN.to_string()),
            expression: String::new(),
        },
    }
}

// ── Relationships ─────────────────────────────────────────────────

fn adapt_relationships(value: &Value) -> Result<Vec<RelationshipInfo>, String> {
    Ok(items(value, "relationship")?
        .iter()
        .filter(|r| r.is_object())
        .map(|r| RelationshipInfo {
            from_table: text_field(r, &["from_table", "FromTable", "FromTableName", "fromTable"])
                .unwrap_or_default(),
            from_column: text_field(
                r,
                &["from_column", "FromColumn", "FromColumnName", "fromColumn"],
            )
            .unwrap_or_default(),
            to_table: text_field(r, &["to_table", "ToTable", "ToTableName", "toTable"])
                .unwrap_or_default(),
            to_column: text_field(r, &["to_column", "ToColumn", "ToColumnName", "toColumn"])
                .unwrap_or_default(),
            cardinality: text_field(r, &["cardinality", "Cardinality"])
                .unwrap_or_else(|| UNKNOWN.to_string()),
        })
        .collect())
}

// ── Power Query ───────────────────────────────────────────────────

fn adapt_queries(value: &Value) -> Result<Vec<PowerQueryInfo>, String> {
    match value {
        Value::Array(list) => Ok(list
            .iter()
            .filter_map(|q| match q {
                Value::Object(_) => Some(PowerQueryInfo {
                    name: text_field(q, &["name", "Name", "TableName", "QueryName"])?,
                    expression: text_field(q, &["expression", "Expression"]).unwrap_or_default(),
                }),
                scalar => as_text(scalar).map(|name| PowerQueryInfo {
                    name,
                    expression: String::new(),
                }),
            })
            .collect()),
        Value::Object(map) => Ok(map
            .iter()
            .map(|(name, expr)| PowerQueryInfo {
                name: name.clone(),
                expression: as_text(expr).unwrap_or_default(),
            })
            .collect()),
        other => Err(format!("expected array or object, found {}", kind_of(other))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn record_shaped_payload() {
        let payload = json!({
            "tables": [{
                "name": "Sales",
                "row_count": 1200,
                "columns": [
                    {"name": "Amount", "data_type": "double"},
                    {"name": "CustomerID"}
                ]
            }],
            "measures": [{"table_name": "Sales", "name": "Total Revenue", "expression": "SUM(Sales[Amount])"}],
            "relationships": [{
                "FromTable": "Sales", "FromColumn": "CustomerID",
                "ToTable": "Customer", "ToColumn": "ID", "Cardinality": "M:1"
            }],
            "metadata": {"model_size": 4096},
            "schema": []
        });
        let model = adapt_payload(&payload);

        assert_eq!(model.tables.len(), 1);
        let sales = &model.tables[0];
        assert_eq!(sales.row_count, 1200);
        assert_eq!(sales.column_count, 2);
        assert_eq!(sales.columns[0].data_type, "double");
        assert_eq!(sales.columns[1].data_type, "Unknown");

        assert_eq!(model.measures[0].expression, "SUM(Sales[Amount])");
        assert_eq!(model.relationships[0].to_table, "Customer");
        assert_eq!(model.relationships[0].cardinality, "M:1");
        assert_eq!(
            model.metadata,
            ModelSummary {
                table_count: 1,
                measure_count: 1,
                relationship_count: 1,
                model_size: 4096,
            }
        );
    }

    #[test]
    fn bare_names_and_table_keyed_measures() {
        let payload = json!({
            "tables": ["Sales", "Date", 2024],
            "measures": {
                "Sales": [{"Name": "Margin", "Expression": "[Revenue] - [Cost]"}, "Units"],
                "Date": "Today"
            }
        });
        let model = adapt_payload(&payload);

        let names: Vec<&str> = model.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Sales", "Date", "2024"]);
        assert!(model.tables.iter().all(|t| t.columns.is_empty()));

        assert_eq!(model.measures.len(), 3);
        let margin = model.measures.iter().find(|m| m.name == "Margin").unwrap();
        assert_eq!(margin.table_name, "Sales");
        assert_eq!(margin.expression, "[Revenue] - [Cost]");
        let units = model.measures.iter().find(|m| m.name == "Units").unwrap();
        assert_eq!(units.expression, "");
        let today = model.measures.iter().find(|m| m.name == "Today").unwrap();
        assert_eq!(today.table_name, "Date");
    }

    #[test]
    fn list_of_bare_measures_defaults_table() {
        let model = adapt_payload(&json!({"measures": ["Total"]}));
        assert_eq!(model.measures[0].table_name, "Unknown");
    }

    #[test]
    fn bad_section_does_not_affect_others() {
        let payload = json!({
            "tables": 17,
            "measures": [{"name": "Count", "expression": "COUNTROWS(Sales)"}],
            "relationships": {"oops": true}
        });
        let model = adapt_payload(&payload);
        assert!(model.tables.is_empty());
        assert!(model.relationships.is_empty());
        assert_eq!(model.measures.len(), 1);
        assert_eq!(model.metadata.measure_count, 1);
    }

    #[test]
    fn counts_come_from_collections_not_payload_metadata() {
        let payload = json!({
            "tables": ["A"],
            "metadata": {"table_count": 99, "measure_count": 12, "model_size": "2048"}
        });
        let model = adapt_payload(&payload);
        assert_eq!(model.metadata.table_count, 1);
        assert_eq!(model.metadata.measure_count, 0);
        assert_eq!(model.metadata.model_size, 2048);
    }

    #[test]
    fn numeric_strings_and_floats_coerce_to_counts() {
        assert_eq!(as_count(&json!("42")), Some(42));
        assert_eq!(as_count(&json!(" 7.0 ")), Some(7));
        assert_eq!(as_count(&json!(3.9)), Some(3));
        assert_eq!(as_count(&json!(-1)), None);
        assert_eq!(as_count(&json!("n/a")), None);
    }

    #[test]
    fn pbixray_style_frames() {
        let payload = json!({
            "tables": {"Sales": {"RowCount": "10", "Columns": [{"ColumnName": "Qty", "PandasDataType": "int64", "IsCalculated": 1}]}},
            "relationships": [{
                "FromTableName": "Sales", "FromColumnName": "DateKey",
                "ToTableName": "Date", "ToColumnName": "DateKey"
            }],
            "queries": [{"TableName": "Sales", "Expression": "let Source = Sql.Database(\"srv\") in Source"}]
        });
        let model = adapt_payload(&payload);
        let col = &model.tables[0].columns[0];
        assert_eq!(col.name, "Qty");
        assert_eq!(col.data_type, "int64");
        assert!(col.is_calculated);
        assert_eq!(model.tables[0].row_count, 10);
        assert_eq!(model.relationships[0].from_column, "DateKey");
        assert_eq!(model.relationships[0].cardinality, "Unknown");
        assert_eq!(model.queries[0].name, "Sales");
        assert!(model.queries[0].expression.starts_with("let Source"));
    }

    #[test]
    fn missing_schema_defaults_to_empty_array() {
        let model = adapt_payload(&json!({}));
        assert_eq!(model.schema, json!([]));
        assert_eq!(model.metadata, ModelSummary::default());
    }
}
