//! Delimited-text row parsing for analytics-style pipelines.

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::errors::StepError;

/// Parses delimited text into one map per data row, keyed by the header
/// row's column names.
///
/// Numeric-looking fields become JSON numbers (integers first, then
/// floats); everything else stays a string. A row whose field count does
/// not match the header is a validation error.
pub fn parse_rows(raw: &str, delimiter: char) -> Result<Vec<FxHashMap<String, Value>>, StepError> {
    let mut lines = raw.lines().filter(|line| !line.trim().is_empty());
    let Some(header_line) = lines.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<&str> = header_line.split(delimiter).map(str::trim).collect();

    let mut rows = Vec::new();
    for (line_no, line) in lines.enumerate() {
        let fields: Vec<&str> = line.split(delimiter).map(str::trim).collect();
        if fields.len() != headers.len() {
            return Err(StepError::Validation(format!(
                "row {} has {} fields, header has {}",
                line_no + 2,
                fields.len(),
                headers.len()
            )));
        }
        let row = headers
            .iter()
            .zip(&fields)
            .map(|(header, field)| ((*header).to_string(), parse_field(field)))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn parse_field(field: &str) -> Value {
    if let Ok(n) = field.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(f) = field.parse::<f64>() {
        return Value::from(f);
    }
    Value::String(field.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_typed_rows() {
        let rows = parse_rows("name,age,score\nada,36,9.5\ngrace,45,8.0\n", ',').unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), Some(&json!("ada")));
        assert_eq!(rows[0].get("age"), Some(&json!(36)));
        assert_eq!(rows[0].get("score"), Some(&json!(9.5)));
    }

    #[test]
    fn field_count_mismatch_is_an_error() {
        let err = parse_rows("a,b\n1,2,3\n", ',').unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn empty_input_yields_no_rows() {
        assert!(parse_rows("", ',').unwrap().is_empty());
        assert!(parse_rows("only,a,header\n", ',').unwrap().is_empty());
    }
}
