use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    data::Value,
    dataset::{Dataset, Row},
    error::{Error, Result},
    schema::Schema,
};

/// Which side of a full outer join produced an output row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOrigin {
    Matched,
    LeftOnly,
    RightOnly,
}

/// Output of [`full_outer_join`]: the joined rows plus the origin of each one.
#[derive(Debug, Clone)]
pub struct Joined {
    pub dataset: Dataset,
    pub origins: Vec<RowOrigin>,
}

/// Hashable, normalized form of one key cell. Numerically equal integers,
/// integral floats and decimals of any scale map to the same part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Integer(i64),
    Float(u64),
    Decimal(Decimal),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    Guid(Uuid),
    String(String),
}

impl KeyPart {
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Integer(i) => KeyPart::Integer(*i),
            Value::Float(f) => float_key(*f),
            Value::Decimal(d) => KeyPart::Decimal(d.normalize()),
            Value::Boolean(b) => KeyPart::Boolean(*b),
            Value::Date(d) => KeyPart::Date(*d),
            Value::DateTime(dt) => KeyPart::DateTime(*dt),
            Value::Time(t) => KeyPart::Time(*t),
            Value::Guid(g) => KeyPart::Guid(*g),
            Value::String(s) => KeyPart::String(s.clone()),
        }
    }
}

fn float_key(f: f64) -> KeyPart {
    const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;
    if f.is_nan() {
        KeyPart::Float(f64::NAN.to_bits())
    } else if f.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&f) {
        KeyPart::Integer(f as i64)
    } else {
        KeyPart::Float(f.to_bits())
    }
}

/// Full outer equi-join of `left` and `right` on the `(left column, right column)` pairs in `on`.
///
/// The output carries every left column followed by every right column, so the
/// two sides must not share column names. Rows whose key contains a null never
/// match anything. Matched and left-only rows come first in left order, then
/// right-only rows in right order.
pub fn full_outer_join(left: &Dataset, right: &Dataset, on: &[(String, String)]) -> Result<Joined> {
    if on.is_empty() {
        return Err(Error::NoKeys);
    }
    let left_indices = key_indices(left, on.iter().map(|(l, _)| l.as_str()))?;
    let right_indices = key_indices(right, on.iter().map(|(_, r)| r.as_str()))?;
    validate_key_types(left.schema(), right.schema(), &left_indices, &right_indices)?;

    let schema = combined_schema(left.schema(), right.schema())?;
    let left_width = left.schema().len();
    let right_width = right.schema().len();

    let mut lookup: HashMap<Vec<KeyPart>, Vec<usize>> = HashMap::new();
    for (idx, row) in right.rows().iter().enumerate() {
        if let Some(key) = build_key(row, &right_indices) {
            lookup.entry(key).or_default().push(idx);
        }
    }

    let mut right_matched = vec![false; right.row_count()];
    let mut rows: Vec<Row> = Vec::new();
    let mut origins = Vec::new();
    let mut matched_pairs = 0usize;

    for left_row in left.rows() {
        let bucket = build_key(left_row, &left_indices).and_then(|key| lookup.get(&key));
        match bucket {
            Some(matches) => {
                for right_idx in matches {
                    right_matched[*right_idx] = true;
                    matched_pairs += 1;
                    let mut combined = left_row.clone();
                    combined.extend(right.rows()[*right_idx].iter().cloned());
                    rows.push(combined);
                    origins.push(RowOrigin::Matched);
                }
            }
            None => {
                let mut combined = left_row.clone();
                combined.extend(std::iter::repeat_n(None, right_width));
                rows.push(combined);
                origins.push(RowOrigin::LeftOnly);
            }
        }
    }

    for (right_row, matched) in right.rows().iter().zip(&right_matched) {
        if *matched {
            continue;
        }
        let mut combined: Row = vec![None; left_width];
        combined.extend(right_row.iter().cloned());
        rows.push(combined);
        origins.push(RowOrigin::RightOnly);
    }

    debug!(
        "Full join produced {} row(s) from {matched_pairs} matched pair(s)",
        rows.len()
    );
    Ok(Joined {
        dataset: Dataset::new(schema, rows)?,
        origins,
    })
}

fn key_indices<'a, I>(dataset: &Dataset, columns: I) -> Result<Vec<usize>>
where
    I: IntoIterator<Item = &'a str>,
{
    columns
        .into_iter()
        .map(|name| dataset.column_index(name))
        .collect()
}

fn validate_key_types(
    left: &Schema,
    right: &Schema,
    left_indices: &[usize],
    right_indices: &[usize],
) -> Result<()> {
    for (l_idx, r_idx) in left_indices.iter().zip(right_indices) {
        let left_column = &left.columns[*l_idx];
        let right_column = &right.columns[*r_idx];
        if !left_column.datatype.is_key_compatible(&right_column.datatype) {
            return Err(Error::KeyType {
                left: left_column.name.clone(),
                right: right_column.name.clone(),
                left_type: left_column.datatype.clone(),
                right_type: right_column.datatype.clone(),
            });
        }
    }
    Ok(())
}

fn combined_schema(left: &Schema, right: &Schema) -> Result<Schema> {
    if let Some(clash) = right.columns.iter().find(|c| left.has_column(&c.name)) {
        return Err(Error::DuplicateColumn(clash.name.clone()));
    }
    let columns = left.columns.iter().chain(&right.columns).cloned().collect();
    Ok(Schema::new(columns)?)
}

/// `None` when any key part is null.
fn build_key(row: &Row, key_indices: &[usize]) -> Option<Vec<KeyPart>> {
    key_indices
        .iter()
        .map(|idx| row[*idx].as_ref().map(KeyPart::from_value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnMeta, ColumnType, DecimalSpec};

    fn orders() -> Dataset {
        let schema = Schema::new(vec![
            ColumnMeta::new("order_id", ColumnType::Integer),
            ColumnMeta::new("customer", ColumnType::Integer),
        ])
        .unwrap();
        Dataset::from_text_rows(schema, [["10", "1"], ["11", "2"], ["12", ""]]).unwrap()
    }

    fn customers() -> Dataset {
        let schema = Schema::new(vec![
            ColumnMeta::new("id", ColumnType::Float),
            ColumnMeta::new("name", ColumnType::String),
        ])
        .unwrap();
        Dataset::from_text_rows(schema, [["1", "Ada"], ["3", "Grace"], ["", "Ghost"]]).unwrap()
    }

    fn on() -> Vec<(String, String)> {
        vec![("customer".to_string(), "id".to_string())]
    }

    fn pairs(columns: &[(&str, &str)]) -> Vec<(String, String)> {
        columns
            .iter()
            .map(|(l, r)| (l.to_string(), r.to_string()))
            .collect()
    }

    #[test]
    fn integer_keys_match_integral_float_keys() {
        let joined = full_outer_join(&orders(), &customers(), &on()).unwrap();
        assert_eq!(joined.origins[0], RowOrigin::Matched);
        assert_eq!(
            joined.dataset.value(0, "name").unwrap(),
            Some(&Value::String("Ada".into()))
        );
    }

    #[test]
    fn full_join_keeps_both_sides_and_never_matches_null_keys() {
        let joined = full_outer_join(&orders(), &customers(), &on()).unwrap();
        let dataset = &joined.dataset;
        // 3 left rows (one matched) + 2 unmatched right rows.
        assert_eq!(dataset.row_count(), 5);
        assert_eq!(
            joined.origins,
            vec![
                RowOrigin::Matched,
                RowOrigin::LeftOnly,
                RowOrigin::LeftOnly,
                RowOrigin::RightOnly,
                RowOrigin::RightOnly,
            ]
        );
        assert_eq!(dataset.value(2, "order_id").unwrap(), Some(&Value::Integer(12)));
        assert_eq!(dataset.value(2, "name").unwrap(), None);
        assert_eq!(dataset.value(3, "order_id").unwrap(), None);
        assert_eq!(
            dataset.value(3, "name").unwrap(),
            Some(&Value::String("Grace".into()))
        );
        assert_eq!(
            dataset.value(4, "name").unwrap(),
            Some(&Value::String("Ghost".into()))
        );
    }

    #[test]
    fn decimal_keys_match_across_scales() {
        let ty = ColumnType::Decimal(DecimalSpec::new(10, 2).unwrap());
        let left = Dataset::from_text_rows(
            Schema::new(vec![
                ColumnMeta::new("k", ty.clone()),
                ColumnMeta::new("v", ColumnType::String),
            ])
            .unwrap(),
            [["1.0", "old"], ["2.50", "kept"]],
        )
        .unwrap();
        let right = Dataset::from_text_rows(
            Schema::new(vec![
                ColumnMeta::new("k_r", ty),
                ColumnMeta::new("v_r", ColumnType::String),
            ])
            .unwrap(),
            [["1", "new"], ["2.5", "also"]],
        )
        .unwrap();
        let joined = full_outer_join(&left, &right, &pairs(&[("k", "k_r")])).unwrap();
        assert_eq!(joined.dataset.row_count(), 2);
        assert_eq!(joined.origins, vec![RowOrigin::Matched, RowOrigin::Matched]);
    }

    #[test]
    fn composite_string_keys_containing_separators_stay_distinct() {
        let schema = |a: &str, b: &str| {
            Schema::new(vec![
                ColumnMeta::new(a, ColumnType::String),
                ColumnMeta::new(b, ColumnType::String),
            ])
            .unwrap()
        };
        let left =
            Dataset::from_text_rows(schema("a", "b"), [["x\u{1f}y", "z"]]).unwrap();
        let right =
            Dataset::from_text_rows(schema("a_r", "b_r"), [["x", "y\u{1f}z"]]).unwrap();
        let joined =
            full_outer_join(&left, &right, &pairs(&[("a", "a_r"), ("b", "b_r")])).unwrap();
        assert_eq!(joined.dataset.row_count(), 2);
        assert_eq!(joined.origins, vec![RowOrigin::LeftOnly, RowOrigin::RightOnly]);
    }

    #[test]
    fn nan_float_keys_match_each_other() {
        assert_eq!(float_key(f64::NAN), float_key(-f64::NAN));
        assert_eq!(float_key(-0.0), KeyPart::Integer(0));
        assert_eq!(float_key(2.0), KeyPart::Integer(2));
        assert_ne!(float_key(2.5), float_key(2.0));
    }

    #[test]
    fn join_rejects_incompatible_key_types() {
        let on = pairs(&[("customer", "name")]);
        let err = full_outer_join(&orders(), &customers(), &on).unwrap_err();
        assert!(matches!(err, Error::KeyType { .. }));
    }

    #[test]
    fn join_rejects_clashing_column_names() {
        let err = full_outer_join(&orders(), &orders(), &pairs(&[("order_id", "order_id")]))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateColumn(_)));
    }
}
