//! In-memory typed tables.
//!
//! A [`Dataset`] pairs a [`Schema`] with rows of nullable [`Value`]s. Every
//! row holds exactly one slot per column and every non-null slot matches its
//! column's declared type; constructors enforce both so downstream joins and
//! merges can index rows positionally.

use std::cmp::Ordering;

use itertools::Itertools;
use log::debug;

use crate::{
    data::{ComparableValue, Value, parse_stored_value, parse_typed_value},
    error::{Error, Result},
    schema::{ColumnMeta, ColumnType, Schema},
};

pub type Row = Vec<Option<Value>>;

#[derive(Debug, Clone)]
pub struct Dataset {
    schema: Schema,
    rows: Vec<Row>,
}

/// Equal when columns and rows match; the schema version stamp is ignored.
impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.schema.columns == other.schema.columns && self.rows == other.rows
    }
}

impl Dataset {
    pub fn new(schema: Schema, rows: Vec<Row>) -> Result<Self> {
        schema.validate()?;
        for (idx, row) in rows.iter().enumerate() {
            check_row(&schema, row, idx + 1)?;
        }
        Ok(Self { schema, rows })
    }

    pub fn empty(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    /// Builds a dataset from text cells, parsing each against its column type.
    /// Empty cells become nulls.
    pub fn from_text_rows<R, S>(schema: Schema, records: R) -> Result<Self>
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_cells(schema, records, parse_typed_value)
    }

    /// Builds a dataset from cells written by the table store, where nulls are
    /// spelled `null_token` and empty string cells stay empty strings.
    pub fn from_stored_rows<R, S>(schema: Schema, records: R, null_token: &str) -> Result<Self>
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_cells(schema, records, |cell, datatype| {
            parse_stored_value(cell, datatype, null_token)
        })
    }

    fn from_cells<R, S, F>(schema: Schema, records: R, parse: F) -> Result<Self>
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
        F: Fn(&str, &ColumnType) -> anyhow::Result<Option<Value>>,
    {
        let mut rows = Vec::new();
        for (idx, record) in records.into_iter().enumerate() {
            let cells = record.into_iter().collect::<Vec<_>>();
            if cells.len() != schema.len() {
                return Err(Error::RowArity {
                    row: idx + 1,
                    expected: schema.len(),
                    found: cells.len(),
                });
            }
            let row = schema
                .columns
                .iter()
                .zip(&cells)
                .map(|(column, cell)| {
                    parse(cell.as_ref(), &column.datatype).map_err(|err| Error::Cast {
                        column: column.name.clone(),
                        reason: format!("row {}: {err}", idx + 1),
                    })
                })
                .collect::<Result<Row>>()?;
            rows.push(row);
        }
        Self::new(schema, rows)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema.headers()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.schema
            .column_index(name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    pub fn value(&self, row: usize, column: &str) -> Result<Option<&Value>> {
        let idx = self.column_index(column)?;
        Ok(self.rows.get(row).and_then(|r| r[idx].as_ref()))
    }

    /// All values of one column in row order.
    pub fn column_values(&self, column: &str) -> Result<Vec<Option<&Value>>> {
        let idx = self.column_index(column)?;
        Ok(self.rows.iter().map(|row| row[idx].as_ref()).collect())
    }

    /// Appends a column holding only nulls, typed as `datatype`.
    pub fn with_null_column(mut self, name: &str, datatype: ColumnType) -> Result<Self> {
        if self.schema.has_column(name) {
            return Err(Error::DuplicateColumn(name.to_string()));
        }
        debug!("Adding null column '{name}' ({datatype})");
        self.schema.columns.push(ColumnMeta::new(name, datatype));
        for row in &mut self.rows {
            row.push(None);
        }
        Ok(self)
    }

    /// Renames every column by appending `suffix`.
    pub fn with_suffix(mut self, suffix: &str) -> Result<Self> {
        for column in &mut self.schema.columns {
            column.name.push_str(suffix);
        }
        self.schema.validate()?;
        Ok(self)
    }

    /// Projects the dataset onto `columns`, in that order.
    pub fn select<S: AsRef<str>>(&self, columns: &[S]) -> Result<Self> {
        let indices = columns
            .iter()
            .map(|name| self.column_index(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let schema = Schema {
            columns: indices
                .iter()
                .map(|idx| self.schema.columns[*idx].clone())
                .collect(),
            schema_version: None,
            null_token: None,
        };
        schema.validate()?;
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|idx| row[*idx].clone()).collect())
            .collect();
        Ok(Self { schema, rows })
    }

    /// Stable ascending sort on `columns`, nulls first.
    pub fn sort_by<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<()> {
        let indices = columns
            .iter()
            .map(|name| self.column_index(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.rows.sort_by(|left, right| {
            indices
                .iter()
                .map(|idx| {
                    ComparableValue(left[*idx].as_ref()).cmp(&ComparableValue(right[*idx].as_ref()))
                })
                .find(|ordering| *ordering != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        Ok(())
    }

    /// Appends rows that already conform to this dataset's schema.
    pub fn extend(&mut self, rows: Vec<Row>) -> Result<()> {
        let offset = self.rows.len();
        for (idx, row) in rows.iter().enumerate() {
            check_row(&self.schema, row, offset + idx + 1)?;
        }
        self.rows.extend(rows);
        Ok(())
    }

    /// Rows rendered as display strings, nulls as empty strings.
    pub fn text_rows(&self) -> Vec<Vec<String>> {
        self.rows_with_nulls_as("")
    }

    /// Rows rendered as display strings, nulls as `null_token`.
    pub fn rows_with_nulls_as(&self, null_token: &str) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| match cell {
                        Some(value) => value.as_display(),
                        None => null_token.to_string(),
                    })
                    .collect()
            })
            .collect()
    }

    /// Whether any non-null cell renders exactly as `text`.
    pub fn contains_text(&self, text: &str) -> bool {
        self.rows
            .iter()
            .flatten()
            .flatten()
            .any(|value| value.as_display() == text)
    }

    pub fn describe_columns(&self) -> String {
        self.schema
            .columns
            .iter()
            .map(|c| format!("{}:{}", c.name, c.datatype))
            .join(", ")
    }
}

fn check_row(schema: &Schema, row: &Row, row_number: usize) -> Result<()> {
    if row.len() != schema.len() {
        return Err(Error::RowArity {
            row: row_number,
            expected: schema.len(),
            found: row.len(),
        });
    }
    for (column, cell) in schema.columns.iter().zip(row) {
        if let Some(value) = cell
            && !accepts(&column.datatype, value)
        {
            return Err(Error::TypeMismatch {
                row: row_number,
                column: column.name.clone(),
                expected: column.datatype.clone(),
                found: value.type_name(),
            });
        }
    }
    Ok(())
}

fn accepts(datatype: &ColumnType, value: &Value) -> bool {
    matches!(
        (datatype, value),
        (ColumnType::String, Value::String(_))
            | (ColumnType::Integer, Value::Integer(_))
            | (ColumnType::Float, Value::Float(_))
            | (ColumnType::Boolean, Value::Boolean(_))
            | (ColumnType::Date, Value::Date(_))
            | (ColumnType::DateTime, Value::DateTime(_))
            | (ColumnType::Time, Value::Time(_))
            | (ColumnType::Guid, Value::Guid(_))
            | (ColumnType::Decimal(_), Value::Decimal(_))
    )
}
