//! Directory-backed table store.
//!
//! Each table lives in `<root>/<name>/` as a `schema.yml` describing its
//! columns and a `data.csv` holding its rows. Nulls are written as the
//! table's `null_token` from `schema.yml`, so empty strings survive. Writes go
//! to temporary files that are renamed into place once complete.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, bail, ensure};
use clap::ValueEnum;
use itertools::Itertools;
use log::{debug, info};

use crate::{
    compare::compare_schemas,
    dataset::Dataset,
    io_utils,
    schema::{ColumnMeta, Schema},
};

const SCHEMA_FILE: &str = "schema.yml";
const DATA_FILE: &str = "data.csv";
const TABLE_DELIMITER: u8 = b',';
const NULL_TOKEN: &str = "\\N";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum SaveMode {
    #[default]
    Overwrite,
    Append,
    ErrorIfExists,
    Ignore,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub mode: SaveMode,
    /// Union the stored schema with the incoming one instead of failing.
    pub merge_schema: bool,
    /// On overwrite, replace the stored schema outright.
    pub overwrite_schema: bool,
}

impl WriteOptions {
    pub fn overwrite() -> Self {
        Self::default()
    }

    pub fn with_merge_schema(mut self) -> Self {
        self.merge_schema = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Warehouse {
    root: PathBuf,
}

impl Warehouse {
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).with_context(|| format!("Creating warehouse directory {root:?}"))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn table_dir(&self, name: &str) -> Result<PathBuf> {
        validate_table_name(name)?;
        Ok(self.root.join(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.table_dir(name)
            .map(|dir| dir.join(SCHEMA_FILE).is_file())
            .unwrap_or(false)
    }

    pub fn list_tables(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("Listing warehouse directory {:?}", self.root))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.context("Reading warehouse entry")?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if validate_table_name(&name).is_ok() && entry.path().join(SCHEMA_FILE).is_file() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn load_schema(&self, name: &str) -> Result<Schema> {
        let dir = self.table_dir(name)?;
        ensure!(dir.join(SCHEMA_FILE).is_file(), "Table '{name}' does not exist");
        Schema::load(&dir.join(SCHEMA_FILE))
    }

    pub fn load_table(&self, name: &str) -> Result<Dataset> {
        let schema = self.load_schema(name)?;
        let data_path = self.table_dir(name)?.join(DATA_FILE);
        let (headers, records) =
            io_utils::read_text_records(&data_path, TABLE_DELIMITER, encoding_rs::UTF_8)?;
        schema
            .validate_headers(&headers)
            .with_context(|| format!("Validating headers of table '{name}'"))?;
        let dataset = match schema.null_token.clone() {
            Some(token) => Dataset::from_stored_rows(schema, records, &token),
            None => Dataset::from_text_rows(schema, records),
        }
        .with_context(|| format!("Parsing rows of table '{name}'"))?;
        debug!("Loaded {} row(s) from table '{name}'", dataset.row_count());
        Ok(dataset)
    }

    /// Persists `dataset` as table `name` according to `options`.
    pub fn save_table(&self, name: &str, dataset: &Dataset, options: &WriteOptions) -> Result<()> {
        let dir = self.table_dir(name)?;
        if !self.exists(name) {
            self.write_files(&dir, dataset)?;
            info!("Created table '{name}' with {} row(s)", dataset.row_count());
            return Ok(());
        }

        match options.mode {
            SaveMode::ErrorIfExists => bail!("Table '{name}' already exists"),
            SaveMode::Ignore => {
                info!("Table '{name}' already exists; skipping write");
                Ok(())
            }
            SaveMode::Overwrite => {
                let existing = self.load_schema(name)?;
                let output = if existing.same_shape(dataset.schema()) || options.overwrite_schema {
                    dataset.clone()
                } else if options.merge_schema {
                    let merged = union_schema(&existing, dataset.schema())?;
                    conform(dataset, &merged)?
                } else {
                    return Err(schema_mismatch(name, &existing, dataset.schema()));
                };
                self.write_files(&dir, &output)?;
                info!("Overwrote table '{name}' with {} row(s)", output.row_count());
                Ok(())
            }
            SaveMode::Append => {
                let existing = self.load_table(name)?;
                let target = if existing.schema().same_shape(dataset.schema()) {
                    existing.schema().clone()
                } else if options.merge_schema {
                    union_schema(existing.schema(), dataset.schema())?
                } else {
                    return Err(schema_mismatch(name, existing.schema(), dataset.schema()));
                };
                let mut combined = conform(&existing, &target)?;
                let appended = conform(dataset, &target)?;
                let added = appended.row_count();
                combined.extend(appended.into_rows())?;
                self.write_files(&dir, &combined)?;
                info!("Appended {added} row(s) to table '{name}'");
                Ok(())
            }
        }
    }

    pub fn drop_table(&self, name: &str) -> Result<()> {
        let dir = self.table_dir(name)?;
        ensure!(self.exists(name), "Table '{name}' does not exist");
        fs::remove_dir_all(&dir).with_context(|| format!("Removing table directory {dir:?}"))
    }

    fn write_files(&self, dir: &Path, dataset: &Dataset) -> Result<()> {
        fs::create_dir_all(dir).with_context(|| format!("Creating table directory {dir:?}"))?;
        let null_token = pick_null_token(dataset);
        let csv = io_utils::render_csv(
            &dataset.column_names(),
            &dataset.rows_with_nulls_as(&null_token),
            TABLE_DELIMITER,
        )?;
        let mut schema = dataset.schema().clone();
        schema.null_token = Some(null_token);
        let data_tmp = dir.join(format!("{DATA_FILE}.tmp"));
        let schema_tmp = dir.join(format!("{SCHEMA_FILE}.tmp"));
        fs::write(&data_tmp, csv).with_context(|| format!("Writing {data_tmp:?}"))?;
        schema.save(&schema_tmp)?;
        fs::rename(&data_tmp, dir.join(DATA_FILE))
            .with_context(|| format!("Replacing data file in {dir:?}"))?;
        fs::rename(&schema_tmp, dir.join(SCHEMA_FILE))
            .with_context(|| format!("Replacing schema file in {dir:?}"))?;
        Ok(())
    }
}

/// `\N`, or `\N1`, `\N2`, ... when a stored value already reads as the token.
fn pick_null_token(dataset: &Dataset) -> String {
    let mut token = NULL_TOKEN.to_string();
    let mut counter = 1usize;
    while dataset.contains_text(&token) {
        token = format!("{NULL_TOKEN}{counter}");
        counter += 1;
    }
    token
}

fn validate_table_name(name: &str) -> Result<()> {
    ensure!(!name.is_empty(), "Table name cannot be empty");
    ensure!(
        name.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
        "Table name '{name}' may only contain ASCII letters, digits, '_' and '-'"
    );
    Ok(())
}

/// Existing columns first, then incoming-only columns. Shared columns must agree on type.
fn union_schema(existing: &Schema, incoming: &Schema) -> Result<Schema> {
    let mut columns: Vec<ColumnMeta> = existing.columns.clone();
    for column in &incoming.columns {
        match existing.datatype(&column.name) {
            Some(datatype) if *datatype != column.datatype => bail!(
                "Failed to merge column '{}': incompatible types {} and {}",
                column.name,
                datatype,
                column.datatype
            ),
            Some(_) => {}
            None => columns.push(column.clone()),
        }
    }
    Schema::new(columns)
}

/// Null-pads `dataset` with the target's extra columns and reorders to match it.
fn conform(dataset: &Dataset, target: &Schema) -> Result<Dataset> {
    let mut widened = dataset.clone();
    for column in &target.columns {
        if !widened.schema().has_column(&column.name) {
            widened = widened.with_null_column(&column.name, column.datatype.clone())?;
        }
    }
    Ok(widened.select(target.headers().as_slice())?)
}

fn schema_mismatch(name: &str, existing: &Schema, incoming: &Schema) -> anyhow::Error {
    let details = compare_schemas(existing, incoming)
        .iter()
        .map(ToString::to_string)
        .join("; ");
    let details = if details.is_empty() {
        "column order differs".to_string()
    } else {
        details
    };
    anyhow!(
        "Schema mismatch writing table '{name}' ({details}); \
         use merge-schema or overwrite-schema to change its schema"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{data::Value, schema::ColumnType};
    use tempfile::tempdir;

    fn people(columns: &[(&str, ColumnType)], rows: &[&[&str]]) -> Dataset {
        let schema = Schema::new(
            columns
                .iter()
                .map(|(name, ty)| ColumnMeta::new(*name, ty.clone()))
                .collect(),
        )
        .unwrap();
        Dataset::from_text_rows(schema, rows.iter().map(|r| r.iter().copied())).unwrap()
    }

    fn id_name(rows: &[&[&str]]) -> Dataset {
        people(&[("id", ColumnType::Integer), ("name", ColumnType::String)], rows)
    }

    #[test]
    fn tables_round_trip_with_nulls() {
        let dir = tempdir().unwrap();
        let warehouse = Warehouse::open(dir.path()).unwrap();
        let data = id_name(&[&["1", "Doe, John"], &["2", ""]]);
        warehouse
            .save_table("people", &data, &WriteOptions::overwrite())
            .unwrap();
        let loaded = warehouse.load_table("people").unwrap();
        assert_eq!(loaded, data);
        assert_eq!(warehouse.list_tables().unwrap(), vec!["people"]);
    }

    #[test]
    fn empty_strings_survive_a_round_trip_apart_from_nulls() {
        let dir = tempdir().unwrap();
        let warehouse = Warehouse::open(dir.path()).unwrap();
        let schema = id_name(&[]).schema().clone();
        let data = Dataset::new(
            schema,
            vec![
                vec![Some(Value::Integer(1)), Some(Value::String(String::new()))],
                vec![Some(Value::Integer(2)), None],
            ],
        )
        .unwrap();
        warehouse
            .save_table("people", &data, &WriteOptions::overwrite())
            .unwrap();
        let loaded = warehouse.load_table("people").unwrap();
        assert_eq!(loaded, data);
        assert_eq!(
            warehouse.load_schema("people").unwrap().null_token.as_deref(),
            Some(NULL_TOKEN)
        );
    }

    #[test]
    fn null_token_steps_aside_for_matching_values() {
        let dir = tempdir().unwrap();
        let warehouse = Warehouse::open(dir.path()).unwrap();
        let data = id_name(&[&["1", "\\N"], &["2", ""]]);
        warehouse
            .save_table("t", &data, &WriteOptions::overwrite())
            .unwrap();
        assert_eq!(
            warehouse.load_schema("t").unwrap().null_token.as_deref(),
            Some("\\N1")
        );
        assert_eq!(warehouse.load_table("t").unwrap(), data);
    }

    #[test]
    fn tables_without_a_null_token_read_empty_cells_as_null() {
        let dir = tempdir().unwrap();
        let warehouse = Warehouse::open(dir.path()).unwrap();
        let table = dir.path().join("legacy");
        fs::create_dir_all(&table).unwrap();
        id_name(&[]).schema().save(&table.join(SCHEMA_FILE)).unwrap();
        fs::write(table.join(DATA_FILE), "\"id\",\"name\"\n\"1\",\"\"\n").unwrap();
        let loaded = warehouse.load_table("legacy").unwrap();
        assert_eq!(loaded.value(0, "name").unwrap(), None);
    }

    #[test]
    fn invalid_names_are_rejected() {
        let dir = tempdir().unwrap();
        let warehouse = Warehouse::open(dir.path()).unwrap();
        assert!(warehouse.table_dir("../escape").is_err());
        assert!(warehouse.load_table("missing").is_err());
    }

    #[test]
    fn overwrite_with_new_schema_requires_an_option() {
        let dir = tempdir().unwrap();
        let warehouse = Warehouse::open(dir.path()).unwrap();
        warehouse
            .save_table("t", &id_name(&[&["1", "a"]]), &WriteOptions::overwrite())
            .unwrap();
        let wider = people(
            &[
                ("id", ColumnType::Integer),
                ("name", ColumnType::String),
                ("age", ColumnType::Integer),
            ],
            &[&["2", "b", "30"]],
        );
        let err = warehouse
            .save_table("t", &wider, &WriteOptions::overwrite())
            .unwrap_err();
        assert!(err.to_string().contains("Column age is missing in first schema"));

        warehouse
            .save_table("t", &wider, &WriteOptions::overwrite().with_merge_schema())
            .unwrap();
        assert_eq!(warehouse.load_table("t").unwrap(), wider);
    }

    #[test]
    fn overwrite_with_merge_schema_keeps_stored_columns() {
        let dir = tempdir().unwrap();
        let warehouse = Warehouse::open(dir.path()).unwrap();
        let wide = people(
            &[
                ("id", ColumnType::Integer),
                ("name", ColumnType::String),
                ("age", ColumnType::Integer),
            ],
            &[&["1", "a", "10"]],
        );
        warehouse
            .save_table("t", &wide, &WriteOptions::overwrite())
            .unwrap();
        warehouse
            .save_table(
                "t",
                &id_name(&[&["2", "b"]]),
                &WriteOptions::overwrite().with_merge_schema(),
            )
            .unwrap();
        let loaded = warehouse.load_table("t").unwrap();
        assert_eq!(loaded.column_names(), vec!["id", "name", "age"]);
        assert_eq!(loaded.text_rows(), vec![vec!["2", "b", ""]]);
    }

    #[test]
    fn overwrite_schema_replaces_the_stored_shape() {
        let dir = tempdir().unwrap();
        let warehouse = Warehouse::open(dir.path()).unwrap();
        warehouse
            .save_table("t", &id_name(&[&["1", "a"]]), &WriteOptions::overwrite())
            .unwrap();
        let narrow = people(&[("code", ColumnType::String)], &[&["x"]]);
        let options = WriteOptions {
            overwrite_schema: true,
            ..WriteOptions::overwrite()
        };
        warehouse.save_table("t", &narrow, &options).unwrap();
        assert_eq!(warehouse.load_table("t").unwrap(), narrow);
    }

    #[test]
    fn append_concatenates_and_merges_schema_when_asked() {
        let dir = tempdir().unwrap();
        let warehouse = Warehouse::open(dir.path()).unwrap();
        warehouse
            .save_table("t", &id_name(&[&["1", "a"]]), &WriteOptions::overwrite())
            .unwrap();
        let append = WriteOptions {
            mode: SaveMode::Append,
            ..WriteOptions::default()
        };
        warehouse
            .save_table("t", &id_name(&[&["2", "b"]]), &append)
            .unwrap();
        assert_eq!(warehouse.load_table("t").unwrap().row_count(), 2);

        let aged = people(
            &[("id", ColumnType::Integer), ("age", ColumnType::Integer)],
            &[&["3", "33"]],
        );
        assert!(warehouse.save_table("t", &aged, &append).is_err());
        warehouse
            .save_table("t", &aged, &append.with_merge_schema())
            .unwrap();
        let loaded = warehouse.load_table("t").unwrap();
        assert_eq!(loaded.column_names(), vec!["id", "name", "age"]);
        assert_eq!(loaded.row_count(), 3);
        assert_eq!(loaded.value(2, "age").unwrap(), Some(&Value::Integer(33)));
        assert_eq!(loaded.value(2, "name").unwrap(), None);
    }

    #[test]
    fn merge_schema_rejects_conflicting_types() {
        let dir = tempdir().unwrap();
        let warehouse = Warehouse::open(dir.path()).unwrap();
        warehouse
            .save_table("t", &id_name(&[&["1", "a"]]), &WriteOptions::overwrite())
            .unwrap();
        let retyped = people(&[("id", ColumnType::String)], &[&["x"]]);
        let err = warehouse
            .save_table("t", &retyped, &WriteOptions::overwrite().with_merge_schema())
            .unwrap_err();
        assert!(err.to_string().contains("incompatible types"));
    }

    #[test]
    fn error_if_exists_and_ignore_modes() {
        let dir = tempdir().unwrap();
        let warehouse = Warehouse::open(dir.path()).unwrap();
        let first = id_name(&[&["1", "a"]]);
        let strict = WriteOptions {
            mode: SaveMode::ErrorIfExists,
            ..WriteOptions::default()
        };
        warehouse.save_table("t", &first, &strict).unwrap();
        assert!(warehouse.save_table("t", &first, &strict).is_err());

        let ignore = WriteOptions {
            mode: SaveMode::Ignore,
            ..WriteOptions::default()
        };
        warehouse
            .save_table("t", &id_name(&[&["9", "z"]]), &ignore)
            .unwrap();
        assert_eq!(warehouse.load_table("t").unwrap(), first);
    }
}
