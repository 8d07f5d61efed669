//! End-to-end walkthrough on two small people tables.

use anyhow::Result;
use log::info;

use crate::{
    cli::DemoArgs,
    compare::compare_schemas,
    dataset::Dataset,
    harmonize::harmonize_schemas,
    merge::merge,
    schema::{ColumnMeta, ColumnType, Schema},
    warehouse::{Warehouse, WriteOptions},
};

pub const MAIN_TABLE: &str = "df1_apo";
pub const UPDATE_TABLE: &str = "df2_apo";
pub const MERGE_KEYS: [&str; 2] = ["id", "name"];

pub fn main_dataset() -> Result<Dataset> {
    let schema = Schema::new(vec![
        ColumnMeta::new("id", ColumnType::Integer),
        ColumnMeta::new("name", ColumnType::String),
        ColumnMeta::new("age", ColumnType::Integer),
    ])?;
    Ok(Dataset::from_text_rows(
        schema,
        [
            ["1", "John Doe", "44"],
            ["2", "Jane Doe", "88"],
            ["3", "Dalton", "55"],
        ],
    )?)
}

pub fn update_dataset() -> Result<Dataset> {
    let schema = Schema::new(vec![
        ColumnMeta::new("id", ColumnType::Integer),
        ColumnMeta::new("name", ColumnType::String),
    ])?;
    Ok(Dataset::from_text_rows(
        schema,
        [
            ["1", "John Doe"],
            ["2", "Jane Doe"],
            ["4", "test"],
            ["5", "test1"],
        ],
    )?)
}

/// Persists both example tables, prints their discrepancies, harmonizes,
/// merges on `id,name` and overwrites the update table with the ordered
/// result.
pub fn run_demo(warehouse: &Warehouse) -> Result<Dataset> {
    let main = main_dataset()?;
    let update = update_dataset()?;
    let overwrite = WriteOptions {
        overwrite_schema: true,
        ..WriteOptions::overwrite()
    };
    warehouse.save_table(MAIN_TABLE, &main, &overwrite)?;
    warehouse.save_table(UPDATE_TABLE, &update, &overwrite)?;

    let discrepancies = compare_schemas(main.schema(), update.schema())
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    println!("discrepancies {discrepancies:?}");

    let (main, update) = harmonize_schemas(main, update)?;
    let mut merged = merge(&main, &update, &MERGE_KEYS)?;
    merged.sort_by(&["id"])?;

    warehouse.save_table(
        UPDATE_TABLE,
        &merged,
        &WriteOptions::overwrite().with_merge_schema(),
    )?;
    info!(
        "Wrote {} merged row(s) to '{UPDATE_TABLE}' in {:?}",
        merged.row_count(),
        warehouse.root()
    );
    Ok(merged)
}

pub fn execute(args: &DemoArgs) -> Result<()> {
    let warehouse = Warehouse::open(&args.warehouse.warehouse)?;
    run_demo(&warehouse)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn demo_overwrites_update_table_with_ordered_merge() {
        let dir = tempdir().unwrap();
        let warehouse = Warehouse::open(dir.path()).unwrap();
        let merged = run_demo(&warehouse).unwrap();
        assert_eq!(
            merged.text_rows(),
            vec![
                vec!["1", "John Doe", "44"],
                vec!["2", "Jane Doe", "88"],
                vec!["3", "Dalton", "55"],
                vec!["4", "test", ""],
                vec!["5", "test1", ""],
            ]
        );
        let stored = warehouse.load_table(UPDATE_TABLE).unwrap();
        assert_eq!(stored, merged);
        assert_eq!(warehouse.load_table(MAIN_TABLE).unwrap(), main_dataset().unwrap());
    }

    #[test]
    fn demo_can_run_twice() {
        let dir = tempdir().unwrap();
        let warehouse = Warehouse::open(dir.path()).unwrap();
        run_demo(&warehouse).unwrap();
        let second = run_demo(&warehouse).unwrap();
        assert_eq!(second.row_count(), 5);
    }
}
