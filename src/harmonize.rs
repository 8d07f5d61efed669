use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::HarmonizeArgs,
    dataset::Dataset,
    error,
    warehouse::{SaveMode, Warehouse, WriteOptions},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HarmonizeDirection {
    /// Widen only the second dataset with the first one's extra columns.
    #[default]
    FirstToSecond,
    /// Widen each dataset with the other's extra columns.
    Both,
}

/// Adds every column of `first` that `second` lacks to `second`, null filled
/// and typed as `first` declares it. `first` is returned unchanged.
pub fn harmonize_schemas(first: Dataset, second: Dataset) -> error::Result<(Dataset, Dataset)> {
    harmonize_with(first, second, HarmonizeDirection::FirstToSecond)
}

pub fn harmonize_with(
    first: Dataset,
    second: Dataset,
    direction: HarmonizeDirection,
) -> error::Result<(Dataset, Dataset)> {
    let original_first = first.schema().clone();
    let second = widen(second, &first)?;
    let first = match direction {
        HarmonizeDirection::FirstToSecond => first,
        HarmonizeDirection::Both => {
            // Only the columns `second` had before widening count here.
            let mut widened = first;
            let extras = second
                .schema()
                .columns
                .iter()
                .filter(|c| !original_first.has_column(&c.name))
                .cloned()
                .collect::<Vec<_>>();
            for column in extras {
                widened = widened.with_null_column(&column.name, column.datatype)?;
            }
            widened
        }
    };
    Ok((first, second))
}

/// Columns of `source` that `target` lacks, appended to `target` as nulls.
fn widen(mut target: Dataset, source: &Dataset) -> error::Result<Dataset> {
    for column in &source.schema().columns {
        if target.schema().has_column(&column.name) {
            continue;
        }
        target = target.with_null_column(&column.name, column.datatype.clone())?;
    }
    Ok(target)
}

pub fn execute(args: &HarmonizeArgs) -> Result<()> {
    let warehouse = Warehouse::open(&args.warehouse.warehouse)?;
    let first = warehouse
        .load_table(&args.first)
        .with_context(|| format!("Loading table '{}'", args.first))?;
    let second = warehouse
        .load_table(&args.second)
        .with_context(|| format!("Loading table '{}'", args.second))?;
    let first_width = first.schema().len();
    let second_width = second.schema().len();

    let direction = if args.symmetric {
        HarmonizeDirection::Both
    } else {
        HarmonizeDirection::FirstToSecond
    };
    let (first, second) = harmonize_with(first, second, direction)?;

    let options = WriteOptions {
        mode: SaveMode::Overwrite,
        merge_schema: true,
        overwrite_schema: false,
    };
    if second.schema().len() != second_width {
        warehouse.save_table(&args.second, &second, &options)?;
        info!(
            "Added {} column(s) to '{}'",
            second.schema().len() - second_width,
            args.second
        );
    }
    if first.schema().len() != first_width {
        warehouse.save_table(&args.first, &first, &options)?;
        info!(
            "Added {} column(s) to '{}'",
            first.schema().len() - first_width,
            args.first
        );
    }
    if first.schema().len() == first_width && second.schema().len() == second_width {
        info!("'{}' and '{}' already align", args.first, args.second);
    }
    Ok(())
}
