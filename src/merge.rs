//! Key-based upsert of an update dataset into a main dataset.
//!
//! The update side is aliased with a suffix, full-outer-joined to the main
//! side on the keys, and each main column is then reconciled: the update value
//! wins whenever the main value is null or differs from a non-null update
//! value. The result is projected back onto the main schema, so columns only
//! the update side has are dropped.

use anyhow::{Context, Result, anyhow};
use log::{debug, info};

use crate::{
    cli::MergeArgs,
    data::Value,
    dataset::{Dataset, Row},
    error::{self, Error},
    harmonize::harmonize_schemas,
    join::{RowOrigin, full_outer_join},
    table,
    warehouse::{Warehouse, WriteOptions},
};

pub const UPDATE_SUFFIX: &str = "_tmp";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Rows present only in the update dataset.
    pub inserted: usize,
    /// Matched rows where at least one value changed.
    pub updated: usize,
    /// Matched rows left as they were.
    pub unchanged: usize,
    /// Rows present only in the main dataset.
    pub preserved: usize,
}

pub fn merge<S: AsRef<str>>(main: &Dataset, update: &Dataset, keys: &[S]) -> error::Result<Dataset> {
    merge_with_summary(main, update, keys).map(|(merged, _)| merged)
}

pub fn merge_with_summary<S: AsRef<str>>(
    main: &Dataset,
    update: &Dataset,
    keys: &[S],
) -> error::Result<(Dataset, MergeSummary)> {
    if keys.is_empty() {
        return Err(Error::NoKeys);
    }
    for key in keys {
        main.column_index(key.as_ref())?;
        update.column_index(key.as_ref())?;
    }
    let update_indices = main
        .schema()
        .columns
        .iter()
        .map(|column| {
            update
                .schema()
                .column_index(&column.name)
                .ok_or_else(|| Error::MissingUpdateColumn(column.name.clone()))
        })
        .collect::<error::Result<Vec<_>>>()?;

    let suffix = pick_suffix(main, update);
    let renamed = update.clone().with_suffix(&suffix)?;
    let on = keys
        .iter()
        .map(|k| (k.as_ref().to_string(), format!("{}{suffix}", k.as_ref())))
        .collect::<Vec<_>>();
    let joined = full_outer_join(main, &renamed, &on)?;
    debug!(
        "Merge joined {} main and {} update row(s) into {}",
        main.row_count(),
        update.row_count(),
        joined.dataset.row_count()
    );

    let main_width = main.schema().len();
    let mut summary = MergeSummary::default();
    let mut rows: Vec<Row> = Vec::with_capacity(joined.dataset.row_count());
    for (joined_row, origin) in joined.dataset.rows().iter().zip(&joined.origins) {
        let (current, incoming) = joined_row.split_at(main_width);

        let mut row = Vec::with_capacity(main_width);
        let mut changed = false;
        for (idx, (column, update_idx)) in main
            .schema()
            .columns
            .iter()
            .zip(&update_indices)
            .enumerate()
        {
            let current_value = current[idx].as_ref();
            let incoming_value = incoming[*update_idx]
                .as_ref()
                .map(|value| {
                    value.cast(&column.datatype).map_err(|err| Error::Cast {
                        column: column.name.clone(),
                        reason: err.to_string(),
                    })
                })
                .transpose()?;
            let reconciled = reconcile(current_value, incoming_value);
            changed |= reconciled.as_ref() != current_value;
            row.push(reconciled);
        }

        match origin {
            RowOrigin::LeftOnly => summary.preserved += 1,
            RowOrigin::RightOnly => summary.inserted += 1,
            RowOrigin::Matched if changed => summary.updated += 1,
            RowOrigin::Matched => summary.unchanged += 1,
        }
        rows.push(row);
    }

    let merged = Dataset::new(main.schema().clone(), rows)?;
    Ok((merged, summary))
}

/// Update wins when the main value is null or differs from a non-null update.
fn reconcile(current: Option<&Value>, incoming: Option<Value>) -> Option<Value> {
    match (current, incoming) {
        (None, incoming) => incoming,
        (Some(current), Some(incoming)) if *current != incoming => Some(incoming),
        (Some(current), _) => Some(current.clone()),
    }
}

/// `_tmp`, or `_tmp1`, `_tmp2`, ... when an aliased update column would
/// collide with a main column.
fn pick_suffix(main: &Dataset, update: &Dataset) -> String {
    let collides = |suffix: &str| {
        update
            .schema()
            .columns
            .iter()
            .any(|c| main.schema().has_column(&format!("{}{suffix}", c.name)))
    };
    let mut suffix = UPDATE_SUFFIX.to_string();
    let mut counter = 1usize;
    while collides(&suffix) {
        suffix = format!("{UPDATE_SUFFIX}{counter}");
        counter += 1;
    }
    suffix
}

pub fn execute(args: &MergeArgs) -> Result<()> {
    let keys = args
        .keys
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    if keys.is_empty() {
        return Err(anyhow!("Merge requires at least one --key column"));
    }

    let warehouse = Warehouse::open(&args.warehouse.warehouse)?;
    let main = warehouse
        .load_table(&args.main)
        .with_context(|| format!("Loading main table '{}'", args.main))?;
    let mut update = warehouse
        .load_table(&args.update)
        .with_context(|| format!("Loading update table '{}'", args.update))?;
    let main = if args.harmonize {
        let (main, widened) = harmonize_schemas(main, update)?;
        update = widened;
        main
    } else {
        main
    };

    let (mut merged, summary) = merge_with_summary(&main, &update, keys.as_slice())
        .with_context(|| format!("Merging '{}' into '{}'", args.update, args.main))?;
    if !args.order_by.is_empty() {
        merged.sort_by(args.order_by.as_slice())?;
    }

    let target = args.output.as_deref().unwrap_or(&args.main);
    let options = WriteOptions {
        mode: args.mode,
        merge_schema: args.merge_schema,
        overwrite_schema: args.overwrite_schema,
    };
    warehouse.save_table(target, &merged, &options)?;
    info!(
        "Merge complete: {} inserted, {} updated, {} unchanged, {} preserved; wrote {} row(s) to '{}'",
        summary.inserted,
        summary.updated,
        summary.unchanged,
        summary.preserved,
        merged.row_count(),
        target
    );
    if args.preview {
        table::print_dataset(&merged, None);
    }
    Ok(())
}
