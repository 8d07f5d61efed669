use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::{ShowArgs, TablesArgs},
    table,
    warehouse::Warehouse,
};

pub fn execute(args: &ShowArgs) -> Result<()> {
    let warehouse = Warehouse::open(&args.warehouse.warehouse)?;
    if args.schema {
        let schema = warehouse.load_schema(&args.table)?;
        print!("{}", schema.to_yaml_string()?);
        return Ok(());
    }
    let dataset = warehouse
        .load_table(&args.table)
        .with_context(|| format!("Loading table '{}'", args.table))?;
    table::print_dataset(&dataset, Some(args.rows));
    info!(
        "Displayed {} of {} row(s) from '{}'",
        dataset.row_count().min(args.rows),
        dataset.row_count(),
        args.table
    );
    Ok(())
}

pub fn tables(args: &TablesArgs) -> Result<()> {
    let warehouse = Warehouse::open(&args.warehouse.warehouse)?;
    if let Some(name) = &args.drop {
        warehouse.drop_table(name)?;
        info!("Dropped table '{name}'");
        return Ok(());
    }
    for name in warehouse.list_tables()? {
        println!("{name}");
    }
    Ok(())
}
