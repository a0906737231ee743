use std::collections::BTreeMap;

use crate::config::{AggConfig, Aggregate};
use crate::names::AggStructure;
use crate::sql::{SqlId, SqlString, indent, ordinal_list, sql_list};
use crate::statement::Statement;

/// Commit-time flush of the staged deltas into the target, fired once per
/// transaction by the deferred constraint trigger.
pub(crate) fn create_refresh_function(
    config: &AggConfig,
    structure: &AggStructure,
    aggregates: &BTreeMap<String, Aggregate>,
) -> Vec<Statement> {
    let refresh_function = structure.refresh_function();
    let refresh_table = structure.refresh_table();
    let staging_table = structure.staging_table();
    let group_columns = config.groups.keys().map(SqlId::new).collect::<Vec<_>>();
    let aggregate_columns = aggregates.keys().map(SqlId::new).collect::<Vec<_>>();
    let target = config.target.sql();

    let combine = sql_list(aggregates.iter().map(|(column, aggregate)| {
        format!(
            "{} = {}",
            SqlId::new(column),
            aggregate.combine_expression(column),
        )
    }));

    let body = format!(
        "DELETE FROM {refresh_table};\n\nWITH\n  _delete AS (\n    DELETE FROM {staging_table}\n    RETURNING *\n  )\nINSERT INTO {target} AS existing (\n  {},\n  {}\n)\nSELECT\n  {},\n  {}\nFROM _delete\nORDER BY {}\nON CONFLICT ({}) DO UPDATE\n  SET {combine};",
        sql_list(&group_columns),
        sql_list(&aggregate_columns),
        sql_list(&group_columns),
        sql_list(&aggregate_columns),
        ordinal_list(group_columns.len()),
        sql_list(&group_columns),
    );

    vec![
        Statement::new(format!(
            "CREATE FUNCTION {refresh_function} () RETURNS trigger\nLANGUAGE plpgsql AS $$\n  BEGIN\n{}\n\n    RETURN NULL;\n  END;\n$$",
            indent(&body, 2),
        )),
        Statement::new(format!(
            "COMMENT ON FUNCTION {refresh_function} IS {}",
            SqlString::new(format!("Refresh {}", config.id)),
        )),
    ]
}

/// Idempotent per-session bootstrap for the deferred path: the delta
/// staging table shaped like the target, the sentinel table, and the
/// deferred constraint trigger.
pub(crate) fn create_setup_function(
    config: &AggConfig,
    structure: &AggStructure,
    aggregates: &BTreeMap<String, Aggregate>,
) -> Vec<Statement> {
    let refresh_constraint = structure.refresh_constraint();
    let refresh_function = structure.refresh_function();
    let refresh_table = structure.refresh_table();
    let setup_function = structure.setup_function();
    let staging_table = structure.staging_table();
    let group_columns = config.groups.keys().map(SqlId::new).collect::<Vec<_>>();
    let aggregate_columns = aggregates.keys().map(SqlId::new).collect::<Vec<_>>();
    let target = config.target.sql();

    let body = format!(
        "IF to_regclass({}) IS NOT NULL THEN\n  RETURN;\nEND IF;\n\nCREATE TEMP TABLE {staging_table}\nON COMMIT DELETE ROWS\nAS SELECT\n  {},\n  {}\nFROM {target}\nWITH NO DATA;\n\nALTER TABLE {staging_table}\n  ADD PRIMARY KEY ({});\n\nCREATE TEMP TABLE {refresh_table} (\n) ON COMMIT DELETE ROWS;\n\nCREATE CONSTRAINT TRIGGER {refresh_constraint} AFTER INSERT ON {refresh_table}\nDEFERRABLE INITIALLY DEFERRED\nFOR EACH ROW EXECUTE PROCEDURE {refresh_function}();",
        SqlString::new(refresh_table.to_string()),
        sql_list(&group_columns),
        sql_list(&aggregate_columns),
        sql_list(&group_columns),
    );

    vec![
        Statement::new(format!(
            "CREATE FUNCTION {setup_function} () RETURNS void\nLANGUAGE plpgsql AS $$\n  BEGIN\n{}\n  END;\n$$",
            indent(&body, 2),
        )),
        Statement::new(format!(
            "COMMENT ON FUNCTION {setup_function} IS {}",
            SqlString::new(format!("Set up temp tables for {}", config.id)),
        )),
    ]
}
