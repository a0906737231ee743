use std::collections::BTreeMap;

use crate::config::{AggConfig, Aggregate};
use crate::names::AggStructure;
use crate::sql::{SqlId, SqlString, indent, ordinal_list, sql_list, table_fields};
use crate::statement::Statement;

/// Post-update trigger removing groups whose signed row count reached
/// zero. Only generated for unsharded targets; sharded configurations use
/// [`create_compress`] instead.
pub(crate) fn create_cleanup(config: &AggConfig, structure: &AggStructure) -> Vec<Statement> {
    let cleanup_function = structure.cleanup_function();
    let cleanup_trigger = structure.cleanup_trigger();
    let group_columns = config.groups.keys().map(SqlId::new).collect::<Vec<_>>();
    let target = config.target.sql();
    let t = SqlId::new("t");
    let n = SqlId::new("n");

    let body = format!(
        "DELETE FROM {target} AS t\nUSING _new AS n\nWHERE\n  ({}) = ({})\n  AND n._count = 0;",
        table_fields(&t, &group_columns),
        table_fields(&n, &group_columns),
    );

    vec![
        Statement::new(format!(
            "CREATE FUNCTION {cleanup_function} () RETURNS trigger\nLANGUAGE plpgsql AS $$\n  BEGIN\n{}\n\n    RETURN NULL;\n  END;\n$$",
            indent(&body, 2),
        )),
        Statement::new(format!(
            "COMMENT ON FUNCTION {cleanup_function} IS {}",
            SqlString::new(format!("Cleanup records for {}", config.id)),
        )),
        Statement::new(format!(
            "CREATE TRIGGER {cleanup_trigger} AFTER UPDATE ON {target}\nREFERENCING NEW TABLE AS _new\nFOR EACH STATEMENT EXECUTE PROCEDURE {cleanup_function}()",
        )),
        Statement::new(format!(
            "COMMENT ON TRIGGER {cleanup_trigger} ON {target} IS {}",
            SqlString::new(format!("Cleanup records for {}", config.id)),
        )),
    ]
}

/// Re-aggregate the physical shard rows of each logical group back down to
/// one row, dropping groups that compress to their identity values. Called
/// whenever convenient by the operator, not by generated triggers.
pub(crate) fn create_compress(
    config: &AggConfig,
    structure: &AggStructure,
    aggregates: &BTreeMap<String, Aggregate>,
    shard: &BTreeMap<String, String>,
) -> Vec<Statement> {
    let compress_function = structure.compress_function();
    let group_columns = config.groups.keys().map(SqlId::new).collect::<Vec<_>>();
    let aggregate_columns = aggregates.keys().map(SqlId::new).collect::<Vec<_>>();
    let target = config.target.sql();

    let combines = aggregates
        .keys()
        .map(|column| shard_expression(column, shard))
        .collect::<Vec<_>>();
    let identities = aggregates
        .values()
        .map(Aggregate::identity_value)
        .collect::<Vec<_>>();

    let body = format!(
        "WITH\n  _data AS (\n    DELETE FROM {target}\n    RETURNING *\n  )\nINSERT INTO {target} ({}, {})\nSELECT\n    {},\n    {}\nFROM _data\nGROUP BY {}\nHAVING\n  ({})\n  IS DISTINCT FROM ({});",
        sql_list(&group_columns),
        sql_list(&aggregate_columns),
        sql_list(&group_columns),
        sql_list(&combines),
        ordinal_list(group_columns.len()),
        sql_list(&combines),
        sql_list(&identities),
    );

    vec![
        Statement::new(format!(
            "CREATE FUNCTION {compress_function} () RETURNS void\nLANGUAGE plpgsql AS $$\n  BEGIN\n{}\n  END;\n$$",
            indent(&body, 2),
        )),
        Statement::new(format!(
            "COMMENT ON FUNCTION {compress_function} IS {}",
            SqlString::new(format!("Compress aggregate for {}", config.id)),
        )),
    ]
}

fn shard_expression(column: &str, shard: &BTreeMap<String, String>) -> String {
    match shard.get(column) {
        Some(expression) => expression.clone(),
        // The implicit signed row count always re-aggregates additively.
        None => format!("sum({})", SqlId::new(column)),
    }
}
