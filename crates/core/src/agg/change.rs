use std::collections::BTreeMap;

use crate::config::{AggConfig, Aggregate, Consistency};
use crate::names::AggStructure;
use crate::sql::{SqlId, SqlObject, SqlString, indent, ordinal_list, sql_list, table_fields};
use crate::statement::Statement;

/// The two change functions (statement-constant sign for INSERT/DELETE,
/// unioned ±1 rows for UPDATE) and their triggers.
pub(crate) fn create_change(
    config: &AggConfig,
    structure: &AggStructure,
    aggregates: &BTreeMap<String, Aggregate>,
) -> Vec<Statement> {
    let mut statements = Vec::new();
    for update in [false, true] {
        statements.extend(create_change_function(config, structure, aggregates, update));
    }
    statements
}

fn create_change_function(
    config: &AggConfig,
    structure: &AggStructure,
    aggregates: &BTreeMap<String, Aggregate>,
    update: bool,
) -> Vec<Statement> {
    let change_function = if update {
        structure.change_2_function()
    } else {
        structure.change_1_function()
    };
    let group_columns = config.groups.keys().map(SqlId::new).collect::<Vec<_>>();
    let aggregate_columns = aggregates.keys().map(SqlId::new).collect::<Vec<_>>();

    let deferred = config.consistency == Consistency::Deferred;
    let target_table = if deferred {
        structure.staging_table()
    } else {
        config.target.sql()
    };

    let data = if update {
        "(\n    SELECT -1 AS sign, *\n    FROM _change1\n    UNION ALL\n    SELECT 1, *\n    FROM _change2\n)"
            .to_string()
    } else {
        "_change".to_string()
    };
    let query = delta_query(config, aggregates, &data);

    let body = if config.shard.is_some() {
        sharded_body(aggregates, &group_columns, &aggregate_columns, &target_table, &query)
    } else {
        plain_body(
            aggregates,
            &group_columns,
            &aggregate_columns,
            &target_table,
            &query,
            deferred,
        )
    };

    let mut sections: Vec<String> = Vec::new();
    if deferred {
        sections.push(format!("PERFORM {}();", structure.setup_function()));
    }
    sections.push(body);
    if deferred {
        let refresh_table = structure.refresh_table();
        sections.push(format!(
            "IF found THEN\n  INSERT INTO {refresh_table}\n  SELECT\n  WHERE NOT EXISTS (TABLE {refresh_table});\nEND IF;",
        ));
    }

    let declare = if update {
        String::new()
    } else {
        "\n  DECLARE\n    sign smallint := TG_ARGV[0]::smallint;".to_string()
    };

    let mut statements = vec![
        Statement::new(format!(
            "CREATE FUNCTION {change_function} () RETURNS trigger\nLANGUAGE plpgsql AS $${declare}\n  BEGIN\n{}\n\n    RETURN NULL;\n  END;\n$$",
            indent(&sections.join("\n\n"), 2),
        )),
        Statement::new(format!(
            "COMMENT ON FUNCTION {change_function} IS {}",
            SqlString::new(format!("Handle changes for {}", config.id)),
        )),
    ];

    let source = config.source.sql();
    if update {
        statements.push(Statement::new(format!(
            "CREATE TRIGGER {} AFTER UPDATE ON {source}\nREFERENCING OLD TABLE AS _change1 NEW TABLE AS _change2\nFOR EACH STATEMENT EXECUTE PROCEDURE {change_function}()",
            structure.update_trigger(),
        )));
    } else {
        statements.push(Statement::new(format!(
            "CREATE TRIGGER {} AFTER DELETE ON {source}\nREFERENCING OLD TABLE AS _change\nFOR EACH STATEMENT EXECUTE PROCEDURE {change_function}('-1')",
            structure.delete_trigger(),
        )));
        statements.push(Statement::new(format!(
            "CREATE TRIGGER {} AFTER INSERT ON {source}\nREFERENCING NEW TABLE AS _change\nFOR EACH STATEMENT EXECUTE PROCEDURE {change_function}('1')",
            structure.insert_trigger(),
        )));
    }

    statements
}

/// The signed per-batch delta, grouped and filtered; groups whose every
/// aggregate delta is its identity value are skipped outright.
fn delta_query(
    config: &AggConfig,
    aggregates: &BTreeMap<String, Aggregate>,
    data: &str,
) -> String {
    let values = aggregates
        .values()
        .map(|aggregate| aggregate.value.as_str())
        .collect::<Vec<_>>();
    let identities = aggregates
        .values()
        .map(Aggregate::identity_value)
        .collect::<Vec<_>>();
    let filter = config
        .filter
        .as_deref()
        .map(|filter| format!("\nWHERE {filter}"))
        .unwrap_or_default();

    format!(
        "SELECT\n    {},\n    {}\nFROM {data} AS {}{filter}\nGROUP BY {}\nHAVING ({}) IS DISTINCT FROM ({})",
        sql_list(config.groups.values()),
        sql_list(&values),
        SqlId::new(&config.id),
        ordinal_list(config.groups.len()),
        sql_list(&values),
        sql_list(&identities),
    )
}

fn plain_body(
    aggregates: &BTreeMap<String, Aggregate>,
    group_columns: &[SqlId],
    aggregate_columns: &[SqlId],
    target_table: &SqlObject,
    query: &str,
    deferred: bool,
) -> String {
    // Temporary staging is transaction-local; permanent targets get the
    // deterministic lock order.
    let order = if deferred {
        String::new()
    } else {
        format!("\nORDER BY {}", ordinal_list(group_columns.len()))
    };

    format!(
        "INSERT INTO {target_table} AS existing (\n    {},\n    {}\n)\n{query}{order}\nON CONFLICT ({}) DO UPDATE\n    SET {};",
        sql_list(group_columns),
        sql_list(aggregate_columns),
        sql_list(group_columns),
        combine_set(aggregates),
    )
}

/// Contention-tolerant variant: claim any one physical shard row of the
/// group with `FOR UPDATE SKIP LOCKED`; when every shard is held by another
/// transaction, insert a fresh shard row instead of waiting.
fn sharded_body(
    aggregates: &BTreeMap<String, Aggregate>,
    group_columns: &[SqlId],
    aggregate_columns: &[SqlId],
    target_table: &SqlObject,
    query: &str,
) -> String {
    let d = SqlId::new("d");

    format!(
        "WITH\n  _data ({}, {}) AS (\n{}\n  ),\n  _locked AS (\n      SELECT t.ctid, d.*\n      FROM\n        _data AS d\n        LEFT JOIN LATERAL (\n            SELECT t.ctid\n            FROM {target_table} AS t\n            WHERE ({}) = ({})\n            FOR UPDATE\n            SKIP LOCKED\n            LIMIT 1\n        ) AS t ON true\n  ),\n  _update AS (\n      UPDATE {target_table} AS existing\n      SET {}\n      FROM _locked AS excluded\n      WHERE existing.ctid = excluded.ctid\n  )\nINSERT INTO {target_table} ({}, {})\nSELECT {}, {}\nFROM _locked\nWHERE ctid IS NULL;",
        sql_list(group_columns),
        sql_list(aggregate_columns),
        indent(query, 2),
        table_fields(&d, group_columns),
        sql_list(group_columns),
        combine_set(aggregates),
        sql_list(group_columns),
        sql_list(aggregate_columns),
        sql_list(group_columns),
        sql_list(aggregate_columns),
    )
}

fn combine_set(aggregates: &BTreeMap<String, Aggregate>) -> String {
    sql_list(aggregates.iter().map(|(column, aggregate)| {
        format!(
            "{} = {}",
            SqlId::new(column),
            aggregate.combine_expression(column),
        )
    }))
}
