use crate::config::{Consistency, JoinConfig, JoinTable, TargetKind};
use crate::error::Result;
use crate::join::resolve::{KeyResolver, Terminal};
use crate::join::{queue, target};
use crate::names::Structure;
use crate::query::upsert_query;
use crate::sql::{SqlId, SqlObject, SqlString, SqlTableExpr, indent, sql_list};
use crate::statement::Statement;

/// The two change functions for one watched table (statement-level
/// INSERT/DELETE, and UPDATE via transition-table set difference), plus the
/// triggers wiring them up.
pub(crate) fn create_change(
    config: &JoinConfig,
    structure: &Structure,
    table_id: &str,
    table: &JoinTable,
) -> Result<Vec<Statement>> {
    let mut statements = Vec::new();
    let resolver = KeyResolver::new(config, table_id)?;

    let change_1_function = structure.change_1_function(table_id);
    let change_2_function = structure.change_2_function(table_id);

    for (function, root) in [
        (&change_1_function, change_1_root(table)),
        (&change_2_function, change_2_root(table)),
    ] {
        let body = change_body(config, structure, &resolver, table_id, &root)?;
        statements.push(Statement::new(trigger_function(function, &body)));
        statements.push(Statement::new(format!(
            "COMMENT ON FUNCTION {function} IS {}",
            SqlString::new(format!("Handle changes to {table_id} for {}", config.id)),
        )));
    }

    let table_sql = table.sql();
    statements.push(Statement::new(format!(
        "CREATE TRIGGER {} AFTER DELETE ON {table_sql}\nREFERENCING OLD TABLE AS _change\nFOR EACH STATEMENT EXECUTE PROCEDURE {change_1_function}()",
        structure.delete_trigger(table_id),
    )));
    statements.push(Statement::new(format!(
        "CREATE TRIGGER {} AFTER INSERT ON {table_sql}\nREFERENCING NEW TABLE AS _change\nFOR EACH STATEMENT EXECUTE PROCEDURE {change_1_function}()",
        structure.insert_trigger(table_id),
    )));
    statements.push(Statement::new(format!(
        "CREATE TRIGGER {} AFTER UPDATE ON {table_sql}\nREFERENCING OLD TABLE AS _old NEW TABLE AS _new\nFOR EACH STATEMENT EXECUTE PROCEDURE {change_2_function}()",
        structure.update_trigger(table_id),
    )));

    Ok(statements)
}

fn trigger_function(function: &SqlObject, body: &str) -> String {
    format!(
        "CREATE FUNCTION {function} () RETURNS trigger\nLANGUAGE plpgsql AS $$\n  BEGIN\n{}\n\n    RETURN NULL;\n  END;\n$$",
        indent(body, 2),
    )
}

/// The body shared by change functions and per-key refresh functions:
/// resolve keys from `root`, then act per the configured consistency and
/// terminal.
pub(crate) fn change_body(
    config: &JoinConfig,
    structure: &Structure,
    resolver: &KeyResolver<'_>,
    table_id: &str,
    root: &str,
) -> Result<String> {
    let key_query = resolver.key_query(root);

    // A queue boundary leaves the target untouched in this transaction:
    // no before-hook, no deferred staging.
    if let Terminal::Async {
        table_id: queue_id,
        table: queue_table,
    } = resolver.terminal()
    {
        return queue::enqueue_sql(config, structure, queue_id, queue_table, &key_query);
    }

    let mut parts: Vec<String> = Vec::new();
    if let Some(hook) = &config.hooks.before {
        parts.push(format!("PERFORM {}();", hook.sql()));
    }

    match config.consistency {
        Consistency::Deferred => {
            let key = target::target_key(config);
            let staged = upsert_query(&key, &key, &key_query, &structure.key_table());
            let refresh_table = structure.refresh_table();

            parts.push(format!("PERFORM {}();", structure.setup_function()));
            parts.push(format!("{staged};"));
            parts.push(format!(
                "INSERT INTO {refresh_table}\nSELECT\nWHERE NOT EXISTS (TABLE {refresh_table});",
            ));
        }
        Consistency::Immediate => match config.target.kind() {
            TargetKind::TableWithKey if config.query.is_some() => {
                let key = target::target_key(config);
                let lock_table = structure.lock_table();
                let lock = upsert_query(&key, &key, &key_query, &lock_table);
                let update = target::refresh_query(config, &lock_table, Some(table_id))?;

                parts.push(format!("-- lock keys\n{lock};"));
                parts.push(format!("-- update\n{update};"));
                parts.push(format!("-- clear locks\nDELETE FROM {lock_table};"));
            }
            TargetKind::TableWithKey => {
                // Key propagation only: a conflict-detecting no-op upsert
                // straight into the target.
                let key = target::target_key(config);
                let target_sql = config.target.sql().expect("table target has a name");
                let upsert = upsert_query(&key, &key, &key_query, &target_sql);
                parts.push(format!("{upsert};"));
            }
            TargetKind::PlainQuery | TargetKind::TableKeyless => {
                let mut update =
                    target::refresh_query(config, &SqlObject::bare("_key"), Some(table_id))?;
                update.prepend(SqlTableExpr::new(SqlId::new("_key"), key_query));
                parts.push(format!("{update};"));
            }
        },
    }

    Ok(parts.join("\n\n"))
}

/// Project a transition table through the watched-column list.
fn transition_query(table: &JoinTable, relation: &str) -> String {
    match &table.columns {
        None => format!("TABLE {relation}"),
        Some(columns) => {
            let values = sql_list(columns.iter().map(|column| {
                let name = SqlId::new(column.name());
                match column.value() {
                    None => name.to_string(),
                    Some(value) => format!("{value} AS {name}"),
                }
            }));
            format!("SELECT {values} FROM {relation}")
        }
    }
}

fn change_1_root(table: &JoinTable) -> String {
    format!("({})", transition_query(table, "_change"))
}

/// UPDATE changes reduce to the symmetric difference of the OLD and NEW
/// transition tables, so an update that leaves watched columns untouched
/// propagates nothing.
fn change_2_root(table: &JoinTable) -> String {
    let old = transition_query(table, "_old");
    let new = transition_query(table, "_new");
    format!("(\n  ({old} EXCEPT ALL {new})\n  UNION ALL\n  ({new} EXCEPT ALL {old})\n)")
}
