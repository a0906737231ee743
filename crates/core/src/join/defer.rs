use crate::config::JoinConfig;
use crate::error::Result;
use crate::join::target;
use crate::names::Structure;
use crate::sql::{SqlString, indent, ordinal_list, sql_list, update_excluded};
use crate::statement::Statement;

/// The commit-time reconciliation function, fired once per transaction by
/// the deferred constraint trigger: drain the staged key set into the lock
/// table in deterministic order, refresh the target, release the locks.
pub(crate) fn create_refresh_function(
    config: &JoinConfig,
    structure: &Structure,
) -> Result<Vec<Statement>> {
    let key = target::target_key(config);
    let key_table = structure.key_table();
    let lock_table = structure.lock_table();
    let refresh_function = structure.refresh_function();
    let refresh_table = structure.refresh_table();

    // The accumulated key set is table-agnostic, so the query's `${table}`
    // binding is unavailable in deferred mode.
    let update = target::refresh_query(config, &lock_table, None)?;

    let lock = format!(
        "-- lock keys\nWITH\n  _change AS (\n    DELETE FROM {key_table}\n    RETURNING *\n  )\nINSERT INTO {lock_table} ({})\nSELECT *\nFROM _change\nORDER BY {}\nON CONFLICT ({}) DO UPDATE\n  SET {}\n  WHERE false;",
        sql_list(&key),
        ordinal_list(key.len()),
        sql_list(&key),
        update_excluded(&key),
    );

    let body = format!(
        "DELETE FROM {refresh_table};\n\n{lock}\n\n-- update\n{update};\n\n-- clear locks\nDELETE FROM {lock_table};",
    );

    Ok(vec![
        Statement::new(format!(
            "CREATE FUNCTION {refresh_function} () RETURNS trigger\nLANGUAGE plpgsql AS $$\n  BEGIN\n{}\n\n    RETURN NULL;\n  END;\n$$",
            indent(&body, 2),
        )),
        Statement::new(format!(
            "COMMENT ON FUNCTION {refresh_function} IS {}",
            SqlString::new(format!("Refresh {}", config.id)),
        )),
    ])
}

/// Idempotent per-session bootstrap: create the temporary staging tables
/// and register the deferred constraint trigger exactly once.
pub(crate) fn create_setup_function(config: &JoinConfig, structure: &Structure) -> Vec<Statement> {
    let key = target::target_key(config);
    let key_table = structure.key_table();
    let refresh_constraint = structure.refresh_constraint();
    let refresh_function = structure.refresh_function();
    let refresh_table = structure.refresh_table();
    let setup_function = structure.setup_function();
    let target_sql = config.target.sql().expect("deferred mode has a table target");

    let body = format!(
        "IF to_regclass({}) IS NOT NULL THEN\n  RETURN;\nEND IF;\n\nCREATE TEMP TABLE {key_table}\nAS SELECT {}\nFROM {target_sql}\nWITH NO DATA;\n\nALTER TABLE {key_table}\n  ADD PRIMARY KEY ({});\n\nCREATE TEMP TABLE {refresh_table} (\n) ON COMMIT DELETE ROWS;\n\nCREATE CONSTRAINT TRIGGER {refresh_constraint} AFTER INSERT ON {refresh_table}\nDEFERRABLE INITIALLY DEFERRED\nFOR EACH ROW EXECUTE PROCEDURE {refresh_function}();",
        SqlString::new(refresh_table.to_string()),
        sql_list(&key),
        sql_list(&key),
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
