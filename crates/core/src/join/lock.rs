use crate::config::JoinTarget;
use crate::names::Structure;
use crate::sql::{SqlId, SqlString, sql_list};
use crate::statement::Statement;

/// The unlogged value-lock table: one row per target key, whose row lock
/// serializes concurrent reconciliation of that key.
pub(crate) fn create_lock_table(structure: &Structure, target: &JoinTarget) -> Vec<Statement> {
    let lock_table = structure.lock_table();
    let key = target
        .key
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(SqlId::new)
        .collect::<Vec<_>>();
    let target_sql = target.sql().expect("lock table requires a table target");

    vec![
        Statement::new(format!(
            "CREATE UNLOGGED TABLE {lock_table}\nAS SELECT {}\nFROM {target_sql}\nWITH NO DATA",
            sql_list(&key),
        )),
        Statement::new(format!(
            "ALTER TABLE {lock_table}\n  ADD PRIMARY KEY ({})",
            sql_list(&key),
        )),
        Statement::new(format!(
            "COMMENT ON TABLE {lock_table} IS {}",
            SqlString::new(format!(
                "Value lock on {} primary key",
                target.name.as_deref().unwrap_or_default(),
            )),
        )),
    ]
}
