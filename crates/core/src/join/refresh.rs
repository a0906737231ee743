use crate::config::{JoinConfig, JoinTable};
use crate::error::Result;
use crate::join::change;
use crate::join::resolve::KeyResolver;
use crate::names::Structure;
use crate::sql::{SqlId, SqlString, indent, sql_list};
use crate::statement::Statement;

fn param_name(name: &str) -> SqlId {
    SqlId::new(format!("_{name}"))
}

/// A manually-callable refresh function for one table: takes that table's
/// key values as typed parameters and runs the table's normal resolution
/// with them as the change set.
pub(crate) fn create_refresh_table_function(
    config: &JoinConfig,
    structure: &Structure,
    table_id: &str,
    table: &JoinTable,
) -> Result<Vec<Statement>> {
    let key = table.key.as_deref().unwrap_or_default();

    let params = sql_list(key.iter().map(|column| {
        format!(
            "{} {}",
            param_name(column.name()),
            column.sql_type().unwrap_or_default(),
        )
    }));
    let projection = sql_list(key.iter().map(|column| {
        format!(
            "{} AS {}",
            param_name(column.name()),
            SqlId::new(column.name()),
        )
    }));
    let root = format!("(SELECT {projection})");

    let resolver = KeyResolver::new(config, table_id)?;
    let body = change::change_body(config, structure, &resolver, table_id, &root)?;
    let function = structure.refresh_table_function(table_id);

    Ok(vec![
        Statement::new(format!(
            "CREATE FUNCTION {function} ({params}) RETURNS void\nLANGUAGE plpgsql AS $$\n  BEGIN\n{}\n  END;\n$$",
            indent(&body, 2),
        )),
        Statement::new(format!(
            "COMMENT ON FUNCTION {function} IS {}",
            SqlString::new(format!("Recalculate {table_id} rows for one key")),
        )),
    ])
}
