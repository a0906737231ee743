use crate::config::{KeyConfig, KeyTable, key_chain_from};
use crate::error::Result;
use crate::names::Structure;
use crate::query::upsert_query;
use crate::sql::{SqlId, indent, table_fields};
use crate::statement::Statement;

/// Generate the key-propagation statement stream: per watched table, one
/// change function inserting resolved keys into the target with a
/// conflict-detecting no-op upsert, and four statement-level triggers (the
/// update pair fires once with the OLD and once with the NEW transition
/// table).
pub fn key_statements(config: &KeyConfig) -> Result<Vec<Statement>> {
    let structure = Structure::new(config.schema.as_deref(), &config.id);
    let by_id = config.table_by_id();
    let target = config.target.sql();
    let target_key = config.target.key.iter().map(SqlId::new).collect::<Vec<_>>();
    let mut statements = Vec::new();

    for table in &config.tables {
        let chain_ids = key_chain_from(config, &table.id)?;
        let chain = chain_ids
            .iter()
            .map(|id| by_id[id.as_str()])
            .collect::<Vec<_>>();
        let key_query = key_query(&chain, "_change");

        let change_function = structure.change_function(&table.id);
        let upsert = upsert_query(&target_key, &target_key, &key_query, &target);

        let mut parts = Vec::new();
        if let Some(hook) = &config.hooks.before {
            parts.push(format!("PERFORM {}();", hook.sql()));
        }
        parts.push(format!("{upsert};"));

        statements.push(Statement::new(format!(
            "CREATE FUNCTION {change_function} () RETURNS trigger\nLANGUAGE plpgsql AS $$\n  BEGIN\n{}\n\n    RETURN NULL;\n  END;\n$$",
            indent(&parts.join("\n\n"), 2),
        )));

        let table_sql = table.sql();
        statements.push(Statement::new(format!(
            "CREATE TRIGGER {} AFTER DELETE ON {table_sql}\nREFERENCING OLD TABLE AS _change\nFOR EACH STATEMENT EXECUTE PROCEDURE {change_function}()",
            structure.delete_trigger(&table.id),
        )));
        statements.push(Statement::new(format!(
            "CREATE TRIGGER {} AFTER INSERT ON {table_sql}\nREFERENCING NEW TABLE AS _change\nFOR EACH STATEMENT EXECUTE PROCEDURE {change_function}()",
            structure.insert_trigger(&table.id),
        )));
        statements.push(Statement::new(format!(
            "CREATE TRIGGER {} AFTER UPDATE ON {table_sql}\nREFERENCING OLD TABLE AS _change\nFOR EACH STATEMENT EXECUTE PROCEDURE {change_function}()",
            structure.update_old_trigger(&table.id),
        )));
        statements.push(Statement::new(format!(
            "CREATE TRIGGER {} AFTER UPDATE ON {table_sql}\nREFERENCING NEW TABLE AS _change\nFOR EACH STATEMENT EXECUTE PROCEDURE {change_function}()",
            structure.update_new_trigger(&table.id),
        )));
    }

    Ok(statements)
}

fn key_query(chain: &[&KeyTable], root: &str) -> String {
    let mut query = String::new();
    let last = chain.len() - 1;

    for (position, table) in chain.iter().rev().enumerate() {
        let relation = if position == last {
            root.to_string()
        } else {
            table.sql().to_string()
        };
        let alias = SqlId::new(&table.id);

        if let Some(key) = &table.key {
            let columns = key.iter().map(SqlId::new).collect::<Vec<_>>();
            query.push_str(&format!(
                "SELECT DISTINCT {}\nFROM\n  {relation} AS {alias}",
                table_fields(&alias, &columns),
            ));
        } else {
            query.push_str(&format!(
                "\n  JOIN {relation} AS {alias} ON {}",
                table.join.as_deref().unwrap_or_default(),
            ));
        }
    }

    query
}
