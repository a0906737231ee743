mod change;
mod defer;
mod lock;
mod queue;
mod refresh;
mod resolve;
mod target;

use crate::config::{Consistency, DepMode, JoinConfig, TargetKind};
use crate::error::Result;
use crate::names::Structure;
use crate::statement::Statement;

/// Generate the full ordered statement stream for one join configuration.
///
/// Order is part of the contract: lock and queue DDL first, then the
/// deferred refresh/setup functions, then per-table change functions and
/// the triggers referencing them. Tables are processed in id order.
pub fn join_statements(config: &JoinConfig) -> Result<Vec<Statement>> {
    let structure = Structure::new(config.schema.as_deref(), &config.id);
    let mut statements = Vec::new();

    if needs_lock_table(config) {
        statements.extend(lock::create_lock_table(&structure, &config.target));
    }

    if config.consistency == Consistency::Deferred {
        statements.extend(defer::create_refresh_function(config, &structure)?);
        statements.extend(defer::create_setup_function(config, &structure));
    }

    for (table_id, table) in &config.tables {
        if table.dep_mode == DepMode::Async {
            statements.extend(queue::create_queue(config, &structure, table_id, table)?);
        }
    }

    for (table_id, table) in &config.tables {
        statements.extend(change::create_change(config, &structure, table_id, table)?);
        if table.refresh_function {
            statements.extend(refresh::create_refresh_table_function(
                config, &structure, table_id, table,
            )?);
        }
    }

    Ok(statements)
}

fn needs_lock_table(config: &JoinConfig) -> bool {
    config.query.is_some() && config.target.kind() == TargetKind::TableWithKey
}
