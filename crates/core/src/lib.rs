mod agg;
mod config;
mod error;
mod graph;
mod join;
mod key;
mod names;
mod query;
mod sql;
mod statement;
mod template;

pub use agg::agg_statements;
pub use config::{
    AggConfig, AggTable, Aggregate, ColumnSpec, Consistency, DepMode, Hook, Hooks, JoinConfig,
    JoinTable, JoinTarget, KeyColumn, KeyConfig, KeyTable, KeyTarget, SyncMode, TargetKind,
    load_agg, load_join, load_key,
};
pub use error::{ConfigError, Error, GenerateError, ParseError, Result, TemplateError};
pub use graph::{closure, resolve};
pub use join::join_statements;
pub use key::key_statements;
pub use names::{AggStructure, Structure};
pub use query::{insert_query, sync_query, upsert_query};
pub use sql::{
    SqlId, SqlNumber, SqlObject, SqlQuery, SqlString, SqlTableExpr, sql_list, table_fields,
    update_excluded,
};
pub use statement::{Statement, render_script};
pub use template::substitute;

/// Parse, validate, and render an aggregate configuration to script text.
pub fn create_agg(input: &str) -> Result<String> {
    let config = load_agg(input)?;
    Ok(render_script(&agg_statements(&config)?))
}

/// Parse, validate, and render a join configuration to script text.
pub fn create_join(input: &str) -> Result<String> {
    let config = load_join(input)?;
    Ok(render_script(&join_statements(&config)?))
}

/// Parse, validate, and render a key-propagation configuration to script
/// text.
pub fn create_key(input: &str) -> Result<String> {
    let config = load_key(input)?;
    Ok(render_script(&key_statements(&config)?))
}
