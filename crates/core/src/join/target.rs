use crate::config::{JoinConfig, SyncMode, TargetKind};
use crate::error::Result;
use crate::query::{insert_query, sync_query, upsert_query};
use crate::sql::{SqlId, SqlObject, SqlQuery};
use crate::template;

/// Render the statement that reconciles the target from `key_source`, the
/// relation holding the affected target keys. The three target shapes
/// differ only here.
pub(crate) fn refresh_query(
    config: &JoinConfig,
    key_source: &SqlObject,
    table_binding: Option<&str>,
) -> Result<SqlQuery> {
    let source = key_source.to_string();
    let formatted = match &config.query {
        Some(query) => {
            let mut bindings = vec![("key", source.as_str())];
            if let Some(table_id) = table_binding {
                bindings.push(("table", table_id));
            }
            template::substitute(query, &bindings)?
        }
        None => format!("TABLE {key_source}"),
    };

    match config.target.kind() {
        TargetKind::PlainQuery => Ok(SqlQuery::new(formatted)),
        TargetKind::TableKeyless => {
            let target = config.target.sql().expect("table target has a name");
            let columns = target_columns(config);
            Ok(insert_query(&columns, &formatted, &target))
        }
        TargetKind::TableWithKey => {
            let target = config.target.sql().expect("table target has a name");
            let columns = target_columns(config);
            let key = target_key(config);
            Ok(match config.sync {
                SyncMode::Full => sync_query(&columns, &key, key_source, &formatted, &target),
                SyncMode::Upsert => upsert_query(&columns, &key, &formatted, &target),
                SyncMode::Insert => insert_query(&columns, &formatted, &target),
            })
        }
    }
}

pub(crate) fn target_key(config: &JoinConfig) -> Vec<SqlId> {
    config
        .target
        .key
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(SqlId::new)
        .collect()
}

/// The full column list, defaulting to the key when none is configured.
pub(crate) fn target_columns(config: &JoinConfig) -> Vec<SqlId> {
    config
        .target
        .columns
        .as_deref()
        .or(config.target.key.as_deref())
        .unwrap_or_default()
        .iter()
        .map(SqlId::new)
        .collect()
}
