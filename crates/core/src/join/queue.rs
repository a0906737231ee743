use sha2::{Digest, Sha256};

use crate::config::{JoinConfig, JoinTable};
use crate::error::Result;
use crate::join::resolve::KeyResolver;
use crate::join::target;
use crate::names::Structure;
use crate::sql::{
    SqlId, SqlObject, SqlString, SqlTableExpr, indent, ordinal_list, sql_list, table_fields,
    update_excluded,
};
use crate::statement::Statement;

pub(crate) fn local_column(name: &str) -> SqlId {
    SqlId::new(format!("local_{name}"))
}

pub(crate) fn foreign_column(name: &str) -> SqlId {
    SqlId::new(format!("foreign_{name}"))
}

/// Advisory-lock partition base for one queue. The partition id is the
/// user's `lockId` override, or the first two bytes of
/// `sha256("{id}__{tableId}")` as a signed big-endian integer; it occupies
/// the high 16 bits so per-row `lock` values stay disjoint across queues.
fn lock_base(config: &JoinConfig, table_id: &str, table: &JoinTable) -> i64 {
    let lock_id = match table.lock_id {
        Some(lock_id) => lock_id,
        None => {
            let digest = Sha256::digest(format!("{}__{table_id}", config.id).as_bytes());
            i16::from_be_bytes([digest[0], digest[1]])
        }
    };
    i64::from(lock_id) << 48
}

fn notify_channel(queue_table: &SqlObject) -> SqlId {
    SqlId::new(queue_table.to_string())
}

fn item_fields<'a, I>(variable: &str, columns: I) -> String
where
    I: IntoIterator<Item = &'a SqlId>,
{
    sql_list(
        columns
            .into_iter()
            .map(|column| format!("({variable}).{column}")),
    )
}

/// The enqueue terminal of a change function: record the affected local
/// keys, resetting the iterator and requeueing on conflict, then wake any
/// idle pollers.
pub(crate) fn enqueue_sql(
    config: &JoinConfig,
    structure: &Structure,
    table_id: &str,
    table: &JoinTable,
    key_query: &str,
) -> Result<String> {
    let queue_table = structure.queue_table(table_id);
    let dep = table.dep.as_deref().expect("async table has a dependency");
    let foreign = config.table(dep, table_id)?;

    let local_columns = table
        .key_names()
        .iter()
        .map(|column| local_column(column))
        .collect::<Vec<_>>();
    let foreign_columns = foreign
        .key_names()
        .iter()
        .map(|column| foreign_column(column))
        .collect::<Vec<_>>();

    // Unlisted columns take their defaults in the excluded row: NULL
    // iterator (restart the scan), fresh seq (requeue at the back), zero
    // tries.
    Ok(format!(
        "INSERT INTO {queue_table} ({})\n{key_query}\nORDER BY {}\nON CONFLICT ({}) DO UPDATE\n  SET {},\n    seq = excluded.seq,\n    tries = excluded.tries;\n\nNOTIFY {};",
        sql_list(&local_columns),
        ordinal_list(local_columns.len()),
        sql_list(&local_columns),
        update_excluded(&foreign_columns),
        notify_channel(&queue_table),
    ))
}

/// The queue table, its claim/refresh/finish functions, and the driver
/// procedure for one asynchronous dependency edge.
pub(crate) fn create_queue(
    config: &JoinConfig,
    structure: &Structure,
    table_id: &str,
    table: &JoinTable,
) -> Result<Vec<Statement>> {
    let dep = table.dep.as_deref().expect("async table has a dependency");
    let foreign = config.table(dep, table_id)?;

    let queue_table = structure.queue_table(table_id);
    let channel = notify_channel(&queue_table);
    let base = lock_base(config, table_id, table);

    let local_names = table.key_names();
    let foreign_names = foreign.key_names();
    let local_columns = local_names
        .iter()
        .map(|column| local_column(column))
        .collect::<Vec<_>>();
    let foreign_columns = foreign_names
        .iter()
        .map(|column| foreign_column(column))
        .collect::<Vec<_>>();
    let q = SqlId::new("q");

    let mut statements = Vec::new();

    let local_select = sql_list(
        local_names
            .iter()
            .map(|column| format!("l.{} AS {}", SqlId::new(*column), local_column(column))),
    );
    let foreign_select = sql_list(
        foreign_names
            .iter()
            .map(|column| format!("f.{} AS {}", SqlId::new(*column), foreign_column(column))),
    );
    statements.push(Statement::new(format!(
        "CREATE TABLE {queue_table}\nAS SELECT\n  {local_select},\n  {foreign_select},\n  NULL::bigint AS seq,\n  NULL::bigint AS lock,\n  NULL::int AS tries\nFROM\n  {} AS l\n  CROSS JOIN {} AS f\nWITH NO DATA",
        table.sql(),
        foreign.sql(),
    )));

    statements.push(Statement::new(format!(
        "ALTER TABLE {queue_table}\n  ADD PRIMARY KEY ({}),\n  ALTER lock ADD GENERATED BY DEFAULT AS IDENTITY,\n  ALTER lock SET NOT NULL,\n  ALTER seq ADD GENERATED BY DEFAULT AS IDENTITY,\n  ALTER seq SET NOT NULL,\n  ALTER tries SET DEFAULT 0,\n  ALTER tries SET NOT NULL",
        sql_list(&local_columns),
    )));

    statements.push(Statement::new(format!(
        "COMMENT ON TABLE {queue_table} IS {}",
        SqlString::new(format!("Asynchronous processing of changes to {}", table.sql())),
    )));
    for (column, local) in local_names.iter().zip(&local_columns) {
        statements.push(Statement::new(format!(
            "COMMENT ON COLUMN {queue_table}.{local} IS {}",
            SqlString::new(format!("{} key: {}", table.sql(), SqlId::new(*column))),
        )));
    }
    for (column, foreign_name) in foreign_names.iter().zip(&foreign_columns) {
        statements.push(Statement::new(format!(
            "COMMENT ON COLUMN {queue_table}.{foreign_name} IS {}",
            SqlString::new(format!("{} iterator: {}", foreign.sql(), SqlId::new(*column))),
        )));
    }
    statements.push(Statement::new(format!(
        "COMMENT ON COLUMN {queue_table}.seq IS 'Order to process'",
    )));
    statements.push(Statement::new(format!(
        "COMMENT ON COLUMN {queue_table}.lock IS 'Lock ID'",
    )));
    statements.push(Statement::new(format!(
        "COMMENT ON COLUMN {queue_table}.tries IS 'Number of tries'",
    )));
    statements.push(Statement::new(format!(
        "CREATE INDEX ON {queue_table} (seq)",
    )));

    // Begin: claim the oldest unlocked item, skipping rows another worker
    // holds and rows past the caller's retry ceiling.
    let begin_function = structure.queue_begin_function(table_id);
    let begin_body = format!(
        "SELECT q.* INTO _item\nFROM {queue_table} AS q\nWHERE\n  (_max_tries IS NULL OR q.tries < _max_tries)\n  AND pg_try_advisory_lock({base} + q.lock)\nORDER BY q.seq\nLIMIT 1;\n\nIF _item IS NULL THEN\n  RETURN NULL;\nEND IF;\n\nUPDATE {queue_table} AS q\nSET tries = q.tries + 1\nWHERE ({}) = ({});\n\nRETURN _item;",
        table_fields(&q, &local_columns),
        item_fields("_item", &local_columns),
    );
    statements.push(Statement::new(format!(
        "CREATE FUNCTION {begin_function} (_max_tries int DEFAULT NULL) RETURNS {queue_table}\nLANGUAGE plpgsql AS $$\n  DECLARE\n    _item {queue_table};\n  BEGIN\n{}\n  END;\n$$",
        indent(&begin_body, 2),
    )));
    statements.push(Statement::new(format!(
        "COMMENT ON FUNCTION {begin_function} IS {}",
        SqlString::new(format!("Begin refresh for {queue_table}")),
    )));

    // Refresh: scan one foreign batch, reconcile the target through the
    // synchronous machinery, and advance the iterator, all in one
    // statement.
    let refresh_function = structure.queue_refresh_function(table_id);
    let gather_start = gather(config, table_id, table, dep, foreign, false)?;
    let gather_resume = gather(config, table_id, table, dep, foreign, true)?;
    let reset_foreign = foreign_columns
        .iter()
        .map(|column| format!("  _new_item.{column} := NULL;"))
        .collect::<Vec<_>>()
        .join("\n");
    let refresh_body = format!(
        "IF ({}) IS NULL THEN\n{};\nELSE\n{};\nEND IF;\n\nIF _new_item IS NULL THEN\n  _new_item := _item;\n{reset_foreign}\nEND IF;\n\nRETURN _new_item;",
        item_fields("_item", &foreign_columns),
        indent(&gather_start, 1),
        indent(&gather_resume, 1),
    );
    statements.push(Statement::new(format!(
        "CREATE FUNCTION {refresh_function} (_item {queue_table}, _max_records bigint) RETURNS {queue_table}\nLANGUAGE plpgsql AS $$\n  DECLARE\n    _new_item {queue_table};\n  BEGIN\n{}\n  END;\n$$",
        indent(&refresh_body, 2),
    )));
    statements.push(Statement::new(format!(
        "COMMENT ON FUNCTION {refresh_function} IS {}",
        SqlString::new(format!("Refresh for {queue_table}")),
    )));

    // End: drop the exhausted item or requeue it at the back with the
    // advanced iterator; either way release the claim and wake pollers.
    // The seq guard leaves a concurrently re-enqueued row in place.
    let end_function = structure.queue_end_function(table_id);
    let requeue_set = sql_list(
        foreign_columns
            .iter()
            .map(|column| format!("{column} = (_item).{column}")),
    );
    let end_body = format!(
        "IF ({}) IS NULL THEN\n  DELETE FROM {queue_table} AS q\n  WHERE\n    ({}, q.seq)\n      = ({}, (_item).seq);\nELSE\n  UPDATE {queue_table} AS q\n  SET {requeue_set},\n    seq = nextval(pg_get_serial_sequence({}, 'seq'))\n  WHERE\n    ({}, q.seq)\n      = ({}, (_item).seq);\nEND IF;\n\nPERFORM pg_advisory_unlock({base} + (_item).lock);\n\nNOTIFY {channel};",
        item_fields("_item", &foreign_columns),
        table_fields(&q, &local_columns),
        item_fields("_item", &local_columns),
        SqlString::new(queue_table.to_string()),
        table_fields(&q, &local_columns),
        item_fields("_item", &local_columns),
    );
    statements.push(Statement::new(format!(
        "CREATE FUNCTION {end_function} (_item {queue_table}) RETURNS void\nLANGUAGE plpgsql AS $$\n  BEGIN\n{}\n  END;\n$$",
        indent(&end_body, 2),
    )));
    statements.push(Statement::new(format!(
        "COMMENT ON FUNCTION {end_function} IS {}",
        SqlString::new(format!("End refresh for {queue_table}")),
    )));

    // Driver: each step commits on its own, so a crash mid-cycle cannot
    // pin the advisory lock or leave partial target state uncommitted.
    let process_procedure = structure.queue_process_procedure(table_id);
    let process_body = format!(
        "_item := {begin_function}(_max_tries);\n\nIF _item IS NULL THEN\n  RETURN;\nEND IF;\n\nCOMMIT;\n\n_item := {refresh_function}(_item, _max_records);\n\nCOMMIT;\n\nPERFORM {end_function}(_item);\n\nCOMMIT;\n\n_result := true;",
    );
    statements.push(Statement::new(format!(
        "CREATE PROCEDURE {process_procedure} (_max_records bigint, _max_tries int DEFAULT NULL, INOUT _result bool DEFAULT false)\nLANGUAGE plpgsql AS $$\n  DECLARE\n    _item {queue_table};\n  BEGIN\n{}\n  END;\n$$",
        indent(&process_body, 2),
    )));
    statements.push(Statement::new(format!(
        "COMMENT ON PROCEDURE {process_procedure} IS {}",
        SqlString::new(format!("Refresh for {queue_table}")),
    )));

    Ok(statements)
}

/// One batch cycle as a single statement: scan the foreign table (from the
/// start, or strictly past the iterator), resolve the batch through the
/// normal key-propagation path, reconcile the target in data-modifying
/// table expressions, and select the advanced iterator into `_new_item`.
/// A batch shorter than `_max_records` yields NULL iterator columns,
/// marking the item exhausted.
fn gather(
    config: &JoinConfig,
    table_id: &str,
    table: &JoinTable,
    dep_id: &str,
    foreign: &JoinTable,
    resume: bool,
) -> Result<String> {
    let dep_alias = SqlId::new(dep_id);
    let local_columns = table
        .key_names()
        .iter()
        .map(|column| local_column(column))
        .collect::<Vec<_>>();
    let foreign_keys = foreign
        .key_names()
        .into_iter()
        .map(SqlId::new)
        .collect::<Vec<_>>();
    let foreign_columns = foreign
        .key_names()
        .iter()
        .map(|column| foreign_column(column))
        .collect::<Vec<_>>();

    let mut scan = format!(
        "SELECT {}\nFROM\n  {} AS {dep_alias}\n  JOIN (VALUES ({})) AS {} ({}) ON {}",
        table_fields(&dep_alias, &foreign_keys),
        foreign.sql(),
        item_fields("_item", &local_columns),
        SqlId::new(table_id),
        sql_list(table.key_names().into_iter().map(SqlId::new)),
        table.dep_join.as_deref().unwrap_or_default(),
    );
    if resume {
        scan.push_str(&format!(
            "\nWHERE ({}) < ({})",
            item_fields("_item", &foreign_columns),
            table_fields(&dep_alias, &foreign_keys),
        ));
    }
    scan.push_str(&format!(
        "\nORDER BY {}\nLIMIT _max_records",
        ordinal_list(foreign_keys.len()),
    ));

    let resolver = KeyResolver::new(config, dep_id)?;
    let key_query = resolver.key_query("_foreign_key");

    let k = SqlId::new("k");
    let advance = format!(
        "SELECT\n  {},\n  {},\n  (_item).seq,\n  (_item).lock,\n  (_item).tries\nINTO _new_item\nFROM\n  _foreign_key AS k\n  CROSS JOIN _stats AS s\nORDER BY {} DESC\nLIMIT 1",
        item_fields("_item", &local_columns),
        sql_list(foreign_keys.iter().zip(&foreign_columns).map(
            |(source, column)| format!(
                "CASE WHEN s.n < _max_records THEN NULL ELSE k.{source} END AS {column}",
            )
        )),
        table_fields(&k, &foreign_keys),
    );

    let mut refresh = target::refresh_query(config, &SqlObject::bare("_key"), Some(table_id))?;
    refresh.prepend(SqlTableExpr::new(SqlId::new("_key"), key_query));
    refresh.prepend(SqlTableExpr::new(
        SqlId::new("_stats"),
        "SELECT count(*) AS n FROM _foreign_key",
    ));
    refresh.prepend(SqlTableExpr::new(SqlId::new("_foreign_key"), scan));
    refresh.wrap_body(SqlId::new("_sync"), advance);

    Ok(refresh.to_string())
}
