use std::fmt::Write as _;

use crate::sql::{
    SqlId, SqlNumber, SqlObject, SqlQuery, SqlTableExpr, sql_list, table_fields, update_excluded,
};

/// Plain `INSERT INTO target (columns) <query>`, no conflict handling.
pub fn insert_query(columns: &[SqlId], query: &str, target: &SqlObject) -> SqlQuery {
    SqlQuery::new(format!(
        "INSERT INTO {target} ({})\n{query}",
        sql_list(columns),
    ))
}

/// Insert-or-update keyed on `key`.
///
/// For permanent targets the source query gains a deterministic `ORDER BY`
/// over the key's ordinal positions so concurrent statements acquire row
/// locks in one order. With no non-key columns the update degrades to
/// `SET key = excluded.key WHERE false` (locks the conflicting row without
/// rewriting it) for permanent targets and `DO NOTHING` for temporary
/// staging tables.
pub fn upsert_query(columns: &[SqlId], key: &[SqlId], query: &str, target: &SqlObject) -> SqlQuery {
    SqlQuery::new(upsert_body(columns, key, query, target, false))
}

/// Upsert plus orphan deletion as one statement group: the upsert's
/// `RETURNING key` set is captured in an `_upsert` table expression, and
/// every target row whose key appears in `key_table` but not in that set is
/// deleted. The delete sees a transactionally consistent view of the upsert
/// outcome.
pub fn sync_query(
    columns: &[SqlId],
    key: &[SqlId],
    key_table: &SqlObject,
    query: &str,
    target: &SqlObject,
) -> SqlQuery {
    let upsert = SqlTableExpr::new(
        SqlId::new("_upsert"),
        upsert_body(columns, key, query, target, true),
    );

    let t = SqlId::new("t");
    let k = SqlId::new("k");
    let u = SqlId::new("u");
    let mut delete = format!("DELETE FROM {target} AS t\nUSING {key_table} AS k\n");
    writeln!(
        delete,
        "  LEFT JOIN _upsert AS u ON ({}) = ({})",
        table_fields(&k, key),
        table_fields(&u, key),
    )
    .expect("write to String");
    write!(
        delete,
        "WHERE\n  ({}) = ({})\n  AND u.* IS NOT DISTINCT FROM NULL",
        table_fields(&t, key),
        table_fields(&k, key),
    )
    .expect("write to String");

    SqlQuery::with_exprs(delete, vec![upsert])
}

fn upsert_body(
    columns: &[SqlId],
    key: &[SqlId],
    query: &str,
    target: &SqlObject,
    returning: bool,
) -> String {
    let data_columns = columns
        .iter()
        .filter(|column| !key.contains(*column))
        .collect::<Vec<_>>();

    let mut source = query.to_string();
    if !target.is_temporary() {
        write!(source, "\nORDER BY {}", key_ordinals(columns, key)).expect("write to String");
    }

    let mut body = format!("INSERT INTO {target} ({})\n{source}\n", sql_list(columns));
    if data_columns.is_empty() {
        if target.is_temporary() {
            write!(body, "ON CONFLICT ({}) DO NOTHING", sql_list(key)).expect("write to String");
        } else {
            write!(
                body,
                "ON CONFLICT ({}) DO UPDATE\n  SET {}\n  WHERE false",
                sql_list(key),
                update_excluded(key),
            )
            .expect("write to String");
        }
    } else {
        write!(
            body,
            "ON CONFLICT ({}) DO UPDATE\n  SET {}",
            sql_list(key),
            update_excluded(data_columns),
        )
        .expect("write to String");
    }

    if returning {
        write!(body, "\nRETURNING {}", sql_list(key)).expect("write to String");
    }

    body
}

/// Ordinal positions of the key columns within the insert column list.
fn key_ordinals(columns: &[SqlId], key: &[SqlId]) -> String {
    sql_list(
        columns
            .iter()
            .enumerate()
            .filter(|(_, column)| key.contains(*column))
            .map(|(index, _)| SqlNumber(index as i64 + 1)),
    )
}
