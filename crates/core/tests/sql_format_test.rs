use pgripple_core::{SqlId, SqlObject, SqlString, sql_list, table_fields, update_excluded};

#[test]
fn bare_identifiers_pass_through_unquoted() {
    assert_eq!(SqlId::new("foo").to_string(), "foo");
    assert_eq!(SqlId::new("_count").to_string(), "_count");
    assert_eq!(SqlId::new("a1$b").to_string(), "a1$b");
}

#[test]
fn non_bare_identifiers_are_quoted() {
    assert_eq!(SqlId::new("Foo Bar").to_string(), "\"Foo Bar\"");
    assert_eq!(SqlId::new("1abc").to_string(), "\"1abc\"");
    assert_eq!(SqlId::new("").to_string(), "\"\"");
}

#[test]
fn reserved_words_force_quoting() {
    // Matches the bare-identifier shape, still quoted.
    assert_eq!(SqlId::new("select").to_string(), "\"select\"");
    assert_eq!(SqlId::new("Table").to_string(), "\"Table\"");
    // Non-reserved keywords stay bare.
    assert_eq!(SqlId::new("update").to_string(), "update");
}

#[test]
fn internal_quotes_are_doubled() {
    assert_eq!(SqlId::new("we\"ird").to_string(), "\"we\"\"ird\"");
    assert_eq!(SqlString::new("it's").to_string(), "'it''s'");
}

#[test]
fn string_literals_leave_backslashes_alone() {
    assert_eq!(SqlString::new("a\\b").to_string(), "'a\\b'");
}

#[test]
fn object_names_qualify_with_schema() {
    assert_eq!(SqlObject::bare("t").to_string(), "t");
    assert_eq!(SqlObject::new(Some("s"), "t").to_string(), "s.t");
    assert_eq!(
        SqlObject::new(Some("public"), "Odd Name").to_string(),
        "public.\"Odd Name\"",
    );
}

#[test]
fn temporary_namespace_is_detected() {
    assert!(SqlObject::new(Some("pg_temp"), "t").is_temporary());
    assert!(!SqlObject::new(Some("public"), "t").is_temporary());
    assert!(!SqlObject::bare("t").is_temporary());
}

#[test]
fn composite_field_lists_render_per_alias() {
    let alias = SqlId::new("u");
    let columns = vec![SqlId::new("a"), SqlId::new("b")];
    assert_eq!(table_fields(&alias, &columns), "u.a, u.b");
    assert_eq!(
        update_excluded(&columns),
        "a = excluded.a, b = excluded.b",
    );
    assert_eq!(sql_list(&columns), "a, b");
}
