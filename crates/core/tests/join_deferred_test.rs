use pgripple_core::create_join;

const DEFERRED: &str = r#"
id: app
consistency: deferred
tables:
  child:
    name: child
    targetKey: [child.id]
target:
  name: child_full
  key: [id]
  columns: [id, parent_name]
query: |-
  SELECT c.id, p.name
  FROM ${key} AS d
    JOIN child AS c ON d.id = c.id
    JOIN parent AS p ON c.parent_id = p.id
"#;

fn position(script: &str, needle: &str) -> usize {
    script
        .find(needle)
        .unwrap_or_else(|| panic!("script should contain `{needle}`"))
}

#[test]
fn refresh_and_setup_precede_change_functions() {
    let script = create_join(DEFERRED).unwrap();

    let refresh = position(&script, "CREATE FUNCTION app__refresh () RETURNS trigger");
    let setup = position(&script, "CREATE FUNCTION app__setup () RETURNS void");
    let change = position(&script, "CREATE FUNCTION app__chg1__child");
    assert!(refresh < setup);
    assert!(setup < change);
}

#[test]
fn change_functions_only_stage_keys_and_a_sentinel() {
    let script = create_join(DEFERRED).unwrap();
    let change_start = position(&script, "CREATE FUNCTION app__chg1__child");
    let change_end = position(&script, "CREATE FUNCTION app__chg2__child");
    let body = &script[change_start..change_end];

    assert!(body.contains("PERFORM app__setup();"));
    assert!(body.contains("INSERT INTO pg_temp.app__key (id)"));
    // Temporary staging: later occurrences of a key need no re-recording.
    assert!(body.contains("ON CONFLICT (id) DO NOTHING"));
    // The sentinel insert fires the constraint trigger once per transaction.
    assert!(body.contains("WHERE NOT EXISTS (TABLE pg_temp.app__refresh);"));
    // The actual reconciliation is absent from the change path.
    assert!(!body.contains("app__lock"));
    assert!(!body.contains("child_full"));
}

#[test]
fn refresh_function_drains_staged_keys_through_the_lock_table() {
    let script = create_join(DEFERRED).unwrap();
    let refresh_start = position(&script, "CREATE FUNCTION app__refresh () RETURNS trigger");
    let refresh_end = position(&script, "COMMENT ON FUNCTION app__refresh");
    let body = &script[refresh_start..refresh_end];

    assert!(body.contains("DELETE FROM pg_temp.app__refresh;"));
    assert!(body.contains("DELETE FROM pg_temp.app__key"));
    assert!(body.contains("INSERT INTO app__lock (id)"));
    assert!(body.contains("ORDER BY 1"));
    assert!(body.contains("FROM app__lock AS d"));
    assert!(body.contains("DELETE FROM app__lock;"));
}

#[test]
fn setup_function_is_idempotent_and_registers_the_constraint_trigger() {
    let script = create_join(DEFERRED).unwrap();

    assert!(script.contains("IF to_regclass('pg_temp.app__refresh') IS NOT NULL THEN"));
    assert!(script.contains("CREATE TEMP TABLE pg_temp.app__key"));
    assert!(script.contains(") ON COMMIT DELETE ROWS;"));
    assert!(script.contains("CREATE CONSTRAINT TRIGGER app AFTER INSERT ON pg_temp.app__refresh"));
    assert!(script.contains("DEFERRABLE INITIALLY DEFERRED"));
    assert!(script.contains("FOR EACH ROW EXECUTE PROCEDURE app__refresh();"));
}
