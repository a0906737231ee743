use pgripple_core::{AggStructure, Structure};

#[test]
fn join_object_names_derive_from_id_and_role() {
    let structure = Structure::new(None, "app");

    assert_eq!(structure.change_1_function("child").to_string(), "app__chg1__child");
    assert_eq!(structure.change_2_function("child").to_string(), "app__chg2__child");
    assert_eq!(structure.insert_trigger("child").to_string(), "app__ins__child");
    assert_eq!(structure.delete_trigger("child").to_string(), "app__del__child");
    assert_eq!(structure.update_trigger("child").to_string(), "app__upd__child");
    assert_eq!(structure.lock_table().to_string(), "app__lock");
    assert_eq!(structure.key_table().to_string(), "pg_temp.app__key");
    assert_eq!(structure.refresh_table().to_string(), "pg_temp.app__refresh");
    assert_eq!(structure.refresh_function().to_string(), "app__refresh");
    assert_eq!(structure.setup_function().to_string(), "app__setup");
    assert_eq!(structure.refresh_constraint().to_string(), "app");
    assert_eq!(structure.queue_table("parent").to_string(), "app__que__parent");
    assert_eq!(structure.queue_begin_function("parent").to_string(), "app__pcs1__parent");
    assert_eq!(structure.queue_refresh_function("parent").to_string(), "app__pcs2__parent");
    assert_eq!(structure.queue_end_function("parent").to_string(), "app__pcs3__parent");
    assert_eq!(structure.queue_process_procedure("parent").to_string(), "app__pcs__parent");
    assert_eq!(structure.refresh_table_function("parent").to_string(), "app__rfs__parent");
}

#[test]
fn schema_qualifies_objects_but_not_trigger_names() {
    let structure = Structure::new(Some("sync"), "app");

    assert_eq!(structure.change_1_function("child").to_string(), "sync.app__chg1__child");
    assert_eq!(structure.lock_table().to_string(), "sync.app__lock");
    // Trigger names are always bare: they live under their table.
    assert_eq!(structure.delete_trigger("child").to_string(), "app__del__child");
    // Temporary staging always lives in the session namespace.
    assert_eq!(structure.key_table().to_string(), "pg_temp.app__key");
}

#[test]
fn aggregate_names_share_the_prefix_scheme() {
    let structure = AggStructure::new(None, "stat");

    assert_eq!(structure.change_1_function().to_string(), "stat__chg1");
    assert_eq!(structure.change_2_function().to_string(), "stat__chg2");
    assert_eq!(structure.cleanup_function().to_string(), "stat__cleanup");
    assert_eq!(structure.compress_function().to_string(), "stat__compress");
    assert_eq!(structure.staging_table().to_string(), "pg_temp.stat__tmp");
    assert_eq!(structure.refresh_constraint().to_string(), "stat");
}

#[test]
fn naming_is_a_pure_function_of_its_inputs() {
    let first = Structure::new(Some("s"), "app");
    let second = Structure::new(Some("s"), "app");

    assert_eq!(
        first.queue_table("parent").to_string(),
        second.queue_table("parent").to_string(),
    );
    assert_eq!(
        first.change_2_function("x").to_string(),
        second.change_2_function("x").to_string(),
    );
}
