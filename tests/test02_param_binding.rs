use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sql_repository::prelude::*;

#[derive(Debug, Serialize)]
struct NewUser {
    name: String,
    age: i64,
    joined: NaiveDate,
    active: bool,
}

fn sample_user() -> NewUser {
    NewUser {
        name: "alice".to_string(),
        age: 34,
        joined: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
        active: true,
    }
}

#[test]
fn object_fields_bind_in_declaration_order() -> Result<(), RepositoryError> {
    let set = ParamSet::from_object(&sample_user())?;

    let names: Vec<&str> = set.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["name", "age", "joined", "active"]);

    assert_eq!(set.get("name"), Some(&SqlValue::Text("alice".to_string())));
    assert_eq!(set.get("age"), Some(&SqlValue::Int(34)));
    // dates serialize as text and parse back on demand
    assert_eq!(
        set.require("joined")?.as_date(),
        NaiveDate::from_ymd_opt(2024, 3, 9)
    );
    assert_eq!(set.get("active"), Some(&SqlValue::Bool(true)));
    Ok(())
}

#[test]
fn non_map_objects_are_rejected() {
    let err = ParamSet::from_object(&"just a string").unwrap_err();
    assert!(matches!(err, RepositoryError::ParameterError(_)));
}

#[test]
fn length_bearing_kinds_need_a_length() {
    let mut set = ParamSet::new();

    let err = set
        .bind("name", ParamSpec::output(SqlKind::VarChar))
        .unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidSpec(_)));

    let err = set
        .bind("code", ParamSpec::output(SqlKind::AnsiChar).with_length(0))
        .unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidSpec(_)));

    set.bind("name", ParamSpec::output(SqlKind::VarChar).with_length(50))
        .unwrap();
    set.bind("count", ParamSpec::output(SqlKind::Int)).unwrap();
    assert_eq!(set.len(), 2);
}

#[test]
fn value_kind_mismatch_is_unsupported() {
    let mut set = ParamSet::new();

    let err = set
        .bind_with_value(
            "age",
            ParamSpec::input(SqlKind::Int),
            SqlValue::Text("not a number".to_string()),
        )
        .unwrap_err();
    assert!(matches!(err, RepositoryError::UnsupportedType(_)));

    // null always binds, whatever the declared kind
    set.bind_with_value("age", ParamSpec::input(SqlKind::Int), SqlValue::Null)
        .unwrap();
    set.bind_with_value("age", ParamSpec::input(SqlKind::Int), SqlValue::Int(34))
        .unwrap();
    assert_eq!(set.get("age"), Some(&SqlValue::Int(34)));
}

#[test]
fn spec_table_directs_object_fields() -> Result<(), RepositoryError> {
    let set = ParamSet::from_object_with_specs(
        &sample_user(),
        &[("name", ParamSpec::input(SqlKind::VarChar).with_length(100))],
    )?;

    let name = set.param("name").unwrap();
    assert_eq!(name.kind, Some(SqlKind::VarChar));
    assert_eq!(name.length, Some(100));

    let age = set.param("age").unwrap();
    assert_eq!(age.kind, None);
    assert_eq!(age.direction, ParamDirection::Input);
    Ok(())
}

#[test]
fn rebinding_keeps_position() {
    let mut set = ParamSet::new();
    set.input("a", SqlValue::Int(1));
    set.input("b", SqlValue::Int(2));
    set.input("a", SqlValue::Int(10));

    let names: Vec<&str> = set.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["a", "b"]);
    assert_eq!(set.get("a"), Some(&SqlValue::Int(10)));
    assert_eq!(set.input_values(), vec![SqlValue::Int(10), SqlValue::Int(2)]);
}

#[derive(Debug, Default, Deserialize, PartialEq)]
struct ProcResult {
    total: i64,
    label: String,
}

#[test]
fn extraction_matches_fields_to_output_slots() -> Result<(), RepositoryError> {
    let mut set = ParamSet::new();
    set.input("user_id", SqlValue::Int(7));
    set.bind("total", ParamSpec::output(SqlKind::BigInt))?;
    set.bind("label", ParamSpec::output(SqlKind::VarChar).with_length(20))?;

    // simulate post-execution population
    set.set_value("total", SqlValue::Int(99));
    set.set_value("LABEL", SqlValue::Text("gold".to_string()));

    let result: ProcResult = set.extract()?;
    assert_eq!(
        result,
        ProcResult {
            total: 99,
            label: "gold".to_string()
        }
    );
    Ok(())
}

#[test]
fn extraction_fails_on_unpopulated_fields() {
    let mut set = ParamSet::new();
    set.input("user_id", SqlValue::Int(7));
    set.bind("total", ParamSpec::output(SqlKind::BigInt)).unwrap();

    // "total" was never populated and "label" was never bound
    let err = set.extract::<ProcResult>().unwrap_err();
    assert!(matches!(err, RepositoryError::MissingParameter(_)));

    let err = set.require("missing").unwrap_err();
    assert!(matches!(err, RepositoryError::MissingParameter(_)));
}
