use sql_repository::prelude::*;
use sql_repository::proc::{render_call, render_exec_batch};

fn audit_params() -> ParamSet {
    let mut params = ParamSet::new();
    params.input("user_id", SqlValue::Int(7));
    params.input("reason", SqlValue::Text("cleanup".to_string()));
    params
        .bind("deleted", ParamSpec::output(SqlKind::BigInt))
        .unwrap();
    params
        .bind("status", ParamSpec::ret(SqlKind::Int))
        .unwrap();
    params
}

#[test]
fn exec_batch_declares_outputs_and_selects_them_back() {
    let command = render_exec_batch("audit.purge_user", &audit_params()).unwrap();

    assert_eq!(
        command.sql,
        "DECLARE @deleted BIGINT;\n\
         DECLARE @status INT;\n\
         EXEC @status = audit.purge_user @user_id = @P1, @reason = @P2, @deleted = @deleted OUTPUT;\n\
         SELECT @deleted AS [deleted], @status AS [status];"
    );
    assert!(command.has_outputs);
    assert_eq!(
        command.bind_values,
        vec![SqlValue::Int(7), SqlValue::Text("cleanup".to_string())]
    );
}

#[test]
fn exec_batch_without_outputs_is_a_plain_exec() {
    let mut params = ParamSet::new();
    params.input("user_id", SqlValue::Int(7));

    let command = render_exec_batch("purge_user", &params).unwrap();
    assert_eq!(command.sql, "EXEC purge_user @user_id = @P1;");
    assert!(!command.has_outputs);
}

#[test]
fn exec_batch_rejects_multiple_return_values() {
    let mut params = ParamSet::new();
    params.bind("a", ParamSpec::ret(SqlKind::Int)).unwrap();
    params.bind("b", ParamSpec::ret(SqlKind::Int)).unwrap();

    let err = render_exec_batch("p", &params).unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidSpec(_)));
}

#[test]
fn call_binds_outputs_as_null() {
    let mut params = ParamSet::new();
    params.input("user_id", SqlValue::Int(7));
    params
        .bind("deleted", ParamSpec::output(SqlKind::BigInt))
        .unwrap();

    let command = render_call("audit.purge_user", &params).unwrap();
    assert_eq!(command.sql, "CALL audit.purge_user($1, $2)");
    assert_eq!(command.bind_values, vec![SqlValue::Int(7), SqlValue::Null]);
    assert!(command.has_outputs);
}

#[test]
fn call_has_no_return_direction() {
    let mut params = ParamSet::new();
    params.bind("status", ParamSpec::ret(SqlKind::Int)).unwrap();

    let err = render_call("p", &params).unwrap_err();
    assert!(matches!(err, RepositoryError::Unimplemented(_)));
}

#[test]
fn identifiers_are_validated_before_rendering() {
    let params = ParamSet::new();

    for bad in ["p; DROP TABLE users", "1p", "a.b.c", "", "p--"] {
        let err = render_exec_batch(bad, &params).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidSpec(_)), "{bad}");
        let err = render_call(bad, &params).unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidSpec(_)), "{bad}");
    }

    let mut params = ParamSet::new();
    params.input("user id", SqlValue::Int(1));
    let err = render_exec_batch("p", &params).unwrap_err();
    assert!(matches!(err, RepositoryError::InvalidSpec(_)));
}
