//! Unit tests for `AppError` display format and conversions.

use citadel::AppError;

#[test]
fn display_prefixes_each_variant() {
    let cases = [
        (AppError::Config("bad".into()), "config: bad"),
        (AppError::Db("locked".into()), "db: locked"),
        (AppError::Gateway("502".into()), "gateway: 502"),
        (AppError::Timeout("10s".into()), "timeout: 10s"),
        (AppError::NotFound("task t1".into()), "not found: task t1"),
        (AppError::Unauthorized("key".into()), "unauthorized: key"),
        (AppError::Validation("Missing taskId".into()), "validation: Missing taskId"),
        (AppError::Io("eof".into()), "io: eof"),
    ];
    for (err, expected) in cases {
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn toml_error_becomes_config_error() {
    let parse_err = toml::from_str::<toml::Value>("= broken").expect_err("invalid toml");
    let err = AppError::from(parse_err);
    assert!(matches!(err, AppError::Config(msg) if msg.starts_with("invalid config")));
}

#[test]
fn json_error_becomes_gateway_error() {
    let parse_err = serde_json::from_str::<serde_json::Value>("{oops").expect_err("invalid json");
    let err = AppError::from(parse_err);
    assert!(matches!(err, AppError::Gateway(msg) if msg.starts_with("malformed json")));
}

#[test]
fn sqlx_error_becomes_db_error() {
    let err = AppError::from(sqlx::Error::RowNotFound);
    assert!(matches!(err, AppError::Db(_)));
}

#[test]
fn io_error_becomes_io_error() {
    let err = AppError::from(std::io::Error::other("disk full"));
    assert_eq!(err.to_string(), "io: disk full");
}

#[test]
fn implements_std_error() {
    fn assert_error<E: std::error::Error>(_: &E) {}
    assert_error(&AppError::Timeout("x".into()));
}
