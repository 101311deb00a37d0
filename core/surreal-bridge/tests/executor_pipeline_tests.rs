// 쿼리 실행 파이프라인 통합 테스트
//
// MemoryDriver 위에서 읽기 / 쓰기 경로 전체를 검증

use serde_json::{Value, json};
use std::sync::Arc;
use surreal_bridge::driver::StatementResult;
use surreal_bridge::driver::memory::MemoryDriver;
use surreal_bridge::value::StoreValue;
use surreal_bridge::{
    ArrayDecoding, BridgeError, BridgeResult, ConnectionConfig, ExecutorOptions, QueryExecutor,
    RAW_LIST_KEY, RequestMethod, SessionRegistry,
};

const URI: &str = "ws://localhost:8000/rpc";

fn setup() -> (MemoryDriver, QueryExecutor<MemoryDriver>) {
    setup_with(ExecutorOptions::default())
}

fn setup_with(options: ExecutorOptions) -> (MemoryDriver, QueryExecutor<MemoryDriver>) {
    let driver = MemoryDriver::new();
    let registry = Arc::new(SessionRegistry::new(driver.clone()));
    (driver, QueryExecutor::with_options(registry, options))
}

fn config() -> ConnectionConfig {
    ConnectionConfig::new(URI, "root", "root").with_table("person")
}

fn person(name: &str, age: i64) -> StoreValue {
    StoreValue::object([
        ("id", StoreValue::thing("person", name)),
        ("name", StoreValue::from(name)),
        ("age", StoreValue::Int(age)),
    ])
}

#[test]
fn test_zero_rows_gives_empty_primary() -> BridgeResult<()> {
    let (driver, executor) = setup();
    driver.respond("SELECT * FROM person WHERE age > 200", vec![]);

    let record = executor.exec_query(&config(), "SELECT * FROM person WHERE age > 200")?;
    assert!(record.is_empty());
    assert!(!record.contains_key(RAW_LIST_KEY));
    Ok(())
}

#[test]
fn test_three_rows_primary_and_raw_list() -> BridgeResult<()> {
    let (driver, executor) = setup();
    driver.respond(
        "SELECT * FROM person",
        vec![person("ann", 30), person("bob", 41), person("cy", 25)],
    );

    let record = executor.exec_query(&config(), "SELECT * FROM person")?;
    assert_eq!(record["name"], json!("ann"));
    assert_eq!(record["id"], json!("person:ann"));

    let raw = record[RAW_LIST_KEY].as_array().expect("raw list");
    assert_eq!(raw.len(), 3);
    let names: Vec<&Value> = raw.iter().map(|row| &row["name"]).collect();
    assert_eq!(names, vec![&json!("ann"), &json!("bob"), &json!("cy")]);
    Ok(())
}

#[test]
fn test_single_row_has_no_raw_list() -> BridgeResult<()> {
    let (driver, executor) = setup();
    driver.respond("SELECT * FROM person:ann", vec![person("ann", 30)]);

    let record = executor.exec_query(&config(), "SELECT * FROM person:ann")?;
    assert_eq!(record["age"], json!(30));
    assert!(!record.contains_key(RAW_LIST_KEY));
    Ok(())
}

#[test]
fn test_only_first_statement_is_read() -> BridgeResult<()> {
    let (driver, executor) = setup();
    driver.respond_with(
        "SELECT * FROM a; SELECT * FROM b",
        vec![
            StatementResult::ok(StoreValue::Array(vec![person("ann", 1)])),
            StatementResult::ok(StoreValue::Array(vec![person("bob", 2), person("cy", 3)])),
        ],
    );

    let batch = executor.run_query(None, &config(), "SELECT * FROM a; SELECT * FROM b")?;
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.records()[0]["name"], json!("ann"));
    Ok(())
}

#[test]
fn test_field_order_preserved() -> BridgeResult<()> {
    let (driver, executor) = setup();
    driver.respond(
        "SELECT * FROM t",
        vec![StoreValue::object([
            ("zeta", StoreValue::Int(1)),
            ("alpha", StoreValue::Int(2)),
            ("mid", StoreValue::Null),
        ])],
    );

    let record = executor.exec_query(&config(), "SELECT * FROM t")?;
    let keys: Vec<&str> = record.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    assert_eq!(record["mid"], Value::Null);
    Ok(())
}

#[test]
fn test_query_error_keeps_session() {
    let (driver, executor) = setup();
    driver.respond_with("SELEC * FROM person", vec![StatementResult::err("Parse error")]);

    let err = executor.exec_query(&config(), "SELEC * FROM person").unwrap_err();
    assert!(matches!(err, BridgeError::Query { .. }));
    assert!(executor.registry().peek(&config()).is_some());

    // 같은 세션으로 다음 쿼리 계속 가능
    assert!(executor.exec_query(&config(), "SELECT * FROM person").is_ok());
    assert_eq!(driver.connect_count(), 1);
}

#[test]
fn test_transport_error_keeps_session() {
    let (driver, executor) = setup();
    driver.fail_transport("SELECT * FROM flaky");

    let err = executor.exec_query(&config(), "SELECT * FROM flaky").unwrap_err();
    assert!(matches!(err, BridgeError::Protocol(_)));
    assert_eq!(executor.registry().len(), 1);
}

#[test]
fn test_auth_failure_is_fatal() {
    let (driver, executor) = setup();
    driver.add_user("root", "secret");

    let err = executor.exec_query(&config(), "SELECT 1").unwrap_err();
    assert!(matches!(err, BridgeError::Auth { .. }));
    assert!(executor.registry().is_empty());
}

#[test]
fn test_create_outcome_counts_rows() -> BridgeResult<()> {
    let (_, executor) = setup();
    let cfg = config()
        .with_method(RequestMethod::Post)
        .with_values(vec![vec![json!("ann"), json!(30)], vec![json!("bob"), json!(41)]]);

    let outcome = executor.execute_update(None, &cfg, "INSERT INTO person [...]")?;
    assert_eq!(outcome.count(), 2);
    assert_eq!(outcome.record()["ok"], json!(true));
    assert_eq!(outcome.record()["code"], json!(200));
    Ok(())
}

#[test]
fn test_update_by_id_outcome() -> BridgeResult<()> {
    let (driver, executor) = setup();
    driver.respond("UPDATE person:ann SET age = 31", vec![person("ann", 31)]);
    let cfg = config().with_method(RequestMethod::Put).with_id(json!("person:ann"));

    let record = executor.execute(&cfg, "UPDATE person:ann SET age = 31")?;
    assert_eq!(record["count"], json!(1));
    assert_eq!(record["id"], json!("person:ann"));
    // 쓰기 결과에는 반환 행이 포함되지 않는다
    assert!(!record.contains_key("name"));
    Ok(())
}

#[test]
fn test_delete_by_id_list_count() -> BridgeResult<()> {
    let (_, executor) = setup();
    let ids = vec![json!(1), json!(2), json!(3), json!(4)];
    let cfg = config().with_method(RequestMethod::Delete).with_id_in(ids);

    assert_eq!(executor.exec_update(&cfg, "DELETE person WHERE id IN [1,2,3,4]")?, 4);
    Ok(())
}

#[test]
fn test_store_scalars_parsed_by_default() -> BridgeResult<()> {
    let (driver, executor) = setup();
    driver.respond(
        "SELECT * FROM item",
        vec![StoreValue::object([
            ("price", StoreValue::Decimal("12.50".into())),
            ("n", StoreValue::Decimal("7".into())),
            ("at", StoreValue::Datetime("2024-05-01T10:00:00Z".into())),
        ])],
    );

    let record = executor.exec_query(&config(), "SELECT * FROM item")?;
    assert_eq!(record["price"], json!(12.5));
    assert_eq!(record["n"], json!(7));
    assert_eq!(record["at"], json!("2024-05-01T10:00:00Z"));
    Ok(())
}

#[test]
fn test_unknown_types_option_parses_strings() -> BridgeResult<()> {
    let row = StoreValue::object([("qty", StoreValue::from("3")), ("sku", StoreValue::from("A-1"))]);

    let (driver, strict) = setup();
    driver.respond("SELECT * FROM item", vec![row.clone()]);
    let record = strict.exec_query(&config(), "SELECT * FROM item")?;
    assert_eq!(record["qty"], json!("3"));

    let (driver, lenient) = setup_with(ExecutorOptions {
        decode_unknown_types: true,
        ..ExecutorOptions::default()
    });
    driver.respond("SELECT * FROM item", vec![row]);
    let record = lenient.exec_query(&config(), "SELECT * FROM item")?;
    assert_eq!(record["qty"], json!(3));
    assert_eq!(record["sku"], json!("A-1"));
    Ok(())
}

#[test]
fn test_array_decoding_modes() -> BridgeResult<()> {
    let row = StoreValue::object([(
        "tags",
        StoreValue::Array(vec![StoreValue::from("a"), StoreValue::Array(vec![StoreValue::Int(1)])]),
    )]);

    let (driver, recursive) = setup();
    driver.respond("SELECT tags FROM t", vec![row.clone()]);
    let record = recursive.exec_query(&config(), "SELECT tags FROM t")?;
    assert_eq!(record["tags"], json!(["a", [1]]));

    let (driver, discard) = setup_with(ExecutorOptions {
        array_decoding: ArrayDecoding::Discard,
        ..ExecutorOptions::default()
    });
    driver.respond("SELECT tags FROM t", vec![row]);
    let record = discard.exec_query(&config(), "SELECT tags FROM t")?;
    assert_eq!(record["tags"], json!([]));
    Ok(())
}

#[test]
fn test_non_array_result_is_decode_error() {
    let (driver, executor) = setup();
    driver.respond_with("RETURN 1", vec![StatementResult::ok(StoreValue::Int(1))]);

    let err = executor.exec_query(&config(), "RETURN 1").unwrap_err();
    assert!(matches!(err, BridgeError::Decode(_)));
}

#[test]
fn test_queries_share_one_connection() -> BridgeResult<()> {
    let (driver, executor) = setup();
    for i in 0..5 {
        executor.exec_query(&config().with_namespace(format!("ns{i}")), "SELECT 1")?;
    }
    assert_eq!(driver.connect_count(), 1);
    assert_eq!(driver.queries().len(), 5);
    Ok(())
}
