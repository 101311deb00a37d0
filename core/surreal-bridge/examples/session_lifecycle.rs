//! 세션 캐시 / 실행 파이프라인 예제
//!
//! 실행: cargo run --example session_lifecycle --features logging

use serde_json::json;
use std::sync::Arc;
use surreal_bridge::driver::memory::MemoryDriver;
use surreal_bridge::value::StoreValue;
use surreal_bridge::{ConnectionConfig, QueryExecutor, RequestMethod, SessionRegistry};

fn main() -> surreal_bridge::BridgeResult<()> {
    surreal_bridge::logging::init_with_level("surreal_bridge=debug");

    println!("=== surreal-bridge 세션 예제 ===\n");

    // 1. 드라이버 준비 (인메모리, 응답 스크립트)
    let driver = MemoryDriver::new();
    driver.respond(
        "SELECT * FROM person",
        vec![
            StoreValue::object([
                ("id", StoreValue::thing("person", "tobie")),
                ("name", StoreValue::from("Tobie")),
            ]),
            StoreValue::object([
                ("id", StoreValue::thing("person", "jaime")),
                ("name", StoreValue::from("Jaime")),
            ]),
        ],
    );

    // 2. 레지스트리 / 실행기 생성
    let registry = Arc::new(SessionRegistry::new(driver.clone()));
    let executor = QueryExecutor::new(Arc::clone(&registry));
    let config = ConnectionConfig::new("ws://localhost:8000/rpc", "root", "root")
        .with_namespace("demo")
        .with_table("person");

    // 3. 읽기
    println!("1. SELECT");
    let record = executor.execute(&config, "SELECT * FROM person")?;
    println!("   {}\n", serde_json::to_string_pretty(&record)?);

    // 4. 쓰기
    println!("2. UPDATE (id list)");
    let update = config
        .clone()
        .with_method(RequestMethod::Put)
        .with_id_in(vec![json!("person:tobie"), json!("person:jaime")]);
    let outcome = executor.execute(&update, "UPDATE person SET active = true")?;
    println!("   {}\n", serde_json::to_string(&outcome)?);

    // 5. 정리
    println!("3. close_all");
    let report = registry.close_all();
    println!(
        "   closed={} failed={} connects={}",
        report.closed,
        report.failures.len(),
        driver.connect_count()
    );

    Ok(())
}
