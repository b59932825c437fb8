//! JSON-RPC ledger client against a mock node.

use std::time::Duration;

use dominion_ledger::{
    LedgerError, LedgerRead, LedgerSubmit, RetryConfig, RpcLedger, RpcSettings,
};
use dominion_types::{ObjectId, OperationBatch, TypeTag};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{id, sender, sui};

fn settings(server: &MockServer) -> RpcSettings {
    RpcSettings {
        allow_http: true,
        page_size: 2,
        ..RpcSettings::new(server.uri())
    }
}

fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        jitter_factor: 0.0,
    }
}

fn ok(result: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "jsonrpc": "2.0", "id": 1, "result": result }))
}

fn object(id: &ObjectId, type_: &str, fields: Value) -> Value {
    json!({
        "data": {
            "objectId": id,
            "version": "7",
            "digest": "dig",
            "type": type_,
            "content": { "dataType": "moveObject", "type": type_, "hasPublicTransfer": false, "fields": fields }
        }
    })
}

fn missing() -> Value {
    json!({ "error": { "code": "notExists" } })
}

async fn mount(server: &MockServer, rpc_method: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": rpc_method })))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn get_object_decodes_content() {
    let server = MockServer::start().await;
    mount(
        &server,
        "sui_getObject",
        ok(object(&id(0x80), "0x10::proposal::Proposal<0x2::sui::SUI>", json!({ "name": "Pay" }))),
    )
    .await;

    let ledger = RpcLedger::new(settings(&server)).unwrap();
    let object = ledger.get_object(&id(0x80)).await.unwrap();
    assert_eq!(object.object_id, id(0x80));
    assert_eq!(object.version, 7);
    assert_eq!(
        object.type_,
        TypeTag::new("0x10::proposal::Proposal<0x2::sui::SUI>")
    );
    assert_eq!(object.fields["name"], "Pay");
}

#[tokio::test]
async fn clock_reads_the_shared_object() {
    let server = MockServer::start().await;
    mount(
        &server,
        "sui_getObject",
        ok(object(
            &ObjectId::clock(),
            "0x2::clock::Clock",
            json!({ "timestamp_ms": "1700000000123" }),
        )),
    )
    .await;

    let ledger = RpcLedger::new(settings(&server)).unwrap();
    assert_eq!(ledger.get_clock().await.unwrap(), 1_700_000_000_123);
}

#[tokio::test]
async fn multi_get_pages_and_keeps_slots_independent() {
    let server = MockServer::start().await;
    let ids = [id(0x1), id(0x2), id(0x3)];
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "sui_multiGetObjects",
            "params": [[ids[0], ids[1]]]
        })))
        .respond_with(ok(json!([
            object(&ids[0], "0x11::dominion::Dominion", json!({})),
            missing(),
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "sui_multiGetObjects",
            "params": [[ids[2]]]
        })))
        .respond_with(ok(json!([object(&ids[2], "0x11::dominion::Dominion", json!({}))])))
        .expect(1)
        .mount(&server)
        .await;

    let ledger = RpcLedger::new(settings(&server)).unwrap();
    let objects = ledger.multi_get_objects(&ids).await.unwrap();
    assert_eq!(objects.len(), 3);
    assert!(objects[0].is_ok());
    assert_eq!(
        objects[1],
        Err(LedgerError::ObjectNotFound { id: ids[1].clone() })
    );
    assert_eq!(objects[2].as_ref().unwrap().object_id, ids[2]);
}

#[tokio::test]
async fn coins_follow_the_cursor() {
    let server = MockServer::start().await;
    let coin = |n: u64, balance: &str| {
        json!({
            "coinType": "0x2::sui::SUI",
            "coinObjectId": id(n),
            "version": "3",
            "digest": format!("d{n}"),
            "balance": balance,
        })
    };
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "suix_getCoins", "params": [id(0x5), sui(), null] })))
        .respond_with(ok(json!({
            "data": [coin(0xc1, "10"), coin(0xc2, "20")],
            "nextCursor": "page2",
            "hasNextPage": true,
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "suix_getCoins", "params": [id(0x5), sui(), "page2"] })))
        .respond_with(ok(json!({
            "data": [coin(0xc3, "30")],
            "nextCursor": "page2",
            "hasNextPage": false,
        })))
        .mount(&server)
        .await;

    let ledger = RpcLedger::new(settings(&server)).unwrap();
    let coins = ledger.get_coins(&id(0x5), &sui()).await.unwrap();
    let balances: Vec<u64> = coins.iter().map(|c| c.balance).collect();
    assert_eq!(balances, [10, 20, 30]);
    assert_eq!(coins[2].object_ref.object_id, id(0xc3));
}

#[tokio::test]
async fn rpc_errors_are_surfaced() {
    let server = MockServer::start().await;
    mount(
        &server,
        "sui_getObject",
        ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32602, "message": "invalid params" }
        })),
    )
    .await;

    let ledger = RpcLedger::new(settings(&server)).unwrap();
    assert_eq!(
        ledger.get_object(&id(0x80)).await,
        Err(LedgerError::Rpc {
            code: -32602,
            message: "invalid params".to_string()
        })
    );
}

#[tokio::test]
async fn reads_retry_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount(
        &server,
        "sui_getObject",
        ok(object(&id(0x80), "0x1::m::S", json!({}))),
    )
    .await;

    let ledger = RpcLedger::with_retry(settings(&server), fast_retry(2)).unwrap();
    assert!(ledger.get_object(&id(0x80)).await.is_ok());
}

#[tokio::test]
async fn exhausted_retries_report_the_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(3)
        .mount(&server)
        .await;

    let ledger = RpcLedger::with_retry(settings(&server), fast_retry(2)).unwrap();
    assert_eq!(
        ledger.get_object(&id(0x80)).await,
        Err(LedgerError::Http {
            status: 503,
            body: "overloaded".to_string()
        })
    );
}

#[tokio::test]
async fn submission_is_sent_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "method": "dominion_submitBatch" })))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let ledger = RpcLedger::with_retry(settings(&server), fast_retry(3)).unwrap();
    let err = ledger
        .submit(&OperationBatch::new(), &sender(), 1_000)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Http { status: 503, .. }), "{err:?}");
}

#[tokio::test]
async fn submission_goes_to_the_gateway() {
    let node = MockServer::start().await;
    let gateway = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "method": "dominion_submitBatch",
            "params": [sender(), [], "1000"]
        })))
        .respond_with(ok(json!({
            "digest": "5Hq",
            "effects": { "status": { "status": "failure", "error": "MoveAbort(3)" } }
        })))
        .expect(1)
        .mount(&gateway)
        .await;

    let ledger = RpcLedger::new(RpcSettings {
        submit_url: Some(gateway.uri()),
        ..settings(&node)
    })
    .unwrap();
    let outcome = ledger
        .submit(&OperationBatch::new(), &sender(), 1_000)
        .await
        .unwrap();
    assert_eq!(outcome.digest, "5Hq");
    assert_eq!(outcome.error(), Some("MoveAbort(3)"));
    assert!(node.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn plain_http_is_refused_by_default() {
    let server = MockServer::start().await;
    let ledger = RpcLedger::new(RpcSettings::new(server.uri())).unwrap();
    assert!(matches!(
        ledger.get_object(&id(0x80)).await,
        Err(LedgerError::Transport { .. })
    ));
}
