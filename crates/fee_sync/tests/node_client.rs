use fee_sync::encoding;
use fee_sync::{
    AccountService, ContentStore, Currency, FeeAuthority, FeeField, NodeClient, ObligationService,
    RemoteError,
};
use httpmock::prelude::*;
use serde_json::json;
use url::Url;

fn client(server: &MockServer) -> NodeClient {
    NodeClient::new(Url::parse(&server.base_url()).unwrap()).unwrap()
}

#[tokio::test]
async fn reads_fee_with_api_key() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/crosschain/btc/feekb")
                .header("X-API-KEY", "secret");
            then.status(200).body("12.5\n");
        })
        .await;
    let node = client(&server).with_api_key("secret");
    let fee = node.foreign_fee(Currency::Btc, FeeField::FeeKb).await.unwrap();
    assert_eq!(fee, "12.5");
    mock.assert_async().await;
}

#[tokio::test]
async fn update_posts_the_value_and_returns_the_echo() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/crosschain/ltc/updatefeerequired")
                .body("900");
            then.status(200).body("900");
        })
        .await;
    let node = client(&server);
    let echoed = node
        .update_foreign_fee(Currency::Ltc, FeeField::FeeRequired, "900")
        .await
        .unwrap();
    assert_eq!(echoed, "900");
    mock.assert_async().await;
}

#[tokio::test]
async fn rejection_carries_the_response_body() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/crosschain/doge/feekb");
            then.status(500).body("wallet locked");
        })
        .await;
    let err = client(&server)
        .foreign_fee(Currency::Doge, FeeField::FeeKb)
        .await
        .unwrap_err();
    match err {
        RemoteError::Rejected(reason) => assert!(reason.contains("wallet locked"), "{reason}"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn publish_sends_base64_to_the_resource_path() {
    let server = MockServer::start_async().await;
    let data = encoding::to_transport("12.5");
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/arbitrary/ARBITRARY_DATA/alice/btc-LOCKING/base64")
                .body(data.clone());
            then.status(200).body("signed-tx");
        })
        .await;
    client(&server)
        .publish("alice", "ARBITRARY_DATA", "btc-LOCKING", &data)
        .await
        .unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn fetch_maps_missing_resources_to_none() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/arbitrary/ARBITRARY_DATA/alice/btc-LOCKING");
            then.status(200).body("15");
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/arbitrary/ARBITRARY_DATA/bob/btc-LOCKING");
            then.status(404).body("not found");
        })
        .await;
    let node = client(&server);
    assert_eq!(
        node.fetch("alice", "ARBITRARY_DATA", "btc-LOCKING").await.unwrap(),
        Some("15".to_string())
    );
    assert_eq!(
        node.fetch("bob", "ARBITRARY_DATA", "btc-LOCKING").await.unwrap(),
        None
    );
}

#[tokio::test]
async fn names_and_obligations_decode_from_json() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/names/address/Q1");
            then.status(200)
                .json_body(json!([{ "name": "alice", "owner": "Q1" }]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/crosschain/unsignedfees/Q1");
            then.status(200).json_body(json!([
                { "atAddress": "AT1", "fee": 1000, "timestamp": 1700000000000u64 }
            ]));
        })
        .await;
    let node = client(&server).with_account_address("Q1");
    let account = node.account().await.unwrap();
    let names = node.account_names(&account.address).await.unwrap();
    assert_eq!(names[0].name, "alice");

    let pending = node.unsigned_fees("Q1").await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].at_address, "AT1");
    assert_eq!(pending[0].fee, 1000);
}

#[tokio::test]
async fn malformed_json_is_a_transport_failure() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/crosschain/unsignedfees/Q1");
            then.status(200).body("<html>");
        })
        .await;
    let err = client(&server).unsigned_fees("Q1").await.unwrap_err();
    assert!(matches!(err, RemoteError::Transport(_)));
}

#[tokio::test]
async fn sign_all_posts_once() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/crosschain/signfees");
            then.status(200).body("true");
        })
        .await;
    client(&server).sign_all().await.unwrap();
    mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn unreachable_node_is_a_transport_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let node = NodeClient::new(Url::parse(&format!("http://{addr}")).unwrap()).unwrap();
    let err = node
        .foreign_fee(Currency::Btc, FeeField::FeeKb)
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Transport(_)));
}
