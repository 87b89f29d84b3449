
use bridge::serve;
use client::{UpstreamError, METHOD_NOT_FOUND};
use rpc::{JsonRpcResponse, PARSE_ERROR};
use serde_json::json;
use setup::*;

#[tokio::test]
async fn test_unintercepted_methods_forwarded_verbatim() {
    let h = harness();
    h.connector.activate().await.unwrap();
    h.upstream.respond("eth_getBalance", json!("0xde0b6b3a7640000"));
    h.upstream.respond("eth_getLogs", json!([{ "logIndex": "0x0" }]));

    let balance = h
        .connector
        .send("eth_getBalance", vec![json!(TEST_ADDRESS), json!("latest")])
        .await
        .unwrap();
    let filter = json!({ "fromBlock": "0x10", "address": RECIPIENT });
    let logs = h
        .connector
        .send("eth_getLogs", vec![filter.clone()])
        .await
        .unwrap();

    assert_eq!(balance, json!("0xde0b6b3a7640000"));
    assert_eq!(logs, json!([{ "logIndex": "0x0" }]));
    assert_eq!(
        h.upstream.requests(),
        vec![
            (
                "eth_getBalance".to_string(),
                json!([TEST_ADDRESS, "latest"])
            ),
            ("eth_getLogs".to_string(), json!([filter])),
        ]
    );
}

#[tokio::test]
async fn test_forwarding_works_without_login() {
    let h = harness();
    h.upstream.respond("eth_gasPrice", json!("0x3b9aca00"));

    let price = h.connector.send("eth_gasPrice", vec![]).await.unwrap();

    assert_eq!(price, json!("0x3b9aca00"));
}

#[tokio::test]
async fn test_block_number_normalized_to_hex() {
    let h = harness();
    h.upstream.respond("eth_blockNumber", json!(4096));

    let number = h.connector.send("eth_blockNumber", vec![]).await.unwrap();

    assert_eq!(number, json!("0x1000"));
}

#[tokio::test]
async fn test_upstream_errors_keep_their_code() {
    let h = harness();
    h.upstream.respond_error(
        "eth_call",
        UpstreamError::Rpc {
            code: 3,
            message: "execution reverted".to_string(),
            data: Some(json!("0x08c379a0")),
        },
    );

    let err = h
        .connector
        .send("eth_call", vec![json!({ "to": RECIPIENT }), json!("latest")])
        .await
        .unwrap_err();
    assert_eq!(err.code(), 3);
    assert_eq!(err.data(), Some(&json!("0x08c379a0")));

    let err = h.connector.send("eth_unknown", vec![]).await.unwrap_err();
    assert_eq!(err.code(), METHOD_NOT_FOUND);
}

#[tokio::test]
async fn test_serve_answers_each_line_in_order() {
    let h = harness();
    h.connector.activate().await.unwrap();
    h.upstream.respond("eth_chainId", json!("0x5"));

    let input = concat!(
        r#"{"jsonrpc":"2.0","id":1,"method":"eth_chainId","params":[]}"#,
        "\n",
        "\n",
        "not json\n",
        r#"{"jsonrpc":"2.0","id":"two","method":"eth_accounts"}"#,
        "\n",
    );
    let mut output = Vec::new();

    serve(&h.connector, input.as_bytes(), &mut output)
        .await
        .unwrap();

    let responses: Vec<JsonRpcResponse> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(responses.len(), 3);

    assert_eq!(responses[0].id, json!(1));
    assert_eq!(responses[0].result, Some(json!("0x5")));

    assert_eq!(responses[1].id, json!(null));
    assert_eq!(responses[1].error.as_ref().unwrap().code, PARSE_ERROR);

    assert_eq!(responses[2].id, json!("two"));
    assert_eq!(responses[2].result, Some(json!([TEST_ADDRESS])));
}
