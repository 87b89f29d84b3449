
use account::{Account, AccountState, MessageSigning};
use client::testing::{MockRemoteSigner, MockUpstream};
use serde_json::json;
use session::SessionState;
use setup::*;

#[tokio::test]
async fn test_activate_reports_chain_and_account() {
    let h = harness();

    let activation = h.connector.activate().await.unwrap();

    assert_eq!(activation.chain_id, CHAIN_ID);
    assert_eq!(activation.accounts, vec![TEST_ADDRESS]);
    assert_eq!(h.signer.address(), TEST_ADDRESS);
    assert_eq!(h.connector.account().state(), AccountState::Bound);
    assert!(matches!(
        h.connector.session().state(),
        SessionState::LoggedIn { .. }
    ));
    assert_eq!(h.identity.logins(), 1);
    assert_eq!(h.remote.connects(), 1);

    let serialized = serde_json::to_value(&activation).unwrap();
    assert_eq!(
        serialized,
        json!({ "chainId": 5, "accounts": [TEST_ADDRESS] })
    );
}

#[tokio::test]
async fn test_activate_registers_key_through_update_call() {
    let h = harness();

    h.connector.activate().await.unwrap();

    // Unregistered key: the query fails and the update call derives it.
    assert_eq!(h.signer.query_calls(), 1);
    assert_eq!(h.signer.update_calls(), 1);
}

#[tokio::test]
async fn test_activate_rejects_chain_mismatch() {
    let h = harness_with(
        MockRemoteSigner::with_test_key().registered(),
        MockUpstream::new(1),
        settings(None, MessageSigning::Passthrough),
    );

    let err = h.connector.activate().await.unwrap_err();

    assert!(err.to_string().contains("upstream serves chain 1, expected 5"));
    assert_eq!(h.connector.session().state(), SessionState::LoggedOut);
    assert_eq!(h.connector.account().state(), AccountState::Unbound);
    assert!(!h.identity.holds_session());
}

#[tokio::test]
async fn test_activate_fails_when_login_fails() {
    let h = harness();
    h.identity.fail_login(Some("user closed the window".to_string()));

    let err = h.connector.activate().await.unwrap_err();

    assert!(err.to_string().contains("user closed the window"));
    assert_eq!(h.connector.account().state(), AccountState::Unbound);
    assert_eq!(h.remote.connects(), 0);
}

#[tokio::test]
async fn test_deactivate_unbinds_account() {
    let h = harness();
    h.connector.activate().await.unwrap();

    h.connector.deactivate().await.unwrap();

    assert_eq!(h.connector.account().state(), AccountState::Unbound);
    assert!(!h.connector.account().is_authenticated());
    assert_eq!(h.connector.session().state(), SessionState::LoggedOut);
    assert_eq!(h.identity.logouts(), 1);

    let accounts = h.connector.send("eth_accounts", vec![]).await.unwrap();
    assert_eq!(accounts, json!([]));

    let err = h.connector.account().get_address().await.unwrap_err();
    assert!(matches!(err, account::BridgeError::NotAuthenticated));
}

#[tokio::test]
async fn test_reactivate_after_deactivate() {
    let h = harness();
    h.connector.activate().await.unwrap();
    h.connector.deactivate().await.unwrap();

    let activation = h.connector.activate().await.unwrap();

    assert_eq!(activation.accounts, vec![TEST_ADDRESS]);
    assert_eq!(h.remote.connects(), 2);
    assert_eq!(h.connector.account().state(), AccountState::Bound);
}
