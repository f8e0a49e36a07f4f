//! End-to-End tests for token reconciliation against a mock agent.
//!
//! These tests drive a full `prepare` / `flush` pass through the HTTP client
//! and verify the exact requests the agent receives. We use wiremock to
//! simulate the agent's ACL endpoints.
//!
//! Scenarios:
//! 1. Token list retries and retry exhaustion
//! 2. Matching by description
//! 3. Creation payload
//! 4. Policy drift updates (missing id, missing name, surplus) and no-op
//! 5. Deletion of absent tokens

use consul_acl::{
    AclClient, AclError, AgentConfig, AgentEndpoint, DesiredToken, Ensure, ReconciliationContext,
    ReconciliationPlan,
};
use wiremock::matchers::{body_string, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CREDENTIAL: &str = "e33653a6-0320-4a71-b3af-75f14578e3aa";
const ACCESSOR_ID: &str = "803ba11a-afe9-4198-a179-ef25a2adbf0b";
const CREATED_ID: &str = "f28febb0-8746-4b6a-b6bf-03cde92005a1";
const POLICY_ID: &str = "652f27c9-d08d-412b-8985-9becc9c42fb2";

const EXPECTED_BODY: &str = r#"{"Description":"test_token","Local":false,"Policies":[{"Name":"test_policy_1"},{"ID":"652f27c9-d08d-412b-8985-9becc9c42fb2"}]}"#;

/// Test fixture providing a mock agent.
struct TestFixture {
    /// Mock Consul agent.
    agent: MockServer,
}

impl TestFixture {
    /// Create a new test fixture with a mock agent.
    async fn new() -> Self {
        Self {
            agent: MockServer::start().await,
        }
    }

    /// Get a reconciliation context pointed at the mock agent.
    fn context(&self) -> ReconciliationContext<AclClient> {
        let config = AgentConfig {
            endpoint: AgentEndpoint::new(self.agent.uri()),
            default_timeout_secs: 10,
        };
        ReconciliationContext::new(AclClient::new(&config).expect("client should build"))
    }

    /// Mount a token list response.
    async fn mount_list(&self, tokens: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/v1/acl/tokens"))
            .and(header("X-Consul-Token", CREDENTIAL))
            .respond_with(ResponseTemplate::new(200).set_body_json(tokens))
            .expect(1)
            .mount(&self.agent)
            .await;
    }

    /// Forbid any mutating request.
    async fn forbid_mutations(&self) {
        Mock::given(method("PUT"))
            .and(path_regex(r"^/v1/acl/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&self.agent)
            .await;
        Mock::given(method("DELETE"))
            .and(path_regex(r"^/v1/acl/token"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&self.agent)
            .await;
    }
}

/// The declared resource used throughout.
fn test_token() -> DesiredToken {
    DesiredToken::new("test_token", CREDENTIAL)
        .with_policy_name("test_policy_1")
        .with_policy_id(POLICY_ID)
        .with_max_attempts(3)
}

/// A token update response as returned by the agent.
fn token_response(accessor_id: &str) -> serde_json::Value {
    serde_json::json!({
        "AccessorID": accessor_id,
        "Description": "test_token",
        "Policies": []
    })
}

// =============================================================================
// Test 1: token list retries
// =============================================================================

/// Two unexpected responses followed by a good one complete the pass in
/// exactly three requests.
#[tokio::test]
async fn test_list_retries_until_success() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path("/v1/acl/tokens"))
        .and(header("X-Consul-Token", CREDENTIAL))
        .respond_with(ResponseTemplate::new(400))
        .up_to_n_times(2)
        .expect(2)
        .mount(&fixture.agent)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/acl/tokens"))
        .and(header("X-Consul-Token", CREDENTIAL))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "AccessorID": ACCESSOR_ID,
                "Description": "Test description",
                "Policies": []
            }
        ])))
        .expect(1)
        .mount(&fixture.agent)
        .await;

    let mut context = fixture.context();
    context.begin_pass();
    let plans = context
        .prepare(vec![test_token()])
        .await
        .expect("prepare should survive two failures")
        .to_vec();

    assert_eq!(plans, vec![ReconciliationPlan::Create]);
    assert_eq!(context.desired()[0].ensure, Ensure::Present);
    assert_eq!(context.desired()[0].observed_accessor_id(), "");
}

/// Three failures exhaust the budget; nothing can be flushed afterwards.
#[tokio::test]
async fn test_list_retry_exhaustion() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path("/v1/acl/tokens"))
        .respond_with(ResponseTemplate::new(500).set_body_string("agent restarting"))
        .expect(3)
        .mount(&fixture.agent)
        .await;
    fixture.forbid_mutations().await;

    let mut context = fixture.context();
    let result = context.prepare(vec![test_token()]).await;

    match result {
        Err(AclError::RemoteUnavailable {
            attempts,
            status,
            message,
        }) => {
            assert_eq!(attempts, 3);
            assert_eq!(status, Some(500));
            assert_eq!(message, "agent restarting");
        }
        other => panic!("expected RemoteUnavailable, got {:?}", other),
    }

    assert!(matches!(context.flush().await, Err(AclError::NotPrepared)));
}

/// A body that is not a token list fails at once, without retries.
#[tokio::test]
async fn test_list_protocol_error_is_not_retried() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path("/v1/acl/tokens"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
        .expect(1)
        .mount(&fixture.agent)
        .await;

    let mut context = fixture.context();
    let result = context.prepare(vec![test_token()]).await;

    assert!(matches!(result, Err(AclError::ProtocolError(_))));
}

/// An unreachable agent surfaces as RemoteUnavailable with no status.
#[tokio::test]
async fn test_unreachable_agent() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };
    let config = AgentConfig::for_agent("http", "127.0.0.1", port);
    let mut context = ReconciliationContext::new(AclClient::new(&config).expect("client"));

    let result = context
        .prepare(vec![test_token().with_max_attempts(2)])
        .await;

    match result {
        Err(AclError::RemoteUnavailable {
            attempts, status, ..
        }) => {
            assert_eq!(attempts, 2);
            assert_eq!(status, None);
        }
        other => panic!("expected RemoteUnavailable, got {:?}", other),
    }
}

// =============================================================================
// Test 2: matching existing tokens
// =============================================================================

#[tokio::test]
async fn test_sets_accessor_id_on_match() {
    let fixture = TestFixture::new().await;
    fixture
        .mount_list(serde_json::json!([
            {"AccessorID": ACCESSOR_ID, "Description": "test_token", "Policies": []},
            {"AccessorID": "54636c2c-f378-428d-8b74-ac72cc6dd32d", "Description": "other token", "Policies": []}
        ]))
        .await;

    let mut context = fixture.context();
    context.prepare(vec![test_token()]).await.expect("prepare");

    assert_eq!(context.desired()[0].observed_accessor_id(), ACCESSOR_ID);
}

#[tokio::test]
async fn test_sets_empty_accessor_id_on_miss() {
    let fixture = TestFixture::new().await;
    fixture
        .mount_list(serde_json::json!([
            {"AccessorID": ACCESSOR_ID, "Description": "other token", "Policies": []}
        ]))
        .await;

    let mut context = fixture.context();
    context.prepare(vec![test_token()]).await.expect("prepare");

    assert_eq!(context.desired()[0].observed_accessor_id(), "");
}

// =============================================================================
// Test 3: creation
// =============================================================================

/// A missing token is created with by-name policies before by-id ones.
#[tokio::test]
async fn test_creates_missing_token() {
    let fixture = TestFixture::new().await;
    fixture.mount_list(serde_json::json!([])).await;

    Mock::given(method("PUT"))
        .and(path("/v1/acl/token"))
        .and(header("X-Consul-Token", CREDENTIAL))
        .and(body_string(EXPECTED_BODY))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(CREATED_ID)))
        .expect(1)
        .mount(&fixture.agent)
        .await;

    let mut context = fixture.context();
    context.prepare(vec![test_token()]).await.expect("prepare");
    let report = context.flush().await.expect("flush");

    assert_eq!(report.created, vec!["test_token"]);
    assert_eq!(context.desired()[0].observed_accessor_id(), CREATED_ID);
}

/// A failed create leaves the accessor id empty.
#[tokio::test]
async fn test_create_failure_surfaces_after_retries() {
    let fixture = TestFixture::new().await;
    fixture.mount_list(serde_json::json!([])).await;

    Mock::given(method("PUT"))
        .and(path("/v1/acl/token"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&fixture.agent)
        .await;

    let mut context = fixture.context();
    context.prepare(vec![test_token()]).await.expect("prepare");
    let result = context.flush().await;

    assert!(matches!(
        result,
        Err(AclError::RemoteUnavailable {
            attempts: 3,
            status: Some(503),
            ..
        })
    ));
    assert_eq!(context.desired()[0].observed_accessor_id(), "");
}

// =============================================================================
// Test 4: policy drift
// =============================================================================

/// Run a pass against a matched token holding `policies` and expect one
/// update carrying the declared policies.
async fn assert_update_for(policies: serde_json::Value) {
    let fixture = TestFixture::new().await;
    fixture
        .mount_list(serde_json::json!([
            {"AccessorID": ACCESSOR_ID, "Description": "test_token", "Policies": policies}
        ]))
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("/v1/acl/token/{}", ACCESSOR_ID)))
        .and(header("X-Consul-Token", CREDENTIAL))
        .and(body_string(EXPECTED_BODY))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response(CREATED_ID)))
        .expect(1)
        .mount(&fixture.agent)
        .await;

    let mut context = fixture.context();
    let plans = context
        .prepare(vec![test_token()])
        .await
        .expect("prepare")
        .to_vec();
    assert_eq!(plans, vec![ReconciliationPlan::Update(ACCESSOR_ID.to_string())]);

    let report = context.flush().await.expect("flush");
    assert_eq!(report.updated, vec!["test_token"]);
}

#[tokio::test]
async fn test_updates_on_missing_policy_id() {
    assert_update_for(serde_json::json!([
        {"ID": "91c889b8-88fe-46d0-bdbd-54447fcd191b", "Name": "test_policy_1"}
    ]))
    .await;
}

#[tokio::test]
async fn test_updates_on_missing_policy_name() {
    assert_update_for(serde_json::json!([
        {"ID": POLICY_ID, "Name": "test_policy_2"}
    ]))
    .await;
}

#[tokio::test]
async fn test_updates_on_surplus_policy() {
    assert_update_for(serde_json::json!([
        {"ID": "91c889b8-88fe-46d0-bdbd-54447fcd191b", "Name": "test_policy_1"},
        {"ID": POLICY_ID, "Name": "test_policy_2"},
        {"ID": "a213e6b6-a7d9-484a-9223-94dfb96cc99f", "Name": "surplus_policy"}
    ]))
    .await;
}

#[tokio::test]
async fn test_no_update_when_policies_match() {
    let fixture = TestFixture::new().await;
    fixture
        .mount_list(serde_json::json!([
            {
                "AccessorID": ACCESSOR_ID,
                "Description": "test_token",
                "Policies": [
                    {"ID": "91c889b8-88fe-46d0-bdbd-54447fcd191b", "Name": "test_policy_1"},
                    {"ID": POLICY_ID, "Name": "test_policy_2"}
                ]
            }
        ]))
        .await;
    fixture.forbid_mutations().await;

    let mut context = fixture.context();
    context.prepare(vec![test_token()]).await.expect("prepare");
    let report = context.flush().await.expect("flush");

    assert_eq!(report.unchanged, vec!["test_token"]);
    assert_eq!(report.changed(), 0);
}

// =============================================================================
// Test 5: deletion
// =============================================================================

#[tokio::test]
async fn test_deletes_absent_existing_token() {
    let fixture = TestFixture::new().await;
    fixture
        .mount_list(serde_json::json!([
            {"AccessorID": ACCESSOR_ID, "Description": "test_token", "Policies": []}
        ]))
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("/v1/acl/token/{}", ACCESSOR_ID)))
        .and(header("X-Consul-Token", CREDENTIAL))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&fixture.agent)
        .await;

    let mut context = fixture.context();
    context
        .prepare(vec![test_token().with_ensure(Ensure::Absent)])
        .await
        .expect("prepare");
    let report = context.flush().await.expect("flush");

    assert_eq!(report.deleted, vec!["test_token"]);
}

#[tokio::test]
async fn test_does_not_delete_absent_missing_token() {
    let fixture = TestFixture::new().await;
    fixture.mount_list(serde_json::json!([])).await;
    fixture.forbid_mutations().await;

    let mut context = fixture.context();
    context
        .prepare(vec![test_token().with_ensure(Ensure::Absent)])
        .await
        .expect("prepare");
    context.flush().await.expect("flush");

    let requests = fixture.agent.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 1);
}

/// A token deleted behind our back between prepare and flush is fine.
#[tokio::test]
async fn test_delete_of_vanished_token_succeeds() {
    let fixture = TestFixture::new().await;
    fixture
        .mount_list(serde_json::json!([
            {"AccessorID": ACCESSOR_ID, "Description": "test_token"}
        ]))
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("/v1/acl/token/{}", ACCESSOR_ID)))
        .respond_with(ResponseTemplate::new(404).set_body_string("ACL not found"))
        .expect(1)
        .mount(&fixture.agent)
        .await;

    let mut context = fixture.context();
    context
        .prepare(vec![test_token().with_ensure(Ensure::Absent)])
        .await
        .expect("prepare");
    let report = context.flush().await.expect("404 on delete counts as deleted");

    assert_eq!(report.deleted, vec!["test_token"]);
}
