use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use authkit::AuthKit;
use authkit_api::config::ApiConfig;
use authkit_core::{EmailDeliveryInput, InMemoryEmailOutbox, RequestContext, TenantId, UserId};
use authkit_emailverification::EmailVerificationMode;

struct TestServer {
    base_url: String,
    kit: AuthKit,
    outbox: Arc<InMemoryEmailOutbox>,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(config: ApiConfig) -> Self {
        // Same router as prod, but bound to an ephemeral port and with an inspectable outbox.
        let outbox = Arc::new(InMemoryEmailOutbox::new());
        let kit = authkit_api::app::services::build_kit(&config, outbox.clone())
            .expect("recipes should initialise");
        let app = authkit_api::app::build_app(kit.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            kit,
            outbox,
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn spawn_default() -> Self {
        Self::spawn(ApiConfig::default()).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client.post(self.url(path)).json(&body).send().await.unwrap()
    }

    async fn get_with_session(&self, path: &str, handle: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(handle)
            .send()
            .await
            .unwrap()
    }

    /// Returns the session handle and the response body.
    async fn sign_up(&self, email: &str, password: &str) -> (String, Value) {
        let res = self.post("/auth/signup", credentials(email, password)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let handle = session_handle(&res);
        let body: Value = res.json().await.unwrap();
        assert_eq!(body["status"], "OK", "unexpected sign-up body: {body}");
        (handle, body)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn credentials(email: &str, password: &str) -> Value {
    json!({
        "formFields": [
            { "id": "email", "value": email },
            { "id": "password", "value": password },
        ]
    })
}

fn session_handle(res: &reqwest::Response) -> String {
    res.headers()
        .get("st-access-token")
        .expect("response should carry a session handle")
        .to_str()
        .unwrap()
        .to_string()
}

fn token_from_link(link: &str) -> String {
    let query = link.split_once("token=").expect("link has a token").1;
    query.split('&').next().unwrap().to_string()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn_default().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn session_required_for_protected_endpoints() {
    let srv = TestServer::spawn_default().await;

    let res = srv.client.get(srv.url("/sessioninfo")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv
        .get_with_session("/sessioninfo", &UserId::new().to_string())
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sign_up_then_session_info_then_admin_gate() {
    let srv = TestServer::spawn_default().await;
    let (handle, body) = srv.sign_up("alice@example.com", "password1").await;
    let user_id = body["user"]["id"].as_str().unwrap().to_string();

    let res = srv.get_with_session("/sessioninfo", &handle).await;
    assert_eq!(res.status(), StatusCode::OK);
    let info: Value = res.json().await.unwrap();
    assert_eq!(info["userId"], user_id.as_str());
    assert_eq!(info["tenantId"], "public");
    assert_eq!(info["accessTokenPayload"]["st-role"]["v"], json!([]));

    let res = srv.get_with_session("/admin/ping", &handle).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let denied: Value = res.json().await.unwrap();
    assert_eq!(denied["claimValidationErrors"][0]["id"], "st-role");

    // Grant the role out of band, then sign in again for a session that carries it.
    let roles = srv.kit.user_roles().unwrap();
    let ctx = RequestContext::new();
    roles
        .create_new_role_or_add_permissions("admin".into(), vec!["users.write".into()], &ctx)
        .await
        .unwrap();
    let user_id = UserId::from_uuid(user_id.parse().unwrap());
    roles
        .add_role_to_user(TenantId::default(), user_id, "admin".into(), &ctx)
        .await
        .unwrap();

    let res = srv
        .post("/auth/signin", credentials("alice@example.com", "password1"))
        .await;
    let admin_handle = session_handle(&res);
    let res = srv.get_with_session("/admin/ping", &admin_handle).await;
    assert_eq!(res.status(), StatusCode::OK);
    let pong: Value = res.json().await.unwrap();
    assert_eq!(pong["status"], "OK");
}

#[tokio::test]
async fn sign_up_form_and_duplicate_errors() {
    let srv = TestServer::spawn_default().await;

    let res = srv.post("/auth/signup", credentials("not-an-email", "short")).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "FIELD_ERROR");
    assert_eq!(body["formFields"].as_array().unwrap().len(), 2);

    srv.sign_up("bob@example.com", "password1").await;
    let res = srv.post("/auth/signup", credentials("Bob@Example.com", "password2")).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "EMAIL_ALREADY_EXISTS_ERROR");

    let res = srv
        .client
        .get(srv.url("/auth/emailpassword/email/exists"))
        .query(&[("email", "bob@example.com")])
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["exists"], true);

    let res = srv.post("/auth/signin", credentials("bob@example.com", "wrong-pass1")).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "WRONG_CREDENTIALS_ERROR");
}

#[tokio::test]
async fn password_reset_round_trip() {
    let srv = TestServer::spawn_default().await;
    srv.sign_up("carol@example.com", "password1").await;

    let res = srv
        .post(
            "/auth/user/password/reset/token",
            json!({ "formFields": [{ "id": "email", "value": "nobody@example.com" }] }),
        )
        .await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "OK");
    assert!(srv.outbox.sent().is_empty());

    let res = srv
        .post(
            "/auth/user/password/reset/token",
            json!({ "formFields": [{ "id": "email", "value": "carol@example.com" }] }),
        )
        .await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "OK");

    let sent = srv.outbox.sent();
    assert_eq!(sent.len(), 1);
    let EmailDeliveryInput::PasswordReset { password_reset_link, .. } = &sent[0] else {
        panic!("expected a password reset email, got {:?}", sent[0]);
    };
    assert!(password_reset_link.starts_with("http://localhost:3000/auth/reset-password?token="));
    let token = token_from_link(password_reset_link);

    let reset = json!({
        "token": token,
        "formFields": [{ "id": "password", "value": "newpassword2" }],
    });
    let res = srv.post("/auth/user/password/reset", reset.clone()).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "OK");

    let res = srv.post("/auth/user/password/reset", reset).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "RESET_PASSWORD_INVALID_TOKEN_ERROR");

    let res = srv
        .post("/auth/signin", credentials("carol@example.com", "newpassword2"))
        .await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "OK");
}

#[tokio::test]
async fn third_party_sign_up_with_taken_email_is_a_general_error() {
    let srv = TestServer::spawn_default().await;
    srv.sign_up("dave@example.com", "password1").await;

    let res = srv
        .post(
            "/auth/signinup",
            json!({
                "thirdPartyId": "google",
                "thirdPartyUserId": "g-123",
                "email": "dave@example.com",
                "emailVerified": true,
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().get("st-access-token").is_none());
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "GENERAL_ERROR");
    assert!(body["message"].as_str().unwrap().contains("already have an account"));

    let res = srv
        .post(
            "/auth/signinup",
            json!({
                "thirdPartyId": "google",
                "thirdPartyUserId": "g-456",
                "email": "erin@example.com",
                "emailVerified": true,
            }),
        )
        .await;
    let handle = session_handle(&res);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "OK");
    assert_eq!(body["createdNewUser"], true);

    let res = srv.get_with_session("/auth/user/email/verify", &handle).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["isVerified"], true);
}

#[tokio::test]
async fn required_email_verification_blocks_until_verified() {
    let srv = TestServer::spawn(ApiConfig {
        email_verification: EmailVerificationMode::Required,
        ..ApiConfig::default()
    })
    .await;
    let (handle, _) = srv.sign_up("frank@example.com", "password1").await;

    let res = srv.get_with_session("/sessioninfo", &handle).await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["claimValidationErrors"][0]["id"], "st-ev");

    // Verification endpoints stay reachable with an unverified session.
    let res = srv
        .client
        .post(srv.url("/auth/user/email/verify/token"))
        .bearer_auth(&handle)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "OK");

    let sent = srv.outbox.sent();
    let Some(EmailDeliveryInput::EmailVerification { email_verify_link, .. }) = sent.last() else {
        panic!("expected a verification email, got {sent:?}");
    };
    let token = token_from_link(email_verify_link);

    let res = srv
        .client
        .post(srv.url("/auth/user/email/verify"))
        .bearer_auth(&handle)
        .json(&json!({ "token": token }))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "OK");

    let res = srv.get_with_session("/sessioninfo", &handle).await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv
        .client
        .post(srv.url("/auth/user/email/verify"))
        .json(&json!({ "token": token }))
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "EMAIL_VERIFICATION_INVALID_TOKEN_ERROR");
}

#[tokio::test]
async fn sign_out_revokes_the_session() {
    let srv = TestServer::spawn_default().await;
    let (handle, _) = srv.sign_up("grace@example.com", "password1").await;

    let res = srv
        .client
        .post(srv.url("/auth/signout"))
        .bearer_auth(&handle)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = srv.get_with_session("/sessioninfo", &handle).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn accounts_are_scoped_by_tenant_header() {
    let srv = TestServer::spawn_default().await;
    let res = srv
        .client
        .post(srv.url("/auth/signup"))
        .header("x-tenant-id", "acme")
        .json(&credentials("heidi@example.com", "password1"))
        .send()
        .await
        .unwrap();
    let handle = session_handle(&res);

    let res = srv.get_with_session("/sessioninfo", &handle).await;
    let info: Value = res.json().await.unwrap();
    assert_eq!(info["tenantId"], "acme");

    let res = srv
        .post("/auth/signin", credentials("heidi@example.com", "password1"))
        .await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "WRONG_CREDENTIALS_ERROR");
}
