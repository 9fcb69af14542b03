use std::collections::HashMap;
use std::net::SocketAddr;

use chrono::{Duration as ChronoDuration, Utc};
use pilgrim_api::config::ApiConfig;
use pilgrim_auth::{Hs256Jwt, JwtIssuer};
use pilgrim_core::AccountId;
use reqwest::StatusCode;
use serde_json::{Value, json};

const JWT_SECRET: &str = "test-secret";
const ADMIN_EMAIL: &str = "admin@pilgrim.test";
const ADMIN_PASSWORD: &str = "admin-password";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(&[]).await
    }

    async fn spawn_with(extra: &[(&str, &str)]) -> Self {
        let mut vars: HashMap<String, String> = [
            ("JWT_SECRET", JWT_SECRET),
            ("ARGON2_MEMORY_KIB", "8"),
            ("ARGON2_ITERATIONS", "1"),
            ("ARGON2_PARALLELISM", "1"),
            ("ADMIN_EMAIL", ADMIN_EMAIL),
            ("ADMIN_PASSWORD", ADMIN_PASSWORD),
            ("AUTH_RATE_LIMIT", "1000"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        vars.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        let config =
            ApiConfig::from_lookup(|key| vars.get(key).cloned()).expect("valid test config");

        // Same router as prod, bound to an ephemeral port.
        let app = pilgrim_api::app::build_app(&config).expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .await
                .unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn register(&self, name: &str, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/register"))
            .json(&json!({ "name": name, "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap()
    }

    /// Register and return `(account id, token)`.
    async fn signup(&self, name: &str, email: &str) -> (u64, String) {
        let res = self.register(name, email, "secret123").await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        (
            body["user"]["id"].as_u64().unwrap(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    async fn admin_token(&self) -> String {
        let res = self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body: Value = res.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    async fn visit(&self, token: &str, monastery: &str) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/auth/visit/{monastery}")))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    async fn get(&self, path: &str, token: &str) -> reqwest::Response {
        self.client.get(self.url(path)).bearer_auth(token).send().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let res = srv.client.get(srv.url("/api/auth/profile")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.client.post(srv.url("/api/auth/visit/1")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = srv.get("/api/auth/profile", "not-a-token").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn expired_or_foreign_tokens_are_rejected() {
    let srv = TestServer::spawn().await;
    let (id, _) = srv.signup("Tenzin", "tenzin@x.com").await;

    let expired = Hs256Jwt::new(JWT_SECRET.as_bytes(), ChronoDuration::hours(1))
        .issue(AccountId::new(id), "tenzin@x.com", Utc::now() - ChronoDuration::hours(2))
        .unwrap();
    assert_eq!(srv.get("/api/auth/profile", &expired).await.status(), StatusCode::UNAUTHORIZED);

    let foreign = Hs256Jwt::new(b"other-secret", ChronoDuration::hours(1))
        .issue(AccountId::new(id), "tenzin@x.com", Utc::now())
        .unwrap();
    assert_eq!(srv.get("/api/auth/profile", &foreign).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_returns_view_and_token_without_credential() {
    let srv = TestServer::spawn().await;

    let res = srv.register("Tenzin", "tenzin@x.com", "secret123").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();

    let user = &body["user"];
    assert_eq!(user["name"], "Tenzin");
    assert_eq!(user["email"], "tenzin@x.com");
    assert_eq!(user["badges"], json!(["New Explorer"]));
    assert_eq!(user["stats"]["total_visits"], 0);
    assert_eq!(user["stats"]["login_count"], 0);
    assert_eq!(user["preferences"]["language"], "en");
    assert_eq!(user["is_admin"], false);
    assert!(user.get("credential").is_none());
    assert!(!body.to_string().contains("$argon2"));

    // The issued token is immediately usable.
    let token = body["token"].as_str().unwrap();
    let res = srv.get("/api/auth/profile", token).await;
    assert_eq!(res.status(), StatusCode::OK);
    let profile: Value = res.json().await.unwrap();
    assert_eq!(profile["id"], user["id"]);
}

#[tokio::test]
async fn register_rejects_duplicates_and_bad_input() {
    let srv = TestServer::spawn().await;
    srv.signup("Tenzin", "tenzin@x.com").await;

    let res = srv.register("Other", "tenzin@x.com", "secret123").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "conflict");

    let res = srv.register("Pema", "pema@x.com", "12345").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv
        .client
        .post(srv.url("/api/auth/register"))
        .json(&json!({ "email": "pema@x.com", "password": "secret123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let srv = TestServer::spawn().await;
    srv.signup("Tenzin", "tenzin@x.com").await;

    let wrong_password = srv.login("tenzin@x.com", "wrong-pass").await;
    let unknown_email = srv.login("nobody@x.com", "secret123").await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);

    let a: Value = wrong_password.json().await.unwrap();
    let b: Value = unknown_email.json().await.unwrap();
    assert_eq!(a, b);

    let missing = srv
        .client
        .post(srv.url("/api/auth/login"))
        .json(&json!({ "email": "tenzin@x.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pilgrim_journey_earns_badges() {
    let srv = TestServer::spawn().await;
    srv.signup("Tenzin", "tenzin@x.com").await;

    let res = srv.login("tenzin@x.com", "secret123").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user"]["stats"]["login_count"], 1);
    let token = body["token"].as_str().unwrap().to_string();

    let res = srv.visit(&token, "42").await;
    assert_eq!(res.status(), StatusCode::OK);
    let outcome: Value = res.json().await.unwrap();
    assert_eq!(outcome["visited_monasteries"], json!([42]));
    assert_eq!(outcome["badges"], json!(["New Explorer", "First Steps"]));
    assert_eq!(outcome["stats"]["total_visits"], 1);

    // Revisiting is a no-op.
    let again: Value = srv.visit(&token, "42").await.json().await.unwrap();
    assert_eq!(again, outcome);

    for m in 1..=4 {
        assert_eq!(srv.visit(&token, &m.to_string()).await.status(), StatusCode::OK);
    }
    let profile: Value = srv.get("/api/auth/profile", &token).await.json().await.unwrap();
    assert_eq!(profile["stats"]["total_visits"], 5);
    assert_eq!(profile["badges"], json!(["New Explorer", "First Steps", "Explorer"]));
    assert_eq!(profile["visited_monasteries"], json!([42, 1, 2, 3, 4]));
}

#[tokio::test]
async fn visit_rejects_bad_monastery_ids() {
    let srv = TestServer::spawn_with(&[("KNOWN_MONASTERIES", "1,2,3")]).await;
    let (_, token) = srv.signup("Tenzin", "tenzin@x.com").await;

    assert_eq!(srv.visit(&token, "abc").await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(srv.visit(&token, "-4").await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(srv.visit(&token, "0").await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(srv.visit(&token, "99").await.status(), StatusCode::NOT_FOUND);

    let profile: Value = srv.get("/api/auth/profile", &token).await.json().await.unwrap();
    assert_eq!(profile["stats"]["total_visits"], 0);
    assert_eq!(profile["visited_monasteries"], json!([]));
}

#[tokio::test]
async fn profile_update_merges_preferences() {
    let srv = TestServer::spawn().await;
    let (_, token) = srv.signup("Tenzin", "tenzin@x.com").await;

    let res = srv
        .client
        .put(srv.url("/api/auth/profile"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Tenzin N.", "preferences": { "theme": "dark" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["name"], "Tenzin N.");
    assert_eq!(body["email"], "tenzin@x.com");
    assert_eq!(body["preferences"]["theme"], "dark");
    assert_eq!(body["preferences"]["language"], "en");
    assert_eq!(body["preferences"]["notifications"], true);

    let res = srv
        .client
        .put(srv.url("/api/auth/profile"))
        .bearer_auth(&token)
        .json(&json!({ "name": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_routes_require_admin_flag() {
    let srv = TestServer::spawn().await;
    let (_, token) = srv.signup("Tenzin", "tenzin@x.com").await;

    for path in ["/api/admin/dashboard", "/api/admin/users", "/api/admin/analytics"] {
        let res = srv.get(path, &token).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "{path}");
    }

    let res = srv.client.get(srv.url("/api/admin/dashboard")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_sees_dashboard_directory_and_analytics() {
    let srv = TestServer::spawn().await;
    let (_, tenzin) = srv.signup("Tenzin", "tenzin@x.com").await;
    srv.signup("Pema", "pema@x.com").await;
    srv.visit(&tenzin, "7").await;

    let admin = srv.admin_token().await;

    let res = srv.get("/api/admin/dashboard", &admin).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let overview = &body["dashboard"]["overview"];
    assert_eq!(overview["total_users"], 3);
    assert_eq!(overview["total_visits"], 1);
    assert_eq!(body["dashboard"]["popular_monasteries"][0]["monastery_id"], 7);
    assert!(body["system"]["uptime_seconds"].is_u64());

    let res = srv.get("/api/admin/users?search=PEMA&limit=5", &admin).await;
    assert_eq!(res.status(), StatusCode::OK);
    let page: Value = res.json().await.unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["limit"], 5);
    assert_eq!(page["items"][0]["email"], "pema@x.com");

    let res = srv.get("/api/admin/analytics", &admin).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["engagement"]["total_users"], 3);
    assert_eq!(body["engagement"]["active_users"], 1);
    assert_eq!(body["engagement"]["badge_distribution"]["First Steps"], 1);
}

#[tokio::test]
async fn admin_can_promote_but_not_demote_self() {
    let srv = TestServer::spawn().await;
    let (pema_id, pema) = srv.signup("Pema", "pema@x.com").await;
    let admin = srv.admin_token().await;

    let res = srv
        .client
        .put(srv.url(&format!("/api/admin/users/{pema_id}/admin")))
        .bearer_auth(&admin)
        .json(&json!({ "is_admin": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["is_admin"], true);

    // The flag is read per request, so the existing token gains access.
    assert_eq!(srv.get("/api/admin/dashboard", &pema).await.status(), StatusCode::OK);

    let admin_profile: Value = srv.get("/api/auth/profile", &admin).await.json().await.unwrap();
    let admin_id = admin_profile["id"].as_u64().unwrap();
    let res = srv
        .client
        .put(srv.url(&format!("/api/admin/users/{admin_id}/admin")))
        .bearer_auth(&admin)
        .json(&json!({ "is_admin": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv
        .client
        .put(srv.url("/api/admin/users/999/admin"))
        .bearer_auth(&admin)
        .json(&json!({ "is_admin": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn auth_routes_are_rate_limited_per_client() {
    let srv = TestServer::spawn_with(&[("AUTH_RATE_LIMIT", "10")]).await;

    for attempt in 1..=10 {
        let res = srv.login("nobody@x.com", "secret123").await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "attempt {attempt}");
    }

    let res = srv.login("nobody@x.com", "secret123").await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(res.headers().contains_key(reqwest::header::RETRY_AFTER));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "rate_limited");
    assert!(body["message"].is_string());

    // The budget covers every /api/auth route, token or not.
    let res = srv.register("Pema", "pema@x.com", "secret123").await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    // Other routes are unaffected.
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}
