use crate::server::{ServerState, app};
use blogbot_common::{
    model::{Id, auth::Claims},
    service::{
        auth::AuthService,
        posts::PostService,
        token::{SigningConfig, TokenSigner},
    },
    store::memory::MemoryStore,
};
use reqwest::{Client, Response, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::net::TcpListener;

const SECRET: &str = "test secret";

struct TestServer {
    base: String,
    client: Client,
    store: Arc<MemoryStore>,
}

impl TestServer {
    async fn spawn() -> Self {
        let store = Arc::new(MemoryStore::new());
        let signer = TokenSigner::new(SigningConfig::hs256(SECRET)).unwrap();
        let state = ServerState {
            auth: Arc::new(AuthService::new(store.clone(), signer)),
            posts: Arc::new(PostService::new(store.clone(), store.clone())),
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app(state)).await.unwrap();
        });

        Self {
            base: format!("http://{address}"),
            client: Client::new(),
            store,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn get(&self, path: &str, token: Option<&str>) -> Response {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.unwrap()
    }

    async fn send(
        &self,
        method: reqwest::Method,
        path: &str,
        token: Option<&str>,
        body: &Value,
    ) -> Response {
        let mut request = self.client.request(method, self.url(path)).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.unwrap()
    }

    async fn post(&self, path: &str, token: Option<&str>, body: &Value) -> Response {
        self.send(reqwest::Method::POST, path, token, body).await
    }

    async fn register(&self, username: &str, password: &str) -> Value {
        let response = self
            .post(
                "/users/register",
                None,
                &json!({
                    "username": username,
                    "password": password,
                    "email": format!("{username}@example.com"),
                }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.unwrap()
    }

    async fn login(&self, username: &str, password: &str) -> Value {
        let response = self
            .post(
                "/users/login",
                None,
                &json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        response.json().await.unwrap()
    }

    /// Registers and logs in, returning the user's access token.
    async fn access_token(&self, username: &str) -> String {
        self.register(username, "pw").await;
        let tokens = self.login(username, "pw").await;
        tokens["access"].as_str().unwrap().to_owned()
    }

    async fn create_post(&self, token: &str, title: &str, content: &str) -> Value {
        let response = self
            .post(
                "/posts",
                Some(token),
                &json!({ "title": title, "content": content }),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        response.json().await.unwrap()
    }
}

async fn error_body(response: Response, status: StatusCode) -> String {
    assert_eq!(response.status(), status);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], status.as_u16());
    body["message"].as_str().unwrap().to_owned()
}

#[tokio::test]
async fn non_owner_cannot_edit_post() {
    let server = TestServer::spawn().await;
    let alice = server.access_token("alice").await;
    let bob = server.access_token("bob").await;

    let post = server.create_post(&alice, "T", "C").await;
    assert_eq!(post["author"], "alice");
    assert_eq!(post["title"], "T");
    assert_eq!(post["content"], "C");
    assert!(post["created_at"].is_string());
    let path = format!("/posts/{}", post["id"]);

    let response = server
        .send(
            reqwest::Method::PUT,
            &path,
            Some(&bob),
            &json!({ "title": "hijacked" }),
        )
        .await;
    let message = error_body(response, StatusCode::BAD_REQUEST).await;
    assert!(message.contains("not owner"), "{message}");

    let response = server
        .send(reqwest::Method::DELETE, &path, Some(&bob), &json!({}))
        .await;
    error_body(response, StatusCode::BAD_REQUEST).await;

    let fetched: Value = server.get(&path, None).await.json().await.unwrap();
    assert_eq!(fetched, post);
}

#[tokio::test]
async fn author_edits_and_deletes_post() {
    let server = TestServer::spawn().await;
    let alice = server.access_token("alice").await;
    let post = server.create_post(&alice, "T", "C").await;
    let path = format!("/posts/{}", post["id"]);

    let response = server
        .send(
            reqwest::Method::PUT,
            &path,
            Some(&alice),
            &json!({ "content": "C2" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated: Value = response.json().await.unwrap();
    assert_eq!(updated["title"], "T");
    assert_eq!(updated["content"], "C2");
    assert_eq!(updated["created_at"], post["created_at"]);

    let response = server
        .send(reqwest::Method::DELETE, &path, Some(&alice), &json!({}))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    error_body(server.get(&path, None).await, StatusCode::NOT_FOUND).await;
}

#[tokio::test]
async fn lists_newest_post_first() {
    let server = TestServer::spawn().await;
    let alice = server.access_token("alice").await;

    let empty: Value = server.get("/posts", None).await.json().await.unwrap();
    assert_eq!(empty, json!([]));

    let first = server.create_post(&alice, "one", "").await;
    let second = server.create_post(&alice, "two", "").await;

    let response = server.get("/posts", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let listed: Value = response.json().await.unwrap();
    assert_eq!(listed, json!([second, first]));
}

#[tokio::test]
async fn missing_post_is_not_found() {
    let server = TestServer::spawn().await;

    error_body(server.get("/posts/999", None).await, StatusCode::NOT_FOUND).await;
    error_body(server.get("/posts/abc", None).await, StatusCode::NOT_FOUND).await;
    error_body(server.get("/nothing/here", None).await, StatusCode::NOT_FOUND).await;
}

#[tokio::test]
async fn mutations_need_valid_access_token() {
    let server = TestServer::spawn().await;
    let body = json!({ "title": "T", "content": "C" });

    let response = server.post("/posts", None, &body).await;
    error_body(response, StatusCode::UNAUTHORIZED).await;

    let response = server.post("/posts", Some("garbage"), &body).await;
    error_body(response, StatusCode::UNAUTHORIZED).await;

    let foreign = TokenSigner::new(SigningConfig::hs256("other secret"))
        .unwrap()
        .issue(Id::new(1))
        .unwrap();
    let response = server.post("/posts", Some(&foreign.access), &body).await;
    error_body(response, StatusCode::UNAUTHORIZED).await;

    let alice = server.access_token("alice").await;
    let response = server
        .post("/posts", Some(&alice), &json!({ "title": "", "content": "C" }))
        .await;
    error_body(response, StatusCode::BAD_REQUEST).await;

    let empty: Value = server.get("/posts", None).await.json().await.unwrap();
    assert_eq!(empty, json!([]));
}

#[tokio::test]
async fn edits_and_me_reject_missing_or_expired_token() {
    let server = TestServer::spawn().await;
    let alice = server.access_token("alice").await;
    let post = server.create_post(&alice, "T", "C").await;
    let path = format!("/posts/{}", post["id"]);

    let me: Value = server.get("/users/me", Some(&alice)).await.json().await.unwrap();
    let expired = TokenSigner::new(SigningConfig::hs256(SECRET))
        .unwrap()
        .sign(&Claims {
            user_id: Id::new(me["id"].as_i64().unwrap()),
            exp: OffsetDateTime::now_utc().unix_timestamp() - 60,
        })
        .unwrap();

    let response = server
        .send(reqwest::Method::PUT, &path, None, &json!({ "title": "T2" }))
        .await;
    error_body(response, StatusCode::UNAUTHORIZED).await;

    let response = server
        .send(reqwest::Method::DELETE, &path, None, &json!({}))
        .await;
    error_body(response, StatusCode::UNAUTHORIZED).await;

    let response = server
        .send(
            reqwest::Method::PUT,
            &path,
            Some(&expired),
            &json!({ "title": "T2" }),
        )
        .await;
    let message = error_body(response, StatusCode::UNAUTHORIZED).await;
    assert!(message.contains("expired"), "{message}");

    let response = server
        .send(reqwest::Method::DELETE, &path, Some(&expired), &json!({}))
        .await;
    error_body(response, StatusCode::UNAUTHORIZED).await;

    let response = server.get("/users/me", Some(&expired)).await;
    let message = error_body(response, StatusCode::UNAUTHORIZED).await;
    assert!(message.contains("expired"), "{message}");

    let fetched: Value = server.get(&path, None).await.json().await.unwrap();
    assert_eq!(fetched, post);
}

#[tokio::test]
async fn registration_validates_and_rejects_duplicates() {
    let server = TestServer::spawn().await;
    let user = server.register("alice", "pw").await;
    assert_eq!(user["username"], "alice");
    assert_eq!(user["email"], "alice@example.com");
    assert!(user.get("password").is_none());
    assert!(user.get("password_hash").is_none());

    for body in [
        json!({ "username": "alice", "password": "pw", "email": "other@example.com" }),
        json!({ "username": "bob", "password": "pw", "email": "alice@example.com" }),
        json!({ "username": "bob", "password": "pw", "email": "not an email" }),
        json!({ "username": "", "password": "pw", "email": "bob@example.com" }),
    ] {
        let response = server.post("/users/register", None, &body).await;
        error_body(response, StatusCode::BAD_REQUEST).await;
    }
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let server = TestServer::spawn().await;
    server.register("alice", "pw").await;

    for (username, password) in [("alice", "wrong"), ("nobody", "pw")] {
        let response = server
            .post(
                "/users/login",
                None,
                &json!({ "username": username, "password": password }),
            )
            .await;
        error_body(response, StatusCode::UNAUTHORIZED).await;
    }
}

#[tokio::test]
async fn refresh_issues_new_tokens() {
    let server = TestServer::spawn().await;
    server.register("alice", "pw").await;
    let tokens = server.login("alice", "pw").await;

    let response = server
        .post(
            "/users/refresh",
            None,
            &json!({ "refresh": tokens["refresh"] }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let refreshed: Value = response.json().await.unwrap();

    let access = refreshed["access"].as_str().unwrap();
    let response = server.get("/users/me", Some(access)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(refreshed["refresh"].is_string());
}

#[tokio::test]
async fn refresh_rejects_expired_or_invalid_tokens() {
    let server = TestServer::spawn().await;
    let user = server.register("alice", "pw").await;
    let user_id = Id::new(user["id"].as_i64().unwrap());

    let expired = TokenSigner::new(SigningConfig::hs256(SECRET))
        .unwrap()
        .sign(&Claims {
            user_id,
            exp: OffsetDateTime::now_utc().unix_timestamp() - 60,
        })
        .unwrap();

    for refresh in [expired.as_str(), "garbage"] {
        let response = server
            .post("/users/refresh", None, &json!({ "refresh": refresh }))
            .await;
        error_body(response, StatusCode::BAD_REQUEST).await;
    }
}

#[tokio::test]
async fn me_returns_current_user() {
    let server = TestServer::spawn().await;
    let user = server.register("alice", "pw").await;
    let tokens = server.login("alice", "pw").await;
    let access = tokens["access"].as_str().unwrap();

    let response = server.get("/users/me", Some(access)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let me: Value = response.json().await.unwrap();
    assert_eq!(me, user);

    error_body(server.get("/users/me", None).await, StatusCode::UNAUTHORIZED).await;

    server.store.remove_user(Id::new(user["id"].as_i64().unwrap()));
    let response = server.get("/users/me", Some(access)).await;
    error_body(response, StatusCode::UNAUTHORIZED).await;
}
