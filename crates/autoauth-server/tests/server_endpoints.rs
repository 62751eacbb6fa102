use autoauth_server::{AppConfig, ClientConfig, build_app, build_auth_server};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

const REDIRECT: &str = "https://app.example.com/callback";
// BASE64URL(SHA256("verifier123"))
const CHALLENGE: &str = "Z_P4EKbGwIkA01e3Y5fp4tMCvn_Ae5nUw7qY7XwkTrQ";

async fn start_server() -> (String, tokio::sync::oneshot::Sender<()>, JoinHandle<()>) {
    let mut cfg = AppConfig::default();
    cfg.clients.push(ClientConfig {
        client_id: "c1".into(),
        name: None,
        redirect_uris: vec![REDIRECT.into()],
        allowed_scopes: Vec::new(),
        require_pkce: None,
        allow_plain_pkce: None,
    });
    let server = build_auth_server(&cfg).await.expect("build server");
    let app = build_app(&cfg, server);

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    (format!("http://{addr}"), tx, server)
}

#[tokio::test]
async fn oauth_endpoints_work() {
    let (base, shutdown_tx, handle) = start_server().await;
    let client = reqwest::Client::new();

    // GET /health
    let resp = client.get(format!("{base}/health")).send().await.unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    // POST /oauth/generate-code
    let resp = client
        .post(format!("{base}/oauth/generate-code"))
        .json(&json!({
            "user_id": "42",
            "client_id": "c1",
            "scope": "profile email",
            "redirect_uri": REDIRECT,
            "code_challenge": CHALLENGE,
            "code_challenge_method": "S256",
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    let code = body["code"].as_str().unwrap().to_string();
    assert_eq!(body["expires_in"], 600);

    // POST /oauth/validate-code
    let redeem = json!({
        "code": code,
        "client_id": "c1",
        "redirect_uri": REDIRECT,
        "code_verifier": "verifier123",
    });
    let resp = client
        .post(format!("{base}/oauth/validate-code"))
        .json(&redeem)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user_id"], "42");
    assert_eq!(body["scope"], json!(["profile", "email"]));

    // Replay is a 400
    let resp = client
        .post(format!("{base}/oauth/validate-code"))
        .json(&redeem)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    // POST /oauth/issue-tokens
    let resp = client
        .post(format!("{base}/oauth/issue-tokens"))
        .json(&json!({
            "user_id": "42",
            "client_id": "c1",
            "scope": ["profile", "email"],
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let pair: Value = resp.json().await.unwrap();
    assert_eq!(pair["token_type"], "Bearer");
    assert_eq!(pair["expires_in"], 3600);
    let access = pair["access_token"].as_str().unwrap().to_string();
    let refresh = pair["refresh_token"].as_str().unwrap().to_string();

    // POST /oauth/validate-token
    let resp = client
        .post(format!("{base}/oauth/validate-token"))
        .json(&json!({ "token": access }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["valid"], true);
    assert_eq!(body["user_id"], "42");
    assert_eq!(body["client_id"], "c1");

    // POST /oauth/refresh-tokens, then replay
    let refresh_body = json!({ "refresh_token": refresh, "client_id": "c1" });
    let resp = client
        .post(format!("{base}/oauth/refresh-tokens"))
        .json(&refresh_body)
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let resp = client
        .post(format!("{base}/oauth/refresh-tokens"))
        .json(&refresh_body)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "invalid_token");

    // POST /oauth/revoke-token
    let resp = client
        .post(format!("{base}/oauth/revoke-token"))
        .json(&json!({ "token": access }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Token revoked successfully");

    let resp = client
        .post(format!("{base}/oauth/validate-token"))
        .json(&json!({ "token": access }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["valid"], false);

    // GET /.well-known/jwks.json
    let resp = client
        .get(format!("{base}/.well-known/jwks.json"))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(
        resp.headers().get("cache-control").unwrap(),
        "public, max-age=3600"
    );
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["keys"][0]["alg"], "RS256");

    // shutdown
    let _ = shutdown_tx.send(());
    let _ = handle.await;
}
