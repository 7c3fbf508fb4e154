/*
 * Responsibility
 * - Config読み込み → 依存生成 (store / id codec / token verifier) → Router 組み立て
 * - Middleware の適用順をここで決める (内側から security headers → http → CORS)
 * - axum::serve() で起動、Ctrl-C / SIGTERM で graceful shutdown
 */
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::api::v1::handlers::health::health;
use crate::config::Config;
use crate::middleware;
use crate::repos::memo::{InMemoryMemoStore, MemoStore, PgMemoStore};
use crate::services::{auth::build_token_verifier, id_codec::IdCodec};
use crate::state::AppState;

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,memo_api=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // stderr can be hidden depending on how the process is launched
        tracing::error!(?info, "panic");

        // development: crash the whole process so we notice immediately
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env().context("invalid configuration")?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting memo API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn build_state(config: &Config) -> Result<AppState> {
    let store: Arc<dyn MemoStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .context("failed to connect to database")?;
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("failed to run migrations")?;
            Arc::new(PgMemoStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL is not set; memos are kept in memory and lost on restart");
            Arc::new(InMemoryMemoStore::new())
        }
    };
    tracing::info!(backend = store.backend_name(), "memo store ready");

    let id_codec = IdCodec::new(config.sqids_min_length, &config.sqids_alphabet)
        .context("invalid SQIDS settings")?;
    let verifier = build_token_verifier(&config.auth).context("failed to build token verifier")?;

    Ok(AppState::new(store, id_codec, verifier))
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api::v1::routes(state.clone()))
        .with_state(state);

    let router = middleware::security_headers::apply(router);
    let router = middleware::http::apply(router);
    // outermost: rejections from every inner layer still get CORS headers
    middleware::cors::apply(router, config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        response::Response,
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::test_support::{StaticJwks, TEST_ISSUER, TestApp, TestTokens};

    fn test_config() -> Config {
        Config::from_lookup(|key| (key == "AUTH_ISSUER").then(|| TEST_ISSUER.to_string()))
            .unwrap()
    }

    fn router(app: &TestApp) -> Router {
        build_router(app.state.clone(), &test_config())
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(router: &Router, req: Request<Body>) -> Response {
        router.clone().oneshot(req).await.unwrap()
    }

    async fn body_json(res: Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create(router: &Router, token: &str, title: &str) -> Value {
        let res = send(
            router,
            request(
                "POST",
                "/api/v1/memos",
                Some(token),
                Some(json!({ "title": title, "body": "body" })),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        body_json(res).await
    }

    #[tokio::test]
    async fn health_is_not_gated() {
        let app = TestApp::new();
        let router = router(&app);

        for uri in ["/health", "/api/v1/health"] {
            let res = send(&router, request("GET", uri, None, None)).await;
            assert_eq!(res.status(), StatusCode::OK, "{uri}");
            assert_eq!(body_json(res).await, json!({ "status": "ok" }));
        }
    }

    #[tokio::test]
    async fn missing_token_never_reaches_the_handler() {
        let app = TestApp::new();
        let router = router(&app);

        let res = send(
            &router,
            request("POST", "/api/v1/memos", None, Some(json!({ "title": "t" }))),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Bearer");
        assert_eq!(body_json(res).await, json!({ "error": "Unauthorized" }));

        // nothing was written
        assert!(app.state.store.list("user-a").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn garbage_token_is_rejected_without_fetching_keys() {
        let app = TestApp::new();
        let router = router(&app);

        let res = send(&router, request("GET", "/api/v1/memos", Some("not-a-token"), None)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(app.jwks.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn every_auth_failure_looks_the_same() {
        let app = TestApp::new();
        let router = router(&app);

        let expired = TestTokens::new(&app.clock).ttl_seconds(-10).sign();
        let wrong_issuer = TestTokens::new(&app.clock).issuer("https://evil.test").sign();
        let hs256 = TestTokens::new(&app.clock).hs256("secret");

        let mut bodies = Vec::new();
        let tokens = [
            None,
            Some("not-a-token"),
            Some(expired.as_str()),
            Some(wrong_issuer.as_str()),
            Some(hs256.as_str()),
        ];
        for token in tokens {
            let res = send(&router, request("GET", "/api/v1/memos", token, None)).await;
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
            bodies.push(body_json(res).await);
        }
        assert!(bodies.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn create_then_get_returns_the_memo() {
        let app = TestApp::new();
        let router = router(&app);
        let token = app.token_for("alice");

        let created = create(&router, &token, "groceries").await;
        let id = created["id"].as_str().unwrap();
        assert!(created.get("owner_id").is_none());

        let res = send(
            &router,
            request("GET", &format!("/api/v1/memos/{id}"), Some(&token), None),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await, created);
    }

    #[tokio::test]
    async fn list_only_shows_own_memos() {
        let app = TestApp::new();
        let router = router(&app);
        let alice = app.token_for("alice");
        let bob = app.token_for("bob");

        let a1 = create(&router, &alice, "a1").await;
        create(&router, &bob, "b1").await;
        let a2 = create(&router, &alice, "a2").await;

        let res = send(&router, request("GET", "/api/v1/memos", Some(&alice), None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await, json!([a1, a2]));
    }

    #[tokio::test]
    async fn other_users_memo_is_indistinguishable_from_missing() {
        let app = TestApp::new();
        let router = router(&app);
        let alice = app.token_for("alice");
        let bob = app.token_for("bob");

        let memo = create(&router, &alice, "private").await;
        let id = memo["id"].as_str().unwrap();
        let missing = app.state.id_codec.encode(9_999).unwrap();

        let foreign = send(
            &router,
            request("GET", &format!("/api/v1/memos/{id}"), Some(&bob), None),
        )
        .await;
        let absent = send(
            &router,
            request("GET", &format!("/api/v1/memos/{missing}"), Some(&bob), None),
        )
        .await;
        assert_eq!(foreign.status(), StatusCode::NOT_FOUND);
        assert_eq!(absent.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(foreign).await, body_json(absent).await);

        let uri = format!("/api/v1/memos/{id}");
        let patch = send(
            &router,
            request("PATCH", &uri, Some(&bob), Some(json!({ "title": "mine" }))),
        )
        .await;
        assert_eq!(patch.status(), StatusCode::NOT_FOUND);
        let delete = send(&router, request("DELETE", &uri, Some(&bob), None)).await;
        assert_eq!(delete.status(), StatusCode::NOT_FOUND);

        // untouched for the owner
        let res = send(&router, request("GET", &uri, Some(&alice), None)).await;
        assert_eq!(body_json(res).await, memo);
    }

    #[tokio::test]
    async fn replace_patch_and_delete() {
        let app = TestApp::new();
        let router = router(&app);
        let token = app.token_for("alice");

        let memo = create(&router, &token, "draft").await;
        let uri = format!("/api/v1/memos/{}", memo["id"].as_str().unwrap());

        let res = send(
            &router,
            request("PATCH", &uri, Some(&token), Some(json!({ "body": "edited" }))),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let patched = body_json(res).await;
        assert_eq!(patched["title"], "draft");
        assert_eq!(patched["body"], "edited");

        let res = send(
            &router,
            request("PUT", &uri, Some(&token), Some(json!({ "title": "final" }))),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let replaced = body_json(res).await;
        assert_eq!(replaced["title"], "final");
        assert_eq!(replaced["body"], "");

        let res = send(&router, request("DELETE", &uri, Some(&token), None)).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let res = send(&router, request("GET", &uri, Some(&token), None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn token_expiring_mid_session_is_rejected() {
        let app = TestApp::new();
        let router = router(&app);
        let token = TestTokens::new(&app.clock).subject("alice").ttl_seconds(60).sign();

        let res = send(&router, request("GET", "/api/v1/memos", Some(&token), None)).await;
        assert_eq!(res.status(), StatusCode::OK);

        app.clock.advance(chrono::Duration::seconds(61));
        let res = send(&router, request("GET", "/api/v1/memos", Some(&token), None)).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_input_is_bad_request() {
        let app = TestApp::new();
        let router = router(&app);
        let token = app.token_for("alice");

        let res = send(
            &router,
            request("POST", "/api/v1/memos", Some(&token), Some(json!({ "title": "  " }))),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(res).await,
            json!({ "error": "BadRequest", "message": "title cannot be empty" })
        );

        let res = send(
            &router,
            Request::builder()
                .method("POST")
                .uri("/api/v1/memos")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(res).await["error"], "BadRequest");

        let res = send(&router, request("GET", "/api/v1/memos/!!", Some(&token), None)).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(res).await,
            json!({ "error": "BadRequest", "message": "invalid memo id" })
        );

        assert!(app.state.store.list("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn me_echoes_the_verified_identity() {
        let app = TestApp::new();
        let router = router(&app);
        let token = TestTokens::new(&app.clock)
            .subject("alice")
            .email("alice@example.com")
            .sign();

        let res = send(&router, request("GET", "/api/v1/me", Some(&token), None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let me = body_json(res).await;
        assert_eq!(me["subject_id"], "alice");
        assert_eq!(me["email"], "alice@example.com");
        assert_eq!(me["issuer"], TEST_ISSUER);
    }

    #[tokio::test]
    async fn key_outage_is_service_unavailable() {
        let app = TestApp::with_jwks(StaticJwks::primary().failing(2));
        let router = router(&app);
        let token = app.token_for("alice");

        let res = send(&router, request("GET", "/api/v1/memos", Some(&token), None)).await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body_json(res).await, json!({ "error": "ServiceUnavailable" }));
    }

    #[tokio::test]
    async fn rejections_carry_cors_request_id_and_security_headers() {
        let app = TestApp::new();
        let router = router(&app);

        let res = send(
            &router,
            Request::builder()
                .method("GET")
                .uri("/api/v1/memos")
                .header(header::ORIGIN, "https://app.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(res.headers().contains_key("x-request-id"));
        assert_eq!(res.headers()["x-content-type-options"], "nosniff");
        assert_eq!(res.headers()[header::CACHE_CONTROL], "no-store");
    }
}
