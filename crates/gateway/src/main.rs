//! Quote Table API Gateway
//!
//! The HTTP entry point for the quote catalogue.
//! Handles:
//! - Session cookies and request-scoped authentication
//! - Rate limiting
//! - Request routing to the repositories
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use quotetable_common::{
    auth::PasswordHasher,
    config::{ObservabilityConfig, SessionBackend},
    db::{self, Store},
    metrics as app_metrics,
    session::{MemorySessionStore, RedisSessionStore, SessionStore},
    AppConfig, RepoSettings, Repositories,
};
use std::future::IntoFuture;
use std::sync::Arc;
use tokio::{signal, sync::Notify};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Store,
    pub repos: Repositories,
    pub sessions: Arc<dyn SessionStore>,
    pub metrics: Option<PrometheusHandle>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;
    let config = Arc::new(config);

    init_tracing(&config.observability);
    info!(
        service = %config.observability.service_name,
        "Starting Quote Table gateway v{}",
        quotetable_common::VERSION
    );

    // Initialize metrics
    let prometheus = PrometheusBuilder::new()
        .set_buckets(app_metrics::LATENCY_BUCKETS)?
        .install_recorder()?;
    app_metrics::register_metrics();

    // Table store and repositories
    let store = db::connect(&config.store)?;
    let hasher = PasswordHasher::new(config.bcrypt_cost())?;
    let repos = Repositories::new(store.clone(), hasher, RepoSettings::from_config(&config.store));

    // Session backend
    let sessions: Arc<dyn SessionStore> = match config.session.backend {
        SessionBackend::Memory => {
            warn!("Using in-memory sessions, logins are lost on restart");
            Arc::new(MemorySessionStore::new())
        }
        SessionBackend::Redis => {
            info!("Connecting to Redis session store...");
            let redis = RedisSessionStore::new(&config.session.redis_url).await?;
            redis.ping().await?;
            Arc::new(redis)
        }
    };

    let state = AppState {
        config: config.clone(),
        store,
        repos,
        sessions,
        metrics: Some(prometheus),
    };

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    // in-flight requests get `shutdown_timeout` to finish after the signal
    let draining = Arc::new(Notify::new());
    let server = axum::serve(listener, app)
        .with_graceful_shutdown({
            let draining = draining.clone();
            async move {
                shutdown_signal().await;
                draining.notify_one();
            }
        })
        .into_future();
    tokio::pin!(server);

    let deadline = config.shutdown_timeout();
    tokio::select! {
        result = &mut server => result?,
        _ = async {
            draining.notified().await;
            tokio::time::sleep(deadline).await;
        } => warn!(timeout = ?deadline, "Graceful shutdown timed out, dropping open connections"),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over the configured level
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if config.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

const CONTENT_SECURITY_POLICY: &str =
    "default-src 'self'; style-src 'self' fonts.googleapis.com; font-src fonts.gstatic.com";

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    use handlers::{authors, books, health, quotes, users};

    let public_routes = Router::new()
        .route("/", get(quotes::latest))
        .route("/quotes/{id}", get(quotes::view))
        .route("/authors", get(authors::list))
        .route("/authors/{id}", get(authors::view))
        .route("/books", get(books::list))
        .route("/books/{id}", get(books::view))
        .route("/users/{slug}", get(users::profile))
        .route("/users/{slug}/quotes", get(quotes::by_user))
        .route("/user/signup", post(users::signup))
        .route("/user/login", post(users::login));

    let protected_routes = Router::new()
        .route("/quotes", post(quotes::create))
        .route("/quotes/{id}", put(quotes::edit).delete(quotes::delete))
        .route("/authors", post(authors::create))
        .route("/books", post(books::create))
        .route("/books/{id}", put(books::edit).delete(books::delete))
        .route("/user/logout", post(users::logout))
        .route("/account", get(users::account))
        .route("/account/profile", put(users::update_profile))
        .route("/account/password", put(users::change_password))
        .route_layer(from_fn(middleware::auth::require_authentication));

    let app_routes = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .route_layer(from_fn(middleware::metrics::track_metrics))
        .layer(from_fn_with_state(state.clone(), middleware::auth::authenticate))
        .layer(from_fn_with_state(state.clone(), middleware::session::load_session));

    let app_routes = if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::RateLimitState::from_config(&state.config.rate_limit);
        app_routes.layer(from_fn_with_state(limiter, middleware::rate_limit::rate_limit_middleware))
    } else {
        app_routes
    };

    // Probes bypass sessions and rate limiting
    let probe_routes = Router::new()
        .route("/ping", get(health::ping))
        .route("/healthcheck", get(health::healthcheck))
        .route("/metrics", get(health::metrics));

    let request_timeout = state.config.request_timeout();

    Router::new()
        .merge(probe_routes)
        .merge(app_routes)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(SetResponseHeaderLayer::overriding(
                    header::CONTENT_SECURITY_POLICY,
                    HeaderValue::from_static(CONTENT_SECURITY_POLICY),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::REFERRER_POLICY,
                    HeaderValue::from_static("origin-when-cross-origin"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("deny"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_XSS_PROTECTION,
                    HeaderValue::from_static("0"),
                ))
                .layer(CatchPanicLayer::new())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
    };
    use quotetable_common::store::MemoryStore;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_app() -> Router {
        let mut config = AppConfig::default();
        config.rate_limit.enabled = false;
        config.session.secure_cookie = false;

        let store: Store = Arc::new(MemoryStore::new());
        let hasher = PasswordHasher::new(4).unwrap();
        let repos = Repositories::new(store.clone(), hasher, RepoSettings::default());

        create_router(AppState {
            config: Arc::new(config),
            store,
            repos,
            sessions: Arc::new(MemorySessionStore::new()),
            metrics: None,
        })
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// `name=token` part of the response's session cookie
    fn cookie_of(response: &Response) -> String {
        let value = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie")
            .to_str()
            .unwrap();
        value.split(';').next().unwrap().to_string()
    }

    /// Sign up and log in, returning the authenticated cookie
    async fn login_as(app: &Router, name: &str, email: &str) -> String {
        let response = send(
            app,
            "POST",
            "/user/signup",
            None,
            Some(json!({"name": name, "email": email, "password": "password123"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = send(
            app,
            "POST",
            "/user/login",
            None,
            Some(json!({"email": email, "password": "password123"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        cookie_of(&response)
    }

    fn new_quote() -> Value {
        json!({
            "quote": "The secret of getting ahead is getting started.",
            "author_selector": "",
            "new_author_name": "Mark Twain",
            "book_selector": "",
            "new_book_title": "Following the Equator",
            "new_book_publish_year": 1897,
            "new_book_calendar_time": "A.D.",
            "new_book_isbn": "9780486419466",
            "page_number": "12"
        })
    }

    #[tokio::test]
    async fn test_ping() {
        let app = test_app();
        let response = send(&app, "GET", "/ping", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");

        let response = send(&app, "GET", "/healthcheck", None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["checks"]["store"]["status"], "up");
    }

    #[tokio::test]
    async fn test_security_headers_on_every_response() {
        let app = test_app();
        for uri in ["/ping", "/", "/quotes/999", "/account"] {
            let response = send(&app, "GET", uri, None, None).await;
            let headers = response.headers();
            assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff", "{uri}");
            assert_eq!(headers[header::X_FRAME_OPTIONS], "deny", "{uri}");
            assert_eq!(headers[header::CONTENT_SECURITY_POLICY], CONTENT_SECURITY_POLICY);
            assert_eq!(headers[header::REFERRER_POLICY], "origin-when-cross-origin");
        }
    }

    #[tokio::test]
    async fn test_protected_routes_need_login() {
        let app = test_app();
        let response = send(&app, "POST", "/quotes", None, Some(new_quote())).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_create_quote_then_list() {
        let app = test_app();
        let cookie = login_as(&app, "Ada Lovelace", "ada@example.com").await;

        let response = send(&app, "POST", "/quotes", Some(&cookie), Some(new_quote())).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        let id = json_body(response).await["id"].as_str().unwrap().to_string();

        // flash is shown once
        let page = json_body(send(&app, "GET", "/", Some(&cookie), None).await).await;
        assert_eq!(page["flash"], "Quote successfully created!");
        assert_eq!(page["is_authenticated"], true);
        assert_eq!(page["data"][0]["author"]["name"], "Mark Twain");
        assert_eq!(page["data"][0]["book"]["title"], "Following the Equator");

        let page = json_body(send(&app, "GET", "/", Some(&cookie), None).await).await;
        assert!(page.get("flash").is_none());

        let page = json_body(send(&app, "GET", &format!("/quotes/{id}"), None, None).await).await;
        assert_eq!(page["is_authenticated"], false);
        assert_eq!(page["data"]["page_number"], "12");

        let response = send(&app, "GET", "/users/ada-lovelace/quotes", None, None).await;
        let page = json_body(response).await;
        assert_eq!(page["data"].as_array().unwrap().len(), 1);

        let page = json_body(send(&app, "GET", "/authors", None, None).await).await;
        assert_eq!(page["data"][0]["quote_count"], 1);
        assert_eq!(page["data"][0]["book_count"], 1);
    }

    #[tokio::test]
    async fn test_invalid_quote_reports_fields() {
        let app = test_app();
        let cookie = login_as(&app, "Ada Lovelace", "ada@example.com").await;

        let mut form = new_quote();
        form["quote"] = json!("");
        form["new_book_isbn"] = json!("123");
        let response = send(&app, "POST", "/quotes", Some(&cookie), Some(form)).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = json_body(response).await;
        assert_eq!(body["error"]["field_errors"]["quote"], "The quote field cannot be blank.");
        assert!(body["error"]["field_errors"].get("isbn").is_some());
    }

    #[tokio::test]
    async fn test_bad_login_is_a_form_error() {
        let app = test_app();
        login_as(&app, "Ada Lovelace", "ada@example.com").await;

        for email in ["ada@example.com", "nobody@example.com"] {
            let response = send(
                &app,
                "POST",
                "/user/login",
                None,
                Some(json!({"email": email, "password": "wrong-password"})),
            )
            .await;
            assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
            assert!(response.headers().get(header::SET_COOKIE).is_none());
            let body = json_body(response).await;
            assert_eq!(
                body["error"]["non_field_errors"][0],
                "Authentication failed. Please check your credentials and try again."
            );
        }
    }

    #[tokio::test]
    async fn test_duplicate_signup_is_a_field_error() {
        let app = test_app();
        login_as(&app, "Ada Lovelace", "ada@example.com").await;

        let response = send(
            &app,
            "POST",
            "/user/signup",
            None,
            Some(json!({
                "name": "Ada Again",
                "email": "ada@example.com",
                "password": "password123"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            json_body(response).await["error"]["field_errors"]["email"],
            "Email address is already in use"
        );
    }

    #[tokio::test]
    async fn test_only_owner_may_edit_or_delete() {
        let app = test_app();
        let ada = login_as(&app, "Ada Lovelace", "ada@example.com").await;
        let grace = login_as(&app, "Grace Hopper", "grace@example.com").await;

        let response = send(&app, "POST", "/quotes", Some(&ada), Some(new_quote())).await;
        let id = json_body(response).await["id"].as_str().unwrap().to_string();
        let uri = format!("/quotes/{id}");

        let response = send(&app, "DELETE", &uri, Some(&grace), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let mut form = new_quote();
        form["author_selector"] = json!("1");
        form["book_selector"] = json!("1");
        form["is_private"] = json!(true);
        let response = send(&app, "PUT", &uri, Some(&ada), Some(form)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, "DELETE", &uri, Some(&ada), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = send(&app, "GET", &uri, None, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_logout_retires_the_token() {
        let app = test_app();
        let cookie = login_as(&app, "Ada Lovelace", "ada@example.com").await;

        let response = send(&app, "POST", "/user/logout", Some(&cookie), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let fresh = cookie_of(&response);
        assert_ne!(fresh, cookie);

        // the old token is gone, the new one is anonymous
        for cookie in [cookie, fresh] {
            let response = send(&app, "GET", "/account", Some(&cookie), None).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn test_change_password_checks_current() {
        let app = test_app();
        let cookie = login_as(&app, "Ada Lovelace", "ada@example.com").await;

        let response = send(
            &app,
            "PUT",
            "/account/password",
            Some(&cookie),
            Some(json!({
                "currentPassword": "not-my-password",
                "newPassword": "newpass123",
                "confirmPassword": "newpass123"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            json_body(response).await["error"]["field_errors"]["currentPassword"],
            "Current password is incorrect"
        );

        let response = send(
            &app,
            "PUT",
            "/account/password",
            Some(&cookie),
            Some(json!({
                "currentPassword": "password123",
                "newPassword": "newpass123",
                "confirmPassword": "newpass123"
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            &app,
            "POST",
            "/user/login",
            None,
            Some(json!({"email": "ada@example.com", "password": "newpass123"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_profile_by_slug() {
        let app = test_app();
        let cookie = login_as(&app, "Ada Lovelace", "ada@example.com").await;

        let response = send(
            &app,
            "PUT",
            "/account/profile",
            Some(&cookie),
            Some(json!({"name": "Ada King", "email": "ada@example.com", "phone": "555-123-4567"})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let page = json_body(send(&app, "GET", "/users/ada-king", None, None).await).await;
        assert_eq!(page["data"]["user"]["name"], "Ada King");
        assert_eq!(page["data"]["user"]["phone"], "555-123-4567");
        assert!(page["data"]["user"].get("hashed_password").is_none());

        let response = send(&app, "GET", "/users/nobody", None, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
