use std::net::SocketAddr;
use std::sync::Arc;

use auth::TokenCodec;
use identity_service::config::Config;
use identity_service::domain::identity::service::AuthService;
use identity_service::inbound::http::csrf::CsrfState;
use identity_service::inbound::http::rate_limit::RateLimiter;
use identity_service::inbound::http::router::create_router;
use identity_service::inbound::http::router::AppState;
use identity_service::outbound::repositories::PostgresUserRepository;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "identity-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    tracing::info!(
        http_port = config.server.http_port,
        jwt_issuer = %config.jwt.issuer,
        access_token_minutes = config.jwt.access_token_minutes,
        refresh_token_days = config.jwt.refresh_token_days,
        "Configuration loaded"
    );

    let pg_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database.url)
        .await?;
    tracing::info!(
        max_connections = 5,
        database = "postgresql",
        "Database connection pool created"
    );

    sqlx::migrate!("./migrations").run(&pg_pool).await?;
    tracing::info!(database = "postgresql", "Database migrations completed");

    let codec = Arc::new(TokenCodec::new(
        config.jwt.secret.as_bytes(),
        &config.jwt.issuer,
        &config.jwt.audience,
        config.jwt.access_token_minutes,
    ));
    let repository = Arc::new(PostgresUserRepository::new(pg_pool));
    let auth_service = Arc::new(AuthService::new(
        repository,
        TokenCodec::new(
            config.jwt.secret.as_bytes(),
            &config.jwt.issuer,
            &config.jwt.audience,
            config.jwt.access_token_minutes,
        ),
        config.password.clone(),
        config.jwt.refresh_token_days,
    ));

    let state = AppState {
        auth_service,
        codec,
        csrf: CsrfState::new(),
        rate_limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
        refresh_token_days: config.jwt.refresh_token_days,
        secure_cookies: config.server.secure_cookies,
    };

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let http_application = create_router(state);
    axum::serve(
        http_listener,
        http_application.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
