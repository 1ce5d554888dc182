use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    match std::env::var("ROADIE_MOCK_TOKEN").ok().filter(|t| !t.is_empty()) {
        Some(token) => {
            tracing::info!(%addr, "listening (bearer token required)");
            mock_server::run_with_token(listener, token).await
        }
        None => {
            tracing::info!(%addr, "listening");
            mock_server::run(listener).await
        }
    }
}
