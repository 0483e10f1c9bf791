use std::net::SocketAddr;

use clap::Parser;
use mini_proxy::mock_backend::{self, Service};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "mock-backend")]
#[command(about = "Mock backend service for exercising the proxy", long_about = None)]
struct Cli {
    #[arg(short, long, default_value_t = 4199)]
    port: u16,

    #[arg(short, long, value_enum, default_value_t = Service::Echo)]
    service: Service,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mock_backend=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, service = ?cli.service, "Mock backend listening");

    let app = mock_backend::router(cli.service).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).await?;
    Ok(())
}
