//! Serve command handler.

use crate::server::{self, AppState};
use clap::Args;
use rmp_core::{config::AppConfig, AppResult};
use rmp_knowledge::RagOrchestrator;

/// Run the HTTP chat service
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to listen on (overrides server.bind)
    #[arg(short, long)]
    pub bind: Option<String>,
}

impl ServeCommand {
    /// Execute the serve command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let bind = self.bind.as_deref().unwrap_or(&config.server.bind);

        let rag = RagOrchestrator::from_config(config).await?;
        tracing::info!(
            model = %rag.options().model,
            top_k = rag.options().top_k,
            "Chat pipeline ready"
        );

        let app = server::router(AppState::new(rag));
        let listener = tokio::net::TcpListener::bind(bind).await?;
        tracing::info!("Listening on http://{}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
