use anyhow::{Context, Result};
use ifcmeta_server::ServerConfig;

/// Bind `host:port` and serve until ctrl-c.
pub fn run(host: &str, port: u16, config: ServerConfig) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let addr = format!("{host}:{port}");

    rt.block_on(async move {
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let actual = listener.local_addr()?;
        println!("IFC service → http://{actual}");

        ifcmeta_server::serve_on(config, listener, shutdown_signal()).await
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
