use care_server::{Server, ServerState, print_banner, setup_environment};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Environment (dotenv, work dir, logging)
    let config = setup_environment()?;

    print_banner();
    tracing::info!("Care server starting...");

    // 2. Open storage and wire services
    let state = ServerState::initialize(&config)?;

    // 3. Serve (Server::run starts the background tasks)
    let server = Server::with_state(config, state);
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
