//! Voice client entry point
//!
//! Connects the default microphone and speakers to the configured realtime
//! deployment and prints transcripts until interrupted.

use futures::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voice_client::RealtimeClient;
use voice_client_config::load_settings;

#[tokio::main]
async fn main() {
    let settings = match load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized, use eprintln for early logging
            eprintln!("Configuration error: {}", e);
            eprintln!(
                "Set AZURE_OPENAI_ENDPOINT, AZURE_OPENAI_DEPLOYMENT, AZURE_OPENAI_API_KEY \
                 and AZURE_OPENAI_REGION, or provide config/default.yaml."
            );
            std::process::exit(2);
        },
    };

    init_tracing();
    tracing::info!("Starting voice client v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        endpoint = %settings.endpoint,
        deployment = %settings.deployment,
        voice = %settings.voice,
        "Configuration loaded"
    );

    let mut client = RealtimeClient::new(settings);
    if let Err(e) = client.connect().await {
        tracing::error!("Failed to connect: {}", e);
        client.close().await;
        std::process::exit(1);
    }
    tracing::info!(session_id = ?client.session_id(), "Connected; speak into the microphone");

    let transcripts = client.transcripts();
    tokio::pin!(transcripts);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = transcripts.next() => {
                match line {
                    Some(text) => println!("{}", text),
                    None => {
                        tracing::info!("Transcript stream ended");
                        break;
                    },
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutting down...");
                break;
            }
        }
    }

    client.close().await;
    tracing::info!(state = ?client.state(), "Session closed");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "voice_client=info,webrtc=warn".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
