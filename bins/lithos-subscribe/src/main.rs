use lithos_config::{Endpoint, SubscriberConfig, load_toml};
use lithos_events::Topic;
use lithos_pubsub::{Subscriber, SubscriberState};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("INFO")))
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "/etc/lithos/subscribe.toml".to_string());
    let config: SubscriberConfig = load_toml(config_path)?;

    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(run(config))?;
    Ok(())
}

async fn run(config: SubscriberConfig) -> Result<(), Box<dyn std::error::Error>> {
    let client_id = std::process::id();
    let reconnect_delay = std::time::Duration::from_millis(config.reconnect_delay_ms);

    match config.connect {
        Endpoint::Tcp { .. } => {
            let subscriber = loop {
                match Subscriber::connect_tcp(&config, client_id).await {
                    Ok(s) => break s,
                    Err(e) => {
                        warn!(%e, "connect failed, retrying");
                        tokio::time::sleep(reconnect_delay).await;
                    }
                }
            };
            pump(subscriber, &config).await
        }
        Endpoint::Unix { .. } => {
            let subscriber = loop {
                match Subscriber::connect_unix(&config, client_id).await {
                    Ok(s) => break s,
                    Err(e) => {
                        warn!(%e, "connect failed, retrying");
                        tokio::time::sleep(reconnect_delay).await;
                    }
                }
            };
            pump(subscriber, &config).await
        }
    }
}

async fn pump<S: AsyncRead + AsyncWrite + Unpin>(
    mut subscriber: Subscriber<S>,
    config: &SubscriberConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(client = %config.client_name, state = ?subscriber.state(), "subscribed");

    loop {
        let (header, data) = subscriber.next_message().await?;
        let topic_name = match Topic::from_u32(header.topic) {
            Some(Topic::Topic1) => "topic1",
            Some(Topic::Topic2) => "topic2",
            Some(Topic::Misc) => "misc",
            Some(Topic::All) => "all",
            None => "unknown",
        };
        if subscriber.state() == SubscriberState::Online {
            info!(topic = topic_name, global_seq = header.global_seq, bytes = data.len(), "message");
        }
    }
}
