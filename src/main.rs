use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plume::app::session::{self, demo_gateway, DEMO_POST_ID};
use plume::config::{AppMode, ClientConfig};
use plume::infra::http_gateway::HttpGateway;
use plume::{SyncGateway, ThreadStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = ClientConfig::from_env()?;

    if config.app_mode == AppMode::Feed {
        let gateway = HttpGateway::from_config(&config)?;
        let posts = gateway.list_posts().await?;
        println!("{}", serde_json::to_string_pretty(&posts)?);
        return Ok(());
    }

    let (gateway, post_id): (Arc<dyn SyncGateway>, String) = match config.app_mode {
        AppMode::Demo => (Arc::new(demo_gateway()), DEMO_POST_ID.to_string()),
        _ => {
            let post_id = config
                .post_id
                .clone()
                .ok_or_else(|| anyhow!("APP_MODE={:?} needs a POST_ID", config.app_mode))?;
            (Arc::new(HttpGateway::from_config(&config)?), post_id)
        }
    };

    let store = ThreadStore::new(gateway, config.limits.clone());
    let thread = session::run(&store, &post_id, &config).await?;
    println!("{}", serde_json::to_string_pretty(&thread)?);
    Ok(())
}
