use discord_twitch_live::config::Config;
use discord_twitch_live::discord::DiscordNotifier;
use discord_twitch_live::store::CouchDbStore;
use discord_twitch_live::twitch::{SharedToken, TokenGuard, TwitchClient};
use discord_twitch_live::{health, scheduler};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env()?;

    let http = reqwest::ClientBuilder::new()
        // Following redirects opens the client up to SSRF vulnerabilities.
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("building reqwest client should not fail");

    // The one mutable bearer credential: the guard refreshes it, every Helix
    // call in the same cycle reads it.
    let token = SharedToken::new(config.twitch_token.clone());
    let api = TwitchClient::new(http.clone(), config.twitch_client_id.clone(), token.clone());
    let gate = TokenGuard::new(
        http.clone(),
        config.twitch_client_id,
        config.twitch_client_secret,
        token,
    );
    let store = CouchDbStore::new(http.clone(), config.couchdb_url, config.couchdb_database);
    let notifier = DiscordNotifier::new(http, config.discord_token);

    let health_addr = config.health_addr;
    tokio::spawn(async move {
        if let Err(e) = health::serve(health_addr).await {
            tracing::error!(error = %e, "health endpoint failed");
        }
    });

    tracing::info!(
        interval_secs = config.poll_interval.as_secs(),
        "starting reconciliation scheduler"
    );
    scheduler::run(gate, store, api, notifier, config.poll_interval).await;

    Ok(())
}
