use std::sync::Arc;

use anyhow::{Context, Result};

use spotiscreen::font::{TrueTypeFace, Typeface};
use spotiscreen::snapshot::HttpFetcher;
use spotiscreen::spotify::SpotifyClient;
use spotiscreen::ticker::SystemClock;
use spotiscreen::{device, Config, PlaybackSource, Runner, Shutdown};

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_dir = spotiscreen::config::config_dir()?;
    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;
    let config_file = config_dir.join("config.json");
    let token_file = config_dir.join("token.json");
    let frame_file = config_dir.join("simulated.png");

    let mut config = Config::load(&config_file);
    {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        config.prompt_missing(&mut stdin.lock(), &mut stdout)?;
    }
    config.save(&config_file)?;
    log::info!(
        "Using Spotify app {} (authorize token.json with redirect URI {})",
        config.client_id,
        config.redirect_uri
    );

    let face: Arc<dyn Typeface> = Arc::new(TrueTypeFace::load(&config.font)?);

    // Make one call up front so token problems show up before the display
    // is reset.
    let mut spotify = SpotifyClient::new(&config.client_id, token_file)?;
    spotify
        .current_playback()
        .context("Initial playback query failed")?;

    let shutdown = Shutdown::new();
    let shutdown_for_signal = shutdown.clone();
    ctrlc::set_handler(move || {
        log::info!("Received interrupt signal, shutting down...");
        shutdown_for_signal.request();
    })
    .context("Failed to set signal handler")?;

    let simulated = config.simulated;
    let open_device = Box::new(move || device::open(simulated, frame_file.clone()));

    let mut runner = Runner::new(
        &config,
        spotify,
        HttpFetcher::new()?,
        open_device,
        face,
        SystemClock,
        shutdown,
    );
    runner.run();

    Ok(())
}
