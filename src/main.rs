use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

mod attractions;
mod cli;
mod config;
mod extract;
mod itinerary;
mod retrieval;
mod weather;

use attractions::{AttractionsClient, CachedAttractionSource};
use config::Config;
use extract::TripRequest;
use itinerary::Itinerary;
use retrieval::{
    EmbeddingProvider, IndexStorage, OfflineEmbedder, OpenAiEmbedder, RetrievalService,
};
use weather::WeatherClient;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = cli::Args::parse();
    let config = Config::load_with(&args.data_dir);

    match args.command {
        cli::Command::Plan { request } => {
            let parsed = TripRequest::extract(&request, chrono::Utc::now().date_naive());
            let Some(destination) = parsed.destination.clone() else {
                bail!("could not find a destination city in the request; try \"... to <City> ...\"");
            };

            let attractions = fetch_attractions(&config, &destination);
            let weather = weather_client(&config)
                .and_then(|client| client.current_weather(&destination));

            let service = build_retrieval(&config)?;
            let ranked = service.search(&request, &destination, config.attraction_limit);

            // Before the first index build finishes, fall back to the raw
            // fetch order
            let plan_attractions = if ranked.is_empty() { attractions } else { ranked };

            let itinerary = Itinerary::build(destination, parsed, weather, plan_attractions);
            println!("{}", itinerary.render());
        }

        cli::Command::Search { query, city, top_k } => {
            if top_k < 1 {
                bail!("--top-k must be at least 1");
            }
            let service = build_retrieval(&config)?;
            let results = service.search(&query, &city, top_k);
            println!("{}", serde_json::to_string_pretty(&results)?);
        }

        cli::Command::BuildIndex {} => {
            let service = build_retrieval(&config)?;
            match service.ensure_index_built() {
                Some(handle) => {
                    handle
                        .join()
                        .map_err(|_| anyhow::anyhow!("index build thread panicked"))?;
                    println!("index rebuilt");
                }
                None => println!("index already up to date (or no attractions cached)"),
            }
        }

        cli::Command::Attractions { city } => {
            let records = fetch_attractions(&config, &city);
            if records.is_empty() {
                bail!("no attractions available for {city}");
            }
            println!("{}", serde_json::to_string_pretty(&records)?);
        }

        cli::Command::Weather { city } => {
            let Some(client) = weather_client(&config) else {
                bail!("OPENWEATHER_KEY is not set");
            };
            match client.current_weather(&city) {
                Some(summary) => println!("{city}: {summary}"),
                None => bail!("weather lookup failed for {city}"),
            }
        }
    }

    Ok(())
}

/// Wire the retrieval service over the local attraction cache.
fn build_retrieval(config: &Config) -> anyhow::Result<RetrievalService> {
    let embedder: Arc<dyn EmbeddingProvider> = if config.retrieval.offline {
        Arc::new(OfflineEmbedder::new(config.retrieval.dimensions))
    } else {
        let api_key = std::env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY is not set (or enable retrieval.offline in config.yaml)")?;
        Arc::new(OpenAiEmbedder::new(
            api_key,
            config.retrieval.model.clone(),
            config.retrieval.dimensions,
        ))
    };

    Ok(RetrievalService::new(
        Arc::new(CachedAttractionSource::in_dir(config.data_dir())),
        embedder,
        Arc::new(IndexStorage::new(config.data_dir().to_path_buf())),
    ))
}

/// Fetch attractions through the API client when a key is present, otherwise
/// serve whatever the local cache holds.
fn fetch_attractions(config: &Config, city: &str) -> Vec<attractions::AttractionRecord> {
    if let Ok(api_key) = std::env::var("RAPIDAPI_KEY") {
        match AttractionsClient::new(api_key, config.data_dir().to_path_buf(), config.attraction_limit)
        {
            Ok(client) => return client.fetch_attractions(city),
            Err(e) => log::warn!("failed to build attractions client: {}", e),
        }
    } else {
        log::debug!("RAPIDAPI_KEY not set; using cached attractions only");
    }

    let cache = CachedAttractionSource::in_dir(config.data_dir());
    use attractions::AttractionSource;
    cache.load().get(city).cloned().unwrap_or_default()
}

fn weather_client(config: &Config) -> Option<WeatherClient> {
    let api_key = std::env::var("OPENWEATHER_KEY").ok()?;
    match WeatherClient::new(api_key, config.data_dir().to_path_buf()) {
        Ok(client) => Some(client),
        Err(e) => {
            log::warn!("failed to build weather client: {}", e);
            None
        }
    }
}
