use ferriswatch::config::{self, Config};
use ferriswatch::doctor;
use std::fs::File;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Log to a file so check output stays readable
    let log_file = File::create(std::env::temp_dir().join("ferriswatch.log")).ok();

    if let Some(file) = log_file {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_target(false)
            .with_ansi(false)
            .with_writer(file)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_target(false)
            .init();
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(config::ConfigError::NotFound(path)) => {
            eprintln!("No config file at {}, using defaults", path.display());
            eprintln!("\nExample config.toml:");
            eprintln!(
                r#"
[resolver]
url = "https://api.consumet.org/movies/flixhq"

[tmdb]
apikey = "your-api-key"

[playback]
mode = "extracted"   # or "direct"
provider = "VidSrc.cc"
"#
            );
            Config::default()
        }
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let results = doctor::run_checks(&config).await;
    doctor::print_results(&results);

    if results
        .iter()
        .any(|r| r.status == doctor::CheckStatus::Error)
    {
        std::process::exit(1);
    }
}
