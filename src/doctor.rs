use crate::config::{Config, PlaybackMode};
use crate::progress::JsonFileBackend;
use crate::providers::ProviderRegistry;
use crate::resolver::ResolverClient;
use crate::tmdb::TmdbClient;

pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
        }
    }

    fn warning(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
        }
    }

    fn error(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
        }
    }

    pub fn icon(&self) -> &'static str {
        match self.status {
            CheckStatus::Ok => "✓",
            CheckStatus::Warning => "⚠",
            CheckStatus::Error => "✗",
        }
    }

    pub fn color(&self) -> &'static str {
        match self.status {
            CheckStatus::Ok => "\x1b[32m",      // green
            CheckStatus::Warning => "\x1b[33m", // yellow
            CheckStatus::Error => "\x1b[31m",   // red
        }
    }
}

pub async fn run_checks(config: &Config) -> Vec<CheckResult> {
    let mut results = Vec::new();

    results.push(check_resolver(config).await);
    results.push(check_tmdb(config).await);
    results.push(check_providers(config, &ProviderRegistry::builtin()));
    results.push(check_storage(config).await);

    results
}

async fn check_resolver(config: &Config) -> CheckResult {
    let client = ResolverClient::new(&config.resolver);

    match client.search("test").await {
        Ok(_) => CheckResult::ok("Resolver", &format!("Reachable at {}", config.resolver.url)),
        Err(e) if config.playback.mode == PlaybackMode::Direct => CheckResult::warning(
            "Resolver",
            &format!("Unreachable ({}), only needed in extracted mode", e),
        ),
        Err(e) => CheckResult::error("Resolver", &format!("Connection failed: {}", e)),
    }
}

async fn check_tmdb(config: &Config) -> CheckResult {
    let api_key = config.tmdb.as_ref().map(|t| t.apikey.as_str());

    match TmdbClient::new(api_key) {
        Some(client) => {
            // Fight Club, a stable id
            match client.get_movie_details(550).await {
                Ok(_) => CheckResult::ok("TMDB", "API key valid"),
                Err(e) => CheckResult::error("TMDB", &format!("API error: {}", e)),
            }
        }
        None => CheckResult::warning("TMDB", "No API key configured. Details screens disabled."),
    }
}

fn check_providers(config: &Config, registry: &ProviderRegistry) -> CheckResult {
    if registry.is_empty() {
        return CheckResult::error("Providers", "No embed providers registered");
    }

    match registry.get(&config.playback.provider) {
        Some(provider) => CheckResult::ok(
            "Providers",
            &format!(
                "{} available, using {}",
                registry.names().join(", "),
                provider.name
            ),
        ),
        None => CheckResult::error(
            "Providers",
            &format!("Unknown provider '{}'", config.playback.provider),
        ),
    }
}

async fn check_storage(config: &Config) -> CheckResult {
    let backend = match JsonFileBackend::from_config(&config.storage) {
        Ok(backend) => backend,
        Err(e) => return CheckResult::error("Storage", &e.to_string()),
    };
    let root = backend.root();

    if let Err(e) = tokio::fs::create_dir_all(root).await {
        return CheckResult::error(
            "Storage",
            &format!("Cannot create {}: {}", root.display(), e),
        );
    }

    let probe = root.join(".write_test");
    match tokio::fs::write(&probe, b"test").await {
        Ok(()) => {
            let _ = tokio::fs::remove_file(&probe).await;
            CheckResult::ok("Storage", &format!("Writable: {}", root.display()))
        }
        Err(e) => CheckResult::error(
            "Storage",
            &format!("Cannot write to {}: {}", root.display(), e),
        ),
    }
}

pub fn print_results(results: &[CheckResult]) {
    let reset = "\x1b[0m";

    println!("\nferriswatch doctor\n");

    for result in results {
        println!(
            "  {}{}{} {}: {}",
            result.color(),
            result.icon(),
            reset,
            result.name,
            result.message
        );
    }

    let errors = results
        .iter()
        .filter(|r| r.status == CheckStatus::Error)
        .count();
    let warnings = results
        .iter()
        .filter(|r| r.status == CheckStatus::Warning)
        .count();

    println!();
    if errors > 0 {
        println!("  {} error(s), {} warning(s)", errors, warnings);
    } else if warnings > 0 {
        println!("  All critical checks passed, {} warning(s)", warnings);
    } else {
        println!("  All checks passed!");
    }
    println!();
}
