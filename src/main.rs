use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use key_sweep::cli::{Cli, Commands, OutputFormatter};
use key_sweep::core::Config;
use key_sweep::pipeline::Pipeline;
use key_sweep::sources::{GithubCodeSearch, HuggingfaceIndexSearch, ReplitGraphqlSearch};
use key_sweep::store::{CredList, DedupStore};
use key_sweep::validators::{OpenAiValidator, OpenRouterValidator};
use key_sweep::{KeyValidator, SourceAdapter};

#[tokio::main]
async fn main() {
    // Load .env file if it exists
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    OutputFormatter::print_banner();
    OutputFormatter::print_ethical_warning();

    if let Err(e) = run(cli.command).await {
        OutputFormatter::print_error(&format!("Error: {}", e));
        std::process::exit(1);
    }
}

async fn run(command: Commands) -> key_sweep::Result<()> {
    let Commands::Run { query } = command;
    let config = Config::from_env(query)?;

    let store = Arc::new(DedupStore::open(&config.found_keys_path));
    let cred_list = match &config.cred_list_path {
        Some(path) => Some(Arc::new(CredList::open(path)?)),
        None => None,
    };

    let tuning = &config.tuning;
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(GithubCodeSearch::new(
            config.github_token.clone(),
            Duration::from_millis(tuning.github_rate_limit_ms),
        )),
        Arc::new(ReplitGraphqlSearch::new(
            config.query.clone(),
            tuning.graphql_max_pages,
        )),
        Arc::new(HuggingfaceIndexSearch::new()),
    ];
    let validator_delay = Duration::from_millis(tuning.validator_rate_limit_ms);
    let validators: Vec<(String, Arc<dyn KeyValidator>)> = vec![
        (
            "sk-or-v1-".to_string(),
            Arc::new(OpenRouterValidator::new(validator_delay)),
        ),
        ("sk-".to_string(), Arc::new(OpenAiValidator::new(validator_delay))),
    ];

    let pipeline = Pipeline::new(
        adapters,
        validators,
        store,
        cred_list,
        tuning.validation_concurrency,
    );
    let summary = pipeline.run().await?;

    OutputFormatter::print_summary(&summary);
    Ok(())
}
