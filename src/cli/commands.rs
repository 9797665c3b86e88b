use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "key-sweep")]
#[command(version, about = "Multi-source discovery and validation pipeline for leaked API keys", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one full discovery-and-validation pass
    Run {
        /// Override the full-text search query
        query: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_without_query() {
        let cli = Cli::try_parse_from(["key-sweep", "run"]).unwrap();
        let Commands::Run { query } = cli.command;
        assert!(query.is_none());
    }

    #[test]
    fn test_run_with_query_override() {
        let cli = Cli::try_parse_from(["key-sweep", "run", "sk- production"]).unwrap();
        let Commands::Run { query } = cli.command;
        assert_eq!(query.as_deref(), Some("sk- production"));
    }
}
