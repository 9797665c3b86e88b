pub mod github;
pub mod huggingface;
pub mod replit;

pub use github::GithubCodeSearch;
pub use huggingface::HuggingfaceIndexSearch;
pub use replit::ReplitGraphqlSearch;
