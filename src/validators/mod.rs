pub mod openai;
pub mod openrouter;

pub use openai::OpenAiValidator;
pub use openrouter::OpenRouterValidator;
