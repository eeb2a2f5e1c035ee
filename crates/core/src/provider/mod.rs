pub(crate) mod llm;
mod openrouter;
mod openrouter_types;
#[cfg(test)]
pub(crate) mod test_provider;

pub use openrouter::{OpenRouterModel, ProviderError};
