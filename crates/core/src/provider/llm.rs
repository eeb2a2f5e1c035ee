use crate::completion::CompletionModel;
use crate::model::ProviderSettings;
use crate::provider::openrouter;
use anyhow::Result;
use tracing::instrument;

#[instrument(skip(settings), fields(model = %settings.model))]
pub fn get_completion_model(
    settings: ProviderSettings,
) -> Result<Box<dyn CompletionModel + Send + Sync>> {
    let model = openrouter::OpenRouterModel::new(settings)?;
    Ok(Box::new(model))
}
