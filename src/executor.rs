use tracing::info;

use crate::action::ActionRequest;
use crate::agent::AgentError;
use crate::browser::BrowserPage;
use crate::observation::Observation;
use crate::registry::ElementRegistry;

/// Applies one action to the page and re-catalogs what can be clicked.
///
/// Every action ends in exactly one registry rebuild, so the observation the
/// model gets back always matches the handles the registry will accept next.
pub struct ActionExecutor;

impl ActionExecutor {
    pub async fn execute<P: BrowserPage>(
        page: &P,
        registry: &mut ElementRegistry<P::Element>,
        action: &ActionRequest,
    ) -> Result<Observation, AgentError> {
        match action {
            ActionRequest::Navigate { url } => {
                info!(url = %url, "navigating");
                page.goto(url).await?;
            }
            ActionRequest::Click { element_id } => {
                let element = registry.resolve(registry.handle(*element_id))?;
                info!(element_id, generation = registry.generation(), "clicking");
                page.click(element).await?;
            }
        }
        page.wait_for_load().await?;
        let labels = registry.rebuild(page).await?;
        Ok(Observation::new(labels))
    }
}
