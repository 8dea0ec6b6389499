use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use std::fmt;
use std::path::PathBuf;
use tokio::fs as async_fs;
use tracing::{debug, warn};

use crate::agent::AgentError;
use crate::browser::BrowserPage;
use crate::registry::LabelMap;
use crate::transcript::Message;

pub const SCREEN_CAPTION: &str = "Here's the current screen state:";
pub const CLICKABLE_ANNOUNCEMENT: &str =
    "The page has loaded and the following element IDs can be clicked: ";

/// What an executed action reports back to the model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Observation {
    pub labels: LabelMap,
}

impl Observation {
    pub fn new(labels: LabelMap) -> Self {
        Self { labels }
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(&self.labels).map_err(|_| fmt::Error)?;
        write!(f, "{}{}", CLICKABLE_ANNOUNCEMENT, json)
    }
}

/// Turns the current viewport into an image message for the model.
#[derive(Clone, Debug, Default)]
pub struct ObservationBuilder {
    debug_path: Option<PathBuf>,
}

impl ObservationBuilder {
    pub fn new(debug_path: Option<PathBuf>) -> Self {
        Self { debug_path }
    }

    pub async fn capture<P: BrowserPage>(&self, page: &P) -> Result<Message, AgentError> {
        let png = page.screenshot().await?;
        if let Some(path) = &self.debug_path {
            // Diagnostic copy only; never let it stop the loop.
            match async_fs::write(path, &png).await {
                Ok(()) => debug!(path = %path.display(), bytes = png.len(), "screenshot saved"),
                Err(e) => warn!("could not write debug screenshot {}: {}", path.display(), e),
            }
        }
        let url = format!("data:image/png;base64,{}", B64.encode(&png));
        Ok(Message::user_image(SCREEN_CAPTION, url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_observation_renders_empty_object() {
        let obs = Observation::new(LabelMap::default());
        assert_eq!(
            obs.to_string(),
            "The page has loaded and the following element IDs can be clicked: {}"
        );
    }
}
