//! Scheduler trigger event.

use serde::Deserialize;
use thermo_config::Sites;

/// The event a scheduler invokes the transfer with. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct TriggerEvent {
    /// Restrict the run to sites of this tier.
    #[serde(default)]
    pub site_tier: Option<String>,
}

impl TriggerEvent {
    /// Parse the raw event; absent or blank means an empty event.
    pub fn parse(raw: Option<&str>) -> serde_json::Result<Self> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(raw) => serde_json::from_str(raw),
        }
    }

    /// Ids of the enabled sites this event selects.
    pub fn select_sites(&self, sites: &Sites) -> Vec<String> {
        sites.selected(self.site_tier.as_deref()).into_iter().map(|site| site.id.clone()).collect()
    }
}
