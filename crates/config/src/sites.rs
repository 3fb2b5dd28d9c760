//! Site list parsing.
//!
//! Sites are written either as a comma-separated string (`"site-a,site-b"`,
//! which is what the `SITE_IDS` environment variable holds) or as a list
//! whose entries are plain ids or `{ id, tier, enabled }` tables.

use serde::{Deserialize, Serialize};

/// One monitored site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    /// Scheduling tier, matched against the trigger event's `site_tier`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(default = "enabled")]
    pub enabled: bool,
}
impl Site {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), tier: None, enabled: true }
    }
}

fn enabled() -> bool {
    true
}

/// Every configured site, in configuration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SitesRepr", into = "Vec<Site>")]
pub struct Sites(Vec<Site>);

impl Sites {
    pub fn iter(&self) -> std::slice::Iter<'_, Site> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Enabled sites, optionally restricted to one tier.
    pub fn selected(&self, tier: Option<&str>) -> Vec<&Site> {
        self.0
            .iter()
            .filter(|site| site.enabled)
            .filter(|site| tier.is_none_or(|tier| site.tier.as_deref() == Some(tier)))
            .collect()
    }
}

impl From<Vec<Site>> for Sites {
    fn from(sites: Vec<Site>) -> Self {
        Self(sites)
    }
}

impl From<Sites> for Vec<Site> {
    fn from(sites: Sites) -> Self {
        sites.0
    }
}

impl<'a> IntoIterator for &'a Sites {
    type Item = &'a Site;
    type IntoIter = std::slice::Iter<'a, Site>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SitesRepr {
    Csv(String),
    // Environment values such as `SITE_IDS=1042` arrive as numbers.
    Number(u64),
    List(Vec<SiteRepr>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SiteRepr {
    Id(String),
    Number(u64),
    Table(Site),
}

impl From<SitesRepr> for Sites {
    fn from(repr: SitesRepr) -> Self {
        let sites = match repr {
            SitesRepr::Csv(csv) => csv.split(',').map(str::trim).filter(|id| !id.is_empty()).map(Site::new).collect(),
            SitesRepr::Number(id) => vec![Site::new(id.to_string())],
            SitesRepr::List(entries) => entries
                .into_iter()
                .map(|entry| match entry {
                    SiteRepr::Id(id) => Site::new(id.trim()),
                    SiteRepr::Number(id) => Site::new(id.to_string()),
                    SiteRepr::Table(site) => site,
                })
                .filter(|site| !site.id.is_empty())
                .collect(),
        };
        Self(sites)
    }
}
