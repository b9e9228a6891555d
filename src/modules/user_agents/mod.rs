//! User-Agent pool.
//!
//! Responsibilities:
//! - Hold a catalog of browser user-agent strings.
//! - Track the currently selected agent, which may come from the catalog or
//!   be a caller-supplied override.
//! - Redraw the current agent at random on demand.

use rand::seq::SliceRandom;
use rand::thread_rng;

/// Stock catalog covering desktop and mobile browsers.
pub const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/110.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0.3 Safari/605.1.15",
    "Mozilla/5.0 (Linux; Android 11; Pixel 4 XL) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.77 Mobile Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 14_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.1.1 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/91.0.864.54",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:89.0) Gecko/20100101 Firefox/89.0",
];

/// Catalog of user agents plus the one currently in use.
#[derive(Debug, Clone)]
pub struct UserAgentPool {
    catalog: Vec<String>,
    current: String,
}

impl UserAgentPool {
    /// Pool backed by [`DEFAULT_USER_AGENTS`] with a random current entry.
    pub fn new() -> Self {
        let catalog: Vec<String> = DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect();
        let current = random_choice(&catalog);
        Self { catalog, current }
    }

    /// Pool backed by a custom catalog. Blank entries are skipped.
    pub fn with_catalog<I, S>(agents: I) -> Result<Self, UserAgentError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let catalog: Vec<String> = agents
            .into_iter()
            .map(Into::into)
            .filter(|ua| !ua.trim().is_empty())
            .collect();
        if catalog.is_empty() {
            return Err(UserAgentError::EmptyCatalog);
        }
        let current = random_choice(&catalog);
        Ok(Self { catalog, current })
    }

    /// Uniformly chosen catalog entry. Does not touch `current`.
    pub fn random(&self) -> String {
        random_choice(&self.catalog)
    }

    /// Replaces the current agent without validating its format.
    pub fn set(&mut self, custom: impl Into<String>) {
        let custom = custom.into();
        if custom.is_empty() {
            log::debug!("ignoring empty user-agent override");
            return;
        }
        self.current = custom;
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn reset_to_random(&mut self) {
        self.current = self.random();
    }

    pub fn catalog(&self) -> &[String] {
        &self.catalog
    }
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self::new()
    }
}

fn random_choice(items: &[String]) -> String {
    let mut rng = thread_rng();
    // Catalog emptiness is rejected at construction.
    items
        .choose(&mut rng)
        .cloned()
        .unwrap_or_else(|| DEFAULT_USER_AGENTS[0].to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum UserAgentError {
    #[error("user-agent catalog must contain at least one entry")]
    EmptyCatalog,
}
