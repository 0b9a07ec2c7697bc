use crate::config::Config;
use crate::error::Result;
use crate::nonce::NonceSigner;
use crate::protocol::PlacesService;
use crate::repository::PlaceRepository;
use crate::settings::SettingsStore;
use crate::storage::Storage;
use crate::submission::SubmissionHandler;
use std::sync::Arc;
use tracing::warn;
use url::Url;

/// Everything a request handler needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub places: PlacesService,
    pub settings: SettingsStore,
    pub submissions: SubmissionHandler,
    pub public_url: Url,
    pub admin_token: Option<String>,
}

impl AppState {
    pub fn new(config: &Config, storage: Arc<dyn Storage>) -> Result<Self> {
        let public_url = config.public_url()?;

        let signer = match &config.security.nonce_secret {
            Some(secret) if !secret.is_empty() => {
                NonceSigner::new(secret.as_bytes(), config.security.nonce_lifetime_secs)
            }
            _ => {
                warn!("No nonce secret configured; form tokens will not survive a restart");
                NonceSigner::random(config.security.nonce_lifetime_secs)
            }
        };
        if config.security.admin_token.is_none() {
            warn!("No admin token configured; admin routes are disabled");
        }

        let repository = PlaceRepository::new(storage.clone());
        Ok(Self {
            places: PlacesService::new(repository, config.protocol.empty_result),
            settings: SettingsStore::new(storage.clone()),
            submissions: SubmissionHandler::new(storage.clone(), signer, public_url.clone()),
            storage,
            public_url,
            admin_token: config.security.admin_token.clone().filter(|t| !t.is_empty()),
        })
    }

    /// Absolute URL of a route on this server.
    pub fn url_for(&self, path: &str) -> String {
        self.public_url
            .join(path.trim_start_matches('/'))
            .map(String::from)
            .unwrap_or_else(|_| path.to_string())
    }
}
