use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::services::{RedemptionGate, RegistrationFeed, RegistrationIssuer, TicketMailer};
use crate::store::{CatalogStore, RegistrationStore};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub registrations: Arc<dyn RegistrationStore>,
    pub issuer: Arc<RegistrationIssuer>,
    pub gate: Arc<RedemptionGate>,
    pub feed: RegistrationFeed,
    pub admin_token: Option<Arc<str>>,
    pub store_timeout: Duration,
}

impl AppState {
    /// Wires the issuer and gate around one store that serves both the
    /// catalog and the registrations.
    pub fn new<S>(store: Arc<S>, mailer: Arc<dyn TicketMailer>, config: &Config) -> Self
    where
        S: CatalogStore + RegistrationStore + 'static,
    {
        let catalog: Arc<dyn CatalogStore> = store.clone();
        let registrations: Arc<dyn RegistrationStore> = store;
        let feed = RegistrationFeed::new();

        let issuer = RegistrationIssuer::new(
            Arc::clone(&catalog),
            Arc::clone(&registrations),
            mailer,
            feed.clone(),
            config.app_url.clone(),
            config.store_timeout,
        );
        let gate = RedemptionGate::new(
            Arc::clone(&registrations),
            feed.clone(),
            config.store_timeout,
        );

        Self {
            catalog,
            registrations,
            issuer: Arc::new(issuer),
            gate: Arc::new(gate),
            feed,
            admin_token: config.admin_token.as_deref().map(Arc::from),
            store_timeout: config.store_timeout,
        }
    }
}
