//! Read-only view of the registered appservices.
//!
//! The relay never mutates registrations. Anything that can answer the two
//! lookups below can back it, which keeps the pipeline testable with
//! hand-built registries.
use crate::config::AppserviceRegistration;
use std::collections::HashMap;
use std::sync::Arc;
use url::Url;

/// A registered appservice.
#[derive(Clone, Debug, PartialEq)]
pub struct Appservice {
    pub id: String,
    pub as_token: String,
    pub hs_token: String,
    pub url: Option<Url>,
}

impl From<AppserviceRegistration> for Appservice {
    fn from(registration: AppserviceRegistration) -> Self {
        Appservice {
            id: registration.id,
            as_token: registration.as_token,
            hs_token: registration.hs_token,
            url: registration.url,
        }
    }
}

/// Where, and with which credential, to send a probe.
#[derive(Clone, Debug, PartialEq)]
pub struct PushTarget {
    pub url: Url,
    pub hs_token: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    Configured(PushTarget),
    NotConfigured,
}

pub trait Registry: Send + Sync {
    /// Finds the appservice owning `as_token`.
    fn find_by_token(&self, as_token: &str) -> Option<Arc<Appservice>>;

    /// Resolves the push target of an appservice. Unknown ids resolve to
    /// `NotConfigured`.
    fn resolve(&self, appservice_id: &str) -> Resolution;
}

/// Registry loaded once from configuration.
#[derive(Default)]
pub struct StaticRegistry {
    by_id: HashMap<String, Arc<Appservice>>,
    by_token: HashMap<String, Arc<Appservice>>,
}

impl StaticRegistry {
    pub fn new<I>(registrations: I) -> Self
    where
        I: IntoIterator<Item = AppserviceRegistration>,
    {
        let mut registry = StaticRegistry::default();
        for registration in registrations {
            let appservice = Arc::new(Appservice::from(registration));
            registry
                .by_token
                .insert(appservice.as_token.clone(), appservice.clone());
            registry.by_id.insert(appservice.id.clone(), appservice);
        }
        registry
    }
}

impl Registry for StaticRegistry {
    fn find_by_token(&self, as_token: &str) -> Option<Arc<Appservice>> {
        self.by_token.get(as_token).cloned()
    }

    fn resolve(&self, appservice_id: &str) -> Resolution {
        let Some(appservice) = self.by_id.get(appservice_id) else {
            return Resolution::NotConfigured;
        };

        match &appservice.url {
            Some(url) => Resolution::Configured(PushTarget {
                url: url.clone(),
                hs_token: appservice.hs_token.clone(),
            }),
            None => Resolution::NotConfigured,
        }
    }
}
