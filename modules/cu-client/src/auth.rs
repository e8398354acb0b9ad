use std::fmt;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};

use crate::error::Result;

const SUBSCRIPTION_KEY_HEADER: HeaderName = HeaderName::from_static("ocp-apim-subscription-key");
const USER_AGENT_HEADER: HeaderName = HeaderName::from_static("x-ms-useragent");

/// Supplies bearer tokens. Acquisition and refresh are the provider's business;
/// the client asks for a token on every request.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Result<String>;
}

impl<F> TokenProvider for F
where
    F: Fn() -> Result<String> + Send + Sync,
{
    fn token(&self) -> Result<String> {
        self()
    }
}

#[derive(Clone)]
pub enum Credential {
    SubscriptionKey(String),
    Bearer(Arc<dyn TokenProvider>),
}

impl Credential {
    pub fn subscription_key(key: impl Into<String>) -> Self {
        Credential::SubscriptionKey(key.into())
    }

    pub fn bearer(provider: impl TokenProvider + 'static) -> Self {
        Credential::Bearer(Arc::new(provider))
    }

    /// Auth headers plus the user-agent tag sent with every request.
    pub(crate) fn headers(&self, user_agent: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        match self {
            Credential::SubscriptionKey(key) => {
                headers.insert(SUBSCRIPTION_KEY_HEADER, HeaderValue::from_str(key)?);
            }
            Credential::Bearer(provider) => {
                let token = provider.token()?;
                headers.insert(
                    AUTHORIZATION,
                    HeaderValue::from_str(&format!("Bearer {token}"))?,
                );
            }
        }
        headers.insert(USER_AGENT_HEADER, HeaderValue::from_str(user_agent)?);
        Ok(headers)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::SubscriptionKey(_) => f.write_str("SubscriptionKey(<redacted>)"),
            Credential::Bearer(_) => f.write_str("Bearer(<provider>)"),
        }
    }
}
