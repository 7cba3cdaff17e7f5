use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::{RwLock, watch};

use crate::core::Result;

/// Supplies the bearer token attached to outgoing requests.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Current token, or `None` when nobody is signed in.
    async fn bearer_token(&self) -> Result<Option<String>>;
}

/// Identity returned by the external sign-in provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInUser {
    display_name: Option<String>,
    phone: Option<String>,
    photo_url: Option<String>,
    token: String,
}

impl SignedInUser {
    pub fn new(display_name: Option<&str>, token: impl Into<String>) -> Self {
        Self {
            display_name: display_name.map(str::to_string),
            phone: None,
            photo_url: None,
            token: token.into(),
        }
    }

    pub fn with_phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.to_string());
        self
    }

    pub fn with_photo_url(mut self, photo_url: &str) -> Self {
        self.photo_url = Some(photo_url.to_string());
        self
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn photo_url(&self) -> Option<&str> {
        self.photo_url.as_deref()
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// First and last name for registration. A missing display name becomes
    /// `"(Unknown)"`, a missing last name the empty string.
    pub fn split_name(&self) -> (String, String) {
        let mut parts = self
            .display_name
            .as_deref()
            .unwrap_or_default()
            .split(' ')
            .filter(|part| !part.is_empty());
        let first = parts.next().unwrap_or("(Unknown)").to_string();
        let last = parts.next().unwrap_or_default().to_string();
        (first, last)
    }
}

/// Currently signed-in identity plus a change feed of its token.
///
/// Constructed once per process and handed to the client explicitly.
pub struct AuthSession {
    current: RwLock<Option<SignedInUser>>,
    token_tx: watch::Sender<Option<String>>,
}

impl AuthSession {
    pub fn new() -> Self {
        let (token_tx, _) = watch::channel(None);
        Self {
            current: RwLock::new(None),
            token_tx,
        }
    }

    pub async fn sign_in(&self, user: SignedInUser) {
        if user.display_name().is_none() {
            warn!("Signed-in identity is missing a display name");
        }
        let token = user.token().to_string();
        *self.current.write().await = Some(user);
        self.publish(Some(token));
    }

    pub async fn sign_out(&self) {
        let previous = self.current.write().await.take();
        if previous.is_some() {
            debug!("Identity signed out");
        }
        self.publish(None);
    }

    /// Provider refreshed the token of the current identity.
    pub async fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        let updated = {
            let mut current = self.current.write().await;
            match current.as_mut() {
                Some(user) => {
                    user.token = token.clone();
                    true
                }
                None => false,
            }
        };
        if updated {
            self.publish(Some(token));
        } else {
            warn!("Ignoring token refresh without a signed-in identity");
        }
    }

    pub async fn current_user(&self) -> Option<SignedInUser> {
        self.current.read().await.clone()
    }

    pub async fn is_signed_in(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Token change feed; the receiver sees the latest token only.
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.token_tx.subscribe()
    }

    fn publish(&self, token: Option<String>) {
        self.token_tx.send_if_modified(|current| {
            if *current == token {
                false
            } else {
                *current = token;
                true
            }
        });
    }
}

impl Default for AuthSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenSource for AuthSession {
    async fn bearer_token(&self) -> Result<Option<String>> {
        Ok(self
            .current
            .read()
            .await
            .as_ref()
            .map(|user| user.token().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_name() {
        let user = SignedInUser::new(Some("Ada Lovelace"), "t");
        assert_eq!(user.split_name(), ("Ada".to_string(), "Lovelace".to_string()));

        let single = SignedInUser::new(Some("Prince"), "t");
        assert_eq!(single.split_name(), ("Prince".to_string(), String::new()));

        let anonymous = SignedInUser::new(None, "t");
        assert_eq!(anonymous.split_name(), ("(Unknown)".to_string(), String::new()));
    }

    #[tokio::test]
    async fn test_sign_in_publishes_token() {
        let session = AuthSession::new();
        let mut tokens = session.subscribe();
        assert_eq!(session.bearer_token().await.unwrap(), None);

        session
            .sign_in(SignedInUser::new(Some("Ada Lovelace"), "token-1").with_phone("555"))
            .await;
        tokens.changed().await.unwrap();
        assert_eq!(tokens.borrow().as_deref(), Some("token-1"));
        assert_eq!(
            session.bearer_token().await.unwrap().as_deref(),
            Some("token-1")
        );
        assert_eq!(session.current_user().await.unwrap().phone(), Some("555"));
    }

    #[tokio::test]
    async fn test_set_token_and_sign_out() {
        let session = AuthSession::new();
        session.set_token("ignored").await;
        assert!(!session.is_signed_in().await);

        session.sign_in(SignedInUser::new(Some("Ada"), "token-1")).await;
        session.set_token("token-2").await;
        assert_eq!(*session.subscribe().borrow(), Some("token-2".to_string()));

        session.sign_out().await;
        assert!(!session.is_signed_in().await);
        assert_eq!(*session.subscribe().borrow(), None);
    }
}
