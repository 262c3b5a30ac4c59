//! Bearer token acceptance policy for the listener endpoints.

use crate::config::{ConfigError, TokenPolicyConfig};
use crate::error::ListenerError;
use peerlink_sts::{AuthError, StsClient, StsConfig};
use std::collections::HashSet;
use std::fmt;

/// Decides whether a well-formed bearer token is accepted.
pub enum TokenPolicy {
    /// Any syntactically valid token.
    AnyWellFormed,
    /// Only the listed tokens.
    Allowlist(HashSet<String>),
    /// Tokens the authority reports as `active` on introspection.
    Introspect {
        sts: StsClient,
        client_id: String,
        client_secret: String,
    },
}

impl fmt::Debug for TokenPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnyWellFormed => f.write_str("AnyWellFormed"),
            Self::Allowlist(tokens) => f
                .debug_struct("Allowlist")
                .field("tokens", &tokens.len())
                .finish(),
            Self::Introspect { sts, client_id, .. } => f
                .debug_struct("Introspect")
                .field("authority", &sts.base_url().as_str())
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .finish(),
        }
    }
}

impl TokenPolicy {
    /// Builds the policy described by the `[listener.token_policy]` section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the introspection authority URL is unusable.
    pub fn from_config(config: &TokenPolicyConfig) -> Result<Self, ConfigError> {
        match config {
            TokenPolicyConfig::AnyWellFormed => Ok(Self::AnyWellFormed),
            TokenPolicyConfig::Allowlist { tokens } => {
                Ok(Self::Allowlist(tokens.iter().cloned().collect()))
            }
            TokenPolicyConfig::Introspect {
                sts_url,
                client_id,
                client_secret,
            } => {
                let sts = StsClient::new(StsConfig::new(sts_url.clone())).map_err(|e| {
                    ConfigError::Invalid(format!("listener.token_policy.sts_url: {}", e))
                })?;
                Ok(Self::Introspect {
                    sts,
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                })
            }
        }
    }

    /// Checks `token`, which has already passed bearer syntax validation.
    ///
    /// # Errors
    ///
    /// [`ListenerError::InvalidToken`] when the token is not accepted and
    /// [`ListenerError::AuthorityUnavailable`] when introspection cannot be
    /// completed.
    pub async fn admit(&self, token: &str) -> Result<(), ListenerError> {
        match self {
            Self::AnyWellFormed => Ok(()),
            Self::Allowlist(tokens) => {
                if tokens.contains(token) {
                    Ok(())
                } else {
                    Err(ListenerError::InvalidToken)
                }
            }
            Self::Introspect {
                sts,
                client_id,
                client_secret,
            } => match sts.introspect(token, client_id, client_secret).await {
                Ok(status) if status.active => Ok(()),
                Ok(_) | Err(AuthError::Rejected(_)) => Err(ListenerError::InvalidToken),
                Err(e) => {
                    tracing::warn!("token introspection failed: {}", e);
                    Err(ListenerError::AuthorityUnavailable(e.to_string()))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allowlist_accepts_only_listed_tokens() {
        let policy = TokenPolicy::from_config(&TokenPolicyConfig::Allowlist {
            tokens: vec!["good".to_string()],
        })
        .unwrap();
        assert!(policy.admit("good").await.is_ok());
        assert!(matches!(
            policy.admit("other").await,
            Err(ListenerError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn any_well_formed_accepts_everything() {
        assert!(TokenPolicy::AnyWellFormed.admit("x").await.is_ok());
    }

    #[test]
    fn debug_redacts_client_secret() {
        let policy = TokenPolicy::from_config(&TokenPolicyConfig::Introspect {
            sts_url: "https://authority.example/sts".to_string(),
            client_id: "listener".to_string(),
            client_secret: "hunter2".to_string(),
        })
        .unwrap();
        let rendered = format!("{:?}", policy);
        assert!(rendered.contains("listener"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn unusable_authority_url_is_a_config_error() {
        let result = TokenPolicy::from_config(&TokenPolicyConfig::Introspect {
            sts_url: "not a url".to_string(),
            client_id: "listener".to_string(),
            client_secret: "s".to_string(),
        });
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }
}
