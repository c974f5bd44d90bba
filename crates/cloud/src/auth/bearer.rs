//! OAuth2 bearer token authentication.

use crate::auth::CloudAuth;
use crate::error::{CloudError, Result};

/// Environment variable consulted when no token is configured.
pub const TOKEN_ENV_VAR: &str = "EARTHENGINE_TOKEN";

/// Bearer token plus the Cloud project billed for the request.
#[derive(Clone)]
pub struct BearerToken {
    token: String,
    project: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>, project: impl Into<String>) -> Result<Self> {
        let token = token.into();
        let project = project.into();
        if token.trim().is_empty() {
            return Err(CloudError::Auth("empty access token".into()));
        }
        if project.trim().is_empty() {
            return Err(CloudError::Auth("empty project id".into()));
        }
        Ok(Self { token, project })
    }

    /// Use `token` when given, otherwise read [`TOKEN_ENV_VAR`].
    pub fn resolve(token: Option<&str>, project: &str) -> Result<Self> {
        match token {
            Some(t) if !t.trim().is_empty() => Self::new(t, project),
            _ => {
                let from_env = std::env::var(TOKEN_ENV_VAR).map_err(|_| {
                    CloudError::Auth(format!(
                        "no access token: set earth_engine.token or {TOKEN_ENV_VAR}"
                    ))
                })?;
                Self::new(from_env, project)
            }
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("token", &"***")
            .field("project", &self.project)
            .finish()
    }
}

impl CloudAuth for BearerToken {
    fn sign_request(
        &self,
        _url: &str,
        _method: &str,
        headers: &mut Vec<(String, String)>,
    ) -> Result<()> {
        headers.push(("Authorization".into(), format!("Bearer {}", self.token.trim())));
        headers.push(("x-goog-user-project".into(), self.project.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signs_with_token_and_project() {
        let auth = BearerToken::new("ya29.abc", "my-project").unwrap();
        let mut headers = Vec::new();
        auth.sign_request("https://example.com", "GET", &mut headers).unwrap();
        assert_eq!(headers[0], ("Authorization".to_string(), "Bearer ya29.abc".to_string()));
        assert_eq!(headers[1], ("x-goog-user-project".to_string(), "my-project".to_string()));
    }

    #[test]
    fn empty_credentials_are_auth_errors() {
        assert!(matches!(BearerToken::new(" ", "p"), Err(CloudError::Auth(_))));
        assert!(matches!(BearerToken::new("t", ""), Err(CloudError::Auth(_))));
    }

    #[test]
    fn debug_hides_token() {
        let auth = BearerToken::new("secret-token", "p").unwrap();
        assert!(!format!("{auth:?}").contains("secret-token"));
    }
}
