// Cookie store exported from an authenticated browser session

use crate::error::{LocktraceError, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tracing::info;

#[derive(Clone, Deserialize)]
pub struct StoredCredential {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub domain: Option<String>,
}

impl fmt::Debug for StoredCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredential")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoreDocument {
    List(Vec<StoredCredential>),
    Wrapped { cookies: Vec<StoredCredential> },
}

/// Credential values never leave this type; prompts only see [`hints`].
///
/// [`hints`]: CredentialStore::hints
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    credentials: Vec<StoredCredential>,
}

impl CredentialStore {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            LocktraceError::Credentials(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let store = Self::parse(&contents)?;
        info!(
            "Loaded {} credentials from {}",
            store.len(),
            path.display()
        );
        Ok(store)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let document: StoreDocument = serde_json::from_str(contents)
            .map_err(|e| LocktraceError::Credentials(format!("Invalid credential store: {}", e)))?;

        let credentials = match document {
            StoreDocument::List(list) => list,
            StoreDocument::Wrapped { cookies } => cookies,
        };

        Ok(Self { credentials })
    }

    /// `name (domain)` for each credential, without values.
    pub fn hints(&self) -> Vec<String> {
        self.credentials
            .iter()
            .map(|c| match c.domain {
                Some(ref domain) => format!("{} ({})", c.name, domain),
                None => c.name.clone(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_array() {
        let store = CredentialStore::parse(
            r#"[{"name":"session","value":"s3cr3t","domain":".example.com"},{"name":"csrf","value":"x"}]"#,
        )
        .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.hints(), vec!["session (.example.com)", "csrf"]);
    }

    #[test]
    fn test_parse_wrapped() {
        let store =
            CredentialStore::parse(r#"{"cookies":[{"name":"sid","value":"abc"}]}"#).unwrap();
        assert_eq!(store.hints(), vec!["sid"]);
    }

    #[test]
    fn test_values_never_appear() {
        let store =
            CredentialStore::parse(r#"[{"name":"sid","value":"topsecret"}]"#).unwrap();
        assert!(!format!("{:?}", store).contains("topsecret"));
        assert!(store.hints().iter().all(|h| !h.contains("topsecret")));
    }

    #[test]
    fn test_invalid_store() {
        let result = CredentialStore::parse("{\"jar\": 1}");
        assert!(matches!(result, Err(LocktraceError::Credentials(_))));
    }

    #[test]
    fn test_missing_store() {
        let result = CredentialStore::load(Path::new("/nonexistent/keys.json"));
        assert!(matches!(result, Err(LocktraceError::Credentials(_))));
    }
}
