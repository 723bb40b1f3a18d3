use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use log::{debug, info};
use serde::Deserialize;

use webcore_core::auth::{AuthError, AuthStore, Credential, Identity, Permission};
use webcore_core::kernel::error::Result;
use webcore_core::library_system::{Library, LibraryArgs};

use crate::STORE_LOADER;

#[derive(Debug, Clone, Deserialize)]
struct StoreConfig {
    #[serde(default)]
    users_file: String,
}

/// One user entry of the store document.
#[derive(Debug, Clone, Deserialize)]
pub struct UserEntry {
    pub subject: String,
    pub api_key: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

/// The YAML document backing [`YamlAuthStore`].
///
/// ```yaml
/// roles:
///   admin: ["* /*"]
///   reader: ["GET /items*"]
/// users:
///   - subject: alice
///     api_key: k-alice
///     roles: [admin]
///   - subject: bob
///     api_key: k-bob
///     permissions: ["POST /reports"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct YamlStoreDocument {
    #[serde(default)]
    pub roles: HashMap<String, Vec<Permission>>,
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

impl YamlStoreDocument {
    pub fn parse(contents: &str) -> std::result::Result<Self, AuthError> {
        serde_yaml::from_str(contents).map_err(|e| AuthError::Misconfigured(format!("invalid store document: {}", e)))
    }

    pub fn read(path: &Path) -> std::result::Result<Self, AuthError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AuthError::Misconfigured(format!("cannot read users file {}: {}", path.display(), e)))?;
        Self::parse(&contents)
    }
}

#[derive(Debug)]
struct Index {
    by_key: HashMap<String, UserEntry>,
    roles: HashMap<String, Vec<Permission>>,
}

impl Index {
    fn build(document: YamlStoreDocument) -> std::result::Result<Self, AuthError> {
        let mut by_key = HashMap::with_capacity(document.users.len());
        for user in document.users {
            if user.api_key.trim().is_empty() {
                return Err(AuthError::Misconfigured(format!("user '{}' has an empty api_key", user.subject)));
            }
            if by_key.contains_key(&user.api_key) {
                return Err(AuthError::Misconfigured(format!(
                    "api_key of user '{}' is already assigned",
                    user.subject
                )));
            }
            by_key.insert(user.api_key.clone(), user);
        }
        Ok(Self {
            by_key,
            roles: document.roles,
        })
    }
}

/// Identity store read from a YAML users file at install time.
#[derive(Debug, Default)]
pub struct YamlAuthStore {
    index: OnceLock<Index>,
}

impl YamlAuthStore {
    /// A store installed from an in-memory document.
    pub fn from_document(document: YamlStoreDocument) -> std::result::Result<Self, AuthError> {
        let store = Self::default();
        let _ = store.index.set(Index::build(document)?);
        Ok(store)
    }

    pub fn user_count(&self) -> usize {
        self.index.get().map_or(0, |index| index.by_key.len())
    }

    fn index(&self) -> std::result::Result<&Index, AuthError> {
        self.index
            .get()
            .ok_or_else(|| AuthError::Misconfigured("auth store is not installed".to_string()))
    }
}

#[async_trait]
impl Library for YamlAuthStore {
    fn kind(&self) -> &str {
        "yaml auth store"
    }

    async fn install(&self, args: &LibraryArgs) -> Result<()> {
        if self.index.get().is_some() {
            return Ok(());
        }
        let config: StoreConfig = args.config_as(STORE_LOADER)?;
        if config.users_file.is_empty() {
            return Err(AuthError::Misconfigured("auth.users_file is not set".to_string()).into());
        }
        let index = Index::build(YamlStoreDocument::read(Path::new(&config.users_file))?)?;
        info!("Auth store loaded {} users from {}", index.by_key.len(), config.users_file);
        let _ = self.index.set(index);
        Ok(())
    }

    async fn uninstall(&self) -> Result<()> {
        Ok(())
    }

    fn into_auth_store(self: Arc<Self>) -> Option<Arc<dyn AuthStore>> {
        Some(self)
    }
}

#[async_trait]
impl AuthStore for YamlAuthStore {
    async fn lookup(&self, credential: &Credential) -> Result<Option<Identity>> {
        let index = self.index()?;
        let Some(user) = index.by_key.get(&credential.value) else {
            debug!("No identity for {} credential", credential.scheme);
            return Ok(None);
        };
        let mut identity = Identity::new(&user.subject);
        identity.roles = user.roles.clone();
        identity.permissions = user.permissions.clone();
        Ok(Some(identity))
    }

    async fn role_permissions(&self, role: &str) -> Result<Vec<Permission>> {
        Ok(self.index()?.roles.get(role).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use webcore_core::library_system::construct;

    const DOCUMENT: &str = r#"
roles:
  admin: ["* /*"]
  reader: ["GET /items*"]
users:
  - subject: alice
    api_key: k-alice
    roles: [admin]
  - subject: bob
    api_key: k-bob
    roles: [reader]
    permissions: ["POST /reports"]
"#;

    fn write_users(dir: &tempfile::TempDir, contents: &str) -> String {
        let path = dir.path().join("users.yaml");
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_install_reads_users_file() {
        let dir = tempfile::tempdir().unwrap();
        let users_file = write_users(&dir, DOCUMENT);

        let library = construct(
            YamlAuthStore::default(),
            &LibraryArgs::new().with_config_value(json!({ "users_file": users_file })),
        )
        .await
        .unwrap();
        let store = library.into_auth_store().expect("auth store port");

        let bob = store
            .lookup(&Credential::new("apikey", "k-bob"))
            .await
            .unwrap()
            .expect("bob is known");
        assert_eq!(bob.subject, "bob");
        assert_eq!(bob.roles, vec!["reader".to_string()]);
        assert_eq!(bob.permissions, vec![Permission::new("POST", "/reports")]);

        assert_eq!(
            store.role_permissions("reader").await.unwrap(),
            vec![Permission::new("GET", "/items*")]
        );
        assert!(store.role_permissions("ghost").await.unwrap().is_empty());
        assert!(store.lookup(&Credential::new("apikey", "nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_users_file_fails_install() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.yaml");
        let args = LibraryArgs::new().with_config_value(json!({ "users_file": missing }));

        let err = YamlAuthStore::default().install(&args).await.unwrap_err();
        assert!(err.to_string().contains("cannot read users file"), "{}", err);
    }

    #[test]
    fn test_duplicate_api_keys_are_rejected() {
        let document = YamlStoreDocument::parse(
            "users:\n  - {subject: a, api_key: same}\n  - {subject: b, api_key: same}\n",
        )
        .unwrap();
        assert!(matches!(
            YamlAuthStore::from_document(document),
            Err(AuthError::Misconfigured(_))
        ));
    }

    #[test]
    fn test_malformed_permission_is_a_parse_error() {
        let err = YamlStoreDocument::parse("roles:\n  admin: [\"nospace\"]\n").unwrap_err();
        assert!(matches!(err, AuthError::Misconfigured(_)));
    }

    #[tokio::test]
    async fn test_lookup_before_install_fails() {
        let store = YamlAuthStore::default();
        assert!(store.lookup(&Credential::new("apikey", "k")).await.is_err());
        assert_eq!(store.user_count(), 0);
    }
}
