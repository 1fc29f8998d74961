//! Hint and credential side-tables (spec §4.9): small auxiliary structures
//! addressed by the same key prefix as the queue, read by external
//! middleware and left out of selection ordering entirely.

use crate::error::Result;
use crate::store::StoreGateway;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    pub url: String,
    pub login: String,
    pub password: String,
}

pub struct SideTables {
    store: Arc<dyn StoreGateway>,
    prefix: String,
}

impl SideTables {
    pub fn new(store: Arc<dyn StoreGateway>, prefix: impl Into<String>) -> Self {
        SideTables {
            store,
            prefix: prefix.into(),
        }
    }

    fn hints_key(&self) -> String {
        format!("{}:hints", self.prefix)
    }

    fn credentials_key(&self, url_prefix: &str) -> String {
        format!("{}:credentials:{}", self.prefix, url_prefix)
    }

    pub async fn add_hint_url(&self, url: &str) -> Result<()> {
        self.store.sadd(&self.hints_key(), url).await?;
        Ok(())
    }

    pub async fn remove_hint_url(&self, url: &str) -> Result<()> {
        self.store.srem(&self.hints_key(), url).await?;
        Ok(())
    }

    pub async fn hint_urls(&self) -> Result<Vec<String>> {
        self.store.smembers(&self.hints_key()).await
    }

    pub async fn add_login_credentials(&self, url_prefix: &str, login: &str, password: &str) -> Result<()> {
        let key = self.credentials_key(url_prefix);
        self.store.hset(&key, "login", login).await?;
        self.store.hset(&key, "password", password).await?;
        Ok(())
    }

    pub async fn get_login_credentials(&self, url_prefix: &str) -> Result<Option<LoginCredentials>> {
        let fields = self.store.hget_all(&self.credentials_key(url_prefix)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let mut login = None;
        let mut password = None;
        for (field, value) in fields {
            match field.as_str() {
                "login" => login = Some(value),
                "password" => password = Some(value),
                _ => {}
            }
        }
        match (login, password) {
            (Some(login), Some(password)) => Ok(Some(LoginCredentials {
                url: url_prefix.to_string(),
                login,
                password,
            })),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryGateway;

    #[tokio::test]
    async fn hint_urls_round_trip() {
        let store: Arc<dyn StoreGateway> = Arc::new(MemoryGateway::new());
        let tables = SideTables::new(store, "P");
        tables.add_hint_url("http://example.com/seed").await.unwrap();
        assert_eq!(tables.hint_urls().await.unwrap(), vec!["http://example.com/seed"]);
        tables.remove_hint_url("http://example.com/seed").await.unwrap();
        assert!(tables.hint_urls().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn login_credentials_round_trip() {
        let store: Arc<dyn StoreGateway> = Arc::new(MemoryGateway::new());
        let tables = SideTables::new(store, "P");
        assert_eq!(tables.get_login_credentials("example.com").await.unwrap(), None);
        tables
            .add_login_credentials("example.com", "alice", "hunter2")
            .await
            .unwrap();
        let creds = tables.get_login_credentials("example.com").await.unwrap().unwrap();
        assert_eq!(creds.login, "alice");
        assert_eq!(creds.password, "hunter2");
    }
}
