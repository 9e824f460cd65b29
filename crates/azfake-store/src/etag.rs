use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::StoreError;
use crate::table::ResourceTable;

/// A value together with the etag of its serialized form.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged<T> {
    pub value: T,
    pub etag: String,
}

/// Opt-in optimistic concurrency over a [`ResourceTable`].
///
/// `if_match` follows HTTP semantics: `None` writes unconditionally, `"*"`
/// requires an existing entry, anything else must equal the current etag.
#[derive(Debug)]
pub struct EtagTable<T> {
    inner: ResourceTable<Tagged<T>>,
}

impl<T: Clone + Send + Sync + Serialize> EtagTable<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            inner: ResourceTable::new(name),
        }
    }

    pub async fn load(&self, id: &str) -> Option<Tagged<T>> {
        self.inner.load(id).await
    }

    /// Write `value` if the precondition holds; returns the new etag.
    pub async fn store_if_match(
        &self,
        id: &str,
        value: T,
        if_match: Option<&str>,
    ) -> Result<String, StoreError> {
        let etag = compute_etag(&value)?;
        self.inner
            .with_entry(id, |slot| -> Result<String, StoreError> {
                check_precondition(id, slot.as_ref(), if_match)?;
                *slot = Some(Tagged { value, etag: etag.clone() });
                Ok(etag)
            })
            .await
    }

    pub async fn delete_if_match(&self, id: &str, if_match: Option<&str>) -> Result<(), StoreError> {
        self.inner
            .with_entry(id, |slot| -> Result<(), StoreError> {
                if slot.is_none() && if_match.is_none() {
                    return Ok(());
                }
                check_precondition(id, slot.as_ref(), if_match)?;
                *slot = None;
                Ok(())
            })
            .await
    }

    pub async fn flush(&self) {
        self.inner.flush().await
    }
}

fn check_precondition<T>(id: &str, current: Option<&Tagged<T>>, if_match: Option<&str>) -> Result<(), StoreError> {
    let ok = match (if_match, current) {
        (None, _) => true,
        (Some("*"), current) => current.is_some(),
        (Some(expected), Some(current)) => current.etag == expected,
        (Some(_), None) => false,
    };
    if ok {
        Ok(())
    } else {
        Err(StoreError::PreconditionFailed { id: id.to_string() })
    }
}

/// Hex SHA-256 of the JSON form of `value`.
pub fn compute_etag<T: Serialize>(value: &T) -> Result<String, StoreError> {
    let bytes = serde_json::to_vec(value)?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconditional_write_then_conditional() {
        let table = EtagTable::new("nsgs");
        let first = table.store_if_match("a", "v1".to_string(), None).await.unwrap();
        let second = table
            .store_if_match("a", "v2".to_string(), Some(&first))
            .await
            .unwrap();
        assert_ne!(first, second);

        let stale = table.store_if_match("a", "v3".to_string(), Some(&first)).await;
        assert!(matches!(stale, Err(StoreError::PreconditionFailed { .. })));
        assert_eq!(table.load("a").await.unwrap().value, "v2");
    }

    #[tokio::test]
    async fn wildcard_requires_existing() {
        let table = EtagTable::new("nsgs");
        assert!(table.store_if_match("a", 1, Some("*")).await.is_err());
        table.store_if_match("a", 1, None).await.unwrap();
        assert!(table.store_if_match("a", 2, Some("*")).await.is_ok());
    }

    #[tokio::test]
    async fn delete_respects_etag() {
        let table = EtagTable::new("nsgs");
        let etag = table.store_if_match("a", 1, None).await.unwrap();
        assert!(table.delete_if_match("a", Some("nope")).await.is_err());
        table.delete_if_match("a", Some(&etag)).await.unwrap();
        assert!(table.load("a").await.is_none());
        // Absent and unconditional stays idempotent.
        table.delete_if_match("a", None).await.unwrap();
    }

    #[test]
    fn etag_is_stable() {
        assert_eq!(compute_etag(&"x").unwrap(), compute_etag(&"x").unwrap());
        assert_ne!(compute_etag(&"x").unwrap(), compute_etag(&"y").unwrap());
        assert_eq!(compute_etag(&1).unwrap().len(), 64);
    }
}
