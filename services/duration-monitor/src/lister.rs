use crate::storage::{ListPage, ListRequest, ObjectStore, StorageError};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Lists folders and manifests, hiding continuation-token pagination
#[derive(Clone)]
pub struct StorageLister {
    store: Arc<dyn ObjectStore>,
    manifest_dir: String,
    max_keys: Option<i32>,
}

impl StorageLister {
    pub fn new(store: Arc<dyn ObjectStore>, manifest_dir: impl Into<String>) -> Self {
        Self {
            store,
            manifest_dir: manifest_dir.into(),
            max_keys: None,
        }
    }

    /// Set the page size used for every listing request
    pub fn with_max_keys(mut self, max_keys: Option<i32>) -> Self {
        self.max_keys = max_keys;
        self
    }

    /// List every folder prefix directly under `base_prefix`
    #[instrument(skip(self))]
    pub async fn list_folders(&self, base_prefix: &str) -> Result<Vec<String>, StorageError> {
        let request = ListRequest {
            prefix: ensure_trailing_slash(base_prefix),
            delimiter: Some("/".to_string()),
            continuation_token: None,
            max_keys: self.max_keys,
        };

        let mut folders = Vec::new();
        self.for_each_page(request, |page| folders.extend(page.common_prefixes))
            .await?;

        debug!(count = folders.len(), "Folders listed");
        Ok(folders)
    }

    /// List every `.json` manifest key under the folder's manifest directory
    #[instrument(skip(self))]
    pub async fn list_manifest_keys(&self, folder_prefix: &str) -> Result<Vec<String>, StorageError> {
        let request = ListRequest {
            prefix: format!("{}{}", ensure_trailing_slash(folder_prefix), self.manifest_dir),
            delimiter: None,
            continuation_token: None,
            max_keys: self.max_keys,
        };

        let mut keys = Vec::new();
        let mut total_objects = 0usize;
        self.for_each_page(request, |page| {
            total_objects += page.keys.len();
            keys.extend(page.keys.into_iter().filter(|k| k.ends_with(".json")));
        })
        .await?;

        debug!(
            total_objects = total_objects,
            manifests = keys.len(),
            "Manifest keys listed"
        );
        Ok(keys)
    }

    /// Follow continuation tokens until the backend reports the last page.
    /// The first failing page aborts the whole listing.
    async fn for_each_page<F>(&self, mut request: ListRequest, mut on_page: F) -> Result<(), StorageError>
    where
        F: FnMut(ListPage),
    {
        let mut pages = 0usize;
        loop {
            let mut page = self.store.list_page(&request).await?;
            pages += 1;

            let next = page.next_token.take();
            on_page(page);

            match next {
                Some(token) => request.continuation_token = Some(token),
                None => break,
            }
        }

        debug!(prefix = %request.prefix, pages = pages, "Listing complete");
        Ok(())
    }
}

fn ensure_trailing_slash(prefix: &str) -> String {
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{}/", prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MockObjectStore;
    use crate::testing::MemoryStore;

    fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new(2));
        for folder in ["batch1", "batch2", "batch3", "배치4", "batch5"] {
            store.put_manifest(&format!("raw/uploads/{folder}/manifests/a.json"), "0:10:00");
        }
        store.put("raw/uploads/readme.txt", "not a folder");
        store
    }

    #[tokio::test]
    async fn test_list_folders_follows_pagination() {
        let store = seeded_store();
        let lister = StorageLister::new(store.clone(), "manifests/");

        let folders = lister.list_folders("raw/uploads/").await.unwrap();

        assert_eq!(
            folders,
            vec![
                "raw/uploads/batch1/",
                "raw/uploads/batch2/",
                "raw/uploads/batch3/",
                "raw/uploads/batch5/",
                "raw/uploads/배치4/",
            ]
        );
        // five prefixes plus one plain key, two entries per page
        assert_eq!(store.list_calls(), 3);
    }

    #[tokio::test]
    async fn test_list_folders_adds_missing_slash() {
        let store = seeded_store();
        let lister = StorageLister::new(store, "manifests/");

        let folders = lister.list_folders("raw/uploads").await.unwrap();
        assert_eq!(folders.len(), 5);
    }

    #[tokio::test]
    async fn test_list_manifest_keys_filters_json() {
        let store = Arc::new(MemoryStore::new(2));
        for i in 0..5 {
            store.put_manifest(&format!("raw/uploads/b/manifests/{i}.json"), "0:01:00");
        }
        store.put("raw/uploads/b/manifests/thumb.jpg", vec![0u8; 4]);
        store.put("raw/uploads/b/videos/0.json", "{}");

        let lister = StorageLister::new(store, "manifests/");
        let keys = lister.list_manifest_keys("raw/uploads/b/").await.unwrap();

        assert_eq!(keys.len(), 5);
        assert!(keys.iter().all(|k| k.starts_with("raw/uploads/b/manifests/")));
        assert!(keys.iter().all(|k| k.ends_with(".json")));
    }

    #[tokio::test]
    async fn test_list_manifest_keys_empty_folder() {
        let store = Arc::new(MemoryStore::new(10));
        let lister = StorageLister::new(store, "manifests/");

        let keys = lister.list_manifest_keys("raw/uploads/empty/").await.unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn test_page_failure_aborts_listing() {
        let mut store = MockObjectStore::new();
        store
            .expect_list_page()
            .withf(|req| req.continuation_token.is_none())
            .times(1)
            .returning(|_| {
                Ok(ListPage {
                    common_prefixes: vec!["raw/uploads/a/".to_string()],
                    keys: vec![],
                    next_token: Some("t1".to_string()),
                })
            });
        store
            .expect_list_page()
            .withf(|req| req.continuation_token.as_deref() == Some("t1"))
            .times(1)
            .returning(|req| {
                Err(StorageError::List {
                    prefix: req.prefix.clone(),
                    message: "connection reset".to_string(),
                })
            });

        let lister = StorageLister::new(Arc::new(store), "manifests/");
        let result = lister.list_folders("raw/uploads/").await;

        assert!(matches!(result, Err(StorageError::List { .. })));
    }

    #[tokio::test]
    async fn test_max_keys_forwarded() {
        let mut store = MockObjectStore::new();
        store
            .expect_list_page()
            .withf(|req| req.max_keys == Some(50))
            .times(1)
            .returning(|_| Ok(ListPage::default()));

        let lister = StorageLister::new(Arc::new(store), "manifests/").with_max_keys(Some(50));
        let folders = lister.list_folders("raw/uploads/").await.unwrap();
        assert!(folders.is_empty());
    }

    #[test]
    fn test_ensure_trailing_slash() {
        assert_eq!(ensure_trailing_slash("a/b"), "a/b/");
        assert_eq!(ensure_trailing_slash("a/b/"), "a/b/");
        assert_eq!(ensure_trailing_slash(""), "");
    }
}
