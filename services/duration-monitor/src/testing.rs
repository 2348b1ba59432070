//! In-memory object store used by the unit tests.

use crate::storage::{ListPage, ListRequest, ObjectStore, StorageError};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Object store backed by a map, paginating with a small fixed page size
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    page_size: usize,
    list_calls: AtomicUsize,
    failing_lists: AtomicUsize,
    failing_prefixes: Mutex<BTreeSet<String>>,
}

impl MemoryStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            page_size,
            list_calls: AtomicUsize::new(0),
            failing_lists: AtomicUsize::new(0),
            failing_prefixes: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn put(&self, key: &str, body: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), body.into());
    }

    /// Store a manifest document with the given duration field
    pub fn put_manifest(&self, key: &str, duration: &str) {
        self.put(
            key,
            serde_json::json!({ "title": "영상", "duration": duration }).to_string(),
        );
    }

    /// Make the next `count` listing calls fail
    pub fn fail_next_lists(&self, count: usize) {
        self.failing_lists.store(count, Ordering::SeqCst);
    }

    /// Make every listing under `prefix` fail
    pub fn fail_prefix(&self, prefix: &str) {
        self.failing_prefixes
            .lock()
            .unwrap()
            .insert(prefix.to_string());
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

enum Entry {
    Prefix(String),
    Key(String),
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(&self, request: &ListRequest) -> Result<ListPage, StorageError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.failing_lists.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_lists.store(remaining - 1, Ordering::SeqCst);
            return Err(StorageError::List {
                prefix: request.prefix.clone(),
                message: "injected failure".to_string(),
            });
        }

        if self
            .failing_prefixes
            .lock()
            .unwrap()
            .iter()
            .any(|p| request.prefix.starts_with(p.as_str()))
        {
            return Err(StorageError::List {
                prefix: request.prefix.clone(),
                message: "injected prefix failure".to_string(),
            });
        }

        let objects = self.objects.lock().unwrap();
        let mut prefixes = BTreeSet::new();
        let mut entries = Vec::new();

        for key in objects.keys().filter(|k| k.starts_with(&request.prefix)) {
            let rest = &key[request.prefix.len()..];
            match request.delimiter.as_deref().and_then(|d| rest.find(d).map(|i| (d, i))) {
                Some((d, i)) => {
                    let prefix = format!("{}{}{}", request.prefix, &rest[..i], d);
                    if prefixes.insert(prefix.clone()) {
                        entries.push(Entry::Prefix(prefix));
                    }
                }
                None => entries.push(Entry::Key(key.clone())),
            }
        }

        let start = request
            .continuation_token
            .as_deref()
            .map(|t| t.parse::<usize>().unwrap())
            .unwrap_or(0);
        let total = entries.len();
        let start = start.min(total);
        let end = (start + self.page_size).min(total);

        let mut page = ListPage::default();
        for entry in &entries[start..end] {
            match entry {
                Entry::Prefix(p) => page.common_prefixes.push(p.clone()),
                Entry::Key(k) => page.keys.push(k.clone()),
            }
        }
        page.next_token = (end < total).then(|| end.to_string());

        Ok(page)
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::Fetch {
                key: key.to_string(),
                message: "NoSuchKey".to_string(),
            })
    }
}
