#![allow(dead_code)]

use async_trait::async_trait;
use oss_deploy_core::config::{RunConfig, RunSettings, StorageSettings};
use oss_deploy_core::contract::{ObjectHead, ObjectStore, PutObject};
use oss_deploy_core::error::StoreError;
use oss_deploy_core::policy::CachePolicy;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub headers: CachePolicy,
    pub fingerprint: String,
}

/// In-memory bucket. Keys listed in `failing` reject uploads.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    puts: Mutex<Vec<String>>,
    failing: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(keys: &[&str]) -> Self {
        MemoryStore {
            failing: keys.iter().map(|k| k.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Seeds an object as if a previous run had uploaded `body`.
    pub fn seed(&self, key: &str, body: &[u8]) {
        let fingerprint = oss_deploy_core::fingerprint::Fingerprint::of(body).to_string();
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body: body.to_vec(),
                headers: CachePolicy::default(),
                fingerprint,
            },
        );
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn put_keys(&self) -> Vec<String> {
        let mut keys = self.puts.lock().unwrap().clone();
        keys.sort();
        keys
    }

    pub fn reset_put_log(&self) {
        self.puts.lock().unwrap().clear();
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn head(&self, key: &str) -> Result<ObjectHead, StoreError> {
        match self.objects.lock().unwrap().get(key) {
            Some(obj) => Ok(ObjectHead::found(Some(obj.fingerprint.clone()))),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    async fn put<'a>(&self, req: PutObject<'a>) -> Result<(), StoreError> {
        self.puts.lock().unwrap().push(req.key.to_string());
        if self.failing.contains(req.key) {
            return Err(StoreError::backend(format!("injected failure for {}", req.key)));
        }
        self.objects.lock().unwrap().insert(
            req.key.to_string(),
            StoredObject {
                body: req.body.to_vec(),
                headers: req.headers.clone(),
                fingerprint: req.fingerprint.to_string(),
            },
        );
        Ok(())
    }
}

pub fn settings_for(public_dir: &Path) -> RunSettings {
    RunSettings {
        public_dir: public_dir.to_path_buf(),
        storage: StorageSettings {
            region: Some("oss-cn-hangzhou".into()),
            bucket: Some("test-bucket".into()),
            access_key_id: Some("AKID".into()),
            access_key_secret: Some("SECRET".into()),
            endpoint: None,
        },
        ..RunSettings::default()
    }
}

pub fn config_for(public_dir: &Path) -> RunConfig {
    RunConfig::try_from(settings_for(public_dir)).expect("valid test config")
}

pub fn write_file(root: &Path, relative: &str, content: &[u8]) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}
