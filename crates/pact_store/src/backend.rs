//! Storage backends.
//!
//! A closed set of backend kinds behind one enum — the 2-3 backends this
//! system needs, each carrying its own config, instead of open-ended
//! dynamic dispatch:
//!
//! - `Kv`     — local file-backed key/value store. Private storage for
//!   profiles, chat configs, chat logs, and lookup pools. Never shared.
//! - `Blob`   — content-addressed message store. `set` ignores the caller
//!   key and returns the BLAKE3 hex hash of the value as its address.
//! - `Record` — a single overwritable rendezvous slot. `set` replaces the
//!   previous record; `get` returns the latest.
//!
//! `Blob` and `Record` resolve their node URLs through a process-level
//! registry of in-memory namespaces (`mem://` scheme). Two sessions in one
//! process that configure the same URL reach the same data, which is the
//! collaborator boundary this crate models; real network clients for remote
//! endpoints plug in behind the same config surface.
//!
//! Multi-node reads and writes follow the configured consensus rule. Only
//! `first_success` is implemented: per-node failures are swallowed and the
//! next node is tried, and only total exhaustion surfaces as an error.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pact_crypto::hash::content_hash;
use pact_proto::strategy::{ConsensusRule, Node, PeerStorageConfig, StorageConfig, StorageKind};

use crate::error::StoreError;

/// Key under which the rendezvous record is stored inside its namespace.
const RECORD_SLOT: &str = "latest";

const MEM_SCHEME: &str = "mem://";

type Namespace = Arc<Mutex<HashMap<String, Vec<u8>>>>;

/// Process-level registry backing `mem://` nodes. Namespaces are created on
/// first write and shared by every backend configured with the same URL.
static MEM_REGISTRY: Lazy<Mutex<HashMap<String, Namespace>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn mem_namespace(url: &str) -> Result<Namespace, StoreError> {
    if !url.starts_with(MEM_SCHEME) {
        return Err(StoreError::NotFound(format!("unsupported node url: {url}")));
    }
    let mut registry = MEM_REGISTRY.lock();
    Ok(registry.entry(url.to_string()).or_default().clone())
}

/// The closed set of storage backends.
#[derive(Debug)]
pub enum Store {
    Kv(FileKv),
    Blob(RemoteStore),
    Record(RemoteStore),
}

impl Store {
    /// Open the local file-backed KV store.
    pub fn open_kv(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Ok(Self::Kv(FileKv::open(path.into())?))
    }

    /// Build a remote backend from its full config.
    pub fn from_config(config: &StorageConfig) -> Result<Self, StoreError> {
        match config.kind {
            StorageKind::Blob => Ok(Self::Blob(RemoteStore::new(config.clone()))),
            StorageKind::Record => Ok(Self::Record(RemoteStore::new(config.clone()))),
            StorageKind::Kv => Err(StoreError::UnsupportedOperation),
        }
    }

    /// Fetch a value. `Ok(None)` means absent, which is distinct from error.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self {
            Self::Kv(kv) => Ok(kv.get(key)),
            Self::Blob(remote) => remote.read(key),
            Self::Record(remote) => remote.read(RECORD_SLOT),
        }
    }

    /// Store a value, returning its address: the content hash for blob
    /// storage, the caller key echoed back otherwise.
    pub fn set(&mut self, key: &str, value: Vec<u8>) -> Result<String, StoreError> {
        match self {
            Self::Kv(kv) => {
                kv.set(key, value)?;
                Ok(key.to_string())
            }
            Self::Blob(remote) => {
                let address = content_hash(&value);
                remote.write(&address, value)?;
                Ok(address)
            }
            Self::Record(remote) => {
                remote.write(RECORD_SLOT, value)?;
                Ok(key.to_string())
            }
        }
    }

    pub fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        match self {
            Self::Kv(kv) => kv.delete(key),
            Self::Blob(remote) => remote.remove(key),
            Self::Record(remote) => remote.remove(RECORD_SLOT),
        }
    }

    /// Keys beginning with `prefix`. Only meaningful for the local KV store;
    /// remote backends return an empty list.
    pub fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        match self {
            Self::Kv(kv) => Ok(kv.list(prefix)),
            Self::Blob(_) | Self::Record(_) => Ok(Vec::new()),
        }
    }

    pub fn close(&mut self) -> Result<(), StoreError> {
        match self {
            Self::Kv(kv) => kv.flush(),
            Self::Blob(_) | Self::Record(_) => Ok(()),
        }
    }

    /// Public, read-only view for handshake exchange. The local KV store is
    /// private and cannot be shared.
    pub fn share(&self) -> Result<PeerStorageConfig, StoreError> {
        match self {
            Self::Kv(_) => Err(StoreError::NotShareable),
            Self::Blob(remote) | Self::Record(remote) => Ok(remote.config.share()),
        }
    }

    /// Full config for local persistence only.
    pub fn export(&self) -> Result<StorageConfig, StoreError> {
        match self {
            Self::Kv(_) => Err(StoreError::NotShareable),
            Self::Blob(remote) | Self::Record(remote) => Ok(remote.config.clone()),
        }
    }
}

/// Local key/value store: a BTreeMap flushed to a JSON file on every write.
#[derive(Debug)]
pub struct FileKv {
    path: PathBuf,
    map: BTreeMap<String, Vec<u8>>,
}

impl FileKv {
    fn open(path: PathBuf) -> Result<Self, StoreError> {
        let map = if path.exists() {
            let raw = fs::read(&path)?;
            if raw.is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_slice(&raw)?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, map })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.map.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.map.insert(key.to_string(), value);
        self.flush()
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.map.remove(key);
        self.flush()
    }

    fn list(&self, prefix: &str) -> Vec<String> {
        self.map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        let data = serde_json::to_vec(&self.map)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}

/// A remote backend: a node list plus consensus rules, resolved through the
/// in-memory registry.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    config: StorageConfig,
}

impl RemoteStore {
    fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if self.config.read_nodes.is_empty() {
            return Err(StoreError::NoNodes);
        }
        match self.config.read_rule {
            ConsensusRule::FirstSuccess => {
                first_success(&self.config.read_nodes, |node| {
                    let ns = mem_namespace(&node.url)?;
                    let value = ns.lock().get(key).cloned();
                    Ok(value)
                })
            }
            _ => Err(StoreError::ConsensusRuleUnimplemented),
        }
    }

    fn write(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        if self.config.write_nodes.is_empty() {
            return Err(StoreError::NoNodes);
        }
        match self.config.write_rule {
            ConsensusRule::FirstSuccess => {
                first_success(&self.config.write_nodes, |node| {
                    let ns = mem_namespace(&node.url)?;
                    ns.lock().insert(key.to_string(), value.clone());
                    Ok(())
                })
            }
            _ => Err(StoreError::ConsensusRuleUnimplemented),
        }
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        if self.config.write_nodes.is_empty() {
            return Err(StoreError::NoNodes);
        }
        first_success(&self.config.write_nodes, |node| {
            let ns = mem_namespace(&node.url)?;
            ns.lock().remove(key);
            Ok(())
        })
    }
}

/// Try `op` against each node in order; the first success wins. Per-node
/// failures are swallowed, total exhaustion is an error.
fn first_success<T>(
    nodes: &[Node],
    op: impl Fn(&Node) -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    for node in nodes {
        match op(node) {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::debug!(url = %node.url, error = %err, "node failed, trying next");
            }
        }
    }
    Err(StoreError::NoNodesAvailable)
}
