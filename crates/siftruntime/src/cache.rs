use siftcore::{Artifact, Fingerprint};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Capacity knobs for the two cache tiers. Thresholds are configuration, not
/// invariants; the defaults suit an interactive workbench session.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub dir: PathBuf,
    pub memory_capacity_bytes: u64,
    pub disk_capacity_bytes: u64,
    /// Artifacts estimated above this go disk-only.
    pub memory_item_ceiling_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".sift-cache"),
            memory_capacity_bytes: 256 * 1024 * 1024,
            disk_capacity_bytes: 2 * 1024 * 1024 * 1024,
            memory_item_ceiling_bytes: 32 * 1024 * 1024,
        }
    }
}

/// Snapshot of tier occupancy, exposed for the cache-size API and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub memory_bytes: u64,
    pub disk_entries: usize,
    pub disk_bytes: u64,
}

struct MemoryEntry {
    artifact: Arc<Artifact>,
    size: u64,
    tick: u64,
}

#[derive(Default)]
struct MemoryTier {
    entries: HashMap<Fingerprint, MemoryEntry>,
    total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DiskIndexEntry {
    size: u64,
    last_access: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DiskIndex {
    entries: HashMap<String, DiskIndexEntry>,
}

impl DiskIndex {
    fn total(&self) -> u64 {
        self.entries.values().map(|e| e.size).sum()
    }
}

struct State {
    memory: MemoryTier,
    disk: DiskIndex,
    tick: u64,
}

/// Two-tier artifact store keyed by fingerprint.
///
/// The memory tier is LRU-bounded; the disk tier writes one file per key
/// under the cache directory plus a small index recording size and
/// last-access, so eviction never re-reads payloads. A disk hit promotes the
/// artifact into memory. All disk failures degrade the operation to
/// memory-only and are logged, never surfaced to the caller.
pub struct CacheStore {
    config: CacheConfig,
    state: Mutex<State>,
}

impl CacheStore {
    /// Open (or create) a cache directory and load its index. A previously
    /// persisted index survives restarts; a missing or corrupt one is
    /// rebuilt empty.
    pub fn open(config: CacheConfig) -> Self {
        if let Err(e) = fs::create_dir_all(&config.dir) {
            tracing::warn!("Cache dir unavailable, running memory-only: {}", e);
        }
        let disk = load_index(&config.dir);
        Self {
            config,
            state: Mutex::new(State {
                memory: MemoryTier::default(),
                disk,
                tick: 0,
            }),
        }
    }

    /// Look up an artifact. Memory tier first, then disk; a disk hit is
    /// promoted into memory before returning.
    pub fn get(&self, fp: &Fingerprint) -> Option<Arc<Artifact>> {
        let mut state = self.state.lock().expect("cache lock");
        state.tick += 1;
        let tick = state.tick;

        if let Some(entry) = state.memory.entries.get_mut(fp) {
            entry.tick = tick;
            tracing::debug!("Cache hit (memory): {}", fp);
            return Some(Arc::clone(&entry.artifact));
        }

        let hex = fp.to_hex();
        if !state.disk.entries.contains_key(&hex) {
            tracing::debug!("Cache miss: {}", fp);
            return None;
        }

        let path = entry_path(&self.config.dir, fp);
        let artifact: Artifact = match fs::read(&path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| serde_json::from_slice(&bytes).map_err(|e| e.to_string()))
        {
            Ok(artifact) => artifact,
            Err(e) => {
                tracing::warn!("Failed to load cache entry {}: {}", fp, e);
                state.disk.entries.remove(&hex);
                self.persist_index(&state.disk);
                return None;
            }
        };

        tracing::debug!("Cache hit (disk): {}", fp);
        if let Some(entry) = state.disk.entries.get_mut(&hex) {
            entry.last_access = tick;
        }
        self.persist_index(&state.disk);

        let artifact = Arc::new(artifact);
        let size = artifact.size_bytes();
        self.admit_memory(&mut state, *fp, Arc::clone(&artifact), size);
        Some(artifact)
    }

    /// Store an artifact under a fingerprint. Writes both tiers unless the
    /// size estimate exceeds the memory ceiling, in which case it is
    /// disk-only. The disk write goes to a temporary path and is renamed
    /// into place, so a crash mid-write never leaves a corrupt entry
    /// visible.
    pub fn put(&self, fp: &Fingerprint, artifact: Artifact) -> Arc<Artifact> {
        let size = artifact.size_bytes();
        let artifact = Arc::new(artifact);
        // Serialization happens before any lock is taken.
        let bytes = match serde_json::to_vec(&*artifact) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!("Failed to serialize cache entry {}: {}", fp, e);
                None
            }
        };

        let mut state = self.state.lock().expect("cache lock");
        state.tick += 1;
        let tick = state.tick;

        if size <= self.config.memory_item_ceiling_bytes {
            self.admit_memory(&mut state, *fp, Arc::clone(&artifact), size);
        }

        if let Some(bytes) = bytes {
            let disk_size = bytes.len() as u64;
            match write_atomic(&entry_path(&self.config.dir, fp), &bytes) {
                Ok(()) => {
                    state.disk.entries.insert(
                        fp.to_hex(),
                        DiskIndexEntry {
                            size: disk_size,
                            last_access: tick,
                        },
                    );
                    self.evict_disk(&mut state.disk);
                    self.persist_index(&state.disk);
                }
                Err(e) => {
                    tracing::warn!("Disk tier unavailable for {}: {}", fp, e);
                }
            }
        }
        artifact
    }

    /// Drop an entry from both tiers.
    pub fn invalidate(&self, fp: &Fingerprint) {
        let mut state = self.state.lock().expect("cache lock");
        if let Some(entry) = state.memory.entries.remove(fp) {
            state.memory.total -= entry.size;
        }
        if state.disk.entries.remove(&fp.to_hex()).is_some() {
            remove_file_logged(&entry_path(&self.config.dir, fp));
            self.persist_index(&state.disk);
        }
        tracing::debug!("Invalidated cache entry: {}", fp);
    }

    /// Drop everything from both tiers.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("cache lock");
        state.memory.entries.clear();
        state.memory.total = 0;
        for hex in state.disk.entries.keys() {
            if let Some(fp) = Fingerprint::from_hex(hex) {
                remove_file_logged(&entry_path(&self.config.dir, &fp));
            }
        }
        state.disk.entries.clear();
        self.persist_index(&state.disk);
        tracing::info!("Cleared cache");
    }

    /// Total bytes held across both tiers.
    pub fn size_bytes(&self) -> u64 {
        let state = self.state.lock().expect("cache lock");
        state.memory.total + state.disk.total()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().expect("cache lock");
        CacheStats {
            memory_entries: state.memory.entries.len(),
            memory_bytes: state.memory.total,
            disk_entries: state.disk.entries.len(),
            disk_bytes: state.disk.total(),
        }
    }

    fn admit_memory(
        &self,
        state: &mut State,
        fp: Fingerprint,
        artifact: Arc<Artifact>,
        size: u64,
    ) {
        if size > self.config.memory_item_ceiling_bytes {
            return;
        }
        let tick = state.tick;
        let memory = &mut state.memory;
        if let Some(old) = memory.entries.insert(fp, MemoryEntry { artifact, size, tick }) {
            memory.total -= old.size;
        }
        memory.total += size;

        while memory.total > self.config.memory_capacity_bytes && memory.entries.len() > 1 {
            let oldest = memory
                .entries
                .iter()
                .min_by_key(|(_, e)| e.tick)
                .map(|(fp, _)| *fp);
            match oldest {
                Some(victim) => {
                    if let Some(entry) = memory.entries.remove(&victim) {
                        memory.total -= entry.size;
                        tracing::debug!("Evicted from memory tier: {}", victim);
                    }
                }
                None => break,
            }
        }
    }

    fn evict_disk(&self, disk: &mut DiskIndex) {
        while disk.total() > self.config.disk_capacity_bytes && disk.entries.len() > 1 {
            let oldest = disk
                .entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(hex, _)| hex.clone());
            match oldest {
                Some(hex) => {
                    disk.entries.remove(&hex);
                    if let Some(fp) = Fingerprint::from_hex(&hex) {
                        remove_file_logged(&entry_path(&self.config.dir, &fp));
                    }
                    tracing::debug!("Evicted from disk tier: {}", hex);
                }
                None => break,
            }
        }
    }

    fn persist_index(&self, disk: &DiskIndex) {
        let path = self.config.dir.join("index.json");
        match serde_json::to_vec(disk) {
            Ok(bytes) => {
                if let Err(e) = write_atomic(&path, &bytes) {
                    tracing::warn!("Failed to persist cache index: {}", e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize cache index: {}", e),
        }
    }
}

fn entry_path(dir: &Path, fp: &Fingerprint) -> PathBuf {
    dir.join(format!("{}.bin", fp.to_hex()))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

fn remove_file_logged(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove cache file {}: {}", path.display(), e);
        }
    }
}

fn load_index(dir: &Path) -> DiskIndex {
    let path = dir.join("index.json");
    match fs::read(&path) {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(index) => index,
            Err(e) => {
                tracing::warn!("Corrupt cache index, starting empty: {}", e);
                DiskIndex::default()
            }
        },
        Err(_) => DiskIndex::default(),
    }
}
