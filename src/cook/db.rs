//! The cook dependency database itself: up-to-date and metadata caches under
//! a single mutex, reverse-dependency edges for transitive invalidation, and
//! the cooker-versions mismatch sweep.
//!
//! One-to-one cooked types (most of them) carry no sidecar and are checked
//! by straight mtime comparison; many-to-one types (`Effect`, `ScriptProject`,
//! `SoundProject`, `UiMovie`) carry the sidecar metadata this module loads
//! through [`crate::cook::metadata`].

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rayon::prelude::*;
use walkdir::WalkDir;

use crate::error::CookError;
use crate::notify;
use crate::platform::FileTypeTag;
use crate::symbol::SymbolTable;

use super::metadata::{self, Metadata};
use super::notify::{ChangeEvent, ChangeNotifier};
use super::versions::VersionsFile;

/// Texture variants this engine build recognises. Only one extension is
/// registered in [`FileTypeTag`] today, so family invalidation currently
/// degenerates to invalidating the single changed path — see DESIGN.md for
/// why this is a resolved simplification rather than a bug.
const TEXTURE_FAMILY_EXTENSIONS: &[&str] = &["png"];

#[derive(Default)]
struct State {
    up_to_date: HashMap<PathBuf, bool>,
    metadata: HashMap<PathBuf, Metadata>,
    file_dependents: HashMap<PathBuf, HashSet<PathBuf>>,
    directory_dependents: HashMap<PathBuf, HashSet<PathBuf>>,
}

/// Multi-reader multi-writer: every public method takes the single internal
/// lock for its duration. There is no background work; invalidation runs
/// synchronously inside [`CookDatabase::poll`] and [`CookDatabase::invalidate`].
pub struct CookDatabase {
    state: Mutex<State>,
    worker_threads: usize,
}

impl CookDatabase {
    pub fn new() -> CookDatabase {
        CookDatabase { state: Mutex::new(State::default()), worker_threads: num_cpus::get() }
    }

    /// Worker count this database sizes its directory-enumeration rayon
    /// scope to, defaulted from the host's core count.
    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    /// One-to-one staleness check: up to date iff the cooked artifact's mtime
    /// equals the declared source's mtime. Either path missing is stale.
    pub fn check_up_to_date_one_to_one(&self, artifact: &Path, source: &Path) -> Result<bool, CookError> {
        if let Some(cached) = self.cached_up_to_date(artifact) {
            return Ok(cached);
        }
        let result = matches!((mtime_of(artifact)?, mtime_of(source)?), (Some(a), Some(s)) if a == s);
        let mut state = self.state.lock().unwrap();
        state.up_to_date.insert(artifact.to_path_buf(), result);
        state.file_dependents.entry(source.to_path_buf()).or_default().insert(artifact.to_path_buf());
        Ok(result)
    }

    /// Many-to-one staleness check: loads (and caches) the artifact's sidecar
    /// metadata and compares its recorded versions, timestamps, and source
    /// list against the current on-disk state.
    pub fn check_up_to_date_many_to_one(&self, artifact: &Path, cooker_version: u32, data_version: u32, symbols: &mut SymbolTable) -> Result<bool, CookError> {
        if let Some(cached) = self.cached_up_to_date(artifact) {
            return Ok(cached);
        }
        let up_to_date = match self.load_metadata(artifact, symbols)? {
            Some(meta) => self.verify_metadata(artifact, &meta, cooker_version, data_version, symbols)?,
            None => false,
        };
        self.state.lock().unwrap().up_to_date.insert(artifact.to_path_buf(), up_to_date);
        Ok(up_to_date)
    }

    fn cached_up_to_date(&self, artifact: &Path) -> Option<bool> {
        self.state.lock().unwrap().up_to_date.get(artifact).copied()
    }

    fn load_metadata(&self, artifact: &Path, symbols: &mut SymbolTable) -> Result<Option<Metadata>, CookError> {
        if let Some(meta) = self.state.lock().unwrap().metadata.get(artifact) {
            return Ok(Some(meta.clone()));
        }
        let sidecar = sidecar_path(artifact);
        if !sidecar.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&sidecar)?;
        let meta = metadata::parse(&bytes, symbols)?;
        self.register_dependencies(artifact, &meta, symbols);
        self.state.lock().unwrap().metadata.insert(artifact.to_path_buf(), meta.clone());
        Ok(Some(meta))
    }

    fn register_dependencies(&self, artifact: &Path, meta: &Metadata, symbols: &SymbolTable) {
        let mut state = self.state.lock().unwrap();
        for source in meta.sources.iter().chain(meta.siblings.iter()) {
            if let Some(name) = symbols.resolve(source.path.symbol) {
                state.file_dependents.entry(PathBuf::from(name)).or_default().insert(artifact.to_path_buf());
            }
        }
        for dir in &meta.directory_sources {
            if let Some(name) = symbols.resolve(dir.path.symbol) {
                state.directory_dependents.entry(PathBuf::from(name)).or_default().insert(artifact.to_path_buf());
            }
        }
    }

    fn verify_metadata(&self, artifact: &Path, meta: &Metadata, cooker_version: u32, data_version: u32, symbols: &SymbolTable) -> Result<bool, CookError> {
        if meta.cooker_version != cooker_version || meta.data_version != data_version {
            return Ok(false);
        }
        if mtime_of(artifact)? != Some(meta.cooked_timestamp) {
            return Ok(false);
        }
        for source in meta.sources.iter().chain(meta.siblings.iter()) {
            let Some(name) = symbols.resolve(source.path.symbol) else { return Ok(false) };
            if mtime_of(Path::new(name))? != Some(source.timestamp) {
                return Ok(false);
            }
        }
        for dir in &meta.directory_sources {
            let Some(name) = symbols.resolve(dir.path.symbol) else { return Ok(false) };
            if self.count_directory_sources(Path::new(name)) != dir.file_count {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Recursively count source files under `dir` whose extension the
    /// file-type table recognises, using a rayon scope sized to
    /// [`CookDatabase::worker_threads`].
    fn count_directory_sources(&self, dir: &Path) -> u32 {
        let entries: Vec<PathBuf> = WalkDir::new(dir).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()).map(|e| e.into_path()).collect();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(self.worker_threads.max(1)).build();
        let count = match pool {
            Ok(pool) => pool.install(|| entries.par_iter().filter(|p| is_recognised_source(p)).count()),
            Err(_) => entries.iter().filter(|p| is_recognised_source(p)).count(),
        };
        count as u32
    }

    /// Load the cooker-versions file, compare it to `current`, and if any
    /// file type's recorded versions differ, delete every cooked artifact of
    /// the mismatched types under `content_root` and rewrite the versions
    /// file. Called once at startup, before any `check_up_to_date` call.
    pub fn process_versions(&self, versions_path: &Path, content_root: &Path, current: &VersionsFile) -> Result<(), CookError> {
        let on_disk = if versions_path.exists() {
            VersionsFile::decode(&std::fs::read(versions_path)?)?
        } else {
            VersionsFile::default()
        };
        let changed: Vec<FileTypeTag> = super::versions::ALL_FILE_TYPES.into_iter().filter(|&ty| on_disk.get(ty) != current.get(ty)).collect();
        if changed.is_empty() {
            return Ok(());
        }
        notify!(2, "cook: {} file type(s) changed cooker/data version, purging cooked outputs", changed.len());
        delete_cooked_of_types(content_root, &changed)?;
        std::fs::write(versions_path, current.encode())?;
        let mut state = self.state.lock().unwrap();
        state.up_to_date.clear();
        state.metadata.clear();
        Ok(())
    }

    /// Drain `notifier` and invalidate every reported path and its
    /// transitive dependents.
    pub fn poll(&self, notifier: &mut dyn ChangeNotifier) {
        for ChangeEvent { path } in notifier.poll() {
            notify!(3, "cook: invalidating {}", path.display());
            self.invalidate(&path);
        }
    }

    /// Invalidate `path` (and, if it's a texture-family member, its sibling
    /// variants) plus every transitive dependent reachable through the
    /// reverse file/directory edges.
    pub fn invalidate(&self, path: &Path) {
        let mut state = self.state.lock().unwrap();
        let mut queue: Vec<PathBuf> = vec![path.to_path_buf()];
        if is_texture_family_path(path) {
            queue.extend(texture_family_siblings(path));
        }
        let mut seen = HashSet::new();
        while let Some(p) = queue.pop() {
            if !seen.insert(p.clone()) {
                continue;
            }
            state.up_to_date.remove(&p);
            state.metadata.remove(&p);
            if let Some(dependents) = state.file_dependents.get(&p) {
                queue.extend(dependents.iter().cloned());
            }
            if let Some(dependents) = state.directory_dependents.get(&p) {
                queue.extend(dependents.iter().cloned());
            }
        }
    }
}

impl Default for CookDatabase {
    fn default() -> Self {
        CookDatabase::new()
    }
}

fn sidecar_path(artifact: &Path) -> PathBuf {
    let mut name = artifact.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".json");
    artifact.with_file_name(name)
}

fn mtime_of(path: &Path) -> Result<Option<u64>, CookError> {
    match std::fs::metadata(path) {
        Ok(meta) => {
            let modified = meta.modified()?;
            let ft = filetime::FileTime::from_system_time(modified);
            Ok(Some(ft.unix_seconds() as u64))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CookError::from(e)),
    }
}

fn is_recognised_source(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).map(|n| FileTypeTag::classify(n).0 != FileTypeTag::Unknown).unwrap_or(false)
}

fn is_texture_family_path(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).map(|n| FileTypeTag::classify(n).0.is_texture_family()).unwrap_or(false)
}

fn texture_family_siblings(path: &Path) -> Vec<PathBuf> {
    let stem = path.with_extension("");
    TEXTURE_FAMILY_EXTENSIONS.iter().map(|ext| stem.with_extension(ext)).filter(|p| p != path).collect()
}

fn delete_cooked_of_types(content_root: &Path, types: &[FileTypeTag]) -> Result<(), CookError> {
    for entry in WalkDir::new(content_root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else { continue };
        let (tag, _) = FileTypeTag::classify(name);
        if types.contains(&tag) {
            std::fs::remove_file(entry.path())?;
            let sidecar = sidecar_path(entry.path());
            if sidecar.exists() {
                std::fs::remove_file(&sidecar)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::DirectoryTag;
    use crate::value::FilePath;

    #[test]
    fn one_to_one_is_up_to_date_when_mtimes_match() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("x.png");
        let artifact = dir.path().join("x.tex0");
        std::fs::write(&source, b"src").unwrap();
        std::fs::write(&artifact, b"cooked").unwrap();
        let now = filetime::FileTime::from_system_time(std::time::SystemTime::now());
        filetime::set_file_mtime(&source, now).unwrap();
        filetime::set_file_mtime(&artifact, now).unwrap();

        let db = CookDatabase::new();
        assert!(db.check_up_to_date_one_to_one(&artifact, &source).unwrap());
    }

    #[test]
    fn one_to_one_is_stale_when_source_is_newer() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("x.png");
        let artifact = dir.path().join("x.tex0");
        std::fs::write(&artifact, b"cooked").unwrap();
        let old = filetime::FileTime::from_unix_time(1_000, 0);
        filetime::set_file_mtime(&artifact, old).unwrap();
        std::fs::write(&source, b"src").unwrap();
        let new = filetime::FileTime::from_unix_time(2_000, 0);
        filetime::set_file_mtime(&source, new).unwrap();

        let db = CookDatabase::new();
        assert!(!db.check_up_to_date_one_to_one(&artifact, &source).unwrap());
    }

    #[test]
    fn many_to_one_checks_sidecar_fields() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.fx");
        let artifact = dir.path().join("a.effect0");
        std::fs::write(&source, b"src").unwrap();
        std::fs::write(&artifact, b"cooked").unwrap();

        let mut symbols = SymbolTable::new();
        let ts = mtime_of(&source).unwrap().unwrap();
        let cooked_ts = mtime_of(&artifact).unwrap().unwrap();
        let symbol = symbols.intern(source.to_str().unwrap());
        let meta = Metadata {
            cooker_version: 1,
            data_version: 1,
            cooked_timestamp: cooked_ts,
            sources: vec![crate::cook::metadata::FileSource {
                path: FilePath { directory: DirectoryTag::Content, file_type: FileTypeTag::Effect, symbol },
                timestamp: ts,
            }],
            siblings: Vec::new(),
            directory_sources: Vec::new(),
        };
        let text = metadata::write(&meta, &symbols);
        std::fs::write(sidecar_path(&artifact), text).unwrap();

        let db = CookDatabase::new();
        assert!(db.check_up_to_date_many_to_one(&artifact, 1, 1, &mut symbols).unwrap());
    }

    #[test]
    fn invalidate_propagates_to_dependents() {
        let db = CookDatabase::new();
        let source = PathBuf::from("content://tex/a.png");
        let artifact = PathBuf::from("content://tex/a.tex0");
        db.state.lock().unwrap().up_to_date.insert(artifact.clone(), true);
        db.state.lock().unwrap().file_dependents.entry(source.clone()).or_default().insert(artifact.clone());

        db.invalidate(&source);

        assert!(!db.state.lock().unwrap().up_to_date.contains_key(&artifact));
    }
}
