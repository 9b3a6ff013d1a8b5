//! Dependency tracking for cooked (built) content: which cooked artifacts are
//! stale relative to their sources, and what to invalidate when a source
//! changes.
//!
//! Two staleness regimes, matching how the cookers that produce these
//! artifacts work: one-to-one types compare a single mtime with no sidecar
//! ([`db::CookDatabase::check_up_to_date_one_to_one`]); many-to-one types
//! carry a JSON sidecar recording every declared source, sibling, and
//! directory dependency ([`metadata`],
//! [`db::CookDatabase::check_up_to_date_many_to_one`]). [`versions`] tracks
//! the cooker/data version pair that invalidates a whole file type at once
//! on a cooker upgrade. [`notify`] is the logging macro and the
//! file-change-notifier seam the database polls.

pub mod db;
pub mod metadata;
pub mod notify;
pub mod versions;

pub use db::CookDatabase;
pub use metadata::{DirectorySource, FileSource, Metadata};
pub use notify::{ChangeEvent, ChangeNotifier, QueueNotifier};
pub use versions::{VersionPair, VersionsFile};
