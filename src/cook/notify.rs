//! A small stand-in for the external file-change notifier (spec lists this
//! among the "ambient collaborators" a standalone crate can't literally call
//! out to), plus the verbosity plumbing `cook::db` uses to report what it's
//! doing — the same `displaylevel`-gated-`eprintln` idiom used elsewhere in
//! this codebase for diagnosing long-running, multi-threaded work, adapted
//! to this crate's own vocabulary rather than a logging-crate dependency.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

use crossbeam_channel::{unbounded, Receiver, Sender};

/// 0 = silent; 1 = errors only; 2 = normal; 3 = verbose.
pub static DISPLAY_LEVEL: AtomicU32 = AtomicU32::new(2);

#[inline]
pub fn display_level() -> u32 {
    DISPLAY_LEVEL.load(Ordering::Relaxed)
}

#[inline]
pub fn set_display_level(level: u32) {
    DISPLAY_LEVEL.store(level, Ordering::Relaxed);
}

/// Print to stderr when the current display level is at or above `level`.
#[macro_export]
macro_rules! notify {
    ($level:expr, $($arg:tt)*) => {
        if $crate::cook::notify::display_level() >= $level {
            eprintln!($($arg)*);
        }
    };
}

/// One file changing on disk, as reported by whatever mechanism watches the
/// filesystem (not this crate's concern — see [`ChangeNotifier`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
}

/// Stands in for an external file-change watcher. `CookDatabase::poll` calls
/// this and invalidates every reported path; it never watches the filesystem
/// itself.
pub trait ChangeNotifier {
    fn poll(&mut self) -> Vec<ChangeEvent>;
}

/// An in-process [`ChangeNotifier`] backed by an unbounded channel, so tests
/// and small tools have a concrete notifier without wiring up a real
/// filesystem watcher. Callers on other threads hold a cloned [`Sender`] and
/// push events as they observe them.
pub struct QueueNotifier {
    sender: Sender<ChangeEvent>,
    receiver: Receiver<ChangeEvent>,
}

impl QueueNotifier {
    pub fn new() -> QueueNotifier {
        let (sender, receiver) = unbounded();
        QueueNotifier { sender, receiver }
    }

    pub fn sender(&self) -> Sender<ChangeEvent> {
        self.sender.clone()
    }
}

impl Default for QueueNotifier {
    fn default() -> Self {
        QueueNotifier::new()
    }
}

impl ChangeNotifier for QueueNotifier {
    fn poll(&mut self) -> Vec<ChangeEvent> {
        self.receiver.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_notifier_drains_pending_events() {
        let mut notifier = QueueNotifier::new();
        let sender = notifier.sender();
        sender.send(ChangeEvent { path: PathBuf::from("content://a.png") }).unwrap();
        sender.send(ChangeEvent { path: PathBuf::from("content://b.png") }).unwrap();
        let events = notifier.poll();
        assert_eq!(events.len(), 2);
        assert!(notifier.poll().is_empty());
    }

    #[test]
    fn display_level_round_trips() {
        let prev = display_level();
        set_display_level(1);
        assert_eq!(display_level(), 1);
        set_display_level(prev);
    }
}
