//! On-disk binary serialisation: framing constants, save, load, and the
//! post-load integrity walk.

pub mod format;
pub mod integrity;
pub mod load;
pub mod save;
pub mod strtable;

pub use integrity::verify_integrity;
pub use load::load;
pub use save::{save, SaveOptions};
