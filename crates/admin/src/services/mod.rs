//! Business logic services for admin.

pub mod media;

pub use media::{MediaError, MediaStore};
