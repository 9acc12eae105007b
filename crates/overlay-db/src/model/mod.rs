//! Transform value model — typed document values, field paths, and transform
//! operations. Pure data, no state.
//!
//! # Modules
//!
//! - [`value`] — [`FieldValue`] tagged union and [`ObjectValue`] maps.
//! - [`path`] — [`FieldPath`].
//! - [`transform`] — [`TransformOperation`].

pub mod path;
pub mod transform;
pub mod value;

pub use path::{FieldPath, FieldPathError};
pub use transform::TransformOperation;
pub use value::{FieldValue, ObjectValue};
