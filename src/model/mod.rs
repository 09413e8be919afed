//! # Knowledge Graph Model
//!
//! Plain data types shared by the store, the similarity index, the
//! integrity checker and the export helpers.
//!
//! Design rule: relationships reference entities by canonical name, never
//! by embedded copies. The live entity is always looked up in the owning
//! graph's node map. This module is pure data with no I/O.

pub mod entity;
pub mod relationship;
pub mod path;

pub use entity::Entity;
pub use relationship::Relationship;
pub use path::{PathWeighting, RankedPath};
