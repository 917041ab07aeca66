//! Engine data structures: shapes, models, vertex math and GPU textures.
//!
//! - `vertex` contains pure functions that expand indexed geometry into flat streams
//! - `shape` contains the renderable primitive and its constructors
//! - `model` groups the shapes of one loaded mesh file
//! - `texture` contains GPU texture wrappers and creation utilities

pub mod model;
pub mod shape;
pub mod texture;
pub mod vertex;
