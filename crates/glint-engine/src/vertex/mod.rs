//! Vertex layouts and the buffer/array objects that hold vertex data.

mod layout;
mod resource;

pub use layout::{AttributeSlot, VertexAttribute, VertexLayout};
pub use resource::VertexResourceSet;
