//! EBML primitives shared by the parser and the output builder.

mod ids;
pub mod read;
pub mod vint;
pub mod write;

pub use ids::ElementId;
pub use read::{read_element_data, read_element_header, ElementHeader, ElementSlice};
