//! Account tree traversal and folder naming

pub mod hierarchy;
pub mod paths;

pub use hierarchy::{HierarchyNode, LeafGallery, fetch_hierarchy, flatten_leaf_galleries};
pub use paths::{GalleryPath, normalize_segment};
