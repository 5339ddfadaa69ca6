//! Account hierarchy loading and flattening
//!
//! The account is a tree of collections whose leaves are galleries. The
//! tree is fetched in one call, then flattened into an ordered list of
//! galleries, each carrying its precomputed folder path so no later stage
//! needs to walk back up the tree.

use roxmltree::Node;
use tracing::{debug, info, warn};

use crate::api::auth::Session;
use crate::api::envelope;
use crate::api::transport::{ApiRequest, Transport};
use crate::core::{ExportError, Result};
use crate::crawl::paths::GalleryPath;

const HIERARCHY_METHOD: &str = "LoadGroupHierarchy";
const UNTITLED: &str = "Untitled";

/// A node of the account tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HierarchyNode {
    Gallery {
        id: i64,
        title: String,
    },
    Collection {
        id: i64,
        title: String,
        children: Vec<HierarchyNode>,
    },
}

impl HierarchyNode {
    pub fn id(&self) -> i64 {
        match self {
            HierarchyNode::Gallery { id, .. } | HierarchyNode::Collection { id, .. } => *id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            HierarchyNode::Gallery { title, .. } | HierarchyNode::Collection { title, .. } => title,
        }
    }

    pub fn children(&self) -> &[HierarchyNode] {
        match self {
            HierarchyNode::Gallery { .. } => &[],
            HierarchyNode::Collection { children, .. } => children,
        }
    }

    /// Number of galleries anywhere below this node (itself included)
    pub fn gallery_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                HierarchyNode::Gallery { .. } => count += 1,
                HierarchyNode::Collection { children, .. } => stack.extend(children),
            }
        }
        count
    }
}

/// A gallery selected for export, with its resolved folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafGallery {
    pub id: i64,
    pub title: String,
    pub path: GalleryPath,
}

/// Fetch the account tree
///
/// A non-success answer or a response without a tree yields `Ok(None)`,
/// which ends the run with nothing to do. Transport failures propagate.
pub async fn fetch_hierarchy(
    transport: &dyn Transport,
    session: &Session,
    login_name: &str,
) -> Result<Option<HierarchyNode>> {
    let request = ApiRequest::new(HIERARCHY_METHOD)
        .field("loginName", login_name)
        .with_session(session);

    let body = match transport.call(&request).await {
        Ok(body) => body,
        Err(ExportError::ApiStatus { status, body, .. }) => {
            warn!(status, body = %body.trim(), "Hierarchy request rejected");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let root = parse_hierarchy(&body)?;
    if let Some(root) = &root {
        info!(
            id = root.id(),
            title = root.title(),
            galleries = root.gallery_count(),
            "Loaded account hierarchy"
        );
    }
    Ok(root)
}

/// Parse a hierarchy response into a tree
pub fn parse_hierarchy(body: &str) -> Result<Option<HierarchyNode>> {
    let doc = envelope::parse(HIERARCHY_METHOD, body)?;
    Ok(envelope::find(&doc, "LoadGroupHierarchyResult").map(parse_collection))
}

fn parse_collection(node: Node<'_, '_>) -> HierarchyNode {
    let children = envelope::child(node, "Elements")
        .map(|elements| {
            elements
                .children()
                .filter(|n| n.is_element())
                .filter_map(|element| match element.tag_name().name() {
                    "Group" => Some(parse_collection(element)),
                    "PhotoSet" => Some(HierarchyNode::Gallery {
                        id: envelope::child_id(element, "Id").unwrap_or(0),
                        title: title_of(element),
                    }),
                    other => {
                        debug!(element = other, "Ignoring unknown hierarchy element");
                        None
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    HierarchyNode::Collection {
        id: envelope::child_id(node, "Id").unwrap_or(0),
        title: title_of(node),
        children,
    }
}

fn title_of(node: Node<'_, '_>) -> String {
    envelope::child_text(node, "Title").unwrap_or(UNTITLED).to_string()
}

/// Flatten the tree into galleries in pre-order
///
/// With `include_collections` false only galleries that sit directly under
/// the root are returned.
pub fn flatten_leaf_galleries(root: &HierarchyNode, include_collections: bool) -> Vec<LeafGallery> {
    let root_path = GalleryPath::root(root.title());
    if let HierarchyNode::Gallery { id, title } = root {
        return vec![LeafGallery {
            id: *id,
            title: title.clone(),
            path: root_path,
        }];
    }

    let mut leaves = Vec::new();
    let mut stack: Vec<(&HierarchyNode, GalleryPath)> = root
        .children()
        .iter()
        .rev()
        .map(|child| (child, root_path.child(child.title())))
        .collect();

    while let Some((node, path)) = stack.pop() {
        match node {
            HierarchyNode::Gallery { id, title } => {
                if path.exceeds_warn_len() {
                    warn!(len = path.len(), path = %path, "Folder path is long and may hit filesystem limits");
                }
                leaves.push(LeafGallery {
                    id: *id,
                    title: title.clone(),
                    path,
                });
            }
            HierarchyNode::Collection { children, .. } if include_collections => {
                for child in children.iter().rev() {
                    let child_path = path.child(child.title());
                    stack.push((child, child_path));
                }
            }
            HierarchyNode::Collection { id, .. } => {
                debug!(collection = id, "Skipping nested collection");
            }
        }
    }
    leaves
}
