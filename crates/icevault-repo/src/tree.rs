//! Tree loading and path walking.
//!
//! Trees are content-addressed and form a DAG across snapshots; the walk
//! loads one tree at a time and never materializes the graph.

use icevault_core::{BlobType, Id, Node, NodeType, Snapshot, Tree, VaultError, VaultResult};

use crate::index::BlobIndex;
use crate::pack::PackReader;

/// Result of a path walk: the directory listing at the target, and the
/// matched node (`None` when the walk ends at the snapshot root).
#[derive(Debug, Clone)]
pub struct Browse {
    pub tree: Tree,
    pub node: Option<Node>,
}

/// Load one tree blob and decode its listing.
pub async fn load_tree(index: &BlobIndex, packs: &PackReader, id: &Id) -> VaultResult<Tree> {
    let location = index.find(id, BlobType::Tree)?;
    let bytes = packs.read_blob(*id, location).await?;
    serde_json::from_slice(&bytes).map_err(|e| VaultError::Format(format!("tree {id}: {e}")))
}

/// Path segments, with empty components and `.` discarded.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect()
}

/// Walk `path` from the snapshot root.
///
/// Intermediate segments must be directories. For a final directory
/// segment the returned tree is that directory's own listing; for any
/// other node kind it is the listing containing the node.
pub async fn browse(
    index: &BlobIndex,
    packs: &PackReader,
    snapshot: &Snapshot,
    path: &str,
) -> VaultResult<Browse> {
    let segments = split_path(path);
    let mut tree = load_tree(index, packs, &snapshot.tree).await?;

    if segments.is_empty() {
        return Ok(Browse { tree, node: None });
    }

    let (descend, last) = segments.split_at(segments.len() - 1);
    for (i, segment) in descend.iter().enumerate() {
        let node = tree
            .find(segment)
            .ok_or_else(|| VaultError::PathNotFound(segments[..=i].join("/")))?;
        let subtree = match (node.node_type, node.subtree) {
            (NodeType::Dir, Some(subtree)) => subtree,
            _ => return Err(VaultError::NotADirectory(segments[..=i].join("/"))),
        };
        tree = load_tree(index, packs, &subtree).await?;
    }

    let node = tree
        .find(last[0])
        .cloned()
        .ok_or_else(|| VaultError::PathNotFound(segments.join("/")))?;

    if let (NodeType::Dir, Some(subtree)) = (node.node_type, node.subtree) {
        let listing = load_tree(index, packs, &subtree).await?;
        return Ok(Browse {
            tree: listing,
            node: Some(node),
        });
    }
    Ok(Browse {
        tree,
        node: Some(node),
    })
}
