//! Source tree expansion
//!
//! Turns a set of source roots (data objects or collections) into a flat,
//! lazily-produced sequence of data objects. Traversal is pre-order and
//! iterative: an explicit worklist rather than recursion, so depth is bounded
//! and the traversal is testable against an in-memory tree.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::source::{SourceLeaf, SourceNode};
use crate::traits::SourceStore;

/// Resolve CLI-supplied paths to source nodes, failing fast on the first
/// relative or nonexistent path
pub async fn resolve_roots(source: &dyn SourceStore, paths: &[String]) -> Result<Vec<SourceNode>> {
    let mut roots = Vec::with_capacity(paths.len());

    for path in paths {
        if !path.starts_with('/') {
            return Err(Error::SourceNotAbsolute(path.clone()));
        }
        roots.push(source.resolve(path).await?);
    }

    Ok(roots)
}

/// A lazy, depth-first expansion of source roots into data objects
///
/// Within a collection, direct child data objects come before any
/// subcollection content; subcollections expand in enumeration order. The
/// order is deterministic for identical tree snapshots. Expansion is
/// single-pass: restarting requires re-expanding from the roots.
pub struct Expansion<'a> {
    source: &'a dyn SourceStore,
    recursive: bool,
    queue: VecDeque<SourceNode>,
}

impl<'a> Expansion<'a> {
    pub fn new(source: &'a dyn SourceStore, roots: Vec<SourceNode>, recursive: bool) -> Self {
        Self {
            source,
            recursive,
            queue: roots.into(),
        }
    }

    /// Produce the next data object, descending into collections as needed
    ///
    /// A collection popped without the recursive flag yields
    /// [`Error::CannotDescend`] for that root; data objects already produced
    /// from prior roots are unaffected.
    pub async fn next(&mut self) -> Option<Result<SourceLeaf>> {
        loop {
            match self.queue.pop_front()? {
                SourceNode::Leaf(leaf) => return Some(Ok(leaf)),
                SourceNode::Collection(path) => {
                    if !self.recursive {
                        return Some(Err(Error::CannotDescend(path)));
                    }

                    let (leaves, collections) = match self.source.list_children(&path).await {
                        Ok(children) => children,
                        Err(err) => return Some(Err(err)),
                    };

                    // Children go to the front of the worklist, data objects
                    // ahead of subcollections, both in enumeration order
                    for collection in collections.into_iter().rev() {
                        self.queue.push_front(SourceNode::Collection(collection));
                    }
                    for leaf in leaves.into_iter().rev() {
                        self.queue.push_front(SourceNode::Leaf(leaf));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::source::Avu;
    use crate::traits::ByteStream;

    /// In-memory source tree for traversal tests
    struct FakeTree {
        // collection path -> (child leaves, child collections)
        collections: HashMap<String, (Vec<SourceLeaf>, Vec<String>)>,
        leaves: HashMap<String, SourceLeaf>,
    }

    impl FakeTree {
        fn new() -> Self {
            Self {
                collections: HashMap::new(),
                leaves: HashMap::new(),
            }
        }

        fn leaf(mut self, path: &str) -> Self {
            self.leaves.insert(path.into(), SourceLeaf::new(path, 1));
            self
        }

        fn collection(mut self, path: &str, leaves: &[&str], collections: &[&str]) -> Self {
            let leaves = leaves.iter().map(|p| SourceLeaf::new(*p, 1)).collect();
            let collections = collections.iter().map(|p| p.to_string()).collect();
            self.collections.insert(path.into(), (leaves, collections));
            self
        }
    }

    #[async_trait]
    impl SourceStore for FakeTree {
        async fn resolve(&self, path: &str) -> Result<SourceNode> {
            if let Some(leaf) = self.leaves.get(path) {
                return Ok(SourceNode::Leaf(leaf.clone()));
            }
            if self.collections.contains_key(path) {
                return Ok(SourceNode::Collection(path.to_string()));
            }
            Err(Error::SourceNotFound(path.to_string()))
        }

        async fn list_children(&self, collection: &str) -> Result<(Vec<SourceLeaf>, Vec<String>)> {
            self.collections
                .get(collection)
                .cloned()
                .ok_or_else(|| Error::SourceNotFound(collection.to_string()))
        }

        async fn open(&self, _leaf: &SourceLeaf) -> Result<ByteStream> {
            Ok(Box::new(std::io::Cursor::new(Vec::new())))
        }

        async fn attributes(&self, _leaf: &SourceLeaf) -> Result<Vec<Avu>> {
            Ok(Vec::new())
        }
    }

    async fn collect_paths(expansion: &mut Expansion<'_>) -> Vec<String> {
        let mut paths = Vec::new();
        while let Some(result) = expansion.next().await {
            paths.push(result.expect("expansion should succeed").path);
        }
        paths
    }

    #[tokio::test]
    async fn test_resolve_roots_rejects_relative_paths() {
        let tree = FakeTree::new().leaf("/zone/a");
        let err = resolve_roots(&tree, &["zone/a".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SourceNotAbsolute(_)));
    }

    #[tokio::test]
    async fn test_resolve_roots_rejects_missing_paths() {
        let tree = FakeTree::new().leaf("/zone/a");
        let err = resolve_roots(&tree, &["/zone/missing".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_leaf_roots_pass_through_in_order() {
        let tree = FakeTree::new().leaf("/zone/a").leaf("/zone/b");
        let roots = resolve_roots(&tree, &["/zone/b".to_string(), "/zone/a".to_string()])
            .await
            .unwrap();

        let mut expansion = Expansion::new(&tree, roots, false);
        assert_eq!(collect_paths(&mut expansion).await, ["/zone/b", "/zone/a"]);
    }

    #[tokio::test]
    async fn test_collection_without_recursion_cannot_descend() {
        let tree = FakeTree::new()
            .leaf("/zone/a")
            .collection("/zone/coll", &["/zone/coll/x"], &[]);
        let roots = resolve_roots(
            &tree,
            &["/zone/a".to_string(), "/zone/coll".to_string()],
        )
        .await
        .unwrap();

        let mut expansion = Expansion::new(&tree, roots, false);

        // The leaf root before the collection is still delivered
        let first = expansion.next().await.unwrap().unwrap();
        assert_eq!(first.path, "/zone/a");

        // The collection itself yields CannotDescend, and nothing from it
        let err = expansion.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::CannotDescend(ref path) if path == "/zone/coll"));
        assert!(expansion.next().await.is_none());
    }

    #[tokio::test]
    async fn test_recursive_expansion_is_pre_order() {
        // /zone/top
        //   ├── a, b           (data objects)
        //   ├── /zone/top/one  (leaf: one/x; subcollection: one/deep -> y)
        //   └── /zone/top/two  (leaf: two/z)
        let tree = FakeTree::new()
            .collection(
                "/zone/top",
                &["/zone/top/a", "/zone/top/b"],
                &["/zone/top/one", "/zone/top/two"],
            )
            .collection(
                "/zone/top/one",
                &["/zone/top/one/x"],
                &["/zone/top/one/deep"],
            )
            .collection("/zone/top/one/deep", &["/zone/top/one/deep/y"], &[])
            .collection("/zone/top/two", &["/zone/top/two/z"], &[]);

        let roots = resolve_roots(&tree, &["/zone/top".to_string()]).await.unwrap();
        let mut expansion = Expansion::new(&tree, roots, true);

        assert_eq!(
            collect_paths(&mut expansion).await,
            [
                "/zone/top/a",
                "/zone/top/b",
                "/zone/top/one/x",
                "/zone/top/one/deep/y",
                "/zone/top/two/z",
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_collection_yields_nothing() {
        let tree = FakeTree::new().collection("/zone/empty", &[], &[]);
        let roots = resolve_roots(&tree, &["/zone/empty".to_string()]).await.unwrap();

        let mut expansion = Expansion::new(&tree, roots, true);
        assert!(expansion.next().await.is_none());
    }
}
