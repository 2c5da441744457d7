//! Node arena
//!
//! All nodes of a tree live in one arena owned by the tree. Parent links and
//! child lists are [`NodeId`] handles into it, so a removed node can never
//! be reached through a stale link: its slot generation moves on.

use std::collections::HashMap;

use crate::codec::Argument;
use crate::error::TreeError;
use crate::tree::variable::Variable;
use crate::tree::{ExecuteOutcome, OscEndpoint};

/// Generational handle to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// A node holding named children
#[derive(Debug, Default)]
pub struct Container {
    children: Vec<NodeId>,
    by_name: HashMap<String, NodeId>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn child(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    fn attach(&mut self, name: &str, id: NodeId) -> bool {
        if self.by_name.contains_key(name) {
            return false;
        }
        self.by_name.insert(name.to_string(), id);
        self.children.push(id);
        true
    }

    fn detach(&mut self, name: &str) {
        if let Some(id) = self.by_name.remove(name) {
            self.children.retain(|&c| c != id);
        }
    }
}

impl OscEndpoint for Container {
    fn execute(&mut self, _arguments: &[Argument<'_>]) -> ExecuteOutcome {
        ExecuteOutcome::Ignored
    }

    fn as_string(&self) -> Option<String> {
        None
    }
}

/// What a node is
#[derive(Debug)]
pub enum NodeKind {
    Container(Container),
    Variable(Variable),
}

/// A node of the parameter tree
#[derive(Debug)]
pub struct Node {
    name: String,
    parent: Option<NodeId>,
    kind: NodeKind,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn as_container(&self) -> Option<&Container> {
        match &self.kind {
            NodeKind::Container(c) => Some(c),
            NodeKind::Variable(_) => None,
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match &self.kind {
            NodeKind::Variable(v) => Some(v),
            NodeKind::Container(_) => None,
        }
    }

    pub fn as_variable_mut(&mut self) -> Option<&mut Variable> {
        match &mut self.kind {
            NodeKind::Variable(v) => Some(v),
            NodeKind::Container(_) => None,
        }
    }
}

impl OscEndpoint for Node {
    fn execute(&mut self, arguments: &[Argument<'_>]) -> ExecuteOutcome {
        match &mut self.kind {
            NodeKind::Container(c) => c.execute(arguments),
            NodeKind::Variable(v) => v.execute(arguments),
        }
    }

    fn as_string(&self) -> Option<String> {
        match &self.kind {
            NodeKind::Container(c) => c.as_string(),
            NodeKind::Variable(v) => v.as_string(),
        }
    }
}

struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Arena-backed parameter tree with a root container at the empty address
pub struct Tree {
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: NodeId,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

/// Names become address segments, so they cannot hold separators or
/// characters that OSC reserves for patterns.
fn validate_name(name: &str) -> Result<(), TreeError> {
    let reserved = |c: char| {
        c == '/' || c == '\0' || c.is_whitespace() || "#*,?[]{}".contains(c) || !c.is_ascii()
    };
    if name.is_empty() || name.chars().any(reserved) {
        return Err(TreeError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl Tree {
    pub fn new() -> Self {
        let root_node = Node {
            name: String::new(),
            parent: None,
            kind: NodeKind::Container(Container::new()),
        };
        Self {
            slots: vec![Slot {
                generation: 0,
                node: Some(root_node),
            }],
            free: Vec::new(),
            root: NodeId {
                index: 0,
                generation: 0,
            },
        }
    }

    /// The root container (address `""`)
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of live nodes, root included
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.node.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.node.as_mut())
    }

    fn container_mut(&mut self, id: NodeId) -> Result<&mut Container, TreeError> {
        match self.get_mut(id) {
            Some(Node {
                kind: NodeKind::Container(c),
                ..
            }) => Ok(c),
            Some(_) => Err(TreeError::NotAContainer),
            None => Err(TreeError::StaleNode),
        }
    }

    /// Attach a new node under `parent`. Sibling names must be unique.
    pub fn attach(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> Result<NodeId, TreeError> {
        validate_name(name)?;
        let parent_address = self.full_address(parent).ok_or(TreeError::StaleNode)?;
        let container = self.container_mut(parent)?;
        if container.child(name).is_some() {
            return Err(TreeError::DuplicateChild {
                parent: parent_address,
                name: name.to_string(),
            });
        }

        let node = Node {
            name: name.to_string(),
            parent: Some(parent),
            kind,
        };
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };

        // Checked above, cannot fail
        if let Ok(container) = self.container_mut(parent) {
            container.attach(name, id);
        }
        Ok(id)
    }

    pub fn add_container(&mut self, parent: NodeId, name: &str) -> Result<NodeId, TreeError> {
        self.attach(parent, name, NodeKind::Container(Container::new()))
    }

    pub fn add_variable(&mut self, parent: NodeId, name: &str, variable: Variable) -> Result<NodeId, TreeError> {
        self.attach(parent, name, NodeKind::Variable(variable))
    }

    /// Child of a container by name
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.get(parent)?.as_container()?.child(name)
    }

    /// Children of a container as `(name, id)` in insertion order. Empty
    /// for variables and stale handles.
    pub fn children(&self, parent: NodeId) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.get(parent)
            .and_then(Node::as_container)
            .into_iter()
            .flat_map(|c| c.children.iter())
            .filter_map(move |&id| self.get(id).map(|n| (n.name(), id)))
    }

    /// Depth-first pre-order walk of the subtree rooted at `start`
    pub fn walk(&self, start: NodeId) -> Walk<'_> {
        let stack = if self.contains(start) { vec![start] } else { Vec::new() };
        Walk { tree: self, stack }
    }

    /// Resolve an address segment by segment from the root. `""` and `"/"`
    /// are the root itself; trailing or doubled slashes never resolve.
    pub fn resolve(&self, address: &str) -> Option<NodeId> {
        if address.is_empty() || address == "/" {
            return Some(self.root);
        }
        let path = address.strip_prefix('/')?;
        path.split('/')
            .try_fold(self.root, |current, segment| self.child(current, segment))
    }

    /// Full address of a node, computed by walking parent links
    pub fn full_address(&self, id: NodeId) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = self.get(id)?;
        while let Some(parent) = current.parent {
            segments.push(current.name.as_str());
            current = self.get(parent)?;
        }

        let mut address = String::new();
        for segment in segments.iter().rev() {
            address.push('/');
            address.push_str(segment);
        }
        Some(address)
    }

    /// Detach `id` and drop its whole subtree, leaf-first. Returns the
    /// removed handles in removal order.
    pub fn remove(&mut self, id: NodeId) -> Result<Vec<NodeId>, TreeError> {
        if id == self.root {
            return Err(TreeError::RootRemoval);
        }
        let node = self.get(id).ok_or(TreeError::StaleNode)?;
        let name = node.name.clone();
        let parent = node.parent;

        let mut removed: Vec<NodeId> = self.walk(id).collect();
        removed.reverse();

        if let Some(parent) = parent {
            if let Ok(container) = self.container_mut(parent) {
                container.detach(&name);
            }
        }
        for &gone in &removed {
            let slot = &mut self.slots[gone.index as usize];
            slot.node = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(gone.index);
        }
        Ok(removed)
    }
}

/// Depth-first iterator returned by [`Tree::walk`]
pub struct Walk<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl Iterator for Walk<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        if let Some(container) = self.tree.get(id).and_then(Node::as_container) {
            self.stack.extend(container.children.iter().rev());
        }
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mixer_tree() -> (Tree, NodeId, NodeId) {
        let mut tree = Tree::new();
        let mixer = tree.add_container(tree.root(), "mixer").unwrap();
        let gain = tree.add_variable(mixer, "gain", Variable::new(0.0f32)).unwrap();
        (tree, mixer, gain)
    }

    #[test]
    fn test_resolve_and_address() {
        let (tree, mixer, gain) = mixer_tree();
        assert_eq!(tree.resolve("/mixer/gain"), Some(gain));
        assert_eq!(tree.resolve("/mixer"), Some(mixer));
        assert_eq!(tree.resolve(""), Some(tree.root()));
        assert_eq!(tree.full_address(gain).unwrap(), "/mixer/gain");
        assert_eq!(tree.full_address(tree.root()).unwrap(), "");
    }

    #[test]
    fn test_resolve_rejects_bad_paths() {
        let (tree, _, _) = mixer_tree();
        assert_eq!(tree.resolve("/mixer/"), None);
        assert_eq!(tree.resolve("/mixer//gain"), None);
        assert_eq!(tree.resolve("mixer/gain"), None);
        assert_eq!(tree.resolve("/Mixer/gain"), None);
        assert_eq!(tree.resolve("/mixer/gain/more"), None);
    }

    #[test]
    fn test_duplicate_child_is_an_error() {
        let (mut tree, mixer, _) = mixer_tree();
        let err = tree.add_variable(mixer, "gain", Variable::new(1.0f32)).unwrap_err();
        assert_eq!(
            err,
            TreeError::DuplicateChild {
                parent: "/mixer".to_string(),
                name: "gain".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_names() {
        let mut tree = Tree::new();
        let root = tree.root();
        for bad in ["", "a/b", "a b", "x*", "{y}"] {
            assert!(matches!(tree.add_container(root, bad), Err(TreeError::InvalidName(_))));
        }
    }

    #[test]
    fn test_children_in_insertion_order() {
        let mut tree = Tree::new();
        let root = tree.root();
        for name in ["zeta", "alpha", "mid"] {
            tree.add_container(root, name).unwrap();
        }
        let names: Vec<_> = tree.children(root).map(|(n, _)| n.to_string()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_cannot_attach_under_variable() {
        let (mut tree, _, gain) = mixer_tree();
        assert_eq!(tree.add_container(gain, "x").unwrap_err(), TreeError::NotAContainer);
    }

    #[test]
    fn test_walk_is_depth_first() {
        let mut tree = Tree::new();
        let root = tree.root();
        let eq = tree.add_container(root, "eq").unwrap();
        tree.add_variable(eq, "f0", Variable::new(1000.0f32)).unwrap();
        tree.add_variable(root, "volume", Variable::new(0.0f32)).unwrap();

        let addresses: Vec<_> = tree
            .walk(root)
            .map(|id| tree.full_address(id).unwrap())
            .collect();
        assert_eq!(addresses, vec!["", "/eq", "/eq/f0", "/volume"]);
    }

    #[test]
    fn test_remove_subtree_invalidates_handles() {
        let (mut tree, mixer, gain) = mixer_tree();
        let removed = tree.remove(mixer).unwrap();
        assert_eq!(removed, vec![gain, mixer]);
        assert!(!tree.contains(gain));
        assert_eq!(tree.resolve("/mixer/gain"), None);

        // Slot reuse does not revive the old handle
        let again = tree.add_container(tree.root(), "mixer").unwrap();
        assert_ne!(again, mixer);
        assert!(!tree.contains(mixer));
        assert_eq!(tree.resolve("/mixer"), Some(again));
    }

    #[test]
    fn test_root_cannot_be_removed() {
        let mut tree = Tree::new();
        assert_eq!(tree.remove(tree.root()).unwrap_err(), TreeError::RootRemoval);
    }
}
