use std::collections::BTreeMap;

use ds_core::DialogueNode;

/// The merged node table the engine runs against. Registering a node whose
/// name already exists replaces it wholesale; nodes are never patched in
/// place.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<String, DialogueNode>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, node: DialogueNode) {
        self.nodes.insert(node.name.clone(), node);
    }

    pub fn merge(&mut self, nodes: BTreeMap<String, DialogueNode>) {
        for (name, node) in nodes {
            self.nodes.insert(name, node);
        }
    }

    pub fn get(&self, name: &str) -> Option<&DialogueNode> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn nodes(&self) -> &BTreeMap<String, DialogueNode> {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ds_core::DialogueBlock;

    fn node(name: &str, block_count: usize) -> DialogueNode {
        DialogueNode {
            name: name.to_string(),
            is_internal: false,
            return_node: None,
            blocks: vec![DialogueBlock::default(); block_count],
        }
    }

    #[test]
    fn register_replaces_by_name() {
        let mut registry = NodeRegistry::new();
        registry.register(node("start", 1));
        registry.register(node("start", 3));

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("start").expect("node should exist").blocks.len(),
            3
        );
    }

    #[test]
    fn merge_overwrites_colliding_names_only() {
        let mut registry = NodeRegistry::new();
        registry.register(node("start", 1));
        registry.register(node("market", 2));

        let mut incoming = BTreeMap::new();
        incoming.insert("start".to_string(), node("start", 5));
        incoming.insert("gate".to_string(), node("gate", 1));
        registry.merge(incoming);

        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.get("start").expect("node should exist").blocks.len(),
            5
        );
        assert!(registry.contains("market"));
        assert!(registry.contains("gate"));
    }
}
