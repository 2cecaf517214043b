use ds_core::DialogueBlock;

use super::*;

impl DialogueEngine {
    /// Read-only probe: would a subsequent `continue_say` surface new
    /// content? Checks the explicit jump target first, then walks the
    /// return-point chain for an exhausted internal node, then the remaining
    /// blocks of the current node. The walk stops at a non-internal return
    /// node without ending the dialogue.
    pub fn has_next_executable_block(&self) -> bool {
        let (Some(node), Some(block)) = (&self.current_node, &self.current_block) else {
            return false;
        };

        if !block.next_node.is_empty() {
            let next = self.registry.borrow().get(&block.next_node).cloned();
            if let Some(next) = next {
                for candidate in &next.blocks {
                    if self.guard_passes(candidate) {
                        return true;
                    }
                }
            }
            return false;
        }

        if node.is_internal && self.current_block_index + 1 >= node.blocks.len() {
            let stack = self.progress.borrow().return_point_stack();
            if let Some(top) = stack.last() {
                let return_node = self.registry.borrow().get(&top.node_name).cloned();
                if let Some(return_node) = &return_node {
                    for candidate in return_node.blocks.iter().skip(top.block_index) {
                        if self.guard_passes(candidate) {
                            return true;
                        }
                    }
                }

                // The direct return target is itself internal: keep walking
                // the saved chain until a non-internal node is reached.
                if return_node.map(|found| found.is_internal).unwrap_or(false) {
                    for point in stack[..stack.len() - 1].iter().rev() {
                        let next_return = self.registry.borrow().get(&point.node_name).cloned();
                        let Some(next_return) = next_return else {
                            continue;
                        };
                        if point.block_index >= next_return.blocks.len() {
                            continue;
                        }
                        for candidate in next_return.blocks.iter().skip(point.block_index) {
                            if self.guard_passes(candidate) {
                                return true;
                            }
                        }
                        if !next_return.is_internal {
                            break;
                        }
                    }
                }
            }
            return false;
        }

        if self.current_block_index + 1 < node.blocks.len() {
            for candidate in node.blocks.iter().skip(self.current_block_index + 1) {
                if self.guard_passes(candidate) {
                    return true;
                }
            }
        }

        false
    }

    fn guard_passes(&self, block: &DialogueBlock) -> bool {
        block.condition.is_empty()
            || self
                .evaluator
                .evaluate_condition(&self.variables, &block.condition)
    }
}
