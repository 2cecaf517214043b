use super::*;

impl DialogueEngine {
    /// Starts or re-enters dialogue. With a node name, that node becomes
    /// current and a node-started notification fires before the first block;
    /// without one, the current node is re-entered at `block_index`. Every
    /// failure closes any active section and returns quietly.
    pub fn say(&mut self, node_name: Option<&str>, block_index: usize) {
        if self.is_executing {
            log::info!("Executing commands, please wait...");
            return;
        }

        let target = match node_name {
            None => {
                let Some(node) = self.current_node.clone() else {
                    log::info!("No active dialogue node");
                    self.end_if_active();
                    return;
                };
                node
            }
            Some(name) => {
                if name.is_empty() {
                    log::info!("Dialogue node name cannot be empty");
                    self.end_if_active();
                    return;
                }
                let found = self.registry.borrow().get(name).cloned();
                let Some(node) = found else {
                    log::info!("Dialogue node not found: {}", name);
                    self.end_if_active();
                    return;
                };
                node
            }
        };

        if target.blocks.is_empty() {
            log::info!("Dialogue node {} has no content", target.name);
            self.end_if_active();
            return;
        }
        if block_index >= target.blocks.len() {
            log::info!(
                "Invalid block index {} for node {} ({} blocks)",
                block_index,
                target.name,
                target.blocks.len()
            );
            self.end_if_active();
            return;
        }

        if self.current_section_id.is_empty() {
            let section_id = Self::mint_section_id();
            self.current_section_id = section_id.clone();
            self.progress.borrow_mut().record_section(&section_id);
        }

        if let Some(name) = node_name {
            self.current_node_name = name.to_string();
            self.current_node = Some(target);
            self.events.emit(&DialogueEvent::DialogueStarted);
            self.process_current_node();
        } else {
            self.current_node = Some(target);
        }

        self.current_block_index = block_index;
        self.current_block = None;
        self.process_dialogue_block(None);
    }

    /// Advances one step. Priority: the current block's explicit jump target,
    /// then the internal-node return, then the next block of the same node. A
    /// block with visible choices refuses to advance.
    pub fn continue_say(&mut self) {
        if self.is_executing {
            log::info!("Executing commands, please wait...");
            return;
        }
        if self.current_section_id.is_empty() || self.current_node.is_none() {
            self.end_if_active();
            return;
        }

        if let Some(block) = &self.current_block {
            if !block.options.is_empty() {
                log::info!("Please select an option");
                return;
            }
            if !block.next_node.is_empty() {
                let target = block.next_node.clone();
                self.transition_to_next(&target);
                return;
            }
        }

        let Some(node) = self.current_node.clone() else {
            return;
        };
        if node.is_internal && self.current_block_index + 1 >= node.blocks.len() {
            self.return_to_origin();
            return;
        }

        self.process_dialogue_block(Some(self.current_block_index + 1));
    }

    /// Jumps to `next`. Entering an internal node saves the position to
    /// resume once it is exhausted.
    pub(super) fn transition_to_next(&mut self, next: &str) {
        if next.is_empty() {
            self.end_say(false);
            return;
        }

        let found = self.registry.borrow().get(next).cloned();
        let Some(node) = found else {
            log::info!("Next dialogue node not found: {}", next);
            self.end_say(false);
            return;
        };

        if node.is_internal {
            self.progress
                .borrow_mut()
                .push_return_point(&self.current_node_name, self.current_block_index + 1);
        }

        self.current_node_name = next.to_string();
        self.current_node = Some(node);
        self.current_block_index = 0;
        self.current_block = None;

        self.process_current_node();
        self.process_dialogue_block(None);
    }

    /// Resumes the node an exhausted internal node returns to. The saved
    /// block index is used only when the popped return point names the same
    /// node; a mismatch falls back to the top.
    pub(super) fn return_to_origin(&mut self) {
        let return_name = self
            .current_node
            .as_ref()
            .and_then(|node| node.return_node.clone())
            .unwrap_or_default();
        if return_name.is_empty() {
            self.end_say(false);
            return;
        }

        let found = self.registry.borrow().get(&return_name).cloned();
        let Some(node) = found else {
            self.end_say(false);
            return;
        };

        self.current_node_name = return_name.clone();
        self.current_node = Some(node);

        let resume_index = {
            let mut progress = self.progress.borrow_mut();
            if progress.is_return_stack_empty() {
                0
            } else {
                let point = progress.pop_return_point();
                if point.node_name == return_name {
                    point.block_index
                } else {
                    log::info!(
                        "Return stack mismatch: expected {}, found {}",
                        return_name,
                        point.node_name
                    );
                    0
                }
            }
        };

        self.current_block_index = resume_index;
        self.current_block = None;
        self.process_dialogue_block(None);
    }

    /// Presents the block at `index` (default: the current one). A failing or
    /// malformed guard skips to the next block; running past the last block
    /// either returns from an internal node or ends the dialogue.
    pub(super) fn process_dialogue_block(&mut self, index: Option<usize>) {
        let Some(node) = self.current_node.clone() else {
            self.end_if_active();
            return;
        };

        let start = index.unwrap_or(self.current_block_index);
        if start >= node.blocks.len() {
            if node.is_internal {
                self.return_to_origin();
            } else {
                self.end_say(false);
            }
            return;
        }

        let mut block = node.blocks[start].clone();
        self.current_block_index = start;

        if !block.condition.is_empty()
            && !self
                .evaluator
                .evaluate_condition(&self.variables, &block.condition)
        {
            self.process_dialogue_block(Some(start + 1));
            return;
        }

        if !block.text.is_empty() {
            block.text = self.interpolate(&block.text);
        }
        block.options.retain(|option| {
            option.condition.is_empty()
                || self
                    .evaluator
                    .evaluate_condition(&self.variables, &option.condition)
        });

        self.current_block = Some(block.clone());
        let commands = block.commands.clone();
        self.execute_commands(&commands);

        self.progress.borrow_mut().record_block(start);
        self.events.emit(&DialogueEvent::DialogueUpdated(block));
    }
}
