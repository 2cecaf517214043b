use super::*;

impl DialogueEngine {
    /// Picks one of the current block's visible options. The index refers to
    /// the already-filtered option list; an out-of-range index is refused
    /// without ending the dialogue or touching history.
    pub fn select_option(&mut self, option_index: usize) {
        if self.is_executing {
            log::info!("Executing commands, please wait...");
            return;
        }
        if self.current_section_id.is_empty() || self.current_node.is_none() {
            self.end_if_active();
            return;
        }
        let Some(block) = self.current_block.clone() else {
            self.end_if_active();
            return;
        };

        if option_index >= block.options.len() {
            log::warn!(
                "Option index {} is out of range ({} visible options)",
                option_index,
                block.options.len()
            );
            return;
        }
        let option = block.options[option_index].clone();

        // The guard may have turned false since the block was presented.
        if !option.condition.is_empty()
            && !self
                .evaluator
                .evaluate_condition(&self.variables, &option.condition)
        {
            log::info!(
                "Option condition not met: {} [if {}]",
                option.text,
                option.condition
            );
            return;
        }

        if !option.text.is_empty() {
            let text = self.interpolate(&option.text);
            if let Some(current) = &mut self.current_block {
                if let Some(stored) = current.options.get_mut(option_index) {
                    stored.text = text;
                }
            }
        }

        if !option.commands.is_empty() {
            self.execute_commands(&option.commands);
        }

        self.progress.borrow_mut().record_choice(option_index);
        self.events
            .emit(&DialogueEvent::OptionSelected(option_index));

        if !option.next_node.is_empty() {
            self.transition_to_next(&option.next_node);
        } else {
            self.process_dialogue_block(Some(self.current_block_index + 1));
        }
    }
}
