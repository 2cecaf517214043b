use ds_core::{ProgressRecord, ReturnPoint};
use serde::{Deserialize, Serialize};

/// Sentinel for records that are not tied to a specific block.
const NO_BLOCK: i32 = -1;

/// The per-playthrough ledger: an append-only history driven by a logical
/// clock, plus the LIFO stack of return points for internal nodes. Created
/// once per engine, mutated only by the record and stack operations, and
/// serializable as a whole for save/resume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DialogueProgress {
    pub current_section_id: String,
    pub current_node_id: String,
    pub current_block_index: usize,
    history: Vec<ProgressRecord>,
    clock: u64,
    return_points: Vec<ReturnPoint>,
}

impl DialogueProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_section(&mut self, section_id: &str) {
        self.current_section_id = section_id.to_string();
        let timestamp = self.tick();
        self.history.push(ProgressRecord {
            section_id: section_id.to_string(),
            node_id: String::new(),
            block_index: NO_BLOCK,
            choice_index: None,
            timestamp,
        });
    }

    pub fn record_node(&mut self, node_id: &str) {
        self.current_node_id = node_id.to_string();
        let timestamp = self.tick();
        self.history.push(ProgressRecord {
            section_id: self.current_section_id.clone(),
            node_id: node_id.to_string(),
            block_index: NO_BLOCK,
            choice_index: None,
            timestamp,
        });
    }

    pub fn record_block(&mut self, block_index: usize) {
        self.current_block_index = block_index;
        let timestamp = self.tick();
        self.history.push(ProgressRecord {
            section_id: self.current_section_id.clone(),
            node_id: self.current_node_id.clone(),
            block_index: block_index as i32,
            choice_index: None,
            timestamp,
        });
    }

    pub fn record_choice(&mut self, choice_index: usize) {
        let timestamp = self.tick();
        self.history.push(ProgressRecord {
            section_id: self.current_section_id.clone(),
            node_id: self.current_node_id.clone(),
            block_index: self.current_block_index as i32,
            choice_index: Some(choice_index),
            timestamp,
        });
    }

    fn tick(&mut self) -> u64 {
        let now = self.clock;
        self.clock += 1;
        now
    }

    pub fn push_return_point(&mut self, node_name: &str, block_index: usize) {
        self.return_points
            .push(ReturnPoint::new(node_name, block_index));
    }

    /// Pop on an empty stack returns the default sentinel rather than failing.
    pub fn pop_return_point(&mut self) -> ReturnPoint {
        self.return_points.pop().unwrap_or_default()
    }

    pub fn peek_return_point(&self) -> ReturnPoint {
        self.return_points.last().cloned().unwrap_or_default()
    }

    pub fn return_point_stack(&self) -> Vec<ReturnPoint> {
        self.return_points.clone()
    }

    pub fn set_return_point_stack(&mut self, stack: Vec<ReturnPoint>) {
        self.return_points = stack;
    }

    pub fn is_return_stack_empty(&self) -> bool {
        self.return_points.is_empty()
    }

    pub fn return_stack_len(&self) -> usize {
        self.return_points.len()
    }

    pub fn clear_return_points(&mut self) {
        self.return_points.clear();
    }

    pub fn history(&self) -> &[ProgressRecord] {
        &self.history
    }

    pub fn section_history(&self, section_id: &str) -> Vec<ProgressRecord> {
        self.history
            .iter()
            .filter(|record| record.section_id == section_id)
            .cloned()
            .collect()
    }

    pub fn last_section_state(&self, section_id: &str) -> Option<&ProgressRecord> {
        self.history
            .iter()
            .rev()
            .find(|record| record.section_id == section_id)
    }

    /// Sections visited, in first-seen order.
    pub fn sections(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for record in &self.history {
            if record.block_index == NO_BLOCK
                && record.node_id.is_empty()
                && !record.section_id.is_empty()
                && !out.contains(&record.section_id)
            {
                out.push(record.section_id.clone());
            }
        }
        out
    }

    /// Nodes visited in a section, in first-seen order.
    pub fn nodes(&self, section_id: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for record in &self.history {
            if record.section_id == section_id
                && record.block_index == NO_BLOCK
                && !record.node_id.is_empty()
                && !out.contains(&record.node_id)
            {
                out.push(record.node_id.clone());
            }
        }
        out
    }

    pub fn node_visit_count(&self, section_id: &str, node_id: &str) -> usize {
        self.history
            .iter()
            .filter(|record| {
                record.section_id == section_id
                    && record.node_id == node_id
                    && record.block_index == NO_BLOCK
            })
            .count()
    }

    /// Visit count for a node aggregated over every section.
    pub fn total_node_visit_count(&self, node_id: &str) -> usize {
        self.history
            .iter()
            .filter(|record| record.node_id == node_id && record.block_index == NO_BLOCK)
            .count()
    }

    /// Block indices visited in a node, in first-seen order.
    pub fn blocks(&self, section_id: &str, node_id: &str) -> Vec<usize> {
        let mut out: Vec<usize> = Vec::new();
        for record in &self.history {
            if record.section_id == section_id
                && record.node_id == node_id
                && record.block_index >= 0
            {
                let index = record.block_index as usize;
                if !out.contains(&index) {
                    out.push(index);
                }
            }
        }
        out
    }

    /// Choices made at a specific block, in selection order.
    pub fn block_choices(&self, section_id: &str, node_id: &str, block_index: usize) -> Vec<usize> {
        self.history
            .iter()
            .filter(|record| {
                record.section_id == section_id
                    && record.node_id == node_id
                    && record.block_index == block_index as i32
            })
            .filter_map(|record| record.choice_index)
            .collect()
    }

    pub fn is_choice_selected(
        &self,
        section_id: &str,
        node_id: &str,
        block_index: usize,
        choice_index: usize,
    ) -> bool {
        self.history.iter().any(|record| {
            record.section_id == section_id
                && record.node_id == node_id
                && record.block_index == block_index as i32
                && record.choice_index == Some(choice_index)
        })
    }

    pub fn reset(&mut self) {
        self.current_section_id.clear();
        self.current_node_id.clear();
        self.current_block_index = 0;
        self.clock = 0;
        self.history.clear();
        self.return_points.clear();
    }

    /// Clears the history but keeps the current position.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.clock = 0;
    }
}
