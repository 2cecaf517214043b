use serde::{Deserialize, Serialize};

/// Side-effecting commands a block or option can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Var,
    Set,
    Add,
    Sub,
    Call,
    Wait,
}

impl CommandKind {
    /// Case-insensitive keyword match used by the line classifier.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "var" => Some(Self::Var),
            "set" => Some(Self::Set),
            "add" => Some(Self::Add),
            "sub" => Some(Self::Sub),
            "call" => Some(Self::Call),
            "wait" => Some(Self::Wait),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Var => "var",
            Self::Set => "set",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Call => "call",
            Self::Wait => "wait",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    /// Already normalized into an assignable or callable form, e.g. `x = x + 1`.
    pub expression: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueOption {
    pub condition: String,
    pub next_node: String,
    pub commands: Vec<Command>,
    pub text: String,
}

impl DialogueOption {
    pub fn is_empty(&self) -> bool {
        self.condition.is_empty()
            && self.next_node.is_empty()
            && self.commands.is_empty()
            && self.text.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueBlock {
    pub condition: String,
    pub next_node: String,
    pub commands: Vec<Command>,
    pub speaker: String,
    pub emotion: String,
    pub text: String,
    pub options: Vec<DialogueOption>,
}

impl DialogueBlock {
    /// An empty block is only ever a transient separator during parsing.
    pub fn is_empty(&self) -> bool {
        self.condition.is_empty()
            && self.next_node.is_empty()
            && self.commands.is_empty()
            && self.speaker.is_empty()
            && self.emotion.is_empty()
            && self.text.is_empty()
            && self.options.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueNode {
    pub name: String,
    /// Synthesized by the parser to hold content nested under a choice.
    pub is_internal: bool,
    /// The node to resume when an internal node's blocks are exhausted.
    pub return_node: Option<String>,
    pub blocks: Vec<DialogueBlock>,
}

/// A saved resumption location, pushed when entering an internal node from a
/// choice and popped when that internal node's blocks are exhausted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnPoint {
    pub node_name: String,
    pub block_index: usize,
}

impl ReturnPoint {
    pub fn new(node_name: impl Into<String>, block_index: usize) -> Self {
        Self {
            node_name: node_name.into(),
            block_index,
        }
    }
}

/// One history entry of the progress ledger. `block_index` is -1 when the
/// record is for a section or node rather than a specific block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub section_id: String,
    pub node_id: String,
    pub block_index: i32,
    pub choice_index: Option<usize>,
    pub timestamp: u64,
}
