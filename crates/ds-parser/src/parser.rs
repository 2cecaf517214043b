use std::collections::BTreeMap;
use std::mem;

use ds_core::{
    Category, Command, CommandKind, DiagnosticSink, DialogueBlock, DialogueNode, DialogueOption,
    DialogueScriptError, Severity,
};
use uuid::Uuid;

use crate::classify::{classify, ConditionDirective, ParsedLine};
use crate::condition::{preprocess_condition, ConditionTracker};
use crate::cursor::unescape;
use crate::scope::{ScopeEntry, ScopeItem, ScopeKind, ScopeStack};
use crate::splitter::split_statements;

type ParseStep = Result<(), DialogueScriptError>;

/// Parses script text into a node table. One parser instance can run many
/// passes; diagnostics accumulate per source name, and a node name parsed
/// again is always fully replaced.
pub struct ScriptParser {
    nodes: BTreeMap<String, DialogueNode>,
    diagnostics: DiagnosticSink,
    scope: ScopeStack,
    conditions: ConditionTracker,
    current_node: Option<String>,
    level: usize,
    line: usize,
}

impl ScriptParser {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            diagnostics: DiagnosticSink::new(),
            scope: ScopeStack::default(),
            conditions: ConditionTracker::default(),
            current_node: None,
            level: 0,
            line: 0,
        }
    }

    pub fn diagnostics(&self) -> &DiagnosticSink {
        &self.diagnostics
    }

    /// Runs one parse pass. Warnings and errors are recorded and parsing
    /// continues at the next statement; a fatal failure aborts the pass and
    /// returns whatever nodes were completed so far.
    pub fn parse(
        &mut self,
        content: &str,
        source_name: &str,
    ) -> BTreeMap<String, DialogueNode> {
        self.nodes.clear();
        self.scope.clear();
        self.conditions.clear();
        self.current_node = None;
        self.level = 0;
        self.line = 0;
        self.diagnostics.begin_source(source_name, content);

        let statements = split_statements(content, &mut self.diagnostics);
        for statement in statements {
            self.level = statement.indent_level();
            self.line = statement.line;

            let step = match classify(&statement.text) {
                Some(line) => self.process(line),
                None => {
                    self.syntax_error(
                        format!("Unrecognized line content: {}", statement.text),
                        "UNRECOGNIZED_LINE",
                    );
                    Ok(())
                }
            };

            if let Err(error) = step {
                self.diagnostics.add(
                    format!("Fatal error while parsing: {}", error),
                    self.line,
                    Severity::Fatal,
                    Category::Parse,
                    "FATAL_ERROR",
                );
                break;
            }
        }

        let open_layers = self.conditions.open_count();
        if open_layers > 0 {
            self.syntax_error(
                format!("Unclosed if statement ({} endif missing)", open_layers),
                "UNCLOSED_IF",
            );
        }

        mem::take(&mut self.nodes)
    }

    fn process(&mut self, line: ParsedLine) -> ParseStep {
        match line {
            ParsedLine::Blank => self.process_blank(),
            ParsedLine::NodeHeader { name } => self.process_node_header(name),
            ParsedLine::Choice { text, condition } => self.process_choice(text, condition),
            ParsedLine::Condition(directive) => self.process_condition(directive),
            ParsedLine::Jump { target } => self.process_jump(target),
            ParsedLine::Command { kind, body } => self.process_command(kind, body),
            ParsedLine::Dialogue {
                speaker,
                emotion,
                text,
                condition,
            } => self.process_dialogue(speaker, emotion, text, condition),
        }
    }

    fn process_blank(&mut self) -> ParseStep {
        if self.scope.is_empty() {
            return Ok(());
        }
        if matches!(
            self.scope.top().map(|entry| &entry.item),
            Some(ScopeItem::Node { .. })
        ) {
            return Ok(());
        }
        if self.top_is_empty_block()? {
            return Ok(());
        }

        // A blank statement only separates blocks; the separator itself is
        // never attached to a node.
        self.scope.push(ScopeItem::Separator, 0);
        Ok(())
    }

    fn process_node_header(&mut self, name: String) -> ParseStep {
        let node = DialogueNode {
            name: name.clone(),
            is_internal: false,
            return_node: None,
            blocks: Vec::new(),
        };

        self.scope.clear();
        self.scope.push(ScopeItem::Node { name: name.clone() }, 0);
        self.nodes.insert(name.clone(), node);
        self.current_node = Some(name);
        Ok(())
    }

    fn process_condition(&mut self, directive: ConditionDirective) -> ParseStep {
        match directive {
            ConditionDirective::Endif => {
                if self.conditions.pop().is_none() {
                    self.syntax_error("endif without a matching if", "UNMATCHED_ENDIF");
                }
            }
            ConditionDirective::If(expression) => {
                if self.current_node.is_none() {
                    self.syntax_error(
                        "Condition directives must appear inside a node",
                        "CONDITION_OUTSIDE_NODE",
                    );
                    return Ok(());
                }
                let clause = preprocess_condition(&expression);
                self.conditions.open(clause, self.level);
            }
            ConditionDirective::Elif(expression) => {
                let clause = preprocess_condition(&expression);
                match self.conditions.top_mut() {
                    None => self.syntax_error("elif without a matching if", "UNMATCHED_ELIF"),
                    Some(layer) if layer.clauses.is_empty() => {
                        self.syntax_error("elif must follow if or another elif", "ELIF_WITHOUT_IF")
                    }
                    Some(layer) => layer.clauses.push(clause),
                }
            }
            ConditionDirective::Else => match self.conditions.top_mut() {
                None => self.syntax_error("else without a matching if", "UNMATCHED_ELSE"),
                Some(layer) if layer.clauses.is_empty() => {
                    self.syntax_error("else must follow if or elif", "ELSE_WITHOUT_IF")
                }
                Some(layer) if layer.has_else => {
                    self.syntax_error("Duplicate else in the same layer", "DUPLICATE_ELSE")
                }
                Some(layer) => layer.has_else = true,
            },
        }
        Ok(())
    }

    fn process_dialogue(
        &mut self,
        speaker: String,
        emotion: String,
        text: String,
        condition: String,
    ) -> ParseStep {
        self.discard_empty_top()?;

        let line_guard = if condition.is_empty() {
            String::new()
        } else {
            preprocess_condition(&condition)
        };
        let guard = combine_guards(self.conditions.build_guard(self.level), line_guard);
        let block = DialogueBlock {
            speaker: unescape(&speaker),
            emotion: unescape(&emotion),
            text: unescape(&text),
            condition: guard,
            ..Default::default()
        };

        if self.scope.is_empty() {
            self.syntax_error("Dialogue must appear inside a node", "DIALOGUE_OUTSIDE_NODE");
            return Ok(());
        }

        let level = self.level;
        match self
            .scope
            .find_parent(level, &[ScopeKind::Node, ScopeKind::Option])
        {
            Some(ScopeEntry {
                item: ScopeItem::Node { name },
                ..
            }) => {
                let node = self.node_mut(&name)?;
                node.blocks.push(block);
                let index = node.blocks.len() - 1;
                self.current_node = Some(name.clone());
                self.scope
                    .push(ScopeItem::Block { node: name, block: index }, level);
            }
            Some(ScopeEntry {
                item:
                    ScopeItem::OptionRef {
                        node,
                        block: parent_block,
                        option,
                    },
                ..
            }) => {
                self.attach_internal_node(block, &node, parent_block, option)?;
            }
            _ => self.syntax_error(
                "Dialogue has no valid enclosing scope",
                "INVALID_DIALOGUE_HIERARCHY",
            ),
        }
        Ok(())
    }

    /// Dialogue nested under an option lives on a synthesized internal node.
    /// Its name is a deterministic hash so repeated parses of unchanged text
    /// produce stable node identity.
    fn attach_internal_node(
        &mut self,
        first_block: DialogueBlock,
        parent_node: &str,
        parent_block: usize,
        parent_option: usize,
    ) -> ParseStep {
        let level = self.level;
        let enclosing = self.scope.enclosing_node_name(level);
        let option_text = self
            .option_mut(parent_node, parent_block, parent_option)?
            .text
            .clone();
        let guard_context = if self.conditions.is_empty() {
            None
        } else {
            Some(self.conditions.build_guard(level))
        };

        let name = internal_node_name(
            enclosing.as_deref().unwrap_or("root"),
            &option_text,
            level,
            guard_context.as_deref(),
        );

        let internal = DialogueNode {
            name: name.clone(),
            is_internal: true,
            return_node: enclosing,
            blocks: vec![first_block],
        };
        self.nodes.insert(name.clone(), internal);
        self.option_mut(parent_node, parent_block, parent_option)?
            .next_node = name.clone();
        self.current_node = Some(name.clone());

        self.scope.push(ScopeItem::Node { name: name.clone() }, level);
        self.scope.push(ScopeItem::Block { node: name, block: 0 }, level);
        Ok(())
    }

    fn process_choice(&mut self, text: String, condition: String) -> ParseStep {
        let option = DialogueOption {
            text: unescape(&text),
            condition: if condition.is_empty() {
                String::new()
            } else {
                preprocess_condition(&condition)
            },
            ..Default::default()
        };

        if self.scope.is_empty() {
            self.syntax_error(
                "A choice must appear inside a block or node",
                "CHOICE_OUTSIDE_SCOPE",
            );
            return Ok(());
        }

        let level = self.level;

        // A separator forces the choice into a fresh block under the node.
        if self.discard_empty_top()? {
            match self.scope.find_parent(level, &[ScopeKind::Node]) {
                Some(ScopeEntry {
                    item: ScopeItem::Node { name },
                    ..
                }) => {
                    let index = self.push_holding_block(&name, |holding| {
                        holding.options.push(option);
                    })?;
                    self.scope.push(
                        ScopeItem::OptionRef {
                            node: name,
                            block: index,
                            option: 0,
                        },
                        level,
                    );
                    return Ok(());
                }
                _ => self.syntax_error(
                    "A choice must appear inside a block or node",
                    "CHOICE_OUTSIDE_SCOPE",
                ),
            }
            return Ok(());
        }

        match self
            .scope
            .find_parent(level, &[ScopeKind::Block, ScopeKind::Node])
        {
            Some(ScopeEntry {
                item: ScopeItem::Block { node, block },
                ..
            }) => {
                let parent = self.block_mut(&node, block)?;
                parent.options.push(option);
                let index = parent.options.len() - 1;
                self.scope.push(
                    ScopeItem::OptionRef {
                        node,
                        block,
                        option: index,
                    },
                    level,
                );
            }
            Some(ScopeEntry {
                item: ScopeItem::Node { name },
                ..
            }) => {
                let index = self.push_holding_block(&name, |holding| {
                    holding.options.push(option);
                })?;
                self.scope.push(
                    ScopeItem::OptionRef {
                        node: name,
                        block: index,
                        option: 0,
                    },
                    level,
                );
            }
            _ => self.syntax_error(
                "A choice must appear inside a block or node",
                "CHOICE_OUTSIDE_SCOPE",
            ),
        }
        Ok(())
    }

    fn process_jump(&mut self, target: String) -> ParseStep {
        if self.scope.is_empty() {
            self.syntax_error(
                "A jump must appear inside a node, block, or option",
                "JUMP_OUTSIDE_SCOPE",
            );
            return Ok(());
        }

        let level = self.level;

        if self.discard_empty_top()? {
            match self.scope.find_parent(level, &[ScopeKind::Node]) {
                Some(ScopeEntry {
                    item: ScopeItem::Node { name },
                    ..
                }) => {
                    self.push_holding_block(&name, |holding| {
                        holding.next_node = target;
                    })?;
                    return Ok(());
                }
                _ => self.syntax_error(
                    "A jump must appear inside a node, block, or option",
                    "JUMP_OUTSIDE_SCOPE",
                ),
            }
            return Ok(());
        }

        match self.scope.find_parent(
            level,
            &[ScopeKind::Block, ScopeKind::Option, ScopeKind::Node],
        ) {
            Some(ScopeEntry {
                item: ScopeItem::Block { node, block },
                ..
            }) => self.block_mut(&node, block)?.next_node = target,
            Some(ScopeEntry {
                item: ScopeItem::OptionRef {
                    node,
                    block,
                    option,
                },
                ..
            }) => self.option_mut(&node, block, option)?.next_node = target,
            Some(ScopeEntry {
                item: ScopeItem::Node { name },
                ..
            }) => {
                self.push_holding_block(&name, |holding| {
                    holding.next_node = target;
                })?;
            }
            _ => self.syntax_error(
                "A jump must appear inside a node, block, or option",
                "JUMP_OUTSIDE_SCOPE",
            ),
        }
        Ok(())
    }

    fn process_command(&mut self, kind: CommandKind, body: String) -> ParseStep {
        let body = body.trim().to_string();
        if body.is_empty() {
            self.validation_error(
                format!("{} command has no body", kind.keyword()),
                format!("{}_COMMAND_EMPTY", kind.keyword().to_uppercase()),
            );
            return Ok(());
        }
        self.validate_command(kind, &body);

        let command = Command {
            kind,
            expression: normalize_command(kind, &body),
        };

        if self.scope.is_empty() {
            self.syntax_error(
                "A command must appear inside a node, block, or option",
                "COMMAND_OUTSIDE_SCOPE",
            );
            return Ok(());
        }

        let level = self.level;

        if self.discard_empty_top()? {
            match self.scope.find_parent(level, &[ScopeKind::Node]) {
                Some(ScopeEntry {
                    item: ScopeItem::Node { name },
                    ..
                }) => {
                    self.push_holding_block(&name, |holding| {
                        holding.commands.push(command);
                    })?;
                    return Ok(());
                }
                _ => self.syntax_error(
                    "A command must appear inside a node, block, or option",
                    "COMMAND_OUTSIDE_SCOPE",
                ),
            }
            return Ok(());
        }

        match self.scope.find_parent(
            level,
            &[ScopeKind::Block, ScopeKind::Option, ScopeKind::Node],
        ) {
            Some(ScopeEntry {
                item: ScopeItem::Block { node, block },
                ..
            }) => self.block_mut(&node, block)?.commands.push(command),
            Some(ScopeEntry {
                item: ScopeItem::OptionRef {
                    node,
                    block,
                    option,
                },
                ..
            }) => self
                .option_mut(&node, block, option)?
                .commands
                .push(command),
            Some(ScopeEntry {
                item: ScopeItem::Node { name },
                ..
            }) => {
                self.push_holding_block(&name, |holding| {
                    holding.commands.push(command);
                })?;
            }
            _ => self.syntax_error(
                "A command must appear inside a node, block, or option",
                "COMMAND_OUTSIDE_SCOPE",
            ),
        }
        Ok(())
    }

    fn validate_command(&mut self, kind: CommandKind, body: &str) {
        match kind {
            CommandKind::Var | CommandKind::Set | CommandKind::Add | CommandKind::Sub => {
                if body.split_whitespace().count() < 2 && !body.contains('=') {
                    self.validation_error(
                        format!("{} command needs a variable name and a value", kind.keyword()),
                        format!("{}_COMMAND_FORMAT_ERROR", kind.keyword().to_uppercase()),
                    );
                }
            }
            CommandKind::Call => {
                if !body.contains('(') {
                    self.validation_error(
                        "call command must contain a function call",
                        "CALL_COMMAND_FORMAT_ERROR",
                    );
                }
            }
            CommandKind::Wait => {}
        }
    }

    /// Synthesizes a fresh block under `node` for jumps/commands/choices that
    /// appear without a block of their own, carrying the active guard.
    fn push_holding_block(
        &mut self,
        node_name: &str,
        fill: impl FnOnce(&mut DialogueBlock),
    ) -> Result<usize, DialogueScriptError> {
        let mut holding = DialogueBlock {
            condition: self.conditions.build_guard(self.level),
            ..Default::default()
        };
        fill(&mut holding);

        let level = self.level;
        let node = self.node_mut(node_name)?;
        node.blocks.push(holding);
        let index = node.blocks.len() - 1;
        self.scope.push(
            ScopeItem::Block {
                node: node_name.to_string(),
                block: index,
            },
            level,
        );
        Ok(index)
    }

    fn top_is_empty_block(&self) -> Result<bool, DialogueScriptError> {
        match self.scope.top().map(|entry| &entry.item) {
            Some(ScopeItem::Separator) => Ok(true),
            Some(ScopeItem::Block { node, block }) => {
                let block = self
                    .nodes
                    .get(node)
                    .and_then(|found| found.blocks.get(*block))
                    .ok_or_else(|| {
                        DialogueScriptError::new(
                            "PARSER_BLOCK_MISSING",
                            format!("Scope references a missing block of node \"{}\".", node),
                        )
                    })?;
                Ok(block.is_empty())
            }
            _ => Ok(false),
        }
    }

    fn discard_empty_top(&mut self) -> Result<bool, DialogueScriptError> {
        if self.top_is_empty_block()? {
            self.scope.pop();
            return Ok(true);
        }
        Ok(false)
    }

    fn node_mut(&mut self, name: &str) -> Result<&mut DialogueNode, DialogueScriptError> {
        self.nodes.get_mut(name).ok_or_else(|| {
            DialogueScriptError::new(
                "PARSER_NODE_MISSING",
                format!("Scope references unknown node \"{}\".", name),
            )
        })
    }

    fn block_mut(
        &mut self,
        name: &str,
        block: usize,
    ) -> Result<&mut DialogueBlock, DialogueScriptError> {
        self.node_mut(name)?.blocks.get_mut(block).ok_or_else(|| {
            DialogueScriptError::new(
                "PARSER_BLOCK_MISSING",
                format!("Scope references a missing block of node \"{}\".", name),
            )
        })
    }

    fn option_mut(
        &mut self,
        name: &str,
        block: usize,
        option: usize,
    ) -> Result<&mut DialogueOption, DialogueScriptError> {
        self.block_mut(name, block)?
            .options
            .get_mut(option)
            .ok_or_else(|| {
                DialogueScriptError::new(
                    "PARSER_OPTION_MISSING",
                    format!("Scope references a missing option of node \"{}\".", name),
                )
            })
    }

    fn syntax_error(&mut self, message: impl Into<String>, code: &str) {
        self.diagnostics
            .add(message, self.line, Severity::Error, Category::Syntax, code);
    }

    fn validation_error(&mut self, message: impl Into<String>, code: impl Into<String>) {
        self.diagnostics.add(
            message,
            self.line,
            Severity::Error,
            Category::Validation,
            code,
        );
    }
}

impl Default for ScriptParser {
    fn default() -> Self {
        Self::new()
    }
}

fn combine_guards(layer_guard: String, line_guard: String) -> String {
    if line_guard.is_empty() {
        return layer_guard;
    }
    if layer_guard.is_empty() {
        return line_guard;
    }
    format!("{} && ({})", layer_guard, line_guard)
}

fn normalize_command(kind: CommandKind, body: &str) -> String {
    match kind {
        CommandKind::Var | CommandKind::Set => {
            if body.contains('=') {
                body.to_string()
            } else {
                rewrite_pair(body, |name, value| format!("{} = {}", name, value))
            }
        }
        CommandKind::Add => rewrite_pair(body, |name, value| {
            format!("{} = {} + {}", name, name, value)
        }),
        CommandKind::Sub => rewrite_pair(body, |name, value| {
            format!("{} = {} - {}", name, name, value)
        }),
        CommandKind::Call | CommandKind::Wait => body.to_string(),
    }
}

fn rewrite_pair(body: &str, build: impl Fn(&str, &str) -> String) -> String {
    let parts: Vec<&str> = body.split_whitespace().collect();
    if parts.len() >= 2 {
        build(parts[0], &parts[1..].join(" "))
    } else {
        body.to_string()
    }
}

/// Deterministic internal-node identity: a namespaced UUID over the enclosing
/// node name, option text, indent level, and the active condition context.
fn internal_node_name(
    enclosing: &str,
    option_text: &str,
    level: usize,
    guard_context: Option<&str>,
) -> String {
    let mut context = String::new();
    context.push_str(enclosing);
    context.push('_');
    context.push_str(option_text);
    context.push('_');
    context.push_str(&level.to_string());
    if let Some(guard) = guard_context {
        context.push('_');
        context.push_str(guard);
    }

    let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, context.as_bytes());
    let bytes = digest.as_bytes();
    let short = u64::from_le_bytes(bytes[..8].try_into().expect("uuid digest has 16 bytes"));
    format!("internal_{:x}", short)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> (BTreeMap<String, DialogueNode>, ScriptParser) {
        let mut parser = ScriptParser::new();
        let nodes = parser.parse(content, "test.ds");
        (nodes, parser)
    }

    fn codes(parser: &ScriptParser) -> Vec<String> {
        parser
            .diagnostics()
            .for_source("test.ds")
            .iter()
            .map(|diagnostic| diagnostic.code.clone())
            .collect()
    }

    #[test]
    fn parses_nodes_blocks_and_speakers() {
        let (nodes, parser) = parse("::start\nMira[calm]: Welcome.\nNarrator: A door opens.\n");
        assert!(codes(&parser).is_empty());

        let start = nodes.get("start").expect("start node should exist");
        assert_eq!(start.blocks.len(), 2);
        assert_eq!(start.blocks[0].speaker, "Mira");
        assert_eq!(start.blocks[0].emotion, "calm");
        assert_eq!(start.blocks[0].text, "Welcome.");
        assert_eq!(start.blocks[1].speaker, "Narrator");
    }

    #[test]
    fn reparsing_a_node_name_replaces_it_wholesale() {
        let mut parser = ScriptParser::new();
        let first = parser.parse("::start\nA: one\nA: two", "a.ds");
        assert_eq!(first["start"].blocks.len(), 2);

        let second = parser.parse("::start\nA: only", "b.ds");
        assert_eq!(second["start"].blocks.len(), 1);
    }

    #[test]
    fn choice_attaches_to_the_preceding_block() {
        let (nodes, _) = parse("::start\nA: pick\n-> Left\n-> Right [if bold]\n");
        let block = &nodes["start"].blocks[0];
        assert_eq!(block.options.len(), 2);
        assert_eq!(block.options[0].text, "Left");
        assert_eq!(block.options[1].condition, "bold");
    }

    #[test]
    fn blank_line_forces_a_fresh_block_for_a_choice() {
        let (nodes, _) = parse("::start\nA: pick\n\n-> Lone\n");
        let start = &nodes["start"];
        assert_eq!(start.blocks.len(), 2);
        assert!(start.blocks[0].options.is_empty());
        assert_eq!(start.blocks[1].options.len(), 1);
    }

    #[test]
    fn nested_dialogue_synthesizes_an_internal_node() {
        let (nodes, _) = parse("::start\nA: pick\n-> Leave\n    A: See ya\n");
        let start = &nodes["start"];
        let option = &start.blocks[0].options[0];
        assert!(option.next_node.starts_with("internal_"));

        let internal = nodes
            .get(&option.next_node)
            .expect("internal node should exist");
        assert!(internal.is_internal);
        assert_eq!(internal.return_node.as_deref(), Some("start"));
        assert_eq!(internal.blocks.len(), 1);
        assert_eq!(internal.blocks[0].text, "See ya");
    }

    #[test]
    fn internal_node_names_are_stable_across_parses() {
        let script = "::start\nA: pick\n-> Leave\n    A: See ya\n";
        let (first, _) = parse(script);
        let (second, _) = parse(script);

        let names_first: Vec<&String> = first.keys().collect();
        let names_second: Vec<&String> = second.keys().collect();
        assert_eq!(names_first, names_second);
    }

    #[test]
    fn internal_node_names_survive_sibling_reordering() {
        let forward = "::start\nA: pick\n-> Alpha\n    A: one\n-> Beta\n    A: two\n";
        let backward = "::start\nA: pick\n-> Beta\n    A: two\n-> Alpha\n    A: one\n";

        let (first, _) = parse(forward);
        let (second, _) = parse(backward);

        let alpha_first = &first["start"].blocks[0].options[0];
        let alpha_second = &second["start"].blocks[0].options[1];
        assert_eq!(alpha_first.text, "Alpha");
        assert_eq!(alpha_second.text, "Alpha");
        assert_eq!(alpha_first.next_node, alpha_second.next_node);
    }

    #[test]
    fn jump_under_an_option_targets_the_option_directly() {
        let (nodes, _) = parse("::start\nA: pick\n-> Go\n    => market\n::market\nB: hi\n");
        let option = &nodes["start"].blocks[0].options[0];
        assert_eq!(option.next_node, "market");
    }

    #[test]
    fn command_under_an_option_lands_on_the_option() {
        let (nodes, _) = parse("::start\nA: pick\n-> Pay\n    sub gold 5\n");
        let option = &nodes["start"].blocks[0].options[0];
        assert_eq!(option.commands.len(), 1);
        assert_eq!(option.commands[0].kind, CommandKind::Sub);
        assert_eq!(option.commands[0].expression, "gold = gold - 5");
    }

    #[test]
    fn jump_after_nested_dialogue_chains_the_internal_block() {
        let (nodes, _) =
            parse("::start\nA: pick\n-> Leave\n    A: See ya\n    => start\n");
        let option = &nodes["start"].blocks[0].options[0];
        let internal = &nodes[&option.next_node];
        assert_eq!(internal.blocks[0].next_node, "start");
    }

    #[test]
    fn condition_layers_guard_blocks_and_count_their_levels() {
        let script = concat!(
            "::start\n",
            "if gold gt 10\n",
            "    A: rich\n",
            "elif gold gt 5\n",
            "    A: comfortable\n",
            "else\n",
            "    A: broke\n",
            "endif\n",
            "A: always\n",
        );
        let (nodes, parser) = parse(script);
        assert!(codes(&parser).is_empty());

        let blocks = &nodes["start"].blocks;
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].condition, "(gold > 10)");
        assert_eq!(blocks[1].condition, "!(gold > 10) && (gold > 5)");
        assert_eq!(blocks[2].condition, "!(gold > 10 || gold > 5)");
        assert_eq!(blocks[3].condition, "");
    }

    #[test]
    fn nested_condition_layers_compose() {
        let script = concat!(
            "::start\n",
            "if c\n",
            "    if a\n",
            "        A: both\n",
            "    endif\n",
            "endif\n",
        );
        let (nodes, _) = parse(script);
        assert_eq!(nodes["start"].blocks[0].condition, "(c) && (a)");
    }

    #[test]
    fn dialogue_line_guard_is_anded_with_the_layer_guard() {
        let script = "::start\nif a\n    B: hi [if b]\nendif\n";
        let (nodes, _) = parse(script);
        assert_eq!(nodes["start"].blocks[0].condition, "(a) && (b)");
    }

    #[test]
    fn condition_errors_carry_their_codes() {
        let (_, parser) = parse("::start\nendif\nelif x\nelse\n");
        assert_eq!(
            codes(&parser),
            vec!["UNMATCHED_ENDIF", "UNMATCHED_ELIF", "UNMATCHED_ELSE"]
        );

        let (_, parser) = parse("if x\nA: hi\n");
        // The `if` opens before any node exists, then stays unclosed.
        let found = codes(&parser);
        assert!(found.contains(&"CONDITION_OUTSIDE_NODE".to_string()));
        assert!(found.contains(&"DIALOGUE_OUTSIDE_NODE".to_string()));
    }

    #[test]
    fn unclosed_if_reports_the_missing_endif_count() {
        let (_, parser) = parse("::start\nif a\n    if b\n        A: hi\n");
        let diagnostics = parser.diagnostics().for_source("test.ds");
        let unclosed = diagnostics
            .iter()
            .find(|diagnostic| diagnostic.code == "UNCLOSED_IF")
            .expect("unclosed if should be reported");
        assert!(unclosed.message.contains("2 endif"));
    }

    #[test]
    fn duplicate_else_is_reported() {
        let (_, parser) = parse("::start\nif a\nelse\nelse\nendif\n");
        assert_eq!(codes(&parser), vec!["DUPLICATE_ELSE"]);
    }

    #[test]
    fn command_normalization_table() {
        let script = concat!(
            "::start\n",
            "var greeted false\n",
            "set gold 10\n",
            "set gold=11\n",
            "add gold 2\n",
            "sub gold 3\n",
            "call greet(\"hi\")\n",
            "wait 1.5\n",
        );
        let (nodes, parser) = parse(script);
        assert!(codes(&parser).is_empty());

        let commands = &nodes["start"].blocks[0].commands;
        let expressions: Vec<&str> = commands
            .iter()
            .map(|command| command.expression.as_str())
            .collect();
        assert_eq!(
            expressions,
            vec![
                "greeted = false",
                "gold = 10",
                "gold=11",
                "gold = gold + 2",
                "gold = gold - 3",
                "greet(\"hi\")",
                "1.5",
            ]
        );
    }

    #[test]
    fn malformed_commands_are_flagged_but_still_attached() {
        let (nodes, parser) = parse("::start\nset gold\ncall missing_parens\n");
        assert_eq!(
            codes(&parser),
            vec!["SET_COMMAND_FORMAT_ERROR", "CALL_COMMAND_FORMAT_ERROR"]
        );
        assert_eq!(nodes["start"].blocks[0].commands.len(), 2);
    }

    #[test]
    fn empty_command_body_is_dropped() {
        let (nodes, parser) = parse("::start\nwait\nA: hi\n");
        assert_eq!(codes(&parser), vec!["WAIT_COMMAND_EMPTY"]);
        assert!(nodes["start"].blocks[0].commands.is_empty());
    }

    #[test]
    fn dialogue_outside_any_node_is_an_error() {
        let (nodes, parser) = parse("A: lost\n");
        assert!(nodes.is_empty());
        assert_eq!(codes(&parser), vec!["DIALOGUE_OUTSIDE_NODE"]);
    }

    #[test]
    fn statements_split_by_semicolons_build_the_same_graph() {
        let (nodes, _) = parse("::start;A: one;B: two");
        assert_eq!(nodes["start"].blocks.len(), 2);
    }

    #[test]
    fn unrecognized_guard_only_line_is_reported() {
        let (_, parser) = parse("::start\n[if x]\n");
        assert_eq!(codes(&parser), vec!["UNRECOGNIZED_LINE"]);
    }
}
