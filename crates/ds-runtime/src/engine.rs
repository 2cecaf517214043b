use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use ds_core::{DialogueBlock, DialogueNode, DsValue};
use uuid::Uuid;

use crate::evaluator::{ExpressionRunner, HostFunction};
use crate::events::{DialogueEvent, DialogueListener, EventHub};
use crate::localization::LocalizationCatalog;
use crate::progress::DialogueProgress;
use crate::registry::NodeRegistry;
use crate::variables::VariableStore;

mod advance;
mod commands;
mod interpolate;
mod lookahead;
mod select;

pub struct DialogueEngineOptions {
    pub nodes: BTreeMap<String, DialogueNode>,
    pub current_language: Option<String>,
    pub default_language: Option<String>,
}

/// The execution state machine. Walks the parsed graph one dialogue unit at a
/// time, driven by an external caller; every failure mode degrades to a log
/// line plus a no-op or an early dialogue-completed, never a propagated error.
pub struct DialogueEngine {
    registry: Rc<RefCell<NodeRegistry>>,
    progress: Rc<RefCell<DialogueProgress>>,
    localization: Rc<RefCell<LocalizationCatalog>>,
    variables: VariableStore,
    evaluator: ExpressionRunner,
    events: EventHub,
    is_executing: bool,
    current_section_id: String,
    current_node_name: String,
    current_node: Option<DialogueNode>,
    current_block_index: usize,
    current_block: Option<DialogueBlock>,
}

impl DialogueEngine {
    pub fn new(options: DialogueEngineOptions) -> Self {
        let mut registry = NodeRegistry::new();
        registry.merge(options.nodes);
        let registry = Rc::new(RefCell::new(registry));

        let default_language = options
            .default_language
            .unwrap_or_else(|| "en-US".to_string());
        let current_language = options
            .current_language
            .unwrap_or_else(|| default_language.clone());
        let localization = Rc::new(RefCell::new(LocalizationCatalog::new(
            &current_language,
            &default_language,
        )));

        let progress = Rc::new(RefCell::new(DialogueProgress::new()));
        let evaluator = ExpressionRunner::new(
            Rc::clone(&localization),
            Rc::clone(&progress),
            Rc::clone(&registry),
        );

        Self {
            registry,
            progress,
            localization,
            variables: VariableStore::new(),
            evaluator,
            events: EventHub::default(),
            is_executing: false,
            current_section_id: String::new(),
            current_node_name: String::new(),
            current_node: None,
            current_block_index: 0,
            current_block: None,
        }
    }

    pub fn on_event(&mut self, listener: DialogueListener) {
        self.events.subscribe(listener);
    }

    pub fn register_node(&mut self, node: DialogueNode) {
        self.registry.borrow_mut().register(node);
    }

    pub fn register_nodes(&mut self, nodes: BTreeMap<String, DialogueNode>) {
        self.registry.borrow_mut().merge(nodes);
    }

    pub fn node(&self, name: &str) -> Option<DialogueNode> {
        self.registry.borrow().get(name).cloned()
    }

    pub fn nodes_snapshot(&self) -> BTreeMap<String, DialogueNode> {
        self.registry.borrow().nodes().clone()
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn variables_mut(&mut self) -> &mut VariableStore {
        &mut self.variables
    }

    pub fn register_builtin_variable(
        &mut self,
        name: &str,
        getter: impl Fn() -> DsValue + 'static,
        setter: impl Fn(DsValue) + 'static,
    ) {
        self.variables.register_builtin(name, getter, setter);
    }

    pub fn register_function(&mut self, name: &str, function: HostFunction) {
        self.evaluator.register_function(name, function);
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.evaluator.has_function(name)
    }

    pub fn load_localization(&mut self, language: &str, texts: BTreeMap<String, String>) {
        self.localization.borrow_mut().load_language(language, texts);
    }

    pub fn switch_language(&mut self, language: &str) {
        self.localization.borrow_mut().switch_language(language);
        self.events
            .emit(&DialogueEvent::LanguageChanged(language.to_string()));
    }

    pub fn localized_text(&self, key: &str) -> String {
        self.localization.borrow().text(key)
    }

    pub fn collect_localization_from_nodes(&mut self, language: &str) {
        let nodes = self.registry.borrow().nodes().clone();
        self.localization
            .borrow_mut()
            .collect_from_nodes(&nodes, language);
    }

    pub fn localization_texts(&self, language: &str) -> BTreeMap<String, String> {
        self.localization
            .borrow()
            .texts_for(language)
            .cloned()
            .unwrap_or_default()
    }

    pub fn progress_snapshot(&self) -> DialogueProgress {
        self.progress.borrow().clone()
    }

    /// Restores a persisted ledger, e.g. after a process restart. Variables
    /// are restored separately through the variable store.
    pub fn load_progress(&mut self, progress: DialogueProgress) {
        *self.progress.borrow_mut() = progress;
    }

    pub fn current_section_id(&self) -> &str {
        &self.current_section_id
    }

    pub fn current_node_name(&self) -> &str {
        &self.current_node_name
    }

    pub fn current_node(&self) -> Option<&DialogueNode> {
        self.current_node.as_ref()
    }

    pub fn current_block_index(&self) -> usize {
        self.current_block_index
    }

    /// The finalized block last handed to listeners: text interpolated,
    /// options filtered to the visible set.
    pub fn current_block(&self) -> Option<&DialogueBlock> {
        self.current_block.as_ref()
    }

    pub fn is_executing(&self) -> bool {
        self.is_executing
    }

    pub fn is_active(&self) -> bool {
        !self.current_section_id.is_empty()
    }

    /// Ends the dialogue. While commands are executing the call is refused
    /// unless forced; a forced end also clears the executing flag.
    pub fn end_say(&mut self, force: bool) {
        if self.is_executing && !force {
            log::info!("Executing commands, please wait...");
            return;
        }
        if self.current_section_id.is_empty() {
            return;
        }

        self.current_section_id.clear();
        self.current_node_name.clear();
        self.current_node = None;
        self.current_block_index = 0;
        self.current_block = None;
        self.progress.borrow_mut().clear_return_points();

        if force && self.is_executing {
            self.is_executing = false;
            log::info!("Forced end interrupted command execution");
        }

        self.events.emit(&DialogueEvent::DialogueCompleted);
    }

    fn end_if_active(&mut self) {
        if !self.current_section_id.is_empty() {
            self.end_say(false);
        }
    }

    fn mint_section_id() -> String {
        Uuid::new_v4().simple().to_string()
    }

    fn process_current_node(&mut self) {
        if self.current_node.is_none() {
            self.end_if_active();
            return;
        }
        self.progress.borrow_mut().record_node(&self.current_node_name);
        self.events
            .emit(&DialogueEvent::NodeStarted(self.current_node_name.clone()));
    }
}
