use std::collections::BTreeMap;

pub use ds_core::{
    Category, Command, CommandKind, Diagnostic, DialogueBlock, DialogueNode, DialogueOption,
    DialogueScriptError, DsValue, ProgressRecord, ReturnPoint, Severity,
};
pub use ds_parser::ScriptParser;
pub use ds_runtime::{
    DialogueEngine, DialogueEngineOptions, DialogueEvent, DialogueListener, DialogueProgress,
    ExpressionRunner, HostFunction, LocalizationCatalog, NodeRegistry, VariableStore,
};

#[derive(Clone)]
pub struct CreateEngineOptions {
    /// Source name → raw script text. Sources parse in map order; later
    /// sources replace colliding node names wholesale.
    pub sources: BTreeMap<String, String>,
    pub current_language: Option<String>,
    pub default_language: Option<String>,
}

pub struct ParsedSources {
    pub nodes: BTreeMap<String, DialogueNode>,
    pub diagnostics: BTreeMap<String, Vec<Diagnostic>>,
}

/// Runs the parser over every source and merges the node tables. Parsing
/// never fails outright; whatever each pass produced is merged and the
/// diagnostics travel alongside.
pub fn parse_sources(sources: &BTreeMap<String, String>) -> ParsedSources {
    let mut parser = ScriptParser::new();
    let mut nodes = BTreeMap::new();

    for (source_name, content) in sources {
        let parsed = parser.parse(content, source_name);
        for (name, node) in parsed {
            nodes.insert(name, node);
        }
    }

    ParsedSources {
        nodes,
        diagnostics: parser.diagnostics().all().clone(),
    }
}

/// Parses the sources and builds an engine over the merged node table. The
/// caller decides what to do with the diagnostics; an engine is returned even
/// for a script full of errors, running whatever parsed.
pub fn create_engine_from_sources(
    options: CreateEngineOptions,
) -> (DialogueEngine, BTreeMap<String, Vec<Diagnostic>>) {
    let parsed = parse_sources(&options.sources);
    let engine = DialogueEngine::new(DialogueEngineOptions {
        nodes: parsed.nodes,
        current_language: options.current_language,
        default_language: options.default_language,
    });
    (engine, parsed.diagnostics)
}
