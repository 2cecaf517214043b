use std::collections::BTreeMap;

use ds_core::DialogueNode;
use regex::Regex;
use uuid::Uuid;

const DEFAULT_LANGUAGE: &str = "en-US";

/// Key → text storage per language, with a current → default → key fallback
/// chain.
#[derive(Debug, Clone)]
pub struct LocalizationCatalog {
    texts: BTreeMap<String, BTreeMap<String, String>>,
    current_language: String,
    default_language: String,
}

impl Default for LocalizationCatalog {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE, DEFAULT_LANGUAGE)
    }
}

impl LocalizationCatalog {
    pub fn new(current_language: &str, default_language: &str) -> Self {
        Self {
            texts: BTreeMap::new(),
            current_language: current_language.to_string(),
            default_language: default_language.to_string(),
        }
    }

    pub fn current_language(&self) -> &str {
        &self.current_language
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn load_language(&mut self, language: &str, texts: BTreeMap<String, String>) {
        if texts.is_empty() {
            log::warn!("Localization texts for {} are empty", language);
            return;
        }
        log::info!("Loaded {} localization texts for {}", texts.len(), language);
        self.texts.insert(language.to_string(), texts);
    }

    pub fn switch_language(&mut self, language: &str) {
        if !self.texts.contains_key(language) {
            log::warn!("Language {} not loaded, starting it empty", language);
            self.texts.insert(language.to_string(), BTreeMap::new());
        }
        self.current_language = language.to_string();
    }

    /// Falls back to the key itself when no language resolves it.
    pub fn text(&self, key: &str) -> String {
        if let Some(found) = self
            .texts
            .get(&self.current_language)
            .and_then(|texts| texts.get(key))
        {
            return found.clone();
        }
        if self.current_language != self.default_language {
            if let Some(found) = self
                .texts
                .get(&self.default_language)
                .and_then(|texts| texts.get(key))
            {
                return found.clone();
            }
        }
        key.to_string()
    }

    pub fn set_text(&mut self, language: &str, key: &str, text: &str) {
        self.texts
            .entry(language.to_string())
            .or_default()
            .insert(key.to_string(), text.to_string());
    }

    pub fn texts_for(&self, language: &str) -> Option<&BTreeMap<String, String>> {
        self.texts.get(language)
    }

    /// Collects localizable texts from loaded nodes into `language`, keeping
    /// any key that already exists.
    pub fn collect_from_nodes(
        &mut self,
        nodes: &BTreeMap<String, DialogueNode>,
        language: &str,
    ) {
        let extracted = self.extract_from_nodes(nodes);
        for (key, text) in extracted {
            let already = self
                .texts
                .get(language)
                .map(|texts| texts.contains_key(&key))
                .unwrap_or(false);
            if !already {
                self.set_text(language, &key, &text);
            }
        }
    }

    /// Texts worth localizing: block texts, option texts (with a `choice_`
    /// prefix), and `l(...)` keys referenced from interpolation spans.
    pub fn extract_from_nodes(
        &self,
        nodes: &BTreeMap<String, DialogueNode>,
    ) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();

        for node in nodes.values() {
            for block in &node.blocks {
                if !block.text.is_empty() && !block.text.starts_with('#') {
                    let key = generate_key(&block.text, &node.name);
                    out.insert(key, block.text.clone());
                    self.extract_interpolation_keys(&block.text, &mut out);
                }
                for option in &block.options {
                    if !option.text.is_empty() && !option.text.starts_with('#') {
                        let key = format!("choice_{}", generate_key(&option.text, &node.name));
                        out.insert(key, option.text.clone());
                        self.extract_interpolation_keys(&option.text, &mut out);
                    }
                }
            }
        }

        out
    }

    fn extract_interpolation_keys(&self, text: &str, out: &mut BTreeMap<String, String>) {
        let pattern = Regex::new(
            r#"\{\s*l\(\s*(?:"(?P<key1>[^"]*)"|'(?P<key2>[^']*)'|(?P<key3>[^)"']+))\s*\)\s*\}"#,
        )
        .expect("localization key regex must compile");

        for captures in pattern.captures_iter(text) {
            let key = captures
                .name("key1")
                .or_else(|| captures.name("key2"))
                .or_else(|| captures.name("key3"))
                .map(|matched| matched.as_str().trim().to_string())
                .unwrap_or_default();

            if key.is_empty() || out.contains_key(&key) {
                continue;
            }
            let known = self
                .texts
                .get(&self.current_language)
                .map(|texts| texts.contains_key(&key))
                .unwrap_or(false);
            if !known {
                out.insert(key.clone(), format!("[Not translated: {}]", key));
            }
        }
    }
}

/// Deterministic key: a readable prefix from the text plus a short stable
/// hash, scoped by node name.
fn generate_key(text: &str, context: &str) -> String {
    if text.is_empty() {
        return "empty_text".to_string();
    }

    let punctuation = Regex::new(r"[\p{P}\s]").expect("punctuation regex must compile");
    let head: String = text.chars().take(10).collect();
    let mut prefix = punctuation
        .replace_all(&head.to_lowercase(), "")
        .to_string();
    if prefix.is_empty() {
        prefix = "text".to_string();
    }

    let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, text.as_bytes());
    let bytes = digest.as_bytes();
    let short = u32::from_le_bytes(bytes[..4].try_into().expect("uuid digest has 16 bytes"));

    format!("text_{}_{}_{:08X}", context, prefix, short)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ds_core::DialogueBlock;

    fn texts(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect()
    }

    #[test]
    fn lookup_falls_back_current_then_default_then_key() {
        let mut catalog = LocalizationCatalog::new("fr-FR", "en-US");
        catalog.load_language("en-US", texts(&[("greet", "Hello"), ("bye", "Bye")]));
        catalog.load_language("fr-FR", texts(&[("greet", "Bonjour")]));

        assert_eq!(catalog.text("greet"), "Bonjour");
        assert_eq!(catalog.text("bye"), "Bye");
        assert_eq!(catalog.text("missing"), "missing");
    }

    #[test]
    fn switch_language_creates_missing_languages_empty() {
        let mut catalog = LocalizationCatalog::default();
        catalog.switch_language("de-DE");
        assert_eq!(catalog.current_language(), "de-DE");
        assert!(catalog
            .texts_for("de-DE")
            .expect("language should exist")
            .is_empty());
    }

    #[test]
    fn collects_block_and_option_texts_with_stable_keys() {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "start".to_string(),
            DialogueNode {
                name: "start".to_string(),
                is_internal: false,
                return_node: None,
                blocks: vec![DialogueBlock {
                    text: "Welcome in!".to_string(),
                    options: vec![ds_core::DialogueOption {
                        text: "Leave".to_string(),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
            },
        );

        let mut catalog = LocalizationCatalog::default();
        catalog.collect_from_nodes(&nodes, "en-US");
        let collected = catalog.texts_for("en-US").expect("language should exist");

        assert!(collected.values().any(|text| text == "Welcome in!"));
        assert!(collected.keys().any(|key| key.starts_with("choice_")));

        let first: Vec<String> = collected.keys().cloned().collect();
        let again = catalog.extract_from_nodes(&nodes);
        for key in again.keys() {
            assert!(first.contains(key));
        }
    }

    #[test]
    fn extracts_interpolation_keys_in_all_three_quote_forms() {
        let catalog = LocalizationCatalog::default();
        let mut out = BTreeMap::new();
        catalog.extract_interpolation_keys(
            r#"{l("double")} {l('single')} {l(bare_key)}"#,
            &mut out,
        );

        assert_eq!(out.get("double"), Some(&"[Not translated: double]".to_string()));
        assert!(out.contains_key("single"));
        assert!(out.contains_key("bare_key"));
    }

    #[test]
    fn hash_suffix_keeps_similar_texts_apart() {
        let a = generate_key("Hello there, friend", "n");
        let b = generate_key("Hello there, fiend", "n");
        assert_ne!(a, b);
        assert!(a.starts_with("text_n_hellother"));
    }
}
