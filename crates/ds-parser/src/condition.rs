use regex::Regex;

/// One open `if`/`elif`/`else` group, recorded at the indent level of its
/// `if` line.
#[derive(Debug, Clone)]
pub(crate) struct ConditionLayer {
    pub(crate) clauses: Vec<String>,
    pub(crate) has_else: bool,
    pub(crate) level: usize,
}

/// The nested condition layers open at the current point of the document.
#[derive(Debug, Default)]
pub(crate) struct ConditionTracker {
    layers: Vec<ConditionLayer>,
}

impl ConditionTracker {
    pub(crate) fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub(crate) fn open_count(&self) -> usize {
        self.layers.len()
    }

    pub(crate) fn open(&mut self, condition: String, level: usize) {
        self.layers.push(ConditionLayer {
            clauses: vec![condition],
            has_else: false,
            level,
        });
    }

    pub(crate) fn pop(&mut self) -> Option<ConditionLayer> {
        self.layers.pop()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut ConditionLayer> {
        self.layers.last_mut()
    }

    pub(crate) fn clear(&mut self) {
        self.layers.clear();
    }

    /// Folds every open layer whose level is within reach of `level` into one
    /// guard expression, outermost first. A non-else layer with clauses
    /// `c1..cn` contributes `!(c1) && ... && (cn)`; an else layer contributes
    /// `!(c1 || c2 || ...)`. Layer contributions are ANDed together.
    pub(crate) fn build_guard(&self, level: usize) -> String {
        let mut parts = Vec::new();

        for layer in &self.layers {
            if layer.clauses.is_empty() {
                continue;
            }
            if level < layer.level {
                continue;
            }

            if layer.has_else {
                parts.push(format!("!({})", layer.clauses.join(" || ")));
            } else {
                let last = layer.clauses.len() - 1;
                let joined = layer
                    .clauses
                    .iter()
                    .enumerate()
                    .map(|(index, clause)| {
                        if index == last {
                            format!("({})", clause)
                        } else {
                            format!("!({})", clause)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" && ");
                parts.push(joined);
            }
        }

        parts.retain(|part| !part.is_empty());
        parts.join(" && ")
    }
}

/// Rewrites word-operator keywords to their symbolic forms and collapses
/// whitespace. Condition text only; command bodies are merely trimmed.
pub(crate) fn preprocess_condition(expression: &str) -> String {
    let expression = expression.trim();
    if expression.is_empty() {
        return String::new();
    }

    let replacements: [(&str, &str); 10] = [
        (r"\band\b", " && "),
        (r"\bor\b", " || "),
        (r"\bnot\b", " ! "),
        (r"\bxor\b", " ^ "),
        (r"\beq\b", " == "),
        (r"\bneq\b", " != "),
        (r"\bgt\b", " > "),
        (r"\blt\b", " < "),
        (r"\bgte\b", " >= "),
        (r"\blte\b", " <= "),
    ];

    let mut out = expression.to_string();
    for (pattern, symbol) in replacements {
        let regex = Regex::new(pattern).expect("operator keyword regex must compile");
        out = regex.replace_all(&out, symbol).to_string();
    }

    let whitespace = Regex::new(r"\s+").expect("whitespace regex must compile");
    whitespace.replace_all(&out, " ").trim().to_string()
}
