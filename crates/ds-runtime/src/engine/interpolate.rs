use regex::Regex;

use super::*;

impl DialogueEngine {
    /// A line whose first character is `#` is replaced wholly by a
    /// localization lookup. Otherwise every `{...}` span resolves
    /// independently: `l(...)` as a localization key, anything with `(` as an
    /// evaluated call, anything else as a variable name. A span that errors
    /// renders as an in-band error marker without affecting its neighbors.
    pub(super) fn interpolate(&self, text: &str) -> String {
        if text.is_empty() {
            return text.to_string();
        }
        if let Some(key) = text.strip_prefix('#') {
            return self.localization.borrow().text(key.trim());
        }

        let pattern = Regex::new(r"\{\s*(.*?)\s*\}").expect("interpolation regex must compile");
        let mut out = String::new();
        let mut last_index = 0usize;

        for captures in pattern.captures_iter(text) {
            let full = captures
                .get(0)
                .expect("capture group 0 must exist for each match");
            let expression = captures.get(1).map(|group| group.as_str()).unwrap_or("");

            out.push_str(&text[last_index..full.start()]);
            out.push_str(&self.interpolate_span(expression));
            last_index = full.end();
        }
        out.push_str(&text[last_index..]);
        out
    }

    fn interpolate_span(&self, expression: &str) -> String {
        if let Some(inner) = expression
            .strip_prefix("l(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let key = strip_matching_quotes(inner.trim());
            return self.localization.borrow().text(key);
        }

        if expression.contains('(') {
            return match self.evaluator.evaluate(&self.variables, expression) {
                Ok(value) => value.to_display_string(),
                Err(error) => {
                    log::error!(
                        "Failed to interpolate expression: {}: {}",
                        expression,
                        error
                    );
                    format!("[Error: {}]", expression)
                }
            };
        }

        match self.variables.get(expression) {
            Some(value) => value.to_display_string(),
            None => expression.to_string(),
        }
    }
}

fn strip_matching_quotes(key: &str) -> &str {
    let bytes = key.as_bytes();
    if key.len() >= 2
        && ((bytes[0] == b'"' && bytes[key.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[key.len() - 1] == b'\''))
    {
        return &key[1..key.len() - 1];
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_matching_quotes_requires_a_matching_pair() {
        assert_eq!(strip_matching_quotes("\"key\""), "key");
        assert_eq!(strip_matching_quotes("'key'"), "key");
        assert_eq!(strip_matching_quotes("\"key'"), "\"key'");
        assert_eq!(strip_matching_quotes("key"), "key");
        assert_eq!(strip_matching_quotes("\""), "\"");
    }
}
