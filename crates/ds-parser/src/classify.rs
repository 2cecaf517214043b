use ds_core::CommandKind;

use crate::cursor::{LineCursor, QuoteState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConditionDirective {
    If(String),
    Elif(String),
    Else,
    Endif,
}

/// One classified statement with its raw fields extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ParsedLine {
    Blank,
    NodeHeader {
        name: String,
    },
    Choice {
        text: String,
        condition: String,
    },
    Condition(ConditionDirective),
    Jump {
        target: String,
    },
    Command {
        kind: CommandKind,
        body: String,
    },
    Dialogue {
        speaker: String,
        emotion: String,
        text: String,
        condition: String,
    },
}

/// Tries the grammar forms in fixed priority order; first match wins.
pub(crate) fn classify(text: &str) -> Option<ParsedLine> {
    if text.is_empty() {
        return Some(ParsedLine::Blank);
    }

    let chars: Vec<char> = text.chars().collect();

    if let Some(line) = parse_node_header(&chars) {
        return Some(line);
    }
    if let Some(line) = parse_choice(&chars) {
        return Some(line);
    }
    if let Some(line) = parse_condition(text) {
        return Some(line);
    }
    if let Some(line) = parse_jump(&chars) {
        return Some(line);
    }
    if let Some(line) = parse_command(&chars) {
        return Some(line);
    }
    parse_dialogue(&chars)
}

/// Advances the cursor until `stop` matches outside a quoted string, returning
/// the consumed text. The cursor is left on the stopping char.
fn read_until_unquoted(
    cursor: &mut LineCursor<'_>,
    stop: impl Fn(&LineCursor<'_>, char) -> bool,
) -> String {
    let start = cursor.position();
    let mut quotes = QuoteState::default();

    while let Some(c) = cursor.try_peek() {
        let previous = cursor.previous();
        if (c == '"' || c == '\'') && previous == Some('\\') {
            cursor.advance(1);
            continue;
        }
        quotes.observe(c, previous);
        if !quotes.in_string() && stop(cursor, c) {
            break;
        }
        cursor.advance(1);
    }

    cursor.slice(start, cursor.position())
}

fn parse_node_header(chars: &[char]) -> Option<ParsedLine> {
    let mut cursor = LineCursor::new(chars);
    cursor.skip_whitespace();

    if !cursor.starts_with("::") && !cursor.starts_with("：：") {
        return None;
    }
    cursor.advance(2);
    cursor.skip_whitespace();

    let name = cursor.rest().trim().to_string();
    if name.is_empty() {
        return None;
    }

    Some(ParsedLine::NodeHeader { name })
}

fn parse_choice(chars: &[char]) -> Option<ParsedLine> {
    let mut cursor = LineCursor::new(chars);
    cursor.skip_whitespace();

    if !cursor.starts_with("->") && !cursor.starts_with("-》") {
        return None;
    }
    cursor.advance(2);
    cursor.skip_whitespace();

    let text = read_until_unquoted(&mut cursor, |cur, c| c == '[' && cur.starts_with("[if "));
    let text = text.trim_end().to_string();
    if text.is_empty() {
        return None;
    }

    let mut condition = String::new();
    if cursor.try_peek() == Some('[') {
        cursor.advance(1);
        cursor.skip_whitespace();
        if !cursor.starts_with("if") {
            return None;
        }
        cursor.advance(2);
        if !matches!(cursor.try_peek(), Some(c) if c.is_whitespace()) {
            return None;
        }
        cursor.skip_whitespace();

        condition = read_until_unquoted(&mut cursor, |_, c| c == ']')
            .trim()
            .to_string();
        if !cursor.try_read_char(']') {
            return None;
        }
    }

    Some(ParsedLine::Choice { text, condition })
}

fn parse_condition(text: &str) -> Option<ParsedLine> {
    let trimmed = text.trim();

    // `else`/`endif` must be the whole statement so that dialogue lines like
    // `elsewhere: ...` never match a directive.
    if trimmed == "else" {
        return Some(ParsedLine::Condition(ConditionDirective::Else));
    }
    if trimmed == "endif" {
        return Some(ParsedLine::Condition(ConditionDirective::Endif));
    }
    if let Some(rest) = trimmed.strip_prefix("if ") {
        return Some(ParsedLine::Condition(ConditionDirective::If(
            rest.trim().to_string(),
        )));
    }
    if let Some(rest) = trimmed.strip_prefix("elif ") {
        return Some(ParsedLine::Condition(ConditionDirective::Elif(
            rest.trim().to_string(),
        )));
    }

    None
}

fn parse_jump(chars: &[char]) -> Option<ParsedLine> {
    let mut cursor = LineCursor::new(chars);
    cursor.skip_whitespace();

    if cursor.starts_with("=>") || cursor.starts_with("=》") {
        cursor.advance(2);
    } else if cursor.starts_with("jump ") {
        cursor.advance(5);
    } else {
        return None;
    }
    cursor.skip_whitespace();

    let target = read_until_unquoted(&mut cursor, |_, c| c.is_whitespace())
        .trim()
        .to_string();
    if target.is_empty() {
        return None;
    }

    Some(ParsedLine::Jump { target })
}

fn parse_command(chars: &[char]) -> Option<ParsedLine> {
    let mut cursor = LineCursor::new(chars);
    cursor.skip_whitespace();

    let keyword = read_until_unquoted(&mut cursor, |_, c| c.is_whitespace());
    let kind = CommandKind::from_keyword(keyword.trim())?;

    cursor.skip_whitespace();
    let body = cursor.rest().trim().to_string();

    Some(ParsedLine::Command { kind, body })
}

/// The default form. Only a statement that reduces to nothing at all fails to
/// classify as dialogue.
fn parse_dialogue(chars: &[char]) -> Option<ParsedLine> {
    let whole: String = chars.iter().collect::<String>().trim().to_string();
    let bare = |content: &str| {
        let (text, condition) = split_trailing_guard(content);
        if text.is_empty() {
            return None;
        }
        Some(ParsedLine::Dialogue {
            speaker: String::new(),
            emotion: String::new(),
            text,
            condition,
        })
    };

    let mut cursor = LineCursor::new(chars);
    cursor.skip_whitespace();

    let speaker = read_until_unquoted(&mut cursor, |_, c| c == '[' || c == ':' || c == '：')
        .trim()
        .to_string();
    if speaker.is_empty() {
        return bare(&whole);
    }

    let mut emotion = String::new();
    if cursor.try_peek() == Some('[') {
        cursor.advance(1);
        cursor.skip_whitespace();
        emotion = read_until_unquoted(&mut cursor, |_, c| c == ']')
            .trim()
            .to_string();
        if !cursor.try_read_char(']') {
            return bare(&whole);
        }
        cursor.skip_whitespace();
    }

    if !cursor.try_read_char(':') && !cursor.try_read_char('：') {
        return bare(&whole);
    }
    cursor.skip_whitespace();

    let rest = cursor.rest();
    let (text, condition) = split_trailing_guard(rest.trim());

    Some(ParsedLine::Dialogue {
        speaker,
        emotion,
        text,
        condition,
    })
}

/// Splits an optional trailing `[if <condition>]` off a dialogue line. A
/// malformed guard leaves the content untouched.
fn split_trailing_guard(content: &str) -> (String, String) {
    let chars: Vec<char> = content.chars().collect();
    let mut cursor = LineCursor::new(&chars);

    let text = read_until_unquoted(&mut cursor, |cur, c| c == '[' && cur.starts_with("[if "));
    if cursor.try_peek() != Some('[') {
        return (content.to_string(), String::new());
    }

    cursor.advance(1);
    cursor.skip_whitespace();
    if !cursor.starts_with("if") {
        return (content.to_string(), String::new());
    }
    cursor.advance(2);
    if !matches!(cursor.try_peek(), Some(c) if c.is_whitespace()) {
        return (content.to_string(), String::new());
    }
    cursor.skip_whitespace();

    let condition = read_until_unquoted(&mut cursor, |_, c| c == ']')
        .trim()
        .to_string();
    if !cursor.try_read_char(']') || cursor.try_peek().is_some() {
        return (content.to_string(), String::new());
    }

    (text.trim_end().to_string(), condition)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_headers_match_ascii_and_fullwidth() {
        assert_eq!(
            classify("::start"),
            Some(ParsedLine::NodeHeader {
                name: "start".to_string()
            })
        );
        assert_eq!(
            classify("：： 市场"),
            Some(ParsedLine::NodeHeader {
                name: "市场".to_string()
            })
        );
    }

    #[test]
    fn choice_with_and_without_guard() {
        assert_eq!(
            classify("-> Leave"),
            Some(ParsedLine::Choice {
                text: "Leave".to_string(),
                condition: String::new()
            })
        );
        assert_eq!(
            classify("-> Buy it [if gold >= 10]"),
            Some(ParsedLine::Choice {
                text: "Buy it".to_string(),
                condition: "gold >= 10".to_string()
            })
        );
    }

    #[test]
    fn choice_text_keeps_brackets_that_are_not_guards() {
        assert_eq!(
            classify("-> Open the [locked] door"),
            Some(ParsedLine::Choice {
                text: "Open the [locked] door".to_string(),
                condition: String::new()
            })
        );
    }

    #[test]
    fn condition_directives_require_exact_keywords() {
        assert_eq!(
            classify("if gold > 3"),
            Some(ParsedLine::Condition(ConditionDirective::If(
                "gold > 3".to_string()
            )))
        );
        assert_eq!(
            classify("elif gold > 1"),
            Some(ParsedLine::Condition(ConditionDirective::Elif(
                "gold > 1".to_string()
            )))
        );
        assert_eq!(
            classify("else"),
            Some(ParsedLine::Condition(ConditionDirective::Else))
        );
        assert_eq!(
            classify("endif"),
            Some(ParsedLine::Condition(ConditionDirective::Endif))
        );
        // Not directives: these fall through to dialogue.
        assert!(matches!(
            classify("elsewhere: the wind howls"),
            Some(ParsedLine::Dialogue { .. })
        ));
        assert!(matches!(
            classify("endiflike text"),
            Some(ParsedLine::Dialogue { .. })
        ));
    }

    #[test]
    fn jumps_match_arrow_and_keyword_forms() {
        assert_eq!(
            classify("=> market"),
            Some(ParsedLine::Jump {
                target: "market".to_string()
            })
        );
        assert_eq!(
            classify("jump market"),
            Some(ParsedLine::Jump {
                target: "market".to_string()
            })
        );
        assert_eq!(
            classify("=》 market"),
            Some(ParsedLine::Jump {
                target: "market".to_string()
            })
        );
    }

    #[test]
    fn jump_target_stops_at_unquoted_whitespace() {
        assert_eq!(
            classify("=> market ignored"),
            Some(ParsedLine::Jump {
                target: "market".to_string()
            })
        );
    }

    #[test]
    fn commands_match_keyword_case_insensitively() {
        assert_eq!(
            classify("set gold 10"),
            Some(ParsedLine::Command {
                kind: CommandKind::Set,
                body: "gold 10".to_string()
            })
        );
        assert_eq!(
            classify("CALL greet()"),
            Some(ParsedLine::Command {
                kind: CommandKind::Call,
                body: "greet()".to_string()
            })
        );
        // `settle` is not a command keyword.
        assert!(matches!(
            classify("settle down: ok"),
            Some(ParsedLine::Dialogue { .. })
        ));
    }

    #[test]
    fn dialogue_with_speaker_emotion_and_guard() {
        assert_eq!(
            classify("Mira[angry]: Get out! [if patience < 1]"),
            Some(ParsedLine::Dialogue {
                speaker: "Mira".to_string(),
                emotion: "angry".to_string(),
                text: "Get out!".to_string(),
                condition: "patience < 1".to_string(),
            })
        );
    }

    #[test]
    fn dialogue_without_colon_is_bare_content() {
        assert_eq!(
            classify("Just narration text"),
            Some(ParsedLine::Dialogue {
                speaker: String::new(),
                emotion: String::new(),
                text: "Just narration text".to_string(),
                condition: String::new(),
            })
        );
    }

    #[test]
    fn malformed_emotion_bracket_demotes_to_bare_content() {
        assert_eq!(
            classify("Mira[angry Get out!"),
            Some(ParsedLine::Dialogue {
                speaker: String::new(),
                emotion: String::new(),
                text: "Mira[angry Get out!".to_string(),
                condition: String::new(),
            })
        );
    }

    #[test]
    fn fullwidth_colon_separates_speaker() {
        assert_eq!(
            classify("Mira：hello"),
            Some(ParsedLine::Dialogue {
                speaker: "Mira".to_string(),
                emotion: String::new(),
                text: "hello".to_string(),
                condition: String::new(),
            })
        );
    }

    #[test]
    fn bare_line_supports_trailing_guard() {
        assert_eq!(
            classify("The door is open. [if door_open]"),
            Some(ParsedLine::Dialogue {
                speaker: String::new(),
                emotion: String::new(),
                text: "The door is open.".to_string(),
                condition: "door_open".to_string(),
            })
        );
    }

    #[test]
    fn guard_in_the_middle_of_a_line_is_kept_as_text() {
        let parsed = classify("A: early [if x] late");
        assert_eq!(
            parsed,
            Some(ParsedLine::Dialogue {
                speaker: "A".to_string(),
                emotion: String::new(),
                text: "early [if x] late".to_string(),
                condition: String::new(),
            })
        );
    }

    #[test]
    fn blank_statement_classifies_as_blank() {
        assert_eq!(classify(""), Some(ParsedLine::Blank));
    }

    #[test]
    fn guard_with_no_text_fails_to_classify() {
        assert_eq!(classify("[if x]"), None);
    }
}
