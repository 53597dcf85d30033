//! Tooltip template rendering
//!
//! Placeholders are `{field}`. Each one is replaced by the record's value for that field,
//! or by nothing when the field is missing or null. A placeholder ends at the first `}`, so
//! braces are not escapable. Text without a closing brace is kept.

use crate::Record;

/// Substitute every `{field}` placeholder in `template` with values from `record`
pub fn render_template(template: &str, record: &Record) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open + 1..].find('}') else {
            break;
        };
        out.push_str(&rest[..open]);
        let name = &rest[open + 1..open + 1 + close];
        if let Some(value) = record.text(name) {
            out.push_str(&value);
        }
        rest = &rest[open + close + 2..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_substitution() {
        let record = Record::new("s", 1, json!({"name": "A", "title": null}));
        assert_eq!(render_template("<b>{name}{title}</b>", &record), "<b>A</b>");
    }

    #[test]
    fn test_missing_field_and_numbers() {
        let record = Record::new("s", 1, json!({"count": 3, "ok": true}));
        assert_eq!(render_template("{count}x {ok} {nope}.", &record), "3x true .");
    }

    #[test]
    fn test_unclosed_brace_is_literal() {
        let record = Record::new("s", 1, json!({"name": "A"}));
        assert_eq!(render_template("{name} {open", &record), "A {open");
        assert_eq!(render_template("no placeholders", &record), "no placeholders");
    }

    #[test]
    fn test_doubled_braces_close_at_first_brace() {
        let record = Record::new("s", 1, json!({"name": "A"}));
        // The placeholder is `{name`, which no record field matches
        assert_eq!(render_template("{{name}}", &record), "}");
        assert_eq!(render_template("{name}}", &record), "A}");
    }

    #[test]
    fn test_multibyte_text() {
        let record = Record::new("s", 1, json!({"name": "Größe"}));
        assert_eq!(render_template("→{name}←", &record), "→Größe←");
    }
}
