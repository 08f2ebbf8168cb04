//! `{{variable}}` template rendering.
//!
//! Placeholder syntax is deliberately minimal: `{{name}}` with a
//! case-sensitive identifier (letters, digits, underscore), no nesting, no
//! escaping. Rendering never fails — a placeholder with no matching variable
//! is left verbatim so a missing variable degrades the output instead of
//! aborting a send.

use std::collections::HashMap;

/// A subject/body template plus its declared placeholder names.
#[derive(Debug, Clone)]
pub struct MessageTemplate {
    pub subject: String,
    pub body: String,
    /// Declared placeholders, used for warning telemetry only.
    pub declared: Vec<String>,
}

/// A rendered subject/body pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub body: String,
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Substitute `{{name}}` occurrences from `vars`. Unknown and malformed
/// placeholders are emitted verbatim.
pub fn substitute(input: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = &after[..end];
                if is_placeholder_name(name) {
                    if let Some(value) = vars.get(name) {
                        out.push_str(value);
                    } else {
                        out.push_str("{{");
                        out.push_str(name);
                        out.push_str("}}");
                    }
                } else {
                    out.push_str("{{");
                    out.push_str(name);
                    out.push_str("}}");
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated placeholder: everything left is literal.
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Every well-formed placeholder name occurring in `input`, in order of
/// first appearance.
pub fn placeholders(input: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = input;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = &after[..end];
                if is_placeholder_name(name) && !found.iter().any(|f| f == name) {
                    found.push(name.to_string());
                }
                rest = &after[end + 2..];
            }
            None => break,
        }
    }
    found
}

/// Render a template against a variable map.
///
/// Mismatches between the template's declared variable set and what the
/// caller supplied are reported through `tracing::warn!` — telemetry, not an
/// error.
pub fn render(template: &MessageTemplate, vars: &HashMap<String, String>) -> Rendered {
    let mut used = placeholders(&template.subject);
    for name in placeholders(&template.body) {
        if !used.contains(&name) {
            used.push(name);
        }
    }
    for name in &used {
        if !template.declared.is_empty() && !template.declared.iter().any(|d| d == name) {
            tracing::warn!(placeholder = %name, "Template uses an undeclared placeholder");
        }
        if !vars.contains_key(name) {
            tracing::warn!(placeholder = %name, "No variable supplied for placeholder");
        }
    }

    Rendered {
        subject: substitute(&template.subject, vars),
        body: substitute(&template.body, vars),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn renders_known_and_keeps_unknown_verbatim() {
        let template = MessageTemplate {
            subject: "Hi {{name}}".to_string(),
            body: "{{missing}}".to_string(),
            declared: vec!["name".to_string(), "missing".to_string()],
        };
        let rendered = render(&template, &vars(&[("name", "Ana")]));
        assert_eq!(rendered.subject, "Hi Ana");
        assert_eq!(rendered.body, "{{missing}}");
    }

    #[test]
    fn placeholders_are_case_sensitive() {
        let out = substitute("{{Name}} {{name}}", &vars(&[("name", "Ana")]));
        assert_eq!(out, "{{Name}} Ana");
    }

    #[test]
    fn repeated_placeholder_replaced_everywhere() {
        let out = substitute(
            "{{site}}, again {{site}}",
            &vars(&[("site", "General Sur")]),
        );
        assert_eq!(out, "General Sur, again General Sur");
    }

    #[test]
    fn malformed_placeholders_stay_literal() {
        let v = vars(&[("a", "X")]);
        assert_eq!(substitute("{{a b}}", &v), "{{a b}}");
        assert_eq!(substitute("{{", &v), "{{");
        assert_eq!(substitute("{{unterminated", &v), "{{unterminated");
        assert_eq!(substitute("{}{{a}}", &v), "{}X");
    }

    #[test]
    fn collects_placeholder_names_once() {
        assert_eq!(
            placeholders("{{a}} {{b}} {{a}} {{not valid}}"),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
