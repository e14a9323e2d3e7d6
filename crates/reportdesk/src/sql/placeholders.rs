use std::sync::OnceLock;

use regex::{Captures, Regex};

/// SQL text rewritten for the engine's named-parameter syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSql {
    pub text: String,
    /// Distinct placeholder names in order of first appearance.
    pub names: Vec<String>,
}

impl CompiledSql {
    #[must_use]
    pub fn binding_name(name: &str) -> String {
        format!(":{name}")
    }
}

/// Rewrites `%(name)s` placeholders to `:name` and `%%` to `%`.
///
/// Values never pass through here; they are bound later through the driver.
#[must_use]
pub fn compile_placeholders(template: &str) -> CompiledSql {
    let mut names: Vec<String> = Vec::new();
    let text = placeholder_regex().replace_all(template, |captures: &Captures<'_>| {
        match captures.name("name") {
            Some(name) => {
                let name = name.as_str();
                if !names.iter().any(|known| known == name) {
                    names.push(name.to_string());
                }
                CompiledSql::binding_name(name)
            }
            None => "%".to_string(),
        }
    });

    CompiledSql {
        text: text.into_owned(),
        names,
    }
}

fn placeholder_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"%\((?P<name>[A-Za-z_][A-Za-z0-9_]*)\)s|%%")
            .expect("placeholder regex should compile")
    })
}
