//! `${NAME}` placeholder resolution.
//!
//! Resolution runs once over every string in a provider's parameter bag
//! before the provider is constructed. A field whose placeholders cannot
//! all be resolved is removed from the bag and remembered, so the
//! constructor can decide whether that field was required.

use std::collections::{BTreeMap, HashMap};

use serde_yaml::Value;

/// Source of environment variable values.
pub trait EnvSource: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
}

/// Reads from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

/// Expand every `${NAME}` in `input`.
///
/// Unset names are pushed onto `missing` and expand to nothing. A `$` not
/// followed by `{`, or an unterminated `${`, is kept literally.
pub fn resolve_placeholders(input: &str, env: &dyn EnvSource, missing: &mut Vec<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match env.get(name) {
                    Some(value) => out.push_str(&value),
                    None => missing.push(name.to_string()),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// Resolve a single optional setting, treating any unset placeholder as absent.
pub fn resolve_optional(input: &str, env: &dyn EnvSource) -> Option<String> {
    let mut missing = Vec::new();
    let value = resolve_placeholders(input, env, &mut missing);
    (missing.is_empty() && !value.is_empty()).then_some(value)
}

/// A provider parameter bag after placeholder resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedParams {
    values: BTreeMap<String, Value>,
    /// Field name -> first unset variable it referenced.
    unresolved: BTreeMap<String, String>,
}

impl ResolvedParams {
    /// Resolve every string (including strings nested in lists and maps).
    pub fn resolve(params: &BTreeMap<String, Value>, env: &dyn EnvSource) -> Self {
        let mut resolved = Self::default();
        for (field, value) in params {
            let mut missing = Vec::new();
            let value = resolve_value(value, env, &mut missing);
            match missing.into_iter().next() {
                Some(var) => {
                    resolved.unresolved.insert(field.clone(), var);
                }
                None => {
                    resolved.values.insert(field.clone(), value);
                }
            }
        }
        resolved
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.values.get(field)
    }

    /// Non-empty string value of `field`, if present and resolved.
    pub fn str(&self, field: &str) -> Option<&str> {
        self.values
            .get(field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn u64(&self, field: &str) -> Option<u64> {
        self.values.get(field).and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    pub fn bool(&self, field: &str) -> Option<bool> {
        self.values.get(field).and_then(|v| match v {
            Value::Bool(b) => Some(*b),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }

    /// A list of strings; a single string is treated as a one-element list.
    pub fn strings(&self, field: &str) -> Option<Vec<String>> {
        match self.values.get(field)? {
            Value::Sequence(items) => Some(
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect(),
            ),
            Value::String(s) => Some(vec![s.clone()]),
            _ => None,
        }
    }

    /// The unset variable a field referenced, if its resolution failed.
    pub fn unresolved(&self, field: &str) -> Option<&str> {
        self.unresolved.get(field).map(String::as_str)
    }
}

fn resolve_value(value: &Value, env: &dyn EnvSource, missing: &mut Vec<String>) -> Value {
    match value {
        Value::String(s) => Value::String(resolve_placeholders(s, env, missing)),
        Value::Sequence(items) => Value::Sequence(
            items
                .iter()
                .map(|item| resolve_value(item, env, missing))
                .collect(),
        ),
        Value::Mapping(map) => Value::Mapping(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, env, missing)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_whole_value() {
        let mut missing = Vec::new();
        let out = resolve_placeholders("${FOO}", &env(&[("FOO", "bar123")]), &mut missing);
        assert_eq!(out, "bar123");
        assert!(missing.is_empty());
    }

    #[test]
    fn substitutes_inside_text() {
        let mut missing = Vec::new();
        let out = resolve_placeholders(
            "http://${HOST}:${PORT}/v1",
            &env(&[("HOST", "gpu-box"), ("PORT", "8080")]),
            &mut missing,
        );
        assert_eq!(out, "http://gpu-box:8080/v1");
    }

    #[test]
    fn records_unset_names() {
        let mut missing = Vec::new();
        let out = resolve_placeholders("key-${NOPE}", &env(&[]), &mut missing);
        assert_eq!(out, "key-");
        assert_eq!(missing, vec!["NOPE".to_string()]);
    }

    #[test]
    fn leaves_unterminated_and_bare_dollars() {
        let mut missing = Vec::new();
        assert_eq!(resolve_placeholders("$5 ${OPEN", &env(&[]), &mut missing), "$5 ${OPEN");
        assert!(missing.is_empty());
    }

    #[test]
    fn keeps_non_ascii_text() {
        let mut missing = Vec::new();
        let out = resolve_placeholders("模型-${X}-ü", &env(&[("X", "1")]), &mut missing);
        assert_eq!(out, "模型-1-ü");
    }

    #[test]
    fn resolves_nested_values_and_tracks_fields() {
        let params: BTreeMap<String, Value> = serde_yaml::from_str(
            r#"
api_key: ${KEY}
api_base: ${MISSING_BASE}
models: ["${M}", plain]
timeout: 30
"#,
        )
        .unwrap();
        let resolved = ResolvedParams::resolve(&params, &env(&[("KEY", "sk-1"), ("M", "m1")]));

        assert_eq!(resolved.str("api_key"), Some("sk-1"));
        assert_eq!(resolved.str("api_base"), None);
        assert_eq!(resolved.unresolved("api_base"), Some("MISSING_BASE"));
        assert_eq!(resolved.strings("models").unwrap(), ["m1", "plain"]);
        assert_eq!(resolved.u64("timeout"), Some(30));
    }

    #[test]
    fn optional_setting_absent_when_unset() {
        assert_eq!(resolve_optional("${NOPE}", &env(&[])), None);
        assert_eq!(resolve_optional("${K}", &env(&[("K", "v")])), Some("v".to_string()));
        assert_eq!(resolve_optional("literal", &env(&[])), Some("literal".to_string()));
    }
}
