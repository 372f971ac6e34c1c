//! Flow variables
//!
//! String-valued variables scoped to a running flow. Actor properties can be
//! bound to a variable name; the bound value is re-read before each execution.

use std::collections::BTreeMap;

/// Start of a variable placeholder
pub const START: &str = "@{";

/// End of a variable placeholder
pub const END: &str = "}";

/// Prefix that routes a lookup to the process environment
pub const ENVIRONMENT_PREFIX: &str = "env.";

/// Characters allowed in variable and storage names
pub const NAME_CHARS: &str =
    "abcdefghijklmnopqrstuvwxyz_ABCDEFGHIJKLMNOPQRSTUVWXYZ-0123456789:.";

/// Check a variable or storage name against the allowed charset
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| NAME_CHARS.contains(c))
}

/// Wrap a name in placeholder markers (`name` -> `@{name}`)
pub fn pad_name(name: &str) -> String {
    if is_placeholder(name) {
        name.to_string()
    } else {
        format!("{}{}{}", START, name, END)
    }
}

/// Whether the string is exactly one placeholder
pub fn is_placeholder(s: &str) -> bool {
    s.starts_with(START) && s.ends_with(END) && s.len() > START.len() + END.len()
}

/// Strip placeholder markers (`@{name}` -> `name`)
pub fn extract_name(s: &str) -> &str {
    if is_placeholder(s) {
        &s[START.len()..s.len() - END.len()]
    } else {
        s
    }
}

/// Flow-scoped variable store
#[derive(Debug, Clone, Default)]
pub struct Variables {
    values: BTreeMap<String, String>,
}

impl Variables {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, returning the previous value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(name.into(), value.into())
    }

    /// Whether the variable is defined (environment lookups included)
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Look up a variable; `env.NAME` reads the process environment
    pub fn get(&self, name: &str) -> Option<String> {
        if let Some(value) = self.values.get(name) {
            return Some(value.clone());
        }

        name.strip_prefix(ENVIRONMENT_PREFIX)
            .and_then(|env_name| std::env::var(env_name).ok())
    }

    /// Remove a variable
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.values.remove(name)
    }

    /// Number of flow-defined variables
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no variables are defined
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over variable names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Remove all variables
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Replace every `@{name}` placeholder with the variable's value
    ///
    /// Unknown placeholders are left untouched.
    pub fn expand(&self, s: &str) -> String {
        let mut result = String::with_capacity(s.len());
        let mut rest = s;

        while let Some(start) = rest.find(START) {
            let after = &rest[start + START.len()..];
            let Some(end) = after.find(END) else {
                break;
            };

            let name = &after[..end];
            result.push_str(&rest[..start]);
            match self.get(name) {
                Some(value) => result.push_str(&value),
                None => {
                    result.push_str(START);
                    result.push_str(name);
                    result.push_str(END);
                }
            }
            rest = &after[end + END.len()..];
        }

        result.push_str(rest);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("out.dir"));
        assert!(is_valid_name("a-b_c:1"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("with space"));
        assert!(!is_valid_name("brace{"));
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(pad_name("x"), "@{x}");
        assert_eq!(pad_name("@{x}"), "@{x}");
        assert_eq!(extract_name("@{x}"), "x");
        assert_eq!(extract_name("x"), "x");
        assert!(!is_placeholder("@{}"));
    }

    #[test]
    fn test_expand() {
        let mut vars = Variables::new();
        vars.set("dir", "/tmp");
        vars.set("file", "out.txt");

        assert_eq!(vars.expand("@{dir}/@{file}"), "/tmp/out.txt");
        assert_eq!(vars.expand("@{missing}/x"), "@{missing}/x");
        assert_eq!(vars.expand("no placeholders"), "no placeholders");
        assert_eq!(vars.expand("dangling @{dir"), "dangling @{dir");
    }

    #[test]
    fn test_environment_lookup() {
        let vars = Variables::new();
        // PATH is set in any sane test environment
        assert!(vars.has("env.PATH"));
        assert!(!vars.has("env.FLOWCORE_SURELY_UNSET_VARIABLE"));
    }
}
