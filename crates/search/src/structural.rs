use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StructuralMatch {
    /// Sum of matched rule weights, capped at 1.0
    pub score: f32,
    /// Names of the matched constructs, in rule order
    pub concepts: Vec<String>,
}

impl StructuralMatch {
    /// True when the text declares a function, type, class or interface
    #[must_use]
    pub fn is_definition(&self) -> bool {
        self.concepts
            .iter()
            .any(|c| matches!(c.as_str(), "function" | "class" | "type" | "interface"))
    }
}

struct Rule {
    concept: &'static str,
    weight: f32,
    pattern: Regex,
}

fn rule(concept: &'static str, weight: f32, pattern: &str) -> Rule {
    Rule {
        concept,
        weight,
        pattern: Regex::new(pattern).expect("valid structural pattern"),
    }
}

static GO_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule("function", 0.4, r"(?m)^\s*func\s+(\([^)]*\)\s*)?\w+\s*\("),
        rule("type", 0.3, r"(?m)^\s*type\s+\w+\s+struct\b"),
        rule("interface", 0.3, r"(?m)^\s*type\s+\w+\s+interface\b"),
        rule("package", 0.1, r"(?m)^\s*(package|import)\b"),
    ]
});

static PYTHON_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule("function", 0.4, r"(?m)^\s*(async\s+)?def\s+\w+\s*\("),
        rule("class", 0.3, r"(?m)^\s*class\s+\w+"),
        rule("import", 0.1, r"(?m)^\s*(import\s+\w+|from\s+[\w.]+\s+import)\b"),
    ]
});

static RUST_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule("function", 0.4, r"\bfn\s+\w+\s*[<(]"),
        rule("type", 0.3, r"\b(struct|enum)\s+\w+"),
        rule("interface", 0.3, r"\btrait\s+\w+"),
        rule("module", 0.1, r"(?m)^\s*(pub\s+)?(mod|use|impl)\b"),
    ]
});

static JS_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule(
            "function",
            0.4,
            r"\bfunction\s*\*?\s*\w*\s*\(|\b(const|let|var)\s+\w+\s*=\s*(async\s+)?\([^)]*\)\s*=>",
        ),
        rule("class", 0.3, r"\bclass\s+\w+"),
        rule("interface", 0.3, r"\b(interface|type)\s+\w+\s*[={<]"),
        rule("module", 0.1, r"(?m)^\s*(import|export)\b"),
    ]
});

static JVM_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule(
            "function",
            0.4,
            r"\b(public|private|protected|static|internal|override|fun)\s+[\w<>\[\],\s]*?\w+\s*\(",
        ),
        rule("class", 0.3, r"\b(class|record|object)\s+\w+"),
        rule("interface", 0.3, r"\binterface\s+\w+"),
        rule("package", 0.1, r"(?m)^\s*(package|import|using|namespace)\b"),
    ]
});

static GENERIC_RULES: Lazy<Vec<Rule>> = Lazy::new(|| {
    vec![
        rule("function", 0.3, r"\b(func|function|def|fn|sub|proc)\s+\w+"),
        rule("class", 0.2, r"\b(class|struct|interface|trait|type)\s+\w+"),
        rule("module", 0.1, r"(?m)^\s*(import|include|require|use|package)\b"),
    ]
});

fn rules_for(language: &str) -> &'static [Rule] {
    match language.trim().to_ascii_lowercase().as_str() {
        "go" | "golang" => &GO_RULES,
        "python" | "py" => &PYTHON_RULES,
        "rust" | "rs" => &RUST_RULES,
        "javascript" | "js" | "jsx" | "typescript" | "ts" | "tsx" => &JS_RULES,
        "java" | "kotlin" | "kt" | "scala" | "c#" | "csharp" | "cs" => &JVM_RULES,
        _ => &GENERIC_RULES,
    }
}

/// Language-aware structural weight of a code fragment
#[must_use]
pub fn structural_match(language: &str, text: &str) -> StructuralMatch {
    let mut result = StructuralMatch::default();
    for rule in rules_for(language) {
        if rule.pattern.is_match(text) {
            result.score += rule.weight;
            result.concepts.push(rule.concept.to_string());
        }
    }
    result.score = result.score.min(1.0);
    result
}

/// Structural strategy score: baseline doubled when the query appears verbatim
#[must_use]
pub fn structural_query_score(language: &str, text: &str, query: &str) -> StructuralMatch {
    let mut result = structural_match(language, text);
    let needle = query.trim().to_lowercase();
    if result.score > 0.0 && !needle.is_empty() && text.to_lowercase().contains(&needle) {
        result.score *= 2.0;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_function_outranks_package_clause() {
        let func = structural_match("Go", "func main() { fmt.Println(\"Hello\") }");
        let package = structural_match("Go", "package main");

        assert_eq!(func.concepts, vec!["function"]);
        assert_eq!(package.concepts, vec!["package"]);
        assert!(func.score > package.score);
        assert!(func.is_definition());
        assert!(!package.is_definition());
    }

    #[test]
    fn go_method_receivers_are_functions() {
        let m = structural_match("go", "func (s *Server) Start(ctx context.Context) error {");
        assert!(m.concepts.contains(&"function".to_string()));
    }

    #[test]
    fn python_class_with_methods() {
        let m = structural_match(
            "Python",
            "import os\n\nclass Loader:\n    def load(self, path):\n        return open(path)\n",
        );
        assert_eq!(m.concepts, vec!["function", "class", "import"]);
        assert!((m.score - 0.8).abs() < 1e-6);
    }

    #[test]
    fn score_is_capped() {
        let m = structural_match(
            "Rust",
            "use std::fmt;\npub trait Shape {}\npub struct Square;\nfn area() -> f32 { 1.0 }",
        );
        assert!(m.score <= 1.0);
        assert_eq!(m.concepts.len(), 4);
    }

    #[test]
    fn literal_query_doubles_baseline() {
        let text = "def parse_config(path):\n    pass";
        let plain = structural_query_score("python", text, "unrelated");
        let literal = structural_query_score("python", text, "PARSE_CONFIG");
        assert!((literal.score - plain.score * 2.0).abs() < 1e-6);
    }

    #[test]
    fn prose_has_no_structure() {
        let m = structural_query_score("Go", "This guide explains the build.", "guide");
        assert_eq!(m.score, 0.0);
    }
}
