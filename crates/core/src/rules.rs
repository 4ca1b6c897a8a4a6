use crate::classifier;
use crate::error::RuleTableError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

const BUILTIN_RULES: &str = include_str!("../rules/default.toml");

fn default_priority() -> i32 {
    100
}

fn default_category() -> String {
    "general".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Rule {
    pub code: String,
    #[serde(rename = "name", alias = "display_name")]
    pub display_name: String,
    pub keywords: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_category")]
    pub category: String,
}

#[derive(Debug, Default, Deserialize)]
struct RuleFile {
    #[serde(default)]
    categories: BTreeMap<String, String>,
    #[serde(default)]
    rules: Vec<Rule>,
}

/// Immutable, validated set of classification rules.
///
/// Codes are unique and every rule carries at least one non-blank keyword.
/// Keywords that normalize to the same text are deduplicated, keeping the
/// first occurrence.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
    descriptions: BTreeMap<String, String>,
}

impl RuleTable {
    pub fn new(rules: Vec<Rule>) -> Result<Self, RuleTableError> {
        Self::with_descriptions(rules, BTreeMap::new())
    }

    fn with_descriptions(
        rules: Vec<Rule>,
        descriptions: BTreeMap<String, String>,
    ) -> Result<Self, RuleTableError> {
        let mut seen = HashSet::new();
        let mut validated = Vec::with_capacity(rules.len());
        for mut rule in rules {
            rule.code = rule.code.trim().to_string();
            if rule.code.is_empty() {
                return Err(RuleTableError::BlankField {
                    code: rule.display_name.clone(),
                    field: "code",
                });
            }
            if rule.display_name.trim().is_empty() {
                return Err(RuleTableError::BlankField {
                    code: rule.code.clone(),
                    field: "name",
                });
            }
            if !seen.insert(rule.code.clone()) {
                return Err(RuleTableError::DuplicateCode(rule.code));
            }
            if rule.keywords.is_empty() {
                return Err(RuleTableError::EmptyKeywords(rule.code));
            }
            if rule.keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(RuleTableError::BlankField {
                    code: rule.code.clone(),
                    field: "keyword",
                });
            }
            let mut normalized = HashSet::new();
            rule.keywords.retain(|k| normalized.insert(classifier::normalize(k)));
            validated.push(rule);
        }
        Ok(Self {
            rules: validated,
            descriptions,
        })
    }

    /// The rules shipped with the crate.
    pub fn builtin() -> Result<Self, RuleTableError> {
        Self::from_toml_str(BUILTIN_RULES, Path::new("<builtin>"))
    }

    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, RuleTableError> {
        let file = parse_rule_file(content, origin)?;
        Self::with_descriptions(file.rules, file.categories)
    }

    /// Loads a single `.toml` file or every `.toml` file in a directory,
    /// merged in file-name order.
    pub fn load_from_path(path: &Path) -> Result<Self, RuleTableError> {
        let io_err = |source| RuleTableError::Io {
            path: path.to_path_buf(),
            source,
        };
        let files: Vec<PathBuf> = if path.is_dir() {
            let mut files = Vec::new();
            for entry in fs::read_dir(path).map_err(io_err)? {
                let entry = entry.map_err(io_err)?;
                let p = entry.path();
                if p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("toml") {
                    files.push(p);
                }
            }
            files.sort();
            files
        } else {
            vec![path.to_path_buf()]
        };

        let mut rules = Vec::new();
        let mut descriptions = BTreeMap::new();
        for file in files {
            let content = fs::read_to_string(&file).map_err(|source| RuleTableError::Io {
                path: file.clone(),
                source,
            })?;
            let parsed = parse_rule_file(&content, &file)?;
            rules.extend(parsed.rules);
            descriptions.extend(parsed.categories);
        }
        Self::with_descriptions(rules, descriptions)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn find(&self, code: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.code == code)
    }

    pub fn categories(&self) -> Vec<String> {
        self.rules
            .iter()
            .map(|r| r.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn by_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| r.category == category)
    }

    pub fn category_description(&self, category: &str) -> Option<&str> {
        self.descriptions.get(category).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn parse_rule_file(content: &str, origin: &Path) -> Result<RuleFile, RuleTableError> {
    toml::from_str(content).map_err(|e| RuleTableError::Parse {
        path: origin.to_path_buf(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rule(code: &str, keywords: &[&str]) -> Rule {
        Rule {
            code: code.to_string(),
            display_name: format!("Rule {code}"),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            priority: 100,
            category: "general".to_string(),
        }
    }

    #[test]
    fn builtin_table_loads() {
        let table = RuleTable::builtin().unwrap();
        assert_eq!(table.len(), 25);
        let invoice = table.find("4001").unwrap();
        assert_eq!(invoice.display_name, "Invoice");
        assert_eq!(invoice.priority, 170);
        assert_eq!(
            table.category_description("billing"),
            Some("Invoices, receipts, and payment documents")
        );
        assert!(table.find("9999").is_none());
    }

    #[test]
    fn categories_are_sorted_and_distinct() {
        let table = RuleTable::builtin().unwrap();
        assert_eq!(
            table.categories(),
            vec![
                "billing", "customer", "data", "financial", "hr", "insurance", "legal", "reports"
            ]
        );
        assert_eq!(table.by_category("insurance").count(), 2);
    }

    #[test]
    fn duplicate_codes_rejected() {
        let err = RuleTable::new(vec![rule("1", &["a"]), rule("1", &["b"])]).unwrap_err();
        assert!(matches!(err, RuleTableError::DuplicateCode(c) if c == "1"));
    }

    #[test]
    fn empty_and_blank_keywords_rejected() {
        let err = RuleTable::new(vec![rule("1", &[])]).unwrap_err();
        assert!(matches!(err, RuleTableError::EmptyKeywords(_)));

        let err = RuleTable::new(vec![rule("2", &["ok", "  "])]).unwrap_err();
        assert!(matches!(err, RuleTableError::BlankField { field: "keyword", .. }));
    }

    #[test]
    fn keywords_deduplicated_case_insensitively() {
        let table = RuleTable::new(vec![rule("1", &["Invoice", "invoice", "bill"])]).unwrap();
        assert_eq!(table.rules()[0].keywords, vec!["Invoice", "bill"]);
    }

    #[test]
    fn keywords_differing_only_in_spacing_count_once() {
        let table =
            RuleTable::new(vec![rule("1", &["amount due", "Amount  Due", " amount\tdue "])]).unwrap();
        assert_eq!(table.rules()[0].keywords, vec!["amount due"]);

        let result = classifier::classify(
            "the amount due is 10",
            &table,
            &classifier::ScoringOptions::default(),
        );
        assert_eq!(result.score, 1);
    }

    #[test]
    fn loads_directory_in_file_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("b.toml"),
            "[[rules]]\ncode = \"2\"\nname = \"Second\"\nkeywords = [\"two\"]\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("a.toml"),
            "[categories]\nmisc = \"Miscellaneous\"\n\n[[rules]]\ncode = \"1\"\nname = \"First\"\nkeywords = [\"one\"]\ncategory = \"misc\"\npriority = 5\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let table = RuleTable::load_from_path(dir.path()).unwrap();
        let codes: Vec<&str> = table.rules().iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["1", "2"]);
        assert_eq!(table.find("2").unwrap().priority, 100);
        assert_eq!(table.find("2").unwrap().category, "general");
        assert_eq!(table.category_description("misc"), Some("Miscellaneous"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = RuleTable::from_toml_str("[[rules]]\ncode = 1", Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, RuleTableError::Parse { .. }));
    }
}
