use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub entropy: EntropyConfig,
    pub code_style: CodeStyleConfig,
    pub taint: TaintConfig,
    pub sql: SqlConfig,
    /// Cap on reported entropy findings; `0` keeps them all.
    pub max_entropy_findings: usize,
}

impl AnalysisConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntropyConfig {
    pub variables_min_length: usize,
    pub variables_threshold: f64,
    pub variables_min_count: usize,
    pub single_variable_min_length: usize,
    pub array_keys_min_length: usize,
    pub array_keys_threshold: f64,
    pub array_keys_verdict_multiplier: f64,
    pub array_keys_min_count: usize,
    pub long_int_min_digits: usize,
    pub long_int_threshold: f64,
    pub long_int_min_count: usize,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            variables_min_length: 3,
            variables_threshold: 2.0,
            variables_min_count: 3,
            single_variable_min_length: 5,
            array_keys_min_length: 3,
            array_keys_threshold: 2.5,
            array_keys_verdict_multiplier: 0.5,
            array_keys_min_count: 3,
            long_int_min_digits: 4,
            long_int_threshold: 0.3,
            long_int_min_count: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeStyleConfig {
    pub normal_line_length: usize,
    pub critical_line_length: usize,
    pub special_symbols_proportion: f64,
    pub random_weight_threshold: f64,
    pub random_word_min_length: usize,
}

impl Default for CodeStyleConfig {
    fn default() -> Self {
        Self {
            normal_line_length: 300,
            critical_line_length: 1000,
            special_symbols_proportion: 3.0,
            random_weight_threshold: 1.0,
            random_word_min_length: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaintConfig {
    pub raw_input_variables: Vec<String>,
    pub sanitizers: Vec<String>,
    pub short_conditional_window: usize,
}

impl Default for TaintConfig {
    fn default() -> Self {
        Self {
            raw_input_variables: ["$_POST", "$_GET", "$_REQUEST", "$_COOKIE"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sanitizers: vec!["sanitize_text_field".to_string(), "prepare".to_string()],
            short_conditional_window: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlConfig {
    pub keywords: Vec<String>,
    pub object_methods: Vec<String>,
    pub mysqli_classes: Vec<String>,
    pub mysqli_methods: Vec<String>,
    pub pdo_classes: Vec<String>,
    pub pdo_methods: Vec<String>,
    pub functions: Vec<String>,
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            keywords: owned(&[
                "SELECT", "INSERT", "UPDATE", "LIMIT", "DESC", "ASC", "UNION", "JOIN",
            ]),
            object_methods: owned(&["query", "get_results"]),
            mysqli_classes: owned(&["MYSQLI", "mysqli"]),
            mysqli_methods: owned(&["query", "send_query", "multi_query"]),
            pdo_classes: owned(&["PDO", "pdo"]),
            pdo_methods: owned(&["query", "exec"]),
            functions: owned(&[
                "mysql_query",
                "mysqli_query",
                "mysqli_send_query",
                "mysqli_multi_query",
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            AnalysisConfig::from_json(r#"{"code_style": {"critical_line_length": 500}}"#).unwrap();
        assert_eq!(config.code_style.critical_line_length, 500);
        assert_eq!(config.code_style.normal_line_length, 300);
        assert_eq!(config.entropy, EntropyConfig::default());
        assert_eq!(config.max_entropy_findings, 0);
    }

    #[test]
    fn test_default_taint_sources() {
        let config = TaintConfig::default();
        assert!(config.raw_input_variables.contains(&"$_COOKIE".to_string()));
        assert_eq!(config.short_conditional_window, 10);
    }
}
