use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub generation: GenerationConfig,
    pub vocabulary: VocabularyConfig,
    pub users: UsersConfig,
    pub classes: Vec<MatrixSourceConfig>,
    #[serde(default)]
    pub fraud: FraudConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    pub seed: u64,
    pub n_users: u64,
    #[serde(default = "default_n_days")]
    pub n_days: u32,
    pub sessions_per_user_per_day: u32,
    /// Upper bound on transitions per session. Unbounded when absent.
    pub max_session_steps: Option<usize>,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_n_days() -> u32 {
    1
}

fn default_workers() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct VocabularyConfig {
    pub actions: Vec<String>,
    #[serde(default = "default_pad_token")]
    pub pad_token: String,
    #[serde(default = "default_true")]
    pub allow_empty_sessions: bool,
}

fn default_pad_token() -> String {
    "<pad>".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct UsersConfig {
    pub class_probabilities: Vec<f64>,
}

/// A named transition matrix, given inline or as a headerless CSV file.
#[derive(Debug, Deserialize, Clone)]
pub struct MatrixSourceConfig {
    pub name: String,
    pub matrix: Option<Vec<Vec<f64>>>,
    pub matrix_csv: Option<String>,
    /// Relative share among fraud models. Ignored for user classes.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

// ============================================================
// Fraud Config
// ============================================================

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FraudConfig {
    #[serde(default)]
    pub potential_fraudster_probability: f64,
    #[serde(default)]
    pub commit_probability: f64,
    #[serde(default)]
    pub models: Vec<MatrixSourceConfig>,
}

// ============================================================
// Output Config
// ============================================================

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Jsonl,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: String,
    #[serde(default)]
    pub format: OutputFormat,
    pub vocabulary_path: Option<String>,
    pub manifest_path: Option<String>,
    pub failures_path: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            format: OutputFormat::Csv,
            vocabulary_path: None,
            manifest_path: None,
            failures_path: None,
        }
    }
}

fn default_output_path() -> String {
    "sessions.csv".to_string()
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        Self::parse(&content)
            .map_err(|e| eyre::eyre!("Invalid config file '{}': {}", path, e))
    }

    pub fn parse(content: &str) -> eyre::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> eyre::Result<()> {
        if self.generation.n_users == 0 {
            return Err(eyre::eyre!("generation.n_users must be greater than zero"));
        }
        if self.generation.n_days == 0 {
            return Err(eyre::eyre!("generation.n_days must be greater than zero"));
        }
        if self.generation.sessions_per_user_per_day == 0 {
            return Err(eyre::eyre!(
                "generation.sessions_per_user_per_day must be greater than zero"
            ));
        }
        if self.generation.max_session_steps == Some(0) {
            return Err(eyre::eyre!(
                "generation.max_session_steps must be greater than zero when set"
            ));
        }
        if self.generation.workers == 0 {
            return Err(eyre::eyre!("generation.workers must be at least 1"));
        }
        if self.classes.is_empty() {
            return Err(eyre::eyre!("At least one user class must be configured"));
        }
        if self.classes.len() != self.users.class_probabilities.len() {
            return Err(eyre::eyre!(
                "{} classes configured but {} class probabilities given",
                self.classes.len(),
                self.users.class_probabilities.len()
            ));
        }
        for source in self.classes.iter().chain(&self.fraud.models) {
            match (&source.matrix, &source.matrix_csv) {
                (Some(_), None) | (None, Some(_)) => {}
                (Some(_), Some(_)) => {
                    return Err(eyre::eyre!(
                        "Model '{}' sets both matrix and matrix_csv",
                        source.name
                    ))
                }
                (None, None) => {
                    return Err(eyre::eyre!(
                        "Model '{}' needs either matrix or matrix_csv",
                        source.name
                    ))
                }
            }
        }
        let fraud_possible = self.fraud.potential_fraudster_probability > 0.0
            && self.fraud.commit_probability > 0.0;
        if fraud_possible && self.fraud.models.is_empty() {
            return Err(eyre::eyre!(
                "Fraud probabilities are non-zero but no fraud models are configured"
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[generation]
seed = 7
n_users = 200
sessions_per_user_per_day = 200

[vocabulary]
actions = ["start", "end", "login"]

[users]
class_probabilities = [1.0]

[[classes]]
name = "clerk"
matrix = [[0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.0, 1.0, 0.0]]
"#;

    #[test]
    fn test_parse_minimal_config() {
        let config = Config::parse(MINIMAL).unwrap();
        assert_eq!(config.generation.seed, 7);
        assert_eq!(config.generation.n_users, 200);
        assert_eq!(config.generation.n_days, 1); // default
        assert_eq!(config.generation.workers, 1); // default
        assert_eq!(config.generation.max_session_steps, None);
        assert_eq!(config.vocabulary.pad_token, "<pad>");
        assert!(config.vocabulary.allow_empty_sessions);
        assert_eq!(config.classes[0].name, "clerk");
        assert_eq!(config.fraud.potential_fraudster_probability, 0.0);
        assert!(config.fraud.models.is_empty());
        assert_eq!(config.output.path, "sessions.csv");
        assert_eq!(config.output.format, OutputFormat::Csv);
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[generation]
seed = 1
n_users = 10
n_days = 3
sessions_per_user_per_day = 5
max_session_steps = 500
workers = 4

[vocabulary]
actions = ["start", "end", "login", "export"]
pad_token = "PAD"

[users]
class_probabilities = [0.5, 0.5]

[[classes]]
name = "sales"
matrix_csv = "models/sales.csv"

[[classes]]
name = "support"
matrix_csv = "models/support.csv"

[fraud]
potential_fraudster_probability = 0.1
commit_probability = 0.3

[[fraud.models]]
name = "bulk_export"
weight = 2.0
matrix_csv = "models/bulk_export.csv"

[output]
path = "out/sessions.jsonl"
format = "jsonl"
vocabulary_path = "out/vocab.json"
"#;

        let config = Config::parse(toml_str).unwrap();
        assert_eq!(config.generation.max_session_steps, Some(500));
        assert_eq!(config.generation.workers, 4);
        assert_eq!(config.classes.len(), 2);
        assert_eq!(config.fraud.models[0].weight, 2.0);
        assert_eq!(config.classes[0].weight, 1.0); // default
        assert_eq!(config.output.format, OutputFormat::Jsonl);
        assert_eq!(config.output.vocabulary_path.as_deref(), Some("out/vocab.json"));
        assert_eq!(config.output.manifest_path, None);
    }

    #[test]
    fn test_validate_zero_users() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.generation.n_users = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_days() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.generation.n_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_max_steps() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.generation.max_session_steps = Some(0);
        assert!(config.validate().is_err());

        config.generation.max_session_steps = Some(1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_probability_length_mismatch() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.users.class_probabilities = vec![0.5, 0.5];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_matrix_source() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.classes[0].matrix_csv = Some("clerk.csv".to_string());
        assert!(config.validate().is_err());

        config.classes[0].matrix = None;
        config.classes[0].matrix_csv = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_fraud_without_models() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.fraud.potential_fraudster_probability = 0.2;
        config.fraud.commit_probability = 0.5;
        assert!(config.validate().is_err());
    }
}
