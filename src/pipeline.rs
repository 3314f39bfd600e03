use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, MatrixSourceConfig};
use crate::dataset::{GeneratedLog, LogAssembler, UserBatch};
use crate::error::{GenerationError, ValidationError};
use crate::export::load_matrix_csv;
use crate::markov::{ActionVocabulary, ChainSimulator, TransitionModel};
use crate::schedule::{FraudModel, ScheduleConfig, SessionScheduler};
use crate::users::{UserClass, UserProfile, UserProfileAssigner};

/// A named matrix before validation.
#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub name: String,
    pub matrix: Vec<Vec<f64>>,
    pub weight: f64,
}

impl ModelSpec {
    pub fn new(name: impl Into<String>, matrix: Vec<Vec<f64>>) -> Self {
        Self {
            name: name.into(),
            matrix,
            weight: 1.0,
        }
    }
}

/// Everything needed to build a pipeline, with matrices already resolved.
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    pub actions: Vec<String>,
    pub allow_empty_sessions: bool,
    pub classes: Vec<ModelSpec>,
    pub class_probabilities: Vec<f64>,
    pub fraud_models: Vec<ModelSpec>,
    pub potential_fraudster_probability: f64,
    pub commit_probability: f64,
    pub n_users: u64,
    pub n_days: u32,
    pub sessions_per_user_per_day: u32,
    pub seed: u64,
    pub max_session_steps: Option<usize>,
}

/// Orchestrates a generation run:
/// 1. Profile assignment (one seeded rng for the whole population)
/// 2. Session scheduling (one derived rng stream per user)
/// 3. Log assembly in user order
pub struct GenerationPipeline {
    pub vocabulary: Arc<ActionVocabulary>,
    pub assigner: UserProfileAssigner,
    pub scheduler: Arc<SessionScheduler>,
    n_users: u64,
    seed: u64,
}

impl GenerationPipeline {
    /// Validate every model and parameter. Nothing is simulated here.
    pub fn new(spec: PipelineSpec) -> Result<Self, ValidationError> {
        let vocabulary = ActionVocabulary::new(spec.actions)?;

        if spec.n_users == 0 {
            return Err(ValidationError::ZeroCount("number of users"));
        }
        if spec.max_session_steps == Some(0) {
            return Err(ValidationError::ZeroCount("maximum session steps"));
        }

        let build = |source: ModelSpec| {
            TransitionModel::with_options(
                source.name,
                source.matrix,
                &vocabulary,
                spec.allow_empty_sessions,
            )
            .map(Arc::new)
        };

        let classes = spec
            .classes
            .into_iter()
            .map(|source| {
                let name = source.name.clone();
                build(source).map(|model| UserClass::new(name, model))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let fraud_models = spec
            .fraud_models
            .into_iter()
            .map(|source| {
                let name = source.name.clone();
                let weight = source.weight;
                build(source).map(|model| FraudModel {
                    name,
                    model,
                    weight,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let fraud_possible =
            spec.potential_fraudster_probability > 0.0 && spec.commit_probability > 0.0;
        if fraud_possible && fraud_models.is_empty() {
            return Err(ValidationError::NoFraudModels);
        }

        let assigner = UserProfileAssigner::new(
            classes,
            spec.class_probabilities,
            spec.potential_fraudster_probability,
            spec.commit_probability,
        )?;

        let scheduler = SessionScheduler::new(
            ChainSimulator::new(spec.max_session_steps),
            fraud_models,
            ScheduleConfig {
                n_days: spec.n_days,
                sessions_per_day: spec.sessions_per_user_per_day,
                seed: spec.seed,
            },
        )?;

        Ok(Self {
            vocabulary: Arc::new(vocabulary),
            assigner,
            scheduler: Arc::new(scheduler),
            n_users: spec.n_users,
            seed: spec.seed,
        })
    }

    /// Resolve matrix files referenced by `config` and build the pipeline.
    pub fn from_config(config: &Config) -> eyre::Result<Self> {
        let spec = PipelineSpec {
            actions: config.vocabulary.actions.clone(),
            allow_empty_sessions: config.vocabulary.allow_empty_sessions,
            classes: resolve_models(&config.classes)?,
            class_probabilities: config.users.class_probabilities.clone(),
            fraud_models: resolve_models(&config.fraud.models)?,
            potential_fraudster_probability: config.fraud.potential_fraudster_probability,
            commit_probability: config.fraud.commit_probability,
            n_users: config.generation.n_users,
            n_days: config.generation.n_days,
            sessions_per_user_per_day: config.generation.sessions_per_user_per_day,
            seed: config.generation.seed,
            max_session_steps: config.generation.max_session_steps,
        };
        Ok(Self::new(spec)?)
    }

    pub fn n_users(&self) -> u64 {
        self.n_users
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Assign profiles from the run seed.
    pub fn profiles(&self) -> Result<Vec<UserProfile>, ValidationError> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.assigner.assign(self.n_users, &mut rng)
    }

    /// Run the whole generation on the calling thread.
    pub fn generate(&self, cancel: &CancellationToken) -> Result<GeneratedLog, GenerationError> {
        let profiles = self.profiles()?;
        tracing::info!(users = profiles.len(), "Generating sessions");

        let batches = self.scheduler.schedule_users(&profiles, cancel)?;
        Ok(self.assemble(batches))
    }

    /// Run the generation with users split into contiguous chunks, one
    /// blocking task per chunk. Output is identical to [`Self::generate`].
    pub async fn generate_parallel(
        &self,
        workers: usize,
        cancel: &CancellationToken,
    ) -> Result<GeneratedLog, GenerationError> {
        let profiles = self.profiles()?;
        let chunk_size = profiles.len().div_ceil(workers.max(1));
        tracing::info!(
            users = profiles.len(),
            workers,
            chunk_size,
            "Generating sessions in parallel"
        );

        let token = cancel.child_token();
        let handles: Vec<_> = profiles
            .chunks(chunk_size)
            .map(|chunk| {
                let chunk = chunk.to_vec();
                let scheduler = self.scheduler.clone();
                let token = token.clone();
                tokio::task::spawn_blocking(move || {
                    let result = scheduler.schedule_users(&chunk, &token);
                    if result.is_err() {
                        token.cancel();
                    }
                    result
                })
            })
            .collect();

        let mut batches = Vec::with_capacity(profiles.len());
        for joined in futures::future::join_all(handles).await {
            let chunk = joined.map_err(|e| GenerationError::Worker(e.to_string()))??;
            batches.extend(chunk);
        }
        Ok(self.assemble(batches))
    }

    fn assemble(&self, batches: Vec<UserBatch>) -> GeneratedLog {
        let log = LogAssembler::new(&self.vocabulary).assemble(batches);
        let summary = log.summary();
        tracing::info!(
            records = summary.records,
            fraudulent_sessions = summary.fraudulent_sessions,
            potential_fraudsters = summary.potential_fraudsters,
            failed_sessions = summary.failed_sessions,
            mean_session_length = summary.mean_session_length,
            "Session log assembled"
        );
        if summary.failed_sessions > 0 {
            tracing::warn!(
                failed = summary.failed_sessions,
                "Some sessions exceeded the step bound and were left out"
            );
        }
        log
    }
}

fn resolve_models(sources: &[MatrixSourceConfig]) -> eyre::Result<Vec<ModelSpec>> {
    sources
        .iter()
        .map(|source| {
            let matrix = match (&source.matrix, &source.matrix_csv) {
                (Some(matrix), _) => matrix.clone(),
                (None, Some(path)) => load_matrix_csv(path)?,
                (None, None) => {
                    return Err(eyre::eyre!(
                        "Model '{}' has no matrix configured",
                        source.name
                    ))
                }
            };
            Ok(ModelSpec {
                name: source.name.clone(),
                matrix,
                weight: source.weight,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::writer::write_csv_to;

    const ACTIONS: [&str; 6] = ["start", "end", "login", "view_lead", "edit_lead", "export_all"];

    fn sales_rep() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.05, 0.0, 0.8, 0.15, 0.0],
            vec![0.0, 0.3, 0.0, 0.3, 0.4, 0.0],
            vec![0.0, 0.4, 0.0, 0.5, 0.1, 0.0],
            vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
        ]
    }

    fn manager() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.2, 0.0, 0.7, 0.0, 0.1],
            vec![0.0, 0.5, 0.0, 0.4, 0.1, 0.0],
            vec![0.0, 0.5, 0.0, 0.5, 0.0, 0.0],
            vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
        ]
    }

    fn data_theft() -> Vec<Vec<f64>> {
        vec![
            vec![0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.0, 0.2, 0.0, 0.8],
            vec![0.0, 0.1, 0.0, 0.1, 0.0, 0.8],
            vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.3, 0.0, 0.0, 0.0, 0.7],
        ]
    }

    fn spec() -> PipelineSpec {
        PipelineSpec {
            actions: ACTIONS.iter().map(|a| a.to_string()).collect(),
            allow_empty_sessions: true,
            classes: vec![
                ModelSpec::new("sales_rep", sales_rep()),
                ModelSpec::new("manager", manager()),
            ],
            class_probabilities: vec![0.8, 0.2],
            fraud_models: vec![ModelSpec::new("data_theft", data_theft())],
            potential_fraudster_probability: 0.1,
            commit_probability: 0.3,
            n_users: 200,
            n_days: 1,
            sessions_per_user_per_day: 200,
            seed: 1234,
            max_session_steps: Some(10_000),
        }
    }

    fn to_csv(log: &GeneratedLog) -> Vec<u8> {
        let mut buf = Vec::new();
        write_csv_to(&mut buf, log).unwrap();
        buf
    }

    #[test]
    fn test_dataset_shape() {
        let pipeline = GenerationPipeline::new(spec()).unwrap();
        let log = pipeline.generate(&CancellationToken::new()).unwrap();
        assert_eq!(log.len(), 40_000);
        assert!(log.failures.is_empty());

        for record in &log.records {
            assert_eq!(record.session_activity.first().map(String::as_str), Some("start"));
            assert_eq!(record.session_activity.last().map(String::as_str), Some("end"));
            let ends = record.session_activity.iter().filter(|a| *a == "end").count();
            assert_eq!(ends, 1);
            if record.fraudulent_activity {
                assert!(record.potential_fraudster);
            }
        }
    }

    #[test]
    fn test_same_seed_byte_identical() {
        let cancel = CancellationToken::new();
        let a = GenerationPipeline::new(spec()).unwrap().generate(&cancel).unwrap();
        let b = GenerationPipeline::new(spec()).unwrap().generate(&cancel).unwrap();
        assert_eq!(a.records, b.records);
        assert_eq!(to_csv(&a), to_csv(&b));

        let mut other = spec();
        other.seed = 4321;
        let c = GenerationPipeline::new(other).unwrap().generate(&cancel).unwrap();
        assert_ne!(to_csv(&a), to_csv(&c));
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential() {
        let mut spec = spec();
        spec.n_users = 37;
        spec.n_days = 2;
        spec.sessions_per_user_per_day = 25;
        let pipeline = GenerationPipeline::new(spec).unwrap();
        let cancel = CancellationToken::new();

        let sequential = pipeline.generate(&cancel).unwrap();
        for workers in [1, 2, 4, 8, 64] {
            let parallel = pipeline.generate_parallel(workers, &cancel).await.unwrap();
            assert_eq!(to_csv(&sequential), to_csv(&parallel), "workers = {workers}");
        }
    }

    #[tokio::test]
    async fn test_parallel_cancelled() {
        let pipeline = GenerationPipeline::new(spec()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            pipeline.generate_parallel(4, &cancel).await,
            Err(GenerationError::Cancelled)
        ));
    }

    #[test]
    fn test_malformed_row_produces_no_records() {
        let mut spec = spec();
        spec.classes[0].matrix[3] = vec![0.0, 0.3, 0.0, 0.29, 0.4, 0.0];
        let err = GenerationPipeline::new(spec).err().unwrap();
        assert!(matches!(err, ValidationError::RowSum { row: 3, .. }));
    }

    #[test]
    fn test_start_to_end_gives_minimal_sessions() {
        let mut bounce = vec![vec![0.0; 6]; 6];
        for row in bounce.iter_mut() {
            row[1] = 1.0;
        }
        let mut spec = spec();
        spec.classes = vec![ModelSpec::new("bounce", bounce)];
        spec.class_probabilities = vec![1.0];
        spec.potential_fraudster_probability = 0.0;
        spec.n_users = 5;
        spec.sessions_per_user_per_day = 20;

        let log = GenerationPipeline::new(spec)
            .unwrap()
            .generate(&CancellationToken::new())
            .unwrap();
        assert_eq!(log.len(), 100);
        assert!(log
            .records
            .iter()
            .all(|r| r.session_activity == vec!["start", "end"]));
    }

    #[test]
    fn test_fraud_enabled_without_models() {
        let mut spec = spec();
        spec.fraud_models.clear();
        assert_eq!(
            GenerationPipeline::new(spec).err().unwrap(),
            ValidationError::NoFraudModels
        );
    }

    #[test]
    fn test_zero_users_rejected() {
        let mut spec = spec();
        spec.n_users = 0;
        assert_eq!(
            GenerationPipeline::new(spec).err().unwrap(),
            ValidationError::ZeroCount("number of users")
        );
    }

    #[test]
    fn test_zero_step_bound_rejected() {
        let mut spec = spec();
        spec.max_session_steps = Some(0);
        assert_eq!(
            GenerationPipeline::new(spec).err().unwrap(),
            ValidationError::ZeroCount("maximum session steps")
        );

        let config = Config::parse(
            r#"
[generation]
seed = 5
n_users = 3
sessions_per_user_per_day = 4
max_session_steps = 0

[vocabulary]
actions = ["start", "end", "login"]

[users]
class_probabilities = [1.0]

[[classes]]
name = "clerk"
matrix = [[0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.0, 1.0, 0.0]]
"#,
        );
        assert!(config.is_err());
    }

    #[test]
    fn test_from_config_with_inline_matrices() {
        let config = Config::parse(
            r#"
[generation]
seed = 5
n_users = 3
n_days = 2
sessions_per_user_per_day = 4

[vocabulary]
actions = ["start", "end", "login"]

[users]
class_probabilities = [1.0]

[[classes]]
name = "clerk"
matrix = [[0.0, 0.0, 1.0], [0.0, 1.0, 0.0], [0.0, 1.0, 0.0]]
"#,
        )
        .unwrap();

        let pipeline = GenerationPipeline::from_config(&config).unwrap();
        let log = pipeline.generate(&CancellationToken::new()).unwrap();
        assert_eq!(log.len(), 24);
        assert!(log
            .records
            .iter()
            .all(|r| r.session_activity == vec!["start", "login", "end"] && r.user_role == "clerk"));
    }

    #[test]
    fn test_from_config_with_matrix_csv() {
        let path = std::env::temp_dir().join(format!(
            "sessionforge_{}_clerk_matrix.csv",
            std::process::id()
        ));
        std::fs::write(&path, "# start, end, login\n0, 0, 1\n0, 1, 0\n0, 1, 0\n").unwrap();

        let config = Config::parse(&format!(
            r#"
[generation]
seed = 8
n_users = 2
sessions_per_user_per_day = 3

[vocabulary]
actions = ["start", "end", "login"]

[users]
class_probabilities = [1.0]

[[classes]]
name = "clerk"
matrix_csv = "{}"
"#,
            path.display()
        ))
        .unwrap();

        let result = GenerationPipeline::from_config(&config);
        std::fs::remove_file(&path).unwrap();

        let log = result.unwrap().generate(&CancellationToken::new()).unwrap();
        assert_eq!(log.len(), 6);
        assert!(log
            .records
            .iter()
            .all(|r| r.session_activity == vec!["start", "login", "end"] && r.user_role == "clerk"));
    }

    #[test]
    fn test_missing_matrix_csv_fails() {
        let config = Config::parse(
            r#"
[generation]
seed = 8
n_users = 2
sessions_per_user_per_day = 3

[vocabulary]
actions = ["start", "end", "login"]

[users]
class_probabilities = [1.0]

[[classes]]
name = "clerk"
matrix_csv = "/nonexistent/sessionforge/clerk.csv"
"#,
        )
        .unwrap();
        assert!(GenerationPipeline::from_config(&config).is_err());
    }
}
