use crate::{app::AppKind, parallel::ParallelStrategy};
use config::{Config, ConfigError, File, FileFormat};
use incgraph_api::core::entities::Oid;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, PartialEq, Clone, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub efile: PathBuf,
    pub vfile: Option<PathBuf>,
    pub efile_update: Option<PathBuf>,
    pub delimiter: String,
    pub directed: bool,
    pub fnum: usize,
    pub thread_num: Option<usize>,
    pub wide_parallelism: bool,
    pub application: AppKind,
    pub sssp_source: Oid,
    pub bfs_source: Oid,
    pub out_prefix: Option<PathBuf>,
    pub log_level: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            efile: PathBuf::new(),
            vfile: None,
            efile_update: None,
            delimiter: " ".to_string(),
            directed: true,
            fnum: 1,
            thread_num: None,
            wide_parallelism: false,
            application: AppKind::default(),
            sssp_source: 0,
            bfs_source: 0,
            out_prefix: None,
            log_level: "INFO".to_string(),
        }
    }
}

impl WorkerConfig {
    pub fn parallel_strategy(&self) -> ParallelStrategy {
        if self.wide_parallelism {
            ParallelStrategy::Wide
        } else {
            ParallelStrategy::Simple
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.efile.as_os_str().is_empty() {
            return Err(ConfigError::Message("efile must be set".to_string()));
        }
        if self.fnum == 0 {
            return Err(ConfigError::Message("fnum must be at least 1".to_string()));
        }
        if self.thread_num == Some(0) {
            return Err(ConfigError::Message(
                "thread_num must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl From<WorkerConfig> for WorkerConfigBuilder {
    fn from(config: WorkerConfig) -> Self {
        Self { config }
    }
}

impl WorkerConfigBuilder {
    pub fn new() -> Self {
        WorkerConfig::default().into()
    }

    pub fn with_efile(mut self, efile: impl Into<PathBuf>) -> Self {
        self.config.efile = efile.into();
        self
    }

    pub fn with_vfile(mut self, vfile: impl Into<PathBuf>) -> Self {
        self.config.vfile = Some(vfile.into());
        self
    }

    pub fn with_efile_update(mut self, efile_update: impl Into<PathBuf>) -> Self {
        self.config.efile_update = Some(efile_update.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.config.delimiter = delimiter.into();
        self
    }

    pub fn with_directed(mut self, directed: bool) -> Self {
        self.config.directed = directed;
        self
    }

    pub fn with_fnum(mut self, fnum: usize) -> Self {
        self.config.fnum = fnum;
        self
    }

    pub fn with_thread_num(mut self, thread_num: usize) -> Self {
        self.config.thread_num = Some(thread_num);
        self
    }

    pub fn with_wide_parallelism(mut self, wide_parallelism: bool) -> Self {
        self.config.wide_parallelism = wide_parallelism;
        self
    }

    pub fn with_application(mut self, application: AppKind) -> Self {
        self.config.application = application;
        self
    }

    pub fn with_sssp_source(mut self, source: Oid) -> Self {
        self.config.sssp_source = source;
        self
    }

    pub fn with_bfs_source(mut self, source: Oid) -> Self {
        self.config.bfs_source = source;
        self
    }

    pub fn with_out_prefix(mut self, out_prefix: impl Into<PathBuf>) -> Self {
        self.config.out_prefix = Some(out_prefix.into());
        self
    }

    pub fn with_log_level(mut self, log_level: String) -> Self {
        self.config.log_level = log_level;
        self
    }

    pub fn build(self) -> WorkerConfig {
        self.config
    }
}

impl Default for WorkerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// Order of precedence: overrides >> config file >> defaults.
// `overrides` is a json object holding only the explicitly set fields.
pub fn load_config(
    overrides: Option<serde_json::Value>,
    config_path: Option<PathBuf>,
) -> Result<WorkerConfig, ConfigError> {
    let defaults = serde_json::to_string(&WorkerConfig::default())
        .map_err(|err| ConfigError::Foreign(Box::new(err)))?;
    let mut builder = Config::builder().add_source(File::from_str(&defaults, FileFormat::Json));
    if let Some(config_path) = config_path {
        builder = builder.add_source(File::from(config_path));
    }
    if let Some(overrides) = overrides {
        builder = builder.add_source(File::from_str(&overrides.to_string(), FileFormat::Json));
    }
    let config = builder.build()?.try_deserialize::<WorkerConfig>()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn file_values_sit_between_defaults_and_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "efile = \"graph.e\"\nfnum = 4\napplication = \"bfs\"\nbfs_source = 7"
        )
        .unwrap();

        let config = load_config(
            Some(serde_json::json!({ "fnum": 2, "wide_parallelism": true })),
            Some(file.path().to_path_buf()),
        )
        .unwrap();

        let expected = WorkerConfigBuilder::new()
            .with_efile("graph.e")
            .with_fnum(2)
            .with_application(AppKind::Bfs)
            .with_bfs_source(7)
            .with_wide_parallelism(true)
            .build();
        assert_eq!(config, expected);
        assert_eq!(config.parallel_strategy(), ParallelStrategy::Wide);
    }

    #[test]
    fn missing_edge_file_is_rejected() {
        let err = load_config(None, None).unwrap_err();
        assert!(err.to_string().contains("efile"), "{err}");
    }
}
