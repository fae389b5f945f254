use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

/// Placeholder in `worker_command` replaced by the problem id
pub const PROBLEM_PLACEHOLDER: &str = "%PROBLEM%";
/// Placeholder in `worker_command` replaced by the staged submission path
pub const SOURCE_PLACEHOLDER: &str = "%SOURCE%";

/// Environment variables the supervisor uses to hand settings to the worker
pub const ENV_INTERPRETER: &str = "GRADER_INTERPRETER";
pub const ENV_PROBLEMS_DIR: &str = "GRADER_PROBLEMS_DIR";
pub const ENV_MAX_ERROR_LEN: &str = "GRADER_MAX_ERROR_LEN";

#[derive(Parser)]
#[command(name = "grader", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(long = "config", short = 'c')]
    pub config_path: Option<String>,

    /// Address to listen on, overriding the configuration file
    #[arg(long = "bind-address")]
    pub bind_address: Option<String>,

    /// Port to listen on, overriding the configuration file
    #[arg(long = "bind-port", short = 'p')]
    pub bind_port: Option<u16>,
}

impl CliArgs {
    /// Load the configuration from the specified file and apply CLI overrides
    pub fn to_config(&self) -> std::io::Result<Config> {
        let mut config = match &self.config_path {
            Some(path) => {
                let file = std::fs::File::open(path)?;
                let reader = std::io::BufReader::new(file);
                serde_json::from_reader(reader)?
            }
            None => Config::default(),
        };

        if let Some(address) = &self.bind_address {
            config.server.bind_address = Some(address.clone());
        }
        if let Some(port) = self.bind_port {
            config.server.bind_port = Some(port);
        }
        Ok(config)
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub grader: GraderConfig,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ServerConfig {
    pub bind_address: Option<String>,
    pub bind_port: Option<u16>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct GraderConfig {
    /// Wall-clock limit for one grading attempt
    pub timeout_secs: u64,
    /// Where submissions are staged; defaults to the user cache directory
    pub staging_dir: Option<PathBuf>,
    /// Worker invocation; defaults to the `grader-worker` next to this executable
    pub worker_command: Option<Vec<String>>,
    /// Command that runs submissions
    pub interpreter: Vec<String>,
    /// Directory with `<problem_id>.json` problem definitions
    pub problems_dir: Option<PathBuf>,
    /// Longest submission error message shown to learners, in characters
    pub max_error_len: usize,
}

impl Default for GraderConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            staging_dir: None,
            worker_command: None,
            interpreter: vec!["python3".to_string()],
            problems_dir: None,
            max_error_len: 2000,
        }
    }
}

impl GraderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn staging_dir(&self) -> PathBuf {
        use directories::ProjectDirs;

        self.staging_dir.clone().unwrap_or_else(|| {
            ProjectDirs::from("", "", "grader")
                .map(|dirs| dirs.cache_dir().join("staging"))
                .unwrap_or_else(|| std::env::temp_dir().join("grader-staging"))
        })
    }

    pub fn worker_command(&self) -> std::io::Result<Vec<String>> {
        if let Some(command) = &self.worker_command {
            return Ok(command.clone());
        }

        let worker = std::env::current_exe()?.with_file_name("grader-worker");
        Ok(vec![
            worker.to_string_lossy().into_owned(),
            PROBLEM_PLACEHOLDER.to_string(),
            SOURCE_PLACEHOLDER.to_string(),
        ])
    }
}

/// The part of the configuration the worker process needs
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerSettings {
    pub interpreter: Vec<String>,
    pub problems_dir: Option<PathBuf>,
    pub max_error_len: usize,
}

impl WorkerSettings {
    /// Reads the settings the supervisor exported, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = GraderConfig::default();

        let interpreter = std::env::var(ENV_INTERPRETER)
            .ok()
            .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
            .filter(|command| !command.is_empty())
            .unwrap_or(defaults.interpreter);
        let problems_dir = std::env::var_os(ENV_PROBLEMS_DIR).map(PathBuf::from);
        let max_error_len = std::env::var(ENV_MAX_ERROR_LEN)
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(defaults.max_error_len);

        Self {
            interpreter,
            problems_dir,
            max_error_len,
        }
    }

    /// Environment variables that reproduce these settings in a worker
    pub fn to_env(&self) -> Vec<(&'static str, String)> {
        let mut vars = vec![
            (
                ENV_INTERPRETER,
                serde_json::to_string(&self.interpreter).unwrap_or_default(),
            ),
            (ENV_MAX_ERROR_LEN, self.max_error_len.to_string()),
        ];
        if let Some(dir) = &self.problems_dir {
            vars.push((ENV_PROBLEMS_DIR, dir.to_string_lossy().into_owned()));
        }
        vars
    }
}

impl From<&GraderConfig> for WorkerSettings {
    fn from(config: &GraderConfig) -> Self {
        Self {
            interpreter: config.interpreter.clone(),
            problems_dir: config.problems_dir.clone(),
            max_error_len: config.max_error_len,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let file = std::fs::File::open("data/example.json").unwrap();
        let reader = std::io::BufReader::new(file);
        let config: Config = serde_json::from_reader(reader).unwrap();
        assert_eq!(config.server.bind_address, Some("127.0.0.1".to_string()));
        assert_eq!(config.server.bind_port, Some(1710));
        assert_eq!(config.grader.timeout(), Duration::from_secs(30));
        assert_eq!(config.grader.problems_dir, Some(PathBuf::from("data/problems")));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: Config = serde_json::from_str(r#"{"grader": {"timeout_secs": 5}}"#).unwrap();
        assert_eq!(config.grader.timeout_secs, 5);
        assert_eq!(config.grader.interpreter, vec!["python3".to_string()]);
        assert_eq!(config.grader.max_error_len, 2000);
        assert_eq!(config.server.bind_port, None);
    }

    #[test]
    fn test_default_worker_command_has_placeholders() {
        let command = GraderConfig::default().worker_command().unwrap();
        assert!(command[0].ends_with("grader-worker"));
        assert_eq!(&command[1..], &[PROBLEM_PLACEHOLDER, SOURCE_PLACEHOLDER]);
    }

    #[test]
    fn test_cli_overrides() {
        let cli = CliArgs::parse_from(["grader", "--bind-port", "9000"]);
        let config = cli.to_config().unwrap();
        assert_eq!(config.server.bind_port, Some(9000));
        assert_eq!(config.grader, GraderConfig::default());
    }
}
