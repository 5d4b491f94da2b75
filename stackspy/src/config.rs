use anyhow::{bail, Context, Result};
use std::path::Path;
use std::time::Duration;
use std::{fs::File, io::Read};

use serde::Deserialize;
use stackspy_common::{LabelSet, Pid, SamplingMode, DEFAULT_BUFFER_CAPACITY};

use crate::registry::RBSPY;
use crate::run::MAX_SAMPLE_RATE;
use crate::session::{InitParams, MAX_BUFFER_CAPACITY};

pub const DEFAULT_CONFIG_PATH: &str = "StackSpy.toml";

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StackSpyConfig {
    #[serde(default)]
    pub agent: Agent,
    #[serde(default)]
    pub target: Target,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Agent {
    /// bytes, for each of the sample and error buffers
    pub buffer_capacity: usize,
    pub settle_delay_ms: u64,
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            settle_delay_ms: 1000,
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Target {
    pub profiler: String,
    pub pid: Option<i32>,
    /// launched by the agent, sampled once running
    pub command: Option<String>,
    pub blocking: bool,
    /// snapshots per second
    pub sample_rate: u32,
    pub labels: LabelSet,
}

impl Default for Target {
    fn default() -> Self {
        Self {
            profiler: RBSPY.to_owned(),
            pid: None,
            command: None,
            blocking: false,
            sample_rate: 100,
            labels: LabelSet::new(),
        }
    }
}

impl StackSpyConfig {
    /// `StackSpy.toml` from the current directory, or defaults when there is none.
    pub fn new() -> Result<Self> {
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            Self::from_path(DEFAULT_CONFIG_PATH)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config_file =
            File::open(path).with_context(|| format!("config file {} not found", path.display()))?;
        let mut contents = String::new();
        config_file
            .read_to_string(&mut contents)
            .with_context(|| format!("something went wrong reading {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid config in {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: StackSpyConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let capacity = self.agent.buffer_capacity;
        if capacity == 0 || capacity > MAX_BUFFER_CAPACITY {
            bail!("agent.buffer_capacity must be between 1 and {MAX_BUFFER_CAPACITY}, got {capacity}");
        }
        let rate = self.target.sample_rate;
        if rate == 0 || rate > MAX_SAMPLE_RATE {
            bail!("target.sample_rate must be between 1 and {MAX_SAMPLE_RATE}, got {rate}");
        }
        if self.target.profiler.is_empty() {
            bail!("target.profiler must not be empty");
        }
        match (&self.target.pid, &self.target.command) {
            (Some(_), Some(_)) => bail!("supply one of target.pid, target.command"),
            (None, None) => bail!("no target: supply a pid or a command"),
            _ => Ok(()),
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.agent.settle_delay_ms)
    }

    pub fn sampling_mode(&self) -> SamplingMode {
        SamplingMode::from(self.target.blocking)
    }

    pub fn init_params(&self, pid: Pid) -> InitParams {
        InitParams::new(pid)
            .with_mode(self.sampling_mode())
            .with_buffer_capacity(self.agent.buffer_capacity)
            .with_settle_delay(self.settle_delay())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = StackSpyConfig::parse("").unwrap();
        assert_eq!(config, StackSpyConfig::default());
        assert_eq!(config.agent.buffer_capacity, 64 * 1024);
        assert_eq!(config.settle_delay(), Duration::from_secs(1));
        assert_eq!(config.target.profiler, "rbspy");
        assert_eq!(config.target.sample_rate, 100);
        assert_eq!(config.sampling_mode(), SamplingMode::NonBlocking);
        // nothing to sample yet
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[agent]
buffer_capacity = 4096
settle_delay_ms = 0

[target]
pid = 1234
blocking = true
sample_rate = 50

[target.labels]
app = "web"
env = "prod"
"#
        )
        .unwrap();

        let config = StackSpyConfig::from_path(file.path()).unwrap();
        config.validate().unwrap();
        let params = config.init_params(Pid(1234));
        assert_eq!(params.buffer_capacity, 4096);
        assert_eq!(params.settle_delay, Duration::ZERO);
        assert_eq!(params.mode, SamplingMode::Blocking);
        assert_eq!(config.target.sample_rate, 50);
        assert_eq!(config.target.labels.get("env"), Some("prod"));
        assert_eq!(config.target.labels.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = StackSpyConfig::from_path(dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_rejects_bad_values() {
        let config = StackSpyConfig::parse("[agent]\nbuffer_capacity = 0\n[target]\npid = 1").unwrap();
        assert!(config.validate().is_err());

        let config = StackSpyConfig::parse("[target]\npid = 1\nsample_rate = 0").unwrap();
        assert!(config.validate().is_err());

        let config = StackSpyConfig::parse("[target]\npid = 1\nsample_rate = 2000000000").unwrap();
        assert!(config.validate().is_err());
        let config = StackSpyConfig::parse("[target]\npid = 1\nsample_rate = 1000000").unwrap();
        config.validate().unwrap();

        let config = StackSpyConfig::parse("[target]\npid = 1\ncommand = \"ruby app.rb\"").unwrap();
        assert!(config.validate().is_err());

        assert!(StackSpyConfig::parse("[target]\nunknown = 1").is_err());
    }
}
