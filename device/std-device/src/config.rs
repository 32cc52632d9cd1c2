use common::types::config::PipelineConfig;
use headtrack_sim::config::SimConfig;
use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct ToplevelConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub sim: SimConfig,
}

/// Load the configuration, using defaults if the file does not exist.
pub fn load_from_file_path(path: &str) -> Result<ToplevelConfig, Box<dyn std::error::Error>> {
    match std::fs::read_to_string(path) {
        Ok(string) => Ok(toml::from_str(&string)?),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            log::info!("config: No file at {}, using defaults", path);
            Ok(ToplevelConfig::default())
        }
        Err(error) => Err(error.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config() {
        let config: ToplevelConfig = toml::from_str(
            r#"
            [pipeline]
            read_rate_hz = 50
            calibration_path = "/tmp/calibration"

            [sim]
            mount = [0.1, 0.2, 0.3]

            [sim.acc_noise]
            bias = [0.0, 0.0, 0.1]
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.read_rate_hz, 50);
        assert_eq!(config.pipeline.command_queue_len, 4);
        assert_eq!(config.pipeline.calibration_path.to_str(), Some("/tmp/calibration"));
        assert_eq!(config.sim.mount, [0.1, 0.2, 0.3]);
        assert_eq!(config.sim.acc_noise.bias, Some([0.0, 0.0, 0.1]));
        assert_eq!(config.sim.acc_noise.std_dev, None);
        assert_eq!(config.sim.fusion_settle_reads, 100);
    }

    #[test]
    fn test_empty_config_is_default() {
        let config: ToplevelConfig = toml::from_str("").unwrap();
        assert_eq!(config.pipeline, PipelineConfig::default());
        assert_eq!(config.sim, SimConfig::default());
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = load_from_file_path("/nonexistent/headtrack.toml").unwrap();
        assert_eq!(config.pipeline.read_rate_hz, 100);
    }
}
