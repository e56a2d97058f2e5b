use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::ReproError;

/// Campaign-level configuration for the synthesized artifacts, read from
/// `reprosyn.toml`. Defaults target the CPU campaign of the host framework.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CampaignConfig {
    /// Namespace public entry points live under.
    pub namespace: String,
    /// Import line emitted at the top of every reproduction program.
    pub import_preamble: String,
    /// Whether the campaign targets the accelerated execution path; adds the
    /// device preamble and a placement argument to composite constructions.
    pub accelerated: bool,
    pub device_preamble: Vec<String>,
    pub device_argument: String,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        CampaignConfig {
            namespace: "torch".to_string(),
            import_preamble: "import torch".to_string(),
            accelerated: false,
            device_preamble: vec![
                "torch.cuda.init()".to_string(),
                "gpu_dev = torch.device('cuda')".to_string(),
            ],
            device_argument: "gpu_dev".to_string(),
        }
    }
}

impl CampaignConfig {
    pub fn load(path: &Path) -> Result<Self, ReproError> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|err| ReproError::InvalidConfig {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// Dtype literal as user code spells it, e.g. `torch.float32`.
    pub fn dtype_literal(&self, api_name: &str) -> String {
        format!("{}.{}", self.namespace, api_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_the_cpu_campaign() {
        let config = CampaignConfig::default();
        assert_eq!(config.namespace, "torch");
        assert!(!config.accelerated);
    }

    #[test]
    fn partial_file_overrides_defaults() {
        let parsed: CampaignConfig = toml::from_str("accelerated = true\n").unwrap();
        assert!(parsed.accelerated);
        assert_eq!(parsed.import_preamble, "import torch");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<CampaignConfig>("namespac = \"torch\"\n").is_err());
    }
}
