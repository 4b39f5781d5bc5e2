use elastrain::engine::config::ElasticStrainConfig;
use std::path::PathBuf;

pub struct AppConfig {
    pub input_path: PathBuf,
    pub output_base: PathBuf,
    pub write_csv: bool,
    pub core_config: ElasticStrainConfig,
}
