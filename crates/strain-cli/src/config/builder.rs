use super::defaults::DefaultsConfig;
use super::file::FileConfig;
use super::models::AppConfig;
use crate::cli::AnalyzeArgs;
use crate::error::{CliError, Result};
use crate::io::frame_file::matrix_from_rows;
use elastrain::core::lattice::LatticeFamily;
use elastrain::engine::config::ElasticStrainConfigBuilder;
use std::str::FromStr;

/// Merges, in increasing precedence: built-in defaults, the TOML file, `-S`
/// overrides and explicit command-line flags.
pub fn build_config(args: &AnalyzeArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };

    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let lattice_file = file_config.lattice.take().unwrap_or_default();
    let structure = match args.structure {
        Some(family) => family,
        None => {
            let name = lattice_file.structure.as_deref().unwrap_or(defaults.structure);
            LatticeFamily::from_str(name).map_err(|e| CliError::Config(e.to_string()))?
        }
    };
    let lattice_constant = args.lattice_constant.or(lattice_file.lattice_constant);
    let ca_ratio = args.ca_ratio.or(lattice_file.ca_ratio);

    let output_file = file_config.output.take().unwrap_or_default();
    let deformation_gradients = !args.no_deformation_gradients
        && output_file
            .deformation_gradients
            .unwrap_or(defaults.deformation_gradients);
    let strain_tensors =
        !args.no_strain_tensors && output_file.strain_tensors.unwrap_or(defaults.strain_tensors);
    let push_forward =
        args.push_forward || output_file.push_forward.unwrap_or(defaults.push_forward);
    let write_csv = !args.no_csv && output_file.csv.unwrap_or(defaults.csv);

    let tolerance_file = file_config.tolerances.take().unwrap_or_default();
    let min_correspondences = args
        .min_correspondences
        .or(tolerance_file.min_correspondences);
    let orientation_tolerance = args
        .orientation_tolerance
        .or(tolerance_file.orientation_degrees);

    let mut builder = ElasticStrainConfigBuilder::new()
        .lattice_family(structure)
        .calculate_deformation_gradients(deformation_gradients)
        .calculate_strain_tensors(strain_tensors)
        .push_forward(push_forward);
    if let Some(a) = lattice_constant {
        builder = builder.lattice_constant(a);
    }
    if let Some(ratio) = ca_ratio {
        builder = builder.ca_ratio(ratio);
    }
    if let Some(count) = min_correspondences {
        builder = builder.min_correspondences(count);
    }
    if let Some(degrees) = orientation_tolerance {
        builder = builder.orientation_tolerance_degrees(degrees);
    }
    if let Some(threshold) = tolerance_file.min_normal_determinant {
        builder = builder.min_normal_determinant(threshold);
    }
    for rows in file_config.preferred_orientations.take().unwrap_or_default() {
        builder = builder.preferred_orientation(matrix_from_rows(&rows));
    }

    let core_config = builder
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    Ok(AppConfig {
        input_path: args.input.clone(),
        output_base: args.output.clone(),
        write_csv,
        core_config,
    })
}

fn parse_value<T: FromStr>(key: &str, value: &str, kind: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid {} value for {}: {}", kind, key, value)))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    if set_values.is_empty() {
        return Ok(config);
    }
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{}'. Expected KEY=VALUE.",
                kv_pair
            )));
        };
        let key = key.trim();

        match key {
            "lattice.structure" => {
                config.lattice.get_or_insert_with(Default::default).structure =
                    Some(value_str.trim().to_string());
            }
            "lattice.lattice-constant" => {
                config
                    .lattice
                    .get_or_insert_with(Default::default)
                    .lattice_constant = Some(parse_value(key, value_str, "float")?);
            }
            "lattice.ca-ratio" => {
                config.lattice.get_or_insert_with(Default::default).ca_ratio =
                    Some(parse_value(key, value_str, "float")?);
            }
            "output.deformation-gradients" => {
                config
                    .output
                    .get_or_insert_with(Default::default)
                    .deformation_gradients = Some(parse_value(key, value_str, "boolean")?);
            }
            "output.strain-tensors" => {
                config
                    .output
                    .get_or_insert_with(Default::default)
                    .strain_tensors = Some(parse_value(key, value_str, "boolean")?);
            }
            "output.push-forward" => {
                config.output.get_or_insert_with(Default::default).push_forward =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "output.csv" => {
                config.output.get_or_insert_with(Default::default).csv =
                    Some(parse_value(key, value_str, "boolean")?);
            }
            "tolerances.orientation-degrees" => {
                config
                    .tolerances
                    .get_or_insert_with(Default::default)
                    .orientation_degrees = Some(parse_value(key, value_str, "float")?);
            }
            "tolerances.min-normal-determinant" => {
                config
                    .tolerances
                    .get_or_insert_with(Default::default)
                    .min_normal_determinant = Some(parse_value(key, value_str, "float")?);
            }
            "tolerances.min-correspondences" => {
                config
                    .tolerances
                    .get_or_insert_with(Default::default)
                    .min_correspondences = Some(parse_value(key, value_str, "integer")?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{}'",
                    key
                )));
            }
        }
    }
    Ok(config)
}
