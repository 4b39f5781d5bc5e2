use crate::cli::AnalyzeArgs;
use crate::config::{self, AppConfig};
use crate::error::Result;
use crate::io::{frame_file, result_file};
use crate::utils::progress::PhaseProgress;
use elastrain::engine::progress::ProgressReporter;
use elastrain::workflows::elastic_strain::{self, ElasticStrainResult};
use tracing::{info, warn};

pub fn run(args: AnalyzeArgs, show_progress: bool) -> Result<ElasticStrainResult> {
    info!("Merging configuration from file and CLI arguments...");
    let app_config = config::build_config(&args)?;

    info!("Loading identified frame from {:?}", &app_config.input_path);
    let frame = frame_file::read_frame(&app_config.input_path)?;

    let progress = PhaseProgress::new(elastic_strain::PHASES, show_progress);
    let reporter = ProgressReporter::with_callback(progress.get_callback());

    println!(
        "Starting elastic strain analysis of {} atoms ({} reference, a = {})...",
        frame.len(),
        app_config.core_config.lattice.family,
        app_config.core_config.lattice.lattice_constant
    );
    let result = elastic_strain::run(&frame, &app_config.core_config, &reporter)?;
    for phase in progress.timings() {
        info!(
            phase = phase.name,
            steps = phase.steps,
            elapsed_ms = phase.elapsed.as_millis() as u64,
            "Phase timing."
        );
    }

    write_outputs(&result, &app_config)?;
    report_summary(&result);
    Ok(result)
}

fn write_outputs(result: &ElasticStrainResult, app_config: &AppConfig) -> Result<()> {
    let json_path = result_file::output_path(&app_config.output_base, result_file::JSON_SUFFIX);
    result_file::write_json(result, &app_config.core_config, &json_path)?;
    println!("✓ Results written to: {}", json_path.display());

    if app_config.write_csv {
        let csv_path = result_file::output_path(&app_config.output_base, result_file::CSV_SUFFIX);
        result_file::write_csv(result, &csv_path)?;
        println!("✓ Per-atom table written to: {}", csv_path.display());
    }
    Ok(())
}

fn report_summary(result: &ElasticStrainResult) {
    let statistics = &result.statistics;
    println!(
        "{:.1}% of atoms got a valid strain value ({} of {}).",
        100.0 * statistics.coverage(),
        statistics.atoms_fitted - statistics.strain_undefined,
        statistics.atoms_total
    );
    println!(
        "  Clusters: {} ({} crystalline), transitions: {}",
        statistics.clusters, statistics.crystalline_clusters, statistics.transitions
    );
    if let Some(mean) = statistics.mean_volumetric_strain {
        println!("  Mean volumetric strain: {:.6}", mean);
    }
    if statistics.bonds.inconsistent > 0 {
        warn!(
            inconsistent = statistics.bonds.inconsistent,
            "Inconsistent bonds were excluded from the fit."
        );
    }
    if statistics.atoms_fitted == 0 {
        warn!("No atom received a deformation gradient. Check the lattice family and constant.");
    }
}
