use crate::cli::GenerateArgs;
use crate::error::{CliError, Result};
use crate::io::frame_file;
use elastrain::core::lattice::ReferenceLattice;
use elastrain::core::models::builder::CrystalBuilder;
use elastrain::core::utils::geometry::rotation_from_axis_angle;
use nalgebra::{Matrix3, Vector3};
use tracing::info;

pub fn run(args: GenerateArgs) -> Result<()> {
    let repeats: [usize; 3] = args
        .repeats
        .as_slice()
        .try_into()
        .map_err(|_| CliError::Argument("--repeats expects exactly three values".to_string()))?;
    if !(args.stretch.is_finite() && args.stretch > 0.0) {
        return Err(CliError::Argument(format!(
            "--stretch must be a positive number, got {}",
            args.stretch
        )));
    }

    let ca_ratio = args
        .ca_ratio
        .unwrap_or_else(|| args.structure.default_ca_ratio());
    let lattice = ReferenceLattice::new(args.structure, args.lattice_constant, ca_ratio)
        .map_err(|e| CliError::Argument(e.to_string()))?;

    info!(
        family = %args.structure,
        lattice_constant = args.lattice_constant,
        ?repeats,
        stretch = args.stretch,
        rotate_z = args.rotate_z,
        "Generating synthetic crystal."
    );
    let frame = CrystalBuilder::new(&lattice, repeats)
        .periodic([!args.free_surfaces; 3])
        .orientation(rotation_from_axis_angle(&Vector3::z(), args.rotate_z))
        .deformation(Matrix3::identity() * args.stretch)
        .build()?;

    frame_file::write_frame(&frame, &args.output)?;
    println!(
        "✓ Wrote {} {} atoms to {}",
        frame.len(),
        args.structure,
        args.output.display()
    );
    Ok(())
}
