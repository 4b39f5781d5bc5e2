pub mod bond_consistency;
pub mod deformation_fit;
pub mod strain_derivation;
