pub mod analyze;
pub mod generate;
