pub mod frame_file;
pub mod result_file;
