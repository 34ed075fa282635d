//! Tool implementations module

pub mod filesystem;
pub mod image;
pub mod process;

pub use filesystem::{delete_file, list_files, read_file, write_file};
pub use image::{generate_image, ImageGenerator, ReplicateImageGenerator};
pub use process::run_command;
