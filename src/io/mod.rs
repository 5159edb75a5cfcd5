pub mod file_writer;
mod local_file_reader;

pub use file_writer::shard_path;
pub use local_file_reader::{expand_paths, LinesRdd};
