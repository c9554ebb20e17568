//! Desktop integration used by front-ends.

pub mod shell;

pub use shell::{dir_exists, file_exists, open_dir, open_file, open_url};
