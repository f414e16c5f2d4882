pub mod toml_loader;

pub use toml_loader::{load_all_toml_files, load_rubric_config, load_toml_to_request, RequestFile};
