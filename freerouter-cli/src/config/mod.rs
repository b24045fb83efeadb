//! Path resolution and declaration loading for the CLI.

mod loader;

pub use loader::{ConfigPaths, LoadedConfig, load_dotenv};
