mod init;
mod loader;
mod workspace;

pub use init::{init_workspace, InitReport};
pub use loader::{
    load_config, LoadedConfig, MaskingConfig, PathsConfig, RunsConfig, WorkspaceConfig,
    CONFIG_FILE,
};
pub use workspace::Workspace;
