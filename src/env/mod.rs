mod loader;
mod placeholders;

pub use loader::{read_env_file, EnvironmentLoader, YamlEnvironmentLoader, SECRETS_FILE};
pub use placeholders::{
    expand_placeholders, Clock, IdGenerator, Resolver, Session, TIMESTAMP_BUILTIN, UUID_BUILTIN,
};
