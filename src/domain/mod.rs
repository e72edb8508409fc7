pub mod fingerprint;
pub mod settings;
pub mod types;

pub use fingerprint::Fingerprint;
pub use settings::{Settings, SettingsError};
pub use types::{ClassificationMap, Decision, PostContent};
