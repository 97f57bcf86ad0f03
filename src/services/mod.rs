//! Concrete collaborators wired into the sweep pipeline

pub mod credentials;
pub mod deleter;
pub mod guard;
pub mod resolver;

pub use credentials::CredentialManager;
pub use deleter::{DeleteMode, FsDeleter};
pub use guard::TimeBudgetGuard;
pub use resolver::SiteUrlResolver;
