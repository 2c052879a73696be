// Bootstrap Script Port (Interface)

use crate::domain::Environment;
use crate::error::Result;

/// Produces the first-boot script handed to a new instance
///
/// Script content is owned by an external collaborator; the orchestrator only
/// passes the rendered text through.
pub trait BootstrapRenderer: Send + Sync {
    fn render(&self, env: &Environment) -> Result<String>;
}

pub mod mocks {
    use super::*;

    /// Renders `#cloud-config` with the hostname only
    pub struct StaticBootstrap;

    impl BootstrapRenderer for StaticBootstrap {
        fn render(&self, env: &Environment) -> Result<String> {
            Ok(format!("#cloud-config\nhostname: {}\n", env.slug))
        }
    }
}
