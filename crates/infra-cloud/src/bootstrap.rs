// Cloud-init bootstrap rendering

use envprov_core::domain::Environment;
use envprov_core::error::{AppError, Result};
use envprov_core::port::BootstrapRenderer;
use std::path::Path;

/// Placeholders substituted at render time
const PLACEHOLDERS: &[&str] = &["slug", "hostname", "owner_id", "plan"];

/// Minimal first-boot config used when no template file is configured
pub const DEFAULT_CLOUD_INIT_TEMPLATE: &str = "#cloud-config
package_update: true
hostname: {{slug}}
fqdn: {{hostname}}
runcmd:
  - hostnamectl set-hostname {{hostname}}
final_message: \"Environment {{hostname}} is ready\"
";

/// `{{placeholder}}` substitution over a cloud-init document
///
/// Unknown placeholders are rejected when the template is loaded, so a render
/// never ships a half-filled script.
#[derive(Debug, Clone)]
pub struct CloudInitTemplate {
    template: String,
}

impl CloudInitTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if let Some(unknown) = unknown_placeholder(&template) {
            return Err(AppError::Config(format!(
                "Unknown cloud-init placeholder {{{{{}}}}}",
                unknown
            )));
        }
        Ok(Self { template })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let template = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!(
                "Failed to read cloud-init template {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::new(template)
    }
}

impl Default for CloudInitTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_CLOUD_INIT_TEMPLATE.to_string(),
        }
    }
}

fn unknown_placeholder(template: &str) -> Option<String> {
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let end = after.find("}}")?;
        let name = &after[..end];
        if !PLACEHOLDERS.contains(&name) {
            return Some(name.to_string());
        }
        rest = &after[end + 2..];
    }
    None
}

impl BootstrapRenderer for CloudInitTemplate {
    fn render(&self, env: &Environment) -> Result<String> {
        Ok(self
            .template
            .replace("{{slug}}", &env.slug)
            .replace("{{hostname}}", &env.hostname)
            .replace("{{owner_id}}", &env.owner_id)
            .replace("{{plan}}", &env.plan))
    }
}
