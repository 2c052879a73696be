// Provisioning - environment lifecycle driven against the compute and DNS providers

pub mod image;
pub mod orchestrator;
pub mod poll;

pub use image::{select_image, ImageNotFound, ImagePreference, ImageSelection, ImageSource};
pub use orchestrator::{DnsOutcome, Orchestrator, ProvisionOutcome, ProvisioningSettings};
pub use poll::PollPolicy;
