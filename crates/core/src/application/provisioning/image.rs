// Base image selection

use crate::port::ImageSummary;
use thiserror::Error;

/// Which OS image a new instance should boot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePreference {
    /// OS family token, e.g. `ubuntu`
    pub family: String,
    /// Any of these marks the preferred release, e.g. `22.04` or `jammy`
    pub version_tokens: Vec<String>,
}

impl Default for ImagePreference {
    fn default() -> Self {
        Self {
            family: "ubuntu".to_string(),
            version_tokens: vec!["22.04".to_string(), "jammy".to_string()],
        }
    }
}

/// How the image was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Family and release matched
    Preferred,
    /// Only the family matched
    FamilyOnly,
    /// Nothing matched; configured fallback id
    ConfiguredDefault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSelection {
    pub image_id: String,
    pub source: ImageSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("No {family} image available and no default image configured")]
pub struct ImageNotFound {
    pub family: String,
}

/// Pick an image from the provider catalogue (case-insensitive name match)
pub fn select_image(
    images: &[ImageSummary],
    preference: &ImagePreference,
    default_image_id: Option<&str>,
) -> Result<ImageSelection, ImageNotFound> {
    let family = preference.family.to_lowercase();
    let in_family: Vec<(&ImageSummary, String)> = images
        .iter()
        .map(|image| (image, image.name.to_lowercase()))
        .filter(|(_, name)| name.contains(&family))
        .collect();

    let preferred = in_family.iter().find(|(_, name)| {
        preference
            .version_tokens
            .iter()
            .any(|token| name.contains(&token.to_lowercase()))
    });

    if let Some((image, _)) = preferred {
        return Ok(ImageSelection {
            image_id: image.image_id.clone(),
            source: ImageSource::Preferred,
        });
    }
    if let Some((image, _)) = in_family.first() {
        return Ok(ImageSelection {
            image_id: image.image_id.clone(),
            source: ImageSource::FamilyOnly,
        });
    }
    match default_image_id.filter(|id| !id.is_empty()) {
        Some(id) => Ok(ImageSelection {
            image_id: id.to_string(),
            source: ImageSource::ConfiguredDefault,
        }),
        None => Err(ImageNotFound {
            family: preference.family.clone(),
        }),
    }
}
