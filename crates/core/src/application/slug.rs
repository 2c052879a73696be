// Slug generation: `adjective-animal` labels used as DNS subdomains

use crate::error::{AppError, Result};
use crate::port::EnvironmentRepository;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

/// Candidates tried before falling back to a timestamp suffix
pub const MAX_SLUG_ATTEMPTS: usize = 10;

const ADJECTIVES: &[&str] = &[
    "agile", "amber", "ancient", "bold", "brave", "bright", "calm", "clever", "cosmic", "crisp",
    "daring", "eager", "electric", "fancy", "fearless", "gentle", "golden", "grand", "happy",
    "hidden", "humble", "jolly", "keen", "kind", "lively", "lucky", "mellow", "mighty", "misty",
    "noble", "quick", "quiet", "rapid", "rustic", "silent", "silver", "steady", "sunny", "swift",
    "tidy", "vivid", "wise", "witty", "zesty",
];

const ANIMALS: &[&str] = &[
    "badger", "bear", "beaver", "bison", "camel", "cheetah", "cobra", "condor", "crane", "dolphin",
    "eagle", "falcon", "ferret", "fox", "gazelle", "gecko", "heron", "ibex", "jaguar", "koala",
    "lemur", "lion", "lynx", "marmot", "moose", "narwhal", "ocelot", "orca", "otter", "owl",
    "panda", "penguin", "puma", "raven", "salmon", "seal", "sparrow", "tiger", "toucan", "walrus",
    "wolf", "yak", "zebra",
];

/// Draw one `adjective-animal` candidate
pub fn generate_slug<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("brave");
    let animal = ANIMALS.choose(rng).copied().unwrap_or("tiger");
    format!("{}-{}", adjective, animal)
}

/// Lowercase alphanumeric words joined by single hyphens
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.split('-').all(|word| {
            !word.is_empty()
                && word
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        })
}

/// Lowercase base36 rendering of a non-negative integer
pub fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Pick a slug no live environment uses
///
/// Tries `MAX_SLUG_ATTEMPTS` candidates, then one candidate suffixed with
/// `now_millis` in base36. A taken fallback is a `Conflict`.
pub async fn generate_unique_slug<F>(
    repo: &dyn EnvironmentRepository,
    now_millis: i64,
    mut candidate: F,
) -> Result<String>
where
    F: FnMut() -> String,
{
    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let slug = candidate();
        if !is_valid_slug(&slug) {
            return Err(AppError::Validation(format!("Generated slug '{}' is invalid", slug)));
        }
        if repo.find_by_slug(&slug).await?.is_none() {
            return Ok(slug);
        }
        debug!(slug = %slug, attempt, "Slug already taken, retrying");
    }

    let fallback = format!("{}-{}", candidate(), to_base36(now_millis.max(0) as u64));
    warn!(slug = %fallback, "Using timestamp fallback slug");
    if repo.find_by_slug(&fallback).await?.is_some() {
        return Err(AppError::Conflict(format!("Slug {} already taken", fallback)));
    }
    Ok(fallback)
}
