//! Compositing prompt for try-on generation.
//!
//! The prompt is a fixed system asset, never user-supplied: it pins the
//! output shape (one square PNG, no added text or watermarks) so the
//! extraction step downstream can rely on a single inline image.

/// Environment variable that overrides the built-in prompt.
pub const PROMPT_ENV_VAR: &str = "TRYON_PROMPT";

const DEFAULT_COMPOSITING_PROMPT: &str = "\
Edit the provided image so the person wears the glasses shown in the other image. \
Retain all the same elements and detail of the original photo: preserve the face, \
background, clothes, and lighting, changing nothing except adding the provided \
glasses. Preserve the glasses' brand color and frame shape. Do not add text or \
watermarks.\n\n\
Composite the glasses naturally onto the face: align to the estimated eye centers, \
scale to a typical inter-pupillary distance (62mm, plus or minus 10%), and respect \
head tilt up to plus or minus 15 degrees. Output a single 1024x1024 PNG. No extra \
artifacts.";

/// The compositing instruction sent with every generation request.
pub fn compositing_prompt() -> String {
    std::env::var(PROMPT_ENV_VAR)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_COMPOSITING_PROMPT.to_string())
}
