//! Fixed prompt text sent alongside user input.

pub const IMAGE_STYLE_SUFFIX: &str = ", in the style of Stranger Things, 80s retro horror aesthetic, dark atmosphere, neon red and blue lighting, cinematic, film grain, high quality";

pub const VIDEO_STYLE_SUFFIX: &str =
    ", in the style of Stranger Things, 80s aesthetic, retro horror, cinematic lighting, VHS grain";

pub const DEFAULT_ANALYZE_PROMPT: &str = "Analyze this artifact for key information.";

pub const EMPTY_ANALYSIS: &str = "No signal received from the artifact.";

pub fn critique_prompt(description: &str) -> String {
    format!(
        "Analyze this hackathon project idea for a Stranger Things themed event: \"{description}\". \
         Give a short, snarky critique in the style of the Mind Flayer or a skeptical Hawkins scientist. \
         Max 2 sentences. Mention the Upside Down or Demogorgons."
    )
}
