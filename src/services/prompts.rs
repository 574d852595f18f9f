//! Prompt and description formatting for image generation requests.
//!
//! Everything here is pure: the same style and inputs always produce the
//! same description (shown to viewers) and prompt (sent to the generation
//! API).

use crate::kafka::events::{ImageInputs, ImageStyle};

/// Description used when the style is unrecognized or its inputs are missing
pub const FALLBACK_DESCRIPTION: &str = "an image";

/// Prompt used when the style is unrecognized or its inputs are missing
pub const FALLBACK_PROMPT: &str = "a sign that says BAD STYLE, UNABLE TO FORMAT PROMPT";

/// Human-readable description of what was requested
pub fn format_description(style: ImageStyle, inputs: &ImageInputs) -> String {
    match style {
        ImageStyle::Ghost => {
            if let Some(ghost) = &inputs.ghost {
                return ghost.subject.clone();
            }
        }
        ImageStyle::Friend => {
            if let Some(friend) = &inputs.friend {
                return friend.subject.clone();
            }
        }
        ImageStyle::Unknown => {}
    }
    FALLBACK_DESCRIPTION.to_string()
}

/// The prompt submitted to the image generation API
pub fn format_prompt(style: ImageStyle, inputs: &ImageInputs) -> String {
    match style {
        ImageStyle::Ghost => {
            if let Some(ghost) = &inputs.ghost {
                return format!(
                    "a ghostly image of {}, with glitchy VHS artifacts, dark background",
                    ghost.subject
                );
            }
        }
        ImageStyle::Friend => {
            if let Some(friend) = &inputs.friend {
                return format_friend_prompt(&friend.subject, &friend.color);
            }
        }
        ImageStyle::Unknown => {}
    }
    FALLBACK_PROMPT.to_string()
}

fn format_friend_prompt(subject: &str, color: &str) -> String {
    let background_color = complement(color);
    let (article, subject) = strip_article(subject, color);
    let lead = match article {
        Some(article) => format!("{article} {color}"),
        None => color.to_string(),
    };
    format!(
        "{lead} {subject}, illustrated in the style of 1990s digital clip art images, \
         with a limited 256-color palette and sharp black outlines, \
         with a solid {background_color} background suitable for chroma keying"
    )
}

/// Strips a leading English article from the subject so the color can be
/// spliced in front of it. A stripped "a"/"an" is replaced with whichever
/// article fits the color; "the" is dropped outright.
fn strip_article<'a>(subject: &'a str, color: &str) -> (Option<&'static str>, &'a str) {
    let article_for_color = || match color.chars().next() {
        Some('a') | Some('e') | Some('i') | Some('o') | Some('u') => "an",
        _ => "a",
    };
    if let Some(rest) = subject.strip_prefix("a ") {
        (Some(article_for_color()), rest)
    } else if let Some(rest) = subject.strip_prefix("an ") {
        (Some(article_for_color()), rest)
    } else if let Some(rest) = subject.strip_prefix("the ") {
        (None, rest)
    } else {
        (None, subject)
    }
}

/// Complement of a named color, used as the chroma-key background for friend
/// images. Unrecognized colors fall back to gray so the prompt stays valid.
pub fn complement(color: &str) -> &'static str {
    match color {
        "red" => "green",
        "orange" => "blue",
        "yellow" => "purple",
        "green" => "red",
        "blue" => "orange",
        "purple" => "yellow",
        "pink" => "green",
        "cyan" => "red",
        "magenta" => "green",
        "teal" => "maroon",
        "maroon" => "teal",
        "brown" => "blue",
        "black" => "white",
        "white" => "black",
        "gray" => "gray",
        _ => "gray",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kafka::events::{FriendInputs, GhostInputs};

    fn ghost_inputs(subject: &str) -> ImageInputs {
        ImageInputs {
            ghost: Some(GhostInputs {
                subject: subject.to_string(),
            }),
            friend: None,
        }
    }

    fn friend_inputs(subject: &str, color: &str) -> ImageInputs {
        ImageInputs {
            ghost: None,
            friend: Some(FriendInputs {
                subject: subject.to_string(),
                color: color.to_string(),
            }),
        }
    }

    #[test]
    fn formats_ghost_prompt() {
        let prompt = format_prompt(ImageStyle::Ghost, &ghost_inputs("a scary clown"));
        assert_eq!(
            prompt,
            "a ghostly image of a scary clown, with glitchy VHS artifacts, dark background"
        );
    }

    #[test]
    fn formats_friend_prompt_with_article_swap() {
        let prompt = format_prompt(ImageStyle::Friend, &friend_inputs("an ostrich", "orange"));
        assert_eq!(
            prompt,
            "an orange ostrich, illustrated in the style of 1990s digital clip art images, \
             with a limited 256-color palette and sharp black outlines, \
             with a solid blue background suitable for chroma keying"
        );
    }

    #[test]
    fn formats_friend_prompt_with_consonant_color() {
        let prompt = format_prompt(ImageStyle::Friend, &friend_inputs("a puppy", "blue"));
        assert!(prompt.starts_with("a blue puppy, illustrated"));
        assert!(prompt.contains("solid orange background"));
    }

    #[test]
    fn formats_friend_prompt_dropping_the() {
        let prompt = format_prompt(ImageStyle::Friend, &friend_inputs("the moon", "yellow"));
        assert!(prompt.starts_with("yellow moon, illustrated"));
    }

    #[test]
    fn formats_friend_prompt_without_leading_article() {
        let prompt = format_prompt(ImageStyle::Friend, &friend_inputs("several geese", "red"));
        assert!(prompt.starts_with("red several geese, illustrated"));
        assert!(prompt.contains("solid green background"));
    }

    #[test]
    fn unknown_style_uses_fallback_constants() {
        let inputs = ImageInputs::default();
        assert_eq!(format_prompt(ImageStyle::Unknown, &inputs), FALLBACK_PROMPT);
        assert_eq!(
            format_description(ImageStyle::Unknown, &inputs),
            FALLBACK_DESCRIPTION
        );
    }

    #[test]
    fn missing_inputs_use_fallback_constants() {
        let inputs = ImageInputs::default();
        assert_eq!(format_prompt(ImageStyle::Friend, &inputs), FALLBACK_PROMPT);
        assert_eq!(
            format_description(ImageStyle::Ghost, &inputs),
            FALLBACK_DESCRIPTION
        );
    }

    #[test]
    fn formats_descriptions_from_inputs() {
        assert_eq!(
            format_description(ImageStyle::Ghost, &ghost_inputs("a scary clown")),
            "a scary clown"
        );
        assert_eq!(
            format_description(ImageStyle::Friend, &friend_inputs("a puppy", "blue")),
            "a puppy"
        );
    }

    #[test]
    fn complements_cover_the_wheel() {
        assert_eq!(complement("orange"), "blue");
        assert_eq!(complement("blue"), "orange");
        assert_eq!(complement("black"), "white");
        assert_eq!(complement("chartreuse"), "gray");
    }
}
