use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::models::StylePreset;

/// Which wording set the gateway sends upstream. The edge worker and the
/// standalone server were deployed with different preset and guardrail text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PromptProfile {
    #[default]
    Edge,
    Server,
}

#[derive(Debug, Error)]
#[error("unknown prompt profile {0:?} (expected \"edge\" or \"server\")")]
pub struct UnknownProfile(String);

impl FromStr for PromptProfile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "edge" => Ok(Self::Edge),
            "server" => Ok(Self::Server),
            _ => Err(UnknownProfile(s.to_string())),
        }
    }
}

impl fmt::Display for PromptProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Edge => f.write_str("edge"),
            Self::Server => f.write_str("server"),
        }
    }
}

const EDGE_PRESETS: [(&str, &str); 5] = [
    ("new-materials", "Overlay layered materials not present in the original—fabric swatches, stitching with thread or yarn, metallic foil, iridescent film, tissue paper, feathers, pompoms, or thread—blended naturally. Do not remove existing imagery."),
    ("contemporary-shapes", "Overlay bold geometric OR organic shapes OR pen marks in a clean contemporary style, integrated with existing textures without removing anything."),
    ("paper-manipulation", "Overlay hand-cut paper shapes (folding, weaving, tearing, cutouts) with visible paper texture. Preserve original pixels outside additions."),
    ("thematic-playful", "Overlay surprising imagery that echoes existing themes as realistic printed cutouts interacting with current elements. Do not remove existing imagery."),
    ("thematic-reinforcing", "Overlay reinforcing motifs/symbols tied to the subject, integrated seamlessly with color matching. Keep all original content."),
];

const SERVER_PRESETS: [(&str, &str); 5] = [
    ("new-materials", "Overlay layered materials not present in the original—fabric swatches, stitching with thread or yarn, metallic foil, iridescent film, tissue paper, feathers, pompoms, or thread—blended naturally into the composition with crisp highlights so the new materials are obvious. Do not remove existing imagery."),
    ("contemporary-shapes", "Overlay bold geometric OR organic shapes OR pen marks in a clean contemporary style, integrated with existing textures without removing anything. Use high-contrast OR harmonious colors so additions are unmistakable."),
    ("paper-manipulation", "Overlay patterned or high-contrast OR harmonious colors paperhand-cut organic shapes that show paper texture in a classic collage style, gently layered into the work with soft shadows or outlines to differentiate them, OR paper manipulation in the form of folding, weaving, tearing, and cutouts. Preserve original pixels outside additions."),
    ("thematic-playful", "Overlay surprising imagery that echoes existing themes in the form of realistic cut outs from printed visuals — objects/icons/figures that interact with current elements—scaled and integrated believably with subtle drop shadows for clarity. Do not remove existing imagery."),
    ("thematic-reinforcing", "Overlay reinforcing imagery tied to the subject—motifs/symbols related to what is already there—scaled appropriately and integrated seamlessly with color matching so the additions read clearly. Keep all original content."),
];

const EDGE_GUARDRAIL: &str = concat!(
    "STRICT REQUIREMENT: Overlay new elements on top of the current image only. ",
    "Do NOT alter, erase, blur, move, recolor, or replace any existing pixels unless explicitly requested. ",
    "Preserve all original composition, lighting, textures, edges, and geometry. ",
    "No global filters. No inpainting outside added elements. No background edits. ",
    "Blend additions believably with soft shadows/occlusion. No text, logos, brands, or faces."
);

const SERVER_GUARDRAIL: &str = concat!(
    "STRICT REQUIREMENT: Only add new visual elements on top of the existing image. ",
    "Do not modify or remove any part of the original image. ",
    "Keep the original layout, lighting, materials, and edges unchanged. ",
    "No global filters, recoloring, or blurring outside added items. ",
    "Ensure new additions blend naturally using consistent shading and lighting. ",
    "No text, symbols, logos, or recognizable human features."
);

impl PromptProfile {
    pub fn presets(self) -> Vec<StylePreset> {
        let table = match self {
            Self::Edge => &EDGE_PRESETS,
            Self::Server => &SERVER_PRESETS,
        };
        table
            .iter()
            .map(|(slug, prompt)| StylePreset { slug: slug.to_string(), prompt: prompt.to_string() })
            .collect()
    }

    pub fn guardrail(self) -> &'static str {
        match self {
            Self::Edge => EDGE_GUARDRAIL,
            Self::Server => SERVER_GUARDRAIL,
        }
    }
}

/// Preset instruction, with the caller's text appended when there is any.
pub fn preset_prompt(preset: &StylePreset, user_prompt: &str) -> String {
    let user_prompt = user_prompt.trim();
    if user_prompt.is_empty() {
        preset.prompt.clone()
    } else {
        format!("{}\nAdditional instructions: {user_prompt}", preset.prompt)
    }
}

pub fn custom_prompt(user_prompt: &str, allow_modify: bool, guardrail: &str) -> String {
    if allow_modify {
        user_prompt.to_string()
    } else {
        format!("{user_prompt}\n\n{guardrail}")
    }
}

/// Only a literal `true` (any case) opts out of the guardrail.
pub fn parse_allow_modify(raw: Option<&str>) -> bool {
    raw.map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SLUGS: [&str; 5] = [
        "new-materials",
        "contemporary-shapes",
        "paper-manipulation",
        "thematic-playful",
        "thematic-reinforcing",
    ];

    #[test]
    fn both_profiles_share_slugs_in_order() {
        for profile in [PromptProfile::Edge, PromptProfile::Server] {
            let slugs: Vec<String> = profile.presets().into_iter().map(|p| p.slug).collect();
            assert_eq!(slugs, SLUGS);
        }
    }

    #[test]
    fn profiles_use_different_wording() {
        assert_ne!(PromptProfile::Edge.guardrail(), PromptProfile::Server.guardrail());
        assert!(PromptProfile::Edge.guardrail().starts_with("STRICT REQUIREMENT: Overlay new elements"));
        assert!(PromptProfile::Server.guardrail().starts_with("STRICT REQUIREMENT: Only add new visual elements"));
    }

    #[test]
    fn preset_prompt_without_user_text_is_unchanged() {
        let preset = &PromptProfile::Edge.presets()[2];
        assert_eq!(preset_prompt(preset, ""), preset.prompt);
        assert_eq!(preset_prompt(preset, "   "), preset.prompt);
    }

    #[test]
    fn preset_prompt_appends_additional_instructions() {
        let preset = StylePreset { slug: "s".into(), prompt: "Add stars.".into() };
        assert_eq!(preset_prompt(&preset, "  make them gold "), "Add stars.\nAdditional instructions: make them gold");
    }

    #[test]
    fn custom_prompt_appends_guardrail_after_blank_line() {
        assert_eq!(custom_prompt("add a cat", false, "GUARD"), "add a cat\n\nGUARD");
        assert_eq!(custom_prompt("add a cat", true, "GUARD"), "add a cat");
    }

    #[test]
    fn allow_modify_parsing() {
        assert!(parse_allow_modify(Some("true")));
        assert!(parse_allow_modify(Some("TRUE")));
        assert!(!parse_allow_modify(Some(" true ")));
        assert!(!parse_allow_modify(Some("false")));
        assert!(!parse_allow_modify(Some("yes")));
        assert!(!parse_allow_modify(Some("")));
        assert!(!parse_allow_modify(None));
    }

    #[test]
    fn profile_names_parse() {
        assert_eq!("edge".parse::<PromptProfile>().unwrap(), PromptProfile::Edge);
        assert_eq!("Server".parse::<PromptProfile>().unwrap(), PromptProfile::Server);
        assert!("other".parse::<PromptProfile>().is_err());
        assert!("worker".parse::<PromptProfile>().is_err());
        assert!("standalone".parse::<PromptProfile>().is_err());
        assert_eq!(PromptProfile::Server.to_string(), "server");
    }
}
