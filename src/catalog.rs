//! Supported LLM models, grouped by provider, with human-readable names.

/// One selectable model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelEntry {
    pub id: &'static str,
    pub name: &'static str,
}

/// Provider label → models, in display order.
pub const SUPPORTED_MODELS: &[(&str, &[ModelEntry])] = &[
    (
        "Google (Gemini)",
        &[
            ModelEntry { id: "gemini-2.5-pro", name: "Gemini 2.5 pro" },
            ModelEntry { id: "gemini-2.5-flash", name: "Gemini 2.5 flash" },
        ],
    ),
    (
        "OpenAI (GPT)",
        &[
            ModelEntry { id: "gpt-4o", name: "GPT-4o" },
            ModelEntry { id: "gpt-4o-mini", name: "GPT-4o mini" },
            ModelEntry { id: "gpt-4-turbo", name: "GPT-4 Turbo" },
            ModelEntry { id: "gpt-4", name: "GPT-4" },
            ModelEntry { id: "gpt-3.5-turbo", name: "GPT-3.5 Turbo" },
        ],
    ),
    (
        "Anthropic (Claude)",
        &[
            ModelEntry { id: "claude-opus-4-1-20250805", name: "Claude 4.1 opus" },
            ModelEntry { id: "claude-opus-4-20250514", name: "Claude 4 opus" },
            ModelEntry { id: "claude-3-5-haiku-20241022", name: "Claude 3.5 Haiku" },
            ModelEntry { id: "claude-3-7-sonnet-20250219", name: "Claude 3.7 Sonnet" },
            ModelEntry { id: "claude-3-5-sonnet-20241022", name: "Claude 3.5 Sonnet" },
            ModelEntry { id: "claude-3-haiku-20240307", name: "Claude 3 Haiku" },
        ],
    ),
];

pub fn find_model(id: &str) -> Option<&'static ModelEntry> {
    SUPPORTED_MODELS
        .iter()
        .flat_map(|(_, models)| models.iter())
        .find(|m| m.id == id)
}

/// Display name for a model id; unknown ids are shown verbatim.
pub fn model_display_name(id: &str) -> String {
    find_model(id).map_or_else(|| id.to_string(), |m| m.name.to_string())
}

pub fn is_supported(id: &str) -> bool {
    find_model(id).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("gpt-4o", "GPT-4o")]
    #[case("gemini-2.5-flash", "Gemini 2.5 flash")]
    #[case("claude-3-haiku-20240307", "Claude 3 Haiku")]
    #[case("mystery-model", "mystery-model")]
    #[case("", "")]
    fn display_names(#[case] id: &str, #[case] expected: &str) {
        assert_eq!(model_display_name(id), expected);
    }

    #[test]
    fn ids_are_unique() {
        let mut ids: Vec<&str> = SUPPORTED_MODELS
            .iter()
            .flat_map(|(_, m)| m.iter().map(|e| e.id))
            .collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[test]
    fn supported_lookup() {
        assert!(is_supported("gpt-4"));
        assert!(!is_supported("gpt-5"));
    }
}
