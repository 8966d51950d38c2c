//! Prompt profiles for the planner
//!
//! Profiles are TOML documents embedded at compile time. The system prompt
//! may contain a `{tools}` placeholder that is filled with the names of the
//! registered tool capabilities.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

/// Profile used for the instruction round
pub const PLANNER_PROFILE: &str = "planner";

/// Profile used for result analysis rounds
pub const ANALYST_PROFILE: &str = "analyst";

const TOOLS_PLACEHOLDER: &str = "{tools}";

/// A prompt profile loaded from TOML.
///
/// Unknown tables and keys are rejected so a misspelled override fails
/// loudly instead of being ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptProfile {
    pub profile: ProfileMetadata,
    pub prompt: PromptConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileMetadata {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromptConfig {
    pub system: String,
}

impl PromptProfile {
    /// System prompt with the tool list substituted in
    pub fn render(&self, tools: &[String]) -> String {
        let listing = if tools.is_empty() {
            "- (none)".to_string()
        } else {
            tools
                .iter()
                .map(|t| format!("- {}", t))
                .collect::<Vec<_>>()
                .join("\n")
        };
        self.prompt.system.trim().replace(TOOLS_PLACEHOLDER, &listing)
    }
}

/// Registry of loaded prompt profiles
#[derive(Debug, Default)]
pub struct PromptRegistry {
    profiles: HashMap<String, PromptProfile>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the profiles compiled into the binary
    pub fn load_embedded() -> Self {
        let mut registry = Self::new();
        for toml_str in [
            include_str!("../prompts/planner.toml"),
            include_str!("../prompts/analyst.toml"),
        ] {
            match toml::from_str::<PromptProfile>(toml_str) {
                Ok(profile) => registry.register(profile),
                Err(e) => warn!("Skipping embedded prompt profile: {}", e),
            }
        }
        registry
    }

    /// Override embedded profiles with `*.toml` files from a directory
    pub fn load_overrides<P: AsRef<Path>>(&mut self, dir: P) -> std::io::Result<usize> {
        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "toml") {
                let content = std::fs::read_to_string(&path)?;
                match toml::from_str::<PromptProfile>(&content) {
                    Ok(profile) => {
                        self.register(profile);
                        loaded += 1;
                    }
                    Err(e) => warn!("Ignoring prompt profile {}: {}", path.display(), e),
                }
            }
        }
        Ok(loaded)
    }

    pub fn register(&mut self, profile: PromptProfile) {
        self.profiles.insert(profile.profile.id.clone(), profile);
    }

    pub fn get(&self, id: &str) -> Option<&PromptProfile> {
        self.profiles.get(id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_embedded_profiles() {
        let registry = PromptRegistry::load_embedded();
        assert_eq!(registry.len(), 2);
        assert!(registry.get(PLANNER_PROFILE).is_some());
        assert!(registry.get(ANALYST_PROFILE).is_some());
    }

    #[test]
    fn test_render_lists_tools() {
        let registry = PromptRegistry::load_embedded();
        let planner = registry.get(PLANNER_PROFILE).unwrap();
        let prompt = planner.render(&["ffuf".to_string(), "nmap".to_string()]);

        assert!(prompt.contains("- ffuf\n- nmap"));
        assert!(!prompt.contains(TOOLS_PLACEHOLDER));
        assert!(prompt.contains("\"tasks\""));
    }

    #[test]
    fn test_load_overrides() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("planner.toml"),
            "[profile]\nid = \"planner\"\nname = \"Custom\"\n\n[prompt]\nsystem = \"Only use {tools}\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut registry = PromptRegistry::load_embedded();
        assert_eq!(registry.load_overrides(dir.path()).unwrap(), 1);

        let planner = registry.get(PLANNER_PROFILE).unwrap();
        assert_eq!(planner.profile.name, "Custom");
        assert_eq!(planner.render(&["nmap".to_string()]), "Only use - nmap");
    }

    #[test]
    fn test_unknown_profile_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("planner.toml"),
            "[profile]\nid = \"planner\"\nname = \"Capped\"\n\n[prompt]\nsystem = \"x\"\n\n[output]\nmax_tokens = 64\n",
        )
        .unwrap();

        let mut registry = PromptRegistry::load_embedded();
        assert_eq!(registry.load_overrides(dir.path()).unwrap(), 0);
        assert_eq!(registry.get(PLANNER_PROFILE).unwrap().profile.name, "Recon Planner");
    }
}
