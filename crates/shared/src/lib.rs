pub mod error;
pub mod export;
pub mod messages;

pub mod settings {
    use serde::{Deserialize, Serialize};

    /// Model used until the user picks one in the options UI.
    pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

    fn default_model() -> String {
        DEFAULT_MODEL.to_string()
    }

    /// A named, reusable instruction the user applies to selected text.
    ///
    /// Ids are small integers assigned at creation (max existing + 1) and
    /// never reused within a settings generation. The position of a preset
    /// in [`Settings::prompts`] determines its menu position.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct PromptPreset {
        pub id: u32,
        pub name: String,
        /// Instruction text. Stored under the wire name `prompt`.
        #[serde(rename = "prompt")]
        pub template: String,
    }

    impl PromptPreset {
        pub fn new(id: u32, name: impl Into<String>, template: impl Into<String>) -> Self {
            Self {
                id,
                name: name.into(),
                template: template.into(),
            }
        }
    }

    /// Persisted user settings. Field names follow the synced storage schema
    /// (`apiKey`, `selectedModel`, `customPrompts`).
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Settings {
        #[serde(rename = "apiKey", default)]
        pub api_key: String,
        #[serde(rename = "selectedModel", default = "default_model")]
        pub selected_model: String,
        #[serde(rename = "customPrompts", default)]
        pub prompts: Vec<PromptPreset>,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                api_key: String::new(),
                selected_model: DEFAULT_MODEL.to_string(),
                prompts: Vec::new(),
            }
        }
    }

    impl Settings {
        pub fn preset(&self, id: u32) -> Option<&PromptPreset> {
            self.prompts.iter().find(|p| p.id == id)
        }
    }

    /// Partial settings update. `None` fields leave the stored value alone.
    #[derive(Debug, Clone, Default)]
    pub struct SettingsPatch {
        pub api_key: Option<String>,
        pub selected_model: Option<String>,
        pub prompts: Option<Vec<PromptPreset>>,
    }

    impl SettingsPatch {
        pub fn api_key(key: impl Into<String>) -> Self {
            Self {
                api_key: Some(key.into()),
                ..Self::default()
            }
        }

        pub fn selected_model(model: impl Into<String>) -> Self {
            Self {
                selected_model: Some(model.into()),
                ..Self::default()
            }
        }

        pub fn prompts(prompts: Vec<PromptPreset>) -> Self {
            Self {
                prompts: Some(prompts),
                ..Self::default()
            }
        }

        pub fn apply(self, settings: &mut Settings) {
            if let Some(key) = self.api_key {
                settings.api_key = key;
            }
            if let Some(model) = self.selected_model {
                settings.selected_model = model;
            }
            if let Some(prompts) = self.prompts {
                settings.prompts = prompts;
            }
        }
    }
}

pub mod chat {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Role {
        User,
        Assistant,
    }

    impl Role {
        /// Wire/prompt spelling, as rendered into conversation payloads.
        pub fn as_str(&self) -> &'static str {
            match self {
                Role::User => "user",
                Role::Assistant => "assistant",
            }
        }
    }

    /// One message in a conversation.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ChatTurn {
        pub role: Role,
        pub content: String,
    }

    impl ChatTurn {
        pub fn user(content: impl Into<String>) -> Self {
            Self {
                role: Role::User,
                content: content.into(),
            }
        }

        pub fn assistant(content: impl Into<String>) -> Self {
            Self {
                role: Role::Assistant,
                content: content.into(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::chat::{ChatTurn, Role};
    use super::settings::{PromptPreset, Settings, SettingsPatch};

    #[test]
    fn test_preset_wire_field_names() {
        let preset = PromptPreset::new(1, "Translate", "Translate to English");
        let json = serde_json::to_value(&preset).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["name"], "Translate");
        assert_eq!(json["prompt"], "Translate to English");
    }

    #[test]
    fn test_settings_storage_schema() {
        let settings = Settings {
            api_key: "k".into(),
            selected_model: "gemini-2.0-flash".into(),
            prompts: vec![PromptPreset::new(1, "Fix", "Fix grammar")],
        };
        let json = serde_json::to_value(&settings).unwrap();
        assert!(json.get("apiKey").is_some());
        assert!(json.get("selectedModel").is_some());
        assert_eq!(json["customPrompts"][0]["prompt"], "Fix grammar");
    }

    #[test]
    fn test_patch_merges_only_set_fields() {
        let mut settings = Settings {
            api_key: "old".into(),
            selected_model: "m1".into(),
            prompts: vec![PromptPreset::new(1, "A", "a")],
        };
        SettingsPatch::api_key("new").apply(&mut settings);
        assert_eq!(settings.api_key, "new");
        assert_eq!(settings.selected_model, "m1");
        assert_eq!(settings.prompts.len(), 1);
    }

    #[test]
    fn test_turn_roles_serialize_lowercase() {
        let turn = ChatTurn::assistant("hi");
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(Role::User.as_str(), "user");
    }
}
