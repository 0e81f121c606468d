//! Options-page session: preset editing, immediate key/model saves, and
//! settings import/export.
//!
//! Edits accumulate in a working copy until an explicit save; the save is
//! all-or-nothing and strictly validated (every preset needs a non-empty
//! trimmed name and template).

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use shared::export::ExportFile;
use shared::settings::{PromptPreset, SettingsPatch};
use store::ConfigStore;

pub struct OptionsSession {
    store: Arc<ConfigStore>,
    prompts: Vec<PromptPreset>,
    saved: Vec<PromptPreset>,
}

impl OptionsSession {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        let prompts = store.current().prompts;
        Self {
            saved: prompts.clone(),
            prompts,
            store,
        }
    }

    /// Throw away unsaved edits and re-read the store.
    pub fn reload(&mut self) {
        self.prompts = self.store.current().prompts;
        self.saved = self.prompts.clone();
    }

    pub fn prompts(&self) -> &[PromptPreset] {
        &self.prompts
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.prompts != self.saved
    }

    /// Add a placeholder preset; id is one past the highest existing.
    pub fn add_prompt(&mut self) -> u32 {
        let id = self.prompts.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        self.prompts
            .push(PromptPreset::new(id, "New Prompt", "Enter your prompt here"));
        id
    }

    pub fn update_prompt(
        &mut self,
        id: u32,
        name: Option<&str>,
        template: Option<&str>,
    ) -> bool {
        let Some(preset) = self.prompts.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        if let Some(name) = name {
            preset.name = name.to_string();
        }
        if let Some(template) = template {
            preset.template = template.to_string();
        }
        true
    }

    pub fn delete_prompt(&mut self, id: u32) -> bool {
        let before = self.prompts.len();
        self.prompts.retain(|p| p.id != id);
        self.prompts.len() != before
    }

    /// Drag-drop reorder: lift the preset at `from` and drop it at `to`.
    pub fn move_prompt(&mut self, from: usize, to: usize) -> bool {
        if from >= self.prompts.len() || to >= self.prompts.len() {
            return false;
        }
        let preset = self.prompts.remove(from);
        self.prompts.insert(to, preset);
        true
    }

    /// Persist the working copy. Validation is strict and atomic: one bad
    /// preset rejects the whole save and the store keeps its previous list.
    pub fn save_prompts(&mut self) -> Result<()> {
        if !self.prompts.iter().all(valid_preset) {
            bail!("Invalid prompts format");
        }
        self.store
            .save(SettingsPatch::prompts(self.prompts.clone()))?;
        self.saved = self.prompts.clone();
        Ok(())
    }

    pub fn save_api_key(&self, key: &str) -> Result<()> {
        self.store.save(SettingsPatch::api_key(key))?;
        Ok(())
    }

    pub fn select_model(&self, model: &str) -> Result<()> {
        self.store.save(SettingsPatch::selected_model(model))?;
        Ok(())
    }

    /// Versioned snapshot of everything the options page manages.
    pub fn export(&self) -> ExportFile {
        ExportFile::new(self.store.current())
    }

    /// Restore from an exported document. Structure is validated before the
    /// store is touched; unsaved preset edits are replaced by the import.
    pub fn import(&mut self, json: &str) -> Result<()> {
        let file = ExportFile::parse(json).context("invalid settings file")?;
        let settings = file.settings;
        self.store.save(SettingsPatch {
            api_key: Some(settings.api_key),
            selected_model: Some(settings.selected_model),
            prompts: Some(settings.prompts),
        })?;
        self.reload();
        Ok(())
    }
}

fn valid_preset(preset: &PromptPreset) -> bool {
    !preset.name.trim().is_empty() && !preset.template.trim().is_empty()
}
