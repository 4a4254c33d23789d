use aiwriter_core::config::THEMES;
use aiwriter_core::{Config, SessionError};

use crate::buffer::char_to_byte_index;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Url,
    SystemPrompt,
    Temperature,
    MaxTokens,
    ContextMaxTokens,
    EditorFont,
    Theme,
    LineNumbers,
    WrapText,
    DefaultFolder,
    FilePanel,
    AiPanel,
}

pub const FIELDS: [Field; 12] = [
    Field::Url,
    Field::SystemPrompt,
    Field::Temperature,
    Field::MaxTokens,
    Field::ContextMaxTokens,
    Field::EditorFont,
    Field::Theme,
    Field::LineNumbers,
    Field::WrapText,
    Field::DefaultFolder,
    Field::FilePanel,
    Field::AiPanel,
];

impl Field {
    pub fn label(self) -> &'static str {
        match self {
            Field::Url => "llama.cpp URL",
            Field::SystemPrompt => "System prompt",
            Field::Temperature => "Temperature",
            Field::MaxTokens => "Max tokens",
            Field::ContextMaxTokens => "Context tokens",
            Field::EditorFont => "Editor font",
            Field::Theme => "Theme",
            Field::LineNumbers => "Line numbers",
            Field::WrapText => "Wrap text",
            Field::DefaultFolder => "Default folder",
            Field::FilePanel => "File panel",
            Field::AiPanel => "AI panel",
        }
    }

    /// Choice fields change with Space or ←/→ instead of typing.
    pub fn is_choice(self) -> bool {
        matches!(
            self,
            Field::Theme | Field::LineNumbers | Field::WrapText | Field::FilePanel | Field::AiPanel
        )
    }
}

fn on_off(value: bool) -> String {
    if value { "on" } else { "off" }.to_string()
}

/// Editable copy of the settings, one text value per field.
#[derive(Debug, Clone)]
pub struct SettingsForm {
    values: Vec<String>,
    pub selected: usize,
    pub cursor: usize,
    pub error: Option<String>,
}

impl SettingsForm {
    pub fn from_config(config: &Config) -> Self {
        let values = FIELDS
            .iter()
            .map(|field| match field {
                Field::Url => config.llama_cpp_url.clone(),
                Field::SystemPrompt => config.system_prompt.clone(),
                Field::Temperature => config.temperature.to_string(),
                Field::MaxTokens => config.max_tokens.to_string(),
                Field::ContextMaxTokens => config.context_max_tokens.to_string(),
                Field::EditorFont => config.editor_font.clone(),
                Field::Theme => config.theme.clone(),
                Field::LineNumbers => on_off(config.show_line_numbers),
                Field::WrapText => on_off(config.wrap_text),
                Field::DefaultFolder => config.default_folder.clone(),
                Field::FilePanel => on_off(config.show_file_panel),
                Field::AiPanel => on_off(config.show_ai_panel),
            })
            .collect();
        let mut form = Self {
            values,
            selected: 0,
            cursor: 0,
            error: None,
        };
        form.cursor = form.selected_value().chars().count();
        form
    }

    pub fn value(&self, field: Field) -> &str {
        FIELDS
            .iter()
            .position(|f| *f == field)
            .and_then(|i| self.values.get(i))
            .map_or("", String::as_str)
    }

    pub fn selected_field(&self) -> Field {
        FIELDS[self.selected]
    }

    fn selected_value(&self) -> &str {
        &self.values[self.selected]
    }

    pub fn select(&mut self, down: bool) {
        self.selected = if down {
            (self.selected + 1) % FIELDS.len()
        } else {
            (self.selected + FIELDS.len() - 1) % FIELDS.len()
        };
        self.cursor = self.selected_value().chars().count();
    }

    pub fn insert_char(&mut self, c: char) {
        if self.selected_field().is_choice() {
            if c == ' ' {
                self.cycle(true);
            }
            return;
        }
        let value = &mut self.values[self.selected];
        let at = char_to_byte_index(value, self.cursor);
        value.insert(at, c);
        self.cursor += 1;
        self.error = None;
    }

    pub fn backspace(&mut self) {
        if self.selected_field().is_choice() || self.cursor == 0 {
            return;
        }
        let value = &mut self.values[self.selected];
        let at = char_to_byte_index(value, self.cursor - 1);
        value.remove(at);
        self.cursor -= 1;
        self.error = None;
    }

    /// Moves the cursor in a text field, or steps a choice field.
    pub fn left_right(&mut self, right: bool) {
        if self.selected_field().is_choice() {
            self.cycle(right);
        } else if right {
            self.cursor = (self.cursor + 1).min(self.selected_value().chars().count());
        } else {
            self.cursor = self.cursor.saturating_sub(1);
        }
    }

    fn cycle(&mut self, forward: bool) {
        let value = &mut self.values[self.selected];
        *value = match FIELDS[self.selected] {
            Field::Theme => {
                let at = THEMES.iter().position(|t| *t == value.as_str()).unwrap_or(0);
                let next = if forward { at + 1 } else { at + THEMES.len() - 1 };
                THEMES[next % THEMES.len()].to_string()
            }
            _ => on_off(value.as_str() != "on"),
        };
        self.cursor = value.chars().count();
        self.error = None;
    }

    /// Builds and validates a [`Config`] from the form.
    pub fn to_config(&self) -> Result<Config, SessionError> {
        let text = |field| self.value(field).trim().to_string();
        let flag = |field| self.value(field) == "on";
        let number = |field: Field| {
            let raw = self.value(field).trim();
            raw.parse::<u32>().map_err(|_| {
                SessionError::Config(format!("{} must be a whole number (got {:?})", field.label(), raw))
            })
        };

        let temperature_raw = self.value(Field::Temperature).trim();
        let temperature = temperature_raw.parse::<f32>().map_err(|_| {
            SessionError::Config(format!("Temperature must be a number (got {:?})", temperature_raw))
        })?;

        let config = Config {
            llama_cpp_url: text(Field::Url),
            system_prompt: self.value(Field::SystemPrompt).to_string(),
            temperature,
            max_tokens: number(Field::MaxTokens)?,
            context_max_tokens: number(Field::ContextMaxTokens)?,
            editor_font: text(Field::EditorFont),
            theme: text(Field::Theme),
            show_line_numbers: flag(Field::LineNumbers),
            wrap_text: flag(Field::WrapText),
            default_folder: text(Field::DefaultFolder),
            show_file_panel: flag(Field::FilePanel),
            show_ai_panel: flag(Field::AiPanel),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select(form: &mut SettingsForm, field: Field) {
        while form.selected_field() != field {
            form.select(true);
        }
    }

    fn clear(form: &mut SettingsForm) {
        while form.cursor > 0 {
            form.backspace();
        }
    }

    #[test]
    fn test_unchanged_form_gives_same_config() {
        let config = Config {
            temperature: 1.25,
            theme: "cream-navy".to_string(),
            wrap_text: false,
            ..Config::default()
        };
        assert_eq!(SettingsForm::from_config(&config).to_config().unwrap(), config);
    }

    #[test]
    fn test_edit_temperature() {
        let mut form = SettingsForm::from_config(&Config::default());
        select(&mut form, Field::Temperature);
        clear(&mut form);
        for c in "0.2".chars() {
            form.insert_char(c);
        }
        assert_eq!(form.to_config().unwrap().temperature, 0.2);
    }

    #[test]
    fn test_bad_numbers_rejected() {
        let mut form = SettingsForm::from_config(&Config::default());
        select(&mut form, Field::MaxTokens);
        form.insert_char('k');
        assert!(matches!(form.to_config(), Err(SessionError::Config(_))));

        let mut form = SettingsForm::from_config(&Config::default());
        select(&mut form, Field::Temperature);
        clear(&mut form);
        form.insert_char('5');
        let err = form.to_config().unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn test_choice_fields_cycle() {
        let mut form = SettingsForm::from_config(&Config::default());
        select(&mut form, Field::Theme);
        form.insert_char('z');
        assert_eq!(form.value(Field::Theme), "layan-dark");
        form.left_right(true);
        assert_eq!(form.value(Field::Theme), "cream-navy");
        form.left_right(true);
        assert_eq!(form.value(Field::Theme), "layan-dark");

        select(&mut form, Field::WrapText);
        form.insert_char(' ');
        assert!(!form.to_config().unwrap().wrap_text);
    }

    #[test]
    fn test_select_wraps_around() {
        let mut form = SettingsForm::from_config(&Config::default());
        form.select(false);
        assert_eq!(form.selected_field(), Field::AiPanel);
        form.select(true);
        assert_eq!(form.selected_field(), Field::Url);
    }
}
