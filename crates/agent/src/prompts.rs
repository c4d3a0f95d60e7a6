use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use tera::{Context, Tera};

use salesbot_core::domain::session::Language;
use salesbot_core::domain::slots::{slots_description, Slots};

const PERSONA: &str = "persona.txt";
const FINALIZE: &str = "finalize.txt";
const RECOMMENDATION: &str = "recommendation.txt";

/// Prompt prose for the three model call sites, compiled once at startup.
#[derive(Clone, Debug)]
pub struct PromptLibrary {
    tera: Tera,
}

impl PromptLibrary {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (PERSONA, include_str!("../templates/persona.txt.tera")),
            (FINALIZE, include_str!("../templates/finalize.txt.tera")),
            (RECOMMENDATION, include_str!("../templates/recommendation.txt.tera")),
        ])
        .context("failed to compile prompt templates")?;
        Ok(Self { tera })
    }

    /// System prompt for every agent step: slot guide, the client record, clock, language.
    pub fn persona(&self, slots: &Slots, language: Language, now: DateTime<Utc>) -> Result<String> {
        let mut context = Context::new();
        context.insert("slots_description", &slots_description());
        context.insert("client_info", &slots.render_table());
        context.insert("current_time", &now.format("%Y-%m-%d %H:%M:%S UTC").to_string());
        context.insert("language", language.name());
        self.render(PERSONA, &context)
    }

    pub fn finalize_notice(&self, language: Language) -> Result<String> {
        let mut context = Context::new();
        context.insert("language", language.name());
        self.render(FINALIZE, &context)
    }

    pub fn recommendation(
        &self,
        slots: &Slots,
        requirements: Option<&Slots>,
        language: Language,
    ) -> Result<String> {
        let requirements = requirements
            .filter(|requirements| !requirements.is_empty())
            .map(Slots::render_table)
            .unwrap_or_default();
        let mut context = Context::new();
        context.insert("client_info", &slots.render_table());
        context.insert("requirements", &requirements);
        context.insert("language", language.name());
        self.render(RECOMMENDATION, &context)
    }

    fn render(&self, template: &str, context: &Context) -> Result<String> {
        let rendered = self
            .tera
            .render(template, context)
            .with_context(|| format!("failed to render prompt `{template}`"))?;
        Ok(rendered.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::PromptLibrary;
    use salesbot_core::domain::session::Language;
    use salesbot_core::domain::slots::{GpuNeed, SlotPatch, Slots};
    
    #[test]
    fn persona_embeds_client_info_time_and_language() {
        let prompts = PromptLibrary::new().expect("templates");
        let slots = Slots::default().merged(&SlotPatch::client_name("Ana"));
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 14, 30, 0).single().expect("timestamp");

        let persona = prompts.persona(&slots, Language::Spanish, now).expect("render");

        assert!(persona.contains("Client Name | Age | Goal | RAM | GPU"));
        assert!(persona.contains("Ana | - | - | - | -"));
        assert!(persona.contains("Current Time: 2026-03-01 14:30:00 UTC"));
        assert!(persona.contains("Respond in the Spanish language."));
        assert!(persona.contains("whether the client needs a dedicated GPU"));
    }

    #[test]
    fn finalize_notice_is_localized() {
        let prompts = PromptLibrary::new().expect("templates");
        let notice = prompts.finalize_notice(Language::German).expect("render");
        assert!(notice.starts_with("Say you are generating a personalized notebook"));
        assert!(notice.ends_with("Respond in the German language."));
    }

    #[test]
    fn recommendation_includes_confirmed_requirements_when_present() {
        let prompts = PromptLibrary::new().expect("templates");
        let requirements = Slots {
            client_name: Some("Ana".to_string()),
            age: Some(34),
            goal: Some("video editing".to_string()),
            ram: Some("32GB".to_string()),
            needs_gpu: Some(GpuNeed::Yes),
        };

        let with_args = prompts
            .recommendation(&requirements, Some(&requirements), Language::English)
            .expect("render");
        assert!(with_args.contains("[Confirmed Requirements]"));
        assert!(with_args.contains("Ana | 34 | video editing | 32GB | Yes"));

        let without_args =
            prompts.recommendation(&Slots::default(), None, Language::English).expect("render");
        assert!(!without_args.contains("[Confirmed Requirements]"));
        assert!(without_args.contains("Respond in the English language."));

        let unreadable = prompts
            .recommendation(&requirements, Some(&Slots::default()), Language::English)
            .expect("render");
        assert!(!unreadable.contains("[Confirmed Requirements]"));
    }
}
