//! System prompt assembly for agent and community replies.

use sentinels_core::model::{Agent, KnowledgeBase, Personality};
use serde_json::Value;

/// Output cap for every Telegram answer.
pub const MAX_OUTPUT_TOKENS: u32 = 1024;

/// Temperature for `custom` agents that did not pick one.
pub const DEFAULT_CUSTOM_TEMPERATURE: f32 = 0.7;

/// Sent when the provider fails.
pub const APOLOGY: &str =
    "Sorry, I'm having trouble answering right now. Please try again in a moment.";

const ANSWERING_RULES: &str = "Rules:\n\
- Answer only from the project information above. If it does not cover the question, \
say you don't know and suggest the project's official channels.\n\
- Never give financial advice or price predictions.\n\
- Never ask for seed phrases, private keys, or passwords.\n\
- Keep answers short enough for a Telegram chat.";

struct Preset {
    description: &'static str,
    temperature: f32,
}

fn preset(personality: Personality) -> Option<Preset> {
    let preset = match personality {
        Personality::Professional => Preset {
            description: "You are a professional, courteous support agent. \
                Be precise, formal, and concise.",
            temperature: 0.3,
        },
        Personality::Friendly => Preset {
            description: "You are a warm, friendly community helper. \
                Be approachable and upbeat, and keep things simple.",
            temperature: 0.7,
        },
        Personality::Technical => Preset {
            description: "You are a technical expert. Give accurate, detailed answers \
                and explain mechanisms when it helps.",
            temperature: 0.2,
        },
        Personality::Enthusiastic => Preset {
            description: "You are an enthusiastic community ambassador. \
                Be energetic and positive, with the occasional emoji.",
            temperature: 0.9,
        },
        Personality::Custom => return None,
    };
    Some(preset)
}

/// Sampling temperature for an agent.
pub fn temperature_for(agent: &Agent) -> f32 {
    match preset(agent.personality) {
        Some(p) => p.temperature,
        None => agent.temperature.unwrap_or(DEFAULT_CUSTOM_TEMPERATURE),
    }
}

fn personality_block(agent: &Agent) -> String {
    match preset(agent.personality) {
        Some(p) => p.description.to_string(),
        None => agent
            .custom_personality
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                preset(Personality::Friendly)
                    .map(|p| p.description.to_string())
                    .unwrap_or_default()
            }),
    }
}

/// Render the stored knowledge-base JSON for the prompt.
fn render_knowledge(raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => match KnowledgeBase::from_value(value) {
            Ok(kb) => kb.render(),
            Err(_) => raw.to_string(),
        },
        Err(_) => raw.to_string(),
    }
}

/// Full system prompt for a user-created agent.
pub fn build_system_prompt(agent: &Agent) -> String {
    let mut prompt = personality_block(agent);
    prompt.push_str(&format!(
        "\n\nYou answer questions in Telegram about the project \"{}\".",
        agent.project_name
    ));

    if let Some(ref kb) = agent.knowledge_base {
        let rendered = render_knowledge(kb);
        if !rendered.trim().is_empty() {
            prompt.push_str("\n\nProject information:\n");
            prompt.push_str(&rendered);
        }
    }

    if let Some(ref faqs) = agent.custom_faqs {
        if !faqs.trim().is_empty() {
            prompt.push_str("\n\nFrequently asked questions:\n");
            prompt.push_str(faqs.trim());
        }
    }

    prompt.push_str("\n\n");
    prompt.push_str(ANSWERING_RULES);
    prompt
}

/// System prompt for the project's own community bot.
pub fn community_system_prompt(project: &str, knowledge: &str) -> String {
    let mut prompt = format!(
        "You are the official community assistant of {project}. \
         Be friendly, helpful, and concise."
    );
    if !knowledge.trim().is_empty() {
        prompt.push_str("\n\nProject information:\n");
        prompt.push_str(knowledge.trim());
    }
    prompt.push_str("\n\n");
    prompt.push_str(ANSWERING_RULES);
    prompt
}

/// Reply to `/start`.
pub fn welcome_message(project: &str) -> String {
    format!(
        "👋 Welcome! I'm the AI assistant for {project}. \
         Ask me anything about the project."
    )
}
