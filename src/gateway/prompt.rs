//! Prompt assembly for direct provider calls.

use crate::catalog::StepDefinition;
use crate::context::{GenerationContext, ToneFormality};
use crate::gateway::GenerationRequest;
use serde::{Deserialize, Serialize};

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

fn tone_instruction(tone: ToneFormality) -> &'static str {
    match tone {
        ToneFormality::Casual => "Write in a relaxed, conversational voice.",
        ToneFormality::Neutral => "Write in a clear, direct voice.",
        ToneFormality::Formal => "Write in a polished, professional voice.",
    }
}

pub fn system_prompt(context: &GenerationContext) -> String {
    let mut prompt = format!(
        "You are a senior direct-response copywriter. Write every answer in the language \
         with code '{}', adapted to the culture, idioms and buying habits of the '{}' market. {}",
        context.language_code,
        context.cultural_region,
        tone_instruction(context.tone_formality),
    );
    if context.avoid_real_names {
        prompt.push_str(
            " Never use names of real people or brands; use clearly invented placeholder names.",
        );
    }
    prompt.push_str(" Format the answer as Markdown.");
    prompt
}

pub fn user_prompt(step: &StepDefinition, request: &GenerationRequest) -> String {
    let mut prompt = format!(
        "Task: {}\n{}\n\nProduct description:\n{}\n",
        step.label,
        step.description,
        request.product_input.trim()
    );
    if let Some(previous) = request
        .previous_context
        .as_deref()
        .filter(|c| !c.trim().is_empty())
    {
        prompt.push_str("\nBuild on the work already done:\n\n");
        prompt.push_str(previous);
        prompt.push('\n');
    }
    if let Some(partial) = request
        .continue_from
        .as_deref()
        .filter(|c| !c.is_empty())
    {
        prompt.push_str(
            "\nThe previous answer was cut off. Continue exactly where it stops, \
             without repeating any of it:\n\n",
        );
        prompt.push_str(partial);
    }
    prompt
}

/// System and user messages for one step.
pub fn build_messages(step: &StepDefinition, request: &GenerationRequest) -> Vec<ChatMessage> {
    let context = request.generation_context.clone().unwrap_or_default();
    vec![
        ChatMessage::system(system_prompt(&context)),
        ChatMessage::user(user_prompt(step, request)),
    ]
}
