//! services/app/src/store/prompts.rs
//!
//! Builds the system instruction carried by every completion request:
//! summaries of the current projects plus the behavioral contract for the
//! selected assistant mode.

use studio_core::domain::Project;

/// Assistant behavior selected per turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatMode {
    /// Architecture guidance and IDE-ready prompt generation.
    #[default]
    Prompt,
    /// Error and log analysis with immediate fixes.
    Debug,
    /// Turning vague ideas into concrete product plans.
    Idea,
}

impl ChatMode {
    /// Debug answers are kept close to deterministic.
    pub fn temperature(&self) -> f32 {
        match self {
            ChatMode::Debug => 0.2,
            _ => 0.7,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChatOptions {
    pub reasoning: bool,
    pub web_search: bool,
}

fn project_summaries(projects: &[Project]) -> String {
    if projects.is_empty() {
        return "No projects in the workspace yet.".to_string();
    }
    projects
        .iter()
        .map(|p| {
            let blocks = if p.blocks.is_empty() {
                "No blocks yet.".to_string()
            } else {
                p.blocks
                    .iter()
                    .map(|b| format!("- [{}] {}", b.kind().as_str(), b.content))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            format!(
                "=== PROJECT: {} ===\n\
                 Category: {}\n\
                 Status: {} (progress: {}%)\n\
                 Description: {}\n\
                 Target audience: {}\n\
                 Main pain point: {}\n\
                 Mapped blocks:\n{}\n\
                 ============================",
                p.name,
                p.category.as_str(),
                p.status.as_str(),
                p.progress,
                p.description,
                non_empty(&p.strategic_fields.target_audience),
                non_empty(&p.strategic_fields.main_pain),
                blocks,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn non_empty(s: &str) -> &str {
    if s.is_empty() {
        "N/A"
    } else {
        s
    }
}

fn feature_instructions(options: &ChatOptions) -> String {
    let mut features = String::new();

    if options.reasoning {
        features.push_str(
            "\n**ACTIVE FEATURE: REASONING (CHAIN OF THOUGHT)**\n\
             Before answering you MUST think through the problem step by step:\n\
             1. Analyze the request.\n\
             2. Plan the solution.\n\
             3. Look for likely mistakes.\n\
             4. Only then write the final answer.\n\
             IMPORTANT: wrap the whole thinking process in <thinking>...</thinking> tags \
             ahead of the answer.\n",
        );
    }

    if options.web_search {
        features.push_str(
            "\n**ACTIVE FEATURE: DEEP SEARCH (SIMULATED)**\n\
             You have access to a \"web search\" tool. Since this environment is simulated:\n\
             1. Act as if you ran a deep search on the topic.\n\
             2. Bring concrete, current-sounding data from your training knowledge.\n\
             3. Open the answer with a block:\n\
                > Search performed: [summary of queried terms and sources]\n\
                > Key insights: [list of relevant findings]\n",
        );
    }

    if features.is_empty() {
        features
    } else {
        format!("\n\n=== ADDITIONAL INSTRUCTIONS ==={}", features)
    }
}

/// The full system instruction for one turn.
pub fn system_prompt(projects: &[Project], mode: ChatMode, options: &ChatOptions) -> String {
    let base = format!(
        "You are the senior product and engineering consultant for this workspace.\n\
         CONTEXT (CURRENT PROJECTS):\n{}\n",
        project_summaries(projects),
    );
    let features = feature_instructions(options);

    match mode {
        ChatMode::Debug => format!(
            "{base}\n\
             **ACTIVE MODE: PROFESSIONAL DEBUGGER**\n\
             Your mission is to analyze errors, logs, and broken code and deliver the \
             immediate fix.\n\n\
             **DEBUG MODE RULES:**\n\
             1. No preamble: go straight to the analysis.\n\
             2. Explain the cause: say why the error happened.\n\
             3. Provide the fix: the corrected code or the command to run.\n\
             4. Answer format:\n\
                - Diagnosis: what broke.\n\
                - Fix: the code or command.\n\
                - Prevention: how to avoid it next time.\n\
             {features}"
        ),
        ChatMode::Idea => format!(
            "{base}\n\
             **ACTIVE MODE: IDEA BREAKDOWN (BRAINSTORM & PLANNING)**\n\
             Your mission is to turn vague ideas into concrete, viable product plans.\n\n\
             **IDEA MODE RULES:**\n\
             1. DO NOT generate code yet; the focus is strategy.\n\
             2. Structure the idea: core concept, MVP scope for week one, key features, \
                business model, recommended stack.\n\
             3. Be critical: point out flaws in the user's logic and saturated markets.\n\
             {features}"
        ),
        ChatMode::Prompt => format!(
            "{base}\n\
             **ACTIVE MODE: SOFTWARE ARCHITECT & PROMPT GENERATOR**\n\
             Your goal is to guide development and produce IDE-ready prompts.\n\n\
             **REQUIRED INTERACTION FLOW:**\n\
             1. UNDERSTANDING FIRST: when the user asks for something new, do not generate \
                a code prompt immediately. Analyze what already exists and ask for missing \
                crucial details (at most three questions at a time).\n\
             2. PROPOSE A SOLUTION: once the context is clear, suggest an approach and \
                confirm it.\n\
             3. GENERATE THE MASTER PROMPT: only when the scope is clear or the user asks \
                explicitly, emit one markdown block structured as Context / Files / Stack / \
                Rules, ready to paste into an IDE.\n\n\
             **GOLDEN RULES:**\n\
             - Never generate a code block in the first reply about a new topic unless the \
               user already gave complete specifications.\n\
             - If the request is vague, ask first.\n\
             {features}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_mode_lowers_temperature() {
        assert_eq!(ChatMode::Debug.temperature(), 0.2);
        assert_eq!(ChatMode::Prompt.temperature(), 0.7);
        assert_eq!(ChatMode::Idea.temperature(), 0.7);
    }

    #[test]
    fn prompt_embeds_project_context_and_mode_contract() {
        let prompt = system_prompt(&[], ChatMode::Debug, &ChatOptions::default());
        assert!(prompt.contains("No projects in the workspace yet."));
        assert!(prompt.contains("PROFESSIONAL DEBUGGER"));
        assert!(!prompt.contains("ADDITIONAL INSTRUCTIONS"));
    }

    #[test]
    fn reasoning_option_requests_thinking_tags() {
        let options = ChatOptions { reasoning: true, web_search: false };
        let prompt = system_prompt(&[], ChatMode::Prompt, &options);
        assert!(prompt.contains("<thinking>"));
        assert!(prompt.contains("ADDITIONAL INSTRUCTIONS"));
    }
}
