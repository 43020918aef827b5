//! Message templates for the four stages
//!
//! Templates only decide what each stage says. They never call a provider
//! and never look at anything but the user request and declared inputs.

use anyhow::{Result, bail};

use neuroprompt_llm::Message;
use neuroprompt_pipeline::StageInputs;

use crate::criteria;
use crate::frameworks::{self, FRAMEWORKS};
use crate::{CRITIQUE, GENERATE, OPTIMIZE, RESEARCH};

/// Builds the completion messages for a stage
pub trait StageTemplates: Send + Sync {
    /// Messages to send for `stage`, given the user request and the stage's
    /// dependency artifacts.
    ///
    /// # Errors
    ///
    /// Fails for an unknown stage or a missing input.
    fn render(&self, stage: &str, user_input: &str, inputs: &StageInputs) -> Result<Vec<Message>>;
}

/// Built-in templates backed by the embedded frameworks and criteria
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTemplates;

const SYSTEM_RESEARCH: &str = "You are a prompt engineering researcher. You know current \
prompting techniques and frameworks and explain which ones suit a given request.";

const SYSTEM_GENERATE: &str = "You are a prompt engineer. You write complete, ready-to-use \
prompts that follow a named framework.";

const SYSTEM_CRITIQUE: &str = "You are a strict prompt reviewer. You evaluate prompts against \
weighted criteria and give concrete, actionable improvements.";

const SYSTEM_OPTIMIZE: &str = "You are a prompt optimizer. You apply review feedback to a \
prompt and return only the improved prompt.";

impl DefaultTemplates {
    fn research(user_input: &str) -> String {
        let rec = frameworks::recommend(user_input);
        let recommended: String = rec
            .frameworks
            .iter()
            .map(|f| format!("- **{} Framework**: {}\n", f.name, f.summary))
            .collect();
        let reference: String = FRAMEWORKS.iter().map(|f| f.render() + "\n").collect();

        format!(
            r"Research the prompt engineering techniques and frameworks that are most relevant for this user request:

'{user_input}'

The request looks like: {content_types}.

Frameworks to evaluate first:
{recommended}
# Framework Reference

{reference}
# Your Task

Write a concise research summary in Markdown with these sections:

## Relevant Techniques
Which techniques and frameworks fit this request and why.

## Recommended Framework
The single best framework for this request, with a short justification.

## Best Practices for This Request
Numbered, specific advice (desired format and level of detail, success criteria, target audience).",
            content_types = rec.content_types.join(", "),
        )
    }

    fn generate(user_input: &str, research: &str) -> String {
        let framework = frameworks::select_framework(user_input);
        format!(
            r"Generate an optimized prompt for this user request:

'{user_input}'

Use the {name} framework ({description}).

{reference}
# Research Notes

{research}

# Your Task

Write the complete prompt, with one clearly labelled section per element of the {name} structure. \
Return only the prompt, without commentary.",
            name = framework.name,
            description = framework.description,
            reference = framework.render(),
            research = research.trim(),
        )
    }

    fn critique(user_input: &str, generated: &str) -> String {
        format!(
            r"Critique the generated prompt below for effectiveness, clarity, and optimization potential.

Original user request: '{user_input}'

# Generated Prompt

{generated}

# Evaluation Criteria

{rubric}
# Your Task

For each criterion give a score from 1 to 10 and a one-line justification, then the weighted overall score. \
Finish with a numbered list of specific improvement suggestions, most important first.",
            generated = generated.trim(),
            rubric = criteria::rubric(),
        )
    }

    fn optimize(user_input: &str, generated: &str, critique: &str) -> String {
        format!(
            r"Optimize the prompt below by applying every suggestion from the critique.

Original user request: '{user_input}'

# Prompt

{generated}

# Critique

{critique}

# Your Task

Return the final optimized prompt only. Keep its framework structure, apply all improvements, \
and do not include the critique or any commentary.",
            generated = generated.trim(),
            critique = critique.trim(),
        )
    }
}

impl StageTemplates for DefaultTemplates {
    fn render(&self, stage: &str, user_input: &str, inputs: &StageInputs) -> Result<Vec<Message>> {
        let (system, user) = match stage {
            RESEARCH => (SYSTEM_RESEARCH, Self::research(user_input)),
            GENERATE => (
                SYSTEM_GENERATE,
                Self::generate(user_input, inputs.content(RESEARCH)?),
            ),
            CRITIQUE => (
                SYSTEM_CRITIQUE,
                Self::critique(user_input, inputs.content(GENERATE)?),
            ),
            OPTIMIZE => (
                SYSTEM_OPTIMIZE,
                Self::optimize(
                    user_input,
                    inputs.content(GENERATE)?,
                    inputs.content(CRITIQUE)?,
                ),
            ),
            other => bail!("No template for stage '{other}'"),
        };
        Ok(vec![Message::system(system), Message::user(user)])
    }
}
