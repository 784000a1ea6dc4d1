//! Prompts for the routed evaluators.
//!
//! Each call sends two parts:
//! 1. A system prompt: the shared grader framing plus the JSON response
//!    format, specialized by role label.
//! 2. An evaluation prompt: the role's task, the reference material (for
//!    roles that use it) and the submission.

use tribunal_core::EvaluatorRole;

/// Response format every routed evaluator asks for.
pub const RESPONSE_FORMAT: &str = r#"Respond in the following JSON format:
{
    "score": <0-100>,
    "confidence": <0.0-1.0>,
    "feedback": "<constructive feedback for the author>",
    "reasoning": "<your internal reasoning process>"
}"#;

/// System prompt for `role`.
pub fn system_prompt(role: EvaluatorRole) -> String {
    format!(
        "You are an expert {} evaluator on a grading council.\n\n\
         Your task is to evaluate submitted answers in your specialty area only.\n\
         Be fair, objective, and provide constructive feedback.\n\n{}",
        role.label(),
        RESPONSE_FORMAT
    )
}

const FACT_TASK: &str = r#"You are a strict fact-checker. Evaluate whether the submitted answer is factually correct.

TASK: Is this answer factually strictly true based on the reference material?

Evaluate:
1. Are all stated facts accurate?
2. Are there any factual errors or misstatements?
3. Is the information complete or are key facts missing?
4. Are any facts taken out of context?
5. Are claims made that the reference material does not support?"#;

const STRUCTURE_TASK: &str = r#"You are an expert in academic writing and grammar.
Evaluate the structure and grammar of the submitted answer.

TASK: Is this answer well-structured and grammatically sound?

Evaluate:
1. Is the answer logically organized with clear flow?
2. Are paragraphs well-formed with topic sentences?
3. Is the grammar correct (subject-verb agreement, tense consistency)?
4. Is the spelling and punctuation accurate?
5. Is the vocabulary appropriate for the academic context?"#;

const CRITICAL_TASK: &str = r#"You are an expert at detecting bluffing and fabrication in submitted answers.

TASK: Is the author bluffing or inventing content?

Look for these red flags:
1. Vague, generic statements without specific details
2. Circular reasoning or tautologies
3. Made-up facts, statistics, or citations
4. Contradiction with the reference material
5. Overly confident claims without evidence
6. Filler content that does not address the question

Score should be HIGH (80-100) if the answer is genuine and substantive.
Score should be LOW (0-40) if significant bluffing is detected."#;

const CLOSING: &str =
    "Provide your evaluation in JSON format with score (0-100), confidence (0-1), feedback, and reasoning.";

/// Evaluation prompt for `role`.
///
/// Context is embedded for the fact and critical roles only. The
/// integrity role is never routed and gets an empty task.
pub fn evaluation_prompt(role: EvaluatorRole, text: &str, context: Option<&str>) -> String {
    let (task, uses_context) = match role {
        EvaluatorRole::Fact => (FACT_TASK, true),
        EvaluatorRole::Structure => (STRUCTURE_TASK, false),
        EvaluatorRole::Critical => (CRITICAL_TASK, true),
        EvaluatorRole::Integrity => ("", false),
    };

    let mut prompt = String::with_capacity(task.len() + text.len() + 256);
    prompt.push_str(task);
    prompt.push_str("\n\n");

    if uses_context {
        if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
            prompt.push_str("REFERENCE MATERIAL:\n");
            prompt.push_str(context);
            prompt.push_str("\n---\n\n");
        }
    }

    prompt.push_str("SUBMITTED ANSWER:\n");
    prompt.push_str(text);
    prompt.push_str("\n\n");
    prompt.push_str(CLOSING);
    prompt
}
