//! Prompt templates for LLM interactions

use super::client::ChatRequest;

/// Sampling temperature for documentation drafts
pub const DOC_TEMPERATURE: f32 = 0.2;

/// Sampling temperature for the judge; scoring should be repeatable
pub const JUDGE_TEMPERATURE: f32 = 0.0;

/// Prompt for drafting API documentation of one code chunk
pub struct DocPrompt;

impl DocPrompt {
    /// Build the chat request for documenting `code`
    pub fn request(code: &str) -> ChatRequest {
        ChatRequest::new(DOC_SYSTEM_PROMPT, Self::generate(code), DOC_TEMPERATURE)
    }

    /// Generate the user prompt
    pub fn generate(code: &str) -> String {
        let mut prompt = String::new();

        prompt.push_str(DOC_INSTRUCTIONS);
        prompt.push_str("\nCODE:\n");
        prompt.push_str(&format!("```python\n{}\n```", code));

        prompt
    }
}

/// Prompt asking the judge to score a documentation draft against its code
pub struct JudgePrompt;

impl JudgePrompt {
    /// Build the chat request for scoring `doc` against `code`
    pub fn request(code: &str, doc: &str) -> ChatRequest {
        ChatRequest::new(
            JUDGE_SYSTEM_PROMPT,
            Self::generate(code, doc),
            JUDGE_TEMPERATURE,
        )
    }

    /// Generate the user prompt
    pub fn generate(code: &str, doc: &str) -> String {
        let mut prompt = String::new();

        prompt.push_str(JUDGE_INSTRUCTIONS);
        prompt.push_str("\nCODE:\n");
        prompt.push_str(&format!("```python\n{}\n```\n\n", code));
        prompt.push_str("DOC:\n");
        prompt.push_str(&format!("```markdown\n{}\n```", doc));

        prompt
    }
}

const DOC_SYSTEM_PROMPT: &str = "You are a senior Python library maintainer. \
You write precise, concise API documentation for functions and classes.";

const DOC_INSTRUCTIONS: &str = r#"Write documentation for the following Python function or class.

Requirements:
- Start with a 2-3 line high-level summary.
- Then add sections: **Parameters**, **Returns**, and **Notes** (if needed).
- Use clear, concise language.
- Do NOT change the logic or invent parameters that do not exist.

Return documentation in Markdown format only.
"#;

const JUDGE_SYSTEM_PROMPT: &str = "You are a strict documentation reviewer for Python APIs. \
You score docs based on correctness, coverage, clarity, and consistency with the given code.";

const JUDGE_INSTRUCTIONS: &str = r#"You are given:

1. The Python code for a function or class.
2. The generated documentation in Markdown.

Score the documentation on the following 4 criteria from 1 (poor) to 5 (excellent):

- correctness: does it accurately describe the behavior?
- coverage: does it mention key parameters, return value, and side effects?
- clarity: is it easy to understand?
- consistency: does it avoid inventing parameters/behavior not in the code?

Respond ONLY as a JSON object with this exact structure:

{
  "correctness": <int 1-5>,
  "coverage": <int 1-5>,
  "clarity": <int 1-5>,
  "consistency": <int 1-5>,
  "overall_score": <int 1-5>
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    const CODE: &str = "def add(a, b):\n    return a + b";

    #[test]
    fn test_doc_prompt_embeds_code_verbatim() {
        let request = DocPrompt::request(CODE);

        assert_eq!(request.temperature, DOC_TEMPERATURE);
        assert!(request.system.contains("senior Python library maintainer"));
        assert!(request.user.contains(&format!("```python\n{}\n```", CODE)));
        assert!(request.user.contains("**Parameters**"));
        assert!(request.user.contains("**Returns**"));
        assert!(request.user.contains("**Notes**"));
    }

    #[test]
    fn test_judge_prompt_lists_rubric() {
        let request = JudgePrompt::request(CODE, "Adds numbers.");

        assert_eq!(request.temperature, 0.0);
        assert!(request.system.contains("strict documentation reviewer"));
        for field in ["correctness", "coverage", "clarity", "consistency", "overall_score"] {
            assert!(request.user.contains(field), "missing {field}");
        }
        assert!(request.user.contains("```markdown\nAdds numbers.\n```"));
        assert!(request.user.ends_with("```"));
    }
}
