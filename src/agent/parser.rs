//! ReAct output parser
//!
//! Turns one model completion into either a tool call or a final answer.

const FINAL_ANSWER: &str = "Final Answer:";

/// What the model decided to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStep {
    /// Call `tool` with `input`
    Action { tool: String, input: String },
    /// Stop with this answer
    Finish(String),
}

/// A completion that did not follow the expected format
///
/// `observation` is fed back to the model so it can correct itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub observation: String,
    pub llm_output: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Could not parse LLM output: `{}`", self.llm_output)
    }
}

impl std::error::Error for ParseError {}

/// Parse a completion in the Thought / Action / Action Input format
pub fn parse(text: &str) -> Result<AgentStep, ParseError> {
    // The model sometimes keeps going and invents the observation itself.
    let text = match text.find("\nObservation:") {
        Some(pos) => &text[..pos],
        None => text,
    };

    let includes_answer = text.contains(FINAL_ANSWER);

    if let Some((tool, input)) = find_action(text) {
        if includes_answer {
            return Err(error(
                "Parsing LLM output produced both a final answer and a parse-able action. \
                 Reply with either an Action or a Final Answer, not both.",
                text,
            ));
        }
        return Ok(AgentStep::Action { tool, input });
    }

    if includes_answer {
        let answer = text
            .rsplit(FINAL_ANSWER)
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();
        return Ok(AgentStep::Finish(answer));
    }

    match find_label(text, "Action") {
        None => Err(error("Invalid Format: Missing 'Action:' after 'Thought:'", text)),
        Some(_) => Err(error(
            "Invalid Format: Missing 'Action Input:' after 'Action:'",
            text,
        )),
    }
}

fn error(observation: &str, text: &str) -> ParseError {
    ParseError {
        observation: observation.to_string(),
        llm_output: text.to_string(),
    }
}

/// Locate `Action:` followed later by `Action Input:`
fn find_action(text: &str) -> Option<(String, String)> {
    let (_, after_action) = find_label(text, "Action")?;
    let (input_start, after_input) = find_label(&text[after_action..], "Action Input")?;

    let tool = text[after_action..after_action + input_start].trim();
    if tool.is_empty() {
        return None;
    }
    let input = clean_input(&text[after_action + after_input..]);
    Some((tool.to_string(), input))
}

/// Find `<label>:` at the start of a line; returns (label start, offset after colon)
fn find_label(text: &str, label: &str) -> Option<(usize, usize)> {
    let needle = format!("{}:", label);
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with(&needle) {
            let start = offset + (line.len() - trimmed.len());
            return Some((start, start + needle.len()));
        }
        offset += line.len();
    }
    None
}

fn clean_input(raw: &str) -> String {
    raw.trim().trim_matches('"').trim().to_string()
}
