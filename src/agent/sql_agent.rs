//! Zero-shot ReAct SQL agent
//!
//! Each step renders the prompt with the steps taken so far, streams the
//! model's continuation, and either calls a tool or returns the final
//! answer. Malformed completions are answered with a correction and the
//! loop continues.

use crate::agent::parser::{self, AgentStep};
use crate::agent::prompt::{PromptTemplate, DEFAULT_TOP_K};
use crate::agent::sink::{AgentEvent, ProgressSink};
use crate::agent::toolkit::Toolkit;
use crate::agent::QueryAgent;
use crate::config::DEFAULT_MAX_ITERATIONS;
use crate::error::{Result, SqlChatError};
use crate::llm::{GenerationParams, LLMProvider, Message};
use async_trait::async_trait;
use std::sync::Arc;

/// Stop sequence that keeps the model from writing its own observations
const OBSERVATION_STOP: &str = "\nObservation:";

/// Agent that answers questions through the SQL toolkit
pub struct SqlAgent {
    llm: Arc<dyn LLMProvider>,
    toolkit: Toolkit,
    prompt: PromptTemplate,
    max_iterations: usize,
}

impl SqlAgent {
    pub fn new(llm: Arc<dyn LLMProvider>, toolkit: Toolkit) -> Self {
        let prompt = PromptTemplate::new(toolkit.dialect(), DEFAULT_TOP_K, &toolkit.descriptions());
        Self {
            llm,
            toolkit,
            prompt,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Set the maximum number of reasoning steps per question
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Run a tool and turn recoverable failures into observations
    async fn observe(&self, tool: &str, input: &str) -> Result<String> {
        match self.toolkit.call(tool, input).await {
            Ok(output) => Ok(output),
            Err(SqlChatError::Tool { message, .. }) => Ok(message),
            Err(SqlChatError::Database(e)) => Ok(format!("Error: {}", e)),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl QueryAgent for SqlAgent {
    async fn run(&self, question: &str, sink: &dyn ProgressSink) -> Result<String> {
        let params = GenerationParams::new().with_stop([OBSERVATION_STOP]);
        let mut scratchpad = String::new();

        for iteration in 0..self.max_iterations {
            sink.on_event(AgentEvent::StepStarted { iteration });
            tracing::debug!(iteration, "agent step");

            let prompt = self.prompt.render(question, &scratchpad);
            let on_token = |text: &str| sink.on_event(AgentEvent::Token(text.to_string()));
            let response = self
                .llm
                .generate_stream(&[Message::user(prompt)], Some(&params), &on_token)
                .await?;
            tracing::debug!(iteration, tokens = ?response.get_total_tokens(), "model step finished");
            let output = response.content;

            let observation = match parser::parse(&output) {
                Ok(AgentStep::Finish(answer)) => {
                    tracing::info!(iteration, "agent produced final answer");
                    sink.on_event(AgentEvent::Finished {
                        answer: answer.clone(),
                    });
                    return Ok(answer);
                }
                Ok(AgentStep::Action { tool, input }) => {
                    tracing::info!(tool = %tool, "agent calling tool");
                    sink.on_event(AgentEvent::ToolStarted {
                        tool: tool.clone(),
                        input: input.clone(),
                    });
                    let result = self.observe(&tool, &input).await?;
                    sink.on_event(AgentEvent::ToolFinished {
                        tool,
                        output: result.clone(),
                    });
                    result
                }
                Err(e) => {
                    tracing::warn!(iteration, "agent output could not be parsed");
                    sink.on_event(AgentEvent::InvalidOutput {
                        observation: e.observation.clone(),
                    });
                    e.observation
                }
            };

            scratchpad.push_str(output.trim_end());
            scratchpad.push_str("\nObservation: ");
            scratchpad.push_str(&observation);
            scratchpad.push_str("\nThought: ");
        }

        tracing::warn!(max_iterations = self.max_iterations, "agent hit the iteration limit");
        Err(SqlChatError::Agent(
            "Agent stopped due to iteration limit".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::sink::RecordingSink;
    use crate::agent::toolkit::Tool;
    use crate::llm::LLMResponse;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned completions and records the prompts it saw
    struct Scripted {
        replies: Mutex<VecDeque<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for Scripted {
        async fn generate(
            &self,
            messages: &[Message],
            _params: Option<&GenerationParams>,
        ) -> Result<LLMResponse> {
            self.prompts.lock().unwrap().push(messages[0].content.clone());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "Thought: still thinking".to_string());
            Ok(LLMResponse::new(reply))
        }

        fn provider_name(&self) -> &str {
            "Scripted"
        }

        fn model(&self) -> &str {
            "scripted"
        }

        fn has_api_key(&self) -> bool {
            true
        }
    }

    struct Count;

    #[async_trait]
    impl Tool for Count {
        fn name(&self) -> &str {
            "sql_db_query"
        }

        fn description(&self) -> &str {
            "runs a query"
        }

        async fn call(&self, _input: &str) -> Result<String> {
            Ok("| COUNT(*) |\n|----------|\n| 7        |".to_string())
        }
    }

    fn agent(llm: Arc<Scripted>) -> SqlAgent {
        SqlAgent::new(llm, Toolkit::from_tools("sqlite", vec![Box::new(Count)]))
    }

    #[tokio::test]
    async fn test_action_then_answer() {
        let llm = Scripted::new(&[
            "I should count.\nAction: sql_db_query\nAction Input: SELECT COUNT(*) FROM STUDENT WHERE MARKS > 80",
            "I now know the final answer\nFinal Answer: 7 students scored above 80.",
        ]);
        let sink = RecordingSink::new();

        let answer = agent(Arc::clone(&llm))
            .run("How many students scored above 80?", &sink)
            .await
            .unwrap();

        assert_eq!(answer, "7 students scored above 80.");
        assert_eq!(sink.tools_called(), vec!["sql_db_query".to_string()]);

        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[1].contains("Observation: | COUNT(*) |"));
        assert!(prompts[1].ends_with("\nThought: "));
    }

    #[tokio::test]
    async fn test_malformed_output_is_fed_back() {
        let llm = Scripted::new(&["The answer is probably 7", "Final Answer: 7"]);
        let sink = RecordingSink::new();

        let answer = agent(Arc::clone(&llm)).run("count?", &sink).await.unwrap();

        assert_eq!(answer, "7");
        assert!(sink.events().iter().any(|e| matches!(e, AgentEvent::InvalidOutput { .. })));
        assert!(llm.prompts.lock().unwrap()[1]
            .contains("Observation: Invalid Format: Missing 'Action:' after 'Thought:'"));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_observation() {
        let llm = Scripted::new(&["Action: drop_tables\nAction Input: all", "Final Answer: no"]);
        let answer = agent(Arc::clone(&llm))
            .run("q", &RecordingSink::new())
            .await
            .unwrap();

        assert_eq!(answer, "no");
        assert!(llm.prompts.lock().unwrap()[1]
            .contains("drop_tables is not a valid tool, try one of [sql_db_query]."));
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let llm = Scripted::new(&[]);
        let result = agent(llm).with_max_iterations(3).run("q", &RecordingSink::new()).await;

        match result {
            Err(SqlChatError::Agent(message)) => {
                assert_eq!(message, "Agent stopped due to iteration limit")
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
