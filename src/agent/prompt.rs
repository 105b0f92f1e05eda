//! Prompt templates for the SQL agent

/// Rows the agent should limit exploratory queries to
pub const DEFAULT_TOP_K: usize = 10;

const PREFIX: &str = "You are an agent that answers questions by working with a SQL database.
Given a question, write a syntactically correct {dialect} query, run it, look at the result and answer.
Unless the user asks for a specific number of examples, limit every query to at most {top_k} rows.
Order results by a relevant column when that makes the answer more useful.
Select only the columns needed for the question, never every column of a table.
Use only the tools listed below, and base the final answer only on what they return.
Always check a query with the checker tool before running it. If a query fails, rewrite it and try again.

Never issue data-changing statements (INSERT, UPDATE, DELETE, DROP and the like).

If the question has nothing to do with the database, answer \"I don't know\".";

const FORMAT_INSTRUCTIONS: &str = "Use the following format:

Question: the question you must answer
Thought: reason about what to do next
Action: the tool to use, one of [{tool_names}]
Action Input: the input for the tool
Observation: the tool result
... (Thought/Action/Action Input/Observation may repeat)
Thought: I now know the final answer
Final Answer: the answer to the original question";

const SUFFIX: &str = "Begin!

Question: {input}
Thought: I should look at the tables in the database to see what I can query. Then I should look at the schema of the most relevant tables.
{agent_scratchpad}";

/// Renders the ReAct prompt for one step
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    header: String,
}

impl PromptTemplate {
    /// Build the fixed part of the prompt: instructions, tools and format
    pub fn new(dialect: &str, top_k: usize, tools: &[(&str, &str)]) -> Self {
        let prefix = PREFIX
            .replace("{dialect}", dialect)
            .replace("{top_k}", &top_k.to_string());

        let descriptions = tools
            .iter()
            .map(|(name, description)| format!("{}: {}", name, description))
            .collect::<Vec<_>>()
            .join("\n");

        let names = tools
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ");

        let header = format!(
            "{}\n\n{}\n\n{}",
            prefix,
            descriptions,
            FORMAT_INSTRUCTIONS.replace("{tool_names}", &names)
        );
        Self { header }
    }

    /// Full prompt for the question and the steps taken so far
    pub fn render(&self, question: &str, scratchpad: &str) -> String {
        let suffix = SUFFIX
            .replace("{input}", question)
            .replace("{agent_scratchpad}", scratchpad);
        format!("{}\n\n{}", self.header, suffix)
    }
}

/// Prompt used by the query checker tool
pub fn query_checker_prompt(dialect: &str, query: &str) -> String {
    format!(
        "{query}\n\
         Double check the {dialect} query above for common mistakes, including:\n\
         - Using NOT IN with NULL values\n\
         - Using UNION when UNION ALL should have been used\n\
         - Using BETWEEN for exclusive ranges\n\
         - Data type mismatch in predicates\n\
         - Properly quoting identifiers\n\
         - Using the correct number of arguments for functions\n\
         - Casting to the correct data type\n\
         - Using the proper columns for joins\n\n\
         If there are any of the above mistakes, rewrite the query. If there are no mistakes, \
         just reproduce the original query.\n\n\
         Output the final SQL query only.\n\nSQL Query: ",
        query = query,
        dialect = dialect
    )
}
