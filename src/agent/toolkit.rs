//! SQL Toolkit
//!
//! The tools the agent may call: list tables, describe tables, check a
//! query with the model, and run a query.

use crate::agent::prompt::query_checker_prompt;
use crate::database::SqlDatabase;
use crate::error::{Result, SqlChatError};
use crate::llm::{GenerationParams, LLMProvider, Message};
use async_trait::async_trait;
use std::sync::Arc;

pub const QUERY_TOOL: &str = "sql_db_query";
pub const SCHEMA_TOOL: &str = "sql_db_schema";
pub const LIST_TABLES_TOOL: &str = "sql_db_list_tables";
pub const QUERY_CHECKER_TOOL: &str = "sql_db_query_checker";

/// A capability the agent can invoke by name
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model uses in `Action:`
    fn name(&self) -> &str;

    /// Description shown to the model
    fn description(&self) -> &str;

    /// Run the tool; the returned text becomes the observation
    async fn call(&self, input: &str) -> Result<String>;
}

/// Runs a query and returns the rows, or the database error as text
pub struct QuerySqlTool {
    db: Arc<SqlDatabase>,
}

#[async_trait]
impl Tool for QuerySqlTool {
    fn name(&self) -> &str {
        QUERY_TOOL
    }

    fn description(&self) -> &str {
        "Input is a detailed and correct SQL query, output is the result from the database. \
         If the query is not correct, an error message is returned; rewrite the query, check it \
         and try again. If you see an unknown column error, use sql_db_schema to look up the \
         correct table fields."
    }

    async fn call(&self, input: &str) -> Result<String> {
        Ok(self.db.run_no_throw(&clean_sql(input)).await)
    }
}

/// Returns schema and sample rows for a comma-separated list of tables
pub struct InfoSqlTool {
    db: Arc<SqlDatabase>,
}

#[async_trait]
impl Tool for InfoSqlTool {
    fn name(&self) -> &str {
        SCHEMA_TOOL
    }

    fn description(&self) -> &str {
        "Input is a comma-separated list of tables, output is the schema and sample rows for \
         those tables. Make sure the tables exist by calling sql_db_list_tables first! \
         Example Input: table1, table2, table3"
    }

    async fn call(&self, input: &str) -> Result<String> {
        let tables: Vec<String> = input
            .split(',')
            .map(|t| t.trim().trim_matches(|c: char| c == '"' || c == '`' || c == '\'').to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if tables.is_empty() {
            return Ok("Error: provide at least one table name".to_string());
        }
        match self.db.table_info(&tables).await {
            Ok(info) => Ok(info),
            Err(e) => Ok(format!("Error: {}", e)),
        }
    }
}

/// Lists the tables in the database
pub struct ListTablesTool {
    db: Arc<SqlDatabase>,
}

#[async_trait]
impl Tool for ListTablesTool {
    fn name(&self) -> &str {
        LIST_TABLES_TOOL
    }

    fn description(&self) -> &str {
        "Input is an empty string, output is a comma-separated list of tables in the database."
    }

    async fn call(&self, _input: &str) -> Result<String> {
        Ok(self.db.list_tables().await?.join(", "))
    }
}

/// Asks the model to double check a query before it is run
pub struct QueryCheckerTool {
    dialect: String,
    llm: Arc<dyn LLMProvider>,
}

#[async_trait]
impl Tool for QueryCheckerTool {
    fn name(&self) -> &str {
        QUERY_CHECKER_TOOL
    }

    fn description(&self) -> &str {
        "Use this tool to double check whether a query is correct before running it. \
         Always use this tool before running a query with sql_db_query!"
    }

    async fn call(&self, input: &str) -> Result<String> {
        let prompt = query_checker_prompt(&self.dialect, &clean_sql(input));
        let response = self
            .llm
            .generate(&[Message::user(prompt)], Some(&GenerationParams::new()))
            .await?;
        Ok(clean_sql(&response.content))
    }
}

/// The tool set handed to the agent
pub struct Toolkit {
    dialect: String,
    tools: Vec<Box<dyn Tool>>,
}

impl Toolkit {
    /// The four SQL tools over one database handle
    pub fn for_database(db: Arc<SqlDatabase>, llm: Arc<dyn LLMProvider>) -> Self {
        let dialect = db.dialect().to_string();
        let tools: Vec<Box<dyn Tool>> = vec![
            Box::new(QuerySqlTool { db: Arc::clone(&db) }),
            Box::new(InfoSqlTool { db: Arc::clone(&db) }),
            Box::new(ListTablesTool { db }),
            Box::new(QueryCheckerTool {
                dialect: dialect.clone(),
                llm,
            }),
        ];
        Self { dialect, tools }
    }

    /// Build a toolkit from arbitrary tools
    pub fn from_tools(dialect: impl Into<String>, tools: Vec<Box<dyn Tool>>) -> Self {
        Self {
            dialect: dialect.into(),
            tools,
        }
    }

    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    /// Tool names in declaration order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// (name, description) pairs for the prompt
    pub fn descriptions(&self) -> Vec<(&str, &str)> {
        self.tools.iter().map(|t| (t.name(), t.description())).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| &**t)
    }

    /// Call a tool by name
    pub async fn call(&self, name: &str, input: &str) -> Result<String> {
        let tool = self.get(name).ok_or_else(|| SqlChatError::Tool {
            tool: name.to_string(),
            message: format!(
                "{} is not a valid tool, try one of [{}].",
                name,
                self.names().join(", ")
            ),
        })?;
        tool.call(input).await
    }
}

/// Strip markdown fences and a leading `SQL Query:` label from model output
pub fn clean_sql(raw: &str) -> String {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("SQL Query:") {
        text = rest.trim();
    }
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest
            .strip_prefix("sql")
            .or_else(|| rest.strip_prefix("SQL"))
            .unwrap_or(rest);
        text = rest.trim_end().strip_suffix("```").unwrap_or(rest).trim();
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "echoes its input"
        }

        async fn call(&self, input: &str) -> Result<String> {
            Ok(input.to_string())
        }
    }

    #[test]
    fn test_clean_sql() {
        assert_eq!(clean_sql("  SELECT 1  "), "SELECT 1");
        assert_eq!(clean_sql("```sql\nSELECT 1;\n```"), "SELECT 1;");
        assert_eq!(clean_sql("SQL Query: ```\nSELECT 2\n```"), "SELECT 2");
    }

    #[tokio::test]
    async fn test_call_by_name() {
        let toolkit = Toolkit::from_tools("sqlite", vec![Box::new(Echo)]);
        assert_eq!(toolkit.call("echo", "hi").await.unwrap(), "hi");
        assert_eq!(toolkit.descriptions(), vec![("echo", "echoes its input")]);

        match toolkit.call("drop_everything", "").await {
            Err(SqlChatError::Tool { message, .. }) => {
                assert_eq!(message, "drop_everything is not a valid tool, try one of [echo].")
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
