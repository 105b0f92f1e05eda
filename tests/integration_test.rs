//! Integration tests for SQL Chat
//!
//! Exercises the database handle, the agent and the interaction loop
//! against a real SQLite file seeded from `student.sql`.

use async_trait::async_trait;
use sql_chat::agent::{AgentEvent, QueryAgent, RecordingSink, SqlAgent, Toolkit};
use sql_chat::cli::commands::{Command, CommandType};
use sql_chat::config::{ConfigurationForm, SessionConfiguration, Settings};
use sql_chat::database::SqlDatabase;
use sql_chat::error::{ErrorClass, Result, SqlChatError};
use sql_chat::llm::{GenerationParams, LLMProvider, LLMResponse, Message};
use sql_chat::session::{
    ChatRole, InteractionLoop, SessionComponents, SessionFactory, SqlSessionFactory, GREETING,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Write a fresh copy of the student database into `dir`
async fn seeded_db(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("student.db");
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(options).await.unwrap();
    sqlx::raw_sql(include_str!("../student.sql"))
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;
    path
}

/// Replays canned completions in order
struct ScriptedLlm {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedLlm {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
        })
    }
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn generate(
        &self,
        _messages: &[Message],
        _params: Option<&GenerationParams>,
    ) -> Result<LLMResponse> {
        let reply = self.replies.lock().unwrap().pop_front().ok_or_else(|| {
            SqlChatError::LLMApiError {
                provider: "Scripted".to_string(),
                message: "script exhausted".to_string(),
                status: 500,
            }
        })?;
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

const STUDENT_SCRIPT: &[&str] = &[
    "Thought: I should look at the tables in the database.\nAction: sql_db_list_tables\nAction Input: \"\"",
    "Thought: STUDENT looks relevant, I need its schema.\nAction: sql_db_schema\nAction Input: STUDENT",
    "Thought: I can count the students now.\nAction: sql_db_query\nAction Input: SELECT COUNT(*) AS total FROM STUDENT WHERE MARKS > 80",
    "Thought: I now know the final answer\nFinal Answer: 7 students scored above 80.",
];

/// Builds a scripted agent over a local database
struct ScriptedFactory {
    path: PathBuf,
    script: &'static [&'static str],
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn build(&self, _config: &SessionConfiguration) -> Result<SessionComponents> {
        let db = Arc::new(SqlDatabase::open_local(&self.path).await?);
        let llm: Arc<dyn LLMProvider> = ScriptedLlm::new(self.script);
        let database = db.description().to_string();
        let agent = SqlAgent::new(Arc::clone(&llm), Toolkit::for_database(db, llm));
        Ok(SessionComponents {
            agent: Arc::new(agent),
            database,
        })
    }
}

#[tokio::test]
async fn test_command_parsing() {
    let cmd = Command::parse("/clear").unwrap();
    assert_eq!(cmd.command_type, CommandType::Clear);

    let cmd = Command::parse("/config").unwrap();
    assert_eq!(cmd.command_type, CommandType::Config);

    let cmd = Command::parse("How many students scored above 80?").unwrap();
    assert!(matches!(cmd.command_type, CommandType::Query { .. }));

    assert!(Command::parse("/connect sqlite://test.db").is_err());
}

#[tokio::test]
async fn test_local_database_rejects_writes() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir).await;
    let db = SqlDatabase::open_local(&path).await.unwrap();

    let insert = db
        .run("INSERT INTO STUDENT VALUES ('Eve', 'DEVOPS', 'A', 99)")
        .await;
    assert!(insert.is_err());

    let drop = db.run("DROP TABLE STUDENT").await;
    assert!(drop.is_err());

    let count = db.run("SELECT COUNT(*) FROM STUDENT").await.unwrap();
    assert_eq!(count.first_column(), vec!["10".to_string()]);
    db.close().await;
}

#[tokio::test]
async fn test_missing_local_file_is_not_created() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.db");

    let err = SqlDatabase::open_local(&path).await.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Construction);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_tables_and_schema() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir).await;
    let db = SqlDatabase::open_local(&path).await.unwrap();

    assert_eq!(db.dialect(), "sqlite");
    assert_eq!(db.list_tables().await.unwrap(), vec!["STUDENT".to_string()]);

    let info = db.table_info(&["student".to_string()]).await.unwrap();
    assert!(info.contains("CREATE TABLE STUDENT"));
    assert!(info.contains("3 rows from STUDENT table:"));
    assert!(info.contains("NAME\tCLASS\tSECTION\tMARKS"));

    let err = db.table_info(&["TEACHER".to_string()]).await.unwrap_err();
    assert!(err.to_string().contains("TEACHER"));

    let rendered = db.run_no_throw("SELECT * FROM NOPE").await;
    assert!(rendered.starts_with("Error:"));
}

#[tokio::test]
async fn test_one_statement_per_query() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir).await;
    let db = SqlDatabase::open_local(&path).await.unwrap();

    let two = "SELECT NAME FROM STUDENT LIMIT 1; SELECT MARKS, CLASS FROM STUDENT LIMIT 1";
    let err = db.run(two).await.unwrap_err();
    assert!(matches!(err, SqlChatError::RejectedStatement(_)));
    assert_eq!(err.class(), ErrorClass::Invocation);
    assert_eq!(
        db.run_no_throw(two).await,
        "Error: You can only execute one statement at a time."
    );

    let count = db.run("SELECT COUNT(*) FROM STUDENT;").await.unwrap();
    assert_eq!(count.first_column(), vec!["10".to_string()]);

    let quoted = db.run("SELECT ';' AS sep").await.unwrap();
    assert_eq!(quoted.first_column(), vec![";".to_string()]);
    db.close().await;
}

#[tokio::test]
async fn test_agent_answers_from_real_database() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir).await;
    let db = Arc::new(SqlDatabase::open_local(&path).await.unwrap());
    let llm: Arc<dyn LLMProvider> = ScriptedLlm::new(STUDENT_SCRIPT);
    let agent = SqlAgent::new(Arc::clone(&llm), Toolkit::for_database(db, llm));

    let sink = RecordingSink::new();
    let answer = agent
        .run("How many students scored above 80?", &sink)
        .await
        .unwrap();

    assert_eq!(answer, "7 students scored above 80.");
    assert_eq!(
        sink.tools_called(),
        vec!["sql_db_list_tables", "sql_db_schema", "sql_db_query"]
    );

    let outputs: Vec<String> = sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            AgentEvent::ToolFinished { tool, output } if tool == "sql_db_query" => Some(output),
            _ => None,
        })
        .collect();
    assert_eq!(outputs.len(), 1);
    assert!(outputs[0].contains("total"));
    assert!(outputs[0].contains('7'));
}

#[tokio::test]
async fn test_chat_session_end_to_end() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir).await;
    let factory = Arc::new(ScriptedFactory {
        path,
        script: STUDENT_SCRIPT,
    });

    let mut session = InteractionLoop::new(factory);
    session
        .configure_with(ConfigurationForm::local(Some("test-key".to_string())), |_| None)
        .await
        .unwrap();

    let sink = RecordingSink::new();
    session
        .submit("How many students scored above 80?", &sink)
        .await
        .unwrap();

    let log: Vec<(ChatRole, String)> = session
        .log()
        .messages()
        .iter()
        .map(|m| (m.role(), m.content().to_string()))
        .collect();
    assert_eq!(
        log,
        vec![
            (ChatRole::Assistant, GREETING.to_string()),
            (
                ChatRole::User,
                "How many students scored above 80?".to_string()
            ),
            (
                ChatRole::Assistant,
                "7 students scored above 80.".to_string()
            ),
        ]
    );
}

#[tokio::test]
async fn test_failed_question_keeps_session_alive() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir).await;
    // One reply only: the second model call fails.
    let factory = Arc::new(ScriptedFactory {
        path,
        script: &STUDENT_SCRIPT[..1],
    });

    let mut session = InteractionLoop::new(factory);
    session
        .configure_with(ConfigurationForm::local(Some("test-key".to_string())), |_| None)
        .await
        .unwrap();

    let reply = session
        .submit("How many students scored above 80?", &RecordingSink::new())
        .await
        .unwrap();
    assert_eq!(reply.role(), ChatRole::Assistant);
    assert!(reply.content().starts_with("Sorry, I encountered an error: "));
    assert!(reply.content().contains("script exhausted"));

    assert!(session.is_ready());
    assert_eq!(session.log().len(), 3);
}

#[tokio::test]
async fn test_session_factory_reuses_cached_handle() {
    let dir = TempDir::new().unwrap();
    let path = seeded_db(&dir).await;
    let settings = Settings {
        local_db_path: path.clone(),
        ..Settings::default()
    };
    let factory = SqlSessionFactory::new(settings);

    let config = ConfigurationForm::local(Some("gsk_test".to_string()))
        .resolve_with(|_| None)
        .unwrap();

    let first = factory.database(&config).await.unwrap();
    let second = factory.database(&config).await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let components = factory.build(&config).await.unwrap();
    assert!(components.database.contains("student.db"));
    assert!(components.database.contains("read-only"));
}
