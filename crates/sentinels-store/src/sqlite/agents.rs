//! Agent rows, deployment status, and interaction counters.

use super::{db_err, parse_ts, ts, SqliteStore};
use chrono::{DateTime, Utc};
use sentinels_core::{
    error::SentinelError,
    model::{Agent, DeploymentStatus, NewAgent, Personality},
};

const AGENT_COLUMNS: &str = "id, user_id, project_name, bot_token, bot_username, personality, \
     custom_personality, temperature, knowledge_base, custom_faqs, trigger_keywords, status, \
     message_count, last_interaction, created_at";

#[derive(sqlx::FromRow)]
struct AgentRow {
    id: String,
    user_id: String,
    project_name: String,
    bot_token: String,
    bot_username: Option<String>,
    personality: String,
    custom_personality: Option<String>,
    temperature: Option<f64>,
    knowledge_base: Option<String>,
    custom_faqs: Option<String>,
    trigger_keywords: String,
    status: String,
    message_count: i64,
    last_interaction: Option<String>,
    created_at: String,
}

impl AgentRow {
    fn into_agent(self) -> Result<Agent, SentinelError> {
        let status = DeploymentStatus::parse(&self.status).ok_or_else(|| {
            SentinelError::Store(format!("agent {}: unknown status {}", self.id, self.status))
        })?;
        let trigger_keywords: Vec<String> =
            serde_json::from_str(&self.trigger_keywords).unwrap_or_default();
        let last_interaction = match self.last_interaction {
            Some(ref s) => Some(parse_ts(s)?),
            None => None,
        };
        Ok(Agent {
            personality: Personality::parse(&self.personality)
                .unwrap_or(Personality::Professional),
            temperature: self.temperature.map(|t| t as f32),
            created_at: parse_ts(&self.created_at)?,
            id: self.id,
            user_id: self.user_id,
            project_name: self.project_name,
            bot_token: self.bot_token,
            bot_username: self.bot_username,
            custom_personality: self.custom_personality,
            knowledge_base: self.knowledge_base,
            custom_faqs: self.custom_faqs,
            trigger_keywords,
            status,
            message_count: self.message_count,
            last_interaction,
        })
    }
}

impl SqliteStore {
    pub async fn get_agent(&self, id: &str) -> Result<Option<Agent>, SentinelError> {
        let row: Option<AgentRow> =
            sqlx::query_as(&format!("SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err("get agent"))?;
        row.map(AgentRow::into_agent).transpose()
    }

    /// A user's agents, newest first.
    pub async fn list_agents(&self, user_id: &str) -> Result<Vec<Agent>, SentinelError> {
        let rows: Vec<AgentRow> = sqlx::query_as(&format!(
            "SELECT {AGENT_COLUMNS} FROM agents WHERE user_id = ? \
             ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err("list agents"))?;
        rows.into_iter().map(AgentRow::into_agent).collect()
    }

    pub async fn create_agent(&self, agent: NewAgent) -> Result<Agent, SentinelError> {
        let keywords = serde_json::to_string(&agent.trigger_keywords)?;
        sqlx::query(
            "INSERT INTO agents (id, user_id, project_name, bot_token, bot_username, personality, \
             custom_personality, temperature, knowledge_base, custom_faqs, trigger_keywords, \
             status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&agent.id)
        .bind(&agent.user_id)
        .bind(&agent.project_name)
        .bind(&agent.bot_token)
        .bind(&agent.bot_username)
        .bind(agent.personality.as_str())
        .bind(&agent.custom_personality)
        .bind(agent.temperature.map(f64::from))
        .bind(&agent.knowledge_base)
        .bind(&agent.custom_faqs)
        .bind(&keywords)
        .bind(agent.status.as_str())
        .bind(ts(agent.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_err("create agent"))?;
        Ok(agent.into_agent())
    }

    /// Returns `false` when no such agent exists.
    pub async fn set_agent_status(
        &self,
        id: &str,
        status: DeploymentStatus,
        bot_username: Option<&str>,
    ) -> Result<bool, SentinelError> {
        let result = sqlx::query(
            "UPDATE agents SET status = ?, bot_username = COALESCE(?, bot_username) WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(bot_username)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err("set agent status"))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn record_agent_interaction(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), SentinelError> {
        sqlx::query(
            "UPDATE agents SET message_count = message_count + 1, last_interaction = ? \
             WHERE id = ?",
        )
        .bind(ts(at))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err("record agent interaction"))?;
        Ok(())
    }
}
