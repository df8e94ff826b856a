//! Supabase datastore: PostgREST over HTTPS.
//!
//! Every call carries the service key as both `apikey` and bearer token.
//! Writes ask for `Prefer: return=representation` so inserted rows come back.
//! PostgREST has no atomic increment without a stored procedure, so the
//! message counter is read-then-written and task points use a conditional
//! PATCH on the last balance read.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Method, StatusCode};
use sentinels_core::{
    config::StoreConfig,
    error::SentinelError,
    model::{
        Agent, AirdropRegistration, DeploymentStatus, MessageLogEntry, NewAgent, NewNotification,
        NewSubscription, Notification, Subscription, TaskCompletion, UserProfile,
    },
    traits::Datastore,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Conditional PATCH attempts before a contended points award gives up.
const POINTS_CAS_ATTEMPTS: usize = 5;

/// Datastore backed by a hosted Supabase project.
pub struct SupabaseStore {
    client: reqwest::Client,
    rest_url: String,
    service_key: String,
}

/// Outcome of a write that may hit a unique constraint.
enum Write<T> {
    Rows(Vec<T>),
    Conflict,
}

impl SupabaseStore {
    pub fn from_config(config: &StoreConfig) -> Result<Self, SentinelError> {
        if config.supabase_url.is_empty() || config.supabase_key.is_empty() {
            return Err(SentinelError::Config(
                "supabase backend needs SUPABASE_URL and SUPABASE_SERVICE_KEY".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| SentinelError::Store(format!("http client: {e}")))?;
        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", config.supabase_url.trim_end_matches('/')),
            service_key: config.supabase_key.clone(),
        })
    }

    fn table_url(&self, table: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}/{table}", self.rest_url)
        } else {
            format!("{}/{table}?{query}", self.rest_url)
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        table: &str,
        query: &str,
        body: Option<&Value>,
        prefer: Option<&str>,
    ) -> Result<Write<T>, SentinelError> {
        let url = self.table_url(table, query);
        debug!("supabase: {method} {table}?{query}");

        let mut req = self
            .client
            .request(method, &url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key));
        if let Some(prefer) = prefer {
            req = req.header("Prefer", prefer);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| {
                SentinelError::Store(format!(
                    "supabase {table} request failed: {}",
                    e.without_url()
                ))
            })?;

        let status = resp.status();
        if status == StatusCode::CONFLICT {
            return Ok(Write::Conflict);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(SentinelError::Store(format!(
                "supabase {table} returned {status}: {text}"
            )));
        }

        let text = resp.text().await.map_err(|e| {
            SentinelError::Store(format!(
                "supabase {table}: failed to read response: {}",
                e.without_url()
            ))
        })?;
        if text.trim().is_empty() {
            return Ok(Write::Rows(Vec::new()));
        }
        let rows = serde_json::from_str(&text).map_err(|e| {
            SentinelError::Store(format!("supabase {table}: failed to parse rows: {e}"))
        })?;
        Ok(Write::Rows(rows))
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
    ) -> Result<Vec<T>, SentinelError> {
        self.request(Method::GET, table, query, None, None)
            .await
            .and_then(|w| rows_or_conflict(table, w))
    }

    async fn insert<T: DeserializeOwned>(
        &self,
        table: &str,
        body: &Value,
    ) -> Result<Write<T>, SentinelError> {
        self.request(
            Method::POST,
            table,
            "",
            Some(body),
            Some("return=representation"),
        )
        .await
    }

    async fn update<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &str,
        body: &Value,
    ) -> Result<Vec<T>, SentinelError> {
        self.request(
            Method::PATCH,
            table,
            query,
            Some(body),
            Some("return=representation"),
        )
        .await
        .and_then(|w| rows_or_conflict(table, w))
    }

    async fn delete(&self, table: &str, query: &str) -> Result<usize, SentinelError> {
        let rows: Vec<Value> = self
            .request(
                Method::DELETE,
                table,
                query,
                None,
                Some("return=representation"),
            )
            .await
            .and_then(|w| rows_or_conflict(table, w))?;
        Ok(rows.len())
    }

    async fn user_row(&self, wallet: &str) -> Result<Option<UserRow>, SentinelError> {
        let users: Vec<UserRow> = self
            .select(
                "users",
                &format!("wallet_address={}&select=*&limit=1", eq(wallet)),
            )
            .await?;
        Ok(users.into_iter().next())
    }

    /// Add `points` to the balance, PATCHing only while it still equals the
    /// last value read. Returns the new total.
    async fn award_points(
        &self,
        wallet: &str,
        mut current: i64,
        points: i64,
    ) -> Result<i64, SentinelError> {
        for _ in 0..POINTS_CAS_ATTEMPTS {
            let total = current + points;
            let rows: Vec<Value> = self
                .update(
                    "users",
                    &format!("wallet_address={}&points=eq.{current}", eq(wallet)),
                    &json!({ "points": total }),
                )
                .await?;
            if !rows.is_empty() {
                return Ok(total);
            }
            current = self
                .user_row(wallet)
                .await?
                .ok_or_else(|| {
                    SentinelError::Store(format!("user {wallet} disappeared during task award"))
                })?
                .points;
        }
        Err(SentinelError::Store(format!(
            "points for {wallet} still contended after {POINTS_CAS_ATTEMPTS} attempts"
        )))
    }
}

fn rows_or_conflict<T>(table: &str, write: Write<T>) -> Result<Vec<T>, SentinelError> {
    match write {
        Write::Rows(rows) => Ok(rows),
        Write::Conflict => Err(SentinelError::Store(format!("supabase {table}: conflict"))),
    }
}

fn first_row<T>(table: &str, write: Write<T>) -> Result<T, SentinelError> {
    rows_or_conflict(table, write)?
        .into_iter()
        .next()
        .ok_or_else(|| SentinelError::Store(format!("supabase {table}: insert returned no row")))
}

/// PostgREST equality filter value.
pub(crate) fn eq(value: &str) -> String {
    format!("eq.{}", urlencoding::encode(value))
}

fn ts_param(dt: DateTime<Utc>) -> String {
    urlencoding::encode(&dt.to_rfc3339_opts(SecondsFormat::Millis, true)).into_owned()
}

/// Agent insert body with the knowledge base sent as native JSON.
fn agent_body(agent: &NewAgent) -> Result<Value, SentinelError> {
    let mut body = serde_json::to_value(agent)?;
    if let Some(ref kb) = agent.knowledge_base {
        if let Ok(parsed) = serde_json::from_str::<Value>(kb) {
            body["knowledge_base"] = parsed;
        }
    }
    Ok(body)
}

#[derive(Deserialize)]
struct UserRow {
    wallet_address: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    points: i64,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TaskRow {
    task_id: String,
}

#[async_trait]
impl Datastore for SupabaseStore {
    fn name(&self) -> &str {
        "supabase"
    }

    async fn get_agent(&self, id: &str) -> Result<Option<Agent>, SentinelError> {
        let rows: Vec<Agent> = self
            .select("agents", &format!("id={}&select=*&limit=1", eq(id)))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list_agents(&self, user_id: &str) -> Result<Vec<Agent>, SentinelError> {
        self.select(
            "agents",
            &format!("user_id={}&select=*&order=created_at.desc", eq(user_id)),
        )
        .await
    }

    async fn create_agent(&self, agent: NewAgent) -> Result<Agent, SentinelError> {
        let body = agent_body(&agent)?;
        first_row("agents", self.insert("agents", &body).await?)
    }

    async fn set_agent_status(
        &self,
        id: &str,
        status: DeploymentStatus,
        bot_username: Option<&str>,
    ) -> Result<bool, SentinelError> {
        let mut body = json!({ "status": status.as_str() });
        if let Some(username) = bot_username {
            body["bot_username"] = Value::from(username);
        }
        let rows: Vec<Value> = self
            .update("agents", &format!("id={}", eq(id)), &body)
            .await?;
        Ok(!rows.is_empty())
    }

    async fn record_agent_interaction(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), SentinelError> {
        #[derive(Deserialize)]
        struct Count {
            #[serde(default)]
            message_count: i64,
        }
        let query = format!("id={}", eq(id));
        let current: Vec<Count> = self
            .select("agents", &format!("{query}&select=message_count"))
            .await?;
        let Some(current) = current.into_iter().next() else {
            return Ok(());
        };
        let body = json!({
            "message_count": current.message_count + 1,
            "last_interaction": at,
        });
        let _: Vec<Value> = self.update("agents", &query, &body).await?;
        Ok(())
    }

    async fn latest_subscription(
        &self,
        agent_id: &str,
    ) -> Result<Option<Subscription>, SentinelError> {
        let rows: Vec<Subscription> = self
            .select(
                "subscriptions",
                &format!(
                    "agent_id={}&select=*&order=created_at.desc&limit=1",
                    eq(agent_id)
                ),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn create_subscription(
        &self,
        sub: NewSubscription,
    ) -> Result<Subscription, SentinelError> {
        let body = serde_json::to_value(&sub)?;
        first_row(
            "subscriptions",
            self.insert("subscriptions", &body).await?,
        )
    }

    async fn subscriptions_expiring_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Subscription>, SentinelError> {
        self.select(
            "subscriptions",
            &format!(
                "payment_status=eq.confirmed&expiry_date=lte.{}&select=*&order=created_at.desc",
                ts_param(cutoff)
            ),
        )
        .await
    }

    async fn log_message(&self, entry: &MessageLogEntry) -> Result<(), SentinelError> {
        let body = serde_json::to_value(entry)?;
        let _: Write<Value> = self.insert("message_logs", &body).await?;
        Ok(())
    }

    async fn recent_messages(
        &self,
        agent_id: &str,
        limit: u32,
    ) -> Result<Vec<MessageLogEntry>, SentinelError> {
        self.select(
            "message_logs",
            &format!(
                "agent_id={}&select=*&order=created_at.desc&limit={limit}",
                eq(agent_id)
            ),
        )
        .await
    }

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, SentinelError> {
        let body = serde_json::to_value(&notification)?;
        first_row(
            "notifications",
            self.insert("notifications", &body).await?,
        )
    }

    async fn list_notifications(
        &self,
        user_id: &str,
    ) -> Result<Vec<Notification>, SentinelError> {
        self.select(
            "notifications",
            &format!("user_id={}&select=*&order=created_at.desc", eq(user_id)),
        )
        .await
    }

    async fn mark_notification_read(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<bool, SentinelError> {
        let rows: Vec<Value> = self
            .update(
                "notifications",
                &format!("id={}&user_id={}", eq(id), eq(user_id)),
                &json!({ "read": true }),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn delete_notification(&self, id: &str, user_id: &str) -> Result<bool, SentinelError> {
        let removed = self
            .delete(
                "notifications",
                &format!("id={}&user_id={}", eq(id), eq(user_id)),
            )
            .await?;
        Ok(removed > 0)
    }

    async fn notification_exists_since(
        &self,
        user_id: &str,
        agent_id: &str,
        title: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, SentinelError> {
        let rows: Vec<Value> = self
            .select(
                "notifications",
                &format!(
                    "user_id={}&agent_id={}&title={}&created_at=gte.{}&select=id&limit=1",
                    eq(user_id),
                    eq(agent_id),
                    eq(title),
                    ts_param(since)
                ),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn register_airdrop(
        &self,
        registration: AirdropRegistration,
    ) -> Result<Option<AirdropRegistration>, SentinelError> {
        let body = serde_json::to_value(&registration)?;
        let created: AirdropRegistration =
            match self.insert("airdrop_registrations", &body).await? {
                Write::Conflict => return Ok(None),
                rows => first_row("airdrop_registrations", rows)?,
            };

        let user = json!({
            "wallet_address": created.wallet_address,
            "email": created.email,
            "points": 0,
            "created_at": created.created_at,
        });
        // An orphaned user row from an earlier sign-up is kept as is.
        let _: Write<Value> = self.insert("users", &user).await?;
        Ok(Some(created))
    }

    async fn list_airdrop_registrations(
        &self,
    ) -> Result<Vec<AirdropRegistration>, SentinelError> {
        self.select("airdrop_registrations", "select=*&order=created_at.desc")
            .await
    }

    async fn get_user(&self, wallet: &str) -> Result<Option<UserProfile>, SentinelError> {
        let users: Vec<UserRow> = self
            .select(
                "users",
                &format!("wallet_address={}&select=*&limit=1", eq(wallet)),
            )
            .await?;
        let Some(user) = users.into_iter().next() else {
            return Ok(None);
        };
        let tasks: Vec<TaskRow> = self
            .select(
                "user_tasks",
                &format!(
                    "wallet_address={}&select=task_id&order=completed_at.asc",
                    eq(wallet)
                ),
            )
            .await?;
        Ok(Some(UserProfile {
            wallet_address: user.wallet_address,
            email: user.email,
            points: user.points,
            created_at: user.created_at,
            completed_tasks: tasks.into_iter().map(|t| t.task_id).collect(),
        }))
    }

    async fn delete_user(&self, wallet: &str) -> Result<bool, SentinelError> {
        let filter = format!("wallet_address={}", eq(wallet));
        let mut removed = 0;
        for table in ["user_tasks", "airdrop_registrations", "users"] {
            removed += self.delete(table, &filter).await?;
        }
        Ok(removed > 0)
    }

    async fn complete_task(
        &self,
        wallet: &str,
        task_id: &str,
        points: i64,
    ) -> Result<TaskCompletion, SentinelError> {
        let Some(user) = self.user_row(wallet).await? else {
            return Ok(TaskCompletion::UserNotFound);
        };

        let task = json!({
            "wallet_address": wallet,
            "task_id": task_id,
            "points": points,
            "completed_at": Utc::now(),
        });
        if let Write::Conflict = self.insert::<Value>("user_tasks", &task).await? {
            return Ok(TaskCompletion::AlreadyCompleted);
        }

        match self.award_points(wallet, user.points, points).await {
            Ok(total_points) => Ok(TaskCompletion::Completed {
                points_awarded: points,
                total_points,
            }),
            Err(e) => {
                // Drop the task row so the completion can be retried.
                let task_filter =
                    format!("wallet_address={}&task_id={}", eq(wallet), eq(task_id));
                if let Err(undo) = self.delete("user_tasks", &task_filter).await {
                    warn!("supabase: could not roll back task {task_id} for {wallet}: {undo}");
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{RawQuery, State},
        routing::{get, post},
        Json, Router,
    };
    use sentinels_core::model::Personality;
    use std::sync::{Arc, Mutex};

    fn config() -> StoreConfig {
        StoreConfig {
            backend: "supabase".into(),
            supabase_url: "https://proj.supabase.co/".into(),
            supabase_key: "service-key".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let err = SupabaseStore::from_config(&StoreConfig::default());
        assert!(matches!(err, Err(SentinelError::Config(_))));
    }

    #[test]
    fn test_table_url() {
        let store = SupabaseStore::from_config(&config()).unwrap();
        assert_eq!(
            store.table_url("agents", "id=eq.a1"),
            "https://proj.supabase.co/rest/v1/agents?id=eq.a1"
        );
        assert_eq!(
            store.table_url("users", ""),
            "https://proj.supabase.co/rest/v1/users"
        );
    }

    #[test]
    fn test_eq_filter_is_url_encoded() {
        assert_eq!(eq("a1"), "eq.a1");
        assert_eq!(eq("Subscription expired"), "eq.Subscription%20expired");
        assert_eq!(eq("a&b=c"), "eq.a%26b%3Dc");
    }

    #[test]
    fn test_timestamp_param_encodes_colons() {
        let dt = DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(ts_param(dt), "2026-03-01T10%3A00%3A00.000Z");
    }

    #[test]
    fn test_agent_body_sends_native_knowledge_base() {
        let agent = NewAgent {
            id: "a1".into(),
            user_id: "u1".into(),
            project_name: "P".into(),
            bot_token: "123:abc".into(),
            bot_username: None,
            personality: Personality::Custom,
            custom_personality: Some("Pirate".into()),
            temperature: Some(0.9),
            knowledge_base: Some(r#"{"description":"AI"}"#.into()),
            custom_faqs: None,
            trigger_keywords: vec!["ai".into()],
            status: DeploymentStatus::Pending,
            created_at: Utc::now(),
        };
        let body = agent_body(&agent).unwrap();
        assert_eq!(body["knowledge_base"]["description"], "AI");
        assert_eq!(body["bot_token"], "123:abc");
        assert_eq!(body["personality"], "custom");
        assert_eq!(body["trigger_keywords"][0], "ai");
    }

    /// Just enough PostgREST for `users` and `user_tasks`.
    #[derive(Default)]
    struct FakeRest {
        points: Mutex<i64>,
        /// Added to the balance right before the next PATCH is evaluated.
        rival_award: Mutex<Option<i64>>,
        fail_patch: bool,
        patches: Mutex<Vec<String>>,
        task_deletes: Mutex<Vec<String>>,
    }

    fn user_json(points: i64) -> Value {
        json!([{
            "wallet_address": "0xwallet",
            "email": null,
            "points": points,
            "created_at": "2026-01-01T00:00:00Z",
        }])
    }

    async fn users_get(State(fake): State<Arc<FakeRest>>) -> Json<Value> {
        Json(user_json(*fake.points.lock().unwrap()))
    }

    async fn users_patch(
        State(fake): State<Arc<FakeRest>>,
        RawQuery(query): RawQuery,
        Json(body): Json<Value>,
    ) -> (axum::http::StatusCode, Json<Value>) {
        let query = query.unwrap_or_default();
        fake.patches.lock().unwrap().push(query.clone());
        if fake.fail_patch {
            return (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"message": "boom"})),
            );
        }
        let mut points = fake.points.lock().unwrap();
        if let Some(rival) = fake.rival_award.lock().unwrap().take() {
            *points += rival;
        }
        let expected = query
            .split('&')
            .find_map(|kv| kv.strip_prefix("points=eq."))
            .and_then(|v| v.parse::<i64>().ok());
        if expected != Some(*points) {
            return (axum::http::StatusCode::OK, Json(json!([])));
        }
        *points = body["points"].as_i64().unwrap();
        (axum::http::StatusCode::OK, Json(user_json(*points)))
    }

    async fn tasks_post(Json(body): Json<Value>) -> (axum::http::StatusCode, Json<Value>) {
        (axum::http::StatusCode::CREATED, Json(json!([body])))
    }

    async fn tasks_delete(
        State(fake): State<Arc<FakeRest>>,
        RawQuery(query): RawQuery,
    ) -> Json<Value> {
        fake.task_deletes
            .lock()
            .unwrap()
            .push(query.unwrap_or_default());
        Json(json!([{"task_id": "follow"}]))
    }

    async fn fake_store(fake: Arc<FakeRest>) -> SupabaseStore {
        let app = Router::new()
            .route("/rest/v1/users", get(users_get).patch(users_patch))
            .route("/rest/v1/user_tasks", post(tasks_post).delete(tasks_delete))
            .with_state(fake);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await });
        SupabaseStore::from_config(&StoreConfig {
            supabase_url: format!("http://{addr}"),
            ..config()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_complete_task_rereads_balance_when_contended() {
        let fake = Arc::new(FakeRest {
            points: Mutex::new(10),
            rival_award: Mutex::new(Some(5)),
            ..Default::default()
        });
        let store = fake_store(fake.clone()).await;

        let outcome = store.complete_task("0xwallet", "follow", 50).await.unwrap();
        assert_eq!(
            outcome,
            TaskCompletion::Completed {
                points_awarded: 50,
                total_points: 65,
            }
        );
        assert_eq!(*fake.points.lock().unwrap(), 65);
        let patches = fake.patches.lock().unwrap().clone();
        assert_eq!(patches.len(), 2);
        assert!(patches[0].ends_with("points=eq.10"), "{patches:?}");
        assert!(patches[1].ends_with("points=eq.15"), "{patches:?}");
        assert!(fake.task_deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_complete_task_rolls_back_task_when_award_fails() {
        let fake = Arc::new(FakeRest {
            points: Mutex::new(10),
            fail_patch: true,
            ..Default::default()
        });
        let store = fake_store(fake.clone()).await;

        let err = store
            .complete_task("0xwallet", "follow", 50)
            .await
            .unwrap_err();
        assert!(matches!(err, SentinelError::Store(_)));
        assert_eq!(*fake.points.lock().unwrap(), 10);
        let deletes = fake.task_deletes.lock().unwrap().clone();
        assert_eq!(
            deletes,
            vec!["wallet_address=eq.0xwallet&task_id=eq.follow".to_string()]
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_store_error() {
        let store = SupabaseStore::from_config(&StoreConfig {
            supabase_url: "http://127.0.0.1:9".into(),
            ..config()
        })
        .unwrap();
        let err = store.get_agent("a1").await.unwrap_err();
        assert!(matches!(err, SentinelError::Store(_)));
    }
}
