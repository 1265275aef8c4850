/// PostgreSQL backed user state storage
use log::{info, warn};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tokio_postgres::Client;

use crate::database::connection::connect;
use crate::database::store::StateStore;
use crate::error::ProcessError;
use crate::models::UserState;

const CREATE_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS user_state (
     user_id TEXT PRIMARY KEY,
     accelerometer DOUBLE PRECISION NOT NULL,
     temperature DOUBLE PRECISION NOT NULL,
     updated_at TIMESTAMPTZ NOT NULL
 )";

const SELECT_STATE_SQL: &str =
    "SELECT accelerometer, temperature FROM user_state WHERE user_id = $1";

const UPSERT_STATE_SQL: &str = "INSERT INTO user_state(user_id, accelerometer, temperature, updated_at)
     VALUES ($1, $2, $3, $4)
     ON CONFLICT (user_id) DO UPDATE
     SET accelerometer = EXCLUDED.accelerometer,
         temperature = EXCLUDED.temperature,
         updated_at = EXCLUDED.updated_at";

/// State store keeping one row per user in the `user_state` table
///
/// The connection is opened lazily and replaced on the next call once the
/// server side has closed it.
pub struct PostgresStateStore {
    database_url: String,
    client: Mutex<Option<Arc<Client>>>,
}

impl PostgresStateStore {
    /// Create a store without connecting yet
    pub fn new(database_url: impl Into<String>) -> Self {
        PostgresStateStore {
            database_url: database_url.into(),
            client: Mutex::new(None),
        }
    }

    /// Connect to the database and make sure the state table exists
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string, optionally with `sslrootcert`
    pub async fn connect(database_url: &str) -> Result<Self, ProcessError> {
        let store = Self::new(database_url);
        store.client().await?;
        Ok(store)
    }

    /// Return the live client, reconnecting if the previous connection ended
    async fn client(&self) -> Result<Arc<Client>, ProcessError> {
        let mut slot = self.client.lock().await;

        if let Some(client) = slot.as_ref() {
            if !client.is_closed() {
                return Ok(Arc::clone(client));
            }
            warn!("State database connection closed, reconnecting");
            *slot = None;
        }

        let client = connect(&self.database_url).await?;
        client.batch_execute(CREATE_TABLE_SQL).await?;
        info!("State table ready");

        let client = Arc::new(client);
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }
}

impl StateStore for PostgresStateStore {
    async fn get(&self, user_id: &str) -> Result<Option<UserState>, ProcessError> {
        let client = self.client().await?;
        let row = client.query_opt(SELECT_STATE_SQL, &[&user_id]).await?;

        Ok(row.map(|row| UserState {
            accelerometer: row.get(0),
            temperature: row.get(1),
        }))
    }

    async fn put(&self, user_id: &str, state: UserState) -> Result<(), ProcessError> {
        // Stamp the row so retention can be handled outside the service
        let updated_at = OffsetDateTime::now_utc();
        let client = self.client().await?;
        client
            .execute(
                UPSERT_STATE_SQL,
                &[
                    &user_id,
                    &state.accelerometer,
                    &state.temperature,
                    &updated_at,
                ],
            )
            .await?;
        Ok(())
    }
}
