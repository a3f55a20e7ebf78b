//! User profile repository.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use tracing::info;

use massclip_models::{ConnectStatusSnapshot, UserProfile};

use crate::codec::{decode, encode};
use crate::collections::{DAILY_STATS, USERS};
use crate::error::FirestoreResult;
use crate::store::SharedStore;
use crate::types::{to_value, ToFirestoreValue, Value, Write};

/// Repository for `users/{uid}`.
#[derive(Clone)]
pub struct UserRepository {
    store: SharedStore,
}

impl UserRepository {
    pub fn new(store: SharedStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, uid: &str) -> FirestoreResult<Option<UserProfile>> {
        match self.store.get(USERS, uid).await? {
            Some(doc) => Ok(Some(decode(&doc, "uid")?)),
            None => Ok(None),
        }
    }

    pub async fn create(&self, user: &UserProfile) -> FirestoreResult<()> {
        let fields = encode(user, &["uid"])?;
        self.store.create(USERS, &user.uid, fields).await?;
        info!(uid = %user.uid, "Created user profile");
        Ok(())
    }

    /// Fetch a profile, creating an empty one on first sight.
    pub async fn get_or_create(&self, uid: &str, email: Option<&str>) -> FirestoreResult<UserProfile> {
        if let Some(user) = self.get(uid).await? {
            return Ok(user);
        }
        let user = UserProfile::new(uid, email.map(str::to_string));
        match self.create(&user).await {
            Ok(()) => Ok(user),
            // Lost a race with a concurrent first request.
            Err(e) if e.is_precondition_failed() => {
                Ok(self.get(uid).await?.unwrap_or(user))
            }
            Err(e) => Err(e),
        }
    }

    async fn set_fields(&self, uid: &str, mut fields: HashMap<String, Value>) -> FirestoreResult<()> {
        fields.insert("updatedAt".to_string(), Utc::now().to_firestore_value());
        let mask = fields.keys().cloned().collect();
        self.store.update(USERS, uid, fields, Some(mask)).await
    }

    pub async fn set_stripe_account(&self, uid: &str, account_id: &str) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("stripeAccountId".to_string(), account_id.to_firestore_value());
        self.set_fields(uid, fields).await?;
        info!(uid = %uid, account_id = %account_id, "Linked payout account");
        Ok(())
    }

    /// Replace the cached payout status.
    pub async fn set_stripe_status(
        &self,
        uid: &str,
        snapshot: &ConnectStatusSnapshot,
    ) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("stripeStatus".to_string(), to_value(snapshot)?);
        self.set_fields(uid, fields).await
    }

    /// Drop the cached payout status so the next read goes live.
    pub async fn clear_stripe_status(&self, uid: &str) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("stripeStatus".to_string(), Value::NullValue(()));
        self.set_fields(uid, fields).await
    }

    pub async fn set_profile_pic(&self, uid: &str, url: &str) -> FirestoreResult<()> {
        let mut fields = HashMap::new();
        fields.insert("profilePic".to_string(), url.to_firestore_value());
        self.set_fields(uid, fields).await
    }

    /// Count a profile view on the profile and in that day's stats.
    ///
    /// Fails with `NotFound` when the profile does not exist.
    pub async fn record_profile_view(&self, uid: &str, day: NaiveDate) -> FirestoreResult<()> {
        let stats_collection = format!("{}/{}/{}", USERS, uid, DAILY_STATS);
        let day_id = day.format("%Y-%m-%d").to_string();

        let mut stats = HashMap::new();
        stats.insert("date".to_string(), day_id.to_firestore_value());

        let writes = vec![
            Write::update(self.store.document_name(USERS, uid), HashMap::new())
                .increment("profileViews", 1i64.to_firestore_value()),
            Write::upsert(self.store.document_name(&stats_collection, &day_id), stats)
                .increment("views", 1i64.to_firestore_value()),
        ];
        self.store.commit(writes).await
    }
}
