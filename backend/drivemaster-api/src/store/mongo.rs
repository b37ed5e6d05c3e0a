use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, to_bson, to_document, Document};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};

use super::{AttemptFilter, ContentStore, ProgressStore};
use crate::error::StoreResult;
use crate::metrics::track_db_operation;
use crate::models::content::{Journey, Question};
use crate::models::game::JourneyAttempt;
use crate::models::profile::{average_score, JourneyStats, ProfilePatch, UserProfile};
use crate::models::Stage;

const JOURNEYS_COLLECTION: &str = "drivemaster_journeys";
const QUESTIONS_COLLECTION: &str = "drivemaster_questions";
const USERS_COLLECTION: &str = "drivemaster_users";
const ATTEMPTS_COLLECTION: &str = "drivemaster_attempts";

/// MongoDB-backed content and progress store.
///
/// Counter, credit, badge and stage updates are single conditional update
/// documents (`$inc`, `$push` guarded by `$ne`), so concurrent finalizations
/// for the same user cannot lose increments or duplicate awards.
#[derive(Clone)]
pub struct MongoStore {
    mongo: Database,
}

impl MongoStore {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn journeys(&self) -> Collection<Journey> {
        self.mongo.collection(JOURNEYS_COLLECTION)
    }

    fn questions(&self) -> Collection<Question> {
        self.mongo.collection(QUESTIONS_COLLECTION)
    }

    fn users(&self) -> Collection<UserProfile> {
        self.mongo.collection(USERS_COLLECTION)
    }

    fn attempts(&self) -> Collection<JourneyAttempt> {
        self.mongo.collection(ATTEMPTS_COLLECTION)
    }

    async fn find_one_and_update_user(
        &self,
        user_id: &str,
        update: impl Into<mongodb::options::UpdateModifications> + Send,
    ) -> StoreResult<Option<UserProfile>> {
        let updated = track_db_operation("find_one_and_update", USERS_COLLECTION, async {
            self.users()
                .find_one_and_update(doc! { "_id": user_id }, update)
                .return_document(ReturnDocument::After)
                .await
        })
        .await?;
        Ok(updated)
    }

    /// Clears a stale bankruptcy flag once the balance is positive again.
    async fn settle_bankruptcy(&self, profile: &mut UserProfile) -> StoreResult<()> {
        if !profile.is_bankrupt || profile.credits <= 0 {
            return Ok(());
        }
        track_db_operation("update_one", USERS_COLLECTION, async {
            self.users()
                .update_one(
                    doc! { "_id": profile.user_id.as_str(), "credits": { "$gt": 0_i64 } },
                    doc! { "$set": { "is_bankrupt": false } },
                )
                .await
        })
        .await?;
        profile.is_bankrupt = false;
        Ok(())
    }
}

/// `$inc` fields booking a credit delta as earned or spent.
fn credit_increments(delta: i64) -> Document {
    doc! {
        "credits": delta,
        "total_credits_earned": delta.max(0),
        "total_credits_spent": (-delta).max(0),
    }
}

#[async_trait]
impl ContentStore for MongoStore {
    async fn get_journey(&self, journey_id: &str) -> StoreResult<Option<Journey>> {
        let journey = track_db_operation("find_one", JOURNEYS_COLLECTION, async {
            self.journeys().find_one(doc! { "_id": journey_id }).await
        })
        .await?;
        Ok(journey)
    }

    async fn journeys_by_stage(&self, stage: Stage) -> StoreResult<Vec<Journey>> {
        let journeys = track_db_operation("find", JOURNEYS_COLLECTION, async {
            let cursor = self
                .journeys()
                .find(doc! { "stage": stage.as_str(), "is_published": true })
                .sort(doc! { "_id": 1 })
                .await?;
            cursor.try_collect::<Vec<Journey>>().await
        })
        .await?;
        Ok(journeys)
    }

    async fn get_question(&self, question_id: &str) -> StoreResult<Option<Question>> {
        let question = track_db_operation("find_one", QUESTIONS_COLLECTION, async {
            self.questions().find_one(doc! { "_id": question_id }).await
        })
        .await?;
        Ok(question)
    }

    async fn questions_by_stage(&self, stage: Stage) -> StoreResult<Vec<Question>> {
        let questions = track_db_operation("find", QUESTIONS_COLLECTION, async {
            let cursor = self
                .questions()
                .find(doc! { "stage": stage.as_str(), "is_active": true })
                .sort(doc! { "_id": 1 })
                .await?;
            cursor.try_collect::<Vec<Question>>().await
        })
        .await?;
        Ok(questions)
    }
}

#[async_trait]
impl ProgressStore for MongoStore {
    async fn get_profile(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        let profile = track_db_operation("find_one", USERS_COLLECTION, async {
            self.users().find_one(doc! { "_id": user_id }).await
        })
        .await?;
        Ok(profile)
    }

    async fn update_profile(&self, user_id: &str, patch: &ProfilePatch) -> StoreResult<bool> {
        let mut set = to_document(patch)?;
        set.insert("updated_at", to_bson(&Utc::now())?);

        let result = track_db_operation("update_one", USERS_COLLECTION, async {
            self.users()
                .update_one(doc! { "_id": user_id }, doc! { "$set": set })
                .await
        })
        .await?;

        Ok(result.matched_count == 1)
    }

    async fn apply_journey_stats(
        &self,
        user_id: &str,
        stats: &JourneyStats,
    ) -> StoreResult<Option<UserProfile>> {
        let mut increments = doc! {
            "total_journeys_completed": 1_i64,
            "total_questions_answered": i64::from(stats.questions),
            "total_correct_answers": i64::from(stats.correct),
            "total_incorrect_answers": i64::from(stats.incorrect),
            "perfect_journeys": if stats.perfect { 1_i64 } else { 0_i64 },
        };
        increments.extend(credit_increments(stats.credits));
        let update = doc! {
            "$inc": increments,
            "$set": { "updated_at": to_bson(&Utc::now())? },
        };

        let Some(mut profile) = self.find_one_and_update_user(user_id, update).await? else {
            return Ok(None);
        };

        // Derived from the post-increment totals; a concurrent finalization
        // may overwrite it with an equally current value.
        let average = average_score(
            profile.total_correct_answers,
            profile.total_questions_answered,
        );
        track_db_operation("update_one", USERS_COLLECTION, async {
            self.users()
                .update_one(
                    doc! { "_id": user_id },
                    doc! { "$set": { "average_score": average } },
                )
                .await
        })
        .await?;
        profile.average_score = average;
        self.settle_bankruptcy(&mut profile).await?;

        Ok(Some(profile))
    }

    async fn adjust_credits(&self, user_id: &str, delta: i64) -> StoreResult<Option<i64>> {
        let update = doc! {
            "$inc": credit_increments(delta),
            "$set": { "updated_at": to_bson(&Utc::now())? },
        };

        let Some(mut profile) = self.find_one_and_update_user(user_id, update).await? else {
            return Ok(None);
        };
        self.settle_bankruptcy(&mut profile).await?;
        Ok(Some(profile.credits))
    }

    async fn deduct_credits(&self, user_id: &str, amount: i64) -> StoreResult<Option<i64>> {
        let amount = amount.max(0);
        let balance = doc! { "$ifNull": ["$credits", 0_i64] };
        let deducted = doc! { "$min": [amount, { "$max": [0_i64, balance.clone()] }] };
        // Pipeline update: the floor is evaluated against the stored balance
        // inside the same write.
        let pipeline = vec![doc! {
            "$set": {
                "credits": { "$subtract": [balance, deducted.clone()] },
                "total_credits_spent": {
                    "$add": [{ "$ifNull": ["$total_credits_spent", 0_i64] }, deducted],
                },
                "updated_at": to_bson(&Utc::now())?,
            }
        }];

        let updated = self.find_one_and_update_user(user_id, pipeline).await?;
        Ok(updated.map(|profile| profile.credits))
    }

    async fn mark_bankrupt(&self, user_id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let at = to_bson(&at)?;

        let result = track_db_operation("update_one", USERS_COLLECTION, async {
            self.users()
                .update_one(
                    doc! { "_id": user_id, "is_bankrupt": { "$ne": true } },
                    doc! {
                        "$set": {
                            "is_bankrupt": true,
                            "last_bankruptcy_date": at.clone(),
                            "updated_at": at,
                        },
                        "$inc": { "bankruptcy_count": 1_i64 },
                    },
                )
                .await
        })
        .await?;

        Ok(result.modified_count == 1)
    }

    async fn recover_from_bankruptcy(
        &self,
        user_id: &str,
        credits: i64,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let day_start = to_bson(&at.date_naive().and_time(NaiveTime::MIN).and_utc())?;
        let at = to_bson(&at)?;
        let filter = doc! {
            "_id": user_id,
            "credits": { "$lte": 0_i64 },
            "$or": [
                { "last_bankruptcy_recovery_date": null },
                { "last_bankruptcy_recovery_date": { "$lt": day_start } },
            ],
        };

        let result = track_db_operation("update_one", USERS_COLLECTION, async {
            self.users()
                .update_one(
                    filter,
                    doc! {
                        "$set": {
                            "credits": credits,
                            "is_bankrupt": false,
                            "last_bankruptcy_recovery_date": at.clone(),
                            "updated_at": at,
                        },
                        "$inc": { "total_bankruptcy_recoveries": 1_i64 },
                    },
                )
                .await
        })
        .await?;

        Ok(result.modified_count == 1)
    }

    async fn award_badge(
        &self,
        user_id: &str,
        badge_id: &str,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let at = to_bson(&at)?;
        let mut set = Document::new();
        set.insert(format!("badge_earned_at.{}", badge_id), at.clone());
        set.insert("updated_at", at);

        let result = track_db_operation("update_one", USERS_COLLECTION, async {
            self.users()
                .update_one(
                    doc! { "_id": user_id, "badges": { "$ne": badge_id } },
                    doc! { "$push": { "badges": badge_id }, "$set": set },
                )
                .await
        })
        .await?;

        Ok(result.modified_count == 1)
    }

    async fn unlock_stage(
        &self,
        user_id: &str,
        unlocked: Stage,
        mastered: Stage,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let at = to_bson(&at)?;
        let mut set = Document::new();
        set.insert(format!("mastery_dates.{}", mastered.as_str()), at.clone());
        set.insert("updated_at", at);

        let result = track_db_operation("update_one", USERS_COLLECTION, async {
            self.users()
                .update_one(
                    doc! { "_id": user_id, "unlocked_stages": { "$ne": unlocked.as_str() } },
                    doc! { "$push": { "unlocked_stages": unlocked.as_str() }, "$set": set },
                )
                .await
        })
        .await?;

        Ok(result.modified_count == 1)
    }

    async fn append_attempt(&self, attempt: &JourneyAttempt) -> StoreResult<String> {
        track_db_operation("insert_one", ATTEMPTS_COLLECTION, async {
            self.attempts().insert_one(attempt).await
        })
        .await?;

        tracing::info!(
            "Journey attempt saved: id={}, user={}, journey={}",
            attempt.id,
            attempt.user_id,
            attempt.journey_id
        );
        Ok(attempt.id.clone())
    }

    async fn query_attempts(
        &self,
        user_id: &str,
        filter: &AttemptFilter,
    ) -> StoreResult<Vec<JourneyAttempt>> {
        let mut query = doc! { "user_id": user_id };
        if let Some(journey_id) = &filter.journey_id {
            query.insert("journey_id", journey_id.as_str());
        }
        if let Some(stage) = filter.stage {
            query.insert("stage", stage.as_str());
        }

        let attempts = track_db_operation("find", ATTEMPTS_COLLECTION, async {
            let cursor = self
                .attempts()
                .find(query)
                .sort(doc! { "attempt_number": 1 })
                .await?;
            cursor.try_collect::<Vec<JourneyAttempt>>().await
        })
        .await?;
        Ok(attempts)
    }
}
