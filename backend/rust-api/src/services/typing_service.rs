use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    options::FindOptions,
    Collection, Database,
};

use super::{
    begin_transaction, finish_transaction, season_service::SeasonService,
    wallet_service::WalletService, ServiceError, ServiceResult,
};
use crate::metrics::TYPING_ATTEMPTS_TOTAL;
use crate::models::typing::{
    SubmitTypingRequest, SubmitTypingResponse, TypingAttempt, TypingAttemptView,
};

/// (min wpm, min accuracy, coins); the first tier a run qualifies for wins.
const REWARD_TIERS: &[(f64, f64, i64)] = &[(60.0, 95.0, 10), (40.0, 90.0, 5)];

const HISTORY_LIMIT: i64 = 50;

pub struct TypingService {
    mongo: Database,
    seasons: SeasonService,
}

impl TypingService {
    pub fn new(mongo: Database, seasons: SeasonService) -> Self {
        Self { mongo, seasons }
    }

    fn attempts(&self) -> Collection<TypingAttempt> {
        self.mongo.collection("typing_attempts")
    }

    /// Records an attempt against the active season and credits its reward in
    /// the same transaction.
    pub async fn submit(
        &self,
        student_id: &ObjectId,
        req: &SubmitTypingRequest,
    ) -> ServiceResult<SubmitTypingResponse> {
        validate_metrics(req.wpm, req.accuracy)?;

        let score = compute_score(req.wpm, req.accuracy);
        let reward = compute_reward(req.wpm, req.accuracy);
        let season = self.seasons.find_active().await?;

        let attempt = TypingAttempt {
            id: ObjectId::new(),
            student_id: *student_id,
            season_id: season.as_ref().map(|s| s.id),
            wpm: req.wpm,
            accuracy: req.accuracy,
            score,
            coins_reward: reward,
            created_at: Utc::now(),
        };

        let wallet = WalletService::new(self.mongo.clone());
        let mut session = begin_transaction(&self.mongo).await?;
        let result: ServiceResult<i64> = async {
            let user = wallet
                .credit(&mut session, student_id, reward, 0, "typing")
                .await?
                .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;

            self.mongo
                .collection::<mongodb::bson::Document>("users")
                .update_one(
                    doc! { "_id": student_id },
                    doc! { "$set": { "last_wpm": req.wpm } },
                )
                .session(&mut session)
                .await?;

            self.attempts()
                .insert_one(&attempt)
                .session(&mut session)
                .await?;

            Ok(user.coins)
        }
        .await;
        let new_balance = finish_transaction(&mut session, result).await?;

        TYPING_ATTEMPTS_TOTAL
            .with_label_values(&[if reward > 0 { "true" } else { "false" }])
            .inc();
        tracing::info!(
            student_id = %student_id,
            attempt_id = %attempt.id,
            season_id = ?attempt.season_id,
            score,
            reward,
            "Typing attempt recorded"
        );

        Ok(SubmitTypingResponse {
            attempt: attempt.into(),
            coins_awarded: reward,
            new_balance,
        })
    }

    pub async fn list_mine(&self, student_id: &ObjectId) -> ServiceResult<Vec<TypingAttemptView>> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .limit(HISTORY_LIMIT)
            .build();
        let mut cursor = self
            .attempts()
            .find(doc! { "student_id": student_id })
            .with_options(options)
            .await?;

        let mut attempts = Vec::new();
        while let Some(attempt) = cursor.try_next().await? {
            attempts.push(attempt.into());
        }
        Ok(attempts)
    }
}

pub fn validate_metrics(wpm: f64, accuracy: f64) -> ServiceResult<()> {
    if !wpm.is_finite() || wpm < 0.0 {
        return Err(ServiceError::Validation(
            "wpm must be a non-negative number".to_string(),
        ));
    }
    if !accuracy.is_finite() || !(0.0..=100.0).contains(&accuracy) {
        return Err(ServiceError::Validation(
            "accuracy must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

/// Speed weighted by accuracy, rounded to 2 decimals with ties to even:
/// 80 wpm at 95% scores 76.0, 12.5 wpm at 1% scores 0.12.
pub fn compute_score(wpm: f64, accuracy: f64) -> f64 {
    ((wpm * (accuracy / 100.0)) * 100.0).round_ties_even() / 100.0
}

pub fn compute_reward(wpm: f64, accuracy: f64) -> i64 {
    REWARD_TIERS
        .iter()
        .find(|(min_wpm, min_accuracy, _)| wpm >= *min_wpm && accuracy >= *min_accuracy)
        .map(|(_, _, coins)| *coins)
        .unwrap_or(0)
}
