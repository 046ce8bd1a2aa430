use mongodb::{
    bson::{doc, oid::ObjectId},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    ClientSession, Collection, Database,
};

use super::{ServiceError, ServiceResult};
use crate::metrics::{record_coins_credited, record_coins_debited};
use crate::models::user::{User, WalletResponse};

/// Balance mutations. Every update targets a single user document, so the
/// conditional `$inc` is atomic without cross-user locking.
pub struct WalletService {
    mongo: Database,
}

impl WalletService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn users(&self) -> Collection<User> {
        self.mongo.collection("users")
    }

    pub async fn get_user(&self, user_id: &ObjectId) -> ServiceResult<User> {
        self.users()
            .find_one(doc! { "_id": user_id })
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    pub async fn balance(&self, user_id: &ObjectId) -> ServiceResult<WalletResponse> {
        Ok(self.get_user(user_id).await?.into())
    }

    /// Adds `coins` (and lifetime `points`) inside the caller's transaction.
    /// Returns `None` when the user does not exist.
    pub async fn credit(
        &self,
        session: &mut ClientSession,
        user_id: &ObjectId,
        coins: i64,
        points: i64,
        source: &str,
    ) -> ServiceResult<Option<User>> {
        if coins < 0 || points < 0 {
            return Err(ServiceError::Validation(
                "Credit amount must not be negative".to_string(),
            ));
        }

        let updated = self
            .users()
            .find_one_and_update(
                doc! { "_id": user_id },
                doc! { "$inc": { "coins": coins, "points": points } },
            )
            .with_options(after_update())
            .session(&mut *session)
            .await?;

        match &updated {
            Some(user) => {
                record_coins_credited(source, coins);
                tracing::info!(
                    user_id = %user_id,
                    coins,
                    points,
                    source,
                    new_balance = user.coins,
                    "Balance credited"
                );
            }
            None => tracing::warn!(user_id = %user_id, source, "Credit skipped: unknown user"),
        }

        Ok(updated)
    }

    /// Removes `amount` coins only if the balance covers it.
    pub async fn debit(
        &self,
        session: &mut ClientSession,
        user_id: &ObjectId,
        amount: i64,
        source: &str,
    ) -> ServiceResult<User> {
        if amount < 0 {
            return Err(ServiceError::Validation(
                "Debit amount must not be negative".to_string(),
            ));
        }

        let updated = self
            .users()
            .find_one_and_update(
                doc! { "_id": user_id, "coins": { "$gte": amount } },
                doc! { "$inc": { "coins": -amount } },
            )
            .with_options(after_update())
            .session(&mut *session)
            .await?;

        match updated {
            Some(user) => {
                record_coins_debited(source, amount);
                tracing::info!(
                    user_id = %user_id,
                    amount,
                    source,
                    new_balance = user.coins,
                    "Balance debited"
                );
                Ok(user)
            }
            None => {
                // Either the user is gone or the balance moved below the price since the pre-check
                let user = self
                    .users()
                    .find_one(doc! { "_id": user_id })
                    .session(&mut *session)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
                Err(ServiceError::InsufficientFunds {
                    balance: user.coins,
                    price: amount,
                })
            }
        }
    }
}

fn after_update() -> FindOneAndUpdateOptions {
    FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build()
}

/// Pre-check before any debit: the balance may never go negative.
pub fn check_affordable(balance: i64, price: i64) -> ServiceResult<()> {
    if price < 0 {
        return Err(ServiceError::Validation(
            "Price must not be negative".to_string(),
        ));
    }
    if balance < price {
        return Err(ServiceError::InsufficientFunds { balance, price });
    }
    Ok(())
}
