use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::authz::Role;
use crate::utils::time::bson_datetime_as_chrono;

/// User model stored in MongoDB "users" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    /// Spendable shop currency, never negative
    #[serde(default)]
    pub coins: i64,
    /// Lifetime points, only ever increases
    #[serde(default)]
    pub points: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_wpm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub group_ids: Vec<ObjectId>,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WalletResponse {
    pub user_id: String,
    pub username: String,
    pub coins: i64,
    pub points: i64,
    pub last_wpm: Option<f64>,
}

impl From<User> for WalletResponse {
    fn from(user: User) -> Self {
        WalletResponse {
            user_id: user.id.to_hex(),
            username: user.username,
            coins: user.coins,
            points: user.points,
            last_wpm: user.last_wpm,
        }
    }
}
