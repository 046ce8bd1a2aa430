use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::utils::time::bson_datetime_as_chrono;

/// Shop item stored in MongoDB "shop_items" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopItem {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    pub price_coins: i64,
    #[serde(default = "default_stock")]
    pub stock: i64,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_stock() -> i64 {
    999
}

fn default_category() -> String {
    "General".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ShopItemView {
    pub id: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub price_coins: i64,
    pub stock: i64,
    pub category: String,
}

impl From<ShopItem> for ShopItemView {
    fn from(item: ShopItem) -> Self {
        ShopItemView {
            id: item.id.to_hex(),
            title: item.title,
            description: item.description,
            image_url: item.image_url,
            price_coins: item.price_coins,
            stock: item.stock,
            category: item.category,
        }
    }
}

/// Order stored in MongoDB "orders" collection, items embedded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub student_id: ObjectId,
    pub total_coins: i64,
    pub items: Vec<OrderItem>,
    #[serde(rename = "createdAt", with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub shop_item_id: ObjectId,
    pub title: String,
    pub qty: i64,
    /// Price at the moment of purchase
    pub price_coins: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: String,
    pub total_coins: i64,
    pub items: Vec<OrderItemView>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct OrderItemView {
    pub shop_item_id: String,
    pub title: String,
    pub qty: i64,
    pub price_coins: i64,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        OrderView {
            id: order.id.to_hex(),
            total_coins: order.total_coins,
            items: order
                .items
                .into_iter()
                .map(|item| OrderItemView {
                    shop_item_id: item.shop_item_id.to_hex(),
                    title: item.title,
                    qty: item.qty,
                    price_coins: item.price_coins,
                })
                .collect(),
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub item_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub success: bool,
    pub new_balance: i64,
    pub order_id: String,
}
