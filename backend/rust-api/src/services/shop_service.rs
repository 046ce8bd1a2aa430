use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId},
    options::FindOptions,
    Collection, Database,
};

use super::{
    begin_transaction, finish_transaction,
    wallet_service::{check_affordable, WalletService},
    ServiceError, ServiceResult,
};
use crate::metrics::PURCHASES_TOTAL;
use crate::models::shop::{Order, OrderItem, OrderView, PurchaseResponse, ShopItem, ShopItemView};

pub struct ShopService {
    mongo: Database,
}

impl ShopService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    fn items(&self) -> Collection<ShopItem> {
        self.mongo.collection("shop_items")
    }

    fn orders(&self) -> Collection<Order> {
        self.mongo.collection("orders")
    }

    pub async fn list_items(&self) -> ServiceResult<Vec<ShopItemView>> {
        let options = FindOptions::builder()
            .sort(doc! { "category": 1, "price_coins": 1 })
            .build();
        let mut cursor = self
            .items()
            .find(doc! { "is_active": true })
            .with_options(options)
            .await?;

        let mut items = Vec::new();
        while let Some(item) = cursor.try_next().await? {
            items.push(item.into());
        }
        Ok(items)
    }

    pub async fn list_orders(&self, student_id: &ObjectId) -> ServiceResult<Vec<OrderView>> {
        let options = FindOptions::builder().sort(doc! { "createdAt": -1 }).build();
        let mut cursor = self
            .orders()
            .find(doc! { "student_id": student_id })
            .with_options(options)
            .await?;

        let mut orders = Vec::new();
        while let Some(order) = cursor.try_next().await? {
            orders.push(order.into());
        }
        Ok(orders)
    }

    /// Buys one unit of an item. The debit, the stock decrement and the order
    /// are written together or not at all.
    pub async fn purchase(
        &self,
        student_id: &ObjectId,
        item_id: &ObjectId,
    ) -> ServiceResult<PurchaseResponse> {
        let result = self.purchase_inner(student_id, item_id).await;
        let status = match &result {
            Ok(_) => "success",
            Err(ServiceError::InsufficientFunds { .. }) => "insufficient_funds",
            Err(ServiceError::OutOfStock) => "out_of_stock",
            Err(ServiceError::NotFound(_)) => "not_found",
            Err(_) => "error",
        };
        PURCHASES_TOTAL.with_label_values(&[status]).inc();
        result
    }

    async fn purchase_inner(
        &self,
        student_id: &ObjectId,
        item_id: &ObjectId,
    ) -> ServiceResult<PurchaseResponse> {
        let item = self
            .items()
            .find_one(doc! { "_id": item_id, "is_active": true })
            .await?
            .ok_or_else(|| ServiceError::NotFound("Item not found".to_string()))?;
        if item.stock <= 0 {
            return Err(ServiceError::OutOfStock);
        }

        let wallet = WalletService::new(self.mongo.clone());
        let student = wallet.get_user(student_id).await?;
        check_affordable(student.coins, item.price_coins)?;

        let order = Order {
            id: ObjectId::new(),
            student_id: *student_id,
            total_coins: item.price_coins,
            items: vec![OrderItem {
                shop_item_id: item.id,
                title: item.title.clone(),
                qty: 1,
                price_coins: item.price_coins,
            }],
            created_at: Utc::now(),
        };

        let mut session = begin_transaction(&self.mongo).await?;
        let result: ServiceResult<i64> = async {
            let user = wallet
                .debit(&mut session, student_id, item.price_coins, "shop")
                .await?;

            let stock = self
                .items()
                .update_one(
                    doc! { "_id": item.id, "stock": { "$gt": 0 } },
                    doc! { "$inc": { "stock": -1 } },
                )
                .session(&mut session)
                .await?;
            if stock.modified_count == 0 {
                return Err(ServiceError::OutOfStock);
            }

            self.orders()
                .insert_one(&order)
                .session(&mut session)
                .await?;

            Ok(user.coins)
        }
        .await;
        let new_balance = finish_transaction(&mut session, result).await?;

        tracing::info!(
            student_id = %student_id,
            item_id = %item.id,
            order_id = %order.id,
            price = item.price_coins,
            new_balance,
            "Shop purchase completed"
        );

        Ok(PurchaseResponse {
            success: true,
            new_balance,
            order_id: order.id.to_hex(),
        })
    }
}
