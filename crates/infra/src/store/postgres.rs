//! Postgres-backed marketplace store.
//!
//! Every transaction runs at `SERIALIZABLE` isolation and locks the rows it
//! selects for update (`FOR UPDATE`), so two checkouts against the same
//! listing cannot both pass the stock check and pick overlapping scans.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL code | StoreError | Scenario |
//! |------------|-----------------|------------|----------|
//! | Database | `40001` | `Conflict` | serialization failure |
//! | Database | `40P01` | `Conflict` | deadlock detected |
//! | Database | `23505` | `Conflict` | unique key (listing per seller+grade, payment ref, scan already ordered) |
//! | Database | other | `Query` | constraint or statement failure |
//! | PoolClosed / PoolTimedOut / Io / Tls | N/A | `Unavailable` | connectivity |
//! | ColumnDecode / Decode | N/A | `Decode` | row does not map onto a domain type |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use eggmart_core::{AggregateRoot, ExpectedVersion, ListingId, OrderId, ScanId, UserId};
use eggmart_grading::{Cleanliness, Grade, Integrity, Labeled, ShellColor};
use eggmart_listings::{Listing, ListingParts};
use eggmart_orders::{Order, OrderItem, OrderParts};
use eggmart_scans::{ScanParts, ScanRecord, ScanStatus};

use super::r#trait::{GradeCount, MarketStore, MarketTx, StoreError};

const SCHEMA: &str = include_str!("schema.sql");

const SCAN_COLUMNS: &str = "id, owner_id, captured_at, image_ref, color, color_confidence, \
    integrity, integrity_confidence, cleanliness, cleanliness_confidence, weight_category, \
    freshness, grade, confidence, status, listed_price, listed_at, sold_at, version";

const LISTING_COLUMNS: &str =
    "id, seller_id, grade, stock, unit_price, status, created_at, updated_at, version";

const ORDER_COLUMNS: &str = "id, payment_ref, buyer_id, seller_id, listing_id, grade, quantity, \
    unit_price, total_amount, payment_token, status, created_at, updated_at, version";

/// Postgres-backed marketplace store.
///
/// Uses the SQLx connection pool, which is `Send + Sync` and cheap to clone.
#[derive(Debug, Clone)]
pub struct PostgresMarketStore {
    pool: PgPool,
}

impl PostgresMarketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl MarketStore for PostgresMarketStore {
    async fn begin(&self) -> Result<Box<dyn MarketTx>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_isolation", e))?;

        Ok(Box::new(PgMarketTx { tx }))
    }
}

struct PgMarketTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl MarketTx for PgMarketTx {
    #[instrument(skip(self, scan), fields(scan_id = %scan.id_typed()), err)]
    async fn insert_scan(&mut self, scan: &ScanRecord) -> Result<(), StoreError> {
        let (color, color_conf) = split_label(scan.color(), ShellColor::as_str);
        let (integrity, integrity_conf) = split_label(scan.integrity(), Integrity::as_str);
        let (cleanliness, cleanliness_conf) = split_label(scan.cleanliness(), Cleanliness::as_str);

        sqlx::query(&format!(
            "INSERT INTO scan_records ({SCAN_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)"
        ))
        .bind(scan.id_typed().as_uuid())
        .bind(scan.owner_id().as_uuid())
        .bind(scan.captured_at())
        .bind(scan.image_ref())
        .bind(color)
        .bind(color_conf)
        .bind(integrity)
        .bind(integrity_conf)
        .bind(cleanliness)
        .bind(cleanliness_conf)
        .bind(scan.weight().map(|w| w.as_str()))
        .bind(scan.freshness().as_str())
        .bind(scan.grade().as_str())
        .bind(scan.confidence())
        .bind(scan.status().as_str())
        .bind(scan.listed_price().map(to_i64).transpose()?)
        .bind(scan.listed_at())
        .bind(scan.sold_at())
        .bind(to_i64(scan.version())?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_scan", e))?;
        Ok(())
    }

    async fn get_scan(&mut self, id: ScanId) -> Result<Option<ScanRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {SCAN_COLUMNS} FROM scan_records WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("get_scan", e))?;

        row.as_ref().map(scan_from_row).transpose()
    }

    #[instrument(skip(self, scan), fields(scan_id = %scan.id_typed(), status = %scan.status()), err)]
    async fn update_scan(
        &mut self,
        scan: &ScanRecord,
        expected: ExpectedVersion,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE scan_records
            SET status = $2, listed_price = $3, listed_at = $4, sold_at = $5, version = $6
            WHERE id = $1 AND ($7::BIGINT IS NULL OR version = $7)
            "#,
        )
        .bind(scan.id_typed().as_uuid())
        .bind(scan.status().as_str())
        .bind(scan.listed_price().map(to_i64).transpose()?)
        .bind(scan.listed_at())
        .bind(scan.sold_at())
        .bind(to_i64(scan.version())?)
        .bind(expected_param(expected)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_scan", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn scans_for_owner(
        &mut self,
        owner_id: UserId,
        limit: u32,
    ) -> Result<Vec<ScanRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SCAN_COLUMNS} FROM scan_records WHERE owner_id = $1 \
             ORDER BY captured_at DESC, id DESC LIMIT $2"
        ))
        .bind(owner_id.as_uuid())
        .bind(i64::from(limit))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("scans_for_owner", e))?;

        rows.iter().map(scan_from_row).collect()
    }

    #[instrument(skip(self), fields(owner_id = %owner_id, grade = %grade), err)]
    async fn select_available(
        &mut self,
        owner_id: UserId,
        grade: Grade,
        limit: u32,
    ) -> Result<Vec<ScanRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SCAN_COLUMNS} FROM scan_records \
             WHERE owner_id = $1 AND grade = $2 AND status = 'available' \
             ORDER BY captured_at ASC, id ASC LIMIT $3 FOR UPDATE"
        ))
        .bind(owner_id.as_uuid())
        .bind(grade.as_str())
        .bind(i64::from(limit))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("select_available", e))?;

        rows.iter().map(scan_from_row).collect()
    }

    #[instrument(skip(self), fields(owner_id = %owner_id, grade = %grade), err)]
    async fn select_listed(
        &mut self,
        owner_id: UserId,
        grade: Grade,
        price: Option<u64>,
        limit: Option<u32>,
    ) -> Result<Vec<ScanRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {SCAN_COLUMNS} FROM scan_records \
             WHERE owner_id = $1 AND grade = $2 AND status = 'listed' \
               AND ($3::BIGINT IS NULL OR listed_price = $3) \
             ORDER BY listed_at ASC, captured_at ASC, id ASC LIMIT $4 FOR UPDATE"
        ))
        .bind(owner_id.as_uuid())
        .bind(grade.as_str())
        .bind(price.map(to_i64).transpose()?)
        .bind(limit.map(i64::from))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("select_listed", e))?;

        rows.iter().map(scan_from_row).collect()
    }

    async fn count_listed(
        &mut self,
        owner_id: UserId,
        grade: Grade,
        price: u64,
    ) -> Result<u32, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM scan_records
            WHERE owner_id = $1 AND grade = $2 AND status = 'listed' AND listed_price = $3
            "#,
        )
        .bind(owner_id.as_uuid())
        .bind(grade.as_str())
        .bind(to_i64(price)?)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("count_listed", e))?;

        to_u32(count)
    }

    async fn count_by_grade(
        &mut self,
        owner_id: UserId,
        status: Option<ScanStatus>,
    ) -> Result<Vec<GradeCount>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT grade, COUNT(*) AS n FROM scan_records
            WHERE owner_id = $1 AND ($2::TEXT IS NULL OR status = $2)
            GROUP BY grade
            ORDER BY grade
            "#,
        )
        .bind(owner_id.as_uuid())
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("count_by_grade", e))?;

        rows.iter()
            .map(|row| {
                Ok(GradeCount {
                    grade: parse_column(row, "grade")?,
                    count: to_u32(get(row, "n")?)?,
                })
            })
            .collect()
    }

    async fn get_listing(&mut self, id: ListingId) -> Result<Option<Listing>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("get_listing", e))?;

        row.as_ref().map(listing_from_row).transpose()
    }

    async fn find_listing(
        &mut self,
        seller_id: UserId,
        grade: Grade,
    ) -> Result<Option<Listing>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE seller_id = $1 AND grade = $2 FOR UPDATE"
        ))
        .bind(seller_id.as_uuid())
        .bind(grade.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_listing", e))?;

        row.as_ref().map(listing_from_row).transpose()
    }

    #[instrument(skip(self, listing), fields(listing_id = %listing.id_typed()), err)]
    async fn insert_listing(&mut self, listing: &Listing) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO listings ({LISTING_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(listing.id_typed().as_uuid())
        .bind(listing.seller_id().as_uuid())
        .bind(listing.grade().as_str())
        .bind(to_i32(listing.stock())?)
        .bind(to_i64(listing.unit_price())?)
        .bind(listing.status().as_str())
        .bind(listing.created_at())
        .bind(listing.updated_at())
        .bind(to_i64(listing.version())?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_listing", e))?;
        Ok(())
    }

    #[instrument(skip(self, listing), fields(listing_id = %listing.id_typed(), stock = listing.stock()), err)]
    async fn update_listing(
        &mut self,
        listing: &Listing,
        expected: ExpectedVersion,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE listings
            SET stock = $2, unit_price = $3, status = $4, updated_at = $5, version = $6
            WHERE id = $1 AND ($7::BIGINT IS NULL OR version = $7)
            "#,
        )
        .bind(listing.id_typed().as_uuid())
        .bind(to_i32(listing.stock())?)
        .bind(to_i64(listing.unit_price())?)
        .bind(listing.status().as_str())
        .bind(listing.updated_at())
        .bind(to_i64(listing.version())?)
        .bind(expected_param(expected)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_listing", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn listings_for_seller(&mut self, seller_id: UserId) -> Result<Vec<Listing>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE seller_id = $1 ORDER BY grade"
        ))
        .bind(seller_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("listings_for_seller", e))?;

        rows.iter().map(listing_from_row).collect()
    }

    async fn active_listings(&mut self) -> Result<Vec<Listing>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE status = 'active' ORDER BY seller_id, grade"
        ))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("active_listings", e))?;

        rows.iter().map(listing_from_row).collect()
    }

    #[instrument(skip(self, order, items), fields(payment_ref = %order.payment_ref(), items = items.len()), err)]
    async fn insert_order(&mut self, order: &Order, items: &[OrderItem]) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(order.id_typed().as_uuid())
        .bind(order.payment_ref())
        .bind(order.buyer_id().as_uuid())
        .bind(order.seller_id().as_uuid())
        .bind(order.listing_id().as_uuid())
        .bind(order.grade().as_str())
        .bind(to_i32(order.quantity())?)
        .bind(to_i64(order.unit_price())?)
        .bind(to_i64(order.total_amount())?)
        .bind(order.payment_token())
        .bind(order.status().as_str())
        .bind(order.created_at())
        .bind(order.updated_at())
        .bind(to_i64(order.version())?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        for item in items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, scan_id, unit_price, quantity)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(item.order_id.as_uuid())
            .bind(item.scan_id.as_uuid())
            .bind(to_i64(item.unit_price)?)
            .bind(to_i32(item.quantity)?)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_item", e))?;
        }
        Ok(())
    }

    async fn get_order(&mut self, payment_ref: &str) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE payment_ref = $1 FOR UPDATE"
        ))
        .bind(payment_ref)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("get_order", e))?;

        row.as_ref().map(order_from_row).transpose()
    }

    #[instrument(skip(self, order), fields(payment_ref = %order.payment_ref(), status = %order.status()), err)]
    async fn update_order(
        &mut self,
        order: &Order,
        expected: ExpectedVersion,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET payment_token = $2, status = $3, updated_at = $4, version = $5
            WHERE id = $1 AND ($6::BIGINT IS NULL OR version = $6)
            "#,
        )
        .bind(order.id_typed().as_uuid())
        .bind(order.payment_token())
        .bind(order.status().as_str())
        .bind(order.updated_at())
        .bind(to_i64(order.version())?)
        .bind(expected_param(expected)?)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_order", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn order_items(&mut self, order_id: OrderId) -> Result<Vec<OrderItem>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, order_id, scan_id, unit_price, quantity
            FROM order_items WHERE order_id = $1 ORDER BY id
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("order_items", e))?;

        rows.iter()
            .map(|row| {
                Ok(OrderItem {
                    id: get::<Uuid>(row, "id")?.into(),
                    order_id: get::<Uuid>(row, "order_id")?.into(),
                    scan_id: get::<Uuid>(row, "scan_id")?.into(),
                    unit_price: to_u64(get(row, "unit_price")?)?,
                    quantity: to_u32(i64::from(get::<i32>(row, "quantity")?))?,
                })
            })
            .collect()
    }

    async fn orders_for_buyer(&mut self, buyer_id: UserId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE buyer_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(buyer_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("orders_for_buyer", e))?;

        rows.iter().map(order_from_row).collect()
    }

    async fn pending_orders_before(
        &mut self,
        buyer_id: UserId,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE buyer_id = $1 AND status = 'pending' AND created_at <= $2 FOR UPDATE"
        ))
        .bind(buyer_id.as_uuid())
        .bind(cutoff)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("pending_orders_before", e))?;

        rows.iter().map(order_from_row).collect()
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

fn split_label<T>(
    labeled: Option<Labeled<T>>,
    text: fn(&T) -> &'static str,
) -> (Option<&'static str>, Option<f64>) {
    match labeled {
        Some(l) => (Some(text(&l.label)), Some(l.confidence)),
        None => (None, None),
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Decode(format!("{column}: {e}")))
}

fn parse_column<T>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    let raw: String = get(row, column)?;
    raw.parse()
        .map_err(|e| StoreError::Decode(format!("{column}: {e}")))
}

fn parse_optional<T>(row: &PgRow, column: &str) -> Result<Option<T>, StoreError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    let raw: Option<String> = get(row, column)?;
    raw.map(|v| v.parse().map_err(|e| StoreError::Decode(format!("{column}: {e}"))))
        .transpose()
}

fn labeled<T>(row: &PgRow, label: &str, confidence: &str) -> Result<Option<Labeled<T>>, StoreError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    let label: Option<T> = parse_optional(row, label)?;
    let confidence: Option<f64> = get(row, confidence)?;
    Ok(label.map(|l| Labeled::new(l, confidence.unwrap_or(0.0))))
}

fn scan_from_row(row: &PgRow) -> Result<ScanRecord, StoreError> {
    Ok(ScanRecord::restore(ScanParts {
        id: get::<Uuid>(row, "id")?.into(),
        owner_id: get::<Uuid>(row, "owner_id")?.into(),
        captured_at: get(row, "captured_at")?,
        image_ref: get(row, "image_ref")?,
        color: labeled(row, "color", "color_confidence")?,
        integrity: labeled(row, "integrity", "integrity_confidence")?,
        cleanliness: labeled(row, "cleanliness", "cleanliness_confidence")?,
        weight: parse_optional(row, "weight_category")?,
        freshness: parse_column(row, "freshness")?,
        grade: parse_column(row, "grade")?,
        confidence: get(row, "confidence")?,
        status: parse_column(row, "status")?,
        listed_price: get::<Option<i64>>(row, "listed_price")?.map(to_u64).transpose()?,
        listed_at: get(row, "listed_at")?,
        sold_at: get(row, "sold_at")?,
        version: to_u64(get(row, "version")?)?,
    }))
}

fn listing_from_row(row: &PgRow) -> Result<Listing, StoreError> {
    Ok(Listing::restore(ListingParts {
        id: get::<Uuid>(row, "id")?.into(),
        seller_id: get::<Uuid>(row, "seller_id")?.into(),
        grade: parse_column(row, "grade")?,
        stock: to_u32(i64::from(get::<i32>(row, "stock")?))?,
        unit_price: to_u64(get(row, "unit_price")?)?,
        status: parse_column(row, "status")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
        version: to_u64(get(row, "version")?)?,
    }))
}

fn order_from_row(row: &PgRow) -> Result<Order, StoreError> {
    Ok(Order::restore(OrderParts {
        id: get::<Uuid>(row, "id")?.into(),
        payment_ref: get(row, "payment_ref")?,
        buyer_id: get::<Uuid>(row, "buyer_id")?.into(),
        seller_id: get::<Uuid>(row, "seller_id")?.into(),
        listing_id: get::<Uuid>(row, "listing_id")?.into(),
        grade: parse_column(row, "grade")?,
        quantity: to_u32(i64::from(get::<i32>(row, "quantity")?))?,
        unit_price: to_u64(get(row, "unit_price")?)?,
        total_amount: to_u64(get(row, "total_amount")?)?,
        payment_token: get(row, "payment_token")?,
        status: parse_column(row, "status")?,
        created_at: get(row, "created_at")?,
        updated_at: get(row, "updated_at")?,
        version: to_u64(get(row, "version")?)?,
    }))
}

fn expected_param(expected: ExpectedVersion) -> Result<Option<i64>, StoreError> {
    match expected {
        ExpectedVersion::Any => Ok(None),
        ExpectedVersion::Exact(v) => to_i64(v).map(Some),
    }
}

fn to_i64(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Query(format!("value {value} out of range")))
}

fn to_i32(value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Query(format!("value {value} out of range")))
}

fn to_u64(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Decode(format!("negative value {value}")))
}

fn to_u32(value: i64) -> Result<u32, StoreError> {
    u32::try_from(value).map_err(|_| StoreError::Decode(format!("value {value} out of range")))
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                // serialization_failure, deadlock_detected, unique_violation
                Some("40001") | Some("40P01") | Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Query(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool unavailable in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {operation}: {e}")),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StoreError::Decode(format!("decode error in {operation}: {err}"))
        }
        _ => StoreError::Query(format!("sqlx error in {operation}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_version_binds_null() {
        assert_eq!(expected_param(ExpectedVersion::Any).unwrap(), None);
        assert_eq!(expected_param(ExpectedVersion::Exact(4)).unwrap(), Some(4));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(to_i64(u64::MAX).is_err());
        assert!(to_u64(-1).is_err());
        assert!(to_u32(i64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn pool_closed_is_unavailable() {
        let err = map_sqlx_error("begin_transaction", sqlx::Error::PoolClosed);
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[test]
    fn schema_declares_every_table() {
        for table in ["scan_records", "listings", "orders", "order_items"] {
            assert!(SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {table}")));
        }
    }
}
