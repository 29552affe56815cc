//! Postgres-backed [`ParkingStore`].
//!
//! Vehicle types resolve through a single upsert against the unique name
//! index, so a losing concurrent writer converges on the surviving row.
//! `apply_events` runs in one transaction and locks the current occupancy row
//! for the duration, serializing concurrent counters.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::store::{NewParkingEntry, OccupancyRow, ParkingStore};

pub struct PgParkingStore {
    pool: PgPool,
    total_spaces: i32,
}

impl PgParkingStore {
    pub fn new(pool: PgPool, total_spaces: i32) -> Self {
        Self { pool, total_spaces }
    }

    async fn locked_occupancy(
        &self,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<OccupancyRow> {
        let row = sqlx::query(
            r#"
            SELECT id, total_spaces, occupied_spaces, last_updated
            FROM parking_occupancy
            ORDER BY last_updated DESC, id DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .fetch_optional(&mut **tx)
        .await
        .context("Failed to lock occupancy row")?;

        match row {
            Some(row) => Ok(OccupancyRow {
                id: row.get("id"),
                total_spaces: row.get("total_spaces"),
                occupied_spaces: row.get("occupied_spaces"),
                last_updated: row.get("last_updated"),
            }),
            None => {
                let row = sqlx::query(
                    r#"
                    INSERT INTO parking_occupancy (total_spaces, occupied_spaces, last_updated)
                    VALUES ($1, 0, NOW())
                    RETURNING id, total_spaces, occupied_spaces, last_updated
                    "#,
                )
                .bind(self.total_spaces)
                .fetch_one(&mut **tx)
                .await
                .context("Failed to initialize occupancy row")?;

                Ok(OccupancyRow {
                    id: row.get("id"),
                    total_spaces: row.get("total_spaces"),
                    occupied_spaces: row.get("occupied_spaces"),
                    last_updated: row.get("last_updated"),
                })
            }
        }
    }
}

#[async_trait]
impl ParkingStore for PgParkingStore {
    async fn get_or_create_vehicle_type(&self, name: &str) -> Result<i64> {
        // the no-op update makes RETURNING yield the id on conflict as well
        let row = sqlx::query(
            r#"
            INSERT INTO vehicle_type (name)
            VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Failed to resolve vehicle type '{}'", name))?;

        Ok(row.get("id"))
    }

    async fn apply_events(&self, events: &[NewParkingEntry]) -> Result<OccupancyRow> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin ingest transaction")?;

        let mut occupancy = self.locked_occupancy(&mut tx).await?;

        for event in events {
            sqlx::query(
                r#"
                INSERT INTO parking_entry
                    (license_plate, timestamp, is_entry, vehicle_type_id, confidence)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(&event.license_plate)
            .bind(event.timestamp)
            .bind(event.is_entry)
            .bind(event.vehicle_type_id)
            .bind(event.confidence)
            .execute(&mut *tx)
            .await
            .context("Failed to insert parking entry")?;

            if event.is_entry {
                occupancy.occupied_spaces += 1;
                if occupancy.occupied_spaces > occupancy.total_spaces {
                    tracing::warn!(
                        occupied = occupancy.occupied_spaces,
                        total = occupancy.total_spaces,
                        "occupancy exceeds configured capacity"
                    );
                }
            } else {
                occupancy.occupied_spaces = (occupancy.occupied_spaces - 1).max(0);
            }
        }

        occupancy.last_updated = Utc::now();

        sqlx::query(
            r#"
            UPDATE parking_occupancy
            SET occupied_spaces = $1, last_updated = $2
            WHERE id = $3
            "#,
        )
        .bind(occupancy.occupied_spaces)
        .bind(occupancy.last_updated)
        .bind(occupancy.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update occupancy")?;

        tx.commit()
            .await
            .context("Failed to commit ingest transaction")?;

        Ok(occupancy)
    }

    async fn latest_occupancy(&self) -> Result<Option<OccupancyRow>> {
        let row = sqlx::query(
            r#"
            SELECT id, total_spaces, occupied_spaces, last_updated
            FROM parking_occupancy
            ORDER BY last_updated DESC, id DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch occupancy")?;

        Ok(row.map(|row| OccupancyRow {
            id: row.get("id"),
            total_spaces: row.get("total_spaces"),
            occupied_spaces: row.get("occupied_spaces"),
            last_updated: row.get("last_updated"),
        }))
    }

    async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .or(Ok(false))
    }
}
