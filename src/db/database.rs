use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use tracing::info;

use crate::db::models::{AssetCategory, AssetRow, GalleryCategory, GalleryRow, ModelRow};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn init(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS models (\
                id INTEGER PRIMARY KEY AUTOINCREMENT,\
                studio_id INTEGER NOT NULL,\
                name TEXT NOT NULL,\
                face_base64 TEXT,\
                body_base64 TEXT,\
                image_base64 TEXT\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS assets (\
                id INTEGER PRIMARY KEY AUTOINCREMENT,\
                studio_id INTEGER NOT NULL,\
                category TEXT NOT NULL,\
                name TEXT NOT NULL,\
                image_base64 TEXT NOT NULL\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS gallery (\
                id INTEGER PRIMARY KEY AUTOINCREMENT,\
                studio_id INTEGER NOT NULL,\
                category TEXT NOT NULL,\
                prompt TEXT,\
                image_base64 TEXT NOT NULL,\
                created_at TEXT NOT NULL\
            );",
        )
        .execute(&pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_models_studio_id ON models(studio_id);")
            .execute(&pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_assets_studio_category ON assets(studio_id, category);",
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_gallery_studio_category ON gallery(studio_id, category);",
        )
        .execute(&pool)
        .await?;

        info!("Database initialized at {database_url}");
        Ok(Database { pool })
    }

    pub async fn add_model(
        &self,
        studio_id: i64,
        name: &str,
        face_base64: &str,
        body_base64: &str,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO models (studio_id, name, face_base64, body_base64) VALUES (?, ?, ?, ?)",
        )
        .bind(studio_id)
        .bind(name)
        .bind(face_base64)
        .bind(body_base64)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_models(&self, studio_id: i64) -> Result<Vec<ModelRow>> {
        let rows = sqlx::query_as::<_, ModelRow>(
            "SELECT * FROM models WHERE studio_id = ? ORDER BY id DESC",
        )
        .bind(studio_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_model_by_name(&self, studio_id: i64, name: &str) -> Result<Option<ModelRow>> {
        let row = sqlx::query_as::<_, ModelRow>(
            "SELECT * FROM models WHERE studio_id = ? AND name = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(studio_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete_model(&self, model_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM models WHERE id = ?")
            .bind(model_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_asset(
        &self,
        studio_id: i64,
        category: AssetCategory,
        name: &str,
        image_base64: &str,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO assets (studio_id, category, name, image_base64) VALUES (?, ?, ?, ?)",
        )
        .bind(studio_id)
        .bind(category.as_str())
        .bind(name)
        .bind(image_base64)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_assets(&self, studio_id: i64, category: AssetCategory) -> Result<Vec<AssetRow>> {
        let rows = sqlx::query_as::<_, AssetRow>(
            "SELECT * FROM assets WHERE studio_id = ? AND category = ? ORDER BY id DESC",
        )
        .bind(studio_id)
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_asset_by_name(
        &self,
        studio_id: i64,
        category: AssetCategory,
        name: &str,
    ) -> Result<Option<AssetRow>> {
        let row = sqlx::query_as::<_, AssetRow>(
            "SELECT * FROM assets WHERE studio_id = ? AND category = ? AND name = ? \
             ORDER BY id DESC LIMIT 1",
        )
        .bind(studio_id)
        .bind(category.as_str())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn delete_asset(&self, asset_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM assets WHERE id = ?")
            .bind(asset_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn add_gallery_item(
        &self,
        studio_id: i64,
        category: GalleryCategory,
        prompt: &str,
        image_base64: &str,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO gallery (studio_id, category, prompt, image_base64, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(studio_id)
        .bind(category.as_str())
        .bind(prompt)
        .bind(image_base64)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_gallery(
        &self,
        studio_id: i64,
        category: GalleryCategory,
    ) -> Result<Vec<GalleryRow>> {
        let rows = sqlx::query_as::<_, GalleryRow>(
            "SELECT * FROM gallery WHERE studio_id = ? AND category = ? ORDER BY id DESC",
        )
        .bind(studio_id)
        .bind(category.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn get_gallery_item(&self, item_id: i64) -> Result<Option<GalleryRow>> {
        let row = sqlx::query_as::<_, GalleryRow>("SELECT * FROM gallery WHERE id = ?")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn delete_gallery_item(&self, item_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM gallery WHERE id = ?")
            .bind(item_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn clear_gallery(&self, studio_id: i64, category: GalleryCategory) -> Result<u64> {
        let result = sqlx::query("DELETE FROM gallery WHERE studio_id = ? AND category = ?")
            .bind(studio_id)
            .bind(category.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> Database {
        Database::init("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn models_round_trip_with_split_references() {
        let db = memory_db().await;
        let id = db.add_model(1, "Vera", "face-b64", "body-b64").await.unwrap();
        assert!(id > 0);

        let found = db.get_model_by_name(1, "Vera").await.unwrap().unwrap();
        assert_eq!(found.face_base64.as_deref(), Some("face-b64"));
        assert_eq!(found.body_base64.as_deref(), Some("body-b64"));
        assert!(found.image_base64.is_none());

        assert!(db.get_model_by_name(2, "Vera").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn assets_are_scoped_by_studio_and_category() {
        let db = memory_db().await;
        db.add_asset(1, AssetCategory::Closet, "Red Dress", "b64")
            .await
            .unwrap();
        db.add_asset(1, AssetCategory::Location, "Beach", "b64")
            .await
            .unwrap();

        let closet = db.get_assets(1, AssetCategory::Closet).await.unwrap();
        assert_eq!(closet.len(), 1);
        assert_eq!(closet[0].name, "Red Dress");

        assert!(db
            .get_asset_by_name(1, AssetCategory::Location, "Beach")
            .await
            .unwrap()
            .is_some());
        assert!(db
            .get_asset_by_name(1, AssetCategory::Closet, "Beach")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn gallery_clear_only_touches_one_category() {
        let db = memory_db().await;
        db.add_gallery_item(1, GalleryCategory::Apparel, "shot", "b64")
            .await
            .unwrap();
        db.add_gallery_item(1, GalleryCategory::Accessory, "necklace", "b64")
            .await
            .unwrap();

        let cleared = db.clear_gallery(1, GalleryCategory::Apparel).await.unwrap();
        assert_eq!(cleared, 1);
        assert!(db.get_gallery(1, GalleryCategory::Apparel).await.unwrap().is_empty());
        assert_eq!(db.get_gallery(1, GalleryCategory::Accessory).await.unwrap().len(), 1);
    }
}
