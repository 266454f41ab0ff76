//! # Company Profile Repository
//!
//! The pharmacy's own profile. The table holds at most one row (`id = 1`).

use chrono::Utc;
use sqlx::sqlite::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use pharma_core::search::normalize_name;
use pharma_core::{CompanyProfile, CompanyProfileInput, Id};

const PROFILE_ID: Id = 1;

pub struct CompanyRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> CompanyRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        CompanyRepository { conn }
    }

    pub async fn get(&mut self) -> DbResult<Option<CompanyProfile>> {
        let profile = sqlx::query_as::<_, CompanyProfile>(
            r#"
            SELECT c.name, c.address, c.business_registration_number, c.pharmacist,
                   c.pharmacist_license_number, c.created_at, c.last_modified,
                   mu.name AS last_modified_by_user_name
            FROM company_profile c
            LEFT JOIN users mu ON mu.id = c.last_modified_by_user_id
            WHERE c.id = ?
            "#,
        )
        .bind(PROFILE_ID)
        .fetch_optional(&mut *self.conn)
        .await?;
        Ok(profile)
    }

    /// Creates the profile. A second create is a `UniqueViolation`.
    pub async fn create(&mut self, input: &CompanyProfileInput, actor: Id) -> DbResult<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO company_profile (id, name, address, business_registration_number,
                                         pharmacist, pharmacist_license_number,
                                         created_at, last_modified, last_modified_by_user_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(PROFILE_ID)
        .bind(normalize_name(&input.name))
        .bind(&input.address)
        .bind(&input.business_registration_number)
        .bind(&input.pharmacist)
        .bind(&input.pharmacist_license_number)
        .bind(now)
        .bind(now)
        .bind(actor)
        .execute(&mut *self.conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("company profile", "id 1"),
            other => other,
        })?;

        debug!("Company profile created");
        Ok(())
    }

    pub async fn modify(&mut self, input: &CompanyProfileInput, actor: Id) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE company_profile
            SET name = ?, address = ?, business_registration_number = ?, pharmacist = ?,
                pharmacist_license_number = ?, last_modified = ?, last_modified_by_user_id = ?
            WHERE id = ?
            "#,
        )
        .bind(normalize_name(&input.name))
        .bind(&input.address)
        .bind(&input.business_registration_number)
        .bind(&input.pharmacist)
        .bind(&input.pharmacist_license_number)
        .bind(Utc::now())
        .bind(actor)
        .bind(PROFILE_ID)
        .execute(&mut *self.conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Company profile", PROFILE_ID));
        }
        Ok(())
    }

    /// Removes the profile row so that it can be created afresh.
    pub async fn delete(&mut self) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM company_profile WHERE id = ?")
            .bind(PROFILE_ID)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Company profile", PROFILE_ID));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::repository::test_support::database;
    use crate::DbError;
    use pharma_core::CompanyProfileInput;

    #[tokio::test]
    async fn test_single_profile() {
        let (db, admin) = database().await;
        let mut session = db.begin().await.unwrap();

        assert!(session.company().get().await.unwrap().is_none());

        let mut input = CompanyProfileInput {
            name: "Apotek Sehat".into(),
            address: "Jl. Merdeka 1".into(),
            business_registration_number: String::new(),
            pharmacist: "apt. Rina".into(),
            pharmacist_license_number: "SIPA-1".into(),
        };
        session.company().create(&input, admin).await.unwrap();
        let err = session.company().create(&input, admin).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));

        input.address = "Jl. Sudirman 2".into();
        session.company().modify(&input, admin).await.unwrap();
        let profile = session.company().get().await.unwrap().unwrap();
        assert_eq!(profile.address, "Jl. Sudirman 2");
        assert_eq!(profile.pharmacist, "apt. Rina");

        session.company().delete().await.unwrap();
        assert!(session.company().get().await.unwrap().is_none());
    }
}
