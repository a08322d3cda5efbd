//! # Payment Method Repository
//!
//! Tender types a sale can be paid with. The `CASH` code is what drawer
//! reconciliation keys on, so codes are unique and never rewritten.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult, ServiceResult};
use till_core::validation::validate_new_payment_method;
use till_core::{CoreError, NewPaymentMethod, PaymentMethod, PaymentRequest, ValidationError};

#[derive(Debug, sqlx::FromRow)]
struct PaymentMethodRow {
    id: String,
    name: String,
    code: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<PaymentMethodRow> for PaymentMethod {
    fn from(row: PaymentMethodRow) -> Self {
        PaymentMethod {
            id: row.id,
            name: row.name,
            code: row.code,
            description: row.description,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

/// Repository for payment methods.
#[derive(Debug, Clone)]
pub struct PaymentMethodRepository {
    pool: SqlitePool,
}

impl PaymentMethodRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentMethodRepository { pool }
    }

    /// Validates and inserts an active payment method.
    pub async fn insert(&self, method: &NewPaymentMethod) -> ServiceResult<PaymentMethod> {
        validate_new_payment_method(method)?;

        let method = PaymentMethod {
            id: Uuid::new_v4().to_string(),
            name: method.name.trim().to_string(),
            code: method.code.clone(),
            description: method.description.clone(),
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %method.id, code = %method.code, "Inserting payment method");

        let inserted = sqlx::query(
            r#"
            INSERT INTO payment_methods (id, name, code, description, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5)
            "#,
        )
        .bind(&method.id)
        .bind(&method.name)
        .bind(&method.code)
        .bind(&method.description)
        .bind(method.created_at)
        .execute(&self.pool)
        .await;

        if let Err(err) = inserted {
            let err = DbError::from(err);
            return Err(match &err {
                DbError::UniqueViolation { field, .. } if field.contains("payment_methods.") => {
                    let (field, value) = if field.contains(".code") {
                        ("code", method.code.clone())
                    } else {
                        ("name", method.name.clone())
                    };
                    ValidationError::Duplicate {
                        field: field.to_string(),
                        value,
                    }
                    .into()
                }
                _ => err.into(),
            });
        }

        info!(code = %method.code, "Payment method created");
        Ok(method)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<PaymentMethod>> {
        let row = sqlx::query_as::<_, PaymentMethodRow>(
            r#"
            SELECT id, name, code, description, is_active, created_at
            FROM payment_methods
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PaymentMethod::from))
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<PaymentMethod>> {
        let row = sqlx::query_as::<_, PaymentMethodRow>(
            r#"
            SELECT id, name, code, description, is_active, created_at
            FROM payment_methods
            WHERE code = ?1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PaymentMethod::from))
    }

    /// Active methods ordered by name.
    pub async fn list_active(&self) -> DbResult<Vec<PaymentMethod>> {
        let rows = sqlx::query_as::<_, PaymentMethodRow>(
            r#"
            SELECT id, name, code, description, is_active, created_at
            FROM payment_methods
            WHERE is_active = 1
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PaymentMethod::from).collect())
    }

    /// Enables or disables a method. Past sales keep their snapshot.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE payment_methods SET is_active = ?2 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("PaymentMethod", id));
        }

        info!(id = %id, active, "Payment method updated");
        Ok(())
    }

    /// Resolves each payment line to an active method, in request order.
    ///
    /// ## Errors
    /// [`CoreError::InvalidPaymentMethod`] for an unknown or inactive id.
    pub async fn resolve_active(&self, payments: &[PaymentRequest]) -> ServiceResult<Vec<PaymentMethod>> {
        let mut resolved = Vec::with_capacity(payments.len());
        for payment in payments {
            let id = payment.payment_method.as_deref().unwrap_or_default().trim();
            match self.get_by_id(id).await? {
                Some(method) if method.is_active => resolved.push(method),
                Some(_) => {
                    return Err(CoreError::InvalidPaymentMethod(format!("{} is inactive", id)).into())
                }
                None => return Err(CoreError::InvalidPaymentMethod(id.to_string()).into()),
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::pool::{Database, DbConfig};

    fn cash() -> NewPaymentMethod {
        NewPaymentMethod {
            name: "Efectivo".to_string(),
            code: "CASH".to_string(),
            description: Some("Pago en efectivo".to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.payment_methods();

        let created = repo.insert(&cash()).await.unwrap();
        assert!(created.is_cash());

        let by_code = repo.get_by_code("CASH").await.unwrap().unwrap();
        assert_eq!(by_code.id, created.id);
        assert_eq!(repo.list_active().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.payment_methods().insert(&cash()).await.unwrap();

        let mut again = cash();
        again.name = "Cash".to_string();
        let err = db.payment_methods().insert(&again).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(CoreError::Validation(ValidationError::Duplicate { .. }))
        ));
    }

    #[tokio::test]
    async fn test_resolve_rejects_unknown_and_inactive() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.payment_methods();
        let method = repo.insert(&cash()).await.unwrap();

        let line = |id: &str| PaymentRequest {
            payment_method: Some(id.to_string()),
            amount: None,
        };

        let resolved = repo.resolve_active(&[line(&method.id)]).await.unwrap();
        assert_eq!(resolved[0].code, "CASH");

        let err = repo.resolve_active(&[line("missing")]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(CoreError::InvalidPaymentMethod(_))));

        repo.set_active(&method.id, false).await.unwrap();
        assert!(repo.list_active().await.unwrap().is_empty());
        let err = repo.resolve_active(&[line(&method.id)]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Domain(CoreError::InvalidPaymentMethod(_))));
    }
}
