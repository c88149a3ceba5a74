//! User repository for database operations
//!
//! Usernames and emails are stored exactly as given and compared with
//! `LOWER(..)` on both sides. The unique indexes over `LOWER(username)` and
//! `LOWER(email)` are the real guard; the checks here exist to report which
//! field conflicted.

use common::database::{Database, QueryResult, Statement};
use common::error::InfrastructureError;
use sqlx::FromRow;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult, Operation, UniqueField},
    models::{NewUser, UpdateUser, User},
    password, validation,
};

const USERNAME_UNIQUE_INDEX: &str = "users_username_lower_key";
const EMAIL_UNIQUE_INDEX: &str = "users_email_lower_key";

/// User repository
#[derive(Clone)]
pub struct UserRepository {
    database: Database,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Create a new user
    pub async fn create(&self, new_user: NewUser) -> ApiResult<User> {
        info!(username = %new_user.username, "Creating new user");

        validation::validate_new_user(&new_user)?;
        self.ensure_unique(UniqueField::Username, &new_user.username, None, Operation::Create)
            .await?;
        self.ensure_unique(UniqueField::Email, &new_user.email, None, Operation::Create)
            .await?;

        let password_hash = password::hash(&new_user.password)
            .await
            .map_err(ApiError::internal)?;

        let statement = Statement::new(
            r#"
            INSERT INTO users (id, username, email, password)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_user.username)
        .bind(new_user.email)
        .bind(password_hash);

        let result = self
            .database
            .query(statement)
            .await
            .map_err(|e| storage_error(e, Operation::Create))?;

        first_user(&result)?.ok_or_else(|| {
            ApiError::internal(InfrastructureError::Decode(
                "INSERT returned no row".to_string(),
            ))
        })
    }

    /// Find a user by username, ignoring case
    pub async fn find_one_by_username(&self, username: &str) -> ApiResult<User> {
        info!(%username, "Finding user by username");

        let statement = Statement::new(
            r#"
            SELECT id, username, email, password, created_at, updated_at
            FROM users
            WHERE LOWER(username) = LOWER($1)
            LIMIT 1
            "#,
        )
        .bind(username);

        let result = self.database.query(statement).await?;
        first_user(&result)?.ok_or_else(ApiError::username_not_found)
    }

    /// Apply the supplied fields to the user found by `username`
    pub async fn patch(&self, username: &str, update: UpdateUser) -> ApiResult<User> {
        let current = self.find_one_by_username(username).await?;
        info!(
            %username,
            user_id = %current.id,
            fields_supplied = !update.is_empty(),
            "Patching user"
        );

        validation::validate_update(&update)?;
        if let Some(new_username) = &update.username {
            self.ensure_unique(UniqueField::Username, new_username, Some(current.id), Operation::Update)
                .await?;
        }
        if let Some(new_email) = &update.email {
            self.ensure_unique(UniqueField::Email, new_email, Some(current.id), Operation::Update)
                .await?;
        }

        let mut update = update;
        if let Some(plaintext) = update.password.take() {
            let password_hash = password::hash(&plaintext)
                .await
                .map_err(ApiError::internal)?;
            update.password = Some(password_hash);
        }

        let merged = current.merge(update);
        let statement = Statement::new(
            r#"
            UPDATE users
            SET username = $2, email = $3, password = $4, updated_at = now()
            WHERE id = $1
            RETURNING id, username, email, password, created_at, updated_at
            "#,
        )
        .bind(merged.id)
        .bind(merged.username)
        .bind(merged.email)
        .bind(merged.password);

        let result = self
            .database
            .query(statement)
            .await
            .map_err(|e| storage_error(e, Operation::Update))?;

        // The row can vanish between the lookup and the update
        first_user(&result)?.ok_or_else(ApiError::username_not_found)
    }

    /// Check a plaintext password against the user's stored hash
    pub async fn verify_password(&self, user: &User, plaintext: &str) -> ApiResult<bool> {
        password::verify(plaintext, &user.password)
            .await
            .map_err(ApiError::internal)
    }

    async fn ensure_unique(
        &self,
        field: UniqueField,
        value: &str,
        exclude: Option<Uuid>,
        operation: Operation,
    ) -> ApiResult<()> {
        // `label()` is a fixed identifier, never user input
        let column = field.label();
        let mut text = format!("SELECT id FROM users WHERE LOWER({column}) = LOWER($1)");
        if exclude.is_some() {
            text.push_str(" AND id <> $2");
        }
        text.push_str(" LIMIT 1");

        let mut statement = Statement::new(text).bind(value);
        if let Some(id) = exclude {
            statement = statement.bind(id);
        }

        let result = self.database.query(statement).await?;
        if result.row_count > 0 {
            info!(field = column, "Uniqueness check rejected value");
            return Err(ApiError::conflict(field, operation));
        }
        Ok(())
    }
}

fn first_user(result: &QueryResult) -> ApiResult<Option<User>> {
    result
        .first()
        .map(User::from_row)
        .transpose()
        .map_err(|e| ApiError::internal(InfrastructureError::Decode(e.to_string())))
}

/// A unique-index violation means another writer won the race after our
/// check; report it like the check would have.
fn storage_error(err: InfrastructureError, operation: Operation) -> ApiError {
    let field = match err.constraint() {
        Some(USERNAME_UNIQUE_INDEX) => Some(UniqueField::Username),
        Some(EMAIL_UNIQUE_INDEX) => Some(UniqueField::Email),
        _ => None,
    };
    let Some(field) = field else {
        return ApiError::from(err);
    };

    warn!(field = field.label(), "Unique index rejected a write that passed the check");
    ApiError::conflict(field, operation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::database::DatabaseConfig;

    async fn repository() -> UserRepository {
        let database = Database::new(DatabaseConfig::from_env().unwrap());
        crate::schema::migrate(&database).await.unwrap();
        UserRepository::new(database)
    }

    fn unique(prefix: &str) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{prefix}{}", &suffix[..8])
    }

    fn new_user(username: &str, email: &str, password: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_storage_error_passes_through_other_failures() {
        let err = storage_error(InfrastructureError::Timeout(30), Operation::Create);
        assert_eq!(err.name(), "InternalServerError");
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_create_user() {
        let repo = repository().await;
        let username = unique("bernardos");
        let email = format!("{username}@gmail.com");

        let user = repo
            .create(new_user(&username, &email, "senha123"))
            .await
            .unwrap();

        assert_eq!(user.username, username);
        assert_eq!(user.email, email);
        assert_eq!(user.id.get_version_num(), 4);
        assert_eq!(user.created_at, user.updated_at);
        assert_ne!(user.password, "senha123");

        let stored = repo.find_one_by_username(&username).await.unwrap();
        assert!(repo.verify_password(&stored, "senha123").await.unwrap());
        assert!(!repo.verify_password(&stored, "senha1234").await.unwrap());
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_find_ignores_case() {
        let repo = repository().await;
        let username = unique("CaseDiferente");
        let created = repo
            .create(new_user(&username, &format!("{username}@gmail.com"), "senha123"))
            .await
            .unwrap();

        let lower = repo.find_one_by_username(&username.to_lowercase()).await.unwrap();
        let upper = repo.find_one_by_username(&username.to_uppercase()).await.unwrap();

        assert_eq!(lower, created);
        assert_eq!(upper, created);
        // Stored case is kept
        assert_eq!(lower.username, username);
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_find_nonexistent_username() {
        let repo = repository().await;
        let err = repo
            .find_one_by_username(&unique("usuarioInexistente"))
            .await
            .unwrap_err();

        let body = err.body();
        assert_eq!(body.name, "NotFoundError");
        assert_eq!(body.message, "O username informado não foi encontrado no sistema.");
        assert_eq!(body.action, "Verifique se o username está digitado corretamente.");
        assert_eq!(body.status_code, 404);
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_create_duplicated_username() {
        let repo = repository().await;
        let username = unique("duplicado");
        repo.create(new_user(&username, &format!("{username}1@gmail.com"), "senha123"))
            .await
            .unwrap();

        let err = repo
            .create(new_user(
                &username.to_uppercase(),
                &format!("{username}2@gmail.com"),
                "senha123",
            ))
            .await
            .unwrap_err();

        let body = err.body();
        assert_eq!(body.name, "ValidationError");
        assert_eq!(body.status_code, 400);
        assert_eq!(body.message, "O username informado já está sendo utilizado.");
        assert_eq!(body.action, "Utilize outro username para realizar o cadastro");
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_create_duplicated_email() {
        let repo = repository().await;
        let first = unique("emailDuplicado");
        let email = format!("{}@gmail.com", first.to_lowercase());
        repo.create(new_user(&first, &email, "senha123")).await.unwrap();

        let err = repo
            .create(new_user(&unique("emailDuplicado"), &email.to_uppercase(), "senha123"))
            .await
            .unwrap_err();

        assert_eq!(err.message(), "O email informado já está sendo utilizado.");
        assert_eq!(err.action(), "Utilize outro email para realizar o cadastro");
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_concurrent_creates_hit_unique_index() {
        let repo = repository().await;
        let username = unique("corrida");

        let first = new_user(&username, &format!("{username}1@gmail.com"), "senha123");
        let second = new_user(&username.to_uppercase(), &format!("{username}2@gmail.com"), "senha123");
        let (a, b) = tokio::join!(repo.create(first), repo.create(second));

        let failures: Vec<ApiError> = [a, b].into_iter().filter_map(Result::err).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name(), "ValidationError");
        assert_eq!(failures[0].action(), "Utilize outro username para realizar o cadastro");
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_patch_nonexistent_username() {
        let repo = repository().await;
        let err = repo
            .patch(&unique("usuarioInexistente"), UpdateUser::default())
            .await
            .unwrap_err();
        assert_eq!(err.name(), "NotFoundError");
        assert_eq!(err.status_code().as_u16(), 404);
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_patch_duplicated_username() {
        let repo = repository().await;
        let user1 = unique("user1");
        let user2 = unique("user2");
        repo.create(new_user(&user1, &format!("{user1}@gmail.com"), "senha123"))
            .await
            .unwrap();
        repo.create(new_user(&user2, &format!("{user2}@gmail.com"), "senha123"))
            .await
            .unwrap();

        let update = UpdateUser {
            username: Some(user1.to_uppercase()),
            ..UpdateUser::default()
        };
        let err = repo.patch(&user2, update).await.unwrap_err();

        assert_eq!(err.name(), "ValidationError");
        assert_eq!(err.message(), "O username informado já está sendo utilizado.");
        assert_eq!(err.action(), "Utilize outro username para realizar esta operação.");
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_patch_duplicated_email() {
        let repo = repository().await;
        let email1 = format!("{}@gmail.com", unique("email1"));
        let user2 = unique("user2");
        repo.create(new_user(&unique("user1"), &email1, "senha123"))
            .await
            .unwrap();
        repo.create(new_user(&user2, &format!("{user2}@gmail.com"), "senha123"))
            .await
            .unwrap();

        let update = UpdateUser {
            email: Some(email1),
            ..UpdateUser::default()
        };
        let err = repo.patch(&user2, update).await.unwrap_err();
        assert_eq!(err.action(), "Utilize outro email para realizar esta operação.");
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_patch_unique_username() {
        let repo = repository().await;
        let original = unique("uniqueUser1");
        let renamed = unique("uniqueuser2");
        let created = repo
            .create(new_user(&original, &format!("{original}@gmail.com"), "senha123"))
            .await
            .unwrap();

        let update = UpdateUser {
            username: Some(renamed.clone()),
            ..UpdateUser::default()
        };
        let patched = repo.patch(&original.to_lowercase(), update).await.unwrap();

        assert_eq!(patched.id, created.id);
        assert_eq!(patched.username, renamed);
        assert_eq!(patched.email, created.email);
        assert_eq!(patched.created_at, created.created_at);
        assert!(patched.updated_at > patched.created_at);
        assert!(patched.updated_at > created.updated_at);
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_patch_own_username_case() {
        let repo = repository().await;
        let original = unique("mesmocase");
        repo.create(new_user(&original, &format!("{original}@gmail.com"), "senha123"))
            .await
            .unwrap();

        let update = UpdateUser {
            username: Some(original.to_uppercase()),
            ..UpdateUser::default()
        };
        let patched = repo.patch(&original, update).await.unwrap();
        assert_eq!(patched.username, original.to_uppercase());
    }

    #[tokio::test]
    #[ignore = "requires a running PostgreSQL instance"]
    async fn test_patch_password() {
        let repo = repository().await;
        let username = unique("newPassword");
        let created = repo
            .create(new_user(&username, &format!("{username}@gmail.com"), "newPassword1"))
            .await
            .unwrap();

        let update = UpdateUser {
            password: Some("newPassword2".to_string()),
            ..UpdateUser::default()
        };
        let patched = repo.patch(&username, update).await.unwrap();

        assert_eq!(patched.username, created.username);
        assert_eq!(patched.email, created.email);
        assert_ne!(patched.password, created.password);
        assert!(patched.updated_at > created.updated_at);

        let stored = repo.find_one_by_username(&username).await.unwrap();
        assert!(repo.verify_password(&stored, "newPassword2").await.unwrap());
        assert!(!repo.verify_password(&stored, "newPassword1").await.unwrap());
    }
}
