use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, DateTime as BsonDateTime, Document},
    error::{ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Client as MongoClient, Collection, Database, IndexModel,
};

use super::error::ServiceError;
use super::store::{
    ContentStore, GrantEffect, IdentityStore, OrganizationStore, Store, UserUpdate,
};
use crate::models::{ContentItem, GrantKind, Organization, ResourceKind, TokenGrant, User};

const DUPLICATE_KEY: i32 = 11000;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

fn db_error(action: &str, err: mongodb::error::Error) -> ServiceError {
    tracing::error!(error = %err, "Failed to {}", action);
    ServiceError::Database(err)
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY
    )
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, ServiceError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri)
            .await
            .map_err(|e| db_error("connect to MongoDB", e))?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), ServiceError> {
        tracing::info!("Creating MongoDB indexes");

        let users = self.users();
        users
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("email_unique_idx".to_string())
                            .unique(true)
                            .build(),
                    )
                    .build(),
                None,
            )
            .await
            .map_err(|e| db_error("create email index", e))?;

        users
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "organization": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("organization_idx".to_string())
                            .sparse(true)
                            .build(),
                    )
                    .build(),
                None,
            )
            .await
            .map_err(|e| db_error("create user organization index", e))?;

        for kind in [GrantKind::EmailVerification, GrantKind::PasswordReset] {
            let key = format!("{}.token_hash", kind.field());
            let mut keys = Document::new();
            keys.insert(key.as_str(), 1);
            users
                .create_index(
                    IndexModel::builder()
                        .keys(keys)
                        .options(
                            IndexOptions::builder()
                                .name(format!("{}_token_idx", kind.field()))
                                .sparse(true)
                                .build(),
                        )
                        .build(),
                    None,
                )
                .await
                .map_err(|e| db_error("create grant index", e))?;
        }

        self.organizations()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "slug": 1 })
                    .options(
                        IndexOptions::builder()
                            .name("slug_unique_idx".to_string())
                            .unique(true)
                            .build(),
                    )
                    .build(),
                None,
            )
            .await
            .map_err(|e| db_error("create organization slug index", e))?;

        for kind in ResourceKind::ALL {
            self.content(kind)
                .create_index(
                    IndexModel::builder()
                        .keys(doc! { "organization": 1, "created_at": -1 })
                        .options(
                            IndexOptions::builder()
                                .name("organization_created_idx".to_string())
                                .build(),
                        )
                        .build(),
                    None,
                )
                .await
                .map_err(|e| db_error("create content index", e))?;
        }

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    pub fn organizations(&self) -> Collection<Organization> {
        self.db.collection("organizations")
    }

    pub fn content(&self, kind: ResourceKind) -> Collection<ContentItem> {
        self.db.collection(kind.collection())
    }
}

#[async_trait]
impl IdentityStore for MongoDb {
    async fn insert_user(&self, user: &User) -> Result<(), ServiceError> {
        match self.users().insert_one(user, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                Err(ServiceError::Conflict("Email already registered".to_string()))
            }
            Err(e) => Err(db_error("insert user", e)),
        }
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, ServiceError> {
        self.users()
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| db_error("find user", e))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, ServiceError> {
        self.users()
            .find_one(doc! { "email": email }, None)
            .await
            .map_err(|e| db_error("find user by email", e))
    }

    async fn list_users(&self, organization: Option<&str>) -> Result<Vec<User>, ServiceError> {
        let filter = match organization {
            Some(org) => doc! { "organization": org },
            None => doc! {},
        };
        let options = FindOptions::builder().sort(doc! { "created_at": 1 }).build();

        let cursor = self
            .users()
            .find(filter, options)
            .await
            .map_err(|e| db_error("list users", e))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| db_error("collect users", e))
    }

    async fn update_user(
        &self,
        id: &str,
        update: &UserUpdate,
        at: DateTime<Utc>,
    ) -> Result<User, ServiceError> {
        let mut set = doc! { "updated_at": BsonDateTime::from_chrono(at) };
        let mut unset = Document::new();
        if let Some(name) = &update.name {
            set.insert("name", name);
        }
        if let Some(email) = &update.email {
            set.insert("email", email);
            set.insert("verified", false);
            unset.insert(GrantKind::EmailVerification.field(), "");
        }
        if let Some(role) = update.role {
            set.insert("role", role.as_str());
        }
        if let Some(active) = update.active {
            set.insert("active", active);
        }

        let mut changes = doc! { "$set": set };
        if !unset.is_empty() {
            changes.insert("$unset", unset);
        }
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        match self
            .users()
            .find_one_and_update(doc! { "_id": id }, changes, options)
            .await
        {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(ServiceError::NotFound("User")),
            Err(e) if is_duplicate_key(&e) => {
                Err(ServiceError::Conflict("Email already registered".to_string()))
            }
            Err(e) => Err(db_error("update user", e)),
        }
    }

    async fn set_password(
        &self,
        id: &str,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let mut unset = Document::new();
        unset.insert(GrantKind::PasswordReset.field(), "");

        let result = self
            .users()
            .update_one(
                doc! { "_id": id },
                doc! {
                    "$set": {
                        "password_hash": password_hash,
                        "updated_at": BsonDateTime::from_chrono(at),
                    },
                    "$unset": unset,
                },
                None,
            )
            .await
            .map_err(|e| db_error("set password", e))?;

        if result.matched_count == 0 {
            return Err(ServiceError::NotFound("User"));
        }
        Ok(())
    }

    async fn set_user_organization(
        &self,
        id: &str,
        organization: Option<&str>,
    ) -> Result<(), ServiceError> {
        let result = self
            .users()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": {
                    "organization": organization,
                    "updated_at": BsonDateTime::now(),
                } },
                None,
            )
            .await
            .map_err(|e| db_error("set user organization", e))?;

        if result.matched_count == 0 {
            return Err(ServiceError::NotFound("User"));
        }
        Ok(())
    }

    async fn record_login(&self, id: &str, at: DateTime<Utc>) -> Result<(), ServiceError> {
        self.users()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "last_login": BsonDateTime::from_chrono(at) } },
                None,
            )
            .await
            .map_err(|e| db_error("record login", e))?;
        Ok(())
    }

    async fn set_grant(
        &self,
        id: &str,
        kind: GrantKind,
        grant: &TokenGrant,
    ) -> Result<(), ServiceError> {
        let mut set = Document::new();
        set.insert(
            kind.field(),
            doc! {
                "token_hash": &grant.token_hash,
                "expires_at": BsonDateTime::from_chrono(grant.expires_at),
            },
        );

        let result = self
            .users()
            .update_one(doc! { "_id": id }, doc! { "$set": set }, None)
            .await
            .map_err(|e| db_error("store token grant", e))?;

        if result.matched_count == 0 {
            return Err(ServiceError::NotFound("User"));
        }
        Ok(())
    }

    async fn consume_grant(
        &self,
        kind: GrantKind,
        token_hash: &str,
        now: DateTime<Utc>,
        effect: GrantEffect,
    ) -> Result<Option<User>, ServiceError> {
        let field = kind.field();

        let mut filter = Document::new();
        filter.insert(format!("{}.token_hash", field), token_hash);
        filter.insert(
            format!("{}.expires_at", field),
            doc! { "$gt": BsonDateTime::from_chrono(now) },
        );

        let mut set = doc! { "updated_at": BsonDateTime::from_chrono(now) };
        match effect {
            GrantEffect::SetPassword(hash) => {
                set.insert("password_hash", hash);
            }
            GrantEffect::MarkVerified => {
                set.insert("verified", true);
            }
        }
        let mut unset = Document::new();
        unset.insert(field, "");

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        self.users()
            .find_one_and_update(filter, doc! { "$set": set, "$unset": unset }, options)
            .await
            .map_err(|e| db_error("consume token grant", e))
    }
}

#[async_trait]
impl OrganizationStore for MongoDb {
    async fn insert_organization(&self, org: &Organization) -> Result<(), ServiceError> {
        match self.organizations().insert_one(org, None).await {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_key(&e) => Err(ServiceError::Conflict(format!(
                "Organization slug '{}' already taken",
                org.slug
            ))),
            Err(e) => Err(db_error("insert organization", e)),
        }
    }

    async fn find_organization(&self, id: &str) -> Result<Option<Organization>, ServiceError> {
        self.organizations()
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| db_error("find organization", e))
    }

    async fn find_organization_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Organization>, ServiceError> {
        self.organizations()
            .find_one(doc! { "slug": slug }, None)
            .await
            .map_err(|e| db_error("find organization by slug", e))
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>, ServiceError> {
        let options = FindOptions::builder().sort(doc! { "name": 1 }).build();
        let cursor = self
            .organizations()
            .find(doc! {}, options)
            .await
            .map_err(|e| db_error("list organizations", e))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| db_error("collect organizations", e))
    }

    async fn replace_organization(&self, org: &Organization) -> Result<(), ServiceError> {
        let result = match self
            .organizations()
            .replace_one(doc! { "_id": &org.id }, org, None)
            .await
        {
            Ok(result) => result,
            Err(e) if is_duplicate_key(&e) => {
                return Err(ServiceError::Conflict(format!(
                    "Organization slug '{}' already taken",
                    org.slug
                )))
            }
            Err(e) => return Err(db_error("replace organization", e)),
        };

        if result.matched_count == 0 {
            return Err(ServiceError::NotFound("Organization"));
        }
        Ok(())
    }

    async fn delete_organization(&self, id: &str) -> Result<bool, ServiceError> {
        let result = self
            .organizations()
            .delete_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| db_error("delete organization", e))?;
        Ok(result.deleted_count > 0)
    }
}

#[async_trait]
impl ContentStore for MongoDb {
    async fn insert_content(&self, item: &ContentItem) -> Result<(), ServiceError> {
        self.content(item.kind)
            .insert_one(item, None)
            .await
            .map_err(|e| db_error("insert content", e))?;
        Ok(())
    }

    async fn find_content(
        &self,
        kind: ResourceKind,
        id: &str,
    ) -> Result<Option<ContentItem>, ServiceError> {
        self.content(kind)
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| db_error("find content", e))
    }

    async fn list_content(
        &self,
        kind: ResourceKind,
        organization: Option<&str>,
    ) -> Result<Vec<ContentItem>, ServiceError> {
        let filter = match organization {
            Some(org) => doc! { "organization": org },
            None => doc! {},
        };
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();

        let cursor = self
            .content(kind)
            .find(filter, options)
            .await
            .map_err(|e| db_error("list content", e))?;
        cursor
            .try_collect()
            .await
            .map_err(|e| db_error("collect content", e))
    }

    async fn replace_content(&self, item: &ContentItem) -> Result<(), ServiceError> {
        let result = self
            .content(item.kind)
            .replace_one(doc! { "_id": &item.id }, item, None)
            .await
            .map_err(|e| db_error("replace content", e))?;

        if result.matched_count == 0 {
            return Err(ServiceError::NotFound("Content"));
        }
        Ok(())
    }

    async fn delete_content(&self, kind: ResourceKind, id: &str) -> Result<bool, ServiceError> {
        let result = self
            .content(kind)
            .delete_one(doc! { "_id": id }, None)
            .await
            .map_err(|e| db_error("delete content", e))?;
        Ok(result.deleted_count > 0)
    }

    async fn delete_organization_content(&self, organization: &str) -> Result<u64, ServiceError> {
        let mut deleted = 0;
        for kind in ResourceKind::ALL {
            let result = self
                .content(kind)
                .delete_many(doc! { "organization": organization }, None)
                .await
                .map_err(|e| db_error("delete organization content", e))?;
            deleted += result.deleted_count;
        }
        Ok(deleted)
    }
}

#[async_trait]
impl Store for MongoDb {
    async fn health_check(&self) -> Result<(), ServiceError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| db_error("ping MongoDB", e))?;
        Ok(())
    }
}
