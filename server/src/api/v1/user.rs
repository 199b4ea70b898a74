use axum::{
    extract::{Query, State},
    Json,
};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use tap::TapFallible;
use time::OffsetDateTime;
use validator::Validate;

use crate::{
    error::Error,
    lifecycle::{self, RoleChange, RoleTrigger, UserRole},
    mongo_ext::Collection,
    util::{FormattedDateTime, ObjectIdString, PathObjectId},
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub email: String,
    pub name: String,

    #[serde(default)]
    pub role: UserRole,

    // present iff role is admin and the user was promoted from a
    // non-admin role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_role: Option<UserRole>,

    pub created_at: bson::DateTime,
}

#[derive(Clone)]
pub struct UserCollection(pub Collection<UserModel>);

impl std::ops::Deref for UserCollection {
    type Target = Collection<UserModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: ObjectIdString,

    pub email: String,
    pub name: String,

    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_role: Option<UserRole>,

    pub created_at: FormattedDateTime,
}

impl From<UserModel> for User {
    fn from(user: UserModel) -> Self {
        Self {
            id: user.id.into(),

            email: user.email,
            name: user.name,

            role: user.role,
            prev_role: user.prev_role,

            created_at: user.created_at.into(),
        }
    }
}

// prev_role is written together with the new role, or unset when the
// change clears it
pub fn role_update(change: &RoleChange) -> Result<bson::Document, Error> {
    let update = match change.prev_role {
        Some(prev_role) => bson::doc! {
            "$set": {
                "role": bson::to_bson(&change.role)?,
                "prev_role": bson::to_bson(&prev_role)?,
            }
        },
        None => bson::doc! {
            "$set": {
                "role": bson::to_bson(&change.role)?,
            },
            "$unset": {
                "prev_role": "",
            },
        },
    };

    Ok(update)
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct CreateRequest {
    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1, max = 124))]
    pub name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectIdString>,
}

// first-signup upsert: signing in again with a known email is a no-op
#[tracing::instrument(skip_all, fields(email = %request.email))]
pub async fn create(
    State(users): State<UserCollection>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<CreateResponse>, Error> {
    request.validate()?;

    let exists = users
        .find_one(
            bson::doc! {
                "email": &request.email
            },
            None,
        )
        .await?;

    if exists.is_some() {
        return Ok(Json(CreateResponse {
            message: "User already exists".to_string(),
            id: None,
        }));
    }

    let model = UserModel {
        id: ObjectId::new(),

        email: request.email,
        name: request.name,

        role: UserRole::User,
        prev_role: None,

        created_at: OffsetDateTime::now_utc().into(),
    };

    users.insert_one(&model, None).await?;

    Ok(Json(CreateResponse {
        message: "User added".to_string(),
        id: Some(model.id.into()),
    }))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IndexResponse {
    pub users: Vec<User>,
}

pub async fn index(State(users): State<UserCollection>) -> Result<Json<IndexResponse>, Error> {
    let mut cursor = users.find(None, None).await?;

    let mut result = vec![];

    while cursor.advance().await? {
        result.push(cursor.deserialize_current()?.into());
    }

    Ok(Json(IndexResponse { users: result }))
}

#[derive(Deserialize)]
pub struct RoleQuery {
    pub email: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RoleResponse {
    pub role: UserRole,
}

pub async fn role(
    State(users): State<UserCollection>,
    Query(query): Query<RoleQuery>,
) -> Result<Json<RoleResponse>, Error> {
    let email = query.email.ok_or(Error::MissingField("email"))?;

    let user = users
        .find_one(
            bson::doc! {
                "email": &email
            },
            None,
        )
        .await?
        .ok_or(Error::NotFound("user"))
        .tap_err(|_| tracing::debug!("tried looking up role of non existing user"))?;

    Ok(Json(RoleResponse { role: user.role }))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ToggleRoleResponse {
    pub new_role: UserRole,
    pub modified_count: u64,
}

#[tracing::instrument(skip_all, fields(id = %user_id))]
pub async fn toggle_role(
    State(users): State<UserCollection>,
    PathObjectId(user_id): PathObjectId,
) -> Result<Json<ToggleRoleResponse>, Error> {
    let user = users
        .find_one_by_id(user_id)
        .await?
        .ok_or(Error::NotFound("user"))
        .tap_err(|_| tracing::debug!("tried toggling role of non existing user"))?;

    let change = lifecycle::apply_role_trigger(RoleTrigger::AdminToggle, user.role, user.prev_role);

    let updated = users
        .update_one_by_id(user_id, role_update(&change)?)
        .await?;

    Ok(Json(ToggleRoleResponse {
        new_role: change.role,
        modified_count: updated.modified_count,
    }))
}
