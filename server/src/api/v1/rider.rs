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
    lifecycle::{self, RiderStatus, RoleTrigger, WorkStatus},
    mongo_ext::Collection,
    util::{FormattedDateTime, ObjectIdString, PathObjectId},
};

use super::user::UserCollection;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RiderModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub name: String,
    pub email: String,
    pub phone: String,

    pub region: String,
    pub warehouse: String,

    pub status: RiderStatus,
    #[serde(default)]
    pub work_status: WorkStatus,

    pub created_at: bson::DateTime,
}

#[derive(Clone)]
pub struct RiderCollection(pub Collection<RiderModel>);

impl std::ops::Deref for RiderCollection {
    type Target = Collection<RiderModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Rider {
    pub id: ObjectIdString,

    pub name: String,
    pub email: String,
    pub phone: String,

    pub region: String,
    pub warehouse: String,

    pub status: RiderStatus,
    pub work_status: WorkStatus,

    pub created_at: FormattedDateTime,
}

impl From<RiderModel> for Rider {
    fn from(rider: RiderModel) -> Self {
        Self {
            id: rider.id.into(),

            name: rider.name,
            email: rider.email,
            phone: rider.phone,

            region: rider.region,
            warehouse: rider.warehouse,

            status: rider.status,
            work_status: rider.work_status,

            created_at: rider.created_at.into(),
        }
    }
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct ApplyRequest {
    #[validate(length(min = 1, max = 124))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(min = 1, max = 32))]
    pub phone: String,

    #[validate(length(min = 1, max = 124))]
    pub region: String,

    #[validate(length(min = 1, max = 124))]
    pub warehouse: String,
}

// applications always start pending, whatever the caller sends
#[tracing::instrument(skip_all, fields(email = %request.email))]
pub async fn apply(
    State(riders): State<RiderCollection>,
    Json(request): Json<ApplyRequest>,
) -> Result<Json<Rider>, Error> {
    request.validate()?;

    let model = RiderModel {
        id: ObjectId::new(),

        name: request.name,
        email: request.email,
        phone: request.phone,

        region: request.region,
        warehouse: request.warehouse,

        status: RiderStatus::Pending,
        work_status: WorkStatus::Free,

        created_at: OffsetDateTime::now_utc().into(),
    };

    riders.insert_one(&model, None).await?;

    Ok(Json(model.into()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IndexResponse {
    pub riders: Vec<Rider>,
}

async fn index_by_status(
    riders: &RiderCollection,
    status: RiderStatus,
) -> Result<IndexResponse, Error> {
    let mut cursor = riders
        .find(
            bson::doc! {
                "status": bson::to_bson(&status)?
            },
            None,
        )
        .await?;

    let mut result = vec![];

    while cursor.advance().await? {
        result.push(cursor.deserialize_current()?.into());
    }

    Ok(IndexResponse { riders: result })
}

pub async fn index_pending(
    State(riders): State<RiderCollection>,
) -> Result<Json<IndexResponse>, Error> {
    index_by_status(&riders, RiderStatus::Pending).await.map(Json)
}

pub async fn index_accepted(
    State(riders): State<RiderCollection>,
) -> Result<Json<IndexResponse>, Error> {
    index_by_status(&riders, RiderStatus::Accepted).await.map(Json)
}

#[derive(Deserialize)]
pub struct AvailableQuery {
    pub region: Option<String>,
    pub warehouse: Option<String>,
}

pub async fn available(
    State(riders): State<RiderCollection>,
    Query(query): Query<AvailableQuery>,
) -> Result<Json<IndexResponse>, Error> {
    let mut filter = bson::doc! {};

    if let Some(region) = query.region {
        filter.insert("region", region);
    }

    if let Some(warehouse) = query.warehouse {
        filter.insert("warehouse", warehouse);
    }

    let mut cursor = riders.find(filter, None).await?;

    let mut result = vec![];

    while cursor.advance().await? {
        result.push(cursor.deserialize_current()?.into());
    }

    Ok(Json(IndexResponse { riders: result }))
}

pub async fn show(
    State(riders): State<RiderCollection>,
    PathObjectId(rider_id): PathObjectId,
) -> Result<Json<Rider>, Error> {
    let rider = riders
        .find_one_by_id(rider_id)
        .await?
        .ok_or(Error::NotFound("rider"))
        .tap_err(|_| tracing::debug!("tried accessing non existing rider"))?;

    Ok(Json(rider.into()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AcceptResponse {
    pub rider: Rider,
    pub user_promoted: bool,
}

// the rider update and the linked user promotion share one transaction,
// so neither write lands without the other
#[tracing::instrument(skip_all, fields(id = %rider_id))]
pub async fn accept(
    State(riders): State<RiderCollection>,
    State(users): State<UserCollection>,
    State(mongo): State<mongodb::Client>,
    PathObjectId(rider_id): PathObjectId,
) -> Result<Json<AcceptResponse>, Error> {
    let mut session = mongo.start_session(None).await?;

    let transaction_options = mongodb::options::TransactionOptions::builder()
        .read_concern(mongodb::options::ReadConcern::snapshot())
        .write_concern(
            mongodb::options::WriteConcern::builder()
                .w(mongodb::options::Acknowledgment::Majority)
                .build(),
        )
        .selection_criteria(mongodb::options::SelectionCriteria::ReadPreference(
            mongodb::options::ReadPreference::Primary,
        ))
        .build();

    session.start_transaction(transaction_options).await?;

    let mut rider = riders
        .find_one_by_id_with_session(rider_id, &mut session)
        .await?
        .ok_or(Error::NotFound("rider"))
        .tap_err(|_| tracing::debug!("tried accepting non existing rider"))?;

    rider.status = RiderStatus::Accepted;

    riders
        .update_one_by_id_with_session(
            rider_id,
            bson::doc! {
                "$set": {
                    "status": bson::to_bson(&rider.status)?,
                }
            },
            &mut session,
        )
        .await?;

    let user = users
        .find_one_with_session(
            bson::doc! {
                "email": &rider.email
            },
            None,
            &mut session,
        )
        .await?;

    // a rider without an account is acceptable; only promote when linked
    let user_promoted = match user {
        Some(user) => {
            let change =
                lifecycle::apply_role_trigger(RoleTrigger::RiderPromotion, user.role, user.prev_role);

            users
                .update_one_by_id_with_session(
                    user.id,
                    super::user::role_update(&change)?,
                    &mut session,
                )
                .await?;

            true
        }
        None => {
            tracing::debug!("accepted rider has no linked user account");
            false
        }
    };

    session.commit_transaction().await?;

    Ok(Json(AcceptResponse {
        rider: rider.into(),
        user_promoted,
    }))
}

#[tracing::instrument(skip_all, fields(id = %rider_id))]
pub async fn delete(
    State(riders): State<RiderCollection>,
    PathObjectId(rider_id): PathObjectId,
) -> Result<(), Error> {
    let deleted = riders.delete_one_by_id(rider_id).await?;

    if deleted == 0 {
        return Err(Error::NotFound("rider"))
            .tap_err(|_| tracing::debug!("tried deleting non existing rider"));
    }

    Ok(())
}
