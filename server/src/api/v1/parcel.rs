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
    lifecycle::{DeliveryStatus, ParcelStatus, PaymentStatus},
    mongo_ext::Collection,
    util::{FormattedDateTime, ObjectIdString, PathObjectId},
};

use super::auth::Principal;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParcelModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_email: String,

    pub title: String,
    pub weight: f64,
    pub cost: f64,

    pub payment_status: PaymentStatus,
    pub status: ParcelStatus,
    #[serde(default)]
    pub delivery_status: DeliveryStatus,

    pub transaction_id: Option<String>,
    pub assigned_rider: Option<ObjectId>,

    pub rider_id: Option<ObjectId>,
    pub rider_name: Option<String>,
    pub rider_email: Option<String>,

    pub created_at: bson::DateTime,
}

#[derive(Clone)]
pub struct ParcelCollection(pub Collection<ParcelModel>);

impl std::ops::Deref for ParcelCollection {
    type Target = Collection<ParcelModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Parcel {
    pub id: ObjectIdString,
    pub user_email: String,

    pub title: String,
    pub weight: f64,
    pub cost: f64,

    pub payment_status: PaymentStatus,
    pub status: ParcelStatus,
    pub delivery_status: DeliveryStatus,

    pub transaction_id: Option<String>,
    pub assigned_rider: Option<ObjectIdString>,

    pub rider_id: Option<ObjectIdString>,
    pub rider_name: Option<String>,
    pub rider_email: Option<String>,

    pub created_at: FormattedDateTime,
}

impl From<ParcelModel> for Parcel {
    fn from(parcel: ParcelModel) -> Self {
        Self {
            id: parcel.id.into(),
            user_email: parcel.user_email,

            title: parcel.title,
            weight: parcel.weight,
            cost: parcel.cost,

            payment_status: parcel.payment_status,
            status: parcel.status,
            delivery_status: parcel.delivery_status,

            transaction_id: parcel.transaction_id,
            assigned_rider: parcel.assigned_rider.map(Into::into),

            rider_id: parcel.rider_id.map(Into::into),
            rider_name: parcel.rider_name,
            rider_email: parcel.rider_email,

            created_at: parcel.created_at.into(),
        }
    }
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct CreateRequest {
    #[validate(email)]
    pub user_email: String,

    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(range(min = 0.0))]
    pub weight: f64,

    #[validate(range(min = 0.0))]
    pub cost: f64,
}

#[tracing::instrument(skip_all, fields(owner = %request.user_email))]
pub async fn create(
    State(parcels): State<ParcelCollection>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<Parcel>, Error> {
    request.validate()?;

    let model = ParcelModel {
        id: ObjectId::new(),
        user_email: request.user_email,

        title: request.title,
        weight: request.weight,
        cost: request.cost,

        payment_status: PaymentStatus::Unpaid,
        status: ParcelStatus::Pending,
        delivery_status: DeliveryStatus::None,

        transaction_id: None,
        assigned_rider: None,

        rider_id: None,
        rider_name: None,
        rider_email: None,

        created_at: OffsetDateTime::now_utc().into(),
    };

    tracing::debug!("creating parcel {:?}", model.id);
    parcels.insert_one(&model, None).await?;

    Ok(Json(model.into()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct IndexResponse {
    pub parcels: Vec<Parcel>,
}

#[derive(Deserialize)]
pub struct OwnerQuery {
    pub email: Option<String>,
}

pub async fn mine(
    State(parcels): State<ParcelCollection>,
    principal: Principal,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<IndexResponse>, Error> {
    let email = query.email.ok_or(Error::MissingField("email"))?;

    principal.require_owner(&email)?;

    let mut cursor = parcels
        .find(
            bson::doc! {
                "user_email": &email
            },
            None,
        )
        .await?;

    let mut result = vec![];

    while cursor.advance().await? {
        result.push(cursor.deserialize_current()?.into());
    }

    Ok(Json(IndexResponse { parcels: result }))
}

#[derive(Deserialize)]
pub struct AssignableQuery {
    pub payment_status: Option<PaymentStatus>,
    pub status: Option<ParcelStatus>,
}

pub async fn assignable(
    State(parcels): State<ParcelCollection>,
    Query(query): Query<AssignableQuery>,
) -> Result<Json<IndexResponse>, Error> {
    let mut filter = bson::doc! {};

    if let Some(payment_status) = query.payment_status {
        filter.insert("payment_status", bson::to_bson(&payment_status)?);
    }

    if let Some(status) = query.status {
        filter.insert("status", bson::to_bson(&status)?);
    }

    let mut cursor = parcels.find(filter, None).await?;

    let mut result = vec![];

    while cursor.advance().await? {
        result.push(cursor.deserialize_current()?.into());
    }

    Ok(Json(IndexResponse { parcels: result }))
}

pub async fn show(
    State(parcels): State<ParcelCollection>,
    PathObjectId(parcel_id): PathObjectId,
) -> Result<Json<Parcel>, Error> {
    let parcel = parcels
        .find_one_by_id(parcel_id)
        .await?
        .ok_or(Error::NotFound("parcel"))
        .tap_err(|_| tracing::debug!("tried accessing non existing parcel"))?;

    Ok(Json(parcel.into()))
}

#[tracing::instrument(skip_all, fields(id = %parcel_id))]
pub async fn delete(
    State(parcels): State<ParcelCollection>,
    PathObjectId(parcel_id): PathObjectId,
) -> Result<(), Error> {
    let deleted = parcels.delete_one_by_id(parcel_id).await?;

    if deleted == 0 {
        return Err(Error::NotFound("parcel"))
            .tap_err(|_| tracing::debug!("tried deleting non existing parcel"));
    }

    Ok(())
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AssignRequest {
    pub rider_id: ObjectIdString,
}

// coarse assignment; rider existence is intentionally not checked here
#[tracing::instrument(skip_all, fields(id = %parcel_id))]
pub async fn assign(
    State(parcels): State<ParcelCollection>,
    PathObjectId(parcel_id): PathObjectId,
    Json(request): Json<AssignRequest>,
) -> Result<(), Error> {
    let updated = parcels
        .update_one_by_id(
            parcel_id,
            bson::doc! {
                "$set": {
                    "assigned_rider": *request.rider_id,
                    "status": bson::to_bson(&ParcelStatus::Assigned)?,
                }
            },
        )
        .await?;

    if updated.matched_count == 0 {
        return Err(Error::NotFound("parcel"));
    }

    Ok(())
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct DispatchRequest {
    pub rider_id: ObjectIdString,

    #[validate(length(min = 1, max = 124))]
    pub rider_name: String,

    #[validate(email)]
    pub rider_email: String,
}

#[tracing::instrument(skip_all, fields(id = %parcel_id))]
pub async fn dispatch(
    State(parcels): State<ParcelCollection>,
    PathObjectId(parcel_id): PathObjectId,
    Json(request): Json<DispatchRequest>,
) -> Result<Json<Parcel>, Error> {
    request.validate()?;

    let mut parcel = parcels
        .find_one_by_id(parcel_id)
        .await?
        .ok_or(Error::NotFound("parcel"))?;

    parcel.delivery_status = parcel
        .delivery_status
        .advance(DeliveryStatus::RiderAssign)?;
    parcel.rider_id = Some(*request.rider_id);
    parcel.rider_name = Some(request.rider_name);
    parcel.rider_email = Some(request.rider_email);

    parcels
        .update_one_by_id(
            parcel_id,
            bson::doc! {
                "$set": {
                    "rider_id": parcel.rider_id,
                    "rider_name": parcel.rider_name.clone(),
                    "rider_email": parcel.rider_email.clone(),
                    "delivery_status": bson::to_bson(&parcel.delivery_status)?,
                }
            },
        )
        .await?;

    Ok(Json(parcel.into()))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AdvanceRequest {
    pub delivery_status: DeliveryStatus,
}

#[tracing::instrument(skip_all, fields(id = %parcel_id, to = %request.delivery_status))]
pub async fn advance_delivery(
    State(parcels): State<ParcelCollection>,
    PathObjectId(parcel_id): PathObjectId,
    Json(request): Json<AdvanceRequest>,
) -> Result<Json<Parcel>, Error> {
    let mut parcel = parcels
        .find_one_by_id(parcel_id)
        .await?
        .ok_or(Error::NotFound("parcel"))?;

    parcel.delivery_status = parcel.delivery_status.advance(request.delivery_status)?;

    parcels
        .update_one_by_id(
            parcel_id,
            bson::doc! {
                "$set": {
                    "delivery_status": bson::to_bson(&parcel.delivery_status)?,
                }
            },
        )
        .await?;

    Ok(Json(parcel.into()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::{extract::Query, Json};
    use bson::oid::ObjectId;

    use crate::{
        api::v1::tests::bootstrap,
        error::Error,
        lifecycle::{DeliveryStatus, ParcelStatus, PaymentStatus, TransitionError},
    };

    use super::{AdvanceRequest, AssignRequest, CreateRequest, DispatchRequest, OwnerQuery};

    fn create_request(owner: &str) -> CreateRequest {
        CreateRequest {
            user_email: owner.to_string(),
            title: "documents".to_string(),
            weight: 1.5,
            cost: 100.0,
        }
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB replica set"]
    async fn test_create_defaults() {
        let bootstrap = bootstrap().await;

        let Json(parcel) = super::create(
            bootstrap.parcel_collection(),
            Json(create_request("a@x.com")),
        )
        .await
        .unwrap();

        assert_eq!(parcel.payment_status, PaymentStatus::Unpaid);
        assert_eq!(parcel.status, ParcelStatus::Pending);
        assert_eq!(parcel.delivery_status, DeliveryStatus::None);

        let model = bootstrap
            .app_state
            .parcel_collection
            .find_one_by_id(*parcel.id)
            .await
            .unwrap()
            .expect("parcel should exist after create");

        assert_eq!(model.user_email, "a@x.com");
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB replica set"]
    async fn test_mine_checks_principal() {
        let bootstrap = bootstrap().await;

        let _ = super::create(
            bootstrap.parcel_collection(),
            Json(create_request("a@x.com")),
        )
        .await
        .unwrap();

        let Json(response) = super::mine(
            bootstrap.parcel_collection(),
            bootstrap.principal("a@x.com"),
            Query(OwnerQuery {
                email: Some("a@x.com".to_string()),
            }),
        )
        .await
        .unwrap();

        assert_eq!(response.parcels.len(), 1);

        let error = super::mine(
            bootstrap.parcel_collection(),
            bootstrap.principal("b@x.com"),
            Query(OwnerQuery {
                email: Some("a@x.com".to_string()),
            }),
        )
        .await
        .unwrap_err();

        assert_matches!(error, Error::Forbidden);

        let error = super::mine(
            bootstrap.parcel_collection(),
            bootstrap.principal("a@x.com"),
            Query(OwnerQuery { email: None }),
        )
        .await
        .unwrap_err();

        assert_matches!(error, Error::MissingField("email"));
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB replica set"]
    async fn test_assign_marks_parcel() {
        let bootstrap = bootstrap().await;

        let Json(parcel) = super::create(
            bootstrap.parcel_collection(),
            Json(create_request("a@x.com")),
        )
        .await
        .unwrap();

        let rider_id = ObjectId::new();

        super::assign(
            bootstrap.parcel_collection(),
            super::PathObjectId(*parcel.id),
            Json(AssignRequest {
                rider_id: rider_id.into(),
            }),
        )
        .await
        .unwrap();

        let model = bootstrap
            .app_state
            .parcel_collection
            .find_one_by_id(*parcel.id)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(model.status, ParcelStatus::Assigned);
        assert_eq!(model.assigned_rider, Some(rider_id));
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB replica set"]
    async fn test_dispatch_then_advance() {
        let bootstrap = bootstrap().await;

        let Json(parcel) = super::create(
            bootstrap.parcel_collection(),
            Json(create_request("a@x.com")),
        )
        .await
        .unwrap();

        let Json(parcel) = super::dispatch(
            bootstrap.parcel_collection(),
            super::PathObjectId(*parcel.id),
            Json(DispatchRequest {
                rider_id: ObjectId::new().into(),
                rider_name: "rider".to_string(),
                rider_email: "rider@x.com".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(parcel.delivery_status, DeliveryStatus::RiderAssign);

        let Json(parcel) = super::advance_delivery(
            bootstrap.parcel_collection(),
            super::PathObjectId(*parcel.id),
            Json(AdvanceRequest {
                delivery_status: DeliveryStatus::PickedUp,
            }),
        )
        .await
        .unwrap();

        assert_eq!(parcel.delivery_status, DeliveryStatus::PickedUp);

        let error = super::advance_delivery(
            bootstrap.parcel_collection(),
            super::PathObjectId(*parcel.id),
            Json(AdvanceRequest {
                delivery_status: DeliveryStatus::RiderAssign,
            }),
        )
        .await
        .unwrap_err();

        assert_matches!(
            error,
            Error::InvalidTransition(TransitionError::DeliveryOrder { .. })
        );
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB replica set"]
    async fn test_non_existing_parcel() {
        let bootstrap = bootstrap().await;

        let id = ObjectId::new();

        let error = super::show(bootstrap.parcel_collection(), super::PathObjectId(id))
            .await
            .unwrap_err();
        assert_matches!(error, Error::NotFound("parcel"));

        let error = super::delete(bootstrap.parcel_collection(), super::PathObjectId(id))
            .await
            .unwrap_err();
        assert_matches!(error, Error::NotFound("parcel"));

        let error = super::assign(
            bootstrap.parcel_collection(),
            super::PathObjectId(id),
            Json(AssignRequest {
                rider_id: ObjectId::new().into(),
            }),
        )
        .await
        .unwrap_err();
        assert_matches!(error, Error::NotFound("parcel"));
    }

    #[tokio::test]
    #[ignore = "requires a MongoDB replica set"]
    async fn test_create_rejects_negative_cost() {
        let bootstrap = bootstrap().await;

        let error = super::create(
            bootstrap.parcel_collection(),
            Json(CreateRequest {
                cost: -1.0,
                ..create_request("a@x.com")
            }),
        )
        .await
        .unwrap_err();

        assert_matches!(error, Error::ValidationError(_));
    }
}
