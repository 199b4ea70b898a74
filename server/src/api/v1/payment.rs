use axum::{
    extract::{Query, State},
    Json,
};
use bson::oid::ObjectId;
use mongodb::options::FindOptions;
use serde::{Deserialize, Serialize};
use tap::TapFallible;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use validator::Validate;

use crate::{
    charge::ChargeClient,
    error::Error,
    lifecycle::PaymentStatus,
    mongo_ext::Collection,
    util::{FormattedDateTime, ObjectIdString},
};

use super::{
    auth::Principal,
    parcel::{OwnerQuery, ParcelCollection},
};

// append-only ledger row; inserted in the same transaction that marks the
// parcel paid, never updated or deleted afterwards
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PaymentModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub parcel_id: ObjectId,
    pub transaction_id: String,
    pub user_email: String,

    pub amount: f64,
    pub payment_status: PaymentStatus,

    pub paid_at: bson::DateTime,
    pub paid_at_string: String,
}

#[derive(Clone)]
pub struct PaymentCollection(pub Collection<PaymentModel>);

impl std::ops::Deref for PaymentCollection {
    type Target = Collection<PaymentModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Payment {
    pub id: ObjectIdString,
    pub parcel_id: ObjectIdString,
    pub transaction_id: String,
    pub user_email: String,

    pub amount: f64,
    pub payment_status: PaymentStatus,

    pub paid_at: FormattedDateTime,
    pub paid_at_string: String,
}

impl From<PaymentModel> for Payment {
    fn from(payment: PaymentModel) -> Self {
        Self {
            id: payment.id.into(),
            parcel_id: payment.parcel_id.into(),
            transaction_id: payment.transaction_id,
            user_email: payment.user_email,

            amount: payment.amount,
            payment_status: payment.payment_status,

            paid_at: payment.paid_at.into(),
            paid_at_string: payment.paid_at_string,
        }
    }
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct CreateIntentRequest {
    #[validate(range(min = 1))]
    pub amount_in_cents: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateIntentResponse {
    pub client_secret: String,
}

// the provider response is returned verbatim; nothing here inspects it
pub async fn create_intent(
    State(charge): State<ChargeClient>,
    Json(request): Json<CreateIntentRequest>,
) -> Result<Json<CreateIntentResponse>, Error> {
    request.validate()?;

    let client_secret = charge
        .create_payment_intent(request.amount_in_cents, "usd")
        .await?;

    Ok(Json(CreateIntentResponse { client_secret }))
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct SuccessRequest {
    pub parcel_id: ObjectIdString,

    #[validate(length(min = 1))]
    pub transaction_id: String,

    #[validate(range(min = 0.0))]
    pub amount: f64,

    #[validate(email)]
    pub user_email: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SuccessResponse {
    pub message: String,
    pub payment_id: ObjectIdString,
}

#[tracing::instrument(skip_all, fields(parcel = ?request.parcel_id))]
pub async fn success(
    State(parcels): State<ParcelCollection>,
    State(payments): State<PaymentCollection>,
    State(mongo): State<mongodb::Client>,
    Json(request): Json<SuccessRequest>,
) -> Result<Json<SuccessResponse>, Error> {
    request.validate()?;

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

    let parcel = parcels
        .find_one_by_id_with_session(*request.parcel_id, &mut session)
        .await?
        .ok_or(Error::NotFound("parcel"))
        .tap_err(|_| tracing::debug!("tried recording payment for non existing parcel"))?;

    let payment_status = parcel.payment_status.record_payment()?;

    parcels
        .update_one_by_id_with_session(
            parcel.id,
            bson::doc! {
                "$set": {
                    "payment_status": bson::to_bson(&payment_status)?,
                    "transaction_id": &request.transaction_id,
                }
            },
            &mut session,
        )
        .await?;

    let paid_at = OffsetDateTime::now_utc();

    let model = PaymentModel {
        id: ObjectId::new(),
        parcel_id: parcel.id,
        transaction_id: request.transaction_id,
        user_email: request.user_email,

        amount: request.amount,
        payment_status,

        paid_at: paid_at.into(),
        paid_at_string: paid_at.format(&Rfc3339)?,
    };

    payments
        .insert_one_with_session(&model, None, &mut session)
        .await?;

    session.commit_transaction().await?;

    Ok(Json(SuccessResponse {
        message: "Payment recorded successfully".to_string(),
        payment_id: model.id.into(),
    }))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct HistoryResponse {
    pub payments: Vec<Payment>,
}

pub async fn history(
    State(payments): State<PaymentCollection>,
    principal: Principal,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<HistoryResponse>, Error> {
    let email = query.email.ok_or(Error::MissingField("email"))?;

    principal.require_owner(&email)?;

    // latest first
    let options = FindOptions::builder()
        .sort(bson::doc! { "paid_at": -1 })
        .build();

    let mut cursor = payments
        .find(
            bson::doc! {
                "user_email": &email
            },
            options,
        )
        .await?;

    let mut result = vec![];

    while cursor.advance().await? {
        result.push(cursor.deserialize_current()?.into());
    }

    Ok(Json(HistoryResponse { payments: result }))
}
