use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{error::Error, lifecycle::UserRole};

use super::{parcel::ParcelCollection, rider::RiderCollection, user::UserCollection};

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ParcelSummary {
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub pending: i64,
    #[serde(default)]
    pub delivered: i64,
    #[serde(default)]
    pub paid: i64,
    #[serde(default)]
    pub total_income: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct RiderSummary {
    #[serde(default)]
    pub total: i64,
    #[serde(default)]
    pub free: i64,
    #[serde(default)]
    pub accepted: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct UserSummary {
    pub total: i64,
    pub admin: i64,
    pub rider: i64,
    pub user: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SummaryResponse {
    pub parcels: ParcelSummary,
    pub riders: RiderSummary,
    pub users: UserSummary,
}

#[derive(Deserialize, Debug, Clone)]
struct RoleRow {
    #[serde(rename = "_id")]
    role: Option<UserRole>,
    count: i64,
}

// group rows only exist for roles present in the data; absent roles stay 0.
// rows with an unknown or missing role still count towards the total
fn fold_role_counts(rows: impl IntoIterator<Item = RoleRow>) -> UserSummary {
    let mut summary = UserSummary::default();

    for row in rows {
        summary.total += row.count;

        match row.role {
            Some(UserRole::Admin) => summary.admin += row.count,
            Some(UserRole::Rider) => summary.rider += row.count,
            Some(UserRole::User) => summary.user += row.count,
            None => {}
        }
    }

    summary
}

async fn parcel_summary(parcels: &ParcelCollection) -> Result<ParcelSummary, Error> {
    let pipeline = vec![bson::doc! {
        "$group": {
            "_id": null,
            "total": { "$sum": 1 },
            "pending": {
                "$sum": { "$cond": [{ "$eq": ["$status", "pending"] }, 1, 0] }
            },
            "delivered": {
                "$sum": { "$cond": [{ "$eq": ["$delivery_status", "delivered"] }, 1, 0] }
            },
            "paid": {
                "$sum": { "$cond": [{ "$eq": ["$payment_status", "paid"] }, 1, 0] }
            },
            "total_income": {
                "$sum": { "$cond": [{ "$eq": ["$payment_status", "paid"] }, "$cost", 0] }
            },
        }
    }];

    let mut cursor = parcels.aggregate(pipeline, None).await?;

    // an empty collection yields no group row at all
    if cursor.advance().await? {
        bson::from_document(cursor.deserialize_current()?).map_err(Into::into)
    } else {
        Ok(ParcelSummary::default())
    }
}

async fn rider_summary(riders: &RiderCollection) -> Result<RiderSummary, Error> {
    let pipeline = vec![bson::doc! {
        "$group": {
            "_id": null,
            "total": { "$sum": 1 },
            "free": {
                "$sum": { "$cond": [{ "$eq": ["$work_status", "free"] }, 1, 0] }
            },
            "accepted": {
                "$sum": { "$cond": [{ "$eq": ["$status", "accepted"] }, 1, 0] }
            },
        }
    }];

    let mut cursor = riders.aggregate(pipeline, None).await?;

    if cursor.advance().await? {
        bson::from_document(cursor.deserialize_current()?).map_err(Into::into)
    } else {
        Ok(RiderSummary::default())
    }
}

async fn user_summary(users: &UserCollection) -> Result<UserSummary, Error> {
    let pipeline = vec![bson::doc! {
        "$group": {
            "_id": "$role",
            "count": { "$sum": 1 },
        }
    }];

    let mut cursor = users.aggregate(pipeline, None).await?;

    let mut rows = vec![];

    while cursor.advance().await? {
        rows.push(bson::from_document(cursor.deserialize_current()?)?);
    }

    Ok(fold_role_counts(rows))
}

// read-side only; one grouped pass per entity type, no cross-entity joins
pub async fn summary(
    State(parcels): State<ParcelCollection>,
    State(riders): State<RiderCollection>,
    State(users): State<UserCollection>,
) -> Result<Json<SummaryResponse>, Error> {
    Ok(Json(SummaryResponse {
        parcels: parcel_summary(&parcels).await?,
        riders: rider_summary(&riders).await?,
        users: user_summary(&users).await?,
    }))
}
