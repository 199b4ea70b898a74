use axum::extract::FromRef;

use crate::api::v1::{
    parcel::ParcelCollection, payment::PaymentCollection, rider::RiderCollection,
    token::JwtState, user::UserCollection,
};
use crate::charge::ChargeClient;

#[derive(FromRef, Clone)]
pub struct AppState {
    pub jwt_state: JwtState,
    pub charge_client: ChargeClient,

    pub mongo_client: mongodb::Client,
    pub user_collection: UserCollection,
    pub parcel_collection: ParcelCollection,
    pub payment_collection: PaymentCollection,
    pub rider_collection: RiderCollection,
}

impl AppState {
    pub async fn new(
        mongo_url: &str,
        database_name: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let jwt_state = JwtState::new_from_env();
        let charge_client = ChargeClient::new_from_env();

        let mongo_client_opt = mongodb::options::ClientOptions::parse(mongo_url).await?;
        let mongo_client = mongodb::Client::with_options(mongo_client_opt)?;

        let db = mongo_client.database(database_name);
        Ok(Self {
            jwt_state,
            charge_client,

            mongo_client,
            user_collection: UserCollection(db.collection("users").into()),
            parcel_collection: ParcelCollection(db.collection("parcel").into()),
            payment_collection: PaymentCollection(db.collection("payments").into()),
            rider_collection: RiderCollection(db.collection("riders").into()),
        })
    }

    pub async fn new_from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let mongodb_url = &std::env::var("MONGODB_URI")
            .expect("Cannot retreive MONGODB_URI from environment variable.");

        Self::new(mongodb_url, "pathoway").await
    }
}
