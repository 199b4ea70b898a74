use serde::Deserialize;

use crate::error::Error;

const PAYMENT_INTENT_URL: &str = "https://api.stripe.com/v1/payment_intents";

// the returned client secret is handed back to the caller verbatim and
// never interpreted here
#[derive(Clone)]
pub struct ChargeClient {
    http: reqwest::Client,
    secret_key: String,
}

#[derive(Deserialize)]
struct PaymentIntent {
    client_secret: String,
}

impl ChargeClient {
    pub fn new(secret_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
        }
    }

    pub fn new_from_env() -> Self {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .expect("Cannot retreive STRIPE_SECRET_KEY from environment variable.");

        Self::new(secret_key)
    }

    pub async fn create_payment_intent(
        &self,
        amount_in_cents: i64,
        currency: &str,
    ) -> Result<String, Error> {
        let intent: PaymentIntent = self
            .http
            .post(PAYMENT_INTENT_URL)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&[
                ("amount", amount_in_cents.to_string()),
                ("currency", currency.to_string()),
                ("payment_method_types[]", "card".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(intent.client_secret)
    }
}
