use std::net::SocketAddr;

use axum::{routing, Router};
use pathoway::app::AppState;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "pathoway=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app_state = AppState::new_from_env().await.unwrap();

    let api = Router::new().nest(
        "/v1",
        Router::new()
            .nest(
                "/parcel",
                Router::new()
                    .route("/", routing::post(pathoway::api::v1::parcel::create))
                    .route("/mine", routing::get(pathoway::api::v1::parcel::mine))
                    .route(
                        "/assignable",
                        routing::get(pathoway::api::v1::parcel::assignable),
                    )
                    .route("/:id", routing::get(pathoway::api::v1::parcel::show))
                    .route("/:id", routing::delete(pathoway::api::v1::parcel::delete))
                    .route(
                        "/:id/assign",
                        routing::patch(pathoway::api::v1::parcel::assign),
                    )
                    .route(
                        "/:id/dispatch",
                        routing::put(pathoway::api::v1::parcel::dispatch),
                    )
                    .route(
                        "/:id/delivery-status",
                        routing::patch(pathoway::api::v1::parcel::advance_delivery),
                    ),
            )
            .nest(
                "/payment",
                Router::new()
                    .route(
                        "/intent",
                        routing::post(pathoway::api::v1::payment::create_intent),
                    )
                    .route(
                        "/success",
                        routing::post(pathoway::api::v1::payment::success),
                    )
                    .route(
                        "/history",
                        routing::get(pathoway::api::v1::payment::history),
                    ),
            )
            .nest(
                "/rider",
                Router::new()
                    .route("/", routing::post(pathoway::api::v1::rider::apply))
                    .route("/", routing::get(pathoway::api::v1::rider::index_pending))
                    .route(
                        "/accepted",
                        routing::get(pathoway::api::v1::rider::index_accepted),
                    )
                    .route(
                        "/available",
                        routing::get(pathoway::api::v1::rider::available),
                    )
                    .route("/:id", routing::get(pathoway::api::v1::rider::show))
                    .route("/:id", routing::delete(pathoway::api::v1::rider::delete))
                    .route(
                        "/:id/accept",
                        routing::put(pathoway::api::v1::rider::accept),
                    ),
            )
            .nest(
                "/user",
                Router::new()
                    .route("/", routing::post(pathoway::api::v1::user::create))
                    .route("/", routing::get(pathoway::api::v1::user::index))
                    .route("/role", routing::get(pathoway::api::v1::user::role))
                    .route(
                        "/:id/role",
                        routing::patch(pathoway::api::v1::user::toggle_role),
                    ),
            )
            .nest(
                "/dashboard",
                Router::new().route(
                    "/summary",
                    routing::get(pathoway::api::v1::dashboard::summary),
                ),
            ),
    );

    let app = Router::new()
        .route("/", routing::get(|| async { "pathoway server is running" }))
        .nest("/api", api)
        .with_state(app_state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let port = std::env::var("PORT")
        .ok()
        .and_then(|it| it.parse().ok())
        .unwrap_or(3000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::debug!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}
