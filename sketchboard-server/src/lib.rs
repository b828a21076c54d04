use std::sync::Arc;

use warp::Filter;

pub mod config;
pub mod room_actor;
pub mod websocket;

use room_actor::AppState;

pub fn create_routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let state_filter = warp::any().map({
        let state = state.clone();
        move || state.clone()
    });

    let websocket = warp::path("ws")
        .and(warp::ws())
        .and(state_filter.clone())
        .map(|ws: warp::ws::Ws, state: Arc<AppState>| {
            ws.on_upgrade(move |socket| websocket::handle_connection(socket, state))
        });

    let health = warp::path("health")
        .and(warp::get())
        .map(|| warp::reply::with_status("OK", warp::http::StatusCode::OK));

    let static_dir = state.config.static_dir.clone();
    let static_files = warp::fs::dir(static_dir);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST"])
        .allow_headers(vec!["content-type"]);

    websocket
        .or(health)
        .or(static_files)
        .with(cors)
        .with(warp::log("sketchboard_server"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let state = Arc::new(AppState::new(Config::new()));
        let routes = create_routes(state);

        let response = warp::test::request().path("/health").reply(&routes).await;

        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), "OK");
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let state = Arc::new(AppState::new(Config::new()));
        let routes = create_routes(state);

        let response = warp::test::request().path("/nope").reply(&routes).await;

        assert_eq!(response.status(), 404);
    }
}
