use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers::{ask, characters, comics, magic, pages, session, stories};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;
    // Only image directories are public; the JSON stores stay private.
    let character_images = ServeDir::new(state.config.character_images_dir());
    let comic_images = ServeDir::new(state.config.comics_dir());
    let magic_images = ServeDir::new(state.config.magic_dir());

    Router::new()
        .route("/", get(pages::index))
        .route("/health", get(pages::health_check))
        .route("/archive", get(pages::archive))
        .route(
            "/api/characters",
            get(characters::list_characters).post(characters::create_from_description),
        )
        .route("/api/characters/upload", post(characters::upload_character))
        .route("/api/characters/:name", get(characters::get_character))
        .route("/api/stories", get(stories::list_stories))
        .route("/api/stories/generate", post(stories::generate_story))
        .route("/api/stories/approve", post(stories::approve_story))
        .route("/api/stories/:id", delete(stories::delete_story))
        .route("/api/session", get(session::get_session))
        .route("/api/session/story", put(session::send_story))
        .route(
            "/api/comics",
            get(comics::list_comics).post(comics::create_comic),
        )
        .route("/api/comics/:id", get(comics::get_comic))
        .route("/api/comics/:id/download", get(comics::download_comic))
        .route("/api/ask", post(ask::ask))
        .route("/api/magic/text-to-image", post(magic::text_to_image))
        .route("/api/magic/reimagine", post(magic::reimagine))
        .route("/api/magic/image-to-story", post(magic::image_to_story))
        .nest_service("/files/characters", character_images)
        .nest_service("/files/comics", comic_images)
        .nest_service("/files/magic", magic_images)
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        // Add CORS layer
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::AllowMethods::any())
                .allow_headers(tower_http::cors::AllowHeaders::any()),
        )
}
