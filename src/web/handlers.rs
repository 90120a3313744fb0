use actix_web::{delete, get, post, web, HttpResponse};
use std::time::UNIX_EPOCH;
use tracing::error;

use crate::services::github::GitHub;
use crate::web::models::{
    AppState, CacheStatus, ErrorResponse, HoverUpdate, PlaybackState, ProjectSummary,
    ThumbnailResponse, VisibilityUpdate,
};
use crate::web::thumbnails::{is_valid_project_id, refresh_if_needed, request_thumbnail};

fn error_body(message: impl Into<String>) -> ErrorResponse {
    ErrorResponse {
        error: message.into(),
    }
}

#[get("/api/projects")]
pub async fn list_projects(state: web::Data<AppState>) -> HttpResponse {
    let videos = {
        let mut catalogue = state.catalogue.lock().await;
        refresh_if_needed(&mut catalogue, &state.videos_dir).await;
        catalogue.sorted()
    };

    let projects: Vec<ProjectSummary> = videos
        .into_iter()
        .map(|video| ProjectSummary {
            thumbnail_cached: state.thumbnails.get_from_cache(&video.id).is_some(),
            video_url: format!("/videos/{}", video.filename),
            thumbnail_url: format!("/api/thumbnails/{}", video.id),
            created_at: video
                .created_at
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            id: video.id,
            filename: video.filename,
        })
        .collect();

    HttpResponse::Ok().json(projects)
}

#[get("/api/thumbnails/status")]
pub async fn thumbnail_status(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(CacheStatus {
        capacity: state.thumbnails.capacity(),
        in_flight: state.thumbnails.in_flight(),
        pending: state.thumbnails.pending(),
        cached: state.thumbnails.len(),
    })
}

#[get("/api/thumbnails/{id}")]
pub async fn get_thumbnail(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let id = path.into_inner();
    if !is_valid_project_id(&id) {
        return HttpResponse::BadRequest().json(error_body(format!("Invalid project id: {}", id)));
    }

    if let Some(thumbnail) = state.thumbnails.get_from_cache(&id) {
        return HttpResponse::Ok().json(ThumbnailResponse {
            id,
            thumbnail: Some(thumbnail),
        });
    }

    let video = {
        let mut catalogue = state.catalogue.lock().await;
        refresh_if_needed(&mut catalogue, &state.videos_dir).await;
        catalogue.videos.get(&id).cloned()
    };

    let Some(video) = video else {
        return HttpResponse::NotFound().json(error_body(format!("Unknown project: {}", id)));
    };

    match request_thumbnail(&state, &video).await {
        Ok(thumbnail) => HttpResponse::Ok().json(ThumbnailResponse { id, thumbnail }),
        Err(e) => {
            error!("Failed to generate thumbnail for {}: {:?}", id, e);
            HttpResponse::InternalServerError().json(error_body("Thumbnail generation failed"))
        }
    }
}

#[get("/api/playback")]
pub async fn playback_state(state: web::Data<AppState>) -> HttpResponse {
    let playback = state.playback.lock().await;
    HttpResponse::Ok().json(PlaybackState {
        current_playing_id: playback.current_playing_id(),
        candidates: playback.candidates(),
    })
}

#[post("/api/playback/visibility")]
pub async fn register_visibility(
    state: web::Data<AppState>,
    update: web::Json<VisibilityUpdate>,
) -> HttpResponse {
    let VisibilityUpdate { id, ratio } = update.into_inner();
    let mut playback = state.playback.lock().await;
    playback.register(id, ratio);
    HttpResponse::Ok().json(PlaybackState {
        current_playing_id: playback.current_playing_id(),
        candidates: playback.candidates(),
    })
}

#[delete("/api/playback/visibility/{id}")]
pub async fn unregister_visibility(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HttpResponse {
    let id = path.into_inner();
    let mut playback = state.playback.lock().await;
    playback.unregister(&id);
    HttpResponse::Ok().json(PlaybackState {
        current_playing_id: playback.current_playing_id(),
        candidates: playback.candidates(),
    })
}

#[post("/api/playback/hover")]
pub async fn hover_play(state: web::Data<AppState>, update: web::Json<HoverUpdate>) -> HttpResponse {
    let mut playback = state.playback.lock().await;
    playback.hover_play(update.into_inner().id);
    HttpResponse::Ok().json(PlaybackState {
        current_playing_id: playback.current_playing_id(),
        candidates: playback.candidates(),
    })
}

#[get("/api/github/{user}")]
pub async fn github_profile(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let user = path.into_inner();
    if !GitHub::is_valid_username(&user) {
        return HttpResponse::BadRequest().json(error_body(format!("Invalid GitHub username: {}", user)));
    }

    match GitHub::fetch_profile(&state.http, &state.github_api_url, &user).await {
        Ok(profile) => HttpResponse::Ok().json(profile),
        Err(e) => {
            error!("GitHub profile lookup for {} failed: {:?}", user, e);
            HttpResponse::BadGateway().json(error_body("GitHub profile unavailable"))
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    // Status is registered ahead of {id} so it is not taken for a project id
    cfg.service(list_projects)
        .service(thumbnail_status)
        .service(get_thumbnail)
        .service(playback_state)
        .service(register_visibility)
        .service(unregister_visibility)
        .service(hover_play)
        .service(github_profile);
}

#[cfg(test)]
mod tests {
    use super::configure;
    use crate::media::thumbnail_cache::ThumbnailCache;
    use crate::services::thumbnailer::FrameOptions;
    use crate::web::models::{AppState, CacheStatus, PlaybackState, ProjectSummary, ThumbnailResponse};
    use actix_web::{http::StatusCode, test, web, App};
    use std::path::PathBuf;

    fn state(videos_dir: PathBuf) -> web::Data<AppState> {
        let options = FrameOptions {
            ffmpeg_bin: "/nonexistent/ffmpeg-for-tests".to_string(),
            seek: "00:00:01".to_string(),
            width: 320,
        };
        web::Data::new(AppState::new(ThumbnailCache::new(2), videos_dir, options))
    }

    #[actix_web::test]
    async fn test_playback_routes_follow_visibility_and_hover() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(state(dir.path().to_path_buf()))
                .configure(configure),
        )
        .await;

        for (id, ratio) in [("1", 0.3), ("2", 0.7)] {
            let req = test::TestRequest::post()
                .uri("/api/playback/visibility")
                .set_json(serde_json::json!({ "id": id, "ratio": ratio }))
                .to_request();
            let _: PlaybackState = test::call_and_read_body_json(&app, req).await;
        }
        let req = test::TestRequest::get().uri("/api/playback").to_request();
        let current: PlaybackState = test::call_and_read_body_json(&app, req).await;
        assert_eq!(current.current_playing_id.as_deref(), Some("2"));

        let req = test::TestRequest::post()
            .uri("/api/playback/hover")
            .set_json(serde_json::json!({ "id": "1" }))
            .to_request();
        let current: PlaybackState = test::call_and_read_body_json(&app, req).await;
        assert_eq!(current.current_playing_id.as_deref(), Some("1"));

        let req = test::TestRequest::post()
            .uri("/api/playback/hover")
            .set_json(serde_json::json!({ "id": null }))
            .to_request();
        let current: PlaybackState = test::call_and_read_body_json(&app, req).await;
        assert_eq!(current.current_playing_id.as_deref(), Some("2"));

        let req = test::TestRequest::delete()
            .uri("/api/playback/visibility/2")
            .to_request();
        let current: PlaybackState = test::call_and_read_body_json(&app, req).await;
        assert_eq!(current.current_playing_id, None);
    }

    #[actix_web::test]
    async fn test_thumbnail_route_validates_and_serves_cache() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path().to_path_buf());
        state
            .thumbnails
            .queue_thumbnail_generation("reel", || async { anyhow::Ok(Some("data:reel".to_string())) })
            .await
            .unwrap();

        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::get().uri("/api/thumbnails/reel").to_request();
        let body: ThumbnailResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.thumbnail.as_deref(), Some("data:reel"));

        let req = test::TestRequest::get().uri("/api/thumbnails/-bad").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/api/thumbnails/unknown").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/api/thumbnails/status").to_request();
        let status: CacheStatus = test::call_and_read_body_json(&app, req).await;
        assert_eq!(
            status,
            CacheStatus {
                capacity: 2,
                in_flight: 0,
                pending: 0,
                cached: 1
            }
        );
    }

    #[actix_web::test]
    async fn test_failed_generation_maps_to_server_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.mp4"), b"not a video").unwrap();
        let state = state(dir.path().to_path_buf());
        let app = test::init_service(App::new().app_data(state.clone()).configure(configure)).await;

        let req = test::TestRequest::get().uri("/api/thumbnails/broken").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(state.thumbnails.get_from_cache("broken").is_none());
    }

    #[actix_web::test]
    async fn test_projects_route_lists_catalogue() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("reel.mp4"), b"").unwrap();
        let app = test::init_service(
            App::new()
                .app_data(state(dir.path().to_path_buf()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/projects").to_request();
        let projects: Vec<ProjectSummary> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id, "reel");
        assert_eq!(projects[0].video_url, "/videos/reel.mp4");
        assert_eq!(projects[0].thumbnail_url, "/api/thumbnails/reel");
        assert!(!projects[0].thumbnail_cached);
    }

    #[actix_web::test]
    async fn test_github_route_rejects_bad_username() {
        let dir = tempfile::tempdir().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(state(dir.path().to_path_buf()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/github/-nope-").to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
