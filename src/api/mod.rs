use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Responder};
use chrono::Utc;
use futures_util::StreamExt as _;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::models::*;
use crate::store::{Store, StoreError};

const MAX_IMAGES_PER_ITEM: usize = 10;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "svg", "gif"];

pub struct AppState {
    pub store: Arc<Store>,
    /// Directory holding the predefined background images.
    pub backgrounds_dir: PathBuf,
}

// ==================== Health Check ====================

pub async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

// ==================== Countdown Endpoints ====================

pub async fn get_countdown(
    state: web::Data<AppState>,
    query: web::Query<UserQuery>,
) -> impl Responder {
    let user_id = match &query.user_id {
        Some(id) => id,
        None => return HttpResponse::BadRequest().json(ErrorResponse::new("Missing userId")),
    };

    match state.store.get_countdown(user_id) {
        Ok(countdown) => HttpResponse::Ok().json(CountdownResponse {
            target_time: Some(countdown.target_time),
        }),
        Err(StoreError::NotFound(_)) => {
            HttpResponse::Ok().json(CountdownResponse { target_time: None })
        }
        Err(e) => {
            log::error!("Error fetching countdown: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Error fetching countdown"))
        }
    }
}

pub async fn set_countdown(
    state: web::Data<AppState>,
    body: web::Json<SetCountdownRequest>,
) -> impl Responder {
    let user_id = match &body.user_id {
        Some(id) => id.clone(),
        None => return HttpResponse::BadRequest().json(ErrorResponse::new("Missing userId")),
    };
    let target_time = match body.target_time {
        Some(t) => t,
        None => return HttpResponse::BadRequest().json(ErrorResponse::new("Missing targetTime")),
    };

    let result = match state.store.get_countdown(&user_id) {
        Ok(mut countdown) => {
            countdown.target_time = target_time;
            state.store.update_countdown(&mut countdown)
        }
        Err(StoreError::NotFound(_)) => {
            let mut countdown = Countdown {
                user_id,
                target_time,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            state.store.create_countdown(&mut countdown)
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => HttpResponse::Ok().json(Ack::ok()),
        Err(e) => {
            log::error!("Error updating countdown: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Error updating countdown"))
        }
    }
}

// ==================== Background Endpoints ====================

pub async fn get_background(state: web::Data<AppState>) -> impl Responder {
    match state.store.latest_background() {
        Ok(background) => HttpResponse::Ok().json(BackgroundResponse {
            image_data: Some(background.image_data),
        }),
        Err(StoreError::NotFound(_)) => {
            HttpResponse::Ok().json(BackgroundResponse { image_data: None })
        }
        Err(e) => {
            log::error!("Error fetching background: {}", e);
            HttpResponse::InternalServerError()
                .json(ErrorResponse::new("Error fetching background"))
        }
    }
}

pub async fn set_background(
    state: web::Data<AppState>,
    body: web::Json<SetBackgroundRequest>,
) -> impl Responder {
    let image_data = match &body.image_data {
        Some(data) => data.clone(),
        None => return HttpResponse::BadRequest().json(ErrorResponse::new("Missing imageData")),
    };

    let mut background = Background {
        id: String::new(),
        image_data,
        created_at: Utc::now(),
    };

    match state.store.create_background(&mut background) {
        Ok(_) => HttpResponse::Ok().json(Ack::ok()),
        Err(e) => {
            log::error!("Error updating background: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Error updating background"))
        }
    }
}

pub async fn delete_background(state: web::Data<AppState>) -> impl Responder {
    match state.store.clear_backgrounds() {
        Ok(_) => HttpResponse::Ok().json(Ack::ok()),
        Err(e) => {
            log::error!("Error deleting background: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Error deleting background"))
        }
    }
}

// ==================== Predefined Backgrounds ====================

/// Lists image files shipped in the configured backgrounds directory.
pub async fn list_predefined_backgrounds(state: web::Data<AppState>) -> impl Responder {
    let entries = match std::fs::read_dir(&state.backgrounds_dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::error!(
                "Error reading backgrounds directory {}: {}",
                state.backgrounds_dir.display(),
                e
            );
            return HttpResponse::InternalServerError().json(ErrorResponse::new("Server error"));
        }
    };

    let mut files: Vec<String> = entries
        .flatten()
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| {
            PathBuf::from(name)
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .map(|name| format!("backgrounds/{}", name))
        .collect();
    files.sort();

    HttpResponse::Ok().json(files)
}

// ==================== Task List Endpoints ====================

pub async fn get_list(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let list_type = match ListType::from_str(&path.into_inner()) {
        Ok(t) => t,
        Err(_) => return HttpResponse::BadRequest().json(ErrorResponse::new("Invalid list type")),
    };

    match state.store.get_or_create_list(list_type) {
        Ok(list) => HttpResponse::Ok().json(ListResponse::from(list)),
        Err(e) => {
            log::error!("Error fetching list: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Error fetching list"))
        }
    }
}

struct Upload {
    filename: String,
    content_type: String,
    data: Vec<u8>,
}

/// Adds an item to a list. Multipart form: a `text` field plus up to
/// ten `images` files, stored as blobs and referenced by serving URL.
pub async fn add_item(
    state: web::Data<AppState>,
    path: web::Path<String>,
    mut payload: Multipart,
) -> impl Responder {
    let list_type = match ListType::from_str(&path.into_inner()) {
        Ok(t) => t,
        Err(_) => return HttpResponse::BadRequest().json(ErrorResponse::new("Invalid list type")),
    };

    let mut text = String::new();
    let mut uploads: Vec<Upload> = Vec::new();

    while let Some(entry) = payload.next().await {
        let mut field = match entry {
            Ok(field) => field,
            Err(e) => {
                log::error!("Error reading multipart field: {}", e);
                return HttpResponse::BadRequest().json(ErrorResponse::new("Malformed form data"));
            }
        };

        let name = field.name().to_string();
        let filename = field
            .content_disposition()
            .get_filename()
            .unwrap_or("upload")
            .to_string();
        let content_type = field
            .content_type()
            .map(|mime| mime.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            match chunk {
                Ok(bytes) => data.extend_from_slice(&bytes),
                Err(e) => {
                    log::error!("Error reading multipart chunk: {}", e);
                    return HttpResponse::BadRequest()
                        .json(ErrorResponse::new("Malformed form data"));
                }
            }
        }

        match name.as_str() {
            "text" => text = String::from_utf8_lossy(&data).into_owned(),
            "images" => {
                if uploads.len() >= MAX_IMAGES_PER_ITEM {
                    return HttpResponse::BadRequest()
                        .json(ErrorResponse::new("Too many images"));
                }
                uploads.push(Upload {
                    filename,
                    content_type,
                    data,
                });
            }
            _ => {}
        }
    }

    if let Err(e) = state.store.get_or_create_list(list_type) {
        log::error!("Error adding item to list: {}", e);
        return HttpResponse::InternalServerError()
            .json(ErrorResponse::new("Error adding item to list"));
    }

    let mut item = TaskItem {
        id: String::new(),
        text,
        completed: false,
        created_at: Utc::now(),
        images: Vec::new(),
    };
    if let Err(e) = state.store.add_item(list_type, &mut item) {
        log::error!("Error adding item to list: {}", e);
        return HttpResponse::InternalServerError()
            .json(ErrorResponse::new("Error adding item to list"));
    }

    if !uploads.is_empty() {
        let mut images: Vec<ListImage> = uploads
            .into_iter()
            .map(|upload| ListImage {
                id: String::new(),
                item_id: item.id.clone(),
                size: upload.data.len() as i64,
                data: upload.data,
                content_type: upload.content_type,
                filename: upload.filename,
                created_at: Utc::now(),
            })
            .collect();

        if let Err(e) = state.store.bulk_create_images(&mut images) {
            log::error!("Error storing item images: {}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::new("Error adding item to list"));
        }

        let urls: Vec<String> = images
            .iter()
            .map(|image| format!("/api/images/{}", image.id))
            .collect();
        if let Err(e) = state.store.set_item_images(&item.id, &urls) {
            log::error!("Error storing item images: {}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::new("Error adding item to list"));
        }
    }

    match state.store.get_list(list_type) {
        Ok(list) => HttpResponse::Ok().json(ListResponse::from(list)),
        Err(e) => {
            log::error!("Error fetching list: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Error fetching list"))
        }
    }
}

pub async fn update_item(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<UpdateItemRequest>,
) -> impl Responder {
    let (type_str, item_id) = path.into_inner();
    let list_type = match ListType::from_str(&type_str) {
        Ok(t) => t,
        Err(_) => return HttpResponse::BadRequest().json(ErrorResponse::new("Invalid list type")),
    };

    if let Err(e) = state.store.get_list(list_type) {
        return match e {
            StoreError::NotFound(_) => {
                HttpResponse::NotFound().json(ErrorResponse::new("List not found"))
            }
            _ => {
                log::error!("Error updating item: {}", e);
                HttpResponse::InternalServerError().json(ErrorResponse::new("Error updating item"))
            }
        };
    }

    let mut item = match state.store.get_item(list_type, &item_id) {
        Ok(item) => item,
        Err(StoreError::NotFound(_)) => {
            return HttpResponse::NotFound().json(ErrorResponse::new("Item not found"));
        }
        Err(e) => {
            log::error!("Error updating item: {}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::new("Error updating item"));
        }
    };

    if let Some(completed) = body.completed {
        item.completed = completed;
    }
    // an empty text value leaves the existing text in place
    if let Some(ref text) = body.text {
        if !text.is_empty() {
            item.text = text.clone();
        }
    }

    if let Err(e) = state.store.update_item(list_type, &item) {
        log::error!("Error updating item: {}", e);
        return HttpResponse::InternalServerError().json(ErrorResponse::new("Error updating item"));
    }

    match state.store.get_list(list_type) {
        Ok(list) => HttpResponse::Ok().json(ListResponse::from(list)),
        Err(e) => {
            log::error!("Error fetching list: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Error fetching list"))
        }
    }
}

pub async fn delete_item(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> impl Responder {
    let (type_str, item_id) = path.into_inner();
    let list_type = match ListType::from_str(&type_str) {
        Ok(t) => t,
        Err(_) => return HttpResponse::BadRequest().json(ErrorResponse::new("Invalid list type")),
    };

    if let Err(e) = state.store.get_list(list_type) {
        return match e {
            StoreError::NotFound(_) => {
                HttpResponse::NotFound().json(ErrorResponse::new("List not found"))
            }
            _ => {
                log::error!("Error deleting item: {}", e);
                HttpResponse::InternalServerError().json(ErrorResponse::new("Error deleting item"))
            }
        };
    }

    match state.store.delete_item(list_type, &item_id) {
        Ok(_) => {}
        Err(StoreError::NotFound(_)) => {
            return HttpResponse::NotFound().json(ErrorResponse::new("Item not found"));
        }
        Err(e) => {
            log::error!("Error deleting item: {}", e);
            return HttpResponse::InternalServerError()
                .json(ErrorResponse::new("Error deleting item"));
        }
    }

    match state.store.get_list(list_type) {
        Ok(list) => HttpResponse::Ok().json(ListResponse::from(list)),
        Err(e) => {
            log::error!("Error fetching list: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Error fetching list"))
        }
    }
}

// ==================== Image Endpoint ====================

pub async fn get_image(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let id = path.into_inner();
    match state.store.get_image(&id) {
        Ok(image) => HttpResponse::Ok()
            .content_type(image.content_type)
            .body(image.data),
        Err(StoreError::NotFound(_)) => HttpResponse::NotFound().finish(),
        Err(e) => {
            log::error!("Error fetching image: {}", e);
            HttpResponse::InternalServerError().finish()
        }
    }
}

// ==================== User Settings Endpoints ====================

pub async fn get_user_settings(
    state: web::Data<AppState>,
    query: web::Query<UserQuery>,
) -> impl Responder {
    let user_id = match &query.user_id {
        Some(id) => id.clone(),
        None => return HttpResponse::BadRequest().json(ErrorResponse::new("User ID is required")),
    };

    match state.store.get_settings(&user_id) {
        Ok(settings) => HttpResponse::Ok().json(settings),
        Err(StoreError::NotFound(_)) => {
            // first sight of this user: persist defaults
            let mut settings = UserSettings {
                user_id,
                background_type: BackgroundType::default(),
                background_value: String::new(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            match state.store.create_settings(&mut settings) {
                Ok(_) => HttpResponse::Ok().json(settings),
                Err(e) => {
                    log::error!("Error creating default settings: {}", e);
                    HttpResponse::InternalServerError().json(ErrorResponse::new("Server Error"))
                }
            }
        }
        Err(e) => {
            log::error!("Error fetching settings: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Server Error"))
        }
    }
}

pub async fn save_user_settings(
    state: web::Data<AppState>,
    body: web::Json<SaveSettingsRequest>,
) -> impl Responder {
    let user_id = match &body.user_id {
        Some(id) => id.clone(),
        None => return HttpResponse::BadRequest().json(ErrorResponse::new("User ID is required")),
    };

    let result = match state.store.get_settings(&user_id) {
        Ok(mut settings) => {
            if let Some(background_type) = body.background_type {
                settings.background_type = background_type;
            }
            if let Some(ref background_value) = body.background_value {
                settings.background_value = background_value.clone();
            }
            state.store.update_settings(&mut settings).map(|_| settings)
        }
        Err(StoreError::NotFound(_)) => {
            let mut settings = UserSettings {
                user_id,
                background_type: body.background_type.unwrap_or_default(),
                background_value: body.background_value.clone().unwrap_or_default(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            state.store.create_settings(&mut settings).map(|_| settings)
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(settings) => HttpResponse::Ok().json(settings),
        Err(e) => {
            log::error!("Error saving settings: {}", e);
            HttpResponse::InternalServerError().json(ErrorResponse::new("Server Error"))
        }
    }
}

// ==================== Route Configuration ====================

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check
        .route("/health", web::get().to(health))

        // Countdown
        .route("/api/countdown", web::get().to(get_countdown))
        .route("/api/countdown", web::post().to(set_countdown))

        // Custom background (singleton-ish, latest record wins)
        .route("/api/background", web::get().to(get_background))
        .route("/api/background", web::post().to(set_background))
        .route("/api/background", web::delete().to(delete_background))

        // Predefined backgrounds shipped with the app
        .route("/api/backgrounds", web::get().to(list_predefined_backgrounds))

        // Signal/noise task lists
        .route("/api/lists/{type}", web::get().to(get_list))
        .route("/api/lists/{type}", web::post().to(add_item))
        .route("/api/lists/{type}/{item_id}", web::put().to(update_item))
        .route("/api/lists/{type}/{item_id}", web::delete().to(delete_item))

        // Item images
        .route("/api/images/{id}", web::get().to(get_image))

        // Per-user background settings
        .route("/api/user/background", web::get().to(get_user_settings))
        .route("/api/user/background", web::post().to(save_user_settings));
}
