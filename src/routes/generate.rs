use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::files::{join_relative, FileStore, GENERATED_DIR, INPUTS_DIR, PRINTS_DIR};
use crate::imagegen::{GenerationAttributes, GenerationRequest, InlineImage};
use crate::state::AppState;
use crate::upload::{
    generated_filename, mime_from_extension, read_image_field, store_image, StoredImage,
    MAX_GENERATION_INPUT_BYTES,
};

#[derive(Serialize)]
pub struct GenerateResponse {
    pub message: String,
    pub data: String,
}

/// Image-generation proxy: accepts the base garment image plus optional
/// logo and attributes, forwards an assembled prompt to the remote
/// provider, and serves the result from the contents directory.
pub async fn generate(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<GenerateResponse>> {
    let mut base = None;
    let mut logo = None;
    let mut attributes = GenerationAttributes::default();
    let mut print_file_code = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("invalid multipart data: {err}")))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("image") => {
                base = Some(read_image_field(field, MAX_GENERATION_INPUT_BYTES).await?);
            }
            Some("logo") => {
                logo = Some(read_image_field(field, MAX_GENERATION_INPUT_BYTES).await?);
            }
            Some(name) => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| AppError::bad_request(format!("invalid field: {err}")))?;
                if value.trim().is_empty() {
                    continue;
                }
                match name {
                    "description" => attributes.description = Some(value),
                    "color_html_code" => attributes.color_html_code = Some(value),
                    "fabric" => attributes.fabric = Some(value),
                    "print_file_code" => print_file_code = Some(value),
                    "print_file_scale_preset" => attributes.print_scale_preset = Some(value),
                    "logo_placement" => attributes.logo_placement = Some(value),
                    "render_size" => attributes.render_size = Some(value),
                    _ => {}
                }
            }
            None => continue,
        }
    }

    let base = base.ok_or_else(|| {
        AppError::bad_request("No file uploaded or invalid file type/size")
    })?;

    let stored_base = store_image(&state.files, INPUTS_DIR, base).await?;
    let stored_logo = match logo {
        Some(pending) => match store_image(&state.files, INPUTS_DIR, pending).await {
            Ok(stored) => Some(stored),
            Err(err) => {
                remove_inputs(&state, &stored_base, None).await;
                return Err(err);
            }
        },
        None => None,
    };

    match run_generation(&state, &stored_base, stored_logo.as_ref(), attributes, print_file_code)
        .await
    {
        Ok(url) => {
            info!(url = %url, "image generated");
            Ok(Json(GenerateResponse {
                message: "Generated response".to_string(),
                data: url,
            }))
        }
        Err(err) => {
            // Uploaded inputs are only kept when generation succeeds.
            remove_inputs(&state, &stored_base, stored_logo.as_ref()).await;
            Err(err)
        }
    }
}

async fn run_generation(
    state: &AppState,
    base: &StoredImage,
    logo: Option<&StoredImage>,
    attributes: GenerationAttributes,
    print_file_code: Option<String>,
) -> AppResult<String> {
    let print_image = match print_file_code {
        Some(code) => {
            let print = state
                .store
                .print_by_code(&code)
                .await?
                .ok_or_else(|| AppError::bad_request("Invalid print file code"))?;
            let bytes = state
                .files
                .read(&join_relative(PRINTS_DIR, &print.image))
                .await
                .map_err(AppError::internal)?;
            Some(InlineImage {
                content_type: mime_from_extension(&print.image).to_string(),
                bytes,
            })
        }
        None => None,
    };

    let request = GenerationRequest {
        base_image: InlineImage {
            content_type: base.content_type.clone(),
            bytes: base.bytes.clone(),
        },
        print_image,
        logo_image: logo.map(|stored| InlineImage {
            content_type: stored.content_type.clone(),
            bytes: stored.bytes.clone(),
        }),
        attributes,
    };

    let image_bytes = state
        .images
        .generate(&request)
        .await
        .map_err(AppError::upstream)?;

    let filename = generated_filename("gen", "mockup.png");
    let path = join_relative(GENERATED_DIR, &filename);
    state.files.save(&path, &image_bytes).await?;

    Ok(format!(
        "{}/{}",
        state.config.app_url.trim_end_matches('/'),
        path
    ))
}

/// Best-effort cleanup of the stored multipart inputs; the logo may be
/// absent, which is not an error.
async fn remove_inputs(state: &AppState, base: &StoredImage, logo: Option<&StoredImage>) {
    remove_stored(&state.files, base).await;
    if let Some(logo) = logo {
        remove_stored(&state.files, logo).await;
    }
}

async fn remove_stored(files: &std::sync::Arc<dyn FileStore>, stored: &StoredImage) {
    if let Err(err) = files.remove(&stored.path).await {
        error!(path = %stored.path, error = %err, "failed to remove uploaded file");
    }
}
