//! The request-handling pipeline: one inbound message in, one onscreen
//! alert (or a refunded, recorded failure) out.
//!
//! Ordering within a request is strict: mint a token, reserve the point
//! cost, record the request, generate assets, store them, publish the alert,
//! then accept the debit. Any failure after the request row exists is
//! recorded against it, and the pending debit is rejected on every
//! unsuccessful path.

use std::sync::Arc;

use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::image_repo::{ImageRequestStore, NewImageRequest};
use crate::error::{Error, Result};
use crate::kafka::events::{
    AlertEvent, FriendDetails, GenerationRequest, GhostDetails, ImageDetails, ImagePayload,
    ImageStyle, RequestState, RequestType, Viewer,
};
use crate::kafka::producer::AlertPublisher;
use crate::services::auth::AuthClient;
use crate::services::discord::DiscordClient;
use crate::services::filters::FilterRunner;
use crate::services::generation::GenerationClient;
use crate::services::ledger::{AlertTransaction, LedgerClient};
use crate::services::prompts;
use crate::services::storage::StorageClient;

const SERVICE_NAME: &str = "imagegen";
const IMAGE_ALERT_TYPE: &str = "image-generation";
const IMAGE_ALERT_POINTS_COST: i32 = 200;

/// Background color reported for images that keep their rendered background
const DEFAULT_BACKGROUND_COLOR: &str = "#000000";

const JPEG_QUALITY: u8 = 80;

/// Orchestrates every collaborator needed to turn one generation request
/// into an onscreen alert
pub struct RequestHandler {
    store: Arc<dyn ImageRequestStore>,
    generation: Arc<dyn GenerationClient>,
    filters: Arc<dyn FilterRunner>,
    storage: Arc<dyn StorageClient>,
    auth: Arc<dyn AuthClient>,
    ledger: Arc<dyn LedgerClient>,
    publisher: Arc<dyn AlertPublisher>,
    discord: Option<Arc<DiscordClient>>,
}

impl RequestHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ImageRequestStore>,
        generation: Arc<dyn GenerationClient>,
        filters: Arc<dyn FilterRunner>,
        storage: Arc<dyn StorageClient>,
        auth: Arc<dyn AuthClient>,
        ledger: Arc<dyn LedgerClient>,
        publisher: Arc<dyn AlertPublisher>,
        discord: Option<Arc<DiscordClient>>,
    ) -> Self {
        Self {
            store,
            generation,
            filters,
            storage,
            auth,
            ledger,
            publisher,
            discord,
        }
    }

    /// Handles one inbound request. Request types this worker doesn't serve
    /// are dropped without side effects.
    pub async fn handle(&self, request: &GenerationRequest) -> Result<()> {
        match request.request_type {
            RequestType::Image => {
                let payload = request.payload.image.as_ref().ok_or_else(|| {
                    Error::Malformed("image request carries no image payload".to_string())
                })?;
                self.handle_image_request(&request.viewer, &request.state, payload)
                    .await
            }
            RequestType::Unknown => Ok(()),
        }
    }

    async fn handle_image_request(
        &self,
        viewer: &Viewer,
        state: &RequestState,
        payload: &ImagePayload,
    ) -> Result<()> {
        // The minted token authorizes the point debit for this viewer.
        let access_token = self.auth.request_service_token(SERVICE_NAME, viewer).await?;

        let request_id = Uuid::new_v4();
        let metadata = json!({
            "imageRequestId": request_id,
            "style": payload.style.to_string(),
        });
        let mut transaction = self
            .ledger
            .request_alert_redemption(
                &access_token,
                IMAGE_ALERT_POINTS_COST,
                IMAGE_ALERT_TYPE,
                metadata,
            )
            .await?;

        // From here the reservation must be resolved no matter how the
        // pipeline exits: accepted inside on full success, rejected by this
        // finalize otherwise.
        let result = self
            .generate_and_publish(request_id, viewer, state, payload, transaction.as_mut())
            .await;
        transaction.finalize().await;
        result
    }

    async fn generate_and_publish(
        &self,
        request_id: Uuid,
        viewer: &Viewer,
        state: &RequestState,
        payload: &ImagePayload,
        transaction: &mut dyn AlertTransaction,
    ) -> Result<()> {
        let broadcast_id = (state.broadcast_id != 0).then_some(state.broadcast_id);
        let screening_id = (!state.screening_id.is_nil()).then_some(state.screening_id);
        let inputs = serde_json::to_value(&payload.inputs)
            .map_err(|e| Error::Malformed(format!("failed to serialize request inputs: {e}")))?;
        let description = prompts::format_description(payload.style, &payload.inputs);
        let prompt = prompts::format_prompt(payload.style, &payload.inputs);

        self.store
            .insert_request(NewImageRequest {
                id: request_id,
                twitch_user_id: viewer.twitch_user_id.clone(),
                broadcast_id,
                screening_id,
                style: payload.style.to_string(),
                inputs,
                prompt: prompt.clone(),
            })
            .await?;
        info!(request_id = %request_id, style = %payload.style, "recorded image request");

        // A friend needs a name before it needs a face.
        let mut friend_name = String::new();
        if payload.style == ImageStyle::Friend {
            let subject = payload
                .inputs
                .friend
                .as_ref()
                .map(|friend| friend.subject.as_str())
                .unwrap_or_default();
            let name_prompt = format!(
                "Please come up with a name for a friendly mascot character who is {subject}. \
                 Please answer with a single name, and no additional text."
            );
            let name = match self
                .generation
                .generate_text(&name_prompt, &viewer.twitch_user_id)
                .await
            {
                Ok(name) => name,
                Err(err) => return Err(self.record_failure(request_id, err).await),
            };
            if let Err(err) = self
                .store
                .insert_answer(request_id, &name_prompt, &name)
                .await
            {
                return Err(self.record_failure(request_id, err).await);
            }
            friend_name = name;
        }

        let mut image = match self
            .generation
            .generate_image(&prompt, &viewer.twitch_user_id)
            .await
        {
            Ok(image) => image,
            Err(err) => return Err(self.record_failure(request_id, err).await),
        };

        let mut background_color = DEFAULT_BACKGROUND_COLOR.to_string();
        if payload.style == ImageStyle::Friend {
            // Friend images get their background keyed out by the external
            // post-processor, producing a transparent WEBP.
            match self.remove_background(request_id, &image.data).await {
                Ok((webp_data, color)) => {
                    background_color = color;
                    image.content_type = "image/webp".to_string();
                    image.data = webp_data;
                }
                Err(err) => return Err(self.record_failure(request_id, err).await),
            }
        } else {
            // Everything else is compressed from PNG to JPEG in memory.
            match reencode_jpeg(&image.data) {
                Ok(jpeg_data) => {
                    image.content_type = "image/jpeg".to_string();
                    image.data = jpeg_data;
                }
                Err(err) => return Err(self.record_failure(request_id, err).await),
            }
        }

        let key = format_image_key(request_id, &image.content_type);
        let image_url = match self
            .storage
            .upload(&key, &image.content_type, image.data)
            .await
        {
            Ok(url) => url,
            Err(err) => return Err(self.record_failure(request_id, err).await),
        };
        if let Err(err) = self
            .store
            .insert_image(request_id, 0, &image_url, &background_color)
            .await
        {
            return Err(self.record_failure(request_id, err).await);
        }

        // A failure here is returned as-is: either the row became terminal
        // or it stayed in-flight, and marking it failed would lie about
        // which.
        self.store.mark_success(request_id).await?;

        let details = match payload.style {
            ImageStyle::Friend => ImageDetails::Friend(FriendDetails {
                image_url: image_url.clone(),
                description: description.clone(),
                name: friend_name,
                background_color: background_color.clone(),
            }),
            _ => ImageDetails::Ghost(GhostDetails {
                image_url: image_url.clone(),
                description: description.clone(),
            }),
        };
        let event = AlertEvent::image(viewer.clone(), details);
        if let Err(err) = self.publisher.publish(&event).await {
            return Err(self.record_failure(request_id, err).await);
        }

        transaction.accept().await?;
        info!(request_id = %request_id, "alert published and redemption accepted");

        // Fire-and-forget: a webhook failure never fails the request.
        if payload.style == ImageStyle::Ghost {
            if let Some(discord) = self.discord.clone() {
                let username = viewer.twitch_display_name.clone();
                let description = description.clone();
                let image_url = image_url.clone();
                tokio::spawn(async move {
                    if let Err(err) = discord
                        .post_ghost_alert(&username, &description, &image_url)
                        .await
                    {
                        error!(error = %err, "failed to post ghost alert to Discord");
                    }
                });
            }
        }

        Ok(())
    }

    /// Best-effort: marks the request failed, then hands back the original
    /// error for the caller to return.
    async fn record_failure(&self, request_id: Uuid, err: Error) -> Error {
        match self.store.mark_failure(request_id, &err.to_string()).await {
            Ok(0) => warn!(
                request_id = %request_id,
                "failure not recorded; request already reached a terminal state"
            ),
            Ok(_) => {}
            Err(db_err) => warn!(
                request_id = %request_id,
                error = %db_err,
                "failed to record image request failure"
            ),
        }
        err
    }

    /// Stages the PNG in a scratch directory for the subprocess and reads
    /// back the processed WEBP. The directory is removed when dropped, on
    /// success and failure alike.
    async fn remove_background(
        &self,
        request_id: Uuid,
        png_data: &[u8],
    ) -> Result<(Vec<u8>, String)> {
        let scratch = tempfile::tempdir()?;
        let infile = scratch.path().join(format!("imf_{request_id}.png"));
        let outfile = scratch.path().join(format!("imf_{request_id}.webp"));
        tokio::fs::write(&infile, png_data).await?;

        let color = self.filters.remove_background(&infile, &outfile).await?;
        let webp_data = tokio::fs::read(&outfile).await?;
        Ok((webp_data, color))
    }
}

/// Re-encodes freshly-generated PNG bytes as a JPEG at display quality
fn reencode_jpeg(png_data: &[u8]) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory_with_format(png_data, image::ImageFormat::Png)
        .map_err(|e| Error::Decode(format!("failed to decode generated PNG: {e}")))?;

    // Roughly the largest 1024x1024 JPEG we can reasonably expect to produce.
    let mut buffer = std::io::Cursor::new(Vec::with_capacity(512 * 1024));
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY);
    decoded
        .to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| Error::Decode(format!("failed to encode JPEG image: {e}")))?;
    Ok(buffer.into_inner())
}

/// Storage key for a generated image, with the extension derived from its
/// content type
fn format_image_key(request_id: Uuid, content_type: &str) -> String {
    let ext = match content_type {
        "image/png" => ".png",
        "image/webp" => ".webp",
        _ => ".jpg",
    };
    format!("{request_id}/{request_id}-0{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_image_keys_by_content_type() {
        let id = Uuid::parse_str("5e3a831b-699e-45f2-9587-048cbaeaf17d").unwrap();
        assert_eq!(
            format_image_key(id, "image/webp"),
            format!("{id}/{id}-0.webp")
        );
        assert_eq!(format_image_key(id, "image/png"), format!("{id}/{id}-0.png"));
        assert_eq!(format_image_key(id, "image/jpeg"), format!("{id}/{id}-0.jpg"));
        assert_eq!(
            format_image_key(id, "application/octet-stream"),
            format!("{id}/{id}-0.jpg")
        );
    }

    #[test]
    fn reencodes_png_bytes_as_jpeg() {
        let png = {
            let pixels = image::RgbaImage::from_pixel(8, 8, image::Rgba([12, 34, 56, 255]));
            let mut buffer = std::io::Cursor::new(Vec::new());
            image::DynamicImage::ImageRgba8(pixels)
                .write_to(&mut buffer, image::ImageFormat::Png)
                .expect("encode sample PNG");
            buffer.into_inner()
        };

        let jpeg = reencode_jpeg(&png).expect("reencode as JPEG");
        assert!(jpeg.starts_with(&[0xff, 0xd8]), "expected JPEG magic bytes");
    }

    #[test]
    fn rejects_non_png_bytes() {
        assert!(reencode_jpeg(b"not a png").is_err());
    }
}
