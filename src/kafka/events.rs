//! Wire schemas for the inbound generation-requests topic and the outbound
//! onscreen-events topic.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Inbound message envelope from the generation-requests topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(rename = "type")]
    pub request_type: RequestType,
    pub viewer: Viewer,
    #[serde(default)]
    pub state: RequestState,
    #[serde(default)]
    pub payload: RequestPayload,
}

/// Request types this worker knows about; anything else parses as `Unknown`
/// and is dropped without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Image,
    #[serde(other)]
    Unknown,
}

/// The livestream viewer a request acts on behalf of
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewer {
    pub twitch_user_id: String,
    pub twitch_display_name: String,
}

/// Contextual identifiers captured for provenance; zero and the nil UUID
/// mean absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestState {
    pub broadcast_id: i32,
    pub screening_id: Uuid,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestPayload {
    pub image: Option<ImagePayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePayload {
    pub style: ImageStyle,
    pub inputs: ImageInputs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    Ghost,
    Friend,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ImageStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ImageStyle::Ghost => "ghost",
            ImageStyle::Friend => "friend",
            ImageStyle::Unknown => "unknown",
        };
        f.write_str(tag)
    }
}

/// Structured inputs for a request, preserved verbatim when recorded
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageInputs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ghost: Option<GhostInputs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friend: Option<FriendInputs>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GhostInputs {
    pub subject: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendInputs {
    pub subject: String,
    pub color: String,
}

/// Outbound event produced to the onscreen-events topic once generated
/// assets are ready to display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    #[serde(rename = "type")]
    pub event_type: AlertEventType,
    pub payload: AlertPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertEventType {
    Image,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub image: AlertImage,
}

/// An image alert. Fields are private so the `type` tag can only ever be
/// derived from the populated details branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertImage {
    #[serde(rename = "type")]
    image_type: ImageType,
    viewer: Viewer,
    details: ImageDetails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Ghost,
    Friend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageDetails {
    Ghost(GhostDetails),
    Friend(FriendDetails),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GhostDetails {
    pub image_url: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendDetails {
    pub image_url: String,
    pub description: String,
    pub name: String,
    pub background_color: String,
}

impl AlertEvent {
    /// Builds an image alert whose type tag matches the populated details
    /// branch.
    pub fn image(viewer: Viewer, details: ImageDetails) -> Self {
        Self {
            event_type: AlertEventType::Image,
            payload: AlertPayload {
                image: AlertImage {
                    image_type: details.image_type(),
                    viewer,
                    details,
                },
            },
        }
    }
}

impl AlertImage {
    pub fn image_type(&self) -> ImageType {
        self.image_type
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn details(&self) -> &ImageDetails {
        &self.details
    }
}

impl ImageDetails {
    pub fn image_type(&self) -> ImageType {
        match self {
            ImageDetails::Ghost(_) => ImageType::Ghost,
            ImageDetails::Friend(_) => ImageType::Friend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_ghost_request_envelope() {
        let value = json!({
            "type": "image",
            "viewer": { "twitchUserId": "1005", "twitchDisplayName": "SpookyFan" },
            "state": { "broadcastId": 0, "screeningId": "00000000-0000-0000-0000-000000000000" },
            "payload": { "image": {
                "style": "ghost",
                "inputs": { "ghost": { "subject": "a scary clown" } }
            } }
        });

        let request: GenerationRequest = serde_json::from_value(value).expect("parse request");
        assert_eq!(request.request_type, RequestType::Image);
        assert_eq!(request.viewer.twitch_user_id, "1005");
        assert_eq!(request.state.broadcast_id, 0);
        assert!(request.state.screening_id.is_nil());

        let payload = request.payload.image.expect("image payload");
        assert_eq!(payload.style, ImageStyle::Ghost);
        assert_eq!(payload.inputs.ghost.expect("ghost inputs").subject, "a scary clown");
    }

    #[test]
    fn parses_friend_request_envelope() {
        let value = json!({
            "type": "image",
            "viewer": { "twitchUserId": "2006", "twitchDisplayName": "BirdPerson" },
            "state": { "broadcastId": 42, "screeningId": "5e3a831b-699e-45f2-9587-048cbaeaf17d" },
            "payload": { "image": {
                "style": "friend",
                "inputs": { "friend": { "subject": "an ostrich", "color": "orange" } }
            } }
        });

        let request: GenerationRequest = serde_json::from_value(value).expect("parse request");
        assert_eq!(request.state.broadcast_id, 42);
        assert!(!request.state.screening_id.is_nil());

        let payload = request.payload.image.expect("image payload");
        assert_eq!(payload.style, ImageStyle::Friend);
        let friend = payload.inputs.friend.expect("friend inputs");
        assert_eq!(friend.subject, "an ostrich");
        assert_eq!(friend.color, "orange");
    }

    #[test]
    fn unrecognized_request_types_parse_as_unknown() {
        let value = json!({
            "type": "chat",
            "viewer": { "twitchUserId": "1005", "twitchDisplayName": "SpookyFan" }
        });

        let request: GenerationRequest = serde_json::from_value(value).expect("parse request");
        assert_eq!(request.request_type, RequestType::Unknown);
        assert!(request.payload.image.is_none());
    }

    #[test]
    fn unrecognized_styles_parse_as_unknown() {
        let value = json!({ "style": "sunset", "inputs": {} });
        let payload: ImagePayload = serde_json::from_value(value).expect("parse payload");
        assert_eq!(payload.style, ImageStyle::Unknown);
    }

    #[test]
    fn ghost_alert_event_serializes_with_matching_tag() {
        let event = AlertEvent::image(
            Viewer {
                twitch_user_id: "1005".to_string(),
                twitch_display_name: "SpookyFan".to_string(),
            },
            ImageDetails::Ghost(GhostDetails {
                image_url: "https://images.example.com/abc-0.jpg".to_string(),
                description: "a scary clown".to_string(),
            }),
        );

        let value = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(
            value,
            json!({
                "type": "image",
                "payload": { "image": {
                    "type": "ghost",
                    "viewer": { "twitchUserId": "1005", "twitchDisplayName": "SpookyFan" },
                    "details": { "ghost": {
                        "imageUrl": "https://images.example.com/abc-0.jpg",
                        "description": "a scary clown"
                    } }
                } }
            })
        );
    }

    #[test]
    fn friend_alert_event_round_trips() {
        let event = AlertEvent::image(
            Viewer {
                twitch_user_id: "2006".to_string(),
                twitch_display_name: "BirdPerson".to_string(),
            },
            ImageDetails::Friend(FriendDetails {
                image_url: "https://images.example.com/def-0.webp".to_string(),
                description: "an ostrich".to_string(),
                name: "Olivia".to_string(),
                background_color: "#abcdef".to_string(),
            }),
        );
        assert_eq!(event.payload.image.image_type(), ImageType::Friend);

        let encoded = serde_json::to_string(&event).expect("serialize event");
        let decoded: AlertEvent = serde_json::from_str(&encoded).expect("parse event");
        assert_eq!(decoded, event);
    }
}
