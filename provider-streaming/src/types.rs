//! Streaming API response types
//!
//! Data structures for (de)serializing the service's web API payloads.

use bridge_traits::remote::{RemotePlaybackStatus, RemoteTrack};
use serde::{Deserialize, Serialize};

/// Track object
#[derive(Debug, Clone, Deserialize)]
pub struct ApiTrack {
    pub id: String,

    /// Playable URI, e.g. `svc:track:4uLU6hMCjMI75M1A2tKUQC`
    pub uri: String,

    pub name: String,

    #[serde(default)]
    pub artists: Vec<ApiArtist>,

    #[serde(default)]
    pub album: Option<ApiAlbum>,

    #[serde(default)]
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiArtist {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiAlbum {
    pub name: String,
}

impl From<ApiTrack> for RemoteTrack {
    fn from(track: ApiTrack) -> Self {
        let artist = track
            .artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        RemoteTrack {
            id: track.id,
            uri: track.uri,
            title: track.name,
            artist,
            album: track.album.map(|a| a.name),
            duration_ms: track.duration_ms,
        }
    }
}

/// `GET /me/tracks` response
#[derive(Debug, Deserialize)]
pub struct SavedTracksResponse {
    pub items: Vec<SavedTrackItem>,

    #[serde(default)]
    pub offset: u32,

    #[serde(default)]
    pub total: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SavedTrackItem {
    pub track: ApiTrack,
}

/// `GET /search?type=track` response
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub tracks: TrackPaging,
}

#[derive(Debug, Deserialize)]
pub struct TrackPaging {
    #[serde(default)]
    pub items: Vec<ApiTrack>,
}

/// `GET /me/player` response
#[derive(Debug, Deserialize)]
pub struct PlayerStateResponse {
    #[serde(default)]
    pub device: Option<ApiDevice>,

    #[serde(default)]
    pub is_playing: bool,

    #[serde(default)]
    pub progress_ms: Option<u64>,

    /// Currently playing item; absent during ads or between tracks.
    #[serde(default)]
    pub item: Option<ApiTrack>,
}

#[derive(Debug, Deserialize)]
pub struct ApiDevice {
    #[serde(default)]
    pub id: Option<String>,
}

impl From<PlayerStateResponse> for RemotePlaybackStatus {
    fn from(state: PlayerStateResponse) -> Self {
        RemotePlaybackStatus {
            device_id: state.device.and_then(|d| d.id).unwrap_or_default(),
            is_playing: state.is_playing,
            track_uri: state.item.as_ref().map(|t| t.uri.clone()),
            progress_ms: state.progress_ms.unwrap_or(0),
            duration_ms: state.item.map(|t| t.duration_ms).unwrap_or(0),
        }
    }
}

/// `PUT /me/player/play` body
#[derive(Debug, Serialize)]
pub struct PlayRequest<'a> {
    pub uris: [&'a str; 1],
    pub position_ms: u64,
}

/// Error envelope returned with non-2xx statuses
#[derive(Debug, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_saved_tracks() {
        let json = r#"{
            "items": [
                {
                    "added_at": "2024-03-01T10:00:00Z",
                    "track": {
                        "id": "t1",
                        "uri": "svc:track:t1",
                        "name": "Song",
                        "artists": [{"name": "A"}, {"name": "B"}],
                        "album": {"name": "Record"},
                        "duration_ms": 201000
                    }
                }
            ],
            "offset": 50,
            "total": 51
        }"#;

        let response: SavedTracksResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.offset, 50);
        assert_eq!(response.total, Some(51));

        let track = RemoteTrack::from(response.items.into_iter().next().unwrap().track);
        assert_eq!(track.artist, "A, B");
        assert_eq!(track.album.as_deref(), Some("Record"));
        assert_eq!(track.duration_ms, 201_000);
    }

    #[test]
    fn test_player_state_without_item() {
        let json = r#"{"device": {"id": "phone"}, "is_playing": false}"#;

        let state: PlayerStateResponse = serde_json::from_str(json).unwrap();
        let status = RemotePlaybackStatus::from(state);
        assert_eq!(status.device_id, "phone");
        assert_eq!(status.track_uri, None);
        assert_eq!(status.progress_ms, 0);
    }

    #[test]
    fn test_play_request_body() {
        let body = PlayRequest {
            uris: ["svc:track:t1"],
            position_ms: 0,
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"uris":["svc:track:t1"],"position_ms":0}"#
        );
    }

    #[test]
    fn test_deserialize_error_envelope() {
        let json = r#"{"error": {"status": 404, "message": "Player command failed: No active device found", "reason": "NO_ACTIVE_DEVICE"}}"#;

        let envelope: ErrorEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.error.reason.as_deref(), Some("NO_ACTIVE_DEVICE"));
    }
}
