//! The chess room wire schema: everything that crosses the WebSocket as JSON.
//!
//! This is not a pass-through envelope around an opaque game payload — the
//! protocol layer understands the full room/game vocabulary directly, since
//! there is exactly one game this server plays. `ClientRequest` covers every
//! request in the external interface; `ServerEvent` covers every
//! server-initiated push; `Ack` is the `{success, error?, ...fields}` shape
//! acknowledgements take.

use std::fmt;

use rookery_rules::{Promotion, Side};
use rookery_transport::ConnectionId;
use serde::{Deserialize, Serialize};

/// A short, case-insensitive, collision-resistant room token (6-10 chars).
///
/// Unlike the player/room ids in a generic room system, this is never an
/// incrementing counter — rooms are addressed by a code a human might read
/// out loud or type into a join box.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new(token: impl Into<String>) -> Self {
        RoomId(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A participant's function within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Host,
    Opponent,
    Spectator,
}

/// Room lifecycle state. Monotonic except via deletion; `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    WaitingForPlayer,
    InProgress,
    Finished,
}

/// The embedded game's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Active,
    Checkmate,
    Stalemate,
    Draw,
    Resigned,
    Timeout,
    Abandoned,
}

/// Chat delivery scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatType {
    Public,
    Private,
}

/// Wire error codes, returned verbatim to the client. Every internal error
/// enum in this workspace maps into one of these through an exhaustive
/// `match` — adding a wire code here without updating every mapping site
/// is a compile error, which is the point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ValidationFailed,
    NotConnected,
    NotFound,
    AlreadyInRoom,
    RoomLocked,
    PasswordRequired,
    PasswordIncorrect,
    RoomFull,
    JoinNotAllowed,
    SpectateNotAllowed,
    NotAPlayer,
    NotYourTurn,
    GameNotInProgress,
    InvalidMove,
    PromotionRequired,
    NoDrawOffer,
    CannotAcceptOwnDraw,
    HostOnly,
    CannotKickPlayer,
    Internal,
}

/// `{initial seconds, increment seconds}`. `None` means untimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeControl {
    pub initial: u32,
    pub increment: u32,
}

/// Settings as supplied by a client (`room:create`/`room:update-settings`).
/// Deliberately distinct from [`RoomSettingsView`] — a plaintext `password`
/// field here never survives past hashing, and the view sent back to
/// clients never carries a hash or plaintext password at all.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettingsInput {
    #[serde(default)]
    pub time_control: Option<TimeControl>,
    #[serde(default)]
    pub allow_spectators: Option<bool>,
    #[serde(default)]
    pub allow_join: Option<bool>,
    #[serde(default)]
    pub is_private: Option<bool>,
    #[serde(default)]
    pub room_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Settings as reflected back to clients. `isLocked` is derived from whether
/// a password hash is set; the hash itself is never serialized here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSettingsView {
    pub time_control: Option<TimeControl>,
    pub allow_spectators: bool,
    pub allow_join: bool,
    pub is_private: bool,
    pub room_name: Option<String>,
    pub is_locked: bool,
}

/// One completed ply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub from: String,
    pub to: String,
    pub san: String,
    pub position_after: String,
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub promotion: Option<Promotion>,
}

/// The embedded game, as reflected to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub position: String,
    pub turn: Side,
    pub moves: Vec<MoveRecord>,
    pub status: GameStatus,
    pub winner: Option<Side>,
    pub white_time: Option<i64>,
    pub black_time: Option<i64>,
    pub last_move_at: u64,
    pub started_at: u64,
}

/// A room, as reflected to its participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub room_id: RoomId,
    pub host_id: String,
    pub host_name: String,
    pub opponent_id: Option<String>,
    pub opponent_name: Option<String>,
    pub spectators: Vec<(String, String)>,
    pub state: RoomState,
    pub created_at: u64,
    pub last_activity: u64,
    pub game: Option<GameView>,
    pub settings: RoomSettingsView,
}

/// One row of the public catalog (`GET /api/rooms/listings`, `room:list-updated`
/// refetches). Never carries a password or spectator identities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListEntry {
    pub room_id: RoomId,
    pub room_name: Option<String>,
    pub host_name: String,
    pub state: RoomState,
    pub player_count: u8,
    pub spectator_count: u32,
    pub time_control: Option<TimeControl>,
    pub created_at: u64,
    pub last_activity: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub room_id: RoomId,
    pub sender_id: String,
    pub sender_name: String,
    pub message: String,
    pub chat_type: ChatType,
    pub timestamp: u64,
}

/// The restored session summary returned by `session:restore`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoredSession {
    pub room_id: RoomId,
    pub role: Role,
    pub color: Option<Side>,
}

/// Every request a client can send, tagged by its logical wire name.
///
/// Internally tagged (`type` carries the discriminant inline) since every
/// variant's payload is a plain object — there is no need for the
/// adjacently-tagged `content` wrapper `Payload` uses for the outer envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientRequest {
    #[serde(rename = "room:create")]
    RoomCreate {
        player_name: String,
        #[serde(default)]
        settings: Option<RoomSettingsInput>,
    },
    #[serde(rename = "room:join")]
    RoomJoin {
        room_id: RoomId,
        player_name: String,
        #[serde(default)]
        password: Option<String>,
    },
    #[serde(rename = "room:spectate")]
    RoomSpectate {
        room_id: RoomId,
        #[serde(default)]
        spectator_name: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
    #[serde(rename = "room:leave")]
    RoomLeave {},
    #[serde(rename = "room:kick")]
    RoomKick { room_id: RoomId, target_id: String },
    #[serde(rename = "room:lock")]
    RoomLock {
        room_id: RoomId,
        locked: bool,
        #[serde(default)]
        password: Option<String>,
    },
    #[serde(rename = "room:update-settings")]
    RoomUpdateSettings {
        room_id: RoomId,
        settings: RoomSettingsInput,
    },
    #[serde(rename = "game:move")]
    GameMove {
        room_id: RoomId,
        from: String,
        to: String,
        #[serde(default)]
        promotion: Option<Promotion>,
    },
    #[serde(rename = "game:resign")]
    GameResign { room_id: RoomId },
    #[serde(rename = "game:offer-draw")]
    GameOfferDraw { room_id: RoomId },
    #[serde(rename = "game:accept-draw")]
    GameAcceptDraw { room_id: RoomId },
    #[serde(rename = "game:decline-draw")]
    GameDeclineDraw { room_id: RoomId },
    #[serde(rename = "chat:send")]
    ChatSend {
        room_id: RoomId,
        message: String,
        #[serde(default = "default_chat_type")]
        chat_type: ChatType,
    },
    #[serde(rename = "session:restore")]
    SessionRestore {},
    #[serde(rename = "ping")]
    Ping {},
}

fn default_chat_type() -> ChatType {
    ChatType::Public
}

/// Every event the server can push to a connection without being asked.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    #[serde(rename = "room:updated")]
    RoomUpdated { room: RoomView },
    #[serde(rename = "room:closed")]
    RoomClosed { room_id: RoomId, reason: String },
    #[serde(rename = "room:kicked")]
    RoomKicked { room_id: RoomId },
    #[serde(rename = "room:list-updated")]
    RoomListUpdated {},
    #[serde(rename = "game:started")]
    GameStarted { room: RoomView },
    #[serde(rename = "game:move")]
    GameMove {
        room_id: RoomId,
        #[serde(rename = "move")]
        mv: MoveRecord,
        game: GameView,
    },
    #[serde(rename = "game:ended")]
    GameEnded {
        room_id: RoomId,
        status: GameStatus,
        winner: Option<Side>,
    },
    #[serde(rename = "game:sync")]
    GameSync { room_id: RoomId, game: GameView },
    #[serde(rename = "player:joined")]
    PlayerJoined {
        room_id: RoomId,
        player_id: String,
        player_name: String,
    },
    #[serde(rename = "player:left")]
    PlayerLeft { room_id: RoomId, player_id: String },
    #[serde(rename = "player:disconnected")]
    PlayerDisconnected {
        room_id: RoomId,
        player_id: String,
        grace_period: u64,
    },
    #[serde(rename = "player:reconnected")]
    PlayerReconnected { room_id: RoomId, player_id: String },
    #[serde(rename = "spectator:joined")]
    SpectatorJoined {
        room_id: RoomId,
        spectator_id: String,
        spectator_name: String,
    },
    #[serde(rename = "spectator:left")]
    SpectatorLeft {
        room_id: RoomId,
        spectator_id: String,
    },
    #[serde(rename = "chat:message")]
    ChatMessage(ChatMessage),
    #[serde(rename = "draw:offered")]
    DrawOffered { room_id: RoomId, offered_by: String },
    #[serde(rename = "draw:declined")]
    DrawDeclined { room_id: RoomId },
    #[serde(rename = "error")]
    Error { code: ErrorCode, message: String },
}

/// The acknowledgement shape for a request/response exchange:
/// `{success, error?, ...fields}`. Per-request success fields vary (a
/// `room:create` ack carries `room`/`playerId`/`color`; a `room:leave` ack
/// carries nothing) so the variable part is flattened from a JSON value
/// rather than modeled as one struct per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: serde_json::Value,
}

impl Ack {
    pub fn ok(data: serde_json::Value) -> Self {
        Ack {
            success: true,
            error: None,
            message: None,
            data,
        }
    }

    pub fn err(code: ErrorCode, message: impl Into<String>) -> Self {
        Ack {
            success: false,
            error: Some(code),
            message: Some(message.into()),
            data: serde_json::Value::Null,
        }
    }
}

/// The payload an [`Envelope`] carries. Adjacently tagged so a bare `type`
/// string distinguishes a client request from a response from a pushed
/// event before the inner content is even parsed — useful at the transport
/// boundary where a handler needs to route before fully deserializing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Request(ClientRequest),
    Response(Ack),
    Event(ServerEvent),
}

/// The outermost wire frame. Unlike the generic room system this was
/// generalized from, there is no `Channel` field — every message here rides
/// the same WebSocket connection, reliably and in order, so a
/// reliable/unordered/unreliable delivery-class tag would have two
/// permanently-dead variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub payload: Payload,
    /// Correlates a `Response` with the `Request` that produced it. Absent
    /// on server-initiated `Event` frames.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub request_id: Option<String>,
    /// The connection this frame originated from or is addressed to. Set by
    /// the transport layer on inbound frames; used by the Event Bus to
    /// address a specific connection (e.g., the kicked spectator) without
    /// every participant needing to know its own id.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub connection_id: Option<ConnectionId>,
}

impl Envelope {
    pub fn request(request_id: impl Into<String>, request: ClientRequest) -> Self {
        Envelope {
            payload: Payload::Request(request),
            request_id: Some(request_id.into()),
            connection_id: None,
        }
    }

    pub fn response(request_id: impl Into<String>, ack: Ack) -> Self {
        Envelope {
            payload: Payload::Response(ack),
            request_id: Some(request_id.into()),
            connection_id: None,
        }
    }

    pub fn event(event: ServerEvent) -> Self {
        Envelope {
            payload: Payload::Event(event),
            request_id: None,
            connection_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_create_request_round_trips() {
        let req = ClientRequest::RoomCreate {
            player_name: "alice".into(),
            settings: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "room:create");
        assert_eq!(json["playerName"], "alice");
        let back: ClientRequest = serde_json::from_value(json).unwrap();
        matches!(back, ClientRequest::RoomCreate { .. });
    }

    #[test]
    fn game_move_wire_shape_uses_move_keyword() {
        let event = ServerEvent::GameMove {
            room_id: RoomId::new("ab12cd"),
            mv: MoveRecord {
                from: "e2".into(),
                to: "e4".into(),
                san: "e4".into(),
                position_after: "startpos".into(),
                timestamp: 0,
                promotion: None,
            },
            game: GameView {
                position: "startpos".into(),
                turn: Side::Black,
                moves: vec![],
                status: GameStatus::Active,
                winner: None,
                white_time: None,
                black_time: None,
                last_move_at: 0,
                started_at: 0,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "game:move");
        assert!(json["move"].is_object());
        assert_eq!(json["move"]["from"], "e2");
    }

    #[test]
    fn promotion_serializes_as_single_letter() {
        let req = ClientRequest::GameMove {
            room_id: RoomId::new("ab12cd"),
            from: "a7".into(),
            to: "a8".into(),
            promotion: Some(Promotion::Queen),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["promotion"], "q");
    }

    #[test]
    fn error_code_is_snake_case_on_the_wire() {
        let json = serde_json::to_value(ErrorCode::PromotionRequired).unwrap();
        assert_eq!(json, "promotion_required");
    }

    #[test]
    fn ack_flattens_variable_success_fields() {
        let ack = Ack::ok(serde_json::json!({ "roomId": "ab12cd" }));
        let json = serde_json::to_value(&ack).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["roomId"], "ab12cd");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn envelope_carries_request_and_decodes_back() {
        let envelope = Envelope::request("req-1", ClientRequest::Ping {});
        let json = serde_json::to_string(&envelope).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.request_id.as_deref(), Some("req-1"));
        matches!(back.payload, Payload::Request(ClientRequest::Ping {}));
    }

    #[test]
    fn room_list_entry_never_has_password_fields() {
        let entry = RoomListEntry {
            room_id: RoomId::new("ab12cd"),
            room_name: Some("Friendly".into()),
            host_name: "alice".into(),
            state: RoomState::WaitingForPlayer,
            player_count: 1,
            spectator_count: 0,
            time_control: None,
            created_at: 0,
            last_activity: 0,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("spectators").is_none());
    }
}
