//! Wire protocol shared by the pictionary server and its clients.
//!
//! Every frame on the websocket is a JSON [`Envelope`]. Clients send `join`,
//! `start`, `draw`, `guess` and `clearCanvas`; the server answers with
//! `gameState` envelopes carrying a [`GameStateSnapshot`] and relays drawing
//! frames verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_MAX_ROUNDS: u32 = 3;
pub const DEFAULT_ROUND_SECONDS: u64 = 60;
pub const DEFAULT_ROUND_END_PAUSE_SECONDS: u64 = 5;
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 256;
pub const MIN_PLAYERS_TO_START: usize = 2;
pub const GUESSER_POINTS: u32 = 100;
pub const DRAWER_POINTS: u32 = 50;

pub fn default_word_list() -> Vec<String> {
    ["Jett", "Raze", "Breach", "Phoenix"]
        .iter()
        .map(|word| word.to_string())
        .collect()
}

/// Envelope `type` tag. Unrecognised tags are kept as [`EventKind::Other`]
/// so that they still decode and fall through to a state response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    Join,
    Start,
    Draw,
    Guess,
    ClearCanvas,
    GameState,
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Join => "join",
            EventKind::Start => "start",
            EventKind::Draw => "draw",
            EventKind::Guess => "guess",
            EventKind::ClearCanvas => "clearCanvas",
            EventKind::GameState => "gameState",
            EventKind::Other(tag) => tag.as_str(),
        }
    }
}

impl From<String> for EventKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "join" => EventKind::Join,
            "start" => EventKind::Start,
            "draw" => EventKind::Draw,
            "guess" => EventKind::Guess,
            "clearCanvas" => EventKind::ClearCanvas,
            "gameState" => EventKind::GameState,
            _ => EventKind::Other(tag),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub player_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub player_name: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub content: Value,
}

impl Envelope {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            player_id: String::new(),
            player_name: String::new(),
            content: Value::Null,
        }
    }

    pub fn with_content(kind: EventKind, content: Value) -> Self {
        Self {
            content,
            ..Self::new(kind)
        }
    }

    pub fn decode(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Builds the encoded `gameState` frame for one snapshot view.
    pub fn game_state(view: &GameStateSnapshot) -> Result<String, serde_json::Error> {
        Self::with_content(EventKind::GameState, serde_json::to_value(view)?).encode()
    }

    /// Reads the content as a snapshot; only meaningful for `gameState` frames.
    pub fn snapshot(&self) -> Option<GameStateSnapshot> {
        serde_json::from_value(self.content.clone()).ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrokeKind {
    Start,
    Draw,
    End,
}

/// One drawing segment as emitted by the canvas. `end` segments carry no
/// coordinates, so everything but the tag is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrokeData {
    #[serde(rename = "type")]
    pub kind: StrokeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f64>,
}

impl StrokeData {
    pub fn segment(from: (f64, f64), to: (f64, f64), color: &str, line_width: f64) -> Self {
        Self {
            kind: StrokeKind::Draw,
            x: Some(to.0),
            y: Some(to.1),
            prev_x: Some(from.0),
            prev_y: Some(from.1),
            color: Some(color.to_string()),
            line_width: Some(line_width),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    Waiting,
    Drawing,
    RoundEnd,
    GameEnd,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub id: String,
    pub name: String,
    pub score: u32,
    pub connected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_drawer: Option<String>,
    pub players: BTreeMap<String, PlayerInfo>,
    /// 0 before the first round. Stays at `max_rounds` once the game ends.
    pub round: u32,
    pub max_rounds: u32,
    pub state: Phase,
    pub round_time_limit: u64,
    #[serde(default)]
    pub time_remaining: u64,
}

impl GameStateSnapshot {
    pub fn is_drawer(&self, player_id: &str) -> bool {
        self.current_drawer.as_deref() == Some(player_id)
    }

    /// What `player_id` is allowed to see. Only the drawer gets the word
    /// while a round is running; it is revealed to everyone once the round
    /// is over.
    pub fn view_for(&self, player_id: &str) -> GameStateSnapshot {
        let mut view = self.clone();
        match self.state {
            Phase::Waiting => view.current_word = None,
            Phase::Drawing if !self.is_drawer(player_id) => {
                view.current_word = self.current_word.as_deref().map(mask_word);
            }
            _ => {}
        }
        view
    }
}

/// Replaces every non-whitespace character with `_`.
pub fn mask_word(word: &str) -> String {
    word.chars()
        .map(|c| if c.is_whitespace() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(state: Phase) -> GameStateSnapshot {
        let mut players = BTreeMap::new();
        for id in ["a", "b"] {
            players.insert(
                id.to_string(),
                PlayerInfo {
                    id: id.to_string(),
                    name: id.to_uppercase(),
                    score: 0,
                    connected: true,
                },
            );
        }
        GameStateSnapshot {
            current_word: Some("Phoenix".to_string()),
            current_drawer: Some("a".to_string()),
            players,
            round: 1,
            max_rounds: 3,
            state,
            round_time_limit: 60,
            time_remaining: 60,
        }
    }

    #[test]
    fn test_decode_client_join() {
        let envelope = Envelope::decode(r#"{"type":"join"}"#).unwrap();
        assert_eq!(envelope.kind, EventKind::Join);
        assert!(envelope.player_id.is_empty());
        assert!(envelope.content.is_null());
    }

    #[test]
    fn test_decode_unknown_kind_is_kept() {
        let envelope = Envelope::decode(r#"{"type":"wave","content":1}"#).unwrap();
        assert_eq!(envelope.kind, EventKind::Other("wave".to_string()));
        assert_eq!(envelope.kind.to_string(), "wave");
    }

    #[test]
    fn test_decode_rejects_missing_type() {
        assert!(Envelope::decode(r#"{"content":"hi"}"#).is_err());
        assert!(Envelope::decode("not json").is_err());
    }

    #[test]
    fn test_draw_content_parses_as_stroke() {
        let envelope = Envelope::decode(
            r##"{"type":"draw","content":{"type":"draw","prevX":1,"prevY":2,"x":3,"y":4,"color":"#000","lineWidth":5}}"##,
        )
        .unwrap();
        let stroke: StrokeData = serde_json::from_value(envelope.content).unwrap();
        assert_eq!(stroke.kind, StrokeKind::Draw);
        assert_eq!(stroke.prev_x, Some(1.0));
        assert_eq!(stroke.line_width, Some(5.0));

        let end: StrokeData = serde_json::from_value(json!({"type": "end"})).unwrap();
        assert_eq!(end.kind, StrokeKind::End);
        assert!(end.x.is_none());
    }

    #[test]
    fn test_game_state_frame_uses_camel_case() {
        let frame = Envelope::game_state(&snapshot(Phase::RoundEnd)).unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "gameState");
        assert_eq!(value["content"]["state"], "roundEnd");
        assert_eq!(value["content"]["maxRounds"], 3);
        assert_eq!(value["content"]["currentDrawer"], "a");
        assert_eq!(value["content"]["players"]["b"]["score"], 0);
        assert!(value.get("playerId").is_none());
    }

    #[test]
    fn test_mask_word() {
        assert_eq!(mask_word("Jett"), "____");
        assert_eq!(mask_word("Kay O"), "___ _");
        assert_eq!(mask_word(""), "");
    }

    #[test]
    fn test_view_hides_word_from_guessers_while_drawing() {
        let state = snapshot(Phase::Drawing);
        assert_eq!(state.view_for("a").current_word.as_deref(), Some("Phoenix"));
        assert_eq!(state.view_for("b").current_word.as_deref(), Some("_______"));
        assert_eq!(state.view_for("b").players, state.players);
    }

    #[test]
    fn test_view_reveals_word_after_round() {
        let state = snapshot(Phase::RoundEnd);
        assert_eq!(state.view_for("b").current_word.as_deref(), Some("Phoenix"));
        let state = snapshot(Phase::GameEnd);
        assert_eq!(state.view_for("b").current_word.as_deref(), Some("Phoenix"));
    }

    #[test]
    fn test_view_omits_word_while_waiting() {
        let state = snapshot(Phase::Waiting);
        assert!(state.view_for("a").current_word.is_none());
    }

    #[test]
    fn test_snapshot_from_envelope() {
        let original = snapshot(Phase::Drawing);
        let frame = Envelope::game_state(&original).unwrap();
        let decoded = Envelope::decode(&frame).unwrap();
        assert_eq!(decoded.kind, EventKind::GameState);
        assert_eq!(decoded.snapshot(), Some(original));
    }
}
