// Format/quality selection state machine
//
//   AwaitingUrl ──url──▶ AwaitingKind ──type|mp3──────────────▶ Resolved
//                             │  ▲
//                   type|video│  │back|menu
//                             ▼  │
//                        AwaitingQuality ──qual|<h>──▶ Resolved
//
// Callback payloads are "<action>|<value>" strings carried by menu buttons.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::downloader::format_selector::QUALITY_LADDER;
use crate::downloader::models::{MediaKind, Quality, SelectionRequest};
use crate::downloader::DownloadError;
use crate::session::{ConversationId, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionState {
    AwaitingUrl,
    AwaitingKind,
    AwaitingQuality,
    Resolved,
}

/// Decoded button payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callback {
    Kind(MediaKind),
    Quality(Quality),
    Back,
}

impl Callback {
    pub fn encode(&self) -> String {
        match self {
            Self::Kind(MediaKind::Audio) => "type|mp3".to_string(),
            Self::Kind(MediaKind::Video) => "type|video".to_string(),
            Self::Quality(Quality::Best) => "qual|best".to_string(),
            Self::Quality(Quality::Height(h)) => format!("qual|{}", h),
            Self::Back => "back|menu".to_string(),
        }
    }
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl FromStr for Callback {
    type Err = String;

    fn from_str(payload: &str) -> Result<Self, Self::Err> {
        let (action, value) = payload
            .split_once('|')
            .ok_or_else(|| format!("Malformed callback: {}", payload))?;

        match (action, value) {
            ("type", "mp3") | ("type", "audio") => Ok(Self::Kind(MediaKind::Audio)),
            ("type", "video") => Ok(Self::Kind(MediaKind::Video)),
            ("qual", "best") => Ok(Self::Quality(Quality::Best)),
            ("qual", h) => {
                let height: u32 = h
                    .parse()
                    .map_err(|_| format!("Unknown quality: {}", h))?;
                if QUALITY_LADDER.contains(&height) {
                    Ok(Self::Quality(Quality::Height(height)))
                } else {
                    Err(format!("Quality not offered: {}", height))
                }
            }
            ("back", "menu") => Ok(Self::Back),
            _ => Err(format!("Unknown callback: {}", payload)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Button {
    pub label: String,
    pub payload: String,
}

impl Button {
    fn new(label: impl Into<String>, callback: Callback) -> Self {
        Self {
            label: label.into(),
            payload: callback.encode(),
        }
    }
}

/// Text plus inline keyboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Menu {
    pub text: String,
    pub buttons: Vec<Vec<Button>>,
}

impl Menu {
    pub fn kind(url: &str) -> Self {
        Self {
            text: format!("🎬 Choose a format for:\n{}", url),
            buttons: vec![vec![
                Button::new("🎵 MP3 (Audio)", Callback::Kind(MediaKind::Audio)),
                Button::new("🎬 Video", Callback::Kind(MediaKind::Video)),
            ]],
        }
    }

    pub fn quality() -> Self {
        let mut buttons: Vec<Vec<Button>> = QUALITY_LADDER
            .chunks(2)
            .map(|row| {
                row.iter()
                    .map(|h| Button::new(format!("{}p", h), Callback::Quality(Quality::Height(*h))))
                    .collect()
            })
            .collect();
        buttons.push(vec![Button::new("⭐ Best available", Callback::Quality(Quality::Best))]);
        buttons.push(vec![Button::new("⬅️ Back", Callback::Back)]);

        Self {
            text: "📺 Choose video quality:".to_string(),
            buttons,
        }
    }
}

/// Result of feeding one input to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Re-render this menu
    Menu(Menu),
    /// Selection complete; hand to the router
    Resolved(SelectionRequest),
    /// Input refused; tell the user why
    Rejected(String),
}

pub struct SelectionMachine {
    sessions: Arc<SessionStore>,
}

impl SelectionMachine {
    pub fn new(sessions: Arc<SessionStore>) -> Self {
        Self { sessions }
    }

    pub fn state(&self, conversation: ConversationId) -> SelectionState {
        self.sessions
            .get(conversation)
            .map(|s| s.state)
            .unwrap_or(SelectionState::AwaitingUrl)
    }

    pub fn stored_url(&self, conversation: ConversationId) -> Option<String> {
        self.sessions.get(conversation).map(|s| s.url)
    }

    /// A new URL always starts over, whatever state the conversation was in
    pub fn submit_url(&self, conversation: ConversationId, url: &str) -> Step {
        self.sessions.start(conversation, url);
        debug!(conversation, url, "session started");
        Step::Menu(Menu::kind(url))
    }

    pub fn handle_callback(&self, conversation: ConversationId, payload: &str) -> Step {
        let callback = match payload.parse::<Callback>() {
            Ok(c) => c,
            Err(e) => return Step::Rejected(format!("❌ {}", e)),
        };

        let Some(session) = self.sessions.get(conversation) else {
            return Step::Rejected(DownloadError::LinkExpired.user_message());
        };

        let (next, step) = match (session.state, callback) {
            (_, Callback::Kind(MediaKind::Audio)) => (
                SelectionState::Resolved,
                Step::Resolved(SelectionRequest::new(session.url.clone(), MediaKind::Audio, Quality::Best)),
            ),
            (_, Callback::Kind(MediaKind::Video)) => (SelectionState::AwaitingQuality, Step::Menu(Menu::quality())),
            (SelectionState::AwaitingQuality, Callback::Quality(quality)) => (
                SelectionState::Resolved,
                Step::Resolved(SelectionRequest::new(session.url.clone(), MediaKind::Video, quality)),
            ),
            // Stale quality button: show the format menu again
            (_, Callback::Quality(_)) | (_, Callback::Back) => {
                (SelectionState::AwaitingKind, Step::Menu(Menu::kind(&session.url)))
            }
        };

        if self.sessions.advance(conversation, &session.url, next) {
            return step;
        }

        // Replaced by a newer URL or expired since the read above
        debug!(conversation, url = %session.url, "callback raced a session change");
        match self.sessions.get(conversation) {
            Some(current) => Step::Menu(Menu::kind(&current.url)),
            None => Step::Rejected(DownloadError::LinkExpired.user_message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    fn machine() -> SelectionMachine {
        SelectionMachine::new(Arc::new(SessionStore::default()))
    }

    #[test]
    fn test_callback_codec() {
        for payload in ["type|mp3", "type|video", "qual|720", "qual|best", "back|menu"] {
            let cb: Callback = payload.parse().unwrap();
            assert_eq!(cb.encode(), payload);
        }
        assert!("qual|999".parse::<Callback>().is_err());
        assert!("qual|abc".parse::<Callback>().is_err());
        assert!("nonsense".parse::<Callback>().is_err());
        assert!("type|flac".parse::<Callback>().is_err());
    }

    #[test]
    fn test_video_goes_through_quality() {
        let m = machine();
        assert_eq!(m.state(1), SelectionState::AwaitingUrl);
        assert!(matches!(m.submit_url(1, URL), Step::Menu(_)));
        assert_eq!(m.state(1), SelectionState::AwaitingKind);

        assert_eq!(m.handle_callback(1, "type|video"), Step::Menu(Menu::quality()));
        assert_eq!(m.state(1), SelectionState::AwaitingQuality);

        assert_eq!(
            m.handle_callback(1, "qual|720"),
            Step::Resolved(SelectionRequest::new(URL, MediaKind::Video, Quality::Height(720)))
        );
        assert_eq!(m.state(1), SelectionState::Resolved);
    }

    #[test]
    fn test_audio_resolves_directly() {
        let m = machine();
        m.submit_url(1, URL);
        assert_eq!(
            m.handle_callback(1, "type|mp3"),
            Step::Resolved(SelectionRequest::new(URL, MediaKind::Audio, Quality::Best))
        );
        assert_eq!(m.state(1), SelectionState::Resolved);
    }

    #[test]
    fn test_back_preserves_url() {
        let m = machine();
        m.submit_url(1, URL);
        m.handle_callback(1, "type|video");
        assert_eq!(m.handle_callback(1, "back|menu"), Step::Menu(Menu::kind(URL)));
        assert_eq!(m.state(1), SelectionState::AwaitingKind);
        assert_eq!(m.stored_url(1).as_deref(), Some(URL));
    }

    #[test]
    fn test_no_url_is_link_expired() {
        let m = machine();
        match m.handle_callback(7, "type|mp3") {
            Step::Rejected(text) => assert!(text.contains("Link expired")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(m.state(7), SelectionState::AwaitingUrl);
    }

    #[test]
    fn test_stale_quality_button() {
        let m = machine();
        m.submit_url(1, URL);
        assert_eq!(m.handle_callback(1, "qual|480"), Step::Menu(Menu::kind(URL)));
        assert_eq!(m.state(1), SelectionState::AwaitingKind);
    }

    #[test]
    fn test_conversations_are_independent() {
        let m = machine();
        m.submit_url(1, "https://a.example/1");
        m.submit_url(2, "https://b.example/2");
        m.handle_callback(1, "type|video");
        assert_eq!(m.state(2), SelectionState::AwaitingKind);
        assert_eq!(m.stored_url(2).as_deref(), Some("https://b.example/2"));
    }

    #[test]
    fn test_quality_menu_layout() {
        let menu = Menu::quality();
        let payloads: Vec<&str> = menu
            .buttons
            .iter()
            .flatten()
            .map(|b| b.payload.as_str())
            .collect();
        assert_eq!(
            payloads,
            vec!["qual|1080", "qual|720", "qual|480", "qual|360", "qual|best", "back|menu"]
        );
    }
}
