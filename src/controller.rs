use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, TabConfig, TabError};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(cfg: &TabConfig) -> Self {
        Self {
            event_poll_time: cfg.event_poll_time,
        }
    }

    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, TabError> {
        if event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(self.map_event(event::read()?, model.raw_keyevents()));
        }
        Ok(None)
    }

    pub fn map_event(&self, event: Event, raw: bool) -> Option<Message> {
        match event {
            Event::Key(key) if key.kind == event::KeyEventKind::Press => self.handle_key(key, raw),
            Event::FocusLost => Some(Message::FocusLost),
            _ => None,
        }
    }

    /// Maps a key press to a message. While text is being entered every key is passed on raw.
    pub fn handle_key(&self, key: event::KeyEvent, raw: bool) -> Option<Message> {
        if raw {
            return Some(Message::RawKey(key));
        }
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Up | KeyCode::Char('k'), _) => Some(Message::MoveUp),
            (KeyCode::Down | KeyCode::Char('j'), _) => Some(Message::MoveDown),
            (KeyCode::Left | KeyCode::Char('h'), _) => Some(Message::MoveLeft),
            (KeyCode::Right | KeyCode::Char('l'), _) => Some(Message::MoveRight),
            (KeyCode::PageDown | KeyCode::Char('n'), _) => Some(Message::NextPage),
            (KeyCode::PageUp | KeyCode::Char('p'), _) => Some(Message::PreviousPage),
            (KeyCode::Char('s'), _) => Some(Message::CyclePageSize),
            (KeyCode::Enter | KeyCode::Char(' '), _) => Some(Message::Activate),
            (KeyCode::Char('a'), _) => Some(Message::AddRow),
            (KeyCode::Delete | KeyCode::Char('d'), _) => Some(Message::DeleteRow),
            (KeyCode::Char('c'), _) => Some(Message::CopyCell),
            (KeyCode::Char('C'), _) => Some(Message::CopyRow),
            (KeyCode::Char('o'), _) => Some(Message::Open),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Esc, _) => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn maps_table_keys() {
        let controller = Controller::new(&TabConfig::default());
        assert_eq!(controller.handle_key(key(KeyCode::Char('q')), false), Some(Message::Quit));
        assert_eq!(controller.handle_key(key(KeyCode::Enter), false), Some(Message::Activate));
        assert_eq!(controller.handle_key(key(KeyCode::Char('a')), false), Some(Message::AddRow));
        assert_eq!(controller.handle_key(key(KeyCode::Delete), false), Some(Message::DeleteRow));
        assert_eq!(controller.handle_key(key(KeyCode::PageDown), false), Some(Message::NextPage));
        assert_eq!(
            controller.handle_key(KeyEvent::new(KeyCode::Char('C'), KeyModifiers::SHIFT), false),
            Some(Message::CopyRow)
        );
        assert_eq!(controller.handle_key(key(KeyCode::Char('z')), false), None);
        assert_eq!(
            controller.map_event(Event::FocusLost, true),
            Some(Message::FocusLost)
        );
        assert_eq!(controller.map_event(Event::FocusGained, false), None);
    }

    #[test]
    fn raw_mode_passes_keys_through() {
        let controller = Controller::new(&TabConfig::default());
        let q = key(KeyCode::Char('q'));
        assert_eq!(controller.handle_key(q, true), Some(Message::RawKey(q)));
    }
}
