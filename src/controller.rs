use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;
use tracing::{error, trace};

use crate::domain::{DeskError, Message};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyModifiers};

pub struct Controller {
    event_poll_time: u64,
    receiver: Receiver<Message>,
}

impl Controller {
    pub fn new(event_poll_time: u64, receiver: Receiver<Message>) -> Self {
        Self {
            event_poll_time,
            receiver,
        }
    }

    /// Backend results take priority over key presses.
    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, DeskError> {
        match self.receiver.try_recv() {
            Ok(message) => return Ok(Some(message)),
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => error!("Worker channel closed"),
        }

        if event::poll(Duration::from_millis(self.event_poll_time))?
            && let Event::Key(key) = event::read()?
            && key.kind == event::KeyEventKind::Press
        {
            if model.raw_keyevents() {
                return Ok(Some(Message::RawKey(key)));
            }
            if model.is_confirming() {
                return Ok(Self::handle_confirm_key(key));
            }
            return Ok(Self::handle_key(key));
        }
        Ok(None)
    }

    fn handle_confirm_key(key: event::KeyEvent) -> Option<Message> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => Some(Message::Confirm),
            KeyCode::Char('n') | KeyCode::Esc => Some(Message::Exit),
            KeyCode::Char('q') => Some(Message::Quit),
            _ => None,
        }
    }

    fn handle_key(key: event::KeyEvent) -> Option<Message> {
        let message = match (key.code, key.modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(Message::Quit),
            (KeyCode::Char('q'), _) => Some(Message::Quit),
            (KeyCode::Char('j') | KeyCode::Down, _) => Some(Message::MoveDown),
            (KeyCode::Char('k') | KeyCode::Up, _) => Some(Message::MoveUp),
            (KeyCode::Char('h') | KeyCode::Left, _) => Some(Message::MoveLeft),
            (KeyCode::Char('l') | KeyCode::Right, _) => Some(Message::MoveRight),
            (KeyCode::Char('n') | KeyCode::PageDown, _) => Some(Message::NextPage),
            (KeyCode::Char('p') | KeyCode::PageUp, _) => Some(Message::PrevPage),
            (KeyCode::Char('g') | KeyCode::Home, _) => Some(Message::FirstPage),
            (KeyCode::Char('G') | KeyCode::End, _) => Some(Message::LastPage),
            (KeyCode::Char('s'), _) => Some(Message::Sort),
            (KeyCode::Char('/'), _) => Some(Message::Search),
            (KeyCode::Char('c'), _) => Some(Message::ClearSearch),
            (KeyCode::Char('e'), _) => Some(Message::CyclePageSize),
            (KeyCode::Char('d') | KeyCode::Delete, _) => Some(Message::Delete),
            (KeyCode::Char('y'), _) => Some(Message::CopyRow),
            (KeyCode::Char('r'), _) => Some(Message::Refresh),
            (KeyCode::Char('i'), _) => Some(Message::Import),
            (KeyCode::Char('x'), _) => Some(Message::Export),
            (KeyCode::Char('L'), _) => Some(Message::Logout),
            (KeyCode::Char('?'), _) => Some(Message::Help),
            (KeyCode::Enter, _) => Some(Message::Enter),
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
        assert!(matches!(
            Controller::handle_key(key(KeyCode::Char('s'))),
            Some(Message::Sort)
        ));
        assert!(matches!(
            Controller::handle_key(key(KeyCode::PageDown)),
            Some(Message::NextPage)
        ));
        assert!(matches!(
            Controller::handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(Message::Quit)
        ));
        assert!(Controller::handle_key(key(KeyCode::Char('z'))).is_none());
    }

    #[test]
    fn confirm_keys() {
        assert!(matches!(
            Controller::handle_confirm_key(key(KeyCode::Char('y'))),
            Some(Message::Confirm)
        ));
        assert!(matches!(
            Controller::handle_confirm_key(key(KeyCode::Esc)),
            Some(Message::Exit)
        ));
        assert!(Controller::handle_confirm_key(key(KeyCode::Char('d'))).is_none());
    }
}
