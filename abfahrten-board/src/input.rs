use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::App;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    Quit,
    /// Fetch the board again right away.
    Refresh,
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{Char, Down, Esc, Up};

    if key.code == Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }
    if !key.modifiers.is_empty() {
        return Action::None;
    }

    match key.code {
        Char('q') | Esc => Action::Quit,
        Char('r') => Action::Refresh,
        Up | Char('k') => {
            app.scroll_up();
            Action::None
        }
        Down | Char('j') => {
            app.scroll_down();
            Action::None
        }
        _ => Action::None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use abfahrten_core::{BoardConfig, BoardService, ProviderRegistry};

    use super::*;

    fn app() -> App {
        let config = BoardConfig {
            sources: Vec::new(),
            ..BoardConfig::default()
        };
        let service = BoardService::new(Arc::new(ProviderRegistry::new(Vec::new())), &config)
            .unwrap();
        App::new(Arc::new(service), Duration::from_secs(30))
    }

    fn press(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn quit_shortcuts() {
        let mut app = app();

        assert_eq!(
            handle_key_event(press(KeyCode::Char('q'), KeyModifiers::NONE), &mut app),
            Action::Quit
        );
        assert_eq!(
            handle_key_event(press(KeyCode::Char('c'), KeyModifiers::CONTROL), &mut app),
            Action::Quit
        );
        assert_eq!(
            handle_key_event(press(KeyCode::Char('c'), KeyModifiers::NONE), &mut app),
            Action::None
        );
    }

    #[test]
    fn r_requests_refresh() {
        let mut app = app();

        assert_eq!(
            handle_key_event(press(KeyCode::Char('r'), KeyModifiers::NONE), &mut app),
            Action::Refresh
        );
    }

    #[test]
    fn scrolling_stays_within_empty_board() {
        let mut app = app();

        handle_key_event(press(KeyCode::Down, KeyModifiers::NONE), &mut app);
        handle_key_event(press(KeyCode::Up, KeyModifiers::NONE), &mut app);

        assert_eq!(app.scroll, 0);
        assert!(app.refresh_due());
    }
}
