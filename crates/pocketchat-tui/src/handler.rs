use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use pocketchat_core::{GenerationBridge, GenerationEvent, WorkerError};
use crate::app::App;
use crate::tui::AppEvent;

const SCROLL_STEP: u16 = 3;

pub fn handle_event(app: &mut App, bridge: &GenerationBridge, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, bridge, key)?,
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Generation(event) => app.chat.apply(event),
        AppEvent::WorkerGone => {
            tracing::warn!("generation worker exited");
            app.worker_alive = false;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, bridge: &GenerationBridge, key: KeyEvent) -> Result<()> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global keys that work whether or not the drawer is open
    match key.code {
        KeyCode::Char('c') if ctrl => {
            app.should_quit = true;
            return Ok(());
        }
        KeyCode::Char('b') if ctrl => {
            app.toggle_drawer();
            return Ok(());
        }
        KeyCode::F(2) => {
            app.toggle_drawer();
            return Ok(());
        }
        _ => {}
    }

    if app.chat.is_drawer_open() {
        handle_drawer_key(app, bridge, key)?;
    } else {
        handle_closed_key(app, key);
    }
    Ok(())
}

fn handle_closed_key(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Enter | KeyCode::Char('o') => app.toggle_drawer(),
        _ => {}
    }
}

fn handle_drawer_key(app: &mut App, bridge: &GenerationBridge, key: KeyEvent) -> Result<()> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    match key.code {
        KeyCode::Esc => app.chat.close_drawer(),

        // Alt+Enter (or Shift+Enter where the terminal reports it) adds a line
        KeyCode::Enter if alt || key.modifiers.contains(KeyModifiers::SHIFT) => {
            app.insert_char('\n');
        }
        // Nothing can answer once the worker is gone; keep the draft
        KeyCode::Enter if !app.worker_alive => {}
        KeyCode::Enter => {
            if let Some(history) = app.submit() {
                tracing::debug!(messages = history.len(), "sending turn");
                if let Err(err) = bridge.generate_with_history(history) {
                    tracing::warn!(error = %format!("{:#}", err), "could not send turn");
                    app.worker_alive = false;
                    app.chat.apply(GenerationEvent::Error(WorkerError::Generation(format!("{:#}", err))));
                }
            }
        }

        KeyCode::Char('t') if ctrl => app.show_thinking = !app.show_thinking,

        KeyCode::PageUp => app.scroll_up(app.chat_area.map_or(10, |r| r.height / 2)),
        KeyCode::PageDown => app.scroll_down(app.chat_area.map_or(10, |r| r.height / 2)),
        KeyCode::Up if ctrl => app.scroll_up(1),
        KeyCode::Down if ctrl => app.scroll_down(1),
        KeyCode::End if ctrl => app.scroll_to_bottom(),

        KeyCode::Backspace => app.delete_before_cursor(),
        KeyCode::Delete => app.delete_at_cursor(),
        KeyCode::Left => app.cursor_left(),
        KeyCode::Right => app.cursor_right(),
        KeyCode::Home => app.cursor_home(),
        KeyCode::End => app.cursor_end(),
        KeyCode::Char(c) if !ctrl => app.insert_char(c),
        _ => {}
    }
    Ok(())
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    let in_chat = app.chat_area.is_some_and(|r| point_in_rect(x, y, r));
    let on_toggle = app.toggle_area.is_some_and(|r| point_in_rect(x, y, r));

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) if on_toggle => app.toggle_drawer(),
        MouseEventKind::ScrollDown if in_chat => app.scroll_down(SCROLL_STEP),
        MouseEventKind::ScrollUp if in_chat => app.scroll_up(SCROLL_STEP),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pocketchat_core::bridge::WorkerSettings;
    use pocketchat_core::{
        ChatState, DownloadProgress, GenerationOptions, PipelineHandle, PipelineLoader,
        TextGenerationPipeline, APOLOGY_MESSAGE,
    };
    use std::sync::Arc;

    /// Loader whose task dies before the model is ready.
    struct CrashingLoader;

    #[async_trait]
    impl PipelineLoader for CrashingLoader {
        async fn load(
            &self,
            _on_progress: &mut (dyn FnMut(DownloadProgress) + Send),
        ) -> anyhow::Result<Arc<dyn TextGenerationPipeline>> {
            panic!("runtime crashed while loading");
        }
    }

    /// A bridge whose worker has already exited.
    async fn dead_bridge() -> GenerationBridge {
        let settings = WorkerSettings {
            options: GenerationOptions::default(),
            system_prompt: "You are a friendly assistant.".to_string(),
        };
        let mut bridge = GenerationBridge::spawn(PipelineHandle::new(CrashingLoader), settings);
        while bridge.next_event().await.is_some() {}
        bridge
    }

    fn press(app: &mut App, bridge: &GenerationBridge, code: KeyCode) -> Result<()> {
        handle_event(app, bridge, AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)))
    }

    fn drawer_app() -> App {
        let mut app = App::new(ChatState::default(), "qwen3:0.6b", "http://localhost:11434");
        app.chat.open_drawer();
        app
    }

    #[tokio::test]
    async fn test_send_to_exited_worker_shows_apology_and_keeps_running() {
        let bridge = dead_bridge().await;
        let mut app = drawer_app();

        press(&mut app, &bridge, KeyCode::Char('h')).unwrap();
        press(&mut app, &bridge, KeyCode::Char('i')).unwrap();
        assert!(press(&mut app, &bridge, KeyCode::Enter).is_ok());

        let contents: Vec<&str> = app.chat.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", APOLOGY_MESSAGE]);
        assert!(!app.chat.is_generating());
        assert!(!app.worker_alive);
        assert!(!app.should_quit);
    }

    #[tokio::test]
    async fn test_enter_keeps_draft_once_worker_is_gone() {
        let bridge = dead_bridge().await;
        let mut app = drawer_app();
        app.worker_alive = false;
        app.input = "hi".to_string();
        app.cursor = 2;

        press(&mut app, &bridge, KeyCode::Enter).unwrap();

        assert_eq!(app.input, "hi");
        assert!(app.chat.messages().is_empty());
    }

    #[test]
    fn test_point_in_rect() {
        let rect = Rect::new(10, 5, 4, 2);
        assert!(point_in_rect(10, 5, rect));
        assert!(point_in_rect(13, 6, rect));
        assert!(!point_in_rect(14, 6, rect));
        assert!(!point_in_rect(9, 5, rect));
    }
}
