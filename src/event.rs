use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use std::time::Duration;
use tokio::sync::mpsc;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Terminal was resized; redraw
  Resize,
  /// Periodic tick for applying finished loads and settled searches
  Tick,
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // crossterm's poll blocks, so keep it off the async workers
    tokio::task::spawn_blocking(move || loop {
      let event = if event::poll(tick_rate).unwrap_or(false) {
        match event::read() {
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
          Ok(CrosstermEvent::Resize(_, _)) => Some(Event::Resize),
          _ => None,
        }
      } else {
        Some(Event::Tick)
      };

      if let Some(event) = event {
        if tx.send(event).is_err() {
          break;
        }
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
