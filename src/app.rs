use crate::api::types::{Category, Order, Product, Resource, User};
use crate::api::{ApiClient, ResourceService};
use crate::commands;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::query::{CacheOptions, QueryCache};
use crate::ui;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{DashboardView, ResourceListView};
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const TICK_RATE: Duration = Duration::from_millis(100);

/// Everything a view needs to talk to the backend
#[derive(Clone)]
pub struct Services {
  pub cache: QueryCache,
  pub client: Arc<ApiClient>,
  pub page_size: u32,
  pub search_delay: Duration,
}

impl Services {
  pub fn from_config(config: &Config) -> Result<Self> {
    Ok(Self {
      cache: QueryCache::new(CacheOptions::from(&config.cache)),
      client: Arc::new(ApiClient::from_config(config)?),
      page_size: config.lists.page_size,
      search_delay: config.lists.search_debounce(),
    })
  }

  /// The backend collection for `R`
  pub fn service<R: Resource>(&self) -> Arc<dyn ResourceService<R>> {
    self.client.clone()
  }
}

/// Root view for a `:command`, or None if it does not name a view.
fn root_view(services: &Services, name: &str) -> Option<Box<dyn View>> {
  let view: Box<dyn View> = match name {
    "dashboard" => Box::new(DashboardView::new(services)),
    "users" => Box::new(ResourceListView::<User>::new(services, "Users")),
    "customers" => Box::new(ResourceListView::<User>::filtered(
      services,
      "Customers",
      "role",
      "customer",
    )),
    "products" => Box::new(ResourceListView::<Product>::new(services, "Products")),
    "orders" => Box::new(ResourceListView::<Order>::new(services, "Orders")),
    "categories" => Box::new(ResourceListView::<Category>::new(services, "Categories")),
    _ => return None,
  };
  Some(view)
}

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// `:` prompt
  command: CommandInput,

  services: Services,

  /// Header title
  title: String,

  /// Last app-level message (unknown command, ...)
  status: Option<String>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: &Config, initial_view: &str) -> Result<Self> {
    let services = Services::from_config(config)?;
    let mut app = Self {
      view_stack: Vec::new(),
      command: CommandInput::new(),
      services,
      title: config.display_title(),
      status: None,
      should_quit: false,
    };
    app.execute_command(initial_view);
    if app.view_stack.is_empty() {
      let status = app.status.take();
      app.execute_command("dashboard");
      app.status = status;
    }
    Ok(app)
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(TICK_RATE);
    info!(title = %self.title, "shopdesk started");

    // Main loop
    let result = loop {
      if let Err(e) = terminal.draw(|frame| ui::draw(frame, self)) {
        break Err(e.into());
      }
      if self.should_quit {
        break Ok(());
      }

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break Ok(()),
      }
    };

    // Views go first so nothing subscribes to the cache while it is torn down
    self.view_stack.clear();
    let entries = self.services.cache.clear();
    info!(entries, "query cache cleared");

    // Cleanup terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.tick(),
      Event::Resize => {}
    }
  }

  fn tick(&mut self) {
    // Every view on the stack keeps following its data
    for view in &mut self.view_stack {
      view.tick();
    }
    // Finished dialogs and deleted records close themselves
    while self.view_stack.len() > 1 && self.view_stack.last().is_some_and(|v| v.wants_close()) {
      self.view_stack.pop();
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let view_has_input = self
      .current_view()
      .map(|v| v.captures_input())
      .unwrap_or(false);
    if self.command.is_active() || !view_has_input {
      match self.command.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(cmd)) => {
          self.execute_command(&cmd);
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    self.status = None;
    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::None,
    };
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        // The root view stays; leave with :quit or Ctrl-C
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        }
      }
    }
  }

  fn execute_command(&mut self, input: &str) {
    let Some(command) = commands::find(input) else {
      warn!(command = input, "unknown command");
      self.status = Some(format!("Unknown command: {}", input));
      return;
    };

    if command.name == "quit" {
      self.should_quit = true;
      return;
    }

    if let Some(view) = root_view(&self.services, command.name) {
      info!(view = command.name, "switching view");
      self.view_stack.clear();
      self.view_stack.push(view);
      self.status = None;
    }
  }

  // Accessors for rendering

  pub fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  pub fn current_view_mut(&mut self) -> Option<&mut Box<dyn View>> {
    self.view_stack.last_mut()
  }

  pub fn breadcrumb(&self) -> Vec<String> {
    self.view_stack.iter().map(|v| v.breadcrumb_label()).collect()
  }

  pub fn title(&self) -> &str {
    &self.title
  }

  pub fn status(&self) -> Option<&str> {
    self.status.as_deref()
  }

  pub fn command_input(&self) -> &CommandInput {
    &self.command
  }
}
