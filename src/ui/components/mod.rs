mod command_input;
mod input;
mod search_input;

pub use command_input::{CommandEvent, CommandInput};
pub use input::{InputResult, TextInput};
pub use search_input::{SearchEvent, SearchInput};

/// What a component did with a key, shared by the overlay components so a
/// view can chain them: the first one that doesn't answer `NotHandled`
/// owns the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Taken, nothing for the caller to do
  Handled,
  /// Taken, and the caller has something to act on
  Event(T),
  NotHandled,
}
