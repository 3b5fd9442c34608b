use super::validate::ValidationErrors;
use crate::api::types::Resource;

/// Whether a dialog creates a new record or edits an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
  Create,
  Edit(String),
}

impl FormMode {
  pub fn is_create(&self) -> bool {
    matches!(self, FormMode::Create)
  }

  pub fn id(&self) -> Option<&str> {
    match self {
      FormMode::Create => None,
      FormMode::Edit(id) => Some(id),
    }
  }
}

/// How a field is edited and displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
  Text,
  /// Masked when rendered
  Secret,
  /// One of a fixed set of values; the empty string means "none"
  Choice(&'static [&'static str]),
  /// "true" / "false"
  Flag,
  /// `YYYY-MM-DD`
  Date,
  Number,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
  pub name: &'static str,
  pub label: &'static str,
  pub kind: FieldKind,
  pub required: bool,
}

impl FieldSpec {
  pub const fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
    Self {
      name,
      label,
      kind,
      required: false,
    }
  }

  pub const fn required(mut self) -> Self {
    self.required = true;
    self
  }
}

/// The editable values behind one resource's dialog.
///
/// Fields are addressed by name and edited as text; `payload` is the only
/// way to turn the values into something the backend accepts, so an
/// invalid form can never be sent.
pub trait FormModel: Clone + Send + 'static {
  type Record: Resource;

  /// Starting values for create mode
  fn blank() -> Self;

  /// Every field pre-populated from an existing record
  fn from_record(record: &Self::Record) -> Self;

  /// Fields shown in `mode`, in display order
  fn fields(mode: &FormMode) -> Vec<FieldSpec>;

  fn get(&self, field: &str) -> String;

  /// Unknown field names are ignored.
  fn set(&mut self, field: &str, value: &str);

  /// Check every rule and build the sanitized request body.
  fn payload(
    &self,
    mode: &FormMode,
  ) -> Result<<Self::Record as Resource>::Payload, ValidationErrors>;

  fn validate(&self, mode: &FormMode) -> ValidationErrors {
    self.payload(mode).err().unwrap_or_default()
  }

  /// Flip a flag or step a choice to its next value.
  fn cycle(&mut self, mode: &FormMode, field: &str) {
    let Some(spec) = Self::fields(mode).into_iter().find(|f| f.name == field) else {
      return;
    };
    let current = self.get(field);
    let next = match spec.kind {
      FieldKind::Flag => {
        if current == "true" {
          "false".to_string()
        } else {
          "true".to_string()
        }
      }
      FieldKind::Choice(options) => {
        let pos = options.iter().position(|o| *o == current);
        let next = pos.map(|p| (p + 1) % options.len()).unwrap_or(0);
        options.get(next).map(|o| o.to_string()).unwrap_or_default()
      }
      _ => return,
    };
    self.set(field, &next);
  }
}
