//! Submit lifecycle of a create/edit dialog.
//!
//! The controller owns the form values, their field errors and at most one
//! submission. A submission only starts from a valid form, and nothing else
//! can start while it runs; its outcome is applied on the UI tick by
//! [`FormController::poll`].

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{info, warn};

use super::model::{FieldSpec, FormMode, FormModel};
use super::validate::ValidationErrors;
use crate::api::types::Resource;
use crate::api::{ApiError, ResourceService};
use crate::query::{Mutation, QueryCache, QueryKey};

/// Where the dialog is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormStatus {
  Editing,
  Submitting,
  /// Saved; the dialog should close
  Succeeded,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
  #[error("please fix the highlighted fields")]
  Invalid(ValidationErrors),

  #[error("a save is already in progress")]
  InFlight,

  #[error("the form was already saved")]
  Closed,

  #[error(transparent)]
  Api(#[from] ApiError),
}

type SuccessCallback<R> = Box<dyn FnOnce(&R) + Send>;
type Outcome<R> = Result<R, ApiError>;

pub struct FormController<F: FormModel> {
  cache: QueryCache,
  service: Arc<dyn ResourceService<F::Record>>,
  mode: FormMode,
  values: F,
  errors: ValidationErrors,
  status: FormStatus,
  submit_error: Option<ApiError>,
  pending: Option<oneshot::Receiver<Outcome<F::Record>>>,
  on_success: Option<SuccessCallback<F::Record>>,
}

impl<F: FormModel> FormController<F> {
  fn with_values(
    cache: QueryCache,
    service: Arc<dyn ResourceService<F::Record>>,
    mode: FormMode,
    values: F,
  ) -> Self {
    Self {
      cache,
      service,
      mode,
      values,
      errors: ValidationErrors::new(),
      status: FormStatus::Editing,
      submit_error: None,
      pending: None,
      on_success: None,
    }
  }

  pub fn new_create(cache: QueryCache, service: Arc<dyn ResourceService<F::Record>>) -> Self {
    Self::with_values(cache, service, FormMode::Create, F::blank())
  }

  pub fn new_edit(
    cache: QueryCache,
    service: Arc<dyn ResourceService<F::Record>>,
    record: &F::Record,
  ) -> Self {
    let mode = FormMode::Edit(record.id().to_string());
    Self::with_values(cache, service, mode, F::from_record(record))
  }

  /// Called once with the saved record when a submission succeeds.
  pub fn with_on_success(mut self, callback: impl FnOnce(&F::Record) + Send + 'static) -> Self {
    self.on_success = Some(Box::new(callback));
    self
  }

  pub fn mode(&self) -> &FormMode {
    &self.mode
  }

  pub fn fields(&self) -> Vec<FieldSpec> {
    F::fields(&self.mode)
  }

  pub fn value(&self, field: &str) -> String {
    self.values.get(field)
  }

  pub fn is_open(&self) -> bool {
    self.status != FormStatus::Succeeded
  }

  pub fn is_submitting(&self) -> bool {
    self.status == FormStatus::Submitting
  }

  pub fn error_for(&self, field: &str) -> Option<&str> {
    self.errors.get(field)
  }

  /// Error from the last failed submission
  pub fn submit_error(&self) -> Option<&ApiError> {
    self.submit_error.as_ref()
  }

  /// Change one field. Ignored while a submission is running.
  pub fn set_field(&mut self, field: &str, value: &str) {
    if self.status != FormStatus::Editing {
      return;
    }
    self.values.set(field, value);
    self.errors.remove(field);
  }

  pub fn cycle_field(&mut self, field: &str) {
    if self.status != FormStatus::Editing {
      return;
    }
    self.values.cycle(&self.mode, field);
    self.errors.remove(field);
  }

  /// Show `field`'s rule failure, or clear it, leaving the other fields'
  /// errors alone. Used when focus leaves a field.
  pub fn check_field(&mut self, field: &'static str) {
    if self.status != FormStatus::Editing {
      return;
    }
    self.errors.remove(field);
    if let Some(message) = self.values.validate(&self.mode).get(field) {
      self.errors.add(field, message);
    }
  }

  /// Start saving the form. Nothing is sent while the form is invalid or
  /// a previous save is still running.
  pub fn submit(&mut self) -> Result<(), SubmitError> {
    match self.status {
      FormStatus::Submitting => return Err(SubmitError::InFlight),
      FormStatus::Succeeded => return Err(SubmitError::Closed),
      FormStatus::Editing => {}
    }

    let payload = match self.values.payload(&self.mode) {
      Ok(payload) => payload,
      Err(errors) => {
        self.errors = errors.clone();
        return Err(SubmitError::Invalid(errors));
      }
    };
    self.errors = ValidationErrors::new();
    self.submit_error = None;
    self.status = FormStatus::Submitting;
    info!(resource = <F::Record as Resource>::NAME, mode = ?self.mode, "form submitted");

    let (tx, rx) = oneshot::channel();
    self.pending = Some(rx);
    let cache = self.cache.clone();
    let service = Arc::clone(&self.service);
    let mode = self.mode.clone();
    tokio::spawn(async move {
      let result = match &mode {
        FormMode::Create => {
          cache
            .mutate(Mutation::create::<F::Record>(), service.create(&payload))
            .await
        }
        FormMode::Edit(id) => {
          cache
            .mutate(
              Mutation::update::<F::Record>(id),
              service.update(id, &payload),
            )
            .await
        }
      };
      if let Ok(record) = &result {
        cache.set_data(QueryKey::detail::<F::Record>(record.id()), record.clone());
      }
      let _ = tx.send(result);
    });
    Ok(())
  }

  /// Apply a finished submission. Returns true when the state changed.
  pub fn poll(&mut self) -> bool {
    let Some(rx) = self.pending.as_mut() else {
      return false;
    };
    let outcome = match rx.try_recv() {
      Ok(outcome) => outcome,
      Err(oneshot::error::TryRecvError::Empty) => return false,
      Err(oneshot::error::TryRecvError::Closed) => {
        Err(ApiError::Transport("submission was cancelled".into()))
      }
    };
    self.pending = None;

    match outcome {
      Ok(record) => {
        info!(resource = <F::Record as Resource>::NAME, id = record.id(), "form saved");
        self.status = FormStatus::Succeeded;
        if let Some(callback) = self.on_success.take() {
          callback(&record);
        }
      }
      Err(err) => {
        warn!(resource = <F::Record as Resource>::NAME, error = %err, "form save failed");
        self.status = FormStatus::Editing;
        self.submit_error = Some(err);
      }
    }
    true
  }
}
