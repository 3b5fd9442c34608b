use chrono::Utc;

use super::model::{FieldKind, FieldSpec, FormMode, FormModel};
use super::validate::{
  has_mixed_case_and_digit, is_blank, is_valid_email, parse_optional_date, ValidationErrors,
};
use crate::api::types::{Gender, Role, User, UserPayload};

const ROLES: &[&str] = &["admin", "customer"];
const GENDERS: &[&str] = &["", "male", "female", "other"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserForm {
  pub name: String,
  pub email: String,
  pub password: String,
  pub confirm_password: String,
  pub role: String,
  pub gender: String,
  pub dob: String,
}

impl FormModel for UserForm {
  type Record = User;

  fn blank() -> Self {
    Self {
      name: String::new(),
      email: String::new(),
      password: String::new(),
      confirm_password: String::new(),
      role: Role::Customer.as_str().to_string(),
      gender: String::new(),
      dob: String::new(),
    }
  }

  fn from_record(user: &User) -> Self {
    Self {
      name: user.name.clone(),
      email: user.email.clone(),
      password: String::new(),
      confirm_password: String::new(),
      role: user.role.as_str().to_string(),
      gender: user.gender.map(|g| g.as_str().to_string()).unwrap_or_default(),
      dob: user
        .dob
        .map(|d| d.date_naive().format("%Y-%m-%d").to_string())
        .unwrap_or_default(),
    }
  }

  fn fields(mode: &FormMode) -> Vec<FieldSpec> {
    let password = FieldSpec::new("password", "Password", FieldKind::Secret);
    let confirm = FieldSpec::new("confirm_password", "Confirm password", FieldKind::Secret);
    let (password, confirm) = if mode.is_create() {
      (password.required(), confirm.required())
    } else {
      (
        FieldSpec::new("password", "New password", FieldKind::Secret),
        confirm,
      )
    };

    vec![
      FieldSpec::new("name", "Name", FieldKind::Text).required(),
      FieldSpec::new("email", "Email", FieldKind::Text).required(),
      password,
      confirm,
      FieldSpec::new("role", "Role", FieldKind::Choice(ROLES)).required(),
      FieldSpec::new("gender", "Gender", FieldKind::Choice(GENDERS)),
      FieldSpec::new("dob", "Date of birth", FieldKind::Date),
    ]
  }

  fn get(&self, field: &str) -> String {
    match field {
      "name" => self.name.clone(),
      "email" => self.email.clone(),
      "password" => self.password.clone(),
      "confirm_password" => self.confirm_password.clone(),
      "role" => self.role.clone(),
      "gender" => self.gender.clone(),
      "dob" => self.dob.clone(),
      _ => String::new(),
    }
  }

  fn set(&mut self, field: &str, value: &str) {
    let slot = match field {
      "name" => &mut self.name,
      "email" => &mut self.email,
      "password" => &mut self.password,
      "confirm_password" => &mut self.confirm_password,
      "role" => &mut self.role,
      "gender" => &mut self.gender,
      "dob" => &mut self.dob,
      _ => return,
    };
    *slot = value.to_string();
  }

  fn payload(&self, mode: &FormMode) -> Result<UserPayload, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let name = self.name.trim();
    let name_len = name.chars().count();
    if name.is_empty() {
      errors.add("name", "Name is required");
    } else if name_len < 2 {
      errors.add("name", "Name must be at least 2 characters");
    } else if name_len > 50 {
      errors.add("name", "Name must be less than 50 characters");
    }

    let email = self.email.trim();
    if email.is_empty() {
      errors.add("email", "Email is required");
    } else if !is_valid_email(email) {
      errors.add("email", "Please enter a valid email address");
    }

    // Edits only check the password when one was typed
    let password_entered = !self.password.is_empty();
    if mode.is_create() || password_entered {
      if !password_entered {
        errors.add("password", "Password is required");
      } else if self.password.chars().count() < 6 {
        errors.add("password", "Password must be at least 6 characters");
      } else if !has_mixed_case_and_digit(&self.password) {
        errors.add(
          "password",
          "Password must contain at least one uppercase letter, one lowercase letter, and one number",
        );
      }

      if mode.is_create() && self.confirm_password.is_empty() {
        errors.add("confirm_password", "Please confirm your password");
      } else if self.confirm_password != self.password {
        errors.add("confirm_password", "Passwords must match");
      }
    }

    let role = if is_blank(&self.role) {
      errors.add("role", "Role is required");
      None
    } else {
      let role = Role::parse(self.role.trim());
      if role.is_none() {
        errors.add("role", "Please select a valid role");
      }
      role
    };

    let gender = if is_blank(&self.gender) {
      None
    } else {
      let gender = Gender::parse(self.gender.trim());
      if gender.is_none() {
        errors.add("gender", "Please select a valid gender");
      }
      gender
    };

    let dob = match parse_optional_date(&self.dob) {
      Ok(Some(date)) if date > Utc::now().date_naive() => {
        errors.add("dob", "Date of birth cannot be in the future");
        None
      }
      Ok(date) => date,
      Err(_) => {
        errors.add("dob", "Date of birth must be a date (YYYY-MM-DD)");
        None
      }
    };

    errors.into_result()?;
    Ok(UserPayload {
      name: name.to_string(),
      email: email.to_string(),
      role: role.unwrap_or_default(),
      gender,
      dob: dob
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc()),
      password_hash: password_entered.then(|| self.password.clone()),
    })
  }
}
