mod controller;
mod model;
mod product;
mod user;
mod validate;

pub use controller::{FormController, SubmitError};
pub use model::{FieldKind, FieldSpec, FormMode, FormModel};
pub use product::ProductForm;
pub use user::UserForm;
