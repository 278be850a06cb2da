pub mod loaders;
pub mod project;

pub use loaders::load_projects_from_csv;
pub use project::{CaptchaAttempt, ComplaintRecord, ProjectDetails, ProjectRecord};
