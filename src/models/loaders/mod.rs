pub mod csv_loader;

pub use csv_loader::load_projects_from_csv;
