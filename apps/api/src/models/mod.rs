pub mod import_run;
pub mod talent;
pub mod user;
