pub mod correspondent;
pub mod file;
pub mod run;
