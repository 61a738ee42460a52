pub mod appsettings;
pub mod approval;
pub mod reentry;
pub mod scheduling;
pub mod tools;
