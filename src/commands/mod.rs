pub mod agenda;
pub mod reminders;
pub mod settings;
