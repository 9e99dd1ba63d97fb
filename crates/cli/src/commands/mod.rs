pub mod catalog;
pub mod chat;
pub mod control;
pub mod doctor;
pub mod history;
pub mod init;
