pub mod backend;
pub mod config;
pub mod controller;
pub mod domain;
pub mod export;
pub mod forms;
pub mod import;
pub mod inputter;
pub mod model;
pub mod record;
pub mod session;
pub mod tasks;
pub mod ui;
pub mod view;
