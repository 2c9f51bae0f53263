pub mod cards;
pub mod config;
pub mod dispatch;
pub mod feed;
pub mod form;
pub mod logging;
pub mod notify;
pub mod panel;
pub mod region;

mod error;

pub use config::Config;
pub use error::{Error, Result};
pub use lerobot_gui_client as client;
