mod bits;
pub mod error;
pub mod learning_switch;
pub mod ofp_controller;
pub mod ofp_header;
pub mod ofp_message;
pub mod openflow0x01;
pub mod packet;
pub mod registry;

pub use error::{Error, Result};
