#![deny(clippy::dbg_macro)]
pub mod font;
pub mod graphics;
pub mod image;
pub mod page;
