//! Webhook bot that recommends catalog events by user interests, books them
//! on a calendar, and falls back to a hosted completion model for anything
//! else.

pub mod app;
pub mod calendar;
pub mod catalog;
pub mod completion;
pub mod engine;
pub mod mocks;
pub mod prompting;
pub mod services;
pub mod store;
pub mod types;
