//! AI Email Assistant: draft emails with a language model, send them over SMTP.

pub mod config;
pub mod draft;
pub mod error;
pub mod llm;
pub mod mail;
pub mod recipients;
pub mod web;
