#![cfg_attr(not(test), forbid(unsafe_code))]

//! Models and configuration shared by the CarAdvisor client library and CLI.

pub mod config;
pub mod models;
