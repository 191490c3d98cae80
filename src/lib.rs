//! icongen: prompt in, resized icon or logo out.
//!
//! A thin web service around an image generation API. Prompts can be
//! rewritten through a text completion API first, results are downloaded,
//! resized and written to disk, and every attempt can be logged to a JSON
//! file record store.

#![allow(clippy::multiple_crate_versions)]
#![deny(clippy::all)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::complexity)]
#![deny(clippy::correctness)]
#![deny(clippy::disallowed_methods)]
#![deny(clippy::expect_used)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::panic)]
#![deny(clippy::perf)]
#![deny(clippy::trivially_copy_pass_by_ref)]
#![deny(clippy::unreachable)]
#![deny(clippy::unwrap_used)]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod constants;
pub mod db;
pub mod enhance;
pub mod error;
pub mod generator;
pub mod imagegen;
pub mod models;
pub mod pipeline;
pub mod storage;
pub mod web;
