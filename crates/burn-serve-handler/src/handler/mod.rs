//! Handler lifecycle.
//!
//! A handler is used in two phases:
//! 1. [`BaseHandler::initialize`] runs once per worker. It resolves the device,
//!    finds the serialized artifact, builds the model through a
//!    [`ModelFactory`](crate::ModelFactory) and loads the optional label mapping.
//! 2. The runtime then calls the pipeline stages of a [`ServingHandler`] for every
//!    batch, in order: `preprocess`, `inference`, `postprocess` (or all three via
//!    [`ServingHandler::handle`]).
//!
//! Stages called before a successful initialization are rejected.
mod base;
mod pipeline;


pub use base::BaseHandler;
pub use pipeline::{Handler, ServingHandler, Stage};
