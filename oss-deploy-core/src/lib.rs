#![doc = "oss-deploy-core: diff-and-upload engine for oss-deploy."]

//! This crate contains the decision logic for publishing a directory of built
//! static assets to an object-storage bucket: fingerprinting, remote probing,
//! cache policy resolution, diff planning and batched uploads.
//! It has no network dependency; the bucket is reached through the
//! [`contract::ObjectStore`] trait.
//!
//! # Usage
//! Validate a [`config::RunSettings`] into a [`config::RunConfig`], then call
//! [`deploy::deploy`] with any `ObjectStore` implementation.

pub mod config;
pub mod contract;
pub mod deploy;
pub mod error;
pub mod fingerprint;
pub mod local;
pub mod plan;
pub mod policy;
pub mod probe;
pub mod upload;
