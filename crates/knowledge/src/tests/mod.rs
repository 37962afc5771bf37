//! Cross-module tests for the retrieval pipeline.

pub(crate) mod support;
