//! Cross-agent tests for the question/answer flow.
//!
//! These tests wire the real actors together on the in-process bus, with
//! fakes standing in for PDF parsing, embeddings and generation. Time is
//! paused where backoff or timeouts are involved.

pub mod pipeline_integration;
