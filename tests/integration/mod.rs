//! Integration tests for Audit Slice
//!
//! These tests verify the audit API with a real (in-memory) database and all
//! middleware, and the transport client against mock and real servers.

mod api_tests;
