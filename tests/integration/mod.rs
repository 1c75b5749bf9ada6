//! Integration test suite for the wizard engine.
//!
//! These tests drive `WorkflowEngine` end to end against a scripted
//! backend that can delay or fail any call.
//!
//! # Test Categories
//!
//! - `lifecycle`: start, update, resume, complete and cancel
//! - `navigation`: navigation guard, overrides and the transition lock
//! - `autosave`: draft autosave timing, overlap and failure handling
//! - `concurrency`: response ordering, sessions and independent engines


mod concurrency;
mod lifecycle;
mod navigation;
