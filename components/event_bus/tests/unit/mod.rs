//! Unit test suite for event_bus
//! This file makes cargo test discover the unit test modules
