//! Network Tests
