//! Protocol Tests

mod codec_tests;
