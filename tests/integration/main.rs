//! Integration test driver for `tests/integration/`.
//!
//! `service_tests` drives the whole consumer against the mocks in
//! `mock_hw`; `mirror_socket_tests` runs the mirror over loopback sockets.
//! Everything runs on the host with no hardware attached.

mod mock_hw;
mod service_tests;
