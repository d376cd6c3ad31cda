//! Host-facing bridge over `sixeats_core`.

pub mod api;
