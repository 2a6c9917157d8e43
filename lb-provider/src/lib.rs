//! The LB provider interface (§4.C): create/delete/annotate an LB through
//! one of several cloud backends.
//!
//! Modules:
//! - `provider`: the `LoadBalancerProvider` trait and the annotation map type.
//! - `fake`: returns a fresh UUID, for tests and `cloud.name = "fake"`.
//! - `cloud`: the `alibaba`/`huawei`/`tencent` backends, all reqwest-backed against `cloud.endpoint`.
//! - `factory`: builds the configured provider from `Config`.

pub mod cloud;
pub mod factory;
pub mod fake;
pub mod provider;

pub use factory::build_provider;
pub use provider::LoadBalancerProvider;
